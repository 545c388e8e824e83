//! Token embedding table shared by every architecture
//!
//! Maps each window position to a `D`-dimensional vector:
//! - sequentials: the row of the template id
//! - semantics: the sum of the rows of the template's words
//! - tf-idf: the tf-idf weighted sum of word rows
//!
//! The `<oov>` row is zero-initialised and never receives a gradient, so
//! unseen tokens contribute nothing.

use super::{ModelError, Param, Result};
use crate::dataset::{Features, MetaData, OOV_ID};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct Embedder {
    table: Param,
    freeze: bool,
}

impl Embedder {
    /// Randomly initialised `[vocab_size, dim]` table
    pub fn new<R: Rng>(vocab_size: usize, dim: usize, freeze: bool, rng: &mut R) -> Self {
        let scale = (1.0 / dim.max(1) as f32).sqrt();
        let mut value = Array2::from_shape_fn((vocab_size, dim), |_| rng.gen_range(-scale..scale));
        if vocab_size > OOV_ID {
            value.row_mut(OOV_ID).fill(0.0);
        }
        Self {
            table: Param::new(value),
            freeze,
        }
    }

    /// Use `matrix` as the table as-is
    pub fn from_pretrained(matrix: Array2<f32>, freeze: bool) -> Self {
        Self {
            table: Param::new(matrix),
            freeze,
        }
    }

    /// Table sized for `meta`, taken from its pretrained matrix when present
    pub fn from_meta<R: Rng>(
        meta: &MetaData,
        dim: usize,
        freeze: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if dim == 0 {
            return Err(ModelError::InvalidConfig(
                "embedding dimension must be positive".to_string(),
            ));
        }
        match &meta.pretrain_matrix {
            Some(matrix) => {
                let (rows, cols) = matrix.dim();
                if rows != meta.vocab_size {
                    return Err(ModelError::ShapeMismatch {
                        what: "pretrained embedding rows".to_string(),
                        expected: meta.vocab_size,
                        found: rows,
                    });
                }
                if cols != dim {
                    return Err(ModelError::ShapeMismatch {
                        what: "pretrained embedding dimension".to_string(),
                        expected: dim,
                        found: cols,
                    });
                }
                Ok(Self::from_pretrained(matrix.clone(), freeze))
            }
            None => Ok(Self::new(meta.vocab_size, dim, freeze, rng)),
        }
    }

    pub fn dim(&self) -> usize {
        self.table.value.ncols()
    }

    pub fn vocab_size(&self) -> usize {
        self.table.value.nrows()
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze
    }

    pub fn table(&self) -> &Array2<f32> {
        &self.table.value
    }

    fn row(&self, id: usize) -> Result<ArrayView1<'_, f32>> {
        if id >= self.vocab_size() {
            return Err(ModelError::ShapeMismatch {
                what: "token id".to_string(),
                expected: self.vocab_size(),
                found: id,
            });
        }
        Ok(self.table.value.row(id))
    }

    /// One row per id: `[ids.len(), dim]`
    pub fn lookup(&self, ids: &[usize]) -> Result<Array2<f32>> {
        let mut out = Array2::zeros((ids.len(), self.dim()));
        for (mut dst, &id) in out.axis_iter_mut(Axis(0)).zip(ids) {
            dst.assign(&self.row(id)?);
        }
        Ok(out)
    }

    /// Sum of the rows of `ids`
    pub fn bag(&self, ids: &[usize]) -> Result<Array1<f32>> {
        let mut out = Array1::zeros(self.dim());
        for &id in ids {
            out += &self.row(id)?;
        }
        Ok(out)
    }

    /// `Σ w · row(id)` over sparse `(id, w)` pairs
    pub fn weighted(&self, weights: &[(usize, f32)]) -> Result<Array1<f32>> {
        let mut out = Array1::zeros(self.dim());
        for &(id, w) in weights {
            out.scaled_add(w, &self.row(id)?);
        }
        Ok(out)
    }

    /// Dense weight vector times the table: `weights · E`
    pub fn weighted_dense(&self, weights: ArrayView1<f32>) -> Result<Array1<f32>> {
        if weights.len() != self.vocab_size() {
            return Err(ModelError::ShapeMismatch {
                what: "dense weight vector".to_string(),
                expected: self.vocab_size(),
                found: weights.len(),
            });
        }
        Ok(weights.dot(&self.table.value))
    }

    /// Embed every position of `features`: `[len, dim]`
    pub fn embed(&self, features: &Features) -> Result<Array2<f32>> {
        match features {
            Features::Sequentials(ids) => self.lookup(ids),
            Features::Semantics(bags) => {
                let mut out = Array2::zeros((bags.len(), self.dim()));
                for (mut dst, bag) in out.axis_iter_mut(Axis(0)).zip(bags) {
                    dst.assign(&self.bag(bag)?);
                }
                Ok(out)
            }
            Features::Tfidf(weights) => {
                let mut out = Array2::zeros((weights.len(), self.dim()));
                for (mut dst, w) in out.axis_iter_mut(Axis(0)).zip(weights) {
                    dst.assign(&self.weighted(w)?);
                }
                Ok(out)
            }
        }
    }

    /// Add `grad` (`[len, dim]`, one row per position) into the table gradient
    ///
    /// No-op when frozen. Ids are assumed valid: [`Embedder::embed`] ran first.
    pub fn accumulate(&mut self, features: &Features, grad: ArrayView2<f32>) {
        if self.freeze {
            return;
        }
        let table_grad = &mut self.table.grad;
        let mut add = |id: usize, scale: f32, row: ArrayView1<f32>| {
            if id != OOV_ID && id < table_grad.nrows() {
                table_grad.row_mut(id).scaled_add(scale, &row);
            }
        };
        match features {
            Features::Sequentials(ids) => {
                for (&id, row) in ids.iter().zip(grad.rows()) {
                    add(id, 1.0, row);
                }
            }
            Features::Semantics(bags) => {
                for (bag, row) in bags.iter().zip(grad.rows()) {
                    for &id in bag {
                        add(id, 1.0, row);
                    }
                }
            }
            Features::Tfidf(weights) => {
                for (pairs, row) in weights.iter().zip(grad.rows()) {
                    for &(id, w) in pairs {
                        add(id, w, row);
                    }
                }
            }
        }
    }

    /// The table as a trainable parameter, `None` when frozen
    pub fn param_mut(&mut self) -> Option<&mut Param> {
        (!self.freeze).then_some(&mut self.table)
    }

    pub fn param(&self) -> Option<&Param> {
        (!self.freeze).then_some(&self.table)
    }
}
