//! Trainable parameter storage and the dense building blocks shared by models

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;

/// A trainable matrix and its accumulated gradient
#[derive(Debug, Clone)]
pub struct Param {
    pub value: Array2<f32>,
    pub grad: Array2<f32>,
}

impl Param {
    pub fn new(value: Array2<f32>) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Self { value, grad }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(Array2::zeros((rows, cols)))
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn shape(&self) -> (usize, usize) {
        self.value.dim()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Xavier-style uniform initialisation in `[-s, s)`, `s = sqrt(2 / (fan_in + fan_out))`
pub fn xavier_uniform<R: Rng>(
    rows: usize,
    cols: usize,
    fan_in: usize,
    fan_out: usize,
    rng: &mut R,
) -> Array2<f32> {
    let scale = (2.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-scale..scale))
}

/// Fully connected layer: `y = x · Wᵀ + b`
#[derive(Debug, Clone)]
pub struct Linear {
    /// `[out, in]`
    pub weight: Param,
    /// `[1, out]`
    pub bias: Param,
}

impl Linear {
    pub fn new<R: Rng>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        Self {
            weight: Param::new(xavier_uniform(
                output_dim, input_dim, input_dim, output_dim, rng,
            )),
            bias: Param::zeros(1, output_dim),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weight.value.nrows()
    }

    /// `[batch, in]` → `[batch, out]`
    pub fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let mut y = x.dot(&self.weight.value.t());
        y += &self.bias.value;
        y
    }

    /// Accumulate parameter gradients and return the gradient w.r.t. `x`
    pub fn backward(&mut self, x: ArrayView2<f32>, grad_out: ArrayView2<f32>) -> Array2<f32> {
        self.weight.grad += &grad_out.t().dot(&x);
        let bias_grad = grad_out.sum_axis(Axis(0));
        let mut bias_row = self.bias.grad.row_mut(0);
        bias_row += &bias_grad;
        grad_out.dot(&self.weight.value)
    }

    pub fn params_mut(&mut self) -> [&mut Param; 2] {
        [&mut self.weight, &mut self.bias]
    }

    pub fn params(&self) -> [&Param; 2] {
        [&self.weight, &self.bias]
    }
}

pub fn relu(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v.max(0.0))
}

/// Zero the gradient wherever the pre-activation was not positive
pub fn relu_backward(pre_activation: &Array2<f32>, grad: &Array2<f32>) -> Array2<f32> {
    let mut out = grad.clone();
    out.zip_mut_with(pre_activation, |g, &z| {
        if z <= 0.0 {
            *g = 0.0;
        }
    });
    out
}

/// Numerically stable row-wise softmax
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

/// Mean negative log-likelihood of `labels` under row distributions `probs`
pub fn cross_entropy(probs: &Array2<f32>, labels: &[usize]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f32 = labels
        .iter()
        .enumerate()
        .map(|(row, &label)| -probs[[row, label]].max(1e-12).ln())
        .sum();
    total / labels.len() as f32
}

/// Gradient of [`cross_entropy`] w.r.t. the logits: `(p - onehot(y)) / batch`
pub fn cross_entropy_grad(probs: &Array2<f32>, labels: &[usize]) -> Array2<f32> {
    let mut grad = probs.clone();
    for (row, &label) in labels.iter().enumerate() {
        grad[[row, label]] -= 1.0;
    }
    let batch = labels.len().max(1) as f32;
    grad.mapv_inplace(|g| g / batch);
    grad
}

/// Mean of the rows of `x`
pub fn mean_rows(x: &Array2<f32>) -> Array1<f32> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}
