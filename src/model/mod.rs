// Next-Event Forecasting Models
//
// A model reads a window of embedded template features and scores every
// template in the label vocabulary as the next event. Training minimises the
// cross-entropy of the true next template; evaluation ranks the scores and
// checks whether the true template is in the top k.
//
// Architectures are interchangeable behind `ForecastModel`:
//   - ConvForecaster:   parallel 1-D convolutions + max-over-time pooling
//   - PooledForecaster: mean-pooled embeddings + one hidden layer
//
// All gradients are written by hand against ndarray; there is no autodiff.

mod cnn;
mod embedder;
mod layers;
mod optim;
mod pooled;

pub use cnn::ConvForecaster;
pub use embedder::Embedder;
pub use layers::{
    cross_entropy, cross_entropy_grad, softmax_rows, xavier_uniform, Linear, Param,
};
pub use optim::Adam;
pub use pooled::PooledForecaster;

use crate::dataset::{Batch, FeatureType, MetaData};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building, running or training a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Feature mismatch: model expects {expected} features, batch has {found}")]
    FeatureMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Window label {label} outside the label vocabulary of {num_labels}")]
    LabelOutOfRange { label: usize, num_labels: usize },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty batch")]
    EmptyBatch,

    #[error("Training set produced no windows")]
    EmptyTrainingSet,

    #[error("Evaluation set produced no windows")]
    EmptyEvaluationSet,
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Loss and next-event distribution for one batch
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    /// Mean cross-entropy against the batch's window labels
    pub loss: f32,
    /// `[batch, num_labels]` softmax probabilities
    pub y_pred: Array2<f32>,
}

/// Contract shared by every forecasting architecture
///
/// Implementations are not thread-safe with respect to training: `fit` and
/// `evaluate` must not run concurrently on one instance.
pub trait ForecastModel {
    /// Architecture name for logs and reports
    fn name(&self) -> &'static str;

    /// Size of the predicted label vocabulary
    fn num_labels(&self) -> usize;

    /// Inference: loss and probabilities, no gradient bookkeeping
    fn forward(&self, batch: &Batch<'_>) -> Result<ForwardOutput>;

    /// Forward pass that also adds this batch's gradients to every trainable
    /// parameter. Gradients accumulate until [`ForecastModel::zero_grad`].
    fn accumulate_gradients(&mut self, batch: &Batch<'_>) -> Result<ForwardOutput>;

    /// Trainable parameters in a stable order; a frozen embedding table is absent
    fn parameters_mut(&mut self) -> Vec<&mut Param>;

    /// Trainable parameters, same order as [`ForecastModel::parameters_mut`]
    fn parameters(&self) -> Vec<&Param>;

    fn zero_grad(&mut self) {
        for param in self.parameters_mut() {
            param.zero_grad();
        }
    }

    /// Number of trainable scalars
    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}

/// Available architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Convolutional feature extractor over the window
    #[default]
    Cnn,
    /// Mean-pooled embeddings with one hidden layer
    Pooled,
}

/// Architecture hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub embedding_dim: usize,
    pub hidden_size: usize,
    /// Convolution widths (CNN only)
    pub kernel_sizes: Vec<usize>,
    /// Keep the embedding table fixed during training
    pub freeze_embeddings: bool,
    /// Seed for weight initialisation
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Cnn,
            embedding_dim: 16,
            hidden_size: 100,
            kernel_sizes: vec![2, 3, 4],
            freeze_embeddings: false,
            seed: 42,
        }
    }
}

/// Construct the configured architecture for `meta`
///
/// Dimension problems (pretrained matrix shape, kernels wider than the
/// window, zero sizes) are reported here rather than during a forward pass.
pub fn build_model(
    meta: &MetaData,
    config: &ModelConfig,
    window_size: usize,
) -> Result<Box<dyn ForecastModel>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let embedder = Embedder::from_meta(meta, config.embedding_dim, config.freeze_embeddings, &mut rng)?;
    let model: Box<dyn ForecastModel> = match config.kind {
        ModelKind::Cnn => Box::new(ConvForecaster::new(
            embedder,
            expected_features(meta),
            meta.num_labels,
            window_size,
            &config.kernel_sizes,
            config.hidden_size,
            &mut rng,
        )?),
        ModelKind::Pooled => Box::new(PooledForecaster::new(
            embedder,
            expected_features(meta),
            meta.num_labels,
            config.hidden_size,
            &mut rng,
        )?),
    };
    tracing::info!(
        model = model.name(),
        parameters = model.parameter_count(),
        vocab_size = meta.vocab_size,
        num_labels = meta.num_labels,
        "built forecasting model"
    );
    Ok(model)
}

/// Feature representation a model built from `meta` accepts
pub fn expected_features(meta: &MetaData) -> &'static str {
    match (meta.feature_type, meta.use_tfidf) {
        (FeatureType::Sequentials, _) => "sequentials",
        (FeatureType::Semantics, false) => "semantics",
        (FeatureType::Semantics, true) => "tfidf",
    }
}

/// Reject batches a model cannot consume
///
/// `window_size` of `None` accepts any non-empty window length.
pub(crate) fn check_batch(
    batch: &Batch<'_>,
    expected: &'static str,
    window_size: Option<usize>,
    num_labels: usize,
) -> Result<()> {
    if batch.is_empty() {
        return Err(ModelError::EmptyBatch);
    }
    for sample in batch.iter() {
        let kind = sample.features.kind();
        if kind != expected {
            return Err(ModelError::FeatureMismatch {
                expected,
                found: kind,
            });
        }
        let len = sample.features.len();
        match window_size {
            Some(expected_len) if len != expected_len => {
                return Err(ModelError::ShapeMismatch {
                    what: "window length".to_string(),
                    expected: expected_len,
                    found: len,
                });
            }
            None if len == 0 => {
                return Err(ModelError::ShapeMismatch {
                    what: "window length".to_string(),
                    expected: 1,
                    found: 0,
                });
            }
            _ => {}
        }
        if sample.window_label >= num_labels {
            return Err(ModelError::LabelOutOfRange {
                label: sample.window_label,
                num_labels,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
