//! CLI argument parsing for Bitacora

use crate::config::ExperimentConfig;
use crate::dataset::FeatureType;
use crate::model::ModelKind;
use crate::session::Partition;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the evaluation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

/// Flags left unset keep the value from `--config` (or the default).
#[derive(Parser, Debug)]
#[command(name = "bitacora")]
#[command(version)]
#[command(about = "Next-event forecasting anomaly detection for session logs", long_about = None)]
pub struct Cli {
    /// TOML experiment configuration
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Structured log CSV with Content and EventTemplate columns
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Label CSV with BlockId and Label columns
    #[arg(long = "label-file", value_name = "FILE")]
    pub label_file: Option<PathBuf>,

    /// Fraction of sessions held out for evaluation
    #[arg(long = "test-ratio", value_name = "RATIO")]
    pub test_ratio: Option<f64>,

    /// How sessions are assigned to train and test
    #[arg(long, value_enum)]
    pub partition: Option<Partition>,

    /// Seed for the random split, shuffling and initialisation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Templates per window
    #[arg(short = 'w', long = "window-size", value_name = "SIZE")]
    pub window_size: Option<usize>,

    /// Per-position feature representation
    #[arg(long = "feature-type", value_enum)]
    pub feature_type: Option<FeatureType>,

    /// Weight word embeddings by tf-idf (semantics only)
    #[arg(long = "use-tfidf")]
    pub use_tfidf: bool,

    /// Forecasting architecture
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,

    #[arg(long = "embedding-dim", value_name = "DIM")]
    pub embedding_dim: Option<usize>,

    #[arg(long = "hidden-size", value_name = "SIZE")]
    pub hidden_size: Option<usize>,

    /// Convolution widths, comma separated (e.g., 2,3,4)
    #[arg(long = "kernel-sizes", value_delimiter = ',', value_name = "SIZES")]
    pub kernel_sizes: Option<Vec<usize>>,

    /// A window is a miss when its next template is outside the top k
    #[arg(short = 'k', long)]
    pub topk: Option<usize>,

    #[arg(short, long)]
    pub epochs: Option<usize>,

    #[arg(long = "learning-rate", value_name = "LR")]
    pub learning_rate: Option<f32>,

    #[arg(short, long = "batch-size", value_name = "SIZE")]
    pub batch_size: Option<usize>,

    /// JSON matrix used as the initial embedding table
    #[arg(long = "pretrained-embeddings", value_name = "FILE")]
    pub pretrained_embeddings: Option<PathBuf>,

    /// Keep the embedding table fixed during training
    #[arg(long = "freeze-embeddings")]
    pub freeze_embeddings: bool,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Write every flag that was given over `config`
    pub fn apply_overrides(&self, config: &mut ExperimentConfig) {
        if let Some(path) = &self.log_file {
            config.data.log_file = Some(path.clone());
        }
        if let Some(path) = &self.label_file {
            config.data.label_file = Some(path.clone());
        }
        if let Some(ratio) = self.test_ratio {
            config.data.test_ratio = ratio;
        }
        if let Some(partition) = self.partition {
            config.data.partition = partition;
        }
        if let Some(seed) = self.seed {
            config.data.seed = seed;
        }
        if let Some(window) = self.window_size {
            config.features.window_size = window;
        }
        if let Some(feature_type) = self.feature_type {
            config.features.feature_type = feature_type;
        }
        if self.use_tfidf {
            config.features.use_tfidf = true;
        }
        if let Some(kind) = self.model {
            config.model.kind = kind;
        }
        if let Some(dim) = self.embedding_dim {
            config.model.embedding_dim = dim;
        }
        if let Some(hidden) = self.hidden_size {
            config.model.hidden_size = hidden;
        }
        if let Some(kernels) = &self.kernel_sizes {
            config.model.kernel_sizes = kernels.clone();
        }
        if let Some(topk) = self.topk {
            config.model.topk = topk;
        }
        if let Some(path) = &self.pretrained_embeddings {
            config.model.pretrained_embeddings = Some(path.clone());
        }
        if self.freeze_embeddings {
            config.model.freeze_embeddings = true;
        }
        if let Some(epochs) = self.epochs {
            config.train.epochs = epochs;
        }
        if let Some(lr) = self.learning_rate {
            config.train.learning_rate = lr;
        }
        if let Some(batch) = self.batch_size {
            config.train.batch_size = batch;
        }
    }
}
