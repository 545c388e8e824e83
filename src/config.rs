//! Experiment configuration
//!
//! Every knob of a run lives in one [`ExperimentConfig`], loadable from a
//! TOML file where any missing section or key keeps its default:
//!
//! ```toml
//! [data]
//! log_file = "HDFS.log_structured.csv"
//! label_file = "anomaly_label.csv"
//! test_ratio = 0.2
//! partition = "random"
//!
//! [features]
//! window_size = 10
//! feature_type = "semantics"
//! use_tfidf = true
//!
//! [model]
//! kind = "cnn"
//! kernel_sizes = [2, 3, 4]
//! topk = 5
//!
//! [train]
//! epochs = 10
//! learning_rate = 0.001
//! ```

use crate::dataset::FeatureType;
use crate::model::{ModelConfig, ModelKind};
use crate::session::Partition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Input files and the train/test split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub log_file: Option<PathBuf>,
    pub label_file: Option<PathBuf>,
    /// Fraction of sessions held out for evaluation
    pub test_ratio: f64,
    pub partition: Partition,
    /// Seeds the random split, batch shuffling and weight initialisation
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            label_file: None,
            test_ratio: 0.5,
            partition: Partition::Sequential,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub window_size: usize,
    pub feature_type: FeatureType,
    /// Weight word embeddings by tf-idf (semantics only)
    pub use_tfidf: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            feature_type: FeatureType::Sequentials,
            use_tfidf: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub kind: ModelKind,
    pub embedding_dim: usize,
    pub hidden_size: usize,
    pub kernel_sizes: Vec<usize>,
    /// Window is a miss when the true template is outside the top k
    pub topk: usize,
    pub freeze_embeddings: bool,
    /// JSON file holding a `[vocab_size][embedding_dim]` matrix
    pub pretrained_embeddings: Option<PathBuf>,
}

impl Default for ModelSection {
    fn default() -> Self {
        let model = ModelConfig::default();
        Self {
            kind: model.kind,
            embedding_dim: model.embedding_dim,
            hidden_size: model.hidden_size,
            kernel_sizes: model.kernel_sizes,
            topk: 5,
            freeze_embeddings: model.freeze_embeddings,
            pretrained_embeddings: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
    /// Reshuffle training windows every epoch
    pub shuffle: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 1e-3,
            batch_size: 1024,
            shuffle: true,
        }
    }
}

/// Complete description of one experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    pub features: FeaturesConfig,
    pub model: ModelSection,
    pub train: TrainConfig,
}

impl ExperimentConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Architecture settings in the form `build_model` takes
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            kind: self.model.kind,
            embedding_dim: self.model.embedding_dim,
            hidden_size: self.model.hidden_size,
            kernel_sizes: self.model.kernel_sizes.clone(),
            freeze_embeddings: self.model.freeze_embeddings,
            seed: self.data.seed,
        }
    }

    /// Reject values that would fail later in the pipeline
    pub fn validate(&self) -> Result<()> {
        let ratio = self.data.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "test_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        let window = self.features.window_size;
        if window == 0 {
            return Err(ConfigError::Invalid("window_size must be positive".to_string()));
        }
        if self.model.kind == ModelKind::Cnn {
            if self.model.kernel_sizes.is_empty() {
                return Err(ConfigError::Invalid(
                    "kernel_sizes must not be empty".to_string(),
                ));
            }
            if let Some(k) = self
                .model
                .kernel_sizes
                .iter()
                .find(|&&k| k == 0 || k > window)
            {
                return Err(ConfigError::Invalid(format!(
                    "kernel size {} must be between 1 and window_size {}",
                    k, window
                )));
            }
        }
        if self.model.embedding_dim == 0 || self.model.hidden_size == 0 {
            return Err(ConfigError::Invalid(
                "embedding_dim and hidden_size must be positive".to_string(),
            ));
        }
        if self.model.topk == 0 {
            return Err(ConfigError::Invalid("topk must be positive".to_string()));
        }
        if self.train.epochs == 0 {
            return Err(ConfigError::Invalid("epochs must be positive".to_string()));
        }
        if self.train.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }
        let lr = self.train.learning_rate;
        if !(lr.is_finite() && lr > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "learning_rate must be positive and finite, got {}",
                lr
            )));
        }
        Ok(())
    }
}
