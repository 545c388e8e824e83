//! Bitacora - next-event forecasting anomaly detection for session logs
//!
//! Structured log records are grouped into sessions by an identifier found
//! in their text (HDFS block ids by default), split into train and test
//! sets, and expanded into fixed-length windows of event templates. A model
//! learns to forecast the next template of a window; at evaluation time a
//! session is flagged anomalous when any of its true next templates falls
//! outside the model's top-k forecast.
//!
//! ```no_run
//! use bitacora::dataset::{DataLoader, FeatureExtractor, FeatureType, WindowedSampleBuilder};
//! use bitacora::model::{build_model, ModelConfig};
//! use bitacora::session::{load_sessions, Partition};
//! use std::num::NonZeroUsize;
//!
//! # fn main() -> anyhow::Result<()> {
//! let (train, test) = load_sessions(
//!     "HDFS.log_structured.csv",
//!     "anomaly_label.csv",
//!     0.2,
//!     Partition::Sequential,
//!     42,
//! )?;
//! let extractor = FeatureExtractor::fit(&train, FeatureType::Sequentials, false);
//! let builder = WindowedSampleBuilder::new(&extractor, 10);
//! let (train_data, test_data) = (builder.build(&train), builder.build(&test));
//!
//! let mut model = build_model(&extractor.meta_data(), &ModelConfig::default(), 10)?;
//! let batch_size = NonZeroUsize::new(1024).unwrap();
//! bitacora::fit(model.as_mut(), &DataLoader::new(&train_data, batch_size), 10, 1e-3)?;
//! let report = bitacora::evaluate(model.as_ref(), &DataLoader::new(&test_data, batch_size), 5)?;
//! println!("{:?}", report.to_metrics());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dataset;
pub mod evaluate;
pub mod model;
pub mod report;
pub mod session;
pub mod training;

pub use evaluate::{evaluate, EvalReport, Evaluator};
pub use training::{fit, TrainingReport};
