//! Run summary output (text and `bitacora-json-v1`)

use crate::evaluate::EvalReport;
use crate::training::TrainingReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Sizes of the data that went into a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    pub log_records: usize,
    pub skipped_records: usize,
    pub train_sessions: usize,
    pub test_sessions: usize,
    pub train_windows: usize,
    pub test_windows: usize,
    /// Embedding table rows
    pub vocab_size: usize,
    /// Distinct training templates plus reserved ids
    pub num_labels: usize,
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub model: String,
    pub dataset: DatasetStats,
    pub training: TrainingReport,
    pub evaluation: EvalReport,
    /// `f1`, `rc`, `pc` and `top{k}-acc`
    pub metrics: BTreeMap<String, f64>,
}

impl RunReport {
    pub fn new(
        model: &str,
        dataset: DatasetStats,
        training: TrainingReport,
        evaluation: EvalReport,
    ) -> Self {
        let metrics = evaluation.to_metrics().into_iter().collect();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "bitacora-json-v1".to_string(),
            model: model.to_string(),
            dataset,
            training,
            evaluation,
            metrics,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.dataset;
        let e = &self.evaluation;

        writeln!(f, "=== Dataset ===")?;
        writeln!(
            f,
            "log records:   {} ({} without a session key)",
            d.log_records, d.skipped_records
        )?;
        writeln!(f, "sessions:      {} train / {} test", d.train_sessions, d.test_sessions)?;
        writeln!(f, "windows:       {} train / {} test", d.train_windows, d.test_windows)?;
        writeln!(f, "vocab size:    {} (labels: {})", d.vocab_size, d.num_labels)?;
        writeln!(f)?;

        writeln!(f, "=== Training ({}) ===", self.model)?;
        for (epoch, loss) in self.training.epoch_losses.iter().enumerate() {
            writeln!(f, "epoch {:>3}  loss {:.4}", epoch + 1, loss)?;
        }
        writeln!(f)?;

        writeln!(f, "=== Evaluation (top-{}) ===", e.topk)?;
        writeln!(f, "precision:     {:.4}", e.precision)?;
        writeln!(f, "recall:        {:.4}", e.recall)?;
        writeln!(f, "f1:            {:.4}", e.f1)?;
        writeln!(f, "top{}-acc:      {:.4}", e.topk, e.window_topk_accuracy)?;
        writeln!(
            f,
            "sessions:      {} evaluated, {} flagged, {} labelled anomalous",
            e.sessions, e.predicted_anomalies, e.actual_anomalies
        )
    }
}
