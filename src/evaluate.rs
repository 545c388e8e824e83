//! Session-level evaluation of a trained forecaster
//!
//! A window is a miss when its true next template is not among the model's
//! `k` highest-scored templates. A session is predicted anomalous as soon as
//! one of its windows is a miss; predictions are then scored against the
//! session labels with precision, recall and F1.

use crate::dataset::DataLoader;
use crate::model::{ForecastModel, ModelError, Result};
use ndarray::ArrayView1;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Result of checking one window against the model's ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    pub session_idx: usize,
    pub session_label: u8,
    /// True label absent from the top k
    pub miss: bool,
}

/// Aggregated outcome of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionVerdict {
    pub session_idx: usize,
    pub windows: usize,
    pub misses: usize,
    /// Any window missed
    pub predicted: bool,
    /// Stored label is positive
    pub actual: bool,
}

/// Binary classification scores over sessions
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Evaluation summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub topk: usize,
    /// `1 - misses / windows` at window granularity
    pub window_topk_accuracy: f64,
    /// Sessions that contributed at least one window
    pub sessions: usize,
    pub windows: usize,
    /// Sessions flagged anomalous
    pub predicted_anomalies: usize,
    /// Sessions labelled anomalous
    pub actual_anomalies: usize,
}

impl EvalReport {
    /// Flat metric map keyed `f1`, `rc`, `pc` and `top{k}-acc`
    pub fn to_metrics(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("f1".to_string(), self.f1),
            ("rc".to_string(), self.recall),
            ("pc".to_string(), self.precision),
            (format!("top{}-acc", self.topk), self.window_topk_accuracy),
        ])
    }
}

/// Indices of the `k` largest scores, best first; ties go to the lower index
pub fn top_k(scores: ArrayView1<f32>, k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(k);
    order
}

/// Group window outcomes by session index
///
/// Sessions are returned in ascending index order.
pub fn aggregate_sessions(outcomes: &[WindowOutcome]) -> Vec<SessionVerdict> {
    let mut sessions: BTreeMap<usize, SessionVerdict> = BTreeMap::new();
    for outcome in outcomes {
        let verdict = sessions
            .entry(outcome.session_idx)
            .or_insert(SessionVerdict {
                session_idx: outcome.session_idx,
                windows: 0,
                misses: 0,
                predicted: false,
                actual: outcome.session_label > 0,
            });
        verdict.windows += 1;
        if outcome.miss {
            verdict.misses += 1;
        }
    }
    sessions
        .into_values()
        .map(|mut v| {
            v.predicted = v.misses > 0;
            v
        })
        .collect()
}

/// Precision, recall and F1 of `predicted` against `actual`
///
/// Undefined ratios (no predicted or no actual positives) are reported as 0.
pub fn compute_metrics(predicted: &[bool], actual: &[bool]) -> Metrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&p, &a) in predicted.iter().zip(actual) {
        match (p, a) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize, name: &str| {
        if den == 0 {
            warn!(metric = name, "zero division, reporting 0.0");
            0.0
        } else {
            num as f64 / den as f64
        }
    };
    let precision = ratio(tp, tp + fp, "precision");
    let recall = ratio(tp, tp + fn_, "recall");
    let f1 = ratio(2 * tp, 2 * tp + fp + fn_, "f1");
    Metrics {
        precision,
        recall,
        f1,
    }
}

/// Scores a model's ranking on held-out windows
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    topk: usize,
}

impl Evaluator {
    pub fn new(topk: usize) -> Self {
        Self { topk }
    }

    pub fn topk(&self) -> usize {
        self.topk
    }

    /// Reject a `topk` outside `1..=num_labels` before any work is done
    pub fn validate(&self, num_labels: usize) -> Result<()> {
        if self.topk == 0 || self.topk > num_labels {
            return Err(ModelError::InvalidConfig(format!(
                "topk must be between 1 and {}, got {}",
                num_labels, self.topk
            )));
        }
        Ok(())
    }

    /// Run the model over every batch and classify each window
    pub fn window_outcomes(
        &self,
        model: &dyn ForecastModel,
        loader: &DataLoader<'_>,
    ) -> Result<Vec<WindowOutcome>> {
        self.validate(model.num_labels())?;

        let mut outcomes = Vec::with_capacity(loader.dataset().len());
        for batch in loader.batches(0) {
            let output = model.forward(&batch)?;
            for (sample, scores) in batch.iter().zip(output.y_pred.rows()) {
                let ranked = top_k(scores, self.topk);
                outcomes.push(WindowOutcome {
                    session_idx: sample.session_idx,
                    session_label: sample.session_label,
                    miss: !ranked.contains(&sample.window_label),
                });
            }
        }
        Ok(outcomes)
    }

    pub fn evaluate(&self, model: &dyn ForecastModel, loader: &DataLoader<'_>) -> Result<EvalReport> {
        if loader.is_empty() {
            return Err(ModelError::EmptyEvaluationSet);
        }

        let outcomes = self.window_outcomes(model, loader)?;
        let report = self.summarise(&outcomes)?;
        info!(
            f1 = report.f1,
            recall = report.recall,
            precision = report.precision,
            topk = report.topk,
            window_topk_accuracy = report.window_topk_accuracy,
            "evaluation complete"
        );
        Ok(report)
    }

    /// Build a report from already classified windows
    pub fn summarise(&self, outcomes: &[WindowOutcome]) -> Result<EvalReport> {
        if outcomes.is_empty() {
            return Err(ModelError::EmptyEvaluationSet);
        }

        let verdicts = aggregate_sessions(outcomes);
        let predicted: Vec<bool> = verdicts.iter().map(|v| v.predicted).collect();
        let actual: Vec<bool> = verdicts.iter().map(|v| v.actual).collect();
        let metrics = compute_metrics(&predicted, &actual);

        let misses = outcomes.iter().filter(|o| o.miss).count();
        Ok(EvalReport {
            precision: metrics.precision,
            recall: metrics.recall,
            f1: metrics.f1,
            topk: self.topk,
            window_topk_accuracy: 1.0 - misses as f64 / outcomes.len() as f64,
            sessions: verdicts.len(),
            windows: outcomes.len(),
            predicted_anomalies: predicted.iter().filter(|&&p| p).count(),
            actual_anomalies: actual.iter().filter(|&&a| a).count(),
        })
    }
}

/// Evaluate `model` on `loader` with a top-`topk` miss criterion
pub fn evaluate(
    model: &dyn ForecastModel,
    loader: &DataLoader<'_>,
    topk: usize,
) -> Result<EvalReport> {
    Evaluator::new(topk).evaluate(model, loader)
}
