//! Mini-batch training loop
//!
//! One epoch walks every batch of the loader once: forward with gradient
//! accumulation, one Adam step, then the gradients are cleared. The average
//! batch loss of each epoch is logged and returned.

use crate::dataset::DataLoader;
use crate::model::{Adam, ForecastModel, ModelError, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Loss history of one `fit` call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingReport {
    /// Mean batch loss per epoch, in order
    pub epoch_losses: Vec<f32>,
    /// Optimiser steps taken
    pub steps: usize,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f32> {
        self.epoch_losses.last().copied()
    }
}

/// Train `model` in place for `epochs` passes over `loader`
///
/// The optimiser is created once, so its moment estimates carry over from
/// one epoch to the next. Fails with `EmptyTrainingSet` when the loader has
/// no windows; any batch error aborts training.
pub fn fit(
    model: &mut dyn ForecastModel,
    loader: &DataLoader<'_>,
    epochs: usize,
    learning_rate: f32,
) -> Result<TrainingReport> {
    if loader.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }

    let mut optimizer = Adam::new(learning_rate);
    let mut report = TrainingReport::default();
    info!(
        model = model.name(),
        epochs,
        learning_rate,
        windows = loader.dataset().len(),
        batches = loader.len(),
        "starting training"
    );

    for epoch in 0..epochs {
        let mut epoch_loss = 0.0f32;
        let mut batch_count = 0usize;
        for batch in loader.batches(epoch) {
            let output = model.accumulate_gradients(&batch)?;
            optimizer.step(model.parameters_mut());
            model.zero_grad();

            epoch_loss += output.loss;
            batch_count += 1;
            report.steps += 1;
            debug!(epoch, batch = batch_count, loss = output.loss, "batch complete");
        }
        let loss = epoch_loss / batch_count.max(1) as f32;
        info!(epoch = epoch + 1, epochs, loss, "training epoch complete");
        report.epoch_losses.push(loss);
    }

    Ok(report)
}
