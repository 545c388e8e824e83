//! Mean-pooled forecaster: average the window's embeddings, one hidden layer

use super::layers::{
    cross_entropy, cross_entropy_grad, mean_rows, relu, relu_backward, softmax_rows, Linear,
};
use super::{check_batch, Embedder, ForecastModel, ForwardOutput, ModelError, Param, Result};
use crate::dataset::Batch;
use ndarray::{Array2, Axis};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct PooledForecaster {
    embedder: Embedder,
    expected: &'static str,
    num_labels: usize,
    hidden: Linear,
    output: Linear,
}

impl PooledForecaster {
    pub fn new<R: Rng>(
        embedder: Embedder,
        expected: &'static str,
        num_labels: usize,
        hidden_size: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if hidden_size == 0 {
            return Err(ModelError::InvalidConfig(
                "hidden size must be positive".to_string(),
            ));
        }
        if num_labels == 0 {
            return Err(ModelError::InvalidConfig(
                "label vocabulary is empty".to_string(),
            ));
        }
        let hidden = Linear::new(embedder.dim(), hidden_size, rng);
        let output = Linear::new(hidden_size, num_labels, rng);
        Ok(Self {
            embedder,
            expected,
            num_labels,
            hidden,
            output,
        })
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// `[batch, D]` mean embedding per window
    fn pool(&self, batch: &Batch<'_>) -> Result<Array2<f32>> {
        check_batch(batch, self.expected, None, self.num_labels)?;
        let mut pooled = Array2::zeros((batch.len(), self.embedder.dim()));
        for (mut row, sample) in pooled.axis_iter_mut(Axis(0)).zip(batch.iter()) {
            let x = self.embedder.embed(&sample.features)?;
            row.assign(&mean_rows(&x));
        }
        Ok(pooled)
    }
}

impl ForecastModel for PooledForecaster {
    fn name(&self) -> &'static str {
        "pooled"
    }

    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn forward(&self, batch: &Batch<'_>) -> Result<ForwardOutput> {
        let pooled = self.pool(batch)?;
        let h = relu(&self.hidden.forward(pooled.view()));
        let y_pred = softmax_rows(&self.output.forward(h.view()));
        let loss = cross_entropy(&y_pred, &batch.window_labels());
        Ok(ForwardOutput { loss, y_pred })
    }

    fn accumulate_gradients(&mut self, batch: &Batch<'_>) -> Result<ForwardOutput> {
        let pooled = self.pool(batch)?;
        let pre = self.hidden.forward(pooled.view());
        let h = relu(&pre);
        let labels = batch.window_labels();
        let y_pred = softmax_rows(&self.output.forward(h.view()));
        let loss = cross_entropy(&y_pred, &labels);

        let dlogits = cross_entropy_grad(&y_pred, &labels);
        let dh = self.output.backward(h.view(), dlogits.view());
        let dpre = relu_backward(&pre, &dh);
        let dpooled = self.hidden.backward(pooled.view(), dpre.view());

        for (sample, dmean) in batch.iter().zip(dpooled.rows()) {
            let len = sample.features.len();
            let share = dmean.mapv(|g| g / len as f32);
            let dx = share
                .broadcast((len, share.len()))
                .map(|view| view.to_owned())
                .unwrap_or_else(|| Array2::zeros((len, share.len())));
            self.embedder.accumulate(&sample.features, dx.view());
        }

        Ok(ForwardOutput { loss, y_pred })
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        let mut params = Vec::with_capacity(5);
        if let Some(table) = self.embedder.param_mut() {
            params.push(table);
        }
        params.extend(self.hidden.params_mut());
        params.extend(self.output.params_mut());
        params
    }

    fn parameters(&self) -> Vec<&Param> {
        let mut params = Vec::with_capacity(5);
        if let Some(table) = self.embedder.param() {
            params.push(table);
        }
        params.extend(self.hidden.params());
        params.extend(self.output.params());
        params
    }
}
