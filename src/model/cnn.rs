//! Convolutional next-event forecaster
//!
//! Each kernel width `K` slides over the `[L, D]` embedded window and produces
//! `H` channels per position; channels are rectified and max-pooled over time.
//! The pooled vectors of all kernels are concatenated and projected onto the
//! label vocabulary.

use super::layers::{cross_entropy, cross_entropy_grad, softmax_rows, xavier_uniform, Linear};
use super::{check_batch, Embedder, ForecastModel, ForwardOutput, ModelError, Param, Result};
use crate::dataset::{Batch, Features};
use ndarray::{s, Array1, Array2, Axis};
use rand::Rng;

#[derive(Debug, Clone)]
struct Conv {
    kernel: usize,
    /// `[H, K * D]`
    weight: Param,
    /// `[1, H]`
    bias: Param,
}

/// Intermediate values of one convolution for one window
struct ConvTrace {
    patches: Array2<f32>,
    pre_activation: Array2<f32>,
    argmax: Vec<usize>,
}

struct SampleTrace {
    convs: Vec<ConvTrace>,
}

#[derive(Debug, Clone)]
pub struct ConvForecaster {
    embedder: Embedder,
    expected: &'static str,
    num_labels: usize,
    window_size: usize,
    hidden_size: usize,
    convs: Vec<Conv>,
    fc: Linear,
}

impl ConvForecaster {
    pub fn new<R: Rng>(
        embedder: Embedder,
        expected: &'static str,
        num_labels: usize,
        window_size: usize,
        kernel_sizes: &[usize],
        hidden_size: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if window_size == 0 {
            return Err(ModelError::InvalidConfig(
                "window size must be positive".to_string(),
            ));
        }
        if kernel_sizes.is_empty() {
            return Err(ModelError::InvalidConfig(
                "at least one kernel size is required".to_string(),
            ));
        }
        if let Some(&k) = kernel_sizes.iter().find(|&&k| k == 0 || k > window_size) {
            return Err(ModelError::InvalidConfig(format!(
                "kernel size {} must be between 1 and the window size {}",
                k, window_size
            )));
        }
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

        let dim = embedder.dim();
        let convs = kernel_sizes
            .iter()
            .map(|&kernel| {
                let fan_in = kernel * dim;
                Conv {
                    kernel,
                    weight: Param::new(xavier_uniform(hidden_size, fan_in, fan_in, hidden_size, rng)),
                    bias: Param::zeros(1, hidden_size),
                }
            })
            .collect::<Vec<_>>();
        let fc = Linear::new(hidden_size * convs.len(), num_labels, rng);

        Ok(Self {
            embedder,
            expected,
            num_labels,
            window_size,
            hidden_size,
            convs,
            fc,
        })
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn kernel_sizes(&self) -> Vec<usize> {
        self.convs.iter().map(|c| c.kernel).collect()
    }

    /// Pooled feature vector `[H * n_kernels]` for one window
    fn encode(&self, features: &Features) -> Result<(Array1<f32>, SampleTrace)> {
        let x = self.embedder.embed(features)?;
        let dim = x.ncols();
        let mut pooled = Array1::zeros(self.hidden_size * self.convs.len());
        let mut traces = Vec::with_capacity(self.convs.len());

        for (c, conv) in self.convs.iter().enumerate() {
            let steps = x.nrows() + 1 - conv.kernel;
            let patches =
                Array2::from_shape_fn((steps, conv.kernel * dim), |(t, j)| x[[t + j / dim, j % dim]]);
            let mut z = patches.dot(&conv.weight.value.t());
            z += &conv.bias.value;

            let mut argmax = Vec::with_capacity(self.hidden_size);
            for (h, column) in z.axis_iter(Axis(1)).enumerate() {
                // First position wins ties
                let (best_t, best) = column
                    .iter()
                    .map(|v| v.max(0.0))
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |acc, (t, v)| if v > acc.1 { (t, v) } else { acc });
                pooled[c * self.hidden_size + h] = best;
                argmax.push(best_t);
            }
            traces.push(ConvTrace {
                patches,
                pre_activation: z,
                argmax,
            });
        }
        Ok((pooled, SampleTrace { convs: traces }))
    }

    fn encode_batch(&self, batch: &Batch<'_>) -> Result<(Array2<f32>, Vec<SampleTrace>)> {
        check_batch(batch, self.expected, Some(self.window_size), self.num_labels)?;
        let mut pooled = Array2::zeros((batch.len(), self.hidden_size * self.convs.len()));
        let mut traces = Vec::with_capacity(batch.len());
        for (mut row, sample) in pooled.axis_iter_mut(Axis(0)).zip(batch.iter()) {
            let (features, trace) = self.encode(&sample.features)?;
            row.assign(&features);
            traces.push(trace);
        }
        Ok((pooled, traces))
    }
}

impl ForecastModel for ConvForecaster {
    fn name(&self) -> &'static str {
        "cnn"
    }

    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn forward(&self, batch: &Batch<'_>) -> Result<ForwardOutput> {
        let (pooled, _) = self.encode_batch(batch)?;
        let y_pred = softmax_rows(&self.fc.forward(pooled.view()));
        let loss = cross_entropy(&y_pred, &batch.window_labels());
        Ok(ForwardOutput { loss, y_pred })
    }

    fn accumulate_gradients(&mut self, batch: &Batch<'_>) -> Result<ForwardOutput> {
        let (pooled, traces) = self.encode_batch(batch)?;
        let labels = batch.window_labels();
        let y_pred = softmax_rows(&self.fc.forward(pooled.view()));
        let loss = cross_entropy(&y_pred, &labels);

        let dlogits = cross_entropy_grad(&y_pred, &labels);
        let dpooled = self.fc.backward(pooled.view(), dlogits.view());

        let dim = self.embedder.dim();
        for ((sample, trace), dsample) in batch.iter().zip(&traces).zip(dpooled.rows()) {
            let mut dx = Array2::<f32>::zeros((self.window_size, dim));
            for (c, (conv, conv_trace)) in self.convs.iter_mut().zip(&trace.convs).enumerate() {
                // Max pooling routes the gradient to a single step per channel
                let mut dz = Array2::<f32>::zeros(conv_trace.pre_activation.raw_dim());
                let grads = dsample.slice(s![c * self.hidden_size..(c + 1) * self.hidden_size]);
                for (h, (&t, &g)) in conv_trace.argmax.iter().zip(grads.iter()).enumerate() {
                    if conv_trace.pre_activation[[t, h]] > 0.0 {
                        dz[[t, h]] = g;
                    }
                }
                conv.weight.grad += &dz.t().dot(&conv_trace.patches);
                let mut bias_row = conv.bias.grad.row_mut(0);
                bias_row += &dz.sum_axis(Axis(0));

                let dpatches = dz.dot(&conv.weight.value);
                for ((t, j), &g) in dpatches.indexed_iter() {
                    dx[[t + j / dim, j % dim]] += g;
                }
            }
            self.embedder.accumulate(&sample.features, dx.view());
        }

        Ok(ForwardOutput { loss, y_pred })
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        let mut params = Vec::with_capacity(2 * self.convs.len() + 3);
        if let Some(table) = self.embedder.param_mut() {
            params.push(table);
        }
        for conv in &mut self.convs {
            params.push(&mut conv.weight);
            params.push(&mut conv.bias);
        }
        params.extend(self.fc.params_mut());
        params
    }

    fn parameters(&self) -> Vec<&Param> {
        let mut params = Vec::with_capacity(2 * self.convs.len() + 3);
        if let Some(table) = self.embedder.param() {
            params.push(table);
        }
        for conv in &self.convs {
            params.push(&conv.weight);
            params.push(&conv.bias);
        }
        params.extend(self.fc.params());
        params
    }
}
