//! Adam optimiser over a model's parameter list

use super::Param;
use ndarray::{Array2, Zip};

/// Adam with bias correction
///
/// Moment buffers are keyed by position in the parameter list, so the same
/// model must be stepped every time. A list whose length or shapes change
/// resets the state.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    t: u32,
    moments: Vec<(Array2<f32>, Array2<f32>)>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            moments: Vec::new(),
        }
    }

    /// Steps taken so far
    pub fn steps(&self) -> u32 {
        self.t
    }

    fn matches(&self, params: &[&mut Param]) -> bool {
        self.moments.len() == params.len()
            && self
                .moments
                .iter()
                .zip(params)
                .all(|((m, _), p)| m.raw_dim() == p.value.raw_dim())
    }

    /// Apply one update from the accumulated gradients
    pub fn step(&mut self, mut params: Vec<&mut Param>) {
        if !self.matches(&params) {
            self.moments = params
                .iter()
                .map(|p| {
                    (
                        Array2::zeros(p.value.raw_dim()),
                        Array2::zeros(p.value.raw_dim()),
                    )
                })
                .collect();
            self.t = 0;
        }

        self.t = self.t.saturating_add(1);
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);
        let (beta1, beta2, eps, lr) = (self.beta1, self.beta2, self.eps, self.learning_rate);

        for (param, (m, v)) in params.iter_mut().zip(self.moments.iter_mut()) {
            Zip::from(&mut param.value)
                .and(&param.grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias1.max(1e-12);
                    let v_hat = *v / bias2.max(1e-12);
                    *w -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
    }
}
