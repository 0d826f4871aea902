//! Single-layer LSTM regressor.
//!
//! Maps a window of scaled closes to one scaled close. Gates are stacked in
//! the order input, forget, cell candidate, output.

use crate::config::ForecasterConfig;
use crate::error::{PipelineError, Result};
use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array, Array1, Array2, ArrayView1, Axis, Dimension, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// Optimizer settings for one training run.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Seed for batch shuffling.
    pub seed: u64,
    /// Checked between batches.
    pub timeout: Option<Duration>,
}

impl From<&ForecasterConfig> for TrainingOptions {
    fn from(config: &ForecasterConfig) -> Self {
        Self {
            epochs: config.epochs,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            seed: config.seed,
            timeout: config.training_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Params {
    /// Input kernel, (4H, 1).
    w_x: Array2<f64>,
    /// Recurrent kernel, (4H, H).
    w_h: Array2<f64>,
    b: Array1<f64>,
    w_out: Array1<f64>,
    /// Length 1 so it goes through the same optimizer path as the rest.
    b_out: Array1<f64>,
}

impl Params {
    fn zeros(hidden: usize) -> Self {
        Self {
            w_x: Array2::zeros((4 * hidden, 1)),
            w_h: Array2::zeros((4 * hidden, hidden)),
            b: Array1::zeros(4 * hidden),
            w_out: Array1::zeros(hidden),
            b_out: Array1::zeros(1),
        }
    }

    fn is_shaped_for(&self, hidden: usize) -> bool {
        self.w_x.dim() == (4 * hidden, 1)
            && self.w_h.dim() == (4 * hidden, hidden)
            && self.b.len() == 4 * hidden
            && self.w_out.len() == hidden
            && self.b_out.len() == 1
    }

    fn all_finite(&self) -> bool {
        self.w_x.iter().all(|v| v.is_finite())
            && self.w_h.iter().all(|v| v.is_finite())
            && self.b.iter().all(|v| v.is_finite())
            && self.w_out.iter().all(|v| v.is_finite())
            && self.b_out.iter().all(|v| v.is_finite())
    }

    fn apply_adam(&mut self, grads: &Params, m: &mut Params, v: &mut Params, step_size: f64) {
        adam_update(&mut self.w_x, &grads.w_x, &mut m.w_x, &mut v.w_x, step_size);
        adam_update(&mut self.w_h, &grads.w_h, &mut m.w_h, &mut v.w_h, step_size);
        adam_update(&mut self.b, &grads.b, &mut m.b, &mut v.b, step_size);
        adam_update(&mut self.w_out, &grads.w_out, &mut m.w_out, &mut v.w_out, step_size);
        adam_update(&mut self.b_out, &grads.b_out, &mut m.b_out, &mut v.b_out, step_size);
    }
}

fn adam_update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    step_size: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            *p -= step_size * *m / (v.sqrt() + EPSILON);
        });
}

/// Activations kept from the forward pass for backpropagation.
struct StepCache {
    x: f64,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
}

/// LSTM layer of width `hidden_size` followed by a linear scalar output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmRegressor {
    hidden_size: usize,
    params: Params,
}

impl LstmRegressor {
    /// Fresh model with uniform (Glorot-style) weights and forget bias 1.
    pub fn new(hidden_size: usize, seed: u64) -> Self {
        let h = hidden_size.max(1);
        let mut rng = StdRng::seed_from_u64(seed);

        let kernel_limit = (6.0 / (1.0 + 4.0 * h as f64)).sqrt();
        let recurrent_limit = (6.0 / (5.0 * h as f64)).sqrt();
        let dense_limit = (6.0 / (h as f64 + 1.0)).sqrt();

        let w_x = Array2::from_shape_fn((4 * h, 1), |_| {
            rng.gen_range(-kernel_limit..kernel_limit)
        });
        let w_h = Array2::from_shape_fn((4 * h, h), |_| {
            rng.gen_range(-recurrent_limit..recurrent_limit)
        });
        let w_out = Array1::from_shape_fn(h, |_| rng.gen_range(-dense_limit..dense_limit));

        let mut b = Array1::<f64>::zeros(4 * h);
        b.slice_mut(s![h..2 * h]).fill(1.0);

        Self {
            hidden_size: h,
            params: Params {
                w_x,
                w_h,
                b,
                w_out,
                b_out: Array1::zeros(1),
            },
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Whether deserialized weights have the right shapes and no NaN/inf.
    pub fn is_well_formed(&self) -> bool {
        self.hidden_size > 0
            && self.params.is_shaped_for(self.hidden_size)
            && self.params.all_finite()
    }

    /// One forward pass over `window`, oldest value first.
    pub fn predict(&self, window: &[f64]) -> f64 {
        self.forward(ArrayView1::from(window), None).0
    }

    fn forward(
        &self,
        window: ArrayView1<f64>,
        mut cache: Option<&mut Vec<StepCache>>,
    ) -> (f64, Array1<f64>) {
        let h = self.hidden_size;
        let p = &self.params;
        let mut h_t = Array1::<f64>::zeros(h);
        let mut c_t = Array1::<f64>::zeros(h);

        for &x in window.iter() {
            let z = &p.w_x.column(0) * x + p.w_h.dot(&h_t) + &p.b;
            let i = sigmoid(z.slice(s![..h]));
            let f = sigmoid(z.slice(s![h..2 * h]));
            let g = z.slice(s![2 * h..3 * h]).mapv(f64::tanh);
            let o = sigmoid(z.slice(s![3 * h..]));

            let c_next = &f * &c_t + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            if let Some(steps) = cache.as_mut() {
                steps.push(StepCache {
                    x,
                    h_prev: h_t,
                    c_prev: c_t,
                    i,
                    f,
                    g,
                    o,
                    tanh_c,
                });
            }

            h_t = h_next;
            c_t = c_next;
        }

        let y = p.w_out.dot(&h_t) + p.b_out[0];
        (y, h_t)
    }

    /// Backpropagate `dy` (dLoss/dOutput) through time, adding into `grads`.
    fn accumulate_gradients(
        &self,
        steps: &[StepCache],
        h_last: &Array1<f64>,
        dy: f64,
        grads: &mut Params,
    ) {
        let h = self.hidden_size;
        let p = &self.params;

        grads.w_out.scaled_add(dy, h_last);
        grads.b_out[0] += dy;

        let mut dh = &p.w_out * dy;
        let mut dc = Array1::<f64>::zeros(h);
        let mut dz = Array1::<f64>::zeros(4 * h);

        for step in steps.iter().rev() {
            let d_o = &dh * &step.tanh_c;
            dc = dc + &dh * &step.o * &step.tanh_c.mapv(|t| 1.0 - t * t);

            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;

            dz.slice_mut(s![..h])
                .assign(&(d_i * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![h..2 * h])
                .assign(&(d_f * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * h..3 * h])
                .assign(&(d_g * &step.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![3 * h..])
                .assign(&(d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.w_x.column_mut(0).scaled_add(step.x, &dz);
            general_mat_mul(
                1.0,
                &dz.view().insert_axis(Axis(1)),
                &step.h_prev.view().insert_axis(Axis(0)),
                1.0,
                &mut grads.w_h,
            );
            grads.b += &dz;

            dh = p.w_h.t().dot(&dz);
            dc = dc * &step.f;
        }
    }

    /// Fit on `windows` (one row per sample) against `targets` with MSE loss
    /// and Adam. Returns the mean loss of each epoch.
    ///
    /// On timeout the weights are left part-trained; callers must discard them.
    pub fn fit(
        &mut self,
        windows: &Array2<f64>,
        targets: &Array1<f64>,
        options: &TrainingOptions,
    ) -> Result<Vec<f64>> {
        let n = windows.nrows();
        debug_assert_eq!(n, targets.len());
        if n == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let h = self.hidden_size;
        let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(1));
        let mut order: Vec<usize> = (0..n).collect();
        let mut m = Params::zeros(h);
        let mut v = Params::zeros(h);
        let mut t = 0;
        let mut losses = Vec::with_capacity(options.epochs);

        for epoch in 0..options.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(options.batch_size.max(1)) {
                if let Some(limit) = options.timeout {
                    if started.elapsed() >= limit {
                        return Err(PipelineError::TrainingTimeout(limit));
                    }
                }

                let mut grads = Params::zeros(h);
                let scale = 2.0 / batch.len() as f64;

                for &idx in batch {
                    let mut steps = Vec::with_capacity(windows.ncols());
                    let (y, h_last) = self.forward(windows.row(idx), Some(&mut steps));
                    let err = y - targets[idx];
                    epoch_loss += err * err;
                    self.accumulate_gradients(&steps, &h_last, scale * err, &mut grads);
                }

                t += 1;
                let step_size = options.learning_rate * (1.0 - BETA2.powi(t)).sqrt()
                    / (1.0 - BETA1.powi(t));
                self.params.apply_adam(&grads, &mut m, &mut v, step_size);
            }

            let mean_loss = epoch_loss / n as f64;
            debug!(epoch = epoch + 1, loss = mean_loss, "LSTM epoch complete");
            losses.push(mean_loss);
        }

        Ok(losses)
    }
}

fn sigmoid(x: ArrayView1<f64>) -> Array1<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}
