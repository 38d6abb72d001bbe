//! Deterministic DDIM sampler over the Stable Diffusion noise schedule.

use ndarray::Array4;

use crate::error::{Error, Result};

/// Number of diffusion steps the model was trained with.
pub const TRAIN_TIMESTEPS: usize = 1000;

const BETA_START: f32 = 0.000_85;
const BETA_END: f32 = 0.012;
const STEPS_OFFSET: usize = 1;

/// DDIM scheduler with `eta = 0` and a scaled-linear beta schedule.
#[derive(Debug, Clone)]
pub struct DdimScheduler {
    alphas_cumprod: Vec<f32>,
    final_alpha_cumprod: f32,
    timesteps: Vec<usize>,
    step_ratio: usize,
}

impl DdimScheduler {
    /// Build a schedule of `num_steps` inference steps.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_steps` is 0 or exceeds [`TRAIN_TIMESTEPS`].
    #[allow(clippy::cast_precision_loss)]
    pub fn new(num_steps: usize) -> Result<Self> {
        if num_steps == 0 || num_steps > TRAIN_TIMESTEPS {
            return Err(Error::invalid(
                "num_steps",
                format!("must be between 1 and {TRAIN_TIMESTEPS}, got {num_steps}"),
            ));
        }

        let start = BETA_START.sqrt();
        let end = BETA_END.sqrt();
        let last = (TRAIN_TIMESTEPS - 1) as f32;

        let mut alphas_cumprod = Vec::with_capacity(TRAIN_TIMESTEPS);
        let mut product = 1.0_f32;
        for i in 0..TRAIN_TIMESTEPS {
            let beta = (end - start).mul_add(i as f32 / last, start).powi(2);
            product *= 1.0 - beta;
            alphas_cumprod.push(product);
        }

        let step_ratio = TRAIN_TIMESTEPS / num_steps;
        let timesteps = (0..num_steps)
            .rev()
            .map(|i| (i * step_ratio + STEPS_OFFSET).min(TRAIN_TIMESTEPS - 1))
            .collect();

        Ok(Self {
            final_alpha_cumprod: alphas_cumprod[0],
            alphas_cumprod,
            timesteps,
            step_ratio,
        })
    }

    /// Timesteps to visit, from noisiest to cleanest.
    #[must_use]
    pub fn timesteps(&self) -> &[usize] {
        &self.timesteps
    }

    /// Cumulative alpha product at `timestep`.
    #[must_use]
    pub fn alpha_cumprod(&self, timestep: usize) -> f32 {
        self.alphas_cumprod[timestep.min(TRAIN_TIMESTEPS - 1)]
    }

    /// Move `sample` from `timestep` to the previous timestep given the
    /// model's noise prediction.
    #[must_use]
    pub fn step(
        &self,
        noise_pred: &Array4<f32>,
        timestep: usize,
        sample: &Array4<f32>,
    ) -> Array4<f32> {
        let alpha_t = self.alpha_cumprod(timestep);
        let alpha_prev = timestep
            .checked_sub(self.step_ratio)
            .map_or(self.final_alpha_cumprod, |prev| self.alpha_cumprod(prev));

        let sqrt_alpha_t = alpha_t.sqrt();
        let sqrt_one_minus_t = (1.0 - alpha_t).sqrt();
        let sqrt_alpha_prev = alpha_prev.sqrt();
        let sqrt_one_minus_prev = (1.0 - alpha_prev).sqrt();

        let pred_original = (sample - &(noise_pred * sqrt_one_minus_t)) / sqrt_alpha_t;
        pred_original * sqrt_alpha_prev + noise_pred * sqrt_one_minus_prev
    }
}
