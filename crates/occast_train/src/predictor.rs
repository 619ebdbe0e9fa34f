//! Autoregressive rollout.
//!
//! The rolling window is seeded from the last `L` known scaled values. Each
//! iteration feeds the window to the forecaster, appends the first
//! `min(k, H)` predicted means to the history and slides forward. Only means are fed
//! back; dispersions are reported but never re-enter the window.

use serde::{Deserialize, Serialize};

use occast_core::WindowForecaster;
use occast_data::{lag_features, MinMaxScaler};

use crate::error::{Result, TrainError};

/// Rollout length and feedback stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Number of future values to produce (P).
    pub steps: usize,
    /// Predicted means appended per iteration (k ≥ 1, capped at H).
    #[serde(default = "default_steps_per_iteration")]
    pub steps_per_iteration: usize,
}

fn default_steps_per_iteration() -> usize {
    1
}

impl RolloutConfig {
    /// One value per iteration.
    #[must_use]
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            steps_per_iteration: 1,
        }
    }

    /// Set the number of means appended per iteration.
    #[must_use]
    pub fn with_steps_per_iteration(mut self, k: usize) -> Self {
        self.steps_per_iteration = k;
        self
    }
}

/// Rollout trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    /// Means in scaled units, as fed back into the window.
    pub scaled_means: Vec<f32>,
    /// Means in original units.
    pub means: Vec<f64>,
    /// Dispersion of each reported step.
    pub dispersions: Vec<f32>,
}

impl Rollout {
    /// Number of produced values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scaled_means.len()
    }

    /// Check if nothing was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scaled_means.is_empty()
    }
}

/// Roll `forecaster` forward from `history` (scaled values).
///
/// Lag columns are rebuilt from the whole buffer on every iteration, so
/// `lags` must match the offsets the forecaster was trained with.
///
/// # Errors
///
/// - [`TrainError::InsufficientHistory`] if `history` is shorter than the window.
/// - [`TrainError::InvalidInput`] if `steps_per_iteration` is 0, the lag
///   count does not match the forecaster's feature count, or the forecaster
///   returns fewer than `min(k, H)` steps.
/// - [`TrainError::InvalidForecast`] if a fed-back step has a non-positive
///   or non-finite parameter.
pub fn rollout<F: WindowForecaster + ?Sized>(
    forecaster: &F,
    history: &[f32],
    lags: &[usize],
    scaler: &MinMaxScaler,
    config: &RolloutConfig,
) -> Result<Rollout> {
    let seq_len = forecaster.seq_len();
    let horizon = forecaster.horizon();
    let k = config.steps_per_iteration.min(horizon);

    if history.len() < seq_len {
        return Err(TrainError::InsufficientHistory(format!(
            "rollout needs {seq_len} known values, got {}",
            history.len()
        )));
    }
    if config.steps_per_iteration == 0 {
        return Err(TrainError::InvalidInput(
            "steps per iteration must be at least 1".to_string(),
        ));
    }
    if forecaster.n_features() != 1 + lags.len() {
        return Err(TrainError::InvalidInput(format!(
            "forecaster expects {} features, {} lags give {}",
            forecaster.n_features(),
            lags.len(),
            1 + lags.len()
        )));
    }

    let mut buffer = history.to_vec();
    buffer.reserve(config.steps);
    let mut out = Rollout {
        scaled_means: Vec::with_capacity(config.steps),
        means: Vec::with_capacity(config.steps),
        dispersions: Vec::with_capacity(config.steps),
    };

    while out.len() < config.steps {
        let features = lag_features(&buffer, lags);
        let start = buffer.len() - seq_len;
        let window: Vec<f32> = features.outer_iter().skip(start).flatten().copied().collect();

        let params = forecaster.forecast(&window)?;
        if params.len() < k {
            return Err(TrainError::InvalidInput(format!(
                "forecaster returned {} steps, expected at least {k}",
                params.len()
            )));
        }

        for step in params.iter().take(k.min(config.steps - out.len())) {
            if !step.is_valid() {
                return Err(TrainError::InvalidForecast {
                    step: out.len(),
                    mean: step.mean,
                    dispersion: step.dispersion,
                });
            }
            buffer.push(step.mean);
            out.scaled_means.push(step.mean);
            out.means.push(scaler.inverse_transform(f64::from(step.mean)));
            out.dispersions.push(step.dispersion);
        }
        tracing::trace!(produced = out.len(), total = config.steps, "rollout iteration");
    }

    Ok(out)
}
