//! Forecasting model traits.
//!
//! [`ForecastingModel`] is what the trainer drives on tensors.
//! [`WindowForecaster`] is the plain-slice view the autoregressive
//! predictor uses, so rollouts do not depend on a tensor backend.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Negative-binomial parameters for one forecast step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionParams {
    /// Mean count, μ > 0.
    pub mean: f32,
    /// Dispersion, α > 0.
    pub dispersion: f32,
}

impl DistributionParams {
    /// Create distribution parameters.
    #[must_use]
    pub const fn new(mean: f32, dispersion: f32) -> Self {
        Self { mean, dispersion }
    }

    /// Both parameters finite and strictly positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.dispersion.is_finite() && self.mean > 0.0 && self.dispersion > 0.0
    }

    /// Split an interleaved `[μ0, α0, μ1, α1, ...]` row into per-step parameters.
    #[must_use]
    pub fn from_interleaved(row: &[f32]) -> Vec<Self> {
        row.chunks_exact(2).map(|pair| Self::new(pair[0], pair[1])).collect()
    }
}

/// A model mapping windows to distribution parameters.
pub trait ForecastingModel<B: Backend>: Module<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input windows of shape (batch, seq_len, features)
    ///
    /// # Returns
    ///
    /// Interleaved parameters of shape (batch, 2 * horizon), all strictly positive.
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2>;

    /// Number of steps predicted per window.
    fn horizon(&self) -> usize;
}

/// A forecaster that accepts a single window as a row-major slice.
pub trait WindowForecaster {
    /// Window length expected by [`WindowForecaster::forecast`].
    fn seq_len(&self) -> usize;

    /// Features per step expected by [`WindowForecaster::forecast`].
    fn n_features(&self) -> usize;

    /// Steps predicted per call.
    fn horizon(&self) -> usize;

    /// Predict distribution parameters for the steps following `window`.
    ///
    /// `window` holds `seq_len * n_features` values, step-major.
    fn forecast(&self, window: &[f32]) -> Result<Vec<DistributionParams>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved() {
        let params = DistributionParams::from_interleaved(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(params.len(), 2);
        assert_eq!(params[1], DistributionParams::new(3.0, 4.0));
    }

    #[test]
    fn test_validity() {
        assert!(DistributionParams::new(1.0, 1.0).is_valid());
        assert!(!DistributionParams::new(0.0, 1.0).is_valid());
        assert!(!DistributionParams::new(1.0, f32::NAN).is_valid());
    }
}
