//! Negative-binomial negative log-likelihood.
//!
//! For a target count `y` with mean `μ` and dispersion `α`:
//!
//! ```text
//! log L = lgamma(y + α) - lgamma(α) - lgamma(y + 1)
//!       + α·ln α - α·ln(α + μ) + y·ln μ - y·ln(α + μ)
//! ```
//!
//! `μ` is clipped to `[1e-7, 1e6]` and `α` to `[1e-7, 100]` before the
//! formula is applied. The loss is `-mean(log L)` over batch and steps.

use burn::prelude::*;
use statrs::function::gamma::ln_gamma;

use occast_models::{split_params, DistributionLoss, LossId, LossRegistry};

/// Registered name of the negative-binomial loss.
pub const NB_LOSS_NAME: &str = "negative_binomial_nll";

/// Formula version of the negative-binomial loss.
pub const NB_LOSS_VERSION: u32 = 1;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;
const GAMMA_SHIFT: usize = 6;

/// Log-gamma of a tensor, differentiable.
///
/// Shifts the argument by 6 with `lgamma(x) = lgamma(x + 6) - Σ ln(x + i)`
/// and evaluates the Stirling series at `z = x + 6`. Arguments must be
/// positive.
pub fn lgamma<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let mut shift = x.clone().log();
    for i in 1..GAMMA_SHIFT {
        shift = shift + (x.clone() + i as f32).log();
    }

    let z = x + GAMMA_SHIFT as f32;
    let inv = z.clone().recip();
    let inv2 = inv.clone() * inv.clone();
    // 1/(12z) - 1/(360z³) + 1/(1260z⁵)
    let series = inv * ((inv2.clone() * (1.0 / 1260.0) - 1.0 / 360.0) * inv2 + 1.0 / 12.0);
    let stirling = (z.clone() - 0.5) * z.clone().log() - z + LN_SQRT_2PI as f32 + series;

    stirling - shift
}

/// How many parameters hit a clipping bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipStats {
    /// Means outside `[eps, mu_max]`.
    pub mu_clipped: usize,
    /// Dispersions outside `[eps, alpha_max]`.
    pub alpha_clipped: usize,
    /// Parameters inspected, means and dispersions together.
    pub total: usize,
}

impl ClipStats {
    /// Fraction of inspected parameters that were clipped.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.mu_clipped + self.alpha_clipped) as f32 / self.total as f32
        }
    }

    /// Add another batch's counts.
    pub fn merge(&mut self, other: ClipStats) {
        self.mu_clipped += other.mu_clipped;
        self.alpha_clipped += other.alpha_clipped;
        self.total += other.total;
    }
}

/// Negative-binomial NLL over interleaved `[μ, α]` outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegativeBinomialNll {
    /// Lower bound for μ and α.
    pub eps: f32,
    /// Upper bound for α.
    pub alpha_max: f32,
    /// Upper bound for μ.
    pub mu_max: f32,
}

impl Default for NegativeBinomialNll {
    fn default() -> Self {
        Self {
            eps: 1e-7,
            alpha_max: 100.0,
            mu_max: 1e6,
        }
    }
}

impl NegativeBinomialNll {
    /// Create the loss with the standard bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier stored alongside trained weights.
    pub fn loss_id() -> LossId {
        LossId::new(NB_LOSS_NAME, NB_LOSS_VERSION)
    }

    /// Element-wise log-likelihood of `targets` under clipped `(μ, α)`.
    pub fn log_likelihood<B: Backend>(
        &self,
        mu: Tensor<B, 2>,
        alpha: Tensor<B, 2>,
        targets: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let mu = mu.clamp(self.eps, self.mu_max);
        let alpha = alpha.clamp(self.eps, self.alpha_max);
        let y = targets;

        let log_alpha_mu = (alpha.clone() + mu.clone()).log();

        lgamma(y.clone() + alpha.clone()) - lgamma(alpha.clone()) - lgamma(y.clone() + 1.0)
            + alpha.clone() * alpha.clone().log()
            - alpha * log_alpha_mu.clone()
            + y.clone() * mu.log()
            - y * log_alpha_mu
    }

    /// Mean NLL of `params` (batch, 2H) against `targets` (batch, H).
    pub fn forward<B: Backend>(&self, params: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let (mu, alpha) = split_params(params);
        self.log_likelihood(mu, alpha, targets).mean().neg()
    }

    /// NLL per forecast step, shape (H).
    pub fn forward_per_step<B: Backend>(&self, params: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let (mu, alpha) = split_params(params);
        let horizon = mu.dims()[1];
        self.log_likelihood(mu, alpha, targets)
            .mean_dim(0)
            .neg()
            .reshape([horizon])
    }

    /// Count parameters the loss would clip.
    pub fn clip_stats<B: Backend>(&self, params: Tensor<B, 2>) -> ClipStats {
        let total = params.dims()[0] * params.dims()[1];
        let (mu, alpha) = split_params(params);

        let count = |mask: Tensor<B, 2, Bool>| -> usize {
            let n: i64 = mask.int().sum().into_scalar().elem();
            n.max(0) as usize
        };

        ClipStats {
            mu_clipped: count(mu.clone().lower_elem(self.eps)) + count(mu.greater_elem(self.mu_max)),
            alpha_clipped: count(alpha.clone().lower_elem(self.eps))
                + count(alpha.greater_elem(self.alpha_max)),
            total,
        }
    }
}

impl<B: Backend> DistributionLoss<B> for NegativeBinomialNll {
    fn id(&self) -> LossId {
        Self::loss_id()
    }

    fn forward(&self, params: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        NegativeBinomialNll::forward(self, params, targets)
    }
}

/// Scalar negative-binomial log-likelihood with the same clipping.
///
/// Uses the `statrs` log-gamma, independent of the tensor series in [`lgamma`].
pub fn nb_log_likelihood(y: f64, mu: f64, alpha: f64) -> f64 {
    let loss = NegativeBinomialNll::default();
    let mu = mu.clamp(f64::from(loss.eps), f64::from(loss.mu_max));
    let alpha = alpha.clamp(f64::from(loss.eps), f64::from(loss.alpha_max));
    let log_alpha_mu = (alpha + mu).ln();

    ln_gamma(y + alpha) - ln_gamma(alpha) - ln_gamma(y + 1.0) + alpha * alpha.ln() - alpha * log_alpha_mu
        + y * mu.ln()
        - y * log_alpha_mu
}

/// Registry holding every loss this crate can train with.
pub fn default_loss_registry<B: Backend>() -> LossRegistry<B> {
    let mut registry = LossRegistry::new();
    registry.register(NegativeBinomialNll::loss_id(), || Box::new(NegativeBinomialNll::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use burn_ndarray::NdArray;
    
    type TestBackend = NdArray;

    #[test]
    fn test_tensor_lgamma_matches_reference() {
        let device = Default::default();
        let xs = [1e-7f32, 0.01, 0.5, 1.0, 3.0, 10.0, 55.5];
        let out = lgamma(Tensor::<TestBackend, 1>::from_floats(xs, &device))
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        for (x, got) in xs.iter().zip(out) {
            let expected = ln_gamma(f64::from(*x));
            assert_relative_eq!(f64::from(got), expected, epsilon = 1e-4, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_scalar_formula() {
        // y = 0 reduces to α·ln(α / (α + μ)).
        let expected = 2.0 * (2.0f64 / 5.0).ln();
        assert_relative_eq!(nb_log_likelihood(0.0, 3.0, 2.0), expected, epsilon = 1e-8);
    }

    #[test]
    fn test_scalar_geometric_case() {
        // α = 1 is geometric with p = 1 / (1 + μ): P(y) = p (1 - p)^y.
        assert_relative_eq!(nb_log_likelihood(1.0, 1.0, 1.0), 0.25f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(nb_log_likelihood(2.0, 2.0, 1.0), (4.0f64 / 27.0).ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_loss_matches_scalar() {
        let device = Default::default();
        let params = Tensor::<TestBackend, 2>::from_floats([[2.0, 0.5, 1.0, 4.0], [0.3, 1.5, 10.0, 20.0]], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [3.0, 12.0]], &device);

        let loss: f32 = NegativeBinomialNll::new()
            .forward(params.clone(), targets.clone())
            .into_scalar()
            .elem();
        let expected = -(nb_log_likelihood(1.0, 2.0, 0.5)
            + nb_log_likelihood(0.0, 1.0, 4.0)
            + nb_log_likelihood(3.0, 0.3, 1.5)
            + nb_log_likelihood(12.0, 10.0, 20.0))
            / 4.0;
        assert_relative_eq!(f64::from(loss), expected, epsilon = 1e-4);

        let per_step = NegativeBinomialNll::new()
            .forward_per_step(params, targets)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(per_step.len(), 2);
        assert_relative_eq!((per_step[0] + per_step[1]) / 2.0, loss, epsilon = 1e-5);
    }

    #[test]
    fn test_loss_finite_at_clip_bounds() {
        let device = Default::default();
        let loss = NegativeBinomialNll::new();

        // μ and α at the lower bound with y = 0 and y > 0; zeros are clipped up.
        let params = Tensor::<TestBackend, 2>::from_floats([[1e-7, 1e-7], [0.0, 0.0], [1e-7, 1e-7]], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats([[0.0], [0.0], [5.0]], &device);
        let value: f32 = loss.forward(params, targets).into_scalar().elem();
        assert!(value.is_finite(), "loss = {value}");

        // Upper bounds.
        let params = Tensor::<TestBackend, 2>::from_floats([[1e9, 1e9]], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats([[0.0]], &device);
        let value: f32 = loss.forward(params, targets).into_scalar().elem();
        assert!(value.is_finite(), "loss = {value}");

        assert!(nb_log_likelihood(0.0, 1e-7, 1e-7).is_finite());
        assert!(nb_log_likelihood(0.0, 0.0, 0.0).is_finite());
    }

    #[test]
    fn test_clip_stats() {
        let device = Default::default();
        let params = Tensor::<TestBackend, 2>::from_floats([[0.0, 1.0, 2e6, 500.0], [1.0, 1.0, 1.0, 1.0]], &device);
        let stats = NegativeBinomialNll::new().clip_stats(params);
        assert_eq!(stats.mu_clipped, 2);
        assert_eq!(stats.alpha_clipped, 1);
        assert_eq!(stats.total, 8);
        assert_relative_eq!(stats.fraction(), 3.0 / 8.0);

        let mut merged = ClipStats::default();
        merged.merge(stats);
        merged.merge(stats);
        assert_eq!(merged.total, 16);
    }

    #[test]
    fn test_default_registry_resolves_nb() {
        let registry = default_loss_registry::<TestBackend>();
        let loss = registry.resolve(&NegativeBinomialNll::loss_id()).unwrap();
        assert_eq!(loss.id(), LossId::new("negative_binomial_nll", 1));
        assert!(registry.resolve(&LossId::new(NB_LOSS_NAME, 2)).is_err());
    }
}
