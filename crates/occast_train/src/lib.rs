//! # occast_train
//!
//! Loss, training loop, metrics and autoregressive rollout for occast.
//!
//! This crate provides:
//! - [`NegativeBinomialNll`] with a differentiable tensor lgamma and
//!   parameter clipping statistics
//! - [`ForecastTrainer`] for Adam training with early stopping and
//!   best-model selection
//! - Learning rate schedulers (constant, one-cycle, cosine)
//! - [`ErrorAccumulator`] for MAE and RMSE over batches
//! - [`rollout`] for multi-step forecasts that feed predicted means back
//!
//! ## Example
//!
//! ```rust,ignore
//! use occast_train::{ForecastTrainer, TrainerConfig};
//! use occast_models::NbForecasterConfig;
//!
//! let model = NbForecasterConfig::new(1, 12, 1).init::<Autodiff<NdArray>>(&device);
//! let output = ForecastTrainer::new(TrainerConfig::default(), device).fit(model, &dls)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod losses;
pub mod metrics;
pub mod predictor;
pub mod scheduler;
pub mod training;

pub use error::{Result, TrainError};
pub use losses::{
    default_loss_registry, lgamma, nb_log_likelihood, ClipStats, NegativeBinomialNll, NB_LOSS_NAME,
    NB_LOSS_VERSION,
};
pub use metrics::ErrorAccumulator;
pub use predictor::{rollout, Rollout, RolloutConfig};
pub use scheduler::{ConstantLR, CosineAnnealingLR, OneCycleLR, Scheduler, SchedulerKind};
pub use training::{ForecastTrainer, TrainerConfig, TrainingOutput};
