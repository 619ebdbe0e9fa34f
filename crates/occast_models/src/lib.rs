//! # occast_models
//!
//! Recurrent count forecaster and model persistence.
//!
//! This crate provides:
//! - [`NbForecaster`]: stacked LSTM layers, dropout and a dense head
//!   emitting negative-binomial mean and dispersion per forecast step
//! - [`checkpoint`]: artifact directories with weights and [`ArtifactMetadata`]
//! - [`LossRegistry`]: resolves the versioned [`LossId`] stored in an artifact
//!
//! ## Example
//!
//! ```rust,ignore
//! use occast_models::NbForecasterConfig;
//!
//! let config = NbForecasterConfig::new(1, 12, 1);
//! let model = config.init::<NdArray>(&device);
//! let (mu, alpha) = model.forward_params(windows);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
mod forecaster;
mod registry;

pub use checkpoint::{
    load_artifact, save_artifact, ArtifactMetadata, CheckpointError, LoadedArtifact, TrainingSummary,
};
pub use forecaster::{
    softplus, split_params, NbForecaster, NbForecasterConfig, OutputActivation, EXP_OUTPUT_MAX, OUTPUT_MIN,
};
pub use registry::{DistributionLoss, LossConstructor, LossId, LossRegistry, RegistryError};
