//! Error types for training and prediction.

use thiserror::Error;

/// Result type alias for training operations.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that can occur during training or rollout.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Nothing to train on.
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    /// Invalid learning rate.
    #[error("Invalid learning rate: {0}")]
    InvalidLearningRate(String),

    /// Invalid trainer or rollout input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Loss became NaN or infinite.
    #[error("Non-finite loss at epoch {epoch}: {value}")]
    NonFiniteLoss {
        /// Epoch (1-based).
        epoch: usize,
        /// Offending value.
        value: f32,
    },

    /// Forecaster produced parameters outside `(0, ∞)`.
    #[error("Invalid forecast at step {step}: mean {mean}, dispersion {dispersion}")]
    InvalidForecast {
        /// Rollout step (0-based).
        step: usize,
        /// Predicted mean.
        mean: f32,
        /// Predicted dispersion.
        dispersion: f32,
    },

    /// Data error.
    #[error("Data error: {0}")]
    DataError(#[from] occast_data::DataError),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] occast_core::CoreError),
}
