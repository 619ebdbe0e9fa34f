//! Error types for the forecasting pipeline.

use thiserror::Error;

/// Errors raised while preparing, training or querying a [`crate::ForecastContext`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid pipeline configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Too little data to window or forecast.
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    /// Species missing from the series table.
    #[error("Unknown species: {0}")]
    UnknownSpecies(String),

    /// A model is required but none was trained or loaded.
    #[error("No trained model in context")]
    NoModel,

    /// Core error.
    #[error(transparent)]
    Core(#[from] occast_core::CoreError),

    /// Data error.
    #[error(transparent)]
    Data(#[from] occast_data::DataError),

    /// Checkpoint error.
    #[error(transparent)]
    Checkpoint(#[from] occast_models::CheckpointError),

    /// Training or rollout error.
    #[error(transparent)]
    Train(#[from] occast_train::TrainError),

    /// Config file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
