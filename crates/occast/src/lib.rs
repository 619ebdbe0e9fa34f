//! # occast
//!
//! Species-occurrence forecasting with negative-binomial recurrent models.
//!
//! occast turns raw occurrence records into per-species seasonal (or
//! monthly) series and forecasts future counts as distributions:
//!
//! - **Data**: bucketing, share-of-total and min-max normalization,
//!   windowing with lag features, calendar-year partitions
//! - **Model**: stacked LSTM with a softplus head emitting mean and
//!   dispersion per forecast step
//! - **Training**: negative-binomial NLL, Adam, early stopping
//! - **Inference**: autoregressive rollout and a structured request handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use occast::prelude::*;
//!
//! let config = PipelineConfig::default();
//! let (table, report) = aggregate_file("occurrences.json", &config.bucketing)?;
//!
//! let mut context = ForecastContext::<NdArray>::prepare(config, table)?;
//! context.train::<Autodiff<NdArray>>(&device)?;
//! context.save("artifacts/disporella")?;
//!
//! let response = handle_prediction(&context, &PredictionRequest::new("Disporella hispida", 1, 8));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod context;
pub mod error;
mod evaluate;
mod predict;
pub mod stages;

pub use config::{BucketingConfig, EmptyBucketPolicy, NormalizationConfig, PipelineConfig};
pub use context::ForecastContext;
pub use error::{PipelineError, Result};
pub use evaluate::EvaluationReport;
pub use predict::{handle_prediction, Prediction, PredictionRequest, PredictionResponse};

// Re-export member crates
pub use occast_core as core;
pub use occast_data as data;
pub use occast_models as models;
pub use occast_train as train;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use occast::prelude::*;
/// ```
pub mod prelude {
    pub use crate::stages::aggregate_file;
    pub use crate::{
        handle_prediction, EvaluationReport, ForecastContext, PipelineConfig, Prediction, PredictionRequest,
        PredictionResponse,
    };

    // Core types
    pub use occast_core::{BucketIndex, BucketKind, Epoch, Partition, PartitionPlan, Seed, YearRange};

    // Data
    pub use occast_data::{
        aggregate, read_observations_json, read_series_csv, write_series_csv, MinMaxScaler, Observation,
        SeriesTable, WindowConfig,
    };

    // Models
    pub use occast_models::{NbForecaster, NbForecasterConfig};

    // Training
    pub use occast_train::{rollout, ForecastTrainer, NegativeBinomialNll, RolloutConfig, TrainerConfig};
}
