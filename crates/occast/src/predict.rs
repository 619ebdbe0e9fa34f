//! Prediction requests.
//!
//! [`ForecastContext::predict`] is the numeric entry point: it rolls the
//! model forward from the forecast start and pairs the trajectory with any
//! observed values. [`handle_prediction`] wraps it for external callers and
//! never fails; every error becomes a structured failure response.

use std::panic::{catch_unwind, AssertUnwindSafe};

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use occast_core::BucketIndex;
use occast_train::{rollout, RolloutConfig};

use crate::context::ForecastContext;
use crate::error::{PipelineError, Result};

/// A forecast request from an external caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    /// Species to forecast.
    pub species_name: String,
    /// Predicted means fed back per model call.
    pub steps_per_prediction: usize,
    /// Number of future buckets to forecast.
    pub total_predictions: usize,
}

impl PredictionRequest {
    /// Create a request.
    pub fn new(species_name: impl Into<String>, steps_per_prediction: usize, total_predictions: usize) -> Self {
        Self {
            species_name: species_name.into(),
            steps_per_prediction,
            total_predictions,
        }
    }
}

/// Forecast trajectory with the history it continues.
///
/// All values are in normalized units (shares, or raw counts when
/// share-of-total is off), ready for a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Species forecast.
    pub species_name: String,
    /// First bucket of the history.
    pub history_start: BucketIndex,
    /// Known values before the forecast start.
    pub history: Vec<f64>,
    /// First forecast bucket.
    pub start_bucket: BucketIndex,
    /// Predicted means, one per bucket from `start_bucket`.
    pub predicted: Vec<f64>,
    /// Dispersion reported with each predicted mean.
    pub dispersions: Vec<f32>,
    /// Observed values over the forecast buckets, possibly shorter than `predicted`.
    pub actual: Vec<f64>,
}

/// Serializable outcome of [`handle_prediction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    /// Whether a prediction was produced.
    pub success: bool,
    /// The prediction on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
    /// Human-readable reason on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResponse {
    /// Successful response.
    pub fn ok(prediction: Prediction) -> Self {
        Self {
            success: true,
            prediction: Some(prediction),
            error: None,
        }
    }

    /// Failure response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            prediction: None,
            error: Some(error.into()),
        }
    }
}

impl<B: Backend> ForecastContext<B> {
    /// Forecast `total_predictions` buckets from the configured start year.
    ///
    /// The rolling window is seeded with the last known scaled values before
    /// the forecast start. A start year past the end of the series continues
    /// from the last observed bucket, and `start_bucket` reports where the
    /// trajectory actually begins.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidInput`] for a zero step count.
    /// - [`PipelineError::UnknownSpecies`] if the species is not in the table.
    /// - [`PipelineError::NoModel`] before training or loading.
    /// - [`PipelineError::InsufficientHistory`] with fewer than `L` known values.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        if request.total_predictions == 0 || request.steps_per_prediction == 0 {
            return Err(PipelineError::InvalidInput(
                "stepsPerPrediction and totalPredictions must be at least 1".to_string(),
            ));
        }
        let species = request.species_name.as_str();
        let (Some(scaled), Some(normalized)) = (self.scaled(species), self.normalized(species)) else {
            return Err(PipelineError::UnknownSpecies(species.to_string()));
        };
        let model = self.model().ok_or(PipelineError::NoModel)?;

        let history_len = self.history_len();
        let seq_len = self.config().windowing.seq_len;
        if history_len < seq_len {
            return Err(PipelineError::InsufficientHistory(format!(
                "{species} has {history_len} buckets before {}, the window needs {seq_len}",
                self.config().forecast_start_year
            )));
        }

        let config = RolloutConfig::new(request.total_predictions)
            .with_steps_per_iteration(request.steps_per_prediction);
        let lags = self.config().windowing.normalized_lags();
        let trajectory = rollout(model, &scaled[..history_len], &lags, self.scaler(), &config)?;

        let history_start = *self.bucket_range().start();
        let start_bucket = history_start.offset(history_len as u32);
        if start_bucket != self.forecast_start() {
            tracing::warn!(
                species,
                requested = %self.forecast_start(),
                start = %start_bucket,
                "forecast start is past the series, continuing from its end"
            );
        }

        let actual_end = (history_len + request.total_predictions).min(normalized.len());
        let prediction = Prediction {
            species_name: species.to_string(),
            history_start,
            history: normalized[..history_len].to_vec(),
            start_bucket,
            predicted: trajectory.means,
            dispersions: trajectory.dispersions,
            actual: normalized[history_len..actual_end].to_vec(),
        };

        tracing::info!(
            species,
            start = %prediction.start_bucket,
            predicted = prediction.predicted.len(),
            actual = prediction.actual.len(),
            "forecast complete"
        );
        Ok(prediction)
    }
}

/// Answer a prediction request, converting every failure into a response.
pub fn handle_prediction<B: Backend>(context: &ForecastContext<B>, request: &PredictionRequest) -> PredictionResponse {
    match catch_unwind(AssertUnwindSafe(|| context.predict(request))) {
        Ok(Ok(prediction)) => PredictionResponse::ok(prediction),
        Ok(Err(e)) => {
            tracing::warn!(species = %request.species_name, error = %e, "prediction failed");
            PredictionResponse::failure(e.to_string())
        }
        Err(_) => {
            tracing::error!(species = %request.species_name, "prediction panicked");
            PredictionResponse::failure("internal error while forecasting")
        }
    }
}
