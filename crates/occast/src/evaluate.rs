//! Partition evaluation.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use occast_core::Partition;
use occast_data::WindowDataLoader;
use occast_models::split_params;
use occast_train::ErrorAccumulator;

use crate::context::ForecastContext;
use crate::error::{PipelineError, Result};

/// Scores of the model on one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Partition evaluated.
    pub partition: Partition,
    /// Windows scored.
    pub n_windows: usize,
    /// Mean absolute error of the predicted means, in normalized units.
    pub mae: f64,
    /// Root mean squared error of the predicted means, in normalized units.
    pub rmse: f64,
    /// Mean negative log-likelihood on scaled values.
    pub nll: f64,
}

impl<B: Backend> ForecastContext<B> {
    /// Score the model on every window of `partition`.
    ///
    /// Means and targets are inverse-scaled before MAE and RMSE; the
    /// likelihood is computed on scaled values like the training loss.
    pub fn evaluate(&self, partition: Partition) -> Result<EvaluationReport> {
        let model = self.model().ok_or(PipelineError::NoModel)?;
        let dataset = self.datasets()?.take(partition);
        if dataset.is_empty() {
            return Err(PipelineError::InsufficientHistory(format!(
                "{partition} partition has no complete window"
            )));
        }

        let loader = WindowDataLoader::builder(dataset)
            .batch_size(self.config().training.batch_size)
            .partition(partition)
            .build()?;
        let device = model.device();
        let scale = self.scaler().scale();
        let min = self.scaler().min();
        let unscale = |t: Tensor<B, 2>| t.mul_scalar(scale).add_scalar(min);

        let mut errors = ErrorAccumulator::default();
        let mut nll_sum = 0.0f64;
        for batch in loader.iter::<B>(&device) {
            let batch = batch?;
            let batch_len = batch.len();
            let params = model.forward(batch.x);

            let nll: f32 = self.loss().forward(params.clone(), batch.y.clone()).into_scalar().elem();
            nll_sum += f64::from(nll) * batch_len as f64;

            let (mu, _alpha) = split_params(params);
            errors.update(unscale(mu), unscale(batch.y));
        }

        let n_windows = loader.len();
        let report = EvaluationReport {
            partition,
            n_windows,
            mae: errors.mae().unwrap_or(f64::NAN),
            rmse: errors.rmse().unwrap_or(f64::NAN),
            nll: nll_sum / n_windows as f64,
        };
        tracing::info!(
            %partition,
            windows = n_windows,
            mae = report.mae,
            rmse = report.rmse,
            nll = report.nll,
            "evaluated partition"
        );
        Ok(report)
    }
}
