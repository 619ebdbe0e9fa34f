//! Training loop for negative-binomial forecasters.
//!
//! Batches are taken in dataset order. The validation loader is only
//! used for monitoring, best-model selection and early stopping.

use std::time::Instant;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use occast_core::{ForecastingModel, Seed};
use occast_data::WindowDataLoaders;

use crate::error::{Result, TrainError};
use crate::losses::{ClipStats, NegativeBinomialNll};
use crate::scheduler::{Scheduler, SchedulerKind};

/// Configuration for [`ForecastTrainer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of epochs.
    pub n_epochs: usize,
    /// Windows per batch.
    pub batch_size: usize,
    /// Base learning rate.
    pub lr: f64,
    /// Weight decay (0 = disabled).
    pub weight_decay: f32,
    /// Gradient norm clipping (0 = disabled).
    pub grad_clip_norm: f32,
    /// Learning rate schedule.
    pub scheduler: SchedulerKind,
    /// Early stopping patience in epochs (0 = disabled).
    pub early_stopping_patience: usize,
    /// Minimum validation improvement that resets patience.
    pub early_stopping_min_delta: f32,
    /// Clipped-parameter fraction above which an epoch is reported.
    pub clip_warn_fraction: f32,
    /// Seed for weight initialisation and dropout.
    pub seed: Seed,
    /// Report each epoch at info level instead of debug.
    pub verbose: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_epochs: 100,
            batch_size: 8,
            lr: 1e-3,
            weight_decay: 0.0,
            grad_clip_norm: 1.0,
            scheduler: SchedulerKind::Constant,
            early_stopping_patience: 0,
            early_stopping_min_delta: 1e-4,
            clip_warn_fraction: 0.05,
            seed: Seed::default(),
            verbose: false,
        }
    }
}

impl TrainerConfig {
    /// Check rates and sizes.
    pub fn validate(&self) -> Result<()> {
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(TrainError::InvalidLearningRate(format!(
                "learning rate must be positive, got {}",
                self.lr
            )));
        }
        if self.batch_size == 0 {
            return Err(TrainError::InvalidInput("batch_size must be at least 1".to_string()));
        }
        if self.weight_decay < 0.0 || self.grad_clip_norm < 0.0 {
            return Err(TrainError::InvalidInput(
                "weight_decay and grad_clip_norm must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Training output with per-epoch history and the selected model.
#[derive(Debug)]
pub struct TrainingOutput<M> {
    /// Model with the lowest validation loss, or the final model without validation.
    pub model: M,
    /// Training loss per epoch.
    pub train_losses: Vec<f32>,
    /// Validation loss per epoch; empty when there is no validation data.
    pub valid_losses: Vec<f32>,
    /// Fraction of clipped parameters per epoch.
    pub clip_fractions: Vec<f32>,
    /// Lowest validation loss.
    pub best_valid_loss: Option<f32>,
    /// Epoch (0-based) of the lowest validation loss.
    pub best_epoch: Option<usize>,
    /// Wall-clock training time.
    pub training_time_secs: f64,
}

impl<M> TrainingOutput<M> {
    /// Epochs actually run.
    #[must_use]
    pub fn epochs_run(&self) -> usize {
        self.train_losses.len()
    }
}

/// Trainer minimizing the negative-binomial NLL.
pub struct ForecastTrainer<B: AutodiffBackend> {
    config: TrainerConfig,
    loss: NegativeBinomialNll,
    device: B::Device,
}

impl<B: AutodiffBackend> ForecastTrainer<B> {
    /// Create a new trainer.
    pub fn new(config: TrainerConfig, device: B::Device) -> Self {
        Self {
            config,
            loss: NegativeBinomialNll::default(),
            device,
        }
    }

    /// Trainer configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train `model` on `dls.train()` and monitor on `dls.valid()`.
    ///
    /// # Errors
    ///
    /// - [`TrainError::InsufficientHistory`] if the training loader is empty.
    /// - [`TrainError::NonFiniteLoss`] if the loss diverges.
    pub fn fit<M>(&self, model: M, dls: &WindowDataLoaders) -> Result<TrainingOutput<M>>
    where
        M: AutodiffModule<B> + ForecastingModel<B>,
        M::InnerModule: ForecastingModel<B::InnerBackend>,
    {
        self.config.validate()?;
        if dls.train().is_empty() {
            return Err(TrainError::InsufficientHistory(
                "training partition produced no windows".to_string(),
            ));
        }

        let start_time = Instant::now();
        B::seed(self.config.seed.derive("train").value());

        let mut optimizer_config = AdamConfig::new();
        if self.config.weight_decay > 0.0 {
            optimizer_config =
                optimizer_config.with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay)));
        }
        if self.config.grad_clip_norm > 0.0 {
            optimizer_config =
                optimizer_config.with_grad_clipping(Some(GradientClippingConfig::Norm(self.config.grad_clip_norm)));
        }
        let mut optim = optimizer_config.init::<B, M>();

        let total_steps = self.config.n_epochs * dls.train().n_batches();
        let scheduler = self.config.scheduler.build(self.config.lr, total_steps);

        let mut train_losses = Vec::with_capacity(self.config.n_epochs);
        let mut valid_losses = Vec::with_capacity(self.config.n_epochs);
        let mut clip_fractions = Vec::with_capacity(self.config.n_epochs);

        let mut best_model = None;
        let mut best_valid_loss = f32::INFINITY;
        let mut best_epoch = None;
        let mut epochs_without_improvement = 0;
        let early_stopping_enabled = self.config.early_stopping_patience > 0 && !dls.valid().is_empty();

        let mut current_model = model;
        let mut global_step = 0;

        tracing::info!(
            epochs = self.config.n_epochs,
            train_windows = dls.train().len(),
            valid_windows = dls.valid().len(),
            batch_size = dls.batch_size(),
            scheduler = scheduler.name(),
            "starting training"
        );

        for epoch in 0..self.config.n_epochs {
            let (model, train_loss, clip) =
                self.train_epoch(current_model, &mut optim, dls, scheduler.as_ref(), &mut global_step)?;
            current_model = model;

            if !train_loss.is_finite() {
                return Err(TrainError::NonFiniteLoss {
                    epoch: epoch + 1,
                    value: train_loss,
                });
            }
            train_losses.push(train_loss);
            clip_fractions.push(clip.fraction());

            if clip.fraction() > self.config.clip_warn_fraction {
                tracing::warn!(
                    epoch = epoch + 1,
                    mu_clipped = clip.mu_clipped,
                    alpha_clipped = clip.alpha_clipped,
                    total = clip.total,
                    "distribution parameters hitting clipping bounds"
                );
            }

            let valid_loss = self.valid_epoch(&current_model, dls)?;
            let mut improved = false;
            if let Some(valid_loss) = valid_loss {
                valid_losses.push(valid_loss);
                improved = valid_loss < best_valid_loss - self.config.early_stopping_min_delta;
                if improved {
                    best_valid_loss = valid_loss;
                    best_epoch = Some(epoch);
                    best_model = Some(current_model.clone());
                    epochs_without_improvement = 0;
                } else {
                    epochs_without_improvement += 1;
                }
            }

            if self.config.verbose {
                tracing::info!(epoch = epoch + 1, train_loss, ?valid_loss, improved, "epoch complete");
            } else {
                tracing::debug!(epoch = epoch + 1, train_loss, ?valid_loss, improved, "epoch complete");
            }

            if early_stopping_enabled && epochs_without_improvement >= self.config.early_stopping_patience {
                tracing::info!(
                    epoch = epoch + 1,
                    patience = self.config.early_stopping_patience,
                    "early stopping"
                );
                break;
            }
        }

        let training_time_secs = start_time.elapsed().as_secs_f64();
        let best_valid_loss = best_epoch.map(|_| best_valid_loss);
        tracing::info!(
            epochs = train_losses.len(),
            ?best_epoch,
            ?best_valid_loss,
            secs = training_time_secs,
            "training complete"
        );

        Ok(TrainingOutput {
            model: best_model.unwrap_or(current_model),
            train_losses,
            valid_losses,
            clip_fractions,
            best_valid_loss,
            best_epoch,
            training_time_secs,
        })
    }

    fn train_epoch<M, O>(
        &self,
        mut model: M,
        optim: &mut O,
        dls: &WindowDataLoaders,
        scheduler: &dyn Scheduler,
        global_step: &mut usize,
    ) -> Result<(M, f32, ClipStats)>
    where
        M: AutodiffModule<B> + ForecastingModel<B>,
        O: Optimizer<M, B>,
    {
        let mut total_loss = 0.0f32;
        let mut n_windows = 0;
        let mut clip = ClipStats::default();

        for batch_result in dls.train().iter::<B>(&self.device) {
            let batch = batch_result?;
            let batch_len = batch.len();
            let lr = scheduler.get_lr(*global_step);

            let params = model.forward(batch.x);
            clip.merge(self.loss.clip_stats(params.clone()));

            let loss = self.loss.forward(params, batch.y);
            total_loss += loss.clone().into_scalar().elem::<f32>() * batch_len as f32;
            n_windows += batch_len;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(lr, model, grads);
            *global_step += 1;
        }

        Ok((model, total_loss / n_windows.max(1) as f32, clip))
    }

    fn valid_epoch<M>(&self, model: &M, dls: &WindowDataLoaders) -> Result<Option<f32>>
    where
        M: AutodiffModule<B>,
        M::InnerModule: ForecastingModel<B::InnerBackend>,
    {
        if dls.valid().is_empty() {
            return Ok(None);
        }

        let inner_model = model.clone().valid();
        let inner_device: <B::InnerBackend as Backend>::Device = self.device.clone();

        let mut total_loss = 0.0f32;
        let mut n_windows = 0;
        for batch_result in dls.valid().iter::<B::InnerBackend>(&inner_device) {
            let batch = batch_result?;
            let batch_len = batch.len();
            let params = inner_model.forward(batch.x);
            total_loss += self.loss.forward(params, batch.y).into_scalar().elem::<f32>() * batch_len as f32;
            n_windows += batch_len;
        }

        Ok(Some(total_loss / n_windows.max(1) as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use ndarray::{Array2, Array3};
    use occast_data::WindowDataset;
    use occast_models::NbForecasterConfig;

    type TrainBackend = Autodiff<NdArray>;

    fn constant_dataset(n: usize, target: f32) -> WindowDataset {
        let x = Array3::from_elem((n, 4, 1), 0.5f32);
        let y = Array2::from_elem((n, 1), target);
        WindowDataset::from_arrays(x, y).unwrap()
    }

    fn small_model(device: &<TrainBackend as Backend>::Device) -> occast_models::NbForecaster<TrainBackend> {
        NbForecasterConfig::new(1, 4, 1)
            .with_hidden_size(4)
            .with_n_layers(1)
            .with_dropout(0.0)
            .init::<TrainBackend>(device)
    }

    #[test]
    fn test_config_defaults() {
        let config = TrainerConfig::default();
        assert_eq!(config.n_epochs, 100);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.lr, 1e-3);
        assert_eq!(config.grad_clip_norm, 1.0);
        assert_eq!(config.seed, Seed::new(42));
        assert!(config.validate().is_ok());
        assert!(TrainerConfig { lr: 0.0, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_fit_reduces_loss() {
        let device = Default::default();
        let dls = WindowDataLoaders::new(constant_dataset(16, 3.0), constant_dataset(4, 3.0), 8).unwrap();
        let config = TrainerConfig {
            n_epochs: 40,
            lr: 1e-2,
            ..Default::default()
        };

        let output = ForecastTrainer::<TrainBackend>::new(config, device)
            .fit(small_model(&device), &dls)
            .unwrap();

        assert_eq!(output.epochs_run(), 40);
        assert_eq!(output.valid_losses.len(), 40);
        assert_eq!(output.clip_fractions.len(), 40);
        assert!(output.train_losses.iter().all(|l| l.is_finite()));
        assert!(output.train_losses[39] < output.train_losses[0]);
        assert!(output.best_epoch.is_some());
        assert!(output.best_valid_loss.unwrap() <= output.valid_losses[0]);
    }

    #[test]
    fn test_fit_without_validation() {
        let device = Default::default();
        let dls = WindowDataLoaders::new(constant_dataset(5, 1.0), WindowDataset::empty(4, 1, 1), 2).unwrap();
        let config = TrainerConfig {
            n_epochs: 2,
            early_stopping_patience: 1,
            ..Default::default()
        };

        let output = ForecastTrainer::<TrainBackend>::new(config, device)
            .fit(small_model(&device), &dls)
            .unwrap();
        assert_eq!(output.epochs_run(), 2);
        assert!(output.valid_losses.is_empty());
        assert_eq!(output.best_epoch, None);
    }

    #[test]
    fn test_empty_training_set() {
        let device = Default::default();
        let dls = WindowDataLoaders::new(WindowDataset::empty(4, 1, 1), constant_dataset(2, 1.0), 8).unwrap();
        let result = ForecastTrainer::<TrainBackend>::new(TrainerConfig::default(), device).fit(small_model(&device), &dls);
        assert!(matches!(result, Err(TrainError::InsufficientHistory(_))));
    }
}
