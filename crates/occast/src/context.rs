//! Explicit pipeline state.
//!
//! A [`ForecastContext`] is built once per run from a [`SeriesTable`] and a
//! [`PipelineConfig`]. It owns the dense normalized and scaled series, the
//! fitted scaler and, once trained or loaded, the model. Every later stage
//! borrows it read-only.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use occast_core::{BucketIndex, BucketKind, Epoch};
use occast_data::{
    locate_dense, MinMaxScaler, PartitionBounds, SeriesTable, WindowDataLoaders, WindowDatasets,
};
use occast_models::{
    load_artifact, save_artifact, ArtifactMetadata, DistributionLoss, NbForecaster, TrainingSummary,
};
use occast_train::{default_loss_registry, ForecastTrainer, NegativeBinomialNll};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::stages::{align_kind, build_datasets, fit_scaler, normalize, scale, NormalizedSeries};

/// Pipeline state shared by training, evaluation and prediction.
pub struct ForecastContext<B: Backend> {
    config: PipelineConfig,
    epoch: Epoch,
    table: SeriesTable,
    normalized: NormalizedSeries,
    scaler: MinMaxScaler,
    scaled: BTreeMap<String, Vec<f32>>,
    model: Option<NbForecaster<B>>,
    loss: Box<dyn DistributionLoss<B>>,
    training: Option<TrainingSummary>,
}

impl<B: Backend> std::fmt::Debug for ForecastContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastContext")
            .field("species", &self.scaled.len())
            .field("range", &self.normalized.range)
            .field("scaler", &self.scaler)
            .field("loss", &self.loss.id())
            .field("has_model", &self.model.is_some())
            .finish()
    }
}

impl<B: Backend> ForecastContext<B> {
    /// Normalize `table`, fit the scaler on the whole series and scale it.
    ///
    /// A monthly table is summed into seasons when the config asks for seasons.
    pub fn prepare(config: PipelineConfig, table: SeriesTable) -> Result<Self> {
        Self::build(config, table, None)
    }

    fn build(config: PipelineConfig, table: SeriesTable, scaler: Option<MinMaxScaler>) -> Result<Self> {
        config.validate()?;
        let epoch = config.bucketing.epoch()?;
        let table = align_kind(table, config.bucketing.kind)?;
        let normalized = normalize(&table, &config.normalization)?;
        let scaler = match scaler {
            Some(scaler) => scaler,
            None => fit_scaler(&normalized)?,
        };
        let scaled = scale(&normalized, &scaler);

        tracing::info!(
            species = scaled.len(),
            buckets = normalized.len(),
            min = scaler.min(),
            max = scaler.max(),
            "prepared forecast context"
        );

        Ok(Self {
            config,
            epoch,
            table,
            normalized,
            scaler,
            scaled,
            model: None,
            loss: Box::new(NegativeBinomialNll::new()),
            training: None,
        })
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Epoch of bucket 0.
    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    /// Bucket width.
    pub fn kind(&self) -> BucketKind {
        self.config.bucketing.kind
    }

    /// Raw counts after bucket alignment.
    pub fn table(&self) -> &SeriesTable {
        &self.table
    }

    /// Fitted scaler.
    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    /// Buckets covered by every dense series.
    pub fn bucket_range(&self) -> RangeInclusive<BucketIndex> {
        self.normalized.range.clone()
    }

    /// Species in table order.
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.scaled.keys().map(String::as_str)
    }

    /// Dense normalized values of a species, before scaling.
    pub fn normalized(&self, species: &str) -> Option<&[f64]> {
        self.normalized.values.get(species).map(Vec::as_slice)
    }

    /// Dense scaled values of a species.
    pub fn scaled(&self, species: &str) -> Option<&[f32]> {
        self.scaled.get(species).map(Vec::as_slice)
    }

    /// Trained or loaded model.
    pub fn model(&self) -> Option<&NbForecaster<B>> {
        self.model.as_ref()
    }

    /// Replace the model.
    pub fn set_model(&mut self, model: NbForecaster<B>) {
        self.model = Some(model);
    }

    /// Loss used for evaluation, resolved from the artifact when loaded.
    pub fn loss(&self) -> &dyn DistributionLoss<B> {
        self.loss.as_ref()
    }

    /// Summary of the last training run.
    pub fn training_summary(&self) -> Option<&TrainingSummary> {
        self.training.as_ref()
    }

    /// Partition positions in the dense series.
    pub fn bounds(&self) -> Result<PartitionBounds> {
        Ok(locate_dense(
            *self.normalized.range.start(),
            self.normalized.len(),
            &self.epoch,
            self.kind(),
            &self.config.partition,
        )?)
    }

    /// Window every species within each partition.
    pub fn datasets(&self) -> Result<WindowDatasets> {
        build_datasets(&self.scaled, &self.bounds()?, &self.config.windowing)
    }

    /// First bucket of the forecast start year.
    pub fn forecast_start(&self) -> BucketIndex {
        self.epoch
            .first_bucket_of_year(self.kind(), self.config.forecast_start_year)
    }

    /// Number of dense positions strictly before the forecast start.
    pub fn history_len(&self) -> usize {
        let first = *self.normalized.range.start();
        let start = self.forecast_start();
        if start <= first {
            return 0;
        }
        (first.distance_to(start) as usize).min(self.normalized.len())
    }

    /// Train a fresh forecaster on the training partition.
    ///
    /// The validation partition is only monitored. The trained weights
    /// are kept in the context on the inference backend.
    pub fn train<AB>(&mut self, device: &AB::Device) -> Result<TrainingSummary>
    where
        AB: AutodiffBackend<InnerBackend = B>,
    {
        let datasets = self.datasets()?;
        let dls = WindowDataLoaders::new(datasets.train, datasets.valid, self.config.training.batch_size)?;

        AB::seed(self.config.training.seed.derive("init").value());
        let model = self.config.model_config().init::<AB>(device);
        let trainer = ForecastTrainer::<AB>::new(self.config.training.clone(), device.clone());
        let output = trainer.fit(model, &dls)?;

        let summary = TrainingSummary {
            epochs_run: output.epochs_run(),
            best_epoch: output.best_epoch,
            best_valid_loss: output.best_valid_loss,
            final_train_loss: output.train_losses.last().copied(),
        };
        self.model = Some(output.model.valid());
        self.loss = Box::new(NegativeBinomialNll::new());
        self.training = Some(summary.clone());
        Ok(summary)
    }

    /// Save weights, scaler, config and loss identifier into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let model = self.model.as_ref().ok_or(PipelineError::NoModel)?;
        let metadata = ArtifactMetadata::new(self.loss.id(), self.config.model_config(), self.scaler)
            .with_pipeline(&self.config)?
            .with_training(self.training.clone().unwrap_or_default());
        Ok(save_artifact(dir, model, &metadata)?)
    }

    /// Restore a context from an artifact and the series it forecasts.
    ///
    /// The stored scaler is applied to `table` unmodified.
    pub fn load(dir: impl AsRef<Path>, table: SeriesTable, device: &B::Device) -> Result<Self> {
        let artifact = load_artifact::<B>(dir, &default_loss_registry::<B>(), device)?;
        let config: PipelineConfig = if artifact.metadata.pipeline.is_null() {
            PipelineConfig::default()
        } else {
            serde_json::from_value(artifact.metadata.pipeline.clone())?
        };

        if config.model_config() != artifact.metadata.model {
            return Err(PipelineError::InvalidConfig(
                "stored model does not match the stored pipeline windowing".to_string(),
            ));
        }

        let mut context = Self::build(config, table, Some(artifact.metadata.scaler))?;
        context.model = Some(artifact.model);
        context.loss = artifact.loss;
        context.training = Some(artifact.metadata.training);
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use occast_core::{PartitionPlan, YearRange};

    type TestBackend = NdArray;

    fn b(v: u32) -> BucketIndex {
        BucketIndex::new(v)
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.bucketing.base_year = 2000;
        config.bucketing.kind = BucketKind::Month;
        config.normalization.share_of_total = false;
        config.windowing = occast_data::WindowConfig::new(3, 1);
        config.partition = PartitionPlan {
            train: YearRange::new(2000, 2000),
            valid: YearRange::new(2001, 2001),
            test: YearRange::new(2002, 2002),
        };
        config.model = config.model.with_hidden_size(4).with_n_layers(1).with_dropout(0.0);
        config.training.n_epochs = 2;
        config.forecast_start_year = 2002;
        config
    }

    fn table() -> SeriesTable {
        let mut table = SeriesTable::new(BucketKind::Month);
        for month in 1..36 {
            table.add_count("a", b(month), u64::from(month % 5));
        }
        table.add_count("b", b(10), 4);
        table
    }

    #[test]
    fn test_prepare() {
        let context = ForecastContext::<TestBackend>::prepare(config(), table()).unwrap();
        assert_eq!(context.bucket_range(), b(1)..=b(35));
        assert_eq!(context.species().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(context.scaler().max(), 4.0);
        assert_eq!(context.normalized("b").unwrap()[9], 4.0);
        assert_eq!(context.scaled("b").unwrap()[9], 1.0);
        assert_eq!(context.forecast_start(), b(24));
        assert_eq!(context.history_len(), 23);
        assert!(context.model().is_none());
    }

    #[test]
    fn test_datasets_follow_partitions() {
        let context = ForecastContext::<TestBackend>::prepare(config(), table()).unwrap();
        let bounds = context.bounds().unwrap();
        // bucket 0 never observed, so the dense series starts at bucket 1
        assert_eq!(bounds.range(occast_core::Partition::Train), 0..=10);

        let sets = context.datasets().unwrap();
        assert_eq!(sets.train.len(), 2 * (11 - 3));
        assert_eq!(sets.valid.len(), 2 * (12 - 3));
    }

    #[test]
    fn test_save_requires_model() {
        let dir = tempfile::tempdir().unwrap();
        let context = ForecastContext::<TestBackend>::prepare(config(), table()).unwrap();
        assert!(matches!(context.save(dir.path()), Err(PipelineError::NoModel)));
    }

    #[test]
    fn test_train_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let mut context = ForecastContext::<TestBackend>::prepare(config(), table()).unwrap();
        let summary = context.train::<Autodiff<TestBackend>>(&device).unwrap();
        assert_eq!(summary.epochs_run, 2);
        assert!(summary.final_train_loss.unwrap().is_finite());
        context.save(dir.path()).unwrap();

        let loaded = ForecastContext::<TestBackend>::load(dir.path(), table(), &device).unwrap();
        assert_eq!(loaded.config(), context.config());
        assert_eq!(loaded.scaler(), context.scaler());
        assert_eq!(loaded.training_summary(), Some(&summary));
        assert_eq!(loaded.loss().id(), NegativeBinomialNll::loss_id());
        assert!(loaded.model().is_some());
    }

    #[test]
    fn test_load_keeps_stored_scaler() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mut context = ForecastContext::<TestBackend>::prepare(config(), table()).unwrap();
        context.train::<Autodiff<TestBackend>>(&device).unwrap();
        context.save(dir.path()).unwrap();

        let mut bigger = table();
        bigger.add_count("b", b(11), 40);
        let loaded = ForecastContext::<TestBackend>::load(dir.path(), bigger, &device).unwrap();
        assert_eq!(loaded.scaler().max(), 4.0);
        assert_eq!(loaded.scaled("b").unwrap()[10], 10.0);
    }
}
