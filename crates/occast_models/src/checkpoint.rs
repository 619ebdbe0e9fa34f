//! Model checkpointing and trained artifacts.
//!
//! An artifact is a directory holding:
//!
//! - `model.mpk`: weights in Burn's named MessagePack format
//! - `artifact.json`: [`ArtifactMetadata`] with the loss identifier, model
//!   configuration, fitted scaler and pipeline configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use occast_models::checkpoint::{load_artifact, save_artifact, ArtifactMetadata};
//!
//! save_artifact(&dir, &model, &metadata)?;
//! let loaded = load_artifact::<NdArray>(&dir, &registry, &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{Deserialize, Serialize};

use occast_data::MinMaxScaler;

use crate::forecaster::{NbForecaster, NbForecasterConfig};
use crate::registry::{DistributionLoss, LossId, LossRegistry, RegistryError};

/// Current artifact layout version.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Weights file inside an artifact directory.
pub const MODEL_FILE: &str = "model.mpk";

/// Metadata file inside an artifact directory.
pub const METADATA_FILE: &str = "artifact.json";

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Invalid format.
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),

    /// Stored loss identifier could not be resolved.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Save a module's weights.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), path.as_ref().to_path_buf())
        .map_err(|e| CheckpointError::Save(e.to_string()))
}

/// Load a module record saved by [`save_model`].
pub fn load_record<B, M>(path: impl AsRef<Path>, device: &B::Device) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .load(path.as_ref().to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Summary of the training run that produced an artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Epochs actually run.
    pub epochs_run: usize,
    /// Epoch with the lowest validation loss, if validation ran.
    pub best_epoch: Option<usize>,
    /// Lowest validation loss.
    pub best_valid_loss: Option<f32>,
    /// Training loss of the final epoch.
    pub final_train_loss: Option<f32>,
}

/// Everything besides the weights needed to reuse a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Artifact layout version.
    pub format_version: u32,
    /// Loss the weights were trained with.
    pub loss: LossId,
    /// Model architecture.
    pub model: NbForecasterConfig,
    /// Scaler fitted on the full series.
    pub scaler: MinMaxScaler,
    /// Pipeline configuration as JSON.
    pub pipeline: serde_json::Value,
    /// Training statistics.
    #[serde(default)]
    pub training: TrainingSummary,
}

impl ArtifactMetadata {
    /// Create metadata for a model.
    pub fn new(loss: LossId, model: NbForecasterConfig, scaler: MinMaxScaler) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            loss,
            model,
            scaler,
            pipeline: serde_json::Value::Null,
            training: TrainingSummary::default(),
        }
    }

    /// Set the pipeline configuration.
    pub fn with_pipeline<C: Serialize>(mut self, pipeline: &C) -> Result<Self> {
        self.pipeline = serde_json::to_value(pipeline).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(self)
    }

    /// Set the training summary.
    #[must_use]
    pub fn with_training(mut self, training: TrainingSummary) -> Self {
        self.training = training;
        self
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        let metadata: Self = serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))?;
        if metadata.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(CheckpointError::InvalidFormat(format!(
                "artifact format version {} (expected {})",
                metadata.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        Ok(metadata)
    }
}

/// A model restored from an artifact directory.
pub struct LoadedArtifact<B: Backend> {
    /// Restored model.
    pub model: NbForecaster<B>,
    /// Stored metadata.
    pub metadata: ArtifactMetadata,
    /// Loss resolved from the stored identifier.
    pub loss: Box<dyn DistributionLoss<B>>,
}

/// Write weights and metadata into `dir`, creating it if needed.
pub fn save_artifact<B: Backend>(
    dir: impl AsRef<Path>,
    model: &NbForecaster<B>,
    metadata: &ArtifactMetadata,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| CheckpointError::Save(e.to_string()))?;
    save_model::<B, _>(model, dir.join(MODEL_FILE))?;
    metadata.save(dir.join(METADATA_FILE))?;

    tracing::info!(dir = %dir.display(), loss = %metadata.loss, "saved artifact");
    Ok(dir.to_path_buf())
}

/// Restore a model from `dir`, resolving its loss through `registry`.
///
/// # Errors
///
/// Returns [`CheckpointError::Registry`] if the stored loss is unknown.
pub fn load_artifact<B: Backend>(
    dir: impl AsRef<Path>,
    registry: &LossRegistry<B>,
    device: &B::Device,
) -> Result<LoadedArtifact<B>> {
    let dir = dir.as_ref();
    let metadata = ArtifactMetadata::load(dir.join(METADATA_FILE))?;
    let loss = registry.resolve(&metadata.loss)?;

    let record = load_record::<B, NbForecaster<B>>(dir.join(MODEL_FILE), device)?;
    let model = metadata.model.init::<B>(device).load_record(record);

    tracing::info!(dir = %dir.display(), loss = %metadata.loss, "loaded artifact");
    Ok(LoadedArtifact { model, metadata, loss })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    struct MeanOnly;

    impl<B: Backend> DistributionLoss<B> for MeanOnly {
        fn id(&self) -> LossId {
            LossId::new("mean_only", 1)
        }

        fn forward(&self, params: Tensor<B, 2>, _targets: Tensor<B, 2>) -> Tensor<B, 1> {
            params.mean()
        }
    }

    fn metadata() -> ArtifactMetadata {
        let config = NbForecasterConfig::new(1, 4, 1).with_hidden_size(4).with_n_layers(1);
        let scaler = MinMaxScaler::fit(&[0.0, 0.5]).unwrap();
        ArtifactMetadata::new(LossId::new("mean_only", 1), config, scaler)
            .with_pipeline(&serde_json::json!({"seq_len": 4}))
            .unwrap()
            .with_training(TrainingSummary {
                epochs_run: 3,
                best_epoch: Some(2),
                best_valid_loss: Some(0.25),
                final_train_loss: Some(0.3),
            })
    }

    #[test]
    fn test_artifact_round_trip() {
        let device = Default::default();
        let meta = metadata();
        let model = meta.model.init::<TestBackend>(&device);

        let dir = tempfile::tempdir().unwrap();
        save_artifact(dir.path(), &model, &meta).unwrap();
        assert!(dir.path().join(METADATA_FILE).exists());

        let mut registry = LossRegistry::<TestBackend>::new();
        registry.register(LossId::new("mean_only", 1), || Box::new(MeanOnly));
        let loaded = load_artifact::<TestBackend>(dir.path(), &registry, &device).unwrap();

        assert_eq!(loaded.metadata.training.best_epoch, Some(2));
        assert_eq!(loaded.metadata.scaler, meta.scaler);
        assert_eq!(loaded.loss.id(), meta.loss);

        let x = Tensor::<TestBackend, 3>::ones([1, 4, 1], &device);
        let before = model.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
        let after = loaded.model.forward(x).into_data().to_vec::<f32>().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unknown_loss_rejected() {
        let device = Default::default();
        let meta = metadata();
        let model = meta.model.init::<TestBackend>(&device);
        let dir = tempfile::tempdir().unwrap();
        save_artifact(dir.path(), &model, &meta).unwrap();

        let registry = LossRegistry::<TestBackend>::new();
        assert!(matches!(
            load_artifact::<TestBackend>(dir.path(), &registry, &device),
            Err(CheckpointError::Registry(RegistryError::UnknownLoss { .. }))
        ));
    }

    #[test]
    fn test_format_version_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);
        let mut meta = metadata();
        meta.format_version = 99;
        meta.save(&path).unwrap();
        assert!(matches!(ArtifactMetadata::load(&path), Err(CheckpointError::InvalidFormat(_))));
    }
}
