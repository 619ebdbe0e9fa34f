//! Pipeline configuration.
//!
//! [`PipelineConfig`] gathers every stage's settings in one serde struct
//! that is stored as JSON, both standalone and inside model artifacts.
//! Missing sections and fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use occast_core::{BucketKind, Epoch, PartitionPlan};
use occast_data::WindowConfig;
use occast_models::NbForecasterConfig;
use occast_train::TrainerConfig;

use crate::error::{PipelineError, Result};

/// Epoch and bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketingConfig {
    /// Year of bucket 0.
    pub base_year: i32,
    /// Month (1..=12) of bucket 0.
    pub base_month: u32,
    /// Month or season buckets.
    pub kind: BucketKind,
}

impl Default for BucketingConfig {
    fn default() -> Self {
        Self {
            base_year: 1980,
            base_month: 1,
            kind: BucketKind::Season,
        }
    }
}

impl BucketingConfig {
    /// Validated epoch.
    pub fn epoch(&self) -> Result<Epoch> {
        Ok(Epoch::new(self.base_year, self.base_month)?)
    }
}

/// What to do with a bucket whose total across species is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyBucketPolicy {
    /// Substitute 0 and count the substitution.
    #[default]
    Zero,
    /// Abort preparation.
    Fail,
}

/// Normalization settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Divide counts by the bucket total across species before scaling.
    pub share_of_total: bool,
    /// Handling of empty buckets under share-of-total.
    pub empty_bucket: EmptyBucketPolicy,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            share_of_total: true,
            empty_bucket: EmptyBucketPolicy::Zero,
        }
    }
}

/// Complete pipeline configuration.
///
/// # Example
///
/// ```rust
/// use occast::PipelineConfig;
///
/// let config: PipelineConfig = serde_json::from_str(r#"{"forecast_start_year": 2019}"#).unwrap();
/// assert_eq!(config.forecast_start_year, 2019);
/// assert_eq!(config.windowing.seq_len, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bucketing.
    pub bucketing: BucketingConfig,
    /// Normalization.
    pub normalization: NormalizationConfig,
    /// Window length, horizon and lags.
    pub windowing: WindowConfig,
    /// Partition years.
    pub partition: PartitionPlan,
    /// Forecaster architecture; window dimensions follow `windowing`.
    pub model: NbForecasterConfig,
    /// Trainer settings.
    pub training: TrainerConfig,
    /// Year whose first bucket starts a forecast.
    pub forecast_start_year: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucketing: BucketingConfig::default(),
            normalization: NormalizationConfig::default(),
            windowing: WindowConfig::default(),
            partition: PartitionPlan::default(),
            model: NbForecasterConfig::default(),
            training: TrainerConfig::default(),
            forecast_start_year: 2021,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Forecaster config with input and output dimensions taken from `windowing`.
    #[must_use]
    pub fn model_config(&self) -> NbForecasterConfig {
        let mut model = self.model.clone();
        model.n_features = self.windowing.n_features();
        model.seq_len = self.windowing.seq_len;
        model.horizon = self.windowing.horizon;
        model
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.bucketing.epoch()?;
        self.windowing.validate()?;
        self.partition.validate()?;
        self.model_config().validate()?;
        self.training.validate()?;
        if self.windowing.normalized_lags().len() != self.windowing.lags.len() {
            return Err(PipelineError::InvalidConfig("duplicate lag offsets".to_string()));
        }
        Ok(())
    }
}
