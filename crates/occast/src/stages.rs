//! Pipeline stages, leaf first.
//!
//! observations → [`aggregate_file`] → [`normalize`] → [`scale`] →
//! [`build_datasets`]. Each stage is a plain function over owned or
//! borrowed data, so the context only wires them together.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;

use occast_core::{BucketIndex, BucketKind, Partition};
use occast_data::{
    aggregate, make_windows_in, read_observations_json, share_of_total, AggregationReport, DataError,
    MinMaxScaler, PartitionBounds, SeriesTable, WindowConfig, WindowDataset, WindowDatasets,
};

use crate::config::{BucketingConfig, EmptyBucketPolicy, NormalizationConfig};
use crate::error::{PipelineError, Result};

/// Read a JSON observation file and bucket it.
///
/// Records that fail to deserialize are counted as malformed.
pub fn aggregate_file(path: impl AsRef<Path>, bucketing: &BucketingConfig) -> Result<(SeriesTable, AggregationReport)> {
    let epoch = bucketing.epoch()?;
    let (observations, unreadable) = read_observations_json(path)?;
    let (table, mut report) = aggregate(&observations, &epoch, bucketing.kind);
    report.skipped_malformed += unreadable;
    Ok((table, report))
}

/// Bring a table to the configured bucket width.
///
/// A monthly table is summed into seasons; a seasonal table cannot be split
/// back into months.
pub fn align_kind(table: SeriesTable, kind: BucketKind) -> Result<SeriesTable> {
    match (table.kind(), kind) {
        (have, want) if have == want => Ok(table),
        (BucketKind::Month, BucketKind::Season) => Ok(table.to_seasons()?),
        (have, want) => Err(PipelineError::InvalidConfig(format!(
            "cannot convert a {have} table into {want} buckets"
        ))),
    }
}

/// Dense normalized values per species over the table's bucket range.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    /// Buckets covered, shared by every species.
    pub range: RangeInclusive<BucketIndex>,
    /// Values per species in bucket order.
    pub values: BTreeMap<String, Vec<f64>>,
    /// Empty-bucket values replaced by 0.
    pub substituted: usize,
}

impl NormalizedSeries {
    /// Number of buckets per species.
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.start().distance_to(*self.range.end()) as usize + 1
    }

    /// Always false; a normalized series covers at least one bucket.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every value of every species.
    pub fn all_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.values().flatten().copied()
    }
}

/// Reconstruct dense per-species series, optionally as shares of the bucket total.
///
/// Buckets absent for a species count as 0. Under share-of-total a bucket
/// with no observations at all is undefined and handled by the policy.
///
/// # Errors
///
/// - [`DataError::EmptyDataset`] if the table has no counts.
/// - [`DataError::EmptyBucket`] for an empty bucket under [`EmptyBucketPolicy::Fail`].
pub fn normalize(table: &SeriesTable, config: &NormalizationConfig) -> Result<NormalizedSeries> {
    let range = table.bucket_range().ok_or(DataError::EmptyDataset)?;
    let mut values = BTreeMap::new();
    let mut substituted = 0;

    if config.share_of_total {
        let shares = share_of_total(table);
        for species in table.species() {
            let dense = shares.dense_series(species, range.clone())?;
            let mut series = Vec::with_capacity(dense.len());
            for (offset, share) in dense.into_iter().enumerate() {
                match (share, config.empty_bucket) {
                    (Some(value), _) => series.push(value),
                    (None, EmptyBucketPolicy::Zero) => {
                        substituted += 1;
                        series.push(0.0);
                    }
                    (None, EmptyBucketPolicy::Fail) => {
                        return Err(DataError::EmptyBucket(range.start().offset(offset as u32)).into());
                    }
                }
            }
            values.insert(species.to_string(), series);
        }
    } else {
        for species in table.species() {
            let dense = table.dense_counts(species, range.clone())?;
            values.insert(species.to_string(), dense.into_iter().map(|c| c as f64).collect());
        }
    }

    if substituted > 0 {
        tracing::warn!(substituted, "empty buckets replaced by 0 under share-of-total");
    }
    tracing::info!(
        species = values.len(),
        first = %range.start(),
        last = %range.end(),
        share_of_total = config.share_of_total,
        "normalized series"
    );

    Ok(NormalizedSeries {
        range,
        values,
        substituted,
    })
}

/// Fit the scaler on every value of every species.
pub fn fit_scaler(series: &NormalizedSeries) -> Result<MinMaxScaler> {
    let values: Vec<f64> = series.all_values().collect();
    Ok(MinMaxScaler::fit(&values)?)
}

/// Apply a fitted scaler to every species.
#[must_use]
pub fn scale(series: &NormalizedSeries, scaler: &MinMaxScaler) -> BTreeMap<String, Vec<f32>> {
    series
        .values
        .iter()
        .map(|(species, values)| {
            let scaled = values.iter().map(|&v| scaler.transform(v) as f32).collect();
            (species.clone(), scaled)
        })
        .collect()
}

/// Window every species inside each partition and concatenate in species order.
///
/// Windows never straddle a partition boundary. A partition too short for
/// one window yields an empty dataset.
pub fn build_datasets(
    series: &BTreeMap<String, Vec<f32>>,
    bounds: &PartitionBounds,
    config: &WindowConfig,
) -> Result<WindowDatasets> {
    config.validate()?;
    let mut parts: [Vec<WindowDataset>; 3] = Default::default();

    for (species, values) in series {
        for partition in Partition::ALL {
            let windows = make_windows_in(values, config, bounds.span(partition).rows())?;
            if windows.is_empty() {
                continue;
            }
            tracing::trace!(%species, %partition, windows = windows.len(), "windowed species");
            parts[partition.index()].push(windows.into_dataset()?);
        }
    }

    let (seq_len, n_features, horizon) = (config.seq_len, config.n_features(), config.horizon);
    let [train, valid, test] = parts.map(|parts| WindowDataset::from_parts(seq_len, n_features, horizon, &parts));
    let (train, valid, test) = (train?, valid?, test?);
    tracing::info!(
        train = train.len(),
        valid = valid.len(),
        test = test.len(),
        "built window datasets"
    );
    Ok(WindowDatasets { train, valid, test })
}
