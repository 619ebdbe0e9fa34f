//! Share-of-total and min-max normalization.
//!
//! The two transforms are independent. Share-of-total divides each
//! species' count by the bucket total across species. [`MinMaxScaler`]
//! maps a fitted `[min, max]` onto `[0, 1]` and extrapolates linearly
//! outside it.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use occast_core::{BucketIndex, BucketKind};

use crate::error::{DataError, Result};
use crate::series::{dense_range, SeriesTable};

/// Derived view of a [`SeriesTable`] holding per-bucket shares.
#[derive(Debug, Clone)]
pub struct ShareTable {
    kind: BucketKind,
    counts: BTreeMap<String, BTreeMap<BucketIndex, u64>>,
    totals: BTreeMap<BucketIndex, u64>,
}

/// Compute the share-of-total view of a table.
///
/// The raw table is not modified.
#[must_use]
pub fn share_of_total(table: &SeriesTable) -> ShareTable {
    let counts = table
        .species()
        .filter_map(|species| {
            table
                .species_counts(species)
                .map(|series| (species.to_string(), series.clone()))
        })
        .collect();

    ShareTable {
        kind: table.kind(),
        counts,
        totals: table.totals(),
    }
}

impl ShareTable {
    /// Bucket width of the underlying table.
    #[must_use]
    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    /// Total count across species in a bucket.
    #[must_use]
    pub fn total(&self, bucket: BucketIndex) -> u64 {
        self.totals.get(&bucket).copied().unwrap_or(0)
    }

    /// Share of a species in a bucket.
    ///
    /// Returns `None` when the bucket total is zero, where the share is
    /// undefined. A species absent from a non-empty bucket has share `0.0`.
    #[must_use]
    pub fn share(&self, species: &str, bucket: BucketIndex) -> Option<f64> {
        let total = self.total(bucket);
        if total == 0 {
            return None;
        }
        let count = self
            .counts
            .get(species)
            .and_then(|series| series.get(&bucket))
            .copied()
            .unwrap_or(0);
        Some(count as f64 / total as f64)
    }

    /// Dense shares of a species over `range`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownSpecies`] if the species is not in the table.
    pub fn dense_series(&self, species: &str, range: RangeInclusive<BucketIndex>) -> Result<Vec<Option<f64>>> {
        if !self.counts.contains_key(species) {
            return Err(DataError::UnknownSpecies(species.to_string()));
        }
        Ok(dense_range(range).map(|bucket| self.share(species, bucket)).collect())
    }

    /// Sum of shares across species in a bucket, `None` for an empty bucket.
    #[must_use]
    pub fn bucket_sum(&self, bucket: BucketIndex) -> Option<f64> {
        if self.total(bucket) == 0 {
            return None;
        }
        Some(self.counts.keys().filter_map(|species| self.share(species, bucket)).sum())
    }
}

/// Linear scaler mapping a fitted `[min, max]` onto `[0, 1]`.
///
/// The fitted state is immutable. Values outside the fitted range are
/// transformed by the same formula, so they land outside `[0, 1]`.
///
/// # Example
///
/// ```rust
/// use occast_data::MinMaxScaler;
///
/// let scaler = MinMaxScaler::fit(&[2.0, 4.0, 6.0]).unwrap();
/// assert_eq!(scaler.transform(4.0), 0.5);
/// assert_eq!(scaler.transform(8.0), 1.5);
/// assert_eq!(scaler.inverse_transform(1.5), 8.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Fit on every value of the series.
    ///
    /// # Errors
    ///
    /// Returns an error if `values` is empty or holds a non-finite value.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(DataError::InvalidInput(format!(
                "cannot fit scaler on non-finite value {bad}"
            )));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self { min, max })
    }

    /// Fitted minimum.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Fitted maximum.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Denominator of the transform; 1 when the fitted range is degenerate.
    #[must_use]
    pub fn scale(&self) -> f64 {
        let range = self.max - self.min;
        if range.abs() < 1e-12 {
            1.0
        } else {
            range
        }
    }

    /// Scale a value.
    #[must_use]
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.scale()
    }

    /// Undo [`MinMaxScaler::transform`].
    #[must_use]
    pub fn inverse_transform(&self, value: f64) -> f64 {
        value * self.scale() + self.min
    }

    /// Scale a slice.
    #[must_use]
    pub fn transform_slice(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    /// Undo [`MinMaxScaler::transform_slice`].
    #[must_use]
    pub fn inverse_transform_slice(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.inverse_transform(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn b(v: u32) -> BucketIndex {
        BucketIndex::new(v)
    }

    fn table() -> SeriesTable {
        let mut table = SeriesTable::new(BucketKind::Month);
        table.add_count("a", b(0), 1);
        table.add_count("b", b(0), 3);
        table.add_count("a", b(1), 5);
        table.add_count("c", b(1), 2);
        table.add_count("b", b(1), 3);
        table.add_count("c", b(3), 7);
        table
    }

    #[test]
    fn test_shares_sum_to_one() {
        let shares = share_of_total(&table());
        for bucket in [b(0), b(1), b(3)] {
            assert_relative_eq!(shares.bucket_sum(bucket).unwrap(), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(shares.share("a", b(0)).unwrap(), 0.25);
        assert_relative_eq!(shares.share("c", b(0)).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_bucket_is_undefined() {
        let shares = share_of_total(&table());
        assert_eq!(shares.share("a", b(2)), None);
        assert_eq!(shares.bucket_sum(b(2)), None);

        let dense = shares.dense_series("c", b(0)..=b(3)).unwrap();
        assert_eq!(dense[0], Some(0.0));
        assert_eq!(dense[2], None);
        assert_eq!(dense[3], Some(1.0));
    }

    #[test]
    fn test_scaler_round_trip() {
        let values = [0.1, 0.4, 0.25, 0.9, 0.0];
        let scaler = MinMaxScaler::fit(&values).unwrap();
        for &v in &values {
            assert_relative_eq!(scaler.inverse_transform(scaler.transform(v)), v, epsilon = 1e-12);
        }
        assert_relative_eq!(scaler.transform(0.9), 1.0);
        assert_relative_eq!(scaler.transform(0.0), 0.0);
    }

    #[test]
    fn test_scaler_extrapolates() {
        let scaler = MinMaxScaler::fit(&[10.0, 20.0]).unwrap();
        assert_relative_eq!(scaler.transform(25.0), 1.5);
        assert_relative_eq!(scaler.transform(5.0), -0.5);
        for v in [-100.0, 5.0, 25.0, 1e4] {
            assert_relative_eq!(scaler.inverse_transform(scaler.transform(v)), v, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_scaler_rejects_bad_input() {
        assert!(MinMaxScaler::fit(&[]).is_err());
        assert!(MinMaxScaler::fit(&[1.0, f64::NAN]).is_err());

        let flat = MinMaxScaler::fit(&[3.0, 3.0]).unwrap();
        assert_eq!(flat.scale(), 1.0);
        assert_eq!(flat.transform(3.0), 0.0);
    }
}
