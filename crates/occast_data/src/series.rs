//! Per-species bucket counts.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use occast_core::{BucketIndex, BucketKind};

use crate::error::{DataError, Result};

/// One non-zero (species, bucket) cell, as stored in a series file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRow {
    /// Species name.
    #[serde(rename = "speciesName")]
    pub species: String,
    /// Observation count in the bucket.
    pub count: u64,
    /// Bucket index since the epoch.
    #[serde(rename = "bucketIndex")]
    pub bucket: BucketIndex,
    /// Taxonomic class, if known.
    #[serde(rename = "className", default)]
    pub class_name: Option<String>,
}

/// Raw counts keyed by species and bucket.
///
/// Only observed cells are stored. Absent buckets read as zero, and
/// [`SeriesTable::dense_counts`] materialises them explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesTable {
    kind: BucketKind,
    counts: BTreeMap<String, BTreeMap<BucketIndex, u64>>,
    classes: BTreeMap<String, String>,
}

impl SeriesTable {
    /// Create an empty table of the given bucket width.
    #[must_use]
    pub fn new(kind: BucketKind) -> Self {
        Self {
            kind,
            counts: BTreeMap::new(),
            classes: BTreeMap::new(),
        }
    }

    /// Build a table from series rows, summing duplicate cells.
    pub fn from_rows<I>(kind: BucketKind, rows: I) -> Self
    where
        I: IntoIterator<Item = SeriesRow>,
    {
        let mut table = Self::new(kind);
        for row in rows {
            table.add_count(&row.species, row.bucket, row.count);
            if let Some(class_name) = &row.class_name {
                table.set_class(&row.species, class_name);
            }
        }
        table
    }

    /// Bucket width of this table.
    #[must_use]
    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    /// Add `count` to a cell.
    pub fn add_count(&mut self, species: &str, bucket: BucketIndex, count: u64) {
        let cell = self
            .counts
            .entry(species.to_string())
            .or_default()
            .entry(bucket)
            .or_insert(0);
        *cell += count;
    }

    /// Record the taxonomic class of a species.
    pub fn set_class(&mut self, species: &str, class_name: &str) {
        self.classes.insert(species.to_string(), class_name.to_string());
    }

    /// Taxonomic class of a species.
    #[must_use]
    pub fn class_of(&self, species: &str) -> Option<&str> {
        self.classes.get(species).map(String::as_str)
    }

    /// Count in a cell, zero when absent.
    #[must_use]
    pub fn count(&self, species: &str, bucket: BucketIndex) -> u64 {
        self.counts
            .get(species)
            .and_then(|series| series.get(&bucket))
            .copied()
            .unwrap_or(0)
    }

    /// Species names in sorted order.
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Number of species.
    #[must_use]
    pub fn n_species(&self) -> usize {
        self.counts.len()
    }

    /// Check if a species has any cell.
    #[must_use]
    pub fn contains_species(&self, species: &str) -> bool {
        self.counts.contains_key(species)
    }

    /// Check if the table holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.values().all(BTreeMap::is_empty)
    }

    /// Stored cells of one species.
    #[must_use]
    pub fn species_counts(&self, species: &str) -> Option<&BTreeMap<BucketIndex, u64>> {
        self.counts.get(species)
    }

    /// First and last bucket present anywhere in the table.
    #[must_use]
    pub fn bucket_range(&self) -> Option<RangeInclusive<BucketIndex>> {
        let first = self.counts.values().filter_map(|s| s.keys().next()).min()?;
        let last = self.counts.values().filter_map(|s| s.keys().next_back()).max()?;
        Some(*first..=*last)
    }

    /// Sum over all species per bucket.
    #[must_use]
    pub fn totals(&self) -> BTreeMap<BucketIndex, u64> {
        let mut totals = BTreeMap::new();
        for series in self.counts.values() {
            for (bucket, count) in series {
                *totals.entry(*bucket).or_insert(0) += count;
            }
        }
        totals
    }

    /// Dense counts of a species over `range`, with zeros for absent buckets.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownSpecies`] if the species is not in the table.
    pub fn dense_counts(&self, species: &str, range: RangeInclusive<BucketIndex>) -> Result<Vec<u64>> {
        let series = self
            .counts
            .get(species)
            .ok_or_else(|| DataError::UnknownSpecies(species.to_string()))?;
        Ok(dense_range(range)
            .map(|bucket| series.get(&bucket).copied().unwrap_or(0))
            .collect())
    }

    /// Non-zero cells ordered by bucket, then species.
    #[must_use]
    pub fn rows(&self) -> Vec<SeriesRow> {
        let mut rows: Vec<SeriesRow> = self
            .counts
            .iter()
            .flat_map(|(species, series)| {
                series.iter().filter(|(_, count)| **count > 0).map(|(bucket, count)| SeriesRow {
                    species: species.clone(),
                    count: *count,
                    bucket: *bucket,
                    class_name: self.classes.get(species).cloned(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.bucket.cmp(&b.bucket).then_with(|| a.species.cmp(&b.species)));
        rows
    }

    /// Sum a monthly table into seasons.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidInput`] if the table is already seasonal.
    pub fn to_seasons(&self) -> Result<Self> {
        if self.kind != BucketKind::Month {
            return Err(DataError::InvalidInput(
                "table is already bucketed by season".to_string(),
            ));
        }

        let mut seasons = Self::new(BucketKind::Season);
        for (species, series) in &self.counts {
            for (bucket, count) in series {
                seasons.add_count(species, bucket.season_of_month(), *count);
            }
        }
        seasons.classes = self.classes.clone();
        Ok(seasons)
    }
}

/// Every bucket in an inclusive range.
pub(crate) fn dense_range(range: RangeInclusive<BucketIndex>) -> impl Iterator<Item = BucketIndex> {
    (range.start().value()..=range.end().value()).map(BucketIndex::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(v: u32) -> BucketIndex {
        BucketIndex::new(v)
    }

    fn sample() -> SeriesTable {
        let mut table = SeriesTable::new(BucketKind::Month);
        table.add_count("a", b(0), 2);
        table.add_count("a", b(2), 1);
        table.add_count("b", b(1), 4);
        table.add_count("b", b(5), 3);
        table.set_class("b", "Bivalvia");
        table
    }

    #[test]
    fn test_counts_and_range() {
        let table = sample();
        assert_eq!(table.count("a", b(0)), 2);
        assert_eq!(table.count("a", b(1)), 0);
        assert_eq!(table.count("z", b(0)), 0);
        assert_eq!(table.bucket_range(), Some(b(0)..=b(5)));
        assert_eq!(table.totals().get(&b(1)), Some(&4));
    }

    #[test]
    fn test_dense_counts_fill_zero() {
        let table = sample();
        assert_eq!(table.dense_counts("a", b(0)..=b(5)).unwrap(), vec![2, 0, 1, 0, 0, 0]);
        assert!(matches!(
            table.dense_counts("z", b(0)..=b(1)),
            Err(DataError::UnknownSpecies(_))
        ));
    }

    #[test]
    fn test_rows_sorted_by_bucket() {
        let rows = sample().rows();
        let buckets: Vec<u32> = rows.iter().map(|r| r.bucket.value()).collect();
        assert_eq!(buckets, vec![0, 1, 2, 5]);
        assert_eq!(rows[1].class_name.as_deref(), Some("Bivalvia"));

        let rebuilt = SeriesTable::from_rows(BucketKind::Month, rows);
        assert_eq!(rebuilt, sample());
    }

    #[test]
    fn test_to_seasons() {
        let seasons = sample().to_seasons().unwrap();
        assert_eq!(seasons.kind(), BucketKind::Season);
        assert_eq!(seasons.count("a", b(0)), 3);
        assert_eq!(seasons.count("b", b(0)), 4);
        assert_eq!(seasons.count("b", b(1)), 3);
        assert!(seasons.to_seasons().is_err());
    }
}
