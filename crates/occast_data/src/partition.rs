//! Locating calendar-year partition boundaries in a bucket column.
//!
//! Boundaries come from bucket arithmetic, never from row counts. The
//! column may have gaps where zero-count buckets were dropped, so each
//! boundary is found by binary search for the first row at or after the
//! first bucket of a year. A dense column uses direct arithmetic instead.

use std::ops::RangeInclusive;

use occast_core::{BucketIndex, BucketKind, Epoch, Partition, PartitionPlan};

use crate::error::{DataError, Result};

/// Row positions and bucket values of one located partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSpan {
    /// First row (inclusive).
    pub start: usize,
    /// Last row (inclusive).
    pub end: usize,
    /// Bucket of the first row.
    pub first_bucket: BucketIndex,
    /// Bucket of the last row.
    pub last_bucket: BucketIndex,
}

impl PartitionSpan {
    /// Row positions as a half-open range.
    #[must_use]
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.end + 1
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    /// Always false; located partitions hold at least one row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Located train, validation and test spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionBounds {
    spans: [PartitionSpan; 3],
}

impl PartitionBounds {
    /// Span of a partition.
    #[must_use]
    pub fn span(&self, partition: Partition) -> PartitionSpan {
        self.spans[partition.index()]
    }

    /// Row positions of a partition (inclusive).
    #[must_use]
    pub fn range(&self, partition: Partition) -> RangeInclusive<usize> {
        let span = self.span(partition);
        span.start..=span.end
    }

    /// Buckets found at the edges of a partition (inclusive).
    #[must_use]
    pub fn bucket_range(&self, partition: Partition) -> RangeInclusive<BucketIndex> {
        let span = self.span(partition);
        span.first_bucket..=span.last_bucket
    }
}

/// Locate partitions in a sorted bucket column by binary search.
///
/// Rows before the training years or after the test years are ignored.
///
/// # Errors
///
/// - [`DataError::InvalidInput`] if the column is not sorted or the plan is invalid.
/// - [`DataError::BoundaryNotFound`] if a partition has no row in its years.
///
/// # Example
///
/// ```rust
/// use occast_core::{BucketIndex, BucketKind, Epoch, Partition, PartitionPlan, YearRange};
/// use occast_data::locate;
///
/// // Seasons of 2000..=2002 with a gap in 2001.
/// let epoch = Epoch::new(2000, 1).unwrap();
/// let column: Vec<BucketIndex> = [0, 1, 2, 3, 5, 6, 8, 9, 10, 11].map(BucketIndex::new).to_vec();
/// let plan = PartitionPlan {
///     train: YearRange::new(2000, 2000),
///     valid: YearRange::new(2001, 2001),
///     test: YearRange::new(2002, 2002),
/// };
/// let bounds = locate(&column, &epoch, BucketKind::Season, &plan).unwrap();
/// assert_eq!(bounds.range(Partition::Valid), 4..=6);
/// ```
pub fn locate(
    column: &[BucketIndex],
    epoch: &Epoch,
    kind: BucketKind,
    plan: &PartitionPlan,
) -> Result<PartitionBounds> {
    plan.validate().map_err(|e| DataError::InvalidInput(e.to_string()))?;
    if column.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(DataError::InvalidInput(
            "bucket column must be sorted ascending".to_string(),
        ));
    }

    let first_row_at = |bucket: BucketIndex| column.partition_point(|b| *b < bucket);

    let mut spans = [PartitionSpan {
        start: 0,
        end: 0,
        first_bucket: BucketIndex::default(),
        last_bucket: BucketIndex::default(),
    }; 3];

    for partition in Partition::ALL {
        let years = plan.years(partition);
        let start_bucket = epoch.first_bucket_of_year(kind, years.start);
        let next_bucket = epoch.first_bucket_of_year(kind, years.end + 1);

        let start = first_row_at(start_bucket);
        let stop = first_row_at(next_bucket);
        if start >= stop {
            return Err(DataError::BoundaryNotFound {
                partition,
                year: years.start,
                bucket: start_bucket,
            });
        }

        spans[partition.index()] = PartitionSpan {
            start,
            end: stop - 1,
            first_bucket: column[start],
            last_bucket: column[stop - 1],
        };
    }

    Ok(PartitionBounds { spans })
}

/// Locate partitions in a gap-free column `first, first + 1, ..., first + len - 1`.
///
/// Equivalent to [`locate`] on that column, computed arithmetically.
pub fn locate_dense(
    first: BucketIndex,
    len: usize,
    epoch: &Epoch,
    kind: BucketKind,
    plan: &PartitionPlan,
) -> Result<PartitionBounds> {
    plan.validate().map_err(|e| DataError::InvalidInput(e.to_string()))?;
    let first_value = u64::from(first.value());
    let end_value = first_value + len as u64;
    let position = |bucket: BucketIndex| -> usize {
        let value = u64::from(bucket.value()).clamp(first_value, end_value);
        (value - first_value) as usize
    };

    let mut spans = [PartitionSpan {
        start: 0,
        end: 0,
        first_bucket: first,
        last_bucket: first,
    }; 3];

    for partition in Partition::ALL {
        let years = plan.years(partition);
        let start_bucket = epoch.first_bucket_of_year(kind, years.start);
        let next_bucket = epoch.first_bucket_of_year(kind, years.end + 1);

        let start = position(start_bucket);
        let stop = position(next_bucket);
        if start >= stop {
            return Err(DataError::BoundaryNotFound {
                partition,
                year: years.start,
                bucket: start_bucket,
            });
        }

        spans[partition.index()] = PartitionSpan {
            start,
            end: stop - 1,
            first_bucket: first.offset(start as u32),
            last_bucket: first.offset((stop - 1) as u32),
        };
    }

    Ok(PartitionBounds { spans })
}

#[cfg(test)]
mod tests {
    use super::*;
    use occast_core::YearRange;

    fn column(values: &[u32]) -> Vec<BucketIndex> {
        values.iter().copied().map(BucketIndex::new).collect()
    }

    fn small_plan() -> PartitionPlan {
        PartitionPlan {
            train: YearRange::new(1980, 1981),
            valid: YearRange::new(1982, 1982),
            test: YearRange::new(1983, 1984),
        }
    }

    fn assert_ordered(bounds: &PartitionBounds) {
        let train = bounds.range(Partition::Train);
        let valid = bounds.range(Partition::Valid);
        let test = bounds.range(Partition::Test);
        assert!(train.end() < valid.start());
        assert!(valid.start() <= valid.end());
        assert!(valid.end() < test.start());
        assert!(test.start() <= test.end());
    }

    #[test]
    fn test_locate_with_gaps() {
        let epoch = Epoch::default();
        // Seasons 0..20 cover 1980..=1984; drop a few buckets.
        let col = column(&[0, 1, 1, 3, 5, 7, 9, 10, 11, 13, 14, 18, 19, 25]);
        let bounds = locate(&col, &epoch, BucketKind::Season, &small_plan()).unwrap();

        assert_eq!(bounds.range(Partition::Train), 0..=5);
        assert_eq!(bounds.range(Partition::Valid), 6..=8);
        assert_eq!(bounds.range(Partition::Test), 9..=12);
        assert_ordered(&bounds);

        for partition in Partition::ALL {
            let years = small_plan().years(partition);
            for row in bounds.range(partition) {
                assert!(years.contains(epoch.year_of(BucketKind::Season, col[row])));
            }
        }
    }

    #[test]
    fn test_boundary_not_found() {
        let epoch = Epoch::default();
        // Nothing in 1982.
        let col = column(&[0, 4, 7, 12, 16]);
        let err = locate(&col, &epoch, BucketKind::Season, &small_plan()).unwrap_err();
        match err {
            DataError::BoundaryNotFound { partition, year, bucket } => {
                assert_eq!(partition, Partition::Valid);
                assert_eq!(year, 1982);
                assert_eq!(bucket, BucketIndex::new(8));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Data ends before the test years.
        let short = column(&[0, 4, 8]);
        assert!(matches!(
            locate(&short, &epoch, BucketKind::Season, &small_plan()),
            Err(DataError::BoundaryNotFound { partition: Partition::Test, .. })
        ));
    }

    #[test]
    fn test_unsorted_column_rejected() {
        let col = column(&[0, 5, 3]);
        assert!(matches!(
            locate(&col, &Epoch::default(), BucketKind::Season, &small_plan()),
            Err(DataError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_dense_matches_binary_search() {
        let epoch = Epoch::default();
        let first = BucketIndex::new(2);
        let len = 17;
        let col: Vec<BucketIndex> = (0..len as u32).map(|i| first.offset(i)).collect();

        let searched = locate(&col, &epoch, BucketKind::Season, &small_plan()).unwrap();
        let dense = locate_dense(first, len, &epoch, BucketKind::Season, &small_plan()).unwrap();
        assert_eq!(searched, dense);
        assert_ordered(&dense);
    }

    #[test]
    fn test_monthly_default_plan() {
        let epoch = Epoch::default();
        let len = (2026 - 1980) * 12;
        let bounds = locate_dense(BucketIndex::new(0), len, &epoch, BucketKind::Month, &PartitionPlan::default())
            .unwrap();
        assert_eq!(bounds.range(Partition::Train), 0..=(36 * 12 - 1));
        assert_eq!(bounds.span(Partition::Valid).first_bucket, BucketIndex::new(36 * 12));
        assert_eq!(bounds.span(Partition::Test).len(), 5 * 12);
    }
}
