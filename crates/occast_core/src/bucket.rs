//! Calendar buckets counted from a fixed epoch month.
//!
//! A bucket is either a month or a season. Seasons are purely arithmetic:
//! season `s` covers month indices `3s`, `3s + 1` and `3s + 2`, so season 0
//! is the epoch month plus the two months that follow it. With the default
//! January epoch that is January to March, not a meteorological winter.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Zero-based count of buckets since the epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BucketIndex(u32);

impl BucketIndex {
    /// Create a bucket index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The following bucket.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Bucket `n` positions later.
    #[must_use]
    pub const fn offset(&self, n: u32) -> Self {
        Self(self.0 + n)
    }

    /// Number of buckets from `self` up to `later` (zero if `later` is earlier).
    #[must_use]
    pub const fn distance_to(&self, later: BucketIndex) -> u32 {
        later.0.saturating_sub(self.0)
    }

    /// Season containing this month index: `floor(month_index / 3)`.
    ///
    /// Only meaningful when `self` counts months.
    #[must_use]
    pub const fn season_of_month(&self) -> Self {
        Self(self.0 / 3)
    }
}

impl From<u32> for BucketIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<BucketIndex> for u32 {
    fn from(index: BucketIndex) -> Self {
        index.0
    }
}

impl std::fmt::Display for BucketIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Width of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    /// One calendar month.
    Month,
    /// Three consecutive months counted from the epoch.
    #[default]
    Season,
}

impl BucketKind {
    /// Months covered by one bucket.
    #[must_use]
    pub const fn months(&self) -> u32 {
        match self {
            BucketKind::Month => 1,
            BucketKind::Season => 3,
        }
    }

    /// Buckets per calendar year.
    #[must_use]
    pub const fn per_year(&self) -> u32 {
        12 / self.months()
    }
}

impl std::fmt::Display for BucketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketKind::Month => write!(f, "month"),
            BucketKind::Season => write!(f, "season"),
        }
    }
}

impl std::str::FromStr for BucketKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "month" | "monthly" => Ok(BucketKind::Month),
            "season" | "seasonal" => Ok(BucketKind::Season),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown bucket kind '{other}' (expected month or season)"
            ))),
        }
    }
}

/// The month that bucket 0 starts at.
///
/// # Example
///
/// ```rust
/// use occast_core::{BucketIndex, Epoch};
///
/// let epoch = Epoch::new(1980, 1).unwrap();
/// let idx = epoch.month_index(1981, 3).unwrap();
/// assert_eq!(idx, BucketIndex::new(14));
/// assert_eq!(epoch.decode_month(idx), (1981, 3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Epoch {
    base_year: i32,
    base_month: u32,
}

impl Epoch {
    /// Create an epoch starting at `base_month` (1..=12) of `base_year`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMonth`] if the month is out of range.
    pub fn new(base_year: i32, base_month: u32) -> Result<Self> {
        if !(1..=12).contains(&base_month) {
            return Err(CoreError::InvalidMonth(base_month));
        }
        Ok(Self {
            base_year,
            base_month,
        })
    }

    /// Year of the epoch month.
    #[must_use]
    pub const fn base_year(&self) -> i32 {
        self.base_year
    }

    /// The epoch month (1..=12).
    #[must_use]
    pub const fn base_month(&self) -> u32 {
        self.base_month
    }

    fn ordinal(year: i32, month: u32) -> i64 {
        i64::from(year) * 12 + i64::from(month) - 1
    }

    fn base_ordinal(&self) -> i64 {
        Self::ordinal(self.base_year, self.base_month)
    }

    /// Month index of `(year, month)`, or `None` before the epoch or for an invalid month.
    #[must_use]
    pub fn month_index(&self, year: i32, month: u32) -> Option<BucketIndex> {
        if !(1..=12).contains(&month) {
            return None;
        }
        let diff = Self::ordinal(year, month) - self.base_ordinal();
        u32::try_from(diff).ok().map(BucketIndex)
    }

    /// Calendar `(year, month)` of a month index.
    #[must_use]
    pub fn decode_month(&self, index: BucketIndex) -> (i32, u32) {
        let ordinal = self.base_ordinal() + i64::from(index.0);
        let year = ordinal.div_euclid(12) as i32;
        let month = ordinal.rem_euclid(12) as u32 + 1;
        (year, month)
    }

    /// Bucket of `(year, month)` for the given width.
    #[must_use]
    pub fn bucket(&self, kind: BucketKind, year: i32, month: u32) -> Option<BucketIndex> {
        let month_index = self.month_index(year, month)?;
        Some(match kind {
            BucketKind::Month => month_index,
            BucketKind::Season => month_index.season_of_month(),
        })
    }

    /// Calendar `(year, month)` of the first month in a bucket.
    #[must_use]
    pub fn first_month_of(&self, kind: BucketKind, index: BucketIndex) -> (i32, u32) {
        self.decode_month(BucketIndex(index.0 * kind.months()))
    }

    /// Calendar year a bucket belongs to, taken from its first month.
    #[must_use]
    pub fn year_of(&self, kind: BucketKind, index: BucketIndex) -> i32 {
        self.first_month_of(kind, index).0
    }

    /// First bucket whose first month falls in `year` or later.
    ///
    /// Years before the epoch map to bucket 0.
    #[must_use]
    pub fn first_bucket_of_year(&self, kind: BucketKind, year: i32) -> BucketIndex {
        let months = Self::ordinal(year, 1) - self.base_ordinal();
        if months <= 0 {
            return BucketIndex(0);
        }
        let width = i64::from(kind.months());
        let bucket = (months + width - 1) / width;
        BucketIndex(u32::try_from(bucket).unwrap_or(u32::MAX))
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self {
            base_year: 1980,
            base_month: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_round_trip() {
        let epoch = Epoch::new(1980, 1).unwrap();
        for raw in 0..2000 {
            let idx = BucketIndex::new(raw);
            let (year, month) = epoch.decode_month(idx);
            assert_eq!(epoch.month_index(year, month), Some(idx));
        }

        let shifted = Epoch::new(1979, 12).unwrap();
        for raw in 0..600 {
            let idx = BucketIndex::new(raw);
            let (year, month) = shifted.decode_month(idx);
            assert_eq!(shifted.month_index(year, month), Some(idx));
        }
    }

    #[test]
    fn test_before_epoch_and_bad_month() {
        let epoch = Epoch::default();
        assert_eq!(epoch.month_index(1979, 12), None);
        assert_eq!(epoch.month_index(1980, 0), None);
        assert_eq!(epoch.month_index(1980, 13), None);
        assert_eq!(epoch.month_index(1980, 1), Some(BucketIndex::new(0)));
        assert!(Epoch::new(2000, 13).is_err());
    }

    #[test]
    fn test_season_grouping() {
        let mut previous = 0;
        for month in 0..120u32 {
            let season = BucketIndex::new(month).season_of_month().value();
            assert!(season >= previous);
            previous = season;
        }
        for season in 0..40u32 {
            let members = (0..120u32)
                .filter(|m| BucketIndex::new(*m).season_of_month().value() == season)
                .count();
            assert_eq!(members, 3);
        }
    }

    #[test]
    fn test_season_anchored_at_epoch_month() {
        let epoch = Epoch::new(1979, 12).unwrap();
        // December, January and February share season 0.
        assert_eq!(epoch.bucket(BucketKind::Season, 1979, 12), Some(BucketIndex::new(0)));
        assert_eq!(epoch.bucket(BucketKind::Season, 1980, 2), Some(BucketIndex::new(0)));
        assert_eq!(epoch.bucket(BucketKind::Season, 1980, 3), Some(BucketIndex::new(1)));
    }

    #[test]
    fn test_first_bucket_of_year() {
        let epoch = Epoch::default();
        assert_eq!(
            epoch.first_bucket_of_year(BucketKind::Season, 2021),
            BucketIndex::new((2021 - 1980) * 4)
        );
        assert_eq!(
            epoch.first_bucket_of_year(BucketKind::Month, 2016),
            BucketIndex::new((2016 - 1980) * 12)
        );
        assert_eq!(epoch.first_bucket_of_year(BucketKind::Month, 1970), BucketIndex::new(0));

        let shifted = Epoch::new(1979, 12).unwrap();
        let first = shifted.first_bucket_of_year(BucketKind::Season, 1980);
        assert_eq!(shifted.year_of(BucketKind::Season, first), 1980);
        assert_eq!(first, BucketIndex::new(1));
    }

    #[test]
    fn test_bucket_kind_parse() {
        assert_eq!("month".parse::<BucketKind>().unwrap(), BucketKind::Month);
        assert_eq!("Seasonal".parse::<BucketKind>().unwrap(), BucketKind::Season);
        assert!("week".parse::<BucketKind>().is_err());
        assert_eq!(BucketKind::Season.per_year(), 4);
    }
}
