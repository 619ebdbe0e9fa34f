//! Training, validation and test partitions defined by calendar years.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// One of the three temporally ordered partitions of a series.
///
/// # Example
///
/// ```rust
/// use occast_core::Partition;
///
/// let partition: Partition = "test".parse().unwrap();
/// assert_eq!(partition, Partition::Test);
/// assert_eq!(partition.index(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Training partition, the only one that receives gradient updates.
    #[default]
    Train,
    /// Validation partition, used for monitoring.
    Valid,
    /// Test partition, used for final evaluation and as forecast origin.
    Test,
}

impl Partition {
    /// All partitions in temporal order.
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Valid, Partition::Test];

    /// Get the partition index (0=Train, 1=Valid, 2=Test).
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Partition::Train => 0,
            Partition::Valid => 1,
            Partition::Test => 2,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::Train => write!(f, "train"),
            Partition::Valid => write!(f, "valid"),
            Partition::Test => write!(f, "test"),
        }
    }
}

impl std::str::FromStr for Partition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "train" | "training" => Ok(Partition::Train),
            "valid" | "validation" => Ok(Partition::Valid),
            "test" => Ok(Partition::Test),
            other => Err(CoreError::InvalidConfig(format!("unknown partition '{other}'"))),
        }
    }
}

/// Inclusive range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    /// First year.
    pub start: i32,
    /// Last year (inclusive).
    pub end: i32,
}

impl YearRange {
    /// Create a year range.
    #[must_use]
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Check if `year` falls in the range.
    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }
}

/// Calendar-year boundaries of the three partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Training years.
    pub train: YearRange,
    /// Validation years.
    pub valid: YearRange,
    /// Test years.
    pub test: YearRange,
}

impl PartitionPlan {
    /// Year range of a partition.
    #[must_use]
    pub const fn years(&self, partition: Partition) -> YearRange {
        match partition {
            Partition::Train => self.train,
            Partition::Valid => self.valid,
            Partition::Test => self.test,
        }
    }

    /// Check the ranges are non-empty, ordered and non-overlapping.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        for partition in Partition::ALL {
            let years = self.years(partition);
            if years.start > years.end {
                return Err(CoreError::InvalidConfig(format!(
                    "{partition} years {}..={} are reversed",
                    years.start, years.end
                )));
            }
        }
        if self.train.end >= self.valid.start || self.valid.end >= self.test.start {
            return Err(CoreError::InvalidConfig(
                "partition years must be ascending and non-overlapping".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PartitionPlan {
    fn default() -> Self {
        Self {
            train: YearRange::new(1980, 2015),
            valid: YearRange::new(2016, 2020),
            test: YearRange::new(2021, 2025),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_index_follows_time() {
        let indices: Vec<usize> = Partition::ALL.iter().map(Partition::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_partition_display_parse() {
        assert_eq!(format!("{}", Partition::Valid), "valid");
        assert_eq!("validation".parse::<Partition>().unwrap(), Partition::Valid);
        assert!("holdout".parse::<Partition>().is_err());
    }

    #[test]
    fn test_plan_validation() {
        assert!(PartitionPlan::default().validate().is_ok());

        let overlapping = PartitionPlan {
            valid: YearRange::new(2015, 2020),
            ..Default::default()
        };
        assert!(overlapping.validate().is_err());

        let reversed = PartitionPlan {
            test: YearRange::new(2025, 2021),
            ..Default::default()
        };
        assert!(reversed.validate().is_err());
    }
}
