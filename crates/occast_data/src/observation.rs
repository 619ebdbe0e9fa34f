//! Raw occurrence records and their aggregation into a [`SeriesTable`].
//!
//! Aggregation never fails on a bad record. Each record either lands in
//! exactly one (species, bucket) cell or is counted as skipped in the
//! [`AggregationReport`].
//!
//! Two date policies apply:
//! - a record with no event date but a known year is counted in month 1 of
//!   that year (reported as `defaulted_to_first_month`);
//! - a record whose event date cannot be parsed is dropped, even when its
//!   year is known.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use occast_core::{BucketKind, Epoch};

use crate::series::SeriesTable;

/// A single occurrence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Species name.
    pub species: String,
    /// Taxonomic class, if known.
    #[serde(default)]
    pub class_name: Option<String>,
    /// Event date, `YYYY-MM-DD` optionally followed by `T...` or `/...`.
    #[serde(default)]
    pub event_date: Option<String>,
    /// Year of the event, used when the date is missing.
    #[serde(default)]
    pub year: Option<i32>,
}

impl Observation {
    /// Create an observation with an event date.
    pub fn new(species: impl Into<String>, event_date: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            class_name: None,
            event_date: Some(event_date.into()),
            year: None,
        }
    }

    /// Create an observation that only knows its year.
    pub fn year_only(species: impl Into<String>, year: i32) -> Self {
        Self {
            species: species.into(),
            class_name: None,
            event_date: None,
            year: Some(year),
        }
    }

    /// Set the year field.
    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Set the taxonomic class.
    #[must_use]
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Resolve the calendar month this record belongs to.
    pub fn resolve_month(&self) -> Resolution {
        if self.species.trim().is_empty() {
            return Resolution::Malformed;
        }

        let date = self
            .event_date
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty());

        match (date, self.year) {
            (Some(raw), _) => match parse_event_date(raw) {
                Some(date) => Resolution::Dated {
                    year: date.year(),
                    month: date.month(),
                },
                None => Resolution::Malformed,
            },
            (None, Some(year)) => Resolution::YearOnly { year },
            (None, None) => Resolution::Malformed,
        }
    }
}

/// Outcome of resolving an observation's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Full date available.
    Dated {
        /// Calendar year.
        year: i32,
        /// Calendar month (1..=12).
        month: u32,
    },
    /// Only the year is known; the record is counted in month 1.
    YearOnly {
        /// Calendar year.
        year: i32,
    },
    /// Unusable record.
    Malformed,
}

fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split(|c| c == 'T' || c == '/').next()?.trim();
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Counts collected while aggregating observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationReport {
    /// Records counted into the table.
    pub accepted: usize,
    /// Accepted records that had only a year and were placed in month 1.
    pub defaulted_to_first_month: usize,
    /// Records dropped for an unparseable date or missing fields.
    pub skipped_malformed: usize,
    /// Records dated before the epoch.
    pub skipped_before_epoch: usize,
}

impl AggregationReport {
    /// Records dropped for any reason.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_malformed + self.skipped_before_epoch
    }

    /// All records seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.accepted + self.skipped()
    }
}

/// Aggregate observations into per-(species, bucket) counts.
///
/// # Example
///
/// ```rust
/// use occast_core::{BucketKind, BucketIndex, Epoch};
/// use occast_data::{aggregate, Observation};
///
/// let observations = vec![
///     Observation::new("Disporella hispida", "1980-02-11T09:30:00"),
///     Observation::year_only("Disporella hispida", 1980),
///     Observation::new("Disporella hispida", "not a date"),
/// ];
/// let (table, report) = aggregate(&observations, &Epoch::default(), BucketKind::Season);
/// assert_eq!(table.count("Disporella hispida", BucketIndex::new(0)), 2);
/// assert_eq!(report.skipped_malformed, 1);
/// ```
pub fn aggregate<'a, I>(observations: I, epoch: &Epoch, kind: BucketKind) -> (SeriesTable, AggregationReport)
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut table = SeriesTable::new(kind);
    let mut report = AggregationReport::default();

    for observation in observations {
        let (year, month, defaulted) = match observation.resolve_month() {
            Resolution::Dated { year, month } => (year, month, false),
            Resolution::YearOnly { year } => (year, 1, true),
            Resolution::Malformed => {
                tracing::debug!(
                    species = %observation.species,
                    event_date = ?observation.event_date,
                    "skipping malformed observation"
                );
                report.skipped_malformed += 1;
                continue;
            }
        };

        let Some(bucket) = epoch.bucket(kind, year, month) else {
            tracing::debug!(species = %observation.species, year, month, "skipping observation before epoch");
            report.skipped_before_epoch += 1;
            continue;
        };

        table.add_count(&observation.species, bucket, 1);
        if let Some(class_name) = &observation.class_name {
            table.set_class(&observation.species, class_name);
        }

        report.accepted += 1;
        if defaulted {
            report.defaulted_to_first_month += 1;
        }
    }

    tracing::info!(
        accepted = report.accepted,
        defaulted = report.defaulted_to_first_month,
        malformed = report.skipped_malformed,
        before_epoch = report.skipped_before_epoch,
        species = table.n_species(),
        "aggregated observations"
    );

    (table, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use occast_core::BucketIndex;

    #[test]
    fn test_resolve_month() {
        let dated = Observation::new("a", "2019-05-03T10:00:00");
        assert_eq!(dated.resolve_month(), Resolution::Dated { year: 2019, month: 5 });

        let interval = Observation::new("a", "2019-05-01/2019-05-31");
        assert_eq!(interval.resolve_month(), Resolution::Dated { year: 2019, month: 5 });

        let year_only = Observation::year_only("a", 2001);
        assert_eq!(year_only.resolve_month(), Resolution::YearOnly { year: 2001 });

        let blank_date = Observation::new("a", "  ").with_year(2001);
        assert_eq!(blank_date.resolve_month(), Resolution::YearOnly { year: 2001 });

        let garbage = Observation::new("a", "03/05/2019").with_year(2019);
        assert_eq!(garbage.resolve_month(), Resolution::Malformed);

        let nameless = Observation::new(" ", "2019-05-03");
        assert_eq!(nameless.resolve_month(), Resolution::Malformed);
    }

    #[test]
    fn test_missing_date_goes_to_first_month() {
        let epoch = Epoch::default();
        let observations = vec![Observation::year_only("a", 1985)];
        let (table, report) = aggregate(&observations, &epoch, BucketKind::Month);

        let january = epoch.month_index(1985, 1).unwrap();
        assert_eq!(table.count("a", january), 1);
        assert_eq!(report.defaulted_to_first_month, 1);
        assert_eq!(report.accepted, 1);
    }

    #[test]
    fn test_aggregation_tolerates_malformed_records() {
        let epoch = Epoch::default();
        let observations = vec![
            Observation::new("a", "1980-01-15"),
            Observation::new("a", "1980-03-31"),
            Observation::new("a", "1980-04-01"),
            Observation::new("b", "1980-13-01"),
            Observation::new("b", "1975-06-01"),
            Observation {
                species: "c".to_string(),
                class_name: Some("Gymnolaemata".to_string()),
                event_date: None,
                year: None,
            },
            Observation::new("c", "1981-01-01").with_class("Gymnolaemata"),
        ];

        let (table, report) = aggregate(&observations, &epoch, BucketKind::Season);

        assert_eq!(table.count("a", BucketIndex::new(0)), 2);
        assert_eq!(table.count("a", BucketIndex::new(1)), 1);
        assert_eq!(table.count("c", BucketIndex::new(4)), 1);
        assert_eq!(table.class_of("c"), Some("Gymnolaemata"));
        assert!(!table.contains_species("b"));

        assert_eq!(report.accepted, 4);
        assert_eq!(report.skipped_malformed, 2);
        assert_eq!(report.skipped_before_epoch, 1);
        assert_eq!(report.total(), observations.len());
    }
}
