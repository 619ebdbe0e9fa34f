//! # occast_data
//!
//! From raw occurrence records to batched window tensors.
//!
//! This crate provides:
//! - [`Observation`] and [`aggregate`] for bucketing records into a [`SeriesTable`]
//! - [`share_of_total`] and [`MinMaxScaler`] for normalization
//! - [`WindowConfig`], [`lag_features`] and [`make_windows`] for windowing
//! - [`locate`] and [`locate_dense`] for calendar-year partition boundaries
//! - [`WindowDataset`] and [`WindowDataLoader`] for ordered batched iteration
//! - CSV series files and JSON observation exports
//!
//! ## Example
//!
//! ```rust
//! use occast_core::{BucketKind, Epoch};
//! use occast_data::{aggregate, share_of_total, Observation};
//!
//! let observations = vec![
//!     Observation::new("Bugula neritina", "1980-01-03"),
//!     Observation::new("Schizoporella errata", "1980-02-17"),
//! ];
//! let (table, _report) = aggregate(&observations, &Epoch::default(), BucketKind::Season);
//! let shares = share_of_total(&table);
//! assert_eq!(shares.bucket_sum(0.into()), Some(1.0));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod dataset;
mod error;
mod io;
mod loader;
mod normalize;
mod observation;
mod partition;
mod series;
mod window;

pub use dataset::{WindowDataset, WindowDatasets};
pub use error::{DataError, Result};
pub use io::{read_observations_json, read_series_csv, write_series_csv};
pub use loader::{WindowDataLoader, WindowDataLoaderBuilder, WindowDataLoaderIter, WindowDataLoaders};
pub use normalize::{share_of_total, MinMaxScaler, ShareTable};
pub use observation::{aggregate, AggregationReport, Observation, Resolution};
pub use partition::{locate, locate_dense, PartitionBounds, PartitionSpan};
pub use series::{SeriesRow, SeriesTable};
pub use window::{lag_features, make_windows, make_windows_in, WindowConfig, Windows};
