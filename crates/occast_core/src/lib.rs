//! # occast_core
//!
//! Core types and traits for occast species-occurrence forecasting.
//!
//! This crate provides:
//! - [`Epoch`], [`BucketKind`] and [`BucketIndex`] for calendar bucket arithmetic
//! - [`Partition`], [`YearRange`] and [`PartitionPlan`] for calendar-year splits
//! - [`Seed`] for deterministic random number generation
//! - [`WindowShape`] and [`WindowBatch`] for window tensor metadata
//! - [`DistributionParams`], [`ForecastingModel`] and [`WindowForecaster`]
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Windows follow the convention `(B, L, F)`:
//! - `B`: Batch size (number of windows)
//! - `L`: Sequence length (buckets per window)
//! - `F`: Features (the series itself plus one column per lag)
//!
//! ## Example
//!
//! ```rust
//! use occast_core::{BucketKind, Epoch};
//!
//! let epoch = Epoch::default(); // January 1980
//! let season = epoch.bucket(BucketKind::Season, 2021, 1).unwrap();
//! assert_eq!(season.value(), (2021 - 1980) * 4);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod bucket;
mod error;
mod model_trait;
mod partition;
mod seed;
mod shape;

pub use batch::WindowBatch;
pub use bucket::{BucketIndex, BucketKind, Epoch};
pub use error::{CoreError, Result};
pub use model_trait::{DistributionParams, ForecastingModel, WindowForecaster};
pub use partition::{Partition, PartitionPlan, YearRange};
pub use seed::Seed;
pub use shape::WindowShape;
