//! Sliding windows with optional lag features.
//!
//! A series `S` of length `N` yields `max(0, N - L - H + 1)` pairs. Pair `i`
//! has input `S[i..i + L]` and target `S[i + L..i + L + H]`. Each lag `k` adds
//! a feature column holding `S[t - k]`, or 0 where `t < k`.

use std::ops::Range;

use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::WindowDataset;
use crate::error::{DataError, Result};

/// Window length, horizon and lag offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Buckets per input window (L).
    pub seq_len: usize,
    /// Buckets per target (H).
    pub horizon: usize,
    /// Lag offsets added as extra features.
    pub lags: Vec<usize>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            seq_len: 12,
            horizon: 1,
            lags: Vec::new(),
        }
    }
}

impl WindowConfig {
    /// Create a config without lags.
    #[must_use]
    pub fn new(seq_len: usize, horizon: usize) -> Self {
        Self {
            seq_len,
            horizon,
            lags: Vec::new(),
        }
    }

    /// Set the lag offsets.
    #[must_use]
    pub fn with_lags(mut self, lags: Vec<usize>) -> Self {
        self.lags = lags;
        self
    }

    /// Check window length, horizon and lags are all at least 1.
    pub fn validate(&self) -> Result<()> {
        if self.seq_len == 0 {
            return Err(DataError::InvalidInput("seq_len must be at least 1".to_string()));
        }
        if self.horizon == 0 {
            return Err(DataError::InvalidInput("horizon must be at least 1".to_string()));
        }
        if self.lags.contains(&0) {
            return Err(DataError::InvalidInput("lag offsets must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Lags sorted ascending without duplicates.
    #[must_use]
    pub fn normalized_lags(&self) -> Vec<usize> {
        let mut lags = self.lags.clone();
        lags.sort_unstable();
        lags.dedup();
        lags
    }

    /// Features per step, the series plus one column per lag.
    #[must_use]
    pub fn n_features(&self) -> usize {
        1 + self.normalized_lags().len()
    }

    /// Points needed for a single pair.
    #[must_use]
    pub fn min_points(&self) -> usize {
        self.seq_len + self.horizon
    }

    /// Pairs produced from a series of length `n`.
    #[must_use]
    pub fn n_windows(&self, n: usize) -> usize {
        n.checked_sub(self.min_points()).map_or(0, |rest| rest + 1)
    }
}

/// Feature matrix `(N, 1 + lags)`: the series followed by its lagged copies.
#[must_use]
pub fn lag_features(series: &[f32], lags: &[usize]) -> Array2<f32> {
    let mut features = Array2::<f32>::zeros((series.len(), 1 + lags.len()));
    for (t, &value) in series.iter().enumerate() {
        features[[t, 0]] = value;
        for (j, &lag) in lags.iter().enumerate() {
            if t >= lag {
                features[[t, j + 1]] = series[t - lag];
            }
        }
    }
    features
}

/// Windowed inputs and targets.
#[derive(Debug, Clone)]
pub struct Windows {
    /// Inputs `(count, L, F)`.
    pub x: Array3<f32>,
    /// Targets `(count, H)`.
    pub y: Array2<f32>,
}

impl Windows {
    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.shape()[0]
    }

    /// Check if no pair was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into a dataset.
    pub fn into_dataset(self) -> Result<WindowDataset> {
        WindowDataset::from_arrays(self.x, self.y)
    }
}

/// Window a whole series.
///
/// # Example
///
/// ```rust
/// use occast_data::{make_windows, WindowConfig};
///
/// let series: Vec<f32> = (0..10).map(|v| v as f32).collect();
/// let windows = make_windows(&series, &WindowConfig::new(4, 2)).unwrap();
/// assert_eq!(windows.len(), 10 - 4 - 2 + 1);
/// assert_eq!(windows.y[[0, 0]], 4.0);
/// ```
pub fn make_windows(series: &[f32], config: &WindowConfig) -> Result<Windows> {
    make_windows_in(series, config, 0..series.len())
}

/// Window the positions in `range`, computing lag features over the full series.
///
/// Every input step and target of a produced pair lies inside `range`, so
/// windows never straddle a partition boundary. Lag columns may still read
/// values before `range.start`.
pub fn make_windows_in(series: &[f32], config: &WindowConfig, range: Range<usize>) -> Result<Windows> {
    config.validate()?;
    if range.start > range.end || range.end > series.len() {
        return Err(DataError::IndexOutOfBounds {
            index: range.end,
            length: series.len(),
        });
    }

    let lags = config.normalized_lags();
    let features = lag_features(series, &lags);
    let n_features = features.ncols();
    let (seq_len, horizon) = (config.seq_len, config.horizon);
    let count = config.n_windows(range.len());

    let mut x = Array3::<f32>::zeros((count, seq_len, n_features));
    let mut y = Array2::<f32>::zeros((count, horizon));

    for i in 0..count {
        let start = range.start + i;
        x.index_axis_mut(Axis(0), i)
            .assign(&features.slice(s![start..start + seq_len, ..]));
        y.index_axis_mut(Axis(0), i)
            .iter_mut()
            .zip(&series[start + seq_len..start + seq_len + horizon])
            .for_each(|(dst, &src)| *dst = src);
    }

    Ok(Windows { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|v| v as f32).collect()
    }

    #[test]
    fn test_window_count() {
        for n in 0..20 {
            for seq_len in 1..6 {
                for horizon in 1..4 {
                    let config = WindowConfig::new(seq_len, horizon);
                    let windows = make_windows(&ramp(n), &config).unwrap();
                    let expected = (n as isize - seq_len as isize - horizon as isize + 1).max(0) as usize;
                    assert_eq!(windows.len(), expected);
                    assert_eq!(windows.y.shape()[0], expected);
                }
            }
        }
    }

    #[test]
    fn test_target_follows_window() {
        let windows = make_windows(&ramp(12), &WindowConfig::new(4, 3)).unwrap();
        for i in 0..windows.len() {
            let last_input = windows.x[[i, 3, 0]];
            assert_eq!(last_input, (i + 3) as f32);
            for h in 0..3 {
                assert_eq!(windows.y[[i, h]], last_input + 1.0 + h as f32);
            }
        }
    }

    #[test]
    fn test_short_series_is_empty_not_error() {
        let windows = make_windows(&ramp(3), &WindowConfig::new(12, 1)).unwrap();
        assert!(windows.is_empty());
        let dataset = windows.into_dataset().unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_lag_features_fill_zero() {
        let features = lag_features(&[1.0, 2.0, 3.0, 4.0], &[1, 3]);
        assert_eq!(features.shape(), &[4, 3]);
        assert_eq!(features.column(1).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(features.column(2).to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_lags_are_normalized() {
        let config = WindowConfig::new(3, 1).with_lags(vec![12, 1, 4, 1]);
        assert_eq!(config.normalized_lags(), vec![1, 4, 12]);
        assert_eq!(config.n_features(), 4);

        let windows = make_windows(&ramp(10), &config).unwrap();
        assert_eq!(windows.x.shape(), &[7, 3, 4]);
        // Step 2 of window 5 is t = 7; lag 4 reads t = 3.
        assert_eq!(windows.x[[5, 2, 2]], 3.0);
        assert_eq!(windows.x[[0, 0, 3]], 0.0);
    }

    #[test]
    fn test_windows_in_range_stay_inside() {
        let series = ramp(20);
        let config = WindowConfig::new(3, 2).with_lags(vec![2]);
        let windows = make_windows_in(&series, &config, 10..16).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows.x[[0, 0, 0]], 10.0);
        // Lag column reads before the range start.
        assert_eq!(windows.x[[0, 0, 1]], 8.0);
        assert_eq!(windows.y[[1, 1]], 15.0);

        assert!(make_windows_in(&series, &config, 10..21).is_err());
    }

    #[test]
    fn test_invalid_config() {
        assert!(WindowConfig::new(0, 1).validate().is_err());
        assert!(WindowConfig::new(3, 0).validate().is_err());
        assert!(WindowConfig::new(3, 1).with_lags(vec![0]).validate().is_err());
    }
}
