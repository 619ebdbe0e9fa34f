//! Window dataset types.

use ndarray::{concatenate, Array2, Array3, ArrayView1, ArrayView2, Axis};

use occast_core::{Partition, WindowShape};

use crate::error::{DataError, Result};

/// A dataset of windows and their targets.
///
/// Stores inputs in the `(N, L, F)` format:
/// - `N`: Number of windows
/// - `L`: Sequence length
/// - `F`: Features per step
///
/// Targets are `(N, H)`.
///
/// # Example
///
/// ```rust
/// use ndarray::{Array2, Array3};
/// use occast_data::WindowDataset;
///
/// let x = Array3::<f32>::zeros((10, 12, 1));
/// let y = Array2::<f32>::zeros((10, 1));
/// let dataset = WindowDataset::from_arrays(x, y).unwrap();
/// assert_eq!(dataset.len(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct WindowDataset {
    /// Inputs (N, L, F)
    x: Array3<f32>,
    /// Targets (N, H)
    y: Array2<f32>,
}

impl WindowDataset {
    /// Create a dataset from arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` hold a different number of windows.
    pub fn from_arrays(x: Array3<f32>, y: Array2<f32>) -> Result<Self> {
        if x.shape()[0] != y.shape()[0] {
            return Err(DataError::InvalidShape(format!(
                "x has {} windows but y has {} targets",
                x.shape()[0],
                y.shape()[0]
            )));
        }
        Ok(Self { x, y })
    }

    /// Create an empty dataset with fixed window dimensions.
    #[must_use]
    pub fn empty(seq_len: usize, n_features: usize, horizon: usize) -> Self {
        Self {
            x: Array3::zeros((0, seq_len, n_features)),
            y: Array2::zeros((0, horizon)),
        }
    }

    /// Number of windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.shape()[0]
    }

    /// Check if the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence length.
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.x.shape()[1]
    }

    /// Features per step.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.x.shape()[2]
    }

    /// Forecast horizon.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.y.shape()[1]
    }

    /// Shape of the inputs.
    #[must_use]
    pub fn shape(&self) -> WindowShape {
        WindowShape::new(self.len(), self.seq_len(), self.n_features())
    }

    /// Inputs.
    #[must_use]
    pub fn x(&self) -> &Array3<f32> {
        &self.x
    }

    /// Targets.
    #[must_use]
    pub fn y(&self) -> &Array2<f32> {
        &self.y
    }

    /// Get a window and its target by index.
    pub fn get(&self, index: usize) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
        if index >= self.len() {
            return Err(DataError::IndexOutOfBounds {
                index,
                length: self.len(),
            });
        }
        Ok((
            self.x.index_axis(Axis(0), index),
            self.y.index_axis(Axis(0), index),
        ))
    }

    /// Join `parts` in order with a single copy.
    ///
    /// Every part must have the given window dimensions. No parts gives an
    /// empty dataset.
    pub fn from_parts(seq_len: usize, n_features: usize, horizon: usize, parts: &[Self]) -> Result<Self> {
        if let Some(bad) = parts
            .iter()
            .find(|p| p.seq_len() != seq_len || p.n_features() != n_features || p.horizon() != horizon)
        {
            return Err(DataError::InvalidShape(format!(
                "cannot join {} (horizon {}) into windows of ({seq_len}, {n_features}) with horizon {horizon}",
                bad.shape(),
                bad.horizon()
            )));
        }
        if parts.is_empty() {
            return Ok(Self::empty(seq_len, n_features, horizon));
        }

        let xs: Vec<_> = parts.iter().map(|p| p.x.view()).collect();
        let ys: Vec<_> = parts.iter().map(|p| p.y.view()).collect();
        let x = concatenate(Axis(0), &xs).map_err(|e| DataError::InvalidShape(e.to_string()))?;
        let y = concatenate(Axis(0), &ys).map_err(|e| DataError::InvalidShape(e.to_string()))?;
        Ok(Self { x, y })
    }
}

/// Datasets for the three partitions.
#[derive(Debug, Clone)]
pub struct WindowDatasets {
    /// Training windows.
    pub train: WindowDataset,
    /// Validation windows.
    pub valid: WindowDataset,
    /// Test windows.
    pub test: WindowDataset,
}

impl WindowDatasets {
    /// Dataset of a partition.
    #[must_use]
    pub fn get(&self, partition: Partition) -> &WindowDataset {
        match partition {
            Partition::Train => &self.train,
            Partition::Valid => &self.valid,
            Partition::Test => &self.test,
        }
    }

    /// Consume and return the dataset of a partition.
    #[must_use]
    pub fn take(self, partition: Partition) -> WindowDataset {
        match partition {
            Partition::Train => self.train,
            Partition::Valid => self.valid,
            Partition::Test => self.test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize, fill: f32) -> WindowDataset {
        let x = Array3::from_elem((n, 4, 2), fill);
        let y = Array2::from_elem((n, 1), fill);
        WindowDataset::from_arrays(x, y).unwrap()
    }

    #[test]
    fn test_mismatched_lengths() {
        let x = Array3::<f32>::zeros((3, 4, 1));
        let y = Array2::<f32>::zeros((2, 1));
        assert!(WindowDataset::from_arrays(x, y).is_err());
    }

    #[test]
    fn test_get() {
        let ds = dataset(3, 1.5);
        let (x, y) = ds.get(2).unwrap();
        assert_eq!(x.shape(), &[4, 2]);
        assert_eq!(y[0], 1.5);
        assert!(matches!(ds.get(3), Err(DataError::IndexOutOfBounds { index: 3, length: 3 })));
    }

    #[test]
    fn test_from_parts_keeps_order() {
        let parts = [dataset(2, 1.0), WindowDataset::empty(4, 2, 1), dataset(3, 2.0), dataset(1, 3.0)];
        let joined = WindowDataset::from_parts(4, 2, 1, &parts).unwrap();
        assert_eq!(joined.shape(), WindowShape::new(6, 4, 2));
        let targets: Vec<f32> = joined.y().iter().copied().collect();
        assert_eq!(targets, vec![1.0, 1.0, 2.0, 2.0, 2.0, 3.0]);

        let none = WindowDataset::from_parts(4, 2, 1, &[]).unwrap();
        assert!(none.is_empty());
        assert_eq!(none.seq_len(), 4);
    }

    #[test]
    fn test_from_parts_rejects_other_shape() {
        let parts = [dataset(2, 0.0), WindowDataset::empty(5, 2, 1)];
        assert!(WindowDataset::from_parts(4, 2, 1, &parts).is_err());
    }
}
