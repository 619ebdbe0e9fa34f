//! Point-forecast metrics.

use burn::prelude::*;

/// Running sums for MAE and RMSE over several batches.
///
/// Batch means cannot be averaged directly when the last batch is short,
/// so the sums are kept per element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorAccumulator {
    abs_sum: f64,
    sq_sum: f64,
    count: usize,
}

impl ErrorAccumulator {
    /// Add a batch of predictions and targets.
    pub fn update<B: Backend>(&mut self, preds: Tensor<B, 2>, targets: Tensor<B, 2>) {
        let [rows, cols] = preds.dims();
        let diff = preds - targets;
        let abs: f32 = diff.clone().abs().sum().into_scalar().elem();
        let sq: f32 = diff.powf_scalar(2.0).sum().into_scalar().elem();
        self.abs_sum += f64::from(abs);
        self.sq_sum += f64::from(sq);
        self.count += rows * cols;
    }

    /// Number of elements seen.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean absolute error, `None` before any update.
    #[must_use]
    pub fn mae(&self) -> Option<f64> {
        (self.count > 0).then(|| self.abs_sum / self.count as f64)
    }

    /// Root mean squared error, `None` before any update.
    #[must_use]
    pub fn rmse(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.sq_sum / self.count as f64).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_mae_rmse() {
        let device = Default::default();
        let mut acc = ErrorAccumulator::default();
        acc.update(
            Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device),
            Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [3.0, 8.0]], &device),
        );
        assert_relative_eq!(acc.mae().unwrap(), 1.5);
        assert_relative_eq!(acc.rmse().unwrap(), 5.0f64.sqrt());
    }

    #[test]
    fn test_accumulator_weights_by_element() {
        let device = Default::default();
        let mut acc = ErrorAccumulator::default();
        assert_eq!(acc.mae(), None);

        acc.update(
            Tensor::<TestBackend, 2>::from_floats([[1.0], [1.0], [1.0]], &device),
            Tensor::<TestBackend, 2>::zeros([3, 1], &device),
        );
        acc.update(
            Tensor::<TestBackend, 2>::from_floats([[5.0]], &device),
            Tensor::<TestBackend, 2>::zeros([1, 1], &device),
        );

        assert_eq!(acc.count(), 4);
        assert_relative_eq!(acc.mae().unwrap(), 2.0);
        assert_relative_eq!(acc.rmse().unwrap(), 7.0f64.sqrt());
    }
}
