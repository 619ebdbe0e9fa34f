//! Batches of windows and targets as Burn tensors.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::WindowShape;

/// A batch of input windows paired with their targets.
///
/// This is the structure produced by the window dataloader.
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// Input windows `(B, L, F)`.
    pub x: Tensor<B, 3>,
    /// Targets `(B, H)`.
    pub y: Tensor<B, 2>,
}

impl<B: Backend> WindowBatch<B> {
    /// Create a batch, checking that inputs and targets agree on batch size.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] if the batch sizes differ.
    pub fn new(x: Tensor<B, 3>, y: Tensor<B, 2>) -> Result<Self> {
        let x_batch = x.dims()[0];
        let y_batch = y.dims()[0];

        if x_batch != y_batch {
            return Err(CoreError::ShapeMismatch(format!(
                "x batch size {} != y batch size {}",
                x_batch, y_batch
            )));
        }

        Ok(Self { x, y })
    }

    /// Shape of the input windows.
    #[must_use]
    pub fn shape(&self) -> WindowShape {
        let [batch, seq_len, features] = self.x.dims();
        WindowShape::new(batch, seq_len, features)
    }

    /// Number of windows in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.dims()[0]
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forecast horizon of the targets.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.y.dims()[1]
    }
}
