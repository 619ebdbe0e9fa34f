//! Window tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape of a batch of windows, `(B, L, F)`.
///
/// # Example
///
/// ```rust
/// use occast_core::WindowShape;
///
/// let shape = WindowShape::new(8, 12, 3);
/// assert_eq!(shape.seq_len(), 12);
/// assert_eq!(shape.numel(), 8 * 12 * 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowShape {
    batch: usize,
    seq_len: usize,
    features: usize,
}

impl WindowShape {
    /// Create a new shape.
    #[must_use]
    pub const fn new(batch: usize, seq_len: usize, features: usize) -> Self {
        Self {
            batch,
            seq_len,
            features,
        }
    }

    /// Create a shape from tensor dimensions `[batch, seq_len, features]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 3 elements.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match dims {
            [batch, seq_len, features] => Ok(Self::new(*batch, *seq_len, *features)),
            _ => Err(CoreError::DimensionError {
                expected: 3,
                got: dims.len(),
            }),
        }
    }

    /// Batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Window length.
    #[must_use]
    pub const fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Features per step.
    #[must_use]
    pub const fn features(&self) -> usize {
        self.features
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.batch == 0 || self.seq_len == 0 || self.features == 0
    }

    /// Total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.batch * self.seq_len * self.features
    }

    /// As `[batch, seq_len, features]`.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.batch, self.seq_len, self.features]
    }

    /// Same window layout with a different batch size.
    #[must_use]
    pub const fn with_batch(&self, batch: usize) -> Self {
        Self {
            batch,
            seq_len: self.seq_len,
            features: self.features,
        }
    }

    /// Check a single window layout matches, ignoring the batch size.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidShape`] on mismatch.
    pub fn check_window(&self, seq_len: usize, features: usize) -> Result<()> {
        if self.seq_len != seq_len || self.features != features {
            return Err(CoreError::InvalidShape {
                expected: format!("(_, {seq_len}, {features})"),
                got: format!("({}, {}, {})", self.batch, self.seq_len, self.features),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for WindowShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.batch, self.seq_len, self.features)
    }
}
