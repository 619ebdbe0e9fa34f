//! Sequential dataloaders for batched iteration.
//!
//! Windows are served strictly in dataset order. There is no shuffle
//! option: validation loss on autocorrelated series is only meaningful
//! when batches keep their temporal order.

use burn::prelude::*;
use ndarray::{Array2, Array3, Axis};

use crate::dataset::WindowDataset;
use crate::error::{DataError, Result};
use occast_core::{Partition, WindowBatch};

/// A dataloader that produces batches from a dataset in order.
///
/// # Example
///
/// ```rust,ignore
/// use occast_data::{WindowDataset, WindowDataLoader};
///
/// let loader = WindowDataLoader::builder(dataset)
///     .batch_size(8)
///     .build()?;
///
/// for batch in loader.iter::<NdArray>(&device) {
///     let batch = batch?;
/// }
/// ```
pub struct WindowDataLoader {
    dataset: WindowDataset,
    batch_size: usize,
    partition: Partition,
}

impl WindowDataLoader {
    /// Create a new dataloader builder.
    #[must_use]
    pub fn builder(dataset: WindowDataset) -> WindowDataLoaderBuilder {
        WindowDataLoaderBuilder::new(dataset)
    }

    /// Get the dataset.
    #[must_use]
    pub fn dataset(&self) -> &WindowDataset {
        &self.dataset
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Get the number of batches.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Get the total number of windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Check if the loader is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Partition this loader serves.
    #[must_use]
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Create an iterator over batches.
    #[must_use]
    pub fn iter<B: Backend>(&self, device: &B::Device) -> WindowDataLoaderIter<'_, B> {
        WindowDataLoaderIter {
            loader: self,
            device: device.clone(),
            current_batch: 0,
            n_batches: self.n_batches(),
        }
    }
}

/// Builder for [`WindowDataLoader`].
pub struct WindowDataLoaderBuilder {
    dataset: WindowDataset,
    batch_size: usize,
    partition: Partition,
}

impl WindowDataLoaderBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(dataset: WindowDataset) -> Self {
        Self {
            dataset,
            batch_size: 8,
            partition: Partition::Train,
        }
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the partition this loader serves.
    #[must_use]
    pub fn partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    /// Build the dataloader.
    ///
    /// An empty dataset is accepted and yields no batches.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size is 0.
    pub fn build(self) -> Result<WindowDataLoader> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidBatchSize(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        Ok(WindowDataLoader {
            dataset: self.dataset,
            batch_size: self.batch_size,
            partition: self.partition,
        })
    }
}

/// Iterator over batches from a [`WindowDataLoader`].
pub struct WindowDataLoaderIter<'a, B: Backend> {
    loader: &'a WindowDataLoader,
    device: B::Device,
    current_batch: usize,
    n_batches: usize,
}

impl<'a, B: Backend> Iterator for WindowDataLoaderIter<'a, B> {
    type Item = Result<WindowBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_batch >= self.n_batches {
            return None;
        }

        let start = self.current_batch * self.loader.batch_size;
        let end = std::cmp::min(start + self.loader.batch_size, self.loader.dataset.len());
        self.current_batch += 1;

        Some(self.create_batch(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.n_batches - self.current_batch;
        (remaining, Some(remaining))
    }
}

impl<'a, B: Backend> ExactSizeIterator for WindowDataLoaderIter<'a, B> {}

impl<'a, B: Backend> WindowDataLoaderIter<'a, B> {
    fn create_batch(&self, start: usize, end: usize) -> Result<WindowBatch<B>> {
        let dataset = &self.loader.dataset;
        let batch_size = end - start;
        let (seq_len, n_features, horizon) = (dataset.seq_len(), dataset.n_features(), dataset.horizon());

        let mut x_data = Array3::<f32>::zeros((batch_size, seq_len, n_features));
        let mut y_data = Array2::<f32>::zeros((batch_size, horizon));

        for (i, idx) in (start..end).enumerate() {
            let (x_sample, y_sample) = dataset.get(idx)?;
            x_data.index_axis_mut(Axis(0), i).assign(&x_sample);
            y_data.index_axis_mut(Axis(0), i).assign(&y_sample);
        }

        let x_flat: Vec<f32> = x_data.iter().copied().collect();
        let x = Tensor::<B, 1>::from_floats(x_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len, n_features]);

        let y_flat: Vec<f32> = y_data.iter().copied().collect();
        let y = Tensor::<B, 1>::from_floats(y_flat.as_slice(), &self.device).reshape([batch_size, horizon]);

        Ok(WindowBatch::new(x, y)?)
    }
}

/// Paired dataloaders for training and validation.
pub struct WindowDataLoaders {
    train: WindowDataLoader,
    valid: WindowDataLoader,
}

impl WindowDataLoaders {
    /// Create loaders with a shared batch size.
    pub fn new(train: WindowDataset, valid: WindowDataset, batch_size: usize) -> Result<Self> {
        Ok(Self {
            train: WindowDataLoader::builder(train)
                .batch_size(batch_size)
                .partition(Partition::Train)
                .build()?,
            valid: WindowDataLoader::builder(valid)
                .batch_size(batch_size)
                .partition(Partition::Valid)
                .build()?,
        })
    }

    /// Get the training dataloader.
    #[must_use]
    pub fn train(&self) -> &WindowDataLoader {
        &self.train
    }

    /// Get the validation dataloader.
    #[must_use]
    pub fn valid(&self) -> &WindowDataLoader {
        &self.valid
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.train.batch_size()
    }

    /// Features per step.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.train.dataset().n_features()
    }

    /// Sequence length.
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.train.dataset().seq_len()
    }
}
