//! Versioned loss registry.
//!
//! A trained artifact stores the [`LossId`] it was trained with instead
//! of the loss itself. Loading resolves that identifier here, so the loss
//! formula never has to be re-specified by the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use occast_models::{LossId, LossRegistry};
//!
//! let mut registry = LossRegistry::<NdArray>::new();
//! registry.register(LossId::new("negative_binomial_nll", 1), || Box::new(NegativeBinomialNll::default()));
//! let loss = registry.resolve(&metadata.loss)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for loss registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No loss registered under this name and version.
    #[error("Unknown loss '{name}' version {version}; registered: {registered}")]
    UnknownLoss {
        /// Requested name.
        name: String,
        /// Requested version.
        version: u32,
        /// Registered identifiers, comma separated.
        registered: String,
    },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Stable identifier of a loss function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LossId {
    /// Loss name.
    pub name: String,
    /// Formula version. Bumped whenever the numerics change.
    pub version: u32,
}

impl LossId {
    /// Create an identifier.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for LossId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

/// A loss over interleaved distribution parameters.
pub trait DistributionLoss<B: Backend> {
    /// Identifier stored alongside trained weights.
    fn id(&self) -> LossId;

    /// Mean loss of `params` (batch, 2H) against `targets` (batch, H).
    fn forward(&self, params: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1>;
}

/// Type alias for loss constructors.
pub type LossConstructor<B> = Arc<dyn Fn() -> Box<dyn DistributionLoss<B>> + Send + Sync>;

/// Registry resolving [`LossId`]s to loss functions.
pub struct LossRegistry<B: Backend> {
    losses: HashMap<LossId, LossConstructor<B>>,
}

impl<B: Backend> Default for LossRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> LossRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            losses: HashMap::new(),
        }
    }

    /// Register a loss constructor.
    pub fn register<F>(&mut self, id: LossId, constructor: F)
    where
        F: Fn() -> Box<dyn DistributionLoss<B>> + Send + Sync + 'static,
    {
        self.losses.insert(id, Arc::new(constructor));
    }

    /// Construct the loss registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownLoss`] if nothing matches both name and version.
    pub fn resolve(&self, id: &LossId) -> Result<Box<dyn DistributionLoss<B>>> {
        let constructor = self.losses.get(id).ok_or_else(|| RegistryError::UnknownLoss {
            name: id.name.clone(),
            version: id.version,
            registered: self
                .list()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })?;
        Ok(constructor())
    }

    /// Registered identifiers, sorted.
    pub fn list(&self) -> Vec<LossId> {
        let mut ids: Vec<LossId> = self.losses.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Check if an identifier is registered.
    pub fn contains(&self, id: &LossId) -> bool {
        self.losses.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    struct SquaredMean;

    impl<B: Backend> DistributionLoss<B> for SquaredMean {
        fn id(&self) -> LossId {
            LossId::new("squared_mean", 2)
        }

        fn forward(&self, params: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
            let (mu, _) = crate::split_params(params);
            (mu - targets).powf_scalar(2.0).mean()
        }
    }

    #[test]
    fn test_resolve_and_reject_unknown_version() {
        let mut registry = LossRegistry::<TestBackend>::new();
        registry.register(LossId::new("squared_mean", 2), || Box::new(SquaredMean));

        let loss = registry.resolve(&LossId::new("squared_mean", 2)).unwrap();
        assert_eq!(loss.id(), LossId::new("squared_mean", 2));

        let device = Default::default();
        let params = Tensor::<TestBackend, 2>::from_floats([[3.0, 1.0]], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats([[1.0]], &device);
        let value = loss.forward(params, targets).into_scalar();
        assert_eq!(value, 4.0);

        match registry.resolve(&LossId::new("squared_mean", 1)) {
            Err(RegistryError::UnknownLoss { version, registered, .. }) => {
                assert_eq!(version, 1);
                assert_eq!(registered, "squared_mean@v2");
            }
            Ok(_) => panic!("version 1 should not resolve"),
        }
        assert!(!registry.contains(&LossId::new("other", 2)));
    }
}
