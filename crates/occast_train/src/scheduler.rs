//! Learning rate schedulers.

use serde::{Deserialize, Serialize};

/// Trait for learning rate schedulers.
pub trait Scheduler: Send + Sync {
    /// Learning rate at an optimizer step.
    fn get_lr(&self, step: usize) -> f64;

    /// Scheduler name.
    fn name(&self) -> &str;
}

/// Scheduler selection in the trainer config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Fixed learning rate.
    #[default]
    Constant,
    /// Warmup to the base rate, then cosine decay.
    OneCycle,
    /// Cosine decay from the base rate towards zero.
    Cosine,
}

impl SchedulerKind {
    /// Build the scheduler for a base rate and a total step count.
    pub fn build(self, lr: f64, total_steps: usize) -> Box<dyn Scheduler> {
        match self {
            Self::Constant => Box::new(ConstantLR::new(lr)),
            Self::OneCycle => Box::new(OneCycleLR::simple(lr, total_steps)),
            Self::Cosine => Box::new(CosineAnnealingLR::new(lr, lr * 1e-3, total_steps)),
        }
    }
}

/// Constant learning rate.
#[derive(Debug, Clone, Copy)]
pub struct ConstantLR {
    lr: f64,
}

impl ConstantLR {
    /// Create a constant scheduler.
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl Scheduler for ConstantLR {
    fn get_lr(&self, _step: usize) -> f64 {
        self.lr
    }

    fn name(&self) -> &str {
        "ConstantLR"
    }
}

/// One-cycle policy: linear warmup from `max_lr / div_factor`, then cosine
/// decay to `max_lr / final_div_factor`.
#[derive(Debug, Clone)]
pub struct OneCycleLR {
    max_lr: f64,
    total_steps: usize,
    initial_lr: f64,
    final_lr: f64,
    warmup_steps: usize,
}

impl OneCycleLR {
    /// Create a one-cycle scheduler.
    pub fn new(max_lr: f64, total_steps: usize, pct_start: f64, div_factor: f64, final_div_factor: f64) -> Self {
        Self {
            max_lr,
            total_steps,
            initial_lr: max_lr / div_factor,
            final_lr: max_lr / final_div_factor,
            warmup_steps: (total_steps as f64 * pct_start) as usize,
        }
    }

    /// 30% warmup, start at `max_lr / 25`, end at `max_lr / 1e4`.
    pub fn simple(max_lr: f64, total_steps: usize) -> Self {
        Self::new(max_lr, total_steps, 0.3, 25.0, 1e4)
    }
}

impl Scheduler for OneCycleLR {
    fn get_lr(&self, step: usize) -> f64 {
        let step = step.min(self.total_steps.saturating_sub(1));
        if step < self.warmup_steps {
            let progress = step as f64 / self.warmup_steps as f64;
            return self.initial_lr + (self.max_lr - self.initial_lr) * progress;
        }

        let decay_steps = (self.total_steps - self.warmup_steps).max(1);
        let progress = (step - self.warmup_steps) as f64 / decay_steps as f64;
        let cosine = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
        self.final_lr + (self.max_lr - self.final_lr) * cosine
    }

    fn name(&self) -> &str {
        "OneCycleLR"
    }
}

/// Cosine annealing from `initial_lr` to `min_lr`.
#[derive(Debug, Clone)]
pub struct CosineAnnealingLR {
    initial_lr: f64,
    min_lr: f64,
    total_steps: usize,
}

impl CosineAnnealingLR {
    /// Create a cosine annealing scheduler.
    pub fn new(initial_lr: f64, min_lr: f64, total_steps: usize) -> Self {
        Self {
            initial_lr,
            min_lr,
            total_steps,
        }
    }
}

impl Scheduler for CosineAnnealingLR {
    fn get_lr(&self, step: usize) -> f64 {
        let step = step.min(self.total_steps.saturating_sub(1));
        let progress = step as f64 / self.total_steps.max(1) as f64;
        let cosine = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
        self.min_lr + (self.initial_lr - self.min_lr) * cosine
    }

    fn name(&self) -> &str {
        "CosineAnnealingLR"
    }
}
