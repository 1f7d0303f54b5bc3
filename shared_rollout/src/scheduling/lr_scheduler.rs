//! Learning rate schedulers for the learner loop.
//!
//! Schedules are indexed by the global environment step, which every learner
//! thread reads from the shared counters before calling the update.
//!
//! - `ConstantLR`: Fixed learning rate
//! - `LinearDecay`: Linear interpolation from start to end LR
//!
//! # Data Integrity
//!
//! Non-finite or negative rates trigger a debug panic and are sanitised to
//! 0.0 in release builds. Output is always finite.

/// Learning rate scheduler trait.
pub trait LRScheduler: Send + Sync {
    /// Learning rate at global step `step`.
    fn get_lr(&self, step: u64) -> f64;
}

fn sanitize(name: &str, lr: f64) -> f64 {
    debug_assert!(
        lr.is_finite() && lr >= 0.0,
        "{}: lr must be finite and non-negative, got {}",
        name,
        lr
    );
    if lr.is_finite() && lr >= 0.0 {
        lr
    } else {
        0.0
    }
}

/// Constant learning rate (no scheduling).
#[derive(Debug, Clone)]
pub struct ConstantLR {
    lr: f64,
}

impl ConstantLR {
    pub fn new(lr: f64) -> Self {
        Self {
            lr: sanitize("ConstantLR", lr),
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }
}

impl LRScheduler for ConstantLR {
    fn get_lr(&self, _step: u64) -> f64 {
        self.lr
    }
}

/// Linear decay from `start_lr` to `end_lr` over `total_steps`.
///
/// After `total_steps`, returns `end_lr`. With `end_lr = 0` this is the
/// `lr * (1 - min(step, total) / total)` schedule.
#[derive(Debug, Clone)]
pub struct LinearDecay {
    start_lr: f64,
    end_lr: f64,
    total_steps: u64,
}

impl LinearDecay {
    pub fn new(start_lr: f64, end_lr: f64, total_steps: u64) -> Self {
        debug_assert!(total_steps > 0, "LinearDecay: total_steps must be > 0");
        Self {
            start_lr: sanitize("LinearDecay", start_lr),
            end_lr: sanitize("LinearDecay", end_lr),
            total_steps,
        }
    }

    /// Decay to zero.
    pub fn to_zero(start_lr: f64, total_steps: u64) -> Self {
        Self::new(start_lr, 0.0, total_steps)
    }

    pub fn start_lr(&self) -> f64 {
        self.start_lr
    }

    pub fn end_lr(&self) -> f64 {
        self.end_lr
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}

impl LRScheduler for LinearDecay {
    fn get_lr(&self, step: u64) -> f64 {
        if self.total_steps == 0 {
            return self.start_lr;
        }

        let progress = (step.min(self.total_steps) as f64) / (self.total_steps as f64);
        let lr = self.start_lr + (self.end_lr - self.start_lr) * progress;

        if lr.is_finite() {
            lr
        } else {
            self.end_lr
        }
    }
}
