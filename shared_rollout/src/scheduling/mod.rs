//! Learning rate scheduling module.
//!
//! ## Available Schedulers
//!
//! - [`ConstantLR`]: No scheduling (constant rate)
//! - [`LinearDecay`]: Linear interpolation from start to end LR
//!
//! ## Example
//!
//! ```rust,ignore
//! use shared_rollout::scheduling::{LinearDecay, LRScheduler};
//!
//! // Linear decay from 3e-4 to 0 over 1M environment steps
//! let scheduler = LinearDecay::to_zero(3e-4, 1_000_000);
//! let lr = scheduler.get_lr(global_step);
//! ```

pub mod lr_scheduler;

#[cfg(test)]
mod tests;

pub use lr_scheduler::{ConstantLR, LRScheduler, LinearDecay};
