//! Single-writer rollout storage for on-policy updates without the slot pool.
//!
//! - `RolloutStorage`: `T`-step circular buffer with overlap frame, GAE and
//!   random mini-batch partitioning

pub mod rollout_storage;

pub use rollout_storage::{MiniBatch, MiniBatches, RolloutStep, RolloutStorage};

#[cfg(test)]
mod tests;
