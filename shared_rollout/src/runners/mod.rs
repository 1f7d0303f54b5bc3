//! Training runners.
//!
//! - [`DistributedTrainer`]: N actor threads filling shared trajectory
//!   slots, L learner threads consuming them through one shared model
//! - [`TrainerConfig`]: run shape, step target, checkpoint location
//! - [`RolloutStorageConfig`]: sizes for the single-process
//!   [`RolloutStorage`](crate::buffers::RolloutStorage)

pub mod distributed_trainer;
pub mod trainer_config;

#[cfg(test)]
mod tests;

pub use distributed_trainer::{DistributedTrainer, TrainError, TrainReport};
pub use trainer_config::{ConfigError, RolloutStorageConfig, TrainerConfig};
