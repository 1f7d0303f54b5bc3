//! Model update collaborator interface.
//!
//! The learner side of the pipeline owns exactly one [`ModelUpdate`]
//! instance behind a mutex shared by every learner thread; `update` is the
//! only place model parameters change.

use std::collections::BTreeMap;
use std::fmt;

use crate::learner::{Batch, StateBatch};

/// Scalar diagnostics returned by an update (losses, mean return, ...).
pub type Metrics = BTreeMap<String, f32>;

/// Per-call context handed to [`ModelUpdate::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateContext {
    pub learner_id: usize,
    /// Global environment steps consumed before this update.
    pub global_step: u64,
    /// Learning rate from the configured schedule.
    pub learning_rate: f64,
}

/// Serialised networks written at the end of training.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelBlobs {
    /// Acting network, as broadcast to workers.
    pub actor: Vec<u8>,
    /// Learner network (and whatever optimizer state it chooses to keep).
    pub learner: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateError {
    message: String,
}

impl UpdateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model update failed: {}", self.message)
    }
}

impl std::error::Error for UpdateError {}

pub trait ModelUpdate: Send {
    /// One optimiser step on a time-major batch.
    fn update(
        &mut self,
        batch: &Batch,
        states: &StateBatch,
        ctx: &UpdateContext,
    ) -> Result<Metrics, UpdateError>;

    /// Parameters to broadcast to actor replicas.
    fn policy_params(&self) -> Vec<u8>;

    /// Blobs for the end-of-run checkpoint.
    fn checkpoint(&self) -> ModelBlobs;
}
