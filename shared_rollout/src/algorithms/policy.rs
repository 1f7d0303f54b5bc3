//! Policy collaborator interface.
//!
//! Actor workers own one [`Policy`] replica each and query it once per
//! environment step, without gradient tracking. The network itself is an
//! external concern; the pipeline only needs:
//!
//! - [`Policy::init_state`]: fresh recurrent state for `batch` sequences
//! - [`Policy::act`]: one decision from the latest frame and carried state
//! - [`Policy::load_params`]: refresh the replica from the learner's broadcast

use std::fmt;

use crate::environment::Frame;

/// Output of a single policy decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutput {
    /// Action to send to the environment, `action_dim` wide.
    pub action: Vec<f32>,
    /// Value estimate of the current state.
    pub baseline: f32,
    /// Distribution parameters the action was drawn from, `logits_dim` wide.
    pub policy_logits: Vec<f32>,
}

/// Opaque recurrent state, stored as flat `f32` tensors.
///
/// Feed-forward policies use an empty state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurrentState {
    pub tensors: Vec<Vec<f32>>,
}

impl RecurrentState {
    pub fn new(tensors: Vec<Vec<f32>>) -> Self {
        Self { tensors }
    }

    /// Stateless policies.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Zero-filled tensors with the given flat sizes.
    pub fn zeros(sizes: &[usize]) -> Self {
        Self {
            tensors: sizes.iter().map(|&n| vec![0.0; n]).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.tensors.iter().map(Vec::len).collect()
    }

    /// Overwrite in place, reusing allocations when the shapes agree.
    pub fn copy_from(&mut self, other: &RecurrentState) {
        if self.sizes() == other.sizes() {
            for (dst, src) in self.tensors.iter_mut().zip(&other.tensors) {
                dst.copy_from_slice(src);
            }
        } else {
            self.tensors.clone_from(&other.tensors);
        }
    }
}

/// Failure raised by a policy replica.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// Forward pass failed.
    Act(String),
    /// Broadcast parameters could not be loaded.
    Load(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::Act(msg) => write!(f, "policy act failed: {}", msg),
            PolicyError::Load(msg) => write!(f, "policy parameter load failed: {}", msg),
        }
    }
}

impl std::error::Error for PolicyError {}

/// Per-worker policy replica.
pub trait Policy: Send {
    /// Fresh recurrent state for `batch` sequences.
    fn init_state(&self, batch: usize) -> RecurrentState;

    /// One decision for `frame`, returning the advanced state.
    fn act(
        &mut self,
        frame: &Frame,
        state: &RecurrentState,
    ) -> Result<(PolicyOutput, RecurrentState), PolicyError>;

    /// Replace the replica's parameters with a serialised snapshot.
    fn load_params(&mut self, bytes: &[u8]) -> Result<(), PolicyError>;

    /// Width of [`PolicyOutput::policy_logits`].
    fn logits_dim(&self) -> usize;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn init_state(&self, batch: usize) -> RecurrentState {
        (**self).init_state(batch)
    }

    fn act(
        &mut self,
        frame: &Frame,
        state: &RecurrentState,
    ) -> Result<(PolicyOutput, RecurrentState), PolicyError> {
        (**self).act(frame, state)
    }

    fn load_params(&mut self, bytes: &[u8]) -> Result<(), PolicyError> {
        (**self).load_params(bytes)
    }

    fn logits_dim(&self) -> usize {
        (**self).logits_dim()
    }
}
