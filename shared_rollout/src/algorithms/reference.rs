//! Deterministic reference collaborators.
//!
//! [`ReferencePolicy`] and [`ReferenceLearner`] implement the policy and
//! update interfaces without any network. They exist to drive the pipeline
//! end to end (smoke runs, tests) and expose traces of what they observed.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::model_update::{Metrics, ModelBlobs, ModelUpdate, UpdateContext, UpdateError};
use super::policy::{Policy, PolicyError, PolicyOutput, RecurrentState};
use crate::core::slot_pool::Field;
use crate::environment::{Frame, SpaceSpec};
use crate::learner::{Batch, StateBatch};

// ============================================================================
// ReferencePolicy
// ============================================================================

/// Always picks action 0 (or the zero vector for continuous spaces).
///
/// The baseline reports the loaded parameter version, so tests can tell
/// which broadcast a worker was acting with. With a recurrent state
/// enabled, the single state tensor counts decisions taken.
#[derive(Debug, Clone)]
pub struct ReferencePolicy {
    action_dim: usize,
    logits_dim: usize,
    recurrent: bool,
    version: u64,
    acts: u64,
    fail_after: Option<u64>,
}

impl ReferencePolicy {
    pub fn new(action_space: &SpaceSpec) -> Self {
        Self {
            action_dim: action_space.action_dim(),
            logits_dim: action_space.logits_dim(),
            recurrent: false,
            version: 0,
            acts: 0,
            fail_after: None,
        }
    }

    /// Carry a one-element step counter as recurrent state.
    pub fn with_recurrent_state(mut self) -> Self {
        self.recurrent = true;
        self
    }

    /// Return an error from `act` once `acts` decisions were made.
    pub fn failing_after(mut self, acts: u64) -> Self {
        self.fail_after = Some(acts);
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Policy for ReferencePolicy {
    fn init_state(&self, batch: usize) -> RecurrentState {
        if self.recurrent {
            RecurrentState::zeros(&[batch])
        } else {
            RecurrentState::empty()
        }
    }

    fn act(
        &mut self,
        _frame: &Frame,
        state: &RecurrentState,
    ) -> Result<(PolicyOutput, RecurrentState), PolicyError> {
        if self.fail_after.map_or(false, |n| self.acts >= n) {
            return Err(PolicyError::Act(format!(
                "injected failure after {} decisions",
                self.acts
            )));
        }
        self.acts += 1;

        let mut policy_logits = vec![0.0; self.logits_dim];
        if let Some(first) = policy_logits.first_mut() {
            *first = 1.0;
        }
        let output = PolicyOutput {
            action: vec![0.0; self.action_dim],
            baseline: self.version as f32,
            policy_logits,
        };

        let mut next = state.clone();
        for tensor in &mut next.tensors {
            for value in tensor.iter_mut() {
                *value += 1.0;
            }
        }
        Ok((output, next))
    }

    fn load_params(&mut self, bytes: &[u8]) -> Result<(), PolicyError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| PolicyError::Load(format!("expected 8 bytes, got {}", bytes.len())))?;
        self.version = u64::from_le_bytes(raw);
        Ok(())
    }

    fn logits_dim(&self) -> usize {
        self.logits_dim
    }
}

// ============================================================================
// ReferenceLearner
// ============================================================================

/// What a [`ReferenceLearner`] saw during one update.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenUpdate {
    pub learner_id: usize,
    pub global_step: u64,
    pub learning_rate: f64,
    pub slot_indices: Vec<usize>,
    pub batch_size: usize,
    pub num_states: usize,
}

/// Counters shared between a [`ReferenceLearner`] and the test observing it.
#[derive(Debug, Default)]
pub struct UpdateTrace {
    in_update: AtomicUsize,
    max_in_update: AtomicUsize,
    updates: AtomicU64,
    seen: Mutex<Vec<SeenUpdate>>,
}

impl UpdateTrace {
    /// Highest number of `update` calls ever observed running at once.
    pub fn max_in_update(&self) -> usize {
        self.max_in_update.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenUpdate> {
        self.seen.lock().clone()
    }
}

/// Counts updates; the count is the broadcast parameter version.
#[derive(Debug)]
pub struct ReferenceLearner {
    version: u64,
    work: Duration,
    fail_after: Option<u64>,
    trace: Arc<UpdateTrace>,
}

impl ReferenceLearner {
    pub fn new() -> Self {
        Self {
            version: 0,
            work: Duration::ZERO,
            fail_after: None,
            trace: Arc::new(UpdateTrace::default()),
        }
    }

    /// Sleep inside every update to widen race windows.
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    /// Fail the update after `updates` successful ones.
    pub fn failing_after(mut self, updates: u64) -> Self {
        self.fail_after = Some(updates);
        self
    }

    pub fn trace(&self) -> Arc<UpdateTrace> {
        Arc::clone(&self.trace)
    }
}

impl Default for ReferenceLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelUpdate for ReferenceLearner {
    fn update(
        &mut self,
        batch: &Batch,
        states: &StateBatch,
        ctx: &UpdateContext,
    ) -> Result<Metrics, UpdateError> {
        let running = self.trace.in_update.fetch_add(1, Ordering::SeqCst) + 1;
        self.trace.max_in_update.fetch_max(running, Ordering::SeqCst);

        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }

        let result = if self.fail_after.map_or(false, |n| self.version >= n) {
            Err(UpdateError::new(format!(
                "injected failure after {} updates",
                self.version
            )))
        } else {
            self.version += 1;
            self.trace.updates.fetch_add(1, Ordering::SeqCst);
            self.trace.seen.lock().push(SeenUpdate {
                learner_id: ctx.learner_id,
                global_step: ctx.global_step,
                learning_rate: ctx.learning_rate,
                slot_indices: batch.slot_indices().to_vec(),
                batch_size: batch.batch_size(),
                num_states: states.len(),
            });

            let rewards = batch.field(Field::Reward);
            let mean_reward = if rewards.is_empty() {
                0.0
            } else {
                rewards.iter().sum::<f32>() / rewards.len() as f32
            };
            let mut metrics = Metrics::new();
            metrics.insert("mean_reward".to_string(), mean_reward);
            metrics.insert("version".to_string(), self.version as f32);
            Ok(metrics)
        };

        self.trace.in_update.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn policy_params(&self) -> Vec<u8> {
        self.version.to_le_bytes().to_vec()
    }

    fn checkpoint(&self) -> ModelBlobs {
        ModelBlobs {
            actor: self.policy_params(),
            learner: format!("reference-learner updates={}", self.version).into_bytes(),
        }
    }
}
