//! Actor worker: fills trajectory slots with one environment.
//!
//! Each worker owns one [`EnvAdapter`] and one policy replica and cycles
//! through Claiming → Filling → Publishing until it dequeues a stop
//! sentinel:
//!
//! ```text
//!   Free ──claim──→ [t=0: carried frame + output, snapshot state]
//!                   [t=1..=T: act, step, write]
//!                   ──publish──→ Full
//! ```
//!
//! Frame `T` of one rollout becomes frame 0 of the next, so every slot starts
//! with the continuation state of the previous segment.

use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::algorithms::{Policy, PolicyError, PolicyOutput, RecurrentState};
use crate::core::{
    Claim, FreeQueue, FullQueue, ParamSlot, SharedParamSlot, SlotPool, SlotToken, StateBuffer,
};
use crate::environment::{EnvAdapter, EnvError, Environment, Frame};

/// How often an idle worker re-checks the interrupt flag.
pub const DEFAULT_CLAIM_POLL: Duration = Duration::from_millis(50);

// ============================================================================
// Errors
// ============================================================================

/// Fault inside a worker's rollout loop.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerError {
    Env(EnvError),
    Policy(PolicyError),
    /// The environment or policy panicked; carries the panic message.
    Panicked(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Env(err) => write!(f, "{}", err),
            WorkerError::Policy(err) => write!(f, "{}", err),
            WorkerError::Panicked(msg) => write!(f, "worker panicked: {}", msg),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Env(err) => Some(err),
            WorkerError::Policy(err) => Some(err),
            WorkerError::Panicked(_) => None,
        }
    }
}

impl From<EnvError> for WorkerError {
    fn from(err: EnvError) -> Self {
        WorkerError::Env(err)
    }
}

impl From<PolicyError> for WorkerError {
    fn from(err: PolicyError) -> Self {
        WorkerError::Policy(err)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// Configuration and shared handles
// ============================================================================

/// Per-worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker index, used in thread names and logs.
    pub worker_id: usize,
    /// Seed passed to the first environment reset.
    pub seed: u64,
    /// Return the held slot to Free when the worker faults.
    pub reclaim_faulted_slots: bool,
    pub claim_poll: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: 0,
            seed: 0,
            reclaim_faulted_slots: true,
            claim_poll: DEFAULT_CLAIM_POLL,
        }
    }
}

impl WorkerConfig {
    pub fn for_worker(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_reclaim_faulted_slots(mut self, reclaim: bool) -> Self {
        self.reclaim_faulted_slots = reclaim;
        self
    }

    pub fn with_claim_poll(mut self, poll: Duration) -> Self {
        self.claim_poll = poll;
        self
    }
}

/// Everything a worker shares with the rest of the pipeline.
#[derive(Clone)]
pub struct WorkerShared {
    pub pool: Arc<SlotPool>,
    pub states: Arc<StateBuffer>,
    pub free: FreeQueue,
    pub full: FullQueue,
    pub params: SharedParamSlot,
    pub interrupt: Arc<AtomicBool>,
}

impl WorkerShared {
    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Worker
// ============================================================================

/// How a worker left its loop without faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Dequeued a stop sentinel.
    Stopped,
    /// Saw the interrupt flag; any held slot was abandoned.
    Interrupted,
}

/// Sent once by every worker thread when it exits.
#[derive(Debug)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub rollouts: u64,
    pub result: Result<WorkerExit, WorkerError>,
}

pub struct Worker<E: Environment, P: Policy> {
    config: WorkerConfig,
    adapter: EnvAdapter<E>,
    policy: P,
    params_version: u64,
    rollouts: u64,
}

impl<E: Environment, P: Policy> Worker<E, P> {
    pub fn new(config: WorkerConfig, env: E, policy: P) -> Self {
        Self {
            config,
            adapter: EnvAdapter::new(env),
            policy,
            params_version: 0,
            rollouts: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.config.worker_id
    }

    /// Slots published so far.
    pub fn rollouts(&self) -> u64 {
        self.rollouts
    }

    pub fn adapter(&self) -> &EnvAdapter<E> {
        &self.adapter
    }

    /// Run until a stop sentinel, an interrupt or a fault.
    ///
    /// Panics raised by the environment or the policy are caught and
    /// reported as [`WorkerError::Panicked`]. On a fault the held slot is
    /// reclaimed or leaked according to the configuration.
    pub fn run(&mut self, shared: &WorkerShared) -> Result<WorkerExit, WorkerError> {
        let id = self.config.worker_id;
        log::debug!("Actor-{} started", id);

        let mut held: Option<SlotToken> = None;
        let result = catch_unwind(AssertUnwindSafe(|| self.rollout_loop(shared, &mut held)))
            .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(&*payload))));

        match &result {
            Ok(WorkerExit::Stopped) => {
                log::debug!("Actor-{} stopped after {} rollouts", id, self.rollouts);
            }
            Ok(WorkerExit::Interrupted) => {
                if let Some(token) = held.take() {
                    log::debug!("Actor-{} interrupted, abandoning slot {}", id, token.index());
                }
            }
            Err(err) => {
                log::error!("Actor-{} faulted: {}", id, err);
                if let Some(token) = held.take() {
                    if self.config.reclaim_faulted_slots {
                        log::warn!("Actor-{} returning slot {} to free", id, token.index());
                        shared.free.release(token);
                    } else {
                        log::warn!("Actor-{} leaking slot {}", id, token.index());
                    }
                }
            }
        }

        if !matches!(result, Err(WorkerError::Panicked(_))) {
            self.adapter.close();
        }
        result
    }

    fn rollout_loop(
        &mut self,
        shared: &WorkerShared,
        held: &mut Option<SlotToken>,
    ) -> Result<WorkerExit, WorkerError> {
        let num_steps = shared.pool.layout().num_steps();

        self.sync_params(&shared.params)?;
        let mut frame: Frame = self.adapter.reset(self.config.seed)?;
        let mut state: RecurrentState = self.policy.init_state(1);
        // Output for the reset frame; the state is not advanced by it.
        let (mut output, _): (PolicyOutput, _) = self.policy.act(&frame, &state)?;

        loop {
            let claim = loop {
                if shared.interrupted() {
                    return Ok(WorkerExit::Interrupted);
                }
                if let Some(claim) = shared.free.claim_timeout(self.config.claim_poll) {
                    break claim;
                }
            };
            let token = match claim {
                Claim::Stop => return Ok(WorkerExit::Stopped),
                Claim::Slot(token) => held.insert(token),
            };

            self.sync_params(&shared.params)?;
            shared.states.write(token, &state);

            let mut slot = shared.pool.slot_mut(token);
            slot.write_frame(0, &frame);
            slot.write_output(0, &output);

            for t in 1..=num_steps {
                if shared.interrupted() {
                    return Ok(WorkerExit::Interrupted);
                }
                let (next_output, next_state) = self.policy.act(&frame, &state)?;
                frame = self.adapter.step(&next_output.action)?;
                slot.write_frame(t, &frame);
                slot.write_output(t, &next_output);
                output = next_output;
                state = next_state;
            }

            if let Some(token) = held.take() {
                shared.full.publish(token);
                self.rollouts += 1;
            }
        }
    }

    fn sync_params(&mut self, params: &ParamSlot) -> Result<(), WorkerError> {
        if let Some((version, bytes)) = params.newer_than(self.params_version) {
            self.policy.load_params(&bytes)?;
            self.params_version = version;
        }
        Ok(())
    }
}

impl<E, P> Worker<E, P>
where
    E: Environment + 'static,
    P: Policy + 'static,
{
    /// Run on a thread named `Actor-{id}` that reports on `done` when it exits.
    pub fn spawn(
        mut self,
        shared: WorkerShared,
        done: Sender<WorkerReport>,
    ) -> io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name(format!("Actor-{}", self.config.worker_id))
            .spawn(move || {
                let result = self.run(&shared);
                let _ = done.send(WorkerReport {
                    worker_id: self.config.worker_id,
                    rollouts: self.rollouts,
                    result,
                });
            })
    }
}
