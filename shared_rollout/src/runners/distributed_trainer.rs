//! Distributed actor/learner trainer.
//!
//! Wires the pipeline together and supervises it:
//!
//! ```text
//!                 ┌──────────── ParamSlot ◄─────────────┐
//!                 ▼                                     │
//! ┌───────────────────────┐   Full    ┌─────────────────┴──────┐
//! │ Actor-0..N            │ ────────► │ Learner-0..L           │
//! │ (env + policy replica)│           │ (shared model + mutex) │
//! └───────────────────────┘ ◄──────── └────────────────────────┘
//!              │               Free                 │
//!              └──────► SlotPool + StateBuffer ◄────┘
//! ```
//!
//! The calling thread runs the reporting loop. Training ends when the
//! learners reach the step target, a learner faults, every actor has
//! exited, or the interrupt flag is raised. Shutdown always stops and joins
//! the learners first, then saves the checkpoint (success and interrupt
//! only), then stops the actors with one sentinel each and a bounded wait.

use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::trainer_config::{ConfigError, TrainerConfig};
use crate::actors::worker::panic_message;
use crate::actors::{ActorSupervisor, ShutdownReport, Worker, WorkerConfig, WorkerShared};
use crate::algorithms::{Metrics, ModelUpdate, Policy, UpdateError};
use crate::checkpoint::{CheckpointError, CheckpointPaths, Checkpointer};
use crate::core::{
    global_counters, index_queues, param_slot_with, SharedCounters, SlotLayout, SlotPool,
    StateBuffer,
};
use crate::environment::{Environment, SpaceSpec};
use crate::learner::{BatchSampler, Learner, LearnerConfig, LearnerHandle, LearnerShared};
use crate::metrics::{MetricsLogger, TrainingSnapshot};
use crate::scheduling::{ConstantLR, LRScheduler, LinearDecay};

/// Upper bound on how long the reporting loop sleeps between checks.
const SUPERVISION_TICK: Duration = Duration::from_millis(20);

// ============================================================================
// Errors and report
// ============================================================================

/// Top-level training error.
#[derive(Debug)]
pub enum TrainError {
    /// Rejected before any thread started.
    Config(ConfigError),
    /// A learner's update failed; the run was stopped.
    Update(UpdateError),
    /// A learner thread panicked.
    LearnerPanicked(String),
    /// Every actor exited before the step target was reached.
    NoActiveActors { faulted: usize },
    Checkpoint(CheckpointError),
    /// A worker or learner thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainError::Config(e) => write!(f, "configuration error: {}", e),
            TrainError::Update(e) => write!(f, "learner update failed: {}", e),
            TrainError::LearnerPanicked(msg) => write!(f, "learner panicked: {}", msg),
            TrainError::NoActiveActors { faulted } => {
                write!(f, "all actors exited ({} faulted)", faulted)
            }
            TrainError::Checkpoint(e) => write!(f, "checkpoint failed: {}", e),
            TrainError::Spawn(e) => write!(f, "failed to spawn thread: {}", e),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainError::Config(e) => Some(e),
            TrainError::Update(e) => Some(e),
            TrainError::Checkpoint(e) => Some(e),
            TrainError::Spawn(e) => Some(e),
            TrainError::LearnerPanicked(_) | TrainError::NoActiveActors { .. } => None,
        }
    }
}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        TrainError::Config(e)
    }
}

impl From<UpdateError> for TrainError {
    fn from(e: UpdateError) -> Self {
        TrainError::Update(e)
    }
}

impl From<CheckpointError> for TrainError {
    fn from(e: CheckpointError) -> Self {
        TrainError::Checkpoint(e)
    }
}

/// Summary of a finished training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub global_step: u64,
    pub global_episode: u64,
    pub updates: u64,
    /// The run ended through the interrupt flag.
    pub interrupted: bool,
    pub last_metrics: Option<Metrics>,
    pub checkpoint: Option<CheckpointPaths>,
    pub shutdown: ShutdownReport,
}

// ============================================================================
// Trainer
// ============================================================================

pub struct DistributedTrainer {
    config: TrainerConfig,
    interrupt: Arc<AtomicBool>,
}

impl DistributedTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Flag that stops the run when raised.
    ///
    /// Actors exit at their next step without publishing; learners are
    /// stopped and joined and the checkpoint is still written. The trainer
    /// only reads the flag; lowering it again is up to the caller.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    fn scheduler(&self) -> Arc<dyn LRScheduler> {
        if self.config.lr_decay {
            Arc::new(LinearDecay::to_zero(
                self.config.learning_rate,
                self.config.num_train_steps,
            ))
        } else {
            Arc::new(ConstantLR::new(self.config.learning_rate))
        }
    }

    /// Check environments and policy replicas against each other.
    fn check_compatibility<E: Environment, P: Policy>(
        &self,
        envs: &[E],
        policies: &[P],
    ) -> Result<(SpaceSpec, SpaceSpec), ConfigError> {
        if envs.len() != self.config.num_actors {
            return Err(ConfigError::EnvCountMismatch {
                expected: self.config.num_actors,
                actual: envs.len(),
            });
        }
        let observation = envs[0].observation_space();
        let action = envs[0].action_space();
        for (i, env) in envs.iter().enumerate().skip(1) {
            if env.observation_space() != observation {
                return Err(ConfigError::Incompatible(format!(
                    "environment {} observation space differs from environment 0",
                    i
                )));
            }
            if env.action_space() != action {
                return Err(ConfigError::Incompatible(format!(
                    "environment {} action space differs from environment 0",
                    i
                )));
            }
        }
        for (i, policy) in policies.iter().enumerate() {
            if policy.logits_dim() != action.logits_dim() {
                return Err(ConfigError::Incompatible(format!(
                    "policy {} produces {} logits, action space needs {}",
                    i,
                    policy.logits_dim(),
                    action.logits_dim()
                )));
            }
        }
        Ok((observation, action))
    }

    /// Run training to completion.
    ///
    /// `envs` holds one environment per actor. `policy_factory` builds the
    /// policy replica for actor `i`. `learner` is the update collaborator
    /// shared by all learner threads.
    pub fn train<E, P, PF, M, L>(
        &self,
        envs: Vec<E>,
        mut policy_factory: PF,
        learner: M,
        logger: &mut L,
    ) -> Result<TrainReport, TrainError>
    where
        E: Environment + 'static,
        P: Policy + 'static,
        PF: FnMut(usize) -> P,
        M: ModelUpdate + 'static,
        L: MetricsLogger + ?Sized,
    {
        let config = &self.config;
        config.validate()?;
        let report_interval = config.report_interval()?;
        let join_timeout = config.join_timeout()?;
        let policies: Vec<P> = (0..envs.len()).map(&mut policy_factory).collect();
        let (observation, action) = self.check_compatibility(&envs, &policies)?;

        // Shared state
        let layout = SlotLayout::from_spaces(&observation, &action, config.num_steps);
        let (pool, tokens) = SlotPool::allocate(config.num_slots, layout);
        let states = StateBuffer::new(&pool, &policies[0].init_state(1));
        let (free, full) = index_queues(config.num_slots, config.num_actors);
        let params = param_slot_with(learner.policy_params());
        let counters = global_counters(config.recent_episodes_window);
        for token in tokens {
            free.release(token);
        }

        log::info!(
            "training with {} actors, {} learners, {} slots of {} steps, batch {}",
            config.num_actors,
            config.num_learners,
            config.num_slots,
            config.num_steps,
            config.batch_size
        );

        // Actors
        let worker_shared = WorkerShared {
            pool: Arc::clone(&pool),
            states: Arc::clone(&states),
            free: free.clone(),
            full: full.clone(),
            params: Arc::clone(&params),
            interrupt: Arc::clone(&self.interrupt),
        };
        let mut supervisor = ActorSupervisor::new(free.clone());
        for (i, (env, policy)) in envs.into_iter().zip(policies).enumerate() {
            let worker_config = WorkerConfig::for_worker(i)
                .with_seed(config.worker_seed(i))
                .with_reclaim_faulted_slots(config.reclaim_faulted_slots);
            let worker = Worker::new(worker_config, env, policy);
            if let Err(e) = supervisor.spawn(worker, worker_shared.clone()) {
                supervisor.shutdown(join_timeout);
                return Err(TrainError::Spawn(e));
            }
        }

        // Learners
        let stop = Arc::new(AtomicBool::new(false));
        let scheduler = self.scheduler();
        let learner_shared = LearnerShared {
            sampler: Arc::new(BatchSampler::new(
                Arc::clone(&pool),
                Arc::clone(&states),
                free.clone(),
                full.clone(),
            )),
            model: Arc::new(Mutex::new(learner)),
            params: Arc::clone(&params),
            counters: Arc::clone(&counters),
            scheduler: Arc::clone(&scheduler),
            last_metrics: Arc::new(Mutex::new(None)),
            stop: Arc::clone(&stop),
        };
        let learner_config = LearnerConfig::new(config.batch_size, config.num_train_steps);
        let mut learners: Vec<LearnerHandle> = Vec::with_capacity(config.num_learners);
        for id in 0..config.num_learners {
            match Learner::new(id, learner_config.clone()).spawn(learner_shared.clone()) {
                Ok(handle) => learners.push(handle),
                Err(e) => {
                    stop.store(true, Ordering::Release);
                    let _ = join_learners(learners);
                    supervisor.shutdown(join_timeout);
                    return Err(TrainError::Spawn(e));
                }
            }
        }

        // Reporting loop
        let tick = SUPERVISION_TICK.min(report_interval);
        let mut reporter = Reporter::new(
            Arc::clone(&counters),
            Arc::clone(&learner_shared.last_metrics),
            scheduler,
        );
        let mut interrupted = false;
        let mut actors_gone = None;

        loop {
            std::thread::sleep(tick);

            if self.interrupt.load(Ordering::Acquire) {
                log::warn!("interrupt received, shutting down");
                interrupted = true;
                break;
            }
            if learners.iter().all(LearnerHandle::is_finished) {
                break;
            }
            if supervisor.finished_count() == supervisor.len() {
                let faulted = supervisor.faulted_count();
                log::error!("all {} actors exited ({} faulted)", supervisor.len(), faulted);
                actors_gone = Some(faulted);
                break;
            }
            if reporter.due(report_interval) {
                reporter.emit(logger);
            }
        }

        // Shutdown: learners, checkpoint, actors.
        stop.store(true, Ordering::Release);
        let learner_result = join_learners(learners);
        reporter.emit(logger);
        logger.flush();

        let mut outcome = match (learner_result, actors_gone) {
            (Err(e), _) => Err(e),
            (Ok(()), Some(faulted)) => Err(TrainError::NoActiveActors { faulted }),
            (Ok(()), None) => Ok(()),
        };

        let mut checkpoint = None;
        if outcome.is_ok() {
            let blobs = learner_shared.model.lock().checkpoint();
            match Checkpointer::new(&config.model_dir).save(&blobs) {
                Ok(paths) => checkpoint = Some(paths),
                Err(e) => outcome = Err(TrainError::Checkpoint(e)),
            }
        }

        let shutdown = supervisor.shutdown(join_timeout);
        outcome?;

        let snapshot = counters.snapshot();
        log::info!(
            "training finished: {} steps, {} episodes, {} updates in {:.1}s",
            snapshot.global_step,
            snapshot.global_episode,
            snapshot.updates,
            reporter.elapsed_secs()
        );
        let last_metrics = learner_shared.last_metrics.lock().clone();
        Ok(TrainReport {
            global_step: snapshot.global_step,
            global_episode: snapshot.global_episode,
            updates: snapshot.updates,
            interrupted,
            last_metrics,
            checkpoint,
            shutdown,
        })
    }
}

/// Join every learner; the first failure wins.
fn join_learners(learners: Vec<LearnerHandle>) -> Result<(), TrainError> {
    let mut result = Ok(());
    for handle in learners {
        let id = handle.id();
        let error = match handle.join() {
            Ok(Ok(summary)) => {
                log::debug!(
                    "Learner-{} joined ({:?}, {} updates)",
                    id,
                    summary.exit,
                    summary.updates
                );
                None
            }
            Ok(Err(e)) => Some(TrainError::Update(e)),
            Err(payload) => Some(TrainError::LearnerPanicked(panic_message(&*payload))),
        };
        if let Some(e) = error {
            log::error!("Learner-{} failed: {}", id, e);
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

/// Periodic report state for the supervising thread.
struct Reporter {
    counters: SharedCounters,
    last_metrics: Arc<Mutex<Option<Metrics>>>,
    scheduler: Arc<dyn LRScheduler>,
    start: Instant,
    last_report: Instant,
    last_step: u64,
}

impl Reporter {
    fn new(
        counters: SharedCounters,
        last_metrics: Arc<Mutex<Option<Metrics>>>,
        scheduler: Arc<dyn LRScheduler>,
    ) -> Self {
        let now = Instant::now();
        Self {
            counters,
            last_metrics,
            scheduler,
            start: now,
            last_report: now,
            last_step: 0,
        }
    }

    fn due(&self, interval: Duration) -> bool {
        self.last_report.elapsed() >= interval
    }

    fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn emit<L: MetricsLogger + ?Sized>(&mut self, logger: &mut L) {
        let snapshot = self.counters.snapshot();
        let since = self.last_report.elapsed().as_secs_f64();
        let fps = if since > 0.0 {
            snapshot.global_step.saturating_sub(self.last_step) as f64 / since
        } else {
            0.0
        };
        let metrics = self.last_metrics.lock().clone().unwrap_or_default();

        logger.log(
            &TrainingSnapshot::new(snapshot.global_step, snapshot.global_episode)
                .with_episodes(snapshot.mean_return, snapshot.mean_length)
                .with_timing(fps, self.elapsed_secs())
                .with_learning_rate(self.scheduler.get_lr(snapshot.global_step))
                .with_metrics(metrics),
        );
        self.last_step = snapshot.global_step;
        self.last_report = Instant::now();
    }
}
