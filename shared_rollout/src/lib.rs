//! # Shared Rollout: Actor/Learner Training over a Shared Slot Pool
//!
//! A parallel actor/learner pipeline. Actor threads step their own
//! environment with a local policy replica and write fixed-length
//! trajectories into preallocated slots; learner threads gather batches of
//! full slots, update one shared model and broadcast fresh policy
//! parameters back to the actors.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Actor-0           Actor-1            Actor-N                    │
//! │  ┌────────┐        ┌────────┐         ┌────────┐                 │
//! │  │env     │        │env     │         │env     │                 │
//! │  │policy  │        │policy  │         │policy  │                 │
//! │  └───┬────┘        └───┬────┘         └───┬────┘                 │
//! │      │   claim Free    │   publish Full   │                      │
//! │      └─────────────────┼──────────────────┘                      │
//! │                        ▼                                         │
//! │        ┌──────────────────────────┐     ┌─────────────┐          │
//! │        │ SlotPool + StateBuffer   │     │  ParamSlot  │◄──┐      │
//! │        │ (T+1 frames per slot)    │     │ (versioned) │   │      │
//! │        └────────────┬─────────────┘     └─────────────┘   │      │
//! │                     ▼                                     │      │
//! │        ┌──────────────────────────┐                       │      │
//! │        │ Learner-0..L             │───────────────────────┘      │
//! │        │ (one model behind mutex) │                              │
//! │        └──────────────────────────┘                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Slot ownership is carried by move-only [`SlotToken`]s that travel through
//! the Free and Full queues, so at any moment every index is in exactly one
//! place: Free, held by an actor, Full, or held by a learner.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shared_rollout::{
//!     ConsoleLogger, CountdownEnv, DistributedTrainer, ReferenceLearner, ReferencePolicy,
//!     SpaceSpec, TrainerConfig,
//! };
//!
//! let config = TrainerConfig::new()
//!     .with_num_actors(4)
//!     .with_num_steps(20)
//!     .with_num_train_steps(100_000);
//! let envs = (0..4).map(|_| CountdownEnv::new(50)).collect();
//! let trainer = DistributedTrainer::new(config);
//! let report = trainer.train(
//!     envs,
//!     |_| ReferencePolicy::new(&SpaceSpec::discrete(2)),
//!     ReferenceLearner::new(),
//!     &mut ConsoleLogger::new(),
//! )?;
//! ```

pub mod actors;
pub mod algorithms;
pub mod buffers;
pub mod checkpoint;
pub mod core;
pub mod environment;
pub mod learner;
pub mod metrics;
pub mod runners;
pub mod scheduling;

// Shared state
pub use crate::core::{
    global_counters, index_queues, param_slot, param_slot_with, Claim, EpisodeState, Field,
    FreeQueue, FullQueue, GlobalCounters, ParamSlot, SharedCounters, SharedParamSlot,
    SlotLayout, SlotPool, SlotToken, StateBuffer,
};

// Environment interface
pub use environment::{
    CountdownEnv, DType, EnvAdapter, EnvError, EnvStep, Environment, Frame, SpaceKind, SpaceSpec,
};

// Policy and update collaborators
pub use algorithms::{
    compute_gae, normalize_advantages, Metrics, ModelBlobs, ModelUpdate, Policy, PolicyError,
    PolicyOutput, RecurrentState, ReferenceLearner, ReferencePolicy, UpdateContext, UpdateError,
};

// Actors and learners
pub use actors::{ActorSupervisor, ShutdownReport, Worker, WorkerConfig, WorkerError};
pub use learner::{Batch, BatchSampler, Learner, LearnerConfig, StateBatch};

// Single-process rollout storage
pub use buffers::{MiniBatch, RolloutStorage};

// Training
pub use runners::{
    ConfigError, DistributedTrainer, RolloutStorageConfig, TrainError, TrainReport,
    TrainerConfig,
};

pub use metrics::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
pub use scheduling::{ConstantLR, LRScheduler, LinearDecay};
pub use checkpoint::{CheckpointError, Checkpointer};
