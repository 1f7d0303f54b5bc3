//! Configuration for the distributed actor/learner trainer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration validation error.
///
/// Returned before any thread is spawned when parameters are invalid or the
/// collaborators do not fit together.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count parameter (num_actors, num_steps, etc.) must be positive.
    InvalidCount {
        field: &'static str,
        value: usize,
    },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Fewer transitions than requested mini-batches.
    InvalidMinibatch {
        transitions: usize,
        minibatches: usize,
    },
    /// A batch needs more slots than the pool holds.
    InsufficientSlots {
        batch_size: usize,
        num_slots: usize,
    },
    /// One environment per actor is required.
    EnvCountMismatch {
        expected: usize,
        actual: usize,
    },
    /// Collaborators disagree on shapes.
    Incompatible(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
            ConfigError::InvalidMinibatch {
                transitions,
                minibatches,
            } => {
                write!(
                    f,
                    "num_envs * num_steps ({}) must be >= num_mini_batches ({})",
                    transitions, minibatches
                )
            }
            ConfigError::InsufficientSlots {
                batch_size,
                num_slots,
            } => {
                write!(
                    f,
                    "batch_size ({}) must not exceed num_slots ({})",
                    batch_size, num_slots
                )
            }
            ConfigError::EnvCountMismatch { expected, actual } => {
                write!(
                    f,
                    "expected one environment per actor ({}), got {}",
                    expected, actual
                )
            }
            ConfigError::Incompatible(msg) => write!(f, "incompatible configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

pub(crate) fn require_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidCount { field, value })
    } else {
        Ok(())
    }
}

pub(crate) fn require_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Seconds as a [`Duration`], rejecting values below `min` or beyond what a
/// `Duration` can hold.
pub(crate) fn require_duration(
    field: &'static str,
    value: f64,
    min: f64,
) -> Result<Duration, ConfigError> {
    let max = Duration::MAX.as_secs_f64();
    require_range(field, value, min, max)?;
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::OutOfRange {
        field,
        value,
        min,
        max,
    })
}

/// Configuration for [`DistributedTrainer`](super::DistributedTrainer).
///
/// `num_actors` actor threads each own one environment and fill slots of
/// `num_steps` frames; `num_learners` learner threads consume `batch_size`
/// slots per update until `num_train_steps` environment steps were consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Actor threads, one environment each.
    pub num_actors: usize,
    /// Learner threads sharing one model.
    pub num_learners: usize,
    /// Trajectory slots in the pool.
    pub num_slots: usize,
    /// Rollout length T.
    pub num_steps: usize,
    /// Slots per learner batch B.
    pub batch_size: usize,
    /// Global environment step target.
    pub num_train_steps: u64,
    /// Base seed; worker seeds are derived from it.
    pub seed: u64,
    pub learning_rate: f64,
    /// Decay the learning rate linearly to zero over `num_train_steps`.
    pub lr_decay: bool,
    pub report_interval_secs: f64,
    /// Upper bound on waiting for workers at shutdown.
    pub join_timeout_secs: f64,
    /// Return a faulted worker's slot to Free instead of leaking it.
    pub reclaim_faulted_slots: bool,
    /// Where `actor.bin` / `learner.bin` are written.
    pub model_dir: PathBuf,
    /// Episodes averaged in reports.
    pub recent_episodes_window: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_actors: 8,
            num_learners: 2,
            num_slots: 32,
            num_steps: 80,
            batch_size: 4,
            num_train_steps: 30_000_000,
            seed: 1,
            learning_rate: 4e-4,
            lr_decay: true,
            report_interval_secs: 5.0,
            join_timeout_secs: 1.0,
            reclaim_faulted_slots: true,
            model_dir: PathBuf::from("model"),
            recent_episodes_window: 10,
        }
    }
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_actors(mut self, n: usize) -> Self {
        self.num_actors = n;
        self
    }

    pub fn with_num_learners(mut self, n: usize) -> Self {
        self.num_learners = n;
        self
    }

    pub fn with_num_slots(mut self, n: usize) -> Self {
        self.num_slots = n;
        self
    }

    pub fn with_num_steps(mut self, t: usize) -> Self {
        self.num_steps = t;
        self
    }

    pub fn with_batch_size(mut self, b: usize) -> Self {
        self.batch_size = b;
        self
    }

    pub fn with_num_train_steps(mut self, steps: u64) -> Self {
        self.num_train_steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_lr_decay(mut self, decay: bool) -> Self {
        self.lr_decay = decay;
        self
    }

    pub fn with_report_interval_secs(mut self, secs: f64) -> Self {
        self.report_interval_secs = secs;
        self
    }

    pub fn with_join_timeout_secs(mut self, secs: f64) -> Self {
        self.join_timeout_secs = secs;
        self
    }

    pub fn with_reclaim_faulted_slots(mut self, reclaim: bool) -> Self {
        self.reclaim_faulted_slots = reclaim;
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_recent_episodes_window(mut self, n: usize) -> Self {
        self.recent_episodes_window = n;
        self
    }

    /// Environment steps consumed by one update (`T * B`).
    pub fn steps_per_update(&self) -> u64 {
        (self.num_steps * self.batch_size) as u64
    }

    /// Seed for worker `index`.
    pub fn worker_seed(&self, index: usize) -> u64 {
        self.seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(index as u64)
    }

    /// Interval between progress reports.
    pub fn report_interval(&self) -> Result<Duration, ConfigError> {
        require_duration("report_interval_secs", self.report_interval_secs, 1e-3)
    }

    /// Upper bound on waiting for workers at shutdown.
    pub fn join_timeout(&self) -> Result<Duration, ConfigError> {
        require_duration("join_timeout_secs", self.join_timeout_secs, 0.0)
    }

    /// Validate all configuration parameters.
    ///
    /// # Validation Rules
    /// - Count parameters must be > 0
    /// - batch_size must not exceed num_slots
    /// - learning_rate must be in [0, 1]
    /// - intervals and timeouts must be non-negative and fit in a `Duration`
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("num_actors", self.num_actors)?;
        require_positive("num_learners", self.num_learners)?;
        require_positive("num_slots", self.num_slots)?;
        require_positive("num_steps", self.num_steps)?;
        require_positive("batch_size", self.batch_size)?;
        if self.num_train_steps == 0 {
            return Err(ConfigError::InvalidCount {
                field: "num_train_steps",
                value: 0,
            });
        }
        if self.batch_size > self.num_slots {
            return Err(ConfigError::InsufficientSlots {
                batch_size: self.batch_size,
                num_slots: self.num_slots,
            });
        }
        require_range("learning_rate", self.learning_rate, 0.0, 1.0)?;
        self.report_interval()?;
        self.join_timeout()?;
        Ok(())
    }
}

/// Configuration for [`RolloutStorage`](crate::buffers::RolloutStorage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutStorageConfig {
    pub num_steps: usize,
    pub num_envs: usize,
    pub discount: f32,
    pub gae_lambda: f32,
}

impl Default for RolloutStorageConfig {
    fn default() -> Self {
        Self {
            num_steps: 128,
            num_envs: 8,
            discount: 0.99,
            gae_lambda: 0.95,
        }
    }
}

impl RolloutStorageConfig {
    pub fn new(num_steps: usize, num_envs: usize) -> Self {
        Self {
            num_steps,
            num_envs,
            ..Default::default()
        }
    }

    pub fn with_discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_gae_lambda(mut self, gae_lambda: f32) -> Self {
        self.gae_lambda = gae_lambda;
        self
    }

    pub fn transitions(&self) -> usize {
        self.num_steps * self.num_envs
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("num_steps", self.num_steps)?;
        require_positive("num_envs", self.num_envs)?;
        require_range("discount", self.discount as f64, 0.0, 1.0)?;
        require_range("gae_lambda", self.gae_lambda as f64, 0.0, 1.0)?;
        Ok(())
    }
}
