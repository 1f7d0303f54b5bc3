//! Environment abstraction for the actor workers.
//!
//! An [`Environment`] is a single (non-vectorized) simulator instance. Actor
//! workers never drive it directly; they go through an [`EnvAdapter`] which
//! performs auto-reset, episode accounting and frame formatting.

pub mod adapter;
pub mod countdown;
pub mod spaces;

use std::collections::BTreeMap;
use std::fmt;

pub use adapter::{EnvAdapter, Frame};
pub use countdown::CountdownEnv;
pub use spaces::{DType, SpaceKind, SpaceSpec};

/// Auxiliary per-step diagnostics returned by an environment.
pub type EnvInfo = BTreeMap<String, f32>;

/// Error raised by an environment collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvError {
    message: String,
}

impl EnvError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "environment error: {}", self.message)
    }
}

impl std::error::Error for EnvError {}

/// Raw result of stepping an environment once.
#[derive(Debug, Clone)]
pub struct EnvStep {
    pub observation: Vec<f32>,
    pub reward: f32,
    /// Episode reached an absorbing state.
    pub terminated: bool,
    /// Episode hit an external limit (time, steps).
    pub truncated: bool,
    pub info: EnvInfo,
}

/// Gym-style single environment.
pub trait Environment: Send {
    /// Observation descriptor, fixed for the lifetime of the environment.
    fn observation_space(&self) -> SpaceSpec;

    /// Action descriptor, fixed for the lifetime of the environment.
    fn action_space(&self) -> SpaceSpec;

    /// Start a new episode. `None` continues the current RNG stream.
    fn reset(&mut self, seed: Option<u64>) -> Result<(Vec<f32>, EnvInfo), EnvError>;

    /// Advance one step. Does not auto-reset.
    fn step(&mut self, action: &[f32]) -> Result<EnvStep, EnvError>;

    /// Release simulator resources.
    fn close(&mut self) {}
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn observation_space(&self) -> SpaceSpec {
        (**self).observation_space()
    }

    fn action_space(&self) -> SpaceSpec {
        (**self).action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(Vec<f32>, EnvInfo), EnvError> {
        (**self).reset(seed)
    }

    fn step(&mut self, action: &[f32]) -> Result<EnvStep, EnvError> {
        (**self).step(action)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
