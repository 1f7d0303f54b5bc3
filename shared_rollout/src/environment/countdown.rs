//! Deterministic reference environment.
//!
//! `CountdownEnv` counts down from a fixed episode length, paying a reward of
//! 1.0 per step and terminating when the counter reaches zero. Its behaviour
//! is fully predictable, which makes it the environment of choice for
//! exercising the pipeline's bookkeeping (episode totals, overlap frames,
//! shutdown) without any simulator noise. Fault injection hooks let callers
//! make it fail or panic after a given number of steps.

use super::{DType, EnvError, EnvInfo, EnvStep, Environment, SpaceSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Error,
    Panic,
}

#[derive(Debug, Clone)]
pub struct CountdownEnv {
    episode_length: u32,
    time_limit: Option<u32>,
    remaining: u32,
    elapsed: u32,
    total_steps: u64,
    fault: Option<(Fault, u64)>,
    last_seed: Option<u64>,
    resets: u64,
}

impl CountdownEnv {
    pub fn new(episode_length: u32) -> Self {
        Self {
            episode_length: episode_length.max(1),
            time_limit: None,
            remaining: episode_length.max(1),
            elapsed: 0,
            total_steps: 0,
            fault: None,
            last_seed: None,
            resets: 0,
        }
    }

    /// Truncate episodes after `limit` steps.
    pub fn with_time_limit(mut self, limit: u32) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Return an error from `step` once `steps` steps have succeeded.
    pub fn failing_after(mut self, steps: u64) -> Self {
        self.fault = Some((Fault::Error, steps));
        self
    }

    /// Panic inside `step` once `steps` steps have succeeded.
    pub fn panicking_after(mut self, steps: u64) -> Self {
        self.fault = Some((Fault::Panic, steps));
        self
    }

    pub fn last_seed(&self) -> Option<u64> {
        self.last_seed
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}

impl Environment for CountdownEnv {
    fn observation_space(&self) -> SpaceSpec {
        SpaceSpec::observation([1], DType::F32)
    }

    fn action_space(&self) -> SpaceSpec {
        SpaceSpec::discrete(2)
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(Vec<f32>, EnvInfo), EnvError> {
        if seed.is_some() {
            self.last_seed = seed;
        }
        self.resets += 1;
        self.remaining = self.episode_length;
        self.elapsed = 0;
        Ok((vec![self.remaining as f32], EnvInfo::new()))
    }

    fn step(&mut self, action: &[f32]) -> Result<EnvStep, EnvError> {
        if let Some((fault, after)) = self.fault {
            if self.total_steps >= after {
                match fault {
                    Fault::Error => {
                        return Err(EnvError::new(format!(
                            "injected failure after {} steps",
                            after
                        )))
                    }
                    Fault::Panic => panic!("injected panic after {} steps", after),
                }
            }
        }
        if action.is_empty() {
            return Err(EnvError::new("empty action"));
        }

        self.total_steps += 1;
        self.elapsed += 1;
        self.remaining = self.remaining.saturating_sub(1);

        let terminated = self.remaining == 0;
        let truncated = !terminated && self.time_limit.map_or(false, |l| self.elapsed >= l);

        Ok(EnvStep {
            observation: vec![self.remaining as f32],
            reward: 1.0,
            terminated,
            truncated,
            info: EnvInfo::new(),
        })
    }
}
