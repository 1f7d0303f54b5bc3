//! Single-writer rollout storage with GAE.
//!
//! One collection loop appends `T` steps for `E` environments, then one
//! reader computes advantages and draws mini-batches before the buffer is
//! reset for the next cycle. All arrays are time-major and flat:
//!
//! | field                         | frames | per env          |
//! |-------------------------------|--------|------------------|
//! | obs                           | T + 1  | obs_size         |
//! | terminated, truncated         | T + 1  | 1                |
//! | actions                       | T      | action_dim       |
//! | rewards, values, log_probs    | T      | 1                |
//! | advantages, returns           | T      | 1                |
//!
//! Step `t` reads `obs[t]` and writes `obs[t + 1]`; frame `T` becomes frame
//! 0 of the next cycle on [`RolloutStorage::reset`].

use rand::seq::SliceRandom;
use rand::Rng;

use crate::algorithms::gae::{compute_gae, normalize_advantages};
use crate::runners::trainer_config::{ConfigError, RolloutStorageConfig};

/// One vectorised step, `E` entries per field.
#[derive(Debug, Clone, Default)]
pub struct RolloutStep {
    /// `[E, action_dim]`
    pub actions: Vec<f32>,
    pub rewards: Vec<f32>,
    pub values: Vec<f32>,
    pub log_probs: Vec<f32>,
    /// Observation after the step, `[E, obs_size]`.
    pub next_obs: Vec<f32>,
    pub next_terminated: Vec<bool>,
    pub next_truncated: Vec<bool>,
}

pub struct RolloutStorage {
    config: RolloutStorageConfig,
    obs_size: usize,
    action_dim: usize,

    obs: Vec<f32>,
    terminated: Vec<bool>,
    truncated: Vec<bool>,
    actions: Vec<f32>,
    rewards: Vec<f32>,
    values: Vec<f32>,
    log_probs: Vec<f32>,
    advantages: Vec<f32>,
    returns: Vec<f32>,

    /// Next write position in `0..T`.
    cursor: usize,
}

impl RolloutStorage {
    pub fn new(
        config: RolloutStorageConfig,
        obs_size: usize,
        action_dim: usize,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let t = config.num_steps;
        let e = config.num_envs;
        Ok(Self {
            obs: vec![0.0; (t + 1) * e * obs_size],
            terminated: vec![false; (t + 1) * e],
            truncated: vec![false; (t + 1) * e],
            actions: vec![0.0; t * e * action_dim],
            rewards: vec![0.0; t * e],
            values: vec![0.0; t * e],
            log_probs: vec![0.0; t * e],
            advantages: vec![0.0; t * e],
            returns: vec![0.0; t * e],
            cursor: 0,
            config,
            obs_size,
            action_dim,
        })
    }

    pub fn config(&self) -> &RolloutStorageConfig {
        &self.config
    }

    pub fn num_steps(&self) -> usize {
        self.config.num_steps
    }

    pub fn num_envs(&self) -> usize {
        self.config.num_envs
    }

    /// Next write position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Seed frame 0 with the first observations after an environment reset.
    pub fn insert_initial(&mut self, obs: &[f32]) {
        let len = self.config.num_envs * self.obs_size;
        assert_eq!(obs.len(), len, "initial obs width mismatch");
        self.obs[..len].copy_from_slice(obs);
        self.terminated[..self.config.num_envs].fill(false);
        self.truncated[..self.config.num_envs].fill(false);
    }

    /// Write one step at the cursor and advance it modulo `T`.
    pub fn add(&mut self, step: &RolloutStep) {
        let e = self.config.num_envs;
        let t = self.cursor;
        assert_eq!(step.actions.len(), e * self.action_dim, "actions width mismatch");
        assert_eq!(step.next_obs.len(), e * self.obs_size, "next_obs width mismatch");

        let next = t + 1;
        self.obs[next * e * self.obs_size..(next + 1) * e * self.obs_size]
            .copy_from_slice(&step.next_obs);
        self.terminated[next * e..(next + 1) * e].copy_from_slice(&step.next_terminated);
        self.truncated[next * e..(next + 1) * e].copy_from_slice(&step.next_truncated);

        self.actions[t * e * self.action_dim..(t + 1) * e * self.action_dim]
            .copy_from_slice(&step.actions);
        self.rewards[t * e..(t + 1) * e].copy_from_slice(&step.rewards);
        self.values[t * e..(t + 1) * e].copy_from_slice(&step.values);
        self.log_probs[t * e..(t + 1) * e].copy_from_slice(&step.log_probs);

        self.cursor = (self.cursor + 1) % self.config.num_steps;
    }

    /// Backward GAE pass per environment, then standardise advantages.
    ///
    /// `bootstrap_values` holds `V(s_T)` for each environment.
    pub fn compute_returns_and_advantages(&mut self, bootstrap_values: &[f32]) {
        let t_len = self.config.num_steps;
        let e = self.config.num_envs;
        assert_eq!(bootstrap_values.len(), e, "one bootstrap value per env");

        for env in 0..e {
            let rewards: Vec<f32> = (0..t_len).map(|t| self.rewards[t * e + env]).collect();
            let values: Vec<f32> = (0..t_len).map(|t| self.values[t * e + env]).collect();
            let next_terminated: Vec<bool> = (0..t_len)
                .map(|t| self.terminated[(t + 1) * e + env])
                .collect();

            let (advantages, returns) = compute_gae(
                &rewards,
                &values,
                &next_terminated,
                bootstrap_values[env],
                self.config.discount,
                self.config.gae_lambda,
            );
            for t in 0..t_len {
                self.advantages[t * e + env] = advantages[t];
                self.returns[t * e + env] = returns[t];
            }
        }

        normalize_advantages(&mut self.advantages);
    }

    /// Carry frame `T` over into frame 0.
    pub fn reset(&mut self) {
        let t = self.config.num_steps;
        let e = self.config.num_envs;
        let obs_len = e * self.obs_size;
        self.obs.copy_within(t * obs_len..(t + 1) * obs_len, 0);
        self.terminated.copy_within(t * e..(t + 1) * e, 0);
        self.truncated.copy_within(t * e..(t + 1) * e, 0);
    }

    /// Frame `t` of the observation array, `[E, obs_size]`.
    pub fn obs_frame(&self, t: usize) -> &[f32] {
        let len = self.config.num_envs * self.obs_size;
        &self.obs[t * len..(t + 1) * len]
    }

    pub fn terminated_frame(&self, t: usize) -> &[bool] {
        let e = self.config.num_envs;
        &self.terminated[t * e..(t + 1) * e]
    }

    pub fn truncated_frame(&self, t: usize) -> &[bool] {
        let e = self.config.num_envs;
        &self.truncated[t * e..(t + 1) * e]
    }

    /// Advantages after the last [`compute_returns_and_advantages`](Self::compute_returns_and_advantages), `[T * E]`.
    pub fn advantages(&self) -> &[f32] {
        &self.advantages
    }

    pub fn returns(&self) -> &[f32] {
        &self.returns
    }

    /// Random partition into `num_mini_batches` mini-batches using the thread RNG.
    pub fn sample(&self, num_mini_batches: usize) -> Result<MiniBatches<'_>, ConfigError> {
        self.sample_with_rng(num_mini_batches, &mut rand::thread_rng())
    }

    /// Random partition of all `T * E` transitions.
    ///
    /// Yields exactly `num_mini_batches` disjoint mini-batches whose sizes
    /// differ by at most one and together cover every transition once.
    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        num_mini_batches: usize,
        rng: &mut R,
    ) -> Result<MiniBatches<'_>, ConfigError> {
        let transitions = self.config.transitions();
        if num_mini_batches == 0 || transitions < num_mini_batches {
            return Err(ConfigError::InvalidMinibatch {
                transitions,
                minibatches: num_mini_batches,
            });
        }

        let mut order: Vec<usize> = (0..transitions).collect();
        order.shuffle(rng);

        Ok(MiniBatches {
            storage: self,
            order,
            num_mini_batches,
            next: 0,
        })
    }

    fn gather(&self, indices: Vec<usize>) -> MiniBatch {
        let n = indices.len();
        let mut batch = MiniBatch {
            obs: Vec::with_capacity(n * self.obs_size),
            actions: Vec::with_capacity(n * self.action_dim),
            values: Vec::with_capacity(n),
            returns: Vec::with_capacity(n),
            terminated: Vec::with_capacity(n),
            truncated: Vec::with_capacity(n),
            old_log_probs: Vec::with_capacity(n),
            advantages: Vec::with_capacity(n),
            obs_size: self.obs_size,
            action_dim: self.action_dim,
            indices: Vec::new(),
        };

        for &idx in &indices {
            // idx = t * E + env also addresses frame t of the T+1 arrays.
            batch
                .obs
                .extend_from_slice(&self.obs[idx * self.obs_size..(idx + 1) * self.obs_size]);
            batch.actions.extend_from_slice(
                &self.actions[idx * self.action_dim..(idx + 1) * self.action_dim],
            );
            batch.values.push(self.values[idx]);
            batch.returns.push(self.returns[idx]);
            batch.terminated.push(self.terminated[idx]);
            batch.truncated.push(self.truncated[idx]);
            batch.old_log_probs.push(self.log_probs[idx]);
            batch.advantages.push(self.advantages[idx]);
        }
        batch.indices = indices;
        batch
    }
}

/// Transitions of one mini-batch, gathered by flat index `t * E + env`.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniBatch {
    pub indices: Vec<usize>,
    pub obs: Vec<f32>,
    pub actions: Vec<f32>,
    pub values: Vec<f32>,
    pub returns: Vec<f32>,
    pub terminated: Vec<bool>,
    pub truncated: Vec<bool>,
    pub old_log_probs: Vec<f32>,
    pub advantages: Vec<f32>,
    pub obs_size: usize,
    pub action_dim: usize,
}

impl MiniBatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Lazy, single-pass sequence of mini-batches over one shuffled order.
pub struct MiniBatches<'a> {
    storage: &'a RolloutStorage,
    order: Vec<usize>,
    num_mini_batches: usize,
    next: usize,
}

impl Iterator for MiniBatches<'_> {
    type Item = MiniBatch;

    fn next(&mut self) -> Option<MiniBatch> {
        if self.next >= self.num_mini_batches {
            return None;
        }
        let total = self.order.len();
        let start = self.next * total / self.num_mini_batches;
        let end = (self.next + 1) * total / self.num_mini_batches;
        self.next += 1;
        Some(self.storage.gather(self.order[start..end].to_vec()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.num_mini_batches - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for MiniBatches<'_> {}
