//! Single-environment adapter used by actor workers.
//!
//! The adapter owns exactly one environment plus its episode tracker
//! (`episode_return`, `episode_step`). It turns the raw gym-style API into a
//! stream of well-formed [`Frame`]s:
//!
//! - `reset` yields a synthetic frame 0 (flags set, zero reward, zero last
//!   action) so the first timestep of any slot is always valid.
//! - `step` auto-resets on episode end. The frame returned at the boundary
//!   still reports the finished episode's totals; the tracker is zeroed
//!   immediately afterwards.

use super::{EnvError, Environment, SpaceSpec};
use crate::core::episode_state::EpisodeState;

/// One timestep as written into a trajectory slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub obs: Vec<f32>,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    /// Cumulative return of the episode this step belongs to.
    pub episode_return: f32,
    /// Cumulative step count of the episode this step belongs to.
    pub episode_step: u32,
    /// Action that produced this frame (zeros for a reset frame).
    pub last_action: Vec<f32>,
}

impl Frame {
    pub fn episode_state(&self) -> EpisodeState {
        EpisodeState::from_flags(self.terminated, self.truncated)
    }
}

/// Auto-resetting wrapper around one [`Environment`].
pub struct EnvAdapter<E: Environment> {
    env: E,
    observation_space: SpaceSpec,
    action_space: SpaceSpec,
    episode_return: f32,
    episode_step: u32,
}

impl<E: Environment> EnvAdapter<E> {
    pub fn new(env: E) -> Self {
        let observation_space = env.observation_space();
        let action_space = env.action_space();
        Self {
            env,
            observation_space,
            action_space,
            episode_return: 0.0,
            episode_step: 0,
        }
    }

    pub fn observation_space(&self) -> &SpaceSpec {
        &self.observation_space
    }

    pub fn action_space(&self) -> &SpaceSpec {
        &self.action_space
    }

    /// Current running return of the episode in progress.
    pub fn episode_return(&self) -> f32 {
        self.episode_return
    }

    /// Current running length of the episode in progress.
    pub fn episode_step(&self) -> u32 {
        self.episode_step
    }

    /// Reset the environment and produce the synthetic frame 0.
    pub fn reset(&mut self, seed: u64) -> Result<Frame, EnvError> {
        let (obs, _info) = self.env.reset(Some(seed))?;
        self.episode_return = 0.0;
        self.episode_step = 0;

        Ok(Frame {
            obs,
            reward: 0.0,
            terminated: true,
            truncated: true,
            episode_return: 0.0,
            episode_step: 0,
            last_action: vec![0.0; self.action_space.action_dim()],
        })
    }

    /// Step once, transparently resetting at episode boundaries.
    pub fn step(&mut self, action: &[f32]) -> Result<Frame, EnvError> {
        let step = self.env.step(action)?;
        self.episode_step += 1;
        self.episode_return += step.reward;

        // Boundary frame keeps the completed episode's totals.
        let episode_return = self.episode_return;
        let episode_step = self.episode_step;

        let obs = if EpisodeState::from_flags(step.terminated, step.truncated).is_done() {
            let (obs, _info) = self.env.reset(None)?;
            self.episode_return = 0.0;
            self.episode_step = 0;
            obs
        } else {
            step.observation
        };

        Ok(Frame {
            obs,
            reward: step.reward,
            terminated: step.terminated,
            truncated: step.truncated,
            episode_return,
            episode_step,
            last_action: action.to_vec(),
        })
    }

    pub fn close(&mut self) {
        self.env.close();
    }

    pub fn inner(&self) -> &E {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::CountdownEnv;

    #[test]
    fn test_reset_frame_is_well_formed() {
        let mut adapter = EnvAdapter::new(CountdownEnv::new(3));
        let frame = adapter.reset(7).unwrap();

        assert!(frame.terminated);
        assert!(frame.truncated);
        assert_eq!(frame.reward, 0.0);
        assert_eq!(frame.episode_return, 0.0);
        assert_eq!(frame.episode_step, 0);
        assert_eq!(frame.last_action, vec![0.0]);
        assert_eq!(frame.obs.len(), adapter.observation_space().flat_size());
    }

    #[test]
    fn test_episode_accumulates() {
        let mut adapter = EnvAdapter::new(CountdownEnv::new(5));
        adapter.reset(0).unwrap();

        let f1 = adapter.step(&[1.0]).unwrap();
        let f2 = adapter.step(&[0.0]).unwrap();

        assert_eq!(f1.episode_step, 1);
        assert_eq!(f2.episode_step, 2);
        assert!((f2.episode_return - 2.0).abs() < 1e-6);
        assert_eq!(f2.last_action, vec![0.0]);
        assert_eq!(adapter.episode_step(), 2);
    }

    #[test]
    fn test_boundary_frame_reports_pre_reset_totals() {
        let mut adapter = EnvAdapter::new(CountdownEnv::new(3));
        adapter.reset(0).unwrap();

        adapter.step(&[0.0]).unwrap();
        adapter.step(&[0.0]).unwrap();
        let last = adapter.step(&[0.0]).unwrap();

        assert!(last.terminated);
        assert_eq!(last.episode_step, 3);
        assert!((last.episode_return - 3.0).abs() < 1e-6);

        // Tracker is zeroed right after the boundary.
        assert_eq!(adapter.episode_step(), 0);
        assert_eq!(adapter.episode_return(), 0.0);

        // Observation already belongs to the next episode.
        assert_eq!(last.obs, vec![3.0]);

        let next = adapter.step(&[0.0]).unwrap();
        assert!(!next.terminated);
        assert_eq!(next.episode_step, 1);
    }

    #[test]
    fn test_truncation_also_resets() {
        let mut adapter = EnvAdapter::new(CountdownEnv::new(10).with_time_limit(2));
        adapter.reset(0).unwrap();

        adapter.step(&[0.0]).unwrap();
        let cut = adapter.step(&[0.0]).unwrap();

        assert!(!cut.terminated);
        assert!(cut.truncated);
        assert_eq!(cut.episode_step, 2);
        assert_eq!(adapter.episode_step(), 0);
    }

    #[test]
    fn test_env_error_propagates() {
        let mut adapter = EnvAdapter::new(CountdownEnv::new(3).failing_after(1));
        adapter.reset(0).unwrap();
        adapter.step(&[0.0]).unwrap();
        assert!(adapter.step(&[0.0]).is_err());
    }
}
