//! Behavioural tests for `RolloutStorage`.

use super::*;
use crate::runners::trainer_config::{ConfigError, RolloutStorageConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;

// ============================================================================
// Helpers
// ============================================================================

fn storage(num_steps: usize, num_envs: usize) -> RolloutStorage {
    RolloutStorage::new(RolloutStorageConfig::new(num_steps, num_envs), 2, 1).unwrap()
}

fn step(num_envs: usize, t: usize, terminated: bool) -> RolloutStep {
    RolloutStep {
        actions: vec![t as f32; num_envs],
        rewards: vec![1.0; num_envs],
        values: vec![0.5; num_envs],
        log_probs: vec![-0.7; num_envs],
        next_obs: (0..num_envs)
            .flat_map(|e| [t as f32 + 1.0, e as f32])
            .collect(),
        next_terminated: vec![terminated; num_envs],
        next_truncated: vec![false; num_envs],
    }
}

fn fill(storage: &mut RolloutStorage, terminal_last: bool) {
    let t_len = storage.num_steps();
    let e = storage.num_envs();
    for t in 0..t_len {
        storage.add(&step(e, t, terminal_last && t == t_len - 1));
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_rejects_invalid_config() {
    let zero_envs = RolloutStorage::new(RolloutStorageConfig::new(4, 0), 1, 1);
    assert!(matches!(
        zero_envs,
        Err(ConfigError::InvalidCount { field: "num_envs", .. })
    ));

    let bad_discount = RolloutStorage::new(
        RolloutStorageConfig::new(4, 1).with_discount(1.5),
        1,
        1,
    );
    assert!(matches!(
        bad_discount,
        Err(ConfigError::OutOfRange { field: "discount", .. })
    ));
}

#[test]
fn test_sample_requires_enough_transitions() {
    let mut s = storage(2, 2);
    fill(&mut s, false);
    s.compute_returns_and_advantages(&[0.0, 0.0]);

    let err = s.sample(5).err();
    assert_eq!(
        err,
        Some(ConfigError::InvalidMinibatch {
            transitions: 4,
            minibatches: 5
        })
    );
    assert!(s.sample(0).is_err());
    assert!(s.sample(4).is_ok());
}

// ============================================================================
// Cursor and overlap frame
// ============================================================================

#[test]
fn test_cursor_wraps_modulo_num_steps() {
    let mut s = storage(3, 1);
    assert_eq!(s.cursor(), 0);
    s.add(&step(1, 0, false));
    s.add(&step(1, 1, false));
    assert_eq!(s.cursor(), 2);
    s.add(&step(1, 2, false));
    assert_eq!(s.cursor(), 0);
}

#[test]
fn test_reset_carries_last_frame_into_first() {
    let mut s = storage(3, 2);
    s.insert_initial(&[9.0, 9.0, 9.0, 9.0]);
    fill(&mut s, true);

    assert_eq!(s.obs_frame(0), &[9.0, 9.0, 9.0, 9.0]);
    assert_eq!(s.terminated_frame(0), &[false, false]);

    s.reset();

    assert_eq!(s.obs_frame(0), s.obs_frame(3));
    assert_eq!(s.obs_frame(0), &[3.0, 0.0, 3.0, 1.0]);
    assert_eq!(s.terminated_frame(0), &[true, true]);
    assert_eq!(s.truncated_frame(0), s.truncated_frame(3));
}

// ============================================================================
// GAE
// ============================================================================

#[test]
fn test_terminal_last_step_ignores_bootstrap() {
    for bootstrap in [0.0f32, 100.0] {
        let mut s = RolloutStorage::new(
            RolloutStorageConfig::new(4, 1)
                .with_discount(0.99)
                .with_gae_lambda(0.95),
            2,
            1,
        )
        .unwrap();
        fill(&mut s, true);
        s.compute_returns_and_advantages(&[bootstrap]);

        // raw advantage[T-1] = 1.0 - 0.5 = 0.5, so return = 0.5 + 0.5
        assert!(
            (s.returns()[3] - 1.0).abs() < 1e-6,
            "bootstrap={} leaked into the terminal step",
            bootstrap
        );
    }
}

#[test]
fn test_bootstrap_used_without_terminal() {
    let mut low = storage(2, 1);
    let mut high = storage(2, 1);
    fill(&mut low, false);
    fill(&mut high, false);
    low.compute_returns_and_advantages(&[0.0]);
    high.compute_returns_and_advantages(&[10.0]);

    // returns[T-1] = r + γ V_boot
    assert!((high.returns()[1] - low.returns()[1] - 0.99 * 10.0).abs() < 1e-4);
}

#[test]
fn test_advantages_are_standardised() {
    let mut s = storage(5, 3);
    for t in 0..5 {
        let mut st = step(3, t, t == 2);
        st.rewards = vec![t as f32, 2.0 * t as f32, -(t as f32)];
        s.add(&st);
    }
    s.compute_returns_and_advantages(&[0.3, -0.2, 1.0]);

    let adv = s.advantages();
    let n = adv.len() as f32;
    let mean = adv.iter().sum::<f32>() / n;
    let std = (adv.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / (n - 1.0)).sqrt();
    assert!(mean.abs() < 1e-4);
    assert!((std - 1.0).abs() < 1e-3);
}

#[test]
fn test_degenerate_advantages_stay_finite() {
    let mut s = storage(2, 2);
    for t in 0..2 {
        let mut st = step(2, t, false);
        st.rewards = vec![0.0; 2];
        st.values = vec![0.0; 2];
        s.add(&st);
    }
    s.compute_returns_and_advantages(&[0.0, 0.0]);
    assert!(s.advantages().iter().all(|a| a.is_finite() && *a == 0.0));
}

// ============================================================================
// Mini-batch partition
// ============================================================================

#[test]
fn test_minibatches_partition_every_transition_once() {
    let mut s = storage(5, 3);
    fill(&mut s, false);
    s.compute_returns_and_advantages(&[0.0; 3]);

    for k in [1usize, 2, 4, 7, 15] {
        let mut rng = StdRng::seed_from_u64(k as u64);
        let batches: Vec<MiniBatch> = s.sample_with_rng(k, &mut rng).unwrap().collect();
        assert_eq!(batches.len(), k);

        let sizes: Vec<usize> = batches.iter().map(MiniBatch::len).collect();
        let min = *sizes.iter().min().unwrap();
        let max = *sizes.iter().max().unwrap();
        assert!(max - min <= 1, "k={} sizes={:?}", k, sizes);

        let mut seen = BTreeSet::new();
        for batch in &batches {
            for &idx in &batch.indices {
                assert!(seen.insert(idx), "index {} repeated for k={}", idx, k);
            }
        }
        assert_eq!(seen, (0..15).collect::<BTreeSet<_>>());
    }
}

#[test]
fn test_minibatch_fields_follow_indices() {
    let mut s = storage(3, 2);
    fill(&mut s, false);
    s.compute_returns_and_advantages(&[0.0; 2]);

    let mut rng = StdRng::seed_from_u64(7);
    for batch in s.sample_with_rng(2, &mut rng).unwrap() {
        assert_eq!(batch.obs.len(), batch.len() * 2);
        assert_eq!(batch.actions.len(), batch.len());
        for (i, &idx) in batch.indices.iter().enumerate() {
            let t = idx / 2;
            assert_eq!(batch.actions[i], t as f32);
            assert_eq!(batch.advantages[i], s.advantages()[idx]);
            assert_eq!(batch.returns[i], s.returns()[idx]);
        }
    }
}

#[test]
fn test_minibatch_iterator_is_single_pass() {
    let mut s = storage(2, 2);
    fill(&mut s, false);
    s.compute_returns_and_advantages(&[0.0; 2]);

    let mut batches = s.sample(2).unwrap();
    assert_eq!(batches.len(), 2);
    assert!(batches.next().is_some());
    assert!(batches.next().is_some());
    assert!(batches.next().is_none());
    assert!(batches.next().is_none());
}
