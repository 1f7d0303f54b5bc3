//! End-to-end trainer runs over the reference environment, policy and learner.
//!
//! `CountdownEnv::new(4)` pays 1.0 per step and terminates every 4 steps, so
//! every completed episode has return 4 and length 4.

use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::algorithms::{ReferenceLearner, ReferencePolicy};
use crate::checkpoint::Checkpointer;
use crate::environment::{CountdownEnv, SpaceSpec};
use crate::metrics::{MetricsLogger, TrainingSnapshot};
use crate::runners::{ConfigError, DistributedTrainer, TrainError, TrainerConfig};

// ============================================================================
// Helpers
// ============================================================================

#[derive(Clone, Default)]
struct RecordingLogger {
    snapshots: Arc<Mutex<Vec<TrainingSnapshot>>>,
    flushes: Arc<Mutex<usize>>,
}

impl MetricsLogger for RecordingLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }

    fn flush(&mut self) {
        *self.flushes.lock() += 1;
    }
}

fn config(model_dir: &std::path::Path) -> TrainerConfig {
    TrainerConfig::new()
        .with_num_actors(2)
        .with_num_learners(2)
        .with_num_slots(8)
        .with_num_steps(5)
        .with_batch_size(2)
        .with_num_train_steps(100)
        .with_report_interval_secs(0.01)
        .with_join_timeout_secs(5.0)
        .with_model_dir(model_dir)
}

fn envs(n: usize) -> Vec<CountdownEnv> {
    (0..n).map(|_| CountdownEnv::new(4)).collect()
}

fn policy(_actor: usize) -> ReferencePolicy {
    ReferencePolicy::new(&SpaceSpec::discrete(2))
}

// ============================================================================
// Successful runs
// ============================================================================

#[test]
fn test_run_reaches_step_target_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let steps_per_update = config.steps_per_update();
    let trainer = DistributedTrainer::new(config);

    let learner = ReferenceLearner::new();
    let trace = learner.trace();
    let mut logger = RecordingLogger::default();

    let report = trainer
        .train(envs(2), policy, learner, &mut logger)
        .unwrap();

    assert!(report.global_step >= 100);
    assert_eq!(report.global_step % steps_per_update, 0);
    assert_eq!(report.global_step, report.updates * steps_per_update);
    assert_eq!(report.updates, trace.updates());
    assert!(!report.interrupted);

    assert_eq!(report.shutdown.joined, 2);
    assert_eq!(report.shutdown.faulted, 0);
    assert_eq!(report.shutdown.abandoned, 0);

    let paths = report.checkpoint.clone().unwrap();
    assert!(paths.actor.exists());
    assert!(paths.learner.exists());
    let blobs = Checkpointer::new(dir.path()).load().unwrap();
    assert_eq!(blobs.actor, report.updates.to_le_bytes().to_vec());

    let metrics = report.last_metrics.clone().unwrap();
    assert_eq!(metrics.get("version"), Some(&(report.updates as f32)));
    assert!(metrics.contains_key("mean_reward"));
}

#[test]
fn test_episode_totals_reach_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = DistributedTrainer::new(config(dir.path()));
    let mut logger = RecordingLogger::default();

    let report = trainer
        .train(envs(2), policy, ReferenceLearner::new(), &mut logger)
        .unwrap();

    // Every 5-step rollout over a 4-step episode crosses a terminal.
    assert!(report.global_episode >= report.updates);

    let snapshots = logger.snapshots.lock();
    let last = snapshots.last().unwrap();
    assert_eq!(last.step, report.global_step);
    assert_eq!(last.episode, report.global_episode);
    assert_eq!(last.episode_reward, Some(4.0));
    assert_eq!(last.episode_length, Some(4.0));
    assert!(*logger.flushes.lock() >= 1);
}

#[test]
fn test_learning_rate_follows_global_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path())
        .with_num_learners(1)
        .with_learning_rate(1e-2);
    let trainer = DistributedTrainer::new(config);
    let learner = ReferenceLearner::new();
    let trace = learner.trace();

    trainer
        .train(envs(2), policy, learner, &mut RecordingLogger::default())
        .unwrap();

    let seen = trace.seen();
    assert!(!seen.is_empty());
    assert_eq!(seen[0].global_step, 0);
    assert_eq!(seen[0].learning_rate, 1e-2);
    for pair in seen.windows(2) {
        assert!(pair[1].global_step > pair[0].global_step);
        assert!(pair[1].learning_rate < pair[0].learning_rate);
    }
}

#[test]
fn test_recurrent_states_reach_learner() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = DistributedTrainer::new(config(dir.path()));
    let learner = ReferenceLearner::new().with_work(Duration::from_millis(1));
    let trace = learner.trace();

    trainer
        .train(
            envs(2),
            |_| policy(0).with_recurrent_state(),
            learner,
            &mut RecordingLogger::default(),
        )
        .unwrap();

    // Updates are serialised through the shared model.
    assert_eq!(trace.max_in_update(), 1);
    for update in trace.seen() {
        assert_eq!(update.batch_size, 2);
        assert_eq!(update.num_states, 2);
        assert_eq!(update.slot_indices.len(), 2);
        assert_ne!(update.slot_indices[0], update.slot_indices[1]);
    }
}

#[test]
fn test_trainer_can_run_twice() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = DistributedTrainer::new(config(dir.path()));

    for _ in 0..2 {
        let report = trainer
            .train(
                envs(2),
                policy,
                ReferenceLearner::new(),
                &mut RecordingLogger::default(),
            )
            .unwrap();
        assert!(!report.interrupted);
        assert!(report.global_step >= 100);
        assert_eq!(report.shutdown.joined, 2);
    }
    assert!(!trainer.interrupt_handle().load(Ordering::Acquire));
}

// ============================================================================
// Failures and interrupts
// ============================================================================

#[test]
fn test_learner_failure_stops_run_without_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path()).with_num_train_steps(1_000_000);
    let trainer = DistributedTrainer::new(config);

    let result = trainer.train(
        envs(2),
        policy,
        ReferenceLearner::new().failing_after(2),
        &mut RecordingLogger::default(),
    );

    match result {
        Err(TrainError::Update(e)) => assert!(e.message().contains("injected")),
        other => panic!("expected update failure, got {:?}", other),
    }
    assert!(!dir.path().join("actor.bin").exists());
    assert!(!dir.path().join("learner.bin").exists());
}

#[test]
fn test_all_actors_failing_ends_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path()).with_num_train_steps(1_000_000);
    let trainer = DistributedTrainer::new(config);
    let envs: Vec<CountdownEnv> = (0..2)
        .map(|_| CountdownEnv::new(4).failing_after(3))
        .collect();

    let result = trainer.train(
        envs,
        policy,
        ReferenceLearner::new(),
        &mut RecordingLogger::default(),
    );

    assert!(matches!(
        result,
        Err(TrainError::NoActiveActors { faulted: 2 })
    ));
    assert!(!dir.path().join("actor.bin").exists());
}

#[test]
fn test_interrupt_saves_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path()).with_num_train_steps(u64::MAX / 2);
    let trainer = DistributedTrainer::new(config);
    let interrupt = trainer.interrupt_handle();

    let raiser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        interrupt.store(true, Ordering::Release);
    });

    let report = trainer
        .train(
            envs(2),
            policy,
            ReferenceLearner::new(),
            &mut RecordingLogger::default(),
        )
        .unwrap();
    raiser.join().unwrap();

    assert!(report.interrupted);
    assert!(report.checkpoint.is_some());
    assert_eq!(report.shutdown.joined, 2);
    assert_eq!(report.shutdown.abandoned, 0);
    assert!(Checkpointer::new(dir.path()).load().is_ok());
}

// ============================================================================
// Rejected before start
// ============================================================================

#[test]
fn test_env_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = DistributedTrainer::new(config(dir.path()));
    let result = trainer.train(
        envs(1),
        policy,
        ReferenceLearner::new(),
        &mut RecordingLogger::default(),
    );
    assert!(matches!(
        result,
        Err(TrainError::Config(ConfigError::EnvCountMismatch {
            expected: 2,
            actual: 1
        }))
    ));
}

#[test]
fn test_policy_logits_must_match_action_space() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = DistributedTrainer::new(config(dir.path()));
    let result = trainer.train(
        envs(2),
        |_| ReferencePolicy::new(&SpaceSpec::discrete(3)),
        ReferenceLearner::new(),
        &mut RecordingLogger::default(),
    );
    assert!(matches!(
        result,
        Err(TrainError::Config(ConfigError::Incompatible(_)))
    ));
}

#[test]
fn test_unrepresentable_timeout_rejected_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path()).with_join_timeout_secs(1e20);
    let trainer = DistributedTrainer::new(config);
    let result = trainer.train(
        envs(2),
        policy,
        ReferenceLearner::new(),
        &mut RecordingLogger::default(),
    );
    assert!(matches!(
        result,
        Err(TrainError::Config(ConfigError::OutOfRange {
            field: "join_timeout_secs",
            ..
        }))
    ));
    assert!(!dir.path().join("actor.bin").exists());
}

#[test]
fn test_invalid_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path()).with_num_slots(1).with_batch_size(2);
    let trainer = DistributedTrainer::new(config);
    let result = trainer.train(
        envs(2),
        policy,
        ReferenceLearner::new(),
        &mut RecordingLogger::default(),
    );
    assert!(matches!(
        result,
        Err(TrainError::Config(ConfigError::InsufficientSlots { .. }))
    ));
}
