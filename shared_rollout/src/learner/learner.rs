//! Learner threads.
//!
//! Each learner thread repeatedly:
//! 1. Checks the shared stop flag and the global step target
//! 2. Samples `batch_size` filled slots through the shared [`BatchSampler`]
//! 3. Runs one update on the shared model under its mutex
//! 4. Broadcasts the new policy parameters to the workers
//! 5. Adds `T * B` steps and the completed episodes to the global counters
//!
//! # Thread Safety and Lifecycle
//!
//! The model is shared as `Arc<Mutex<M>>`; the mutex is the only thing that
//! serialises updates. A failed update raises the shared stop flag so that
//! sibling learners exit at their next check, and the error is returned
//! from the thread. A panicking update also raises the flag before the
//! panic resumes.

use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::sampler::BatchSampler;
use crate::algorithms::{Metrics, ModelUpdate, UpdateContext, UpdateError};
use crate::core::counters::SharedCounters;
use crate::core::param_slot::SharedParamSlot;
use crate::scheduling::LRScheduler;

/// Learner configuration.
#[derive(Debug, Clone)]
pub struct LearnerConfig {
    /// Slots per batch (B).
    pub batch_size: usize,
    /// Global step target; learners stop once the counter reaches it.
    pub num_train_steps: u64,
}

impl LearnerConfig {
    pub fn new(batch_size: usize, num_train_steps: u64) -> Self {
        Self {
            batch_size,
            num_train_steps,
        }
    }
}

/// State shared by every learner thread.
pub struct LearnerShared<M> {
    pub sampler: Arc<BatchSampler>,
    pub model: Arc<Mutex<M>>,
    pub params: SharedParamSlot,
    pub counters: SharedCounters,
    pub scheduler: Arc<dyn LRScheduler>,
    pub last_metrics: Arc<Mutex<Option<Metrics>>>,
    pub stop: Arc<AtomicBool>,
}

impl<M> Clone for LearnerShared<M> {
    fn clone(&self) -> Self {
        Self {
            sampler: Arc::clone(&self.sampler),
            model: Arc::clone(&self.model),
            params: Arc::clone(&self.params),
            counters: Arc::clone(&self.counters),
            scheduler: Arc::clone(&self.scheduler),
            last_metrics: Arc::clone(&self.last_metrics),
            stop: Arc::clone(&self.stop),
        }
    }
}

/// Why a learner loop returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerExit {
    /// The global step counter reached the target.
    TargetReached,
    /// The shared stop flag was raised.
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearnerSummary {
    pub learner_id: usize,
    pub updates: u64,
    pub exit: LearnerExit,
}

pub struct Learner {
    id: usize,
    config: LearnerConfig,
}

impl Learner {
    pub fn new(id: usize, config: LearnerConfig) -> Self {
        Self { id, config }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run the learner loop on the calling thread.
    pub fn run<M: ModelUpdate>(
        &self,
        shared: &LearnerShared<M>,
    ) -> Result<LearnerSummary, UpdateError> {
        let mut updates = 0u64;
        let summary = |updates, exit| LearnerSummary {
            learner_id: self.id,
            updates,
            exit,
        };

        loop {
            if shared.stop.load(Ordering::Acquire) {
                return Ok(summary(updates, LearnerExit::Stopped));
            }
            let global_step = shared.counters.global_step();
            if global_step >= self.config.num_train_steps {
                return Ok(summary(updates, LearnerExit::TargetReached));
            }

            let (batch, states) = match shared.sampler.sample(self.config.batch_size, &shared.stop)
            {
                Some(sampled) => sampled,
                None => return Ok(summary(updates, LearnerExit::Stopped)),
            };

            let ctx = UpdateContext {
                learner_id: self.id,
                global_step,
                learning_rate: shared.scheduler.get_lr(global_step),
            };

            // Publish before releasing the model so versions follow update order.
            let metrics = {
                let mut model = shared.model.lock();
                match model.update(&batch, &states, &ctx) {
                    Ok(metrics) => {
                        shared.params.publish(model.policy_params());
                        metrics
                    }
                    Err(err) => {
                        log::error!("learner {} update failed: {}", self.id, err);
                        shared.stop.store(true, Ordering::Release);
                        return Err(err);
                    }
                }
            };

            let steps = (batch.num_steps() * batch.batch_size()) as u64;
            shared
                .counters
                .record_update(steps, &batch.completed_episodes());
            *shared.last_metrics.lock() = Some(metrics);
            updates += 1;
        }
    }

    /// Spawn the learner loop on a named thread.
    pub fn spawn<M: ModelUpdate + 'static>(
        self,
        shared: LearnerShared<M>,
    ) -> std::io::Result<LearnerHandle> {
        let id = self.id;
        let thread = std::thread::Builder::new()
            .name(format!("Learner-{}", id))
            .spawn(move || {
                log::debug!("learner {} started", id);
                match panic::catch_unwind(AssertUnwindSafe(|| self.run(&shared))) {
                    Ok(result) => {
                        if let Ok(summary) = &result {
                            log::debug!(
                                "learner {} exited ({:?}) after {} updates",
                                id,
                                summary.exit,
                                summary.updates
                            );
                        }
                        result
                    }
                    Err(payload) => {
                        log::error!("learner {} panicked", id);
                        shared.stop.store(true, Ordering::Release);
                        panic::resume_unwind(payload)
                    }
                }
            })?;
        Ok(LearnerHandle { id, thread })
    }
}

/// Handle to a spawned learner thread.
pub struct LearnerHandle {
    id: usize,
    thread: JoinHandle<Result<LearnerSummary, UpdateError>>,
}

impl LearnerHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> std::thread::Result<Result<LearnerSummary, UpdateError>> {
        self.thread.join()
    }
}
