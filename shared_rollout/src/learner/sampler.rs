//! Batch sampler shared by all learner threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::batch::{Batch, StateBatch};
use crate::core::index_queue::{FreeQueue, FullQueue};
use crate::core::slot_pool::{SlotPool, SlotToken};
use crate::core::state_buffer::StateBuffer;

/// How often a blocked learner re-checks its stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drains Full into time-major batches and recycles the slots to Free.
///
/// Index collection is serialised by a mutex so concurrent learners never
/// interleave claims within one batch. Copying happens outside the lock.
pub struct BatchSampler {
    pool: Arc<SlotPool>,
    states: Arc<StateBuffer>,
    free: FreeQueue,
    full: FullQueue,
    claim_lock: Mutex<()>,
    poll_interval: Duration,
}

impl BatchSampler {
    pub fn new(
        pool: Arc<SlotPool>,
        states: Arc<StateBuffer>,
        free: FreeQueue,
        full: FullQueue,
    ) -> Self {
        Self {
            pool,
            states,
            free,
            full,
            claim_lock: Mutex::new(()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Block until `batch_size` filled slots are available, copy them out,
    /// release them to Free, then return the copies.
    ///
    /// Returns `None` if `stop` is raised while waiting; any slot already
    /// claimed for the batch is returned to Free first.
    pub fn sample(&self, batch_size: usize, stop: &AtomicBool) -> Option<(Batch, StateBatch)> {
        let tokens = self.claim(batch_size, stop)?;

        let batch = Batch::gather(&self.pool, &tokens);
        let states = StateBatch::gather(&self.states, &tokens);

        for token in tokens {
            self.free.release(token);
        }
        Some((batch, states))
    }

    fn claim(&self, batch_size: usize, stop: &AtomicBool) -> Option<Vec<SlotToken>> {
        let _guard = self.claim_lock.lock();
        let mut tokens = Vec::with_capacity(batch_size);

        while tokens.len() < batch_size {
            if stop.load(Ordering::Acquire) {
                log::debug!(
                    "sampler stopped with {}/{} slots claimed, returning them",
                    tokens.len(),
                    batch_size
                );
                for token in tokens {
                    self.free.release(token);
                }
                return None;
            }
            if let Some(token) = self.full.take_timeout(self.poll_interval) {
                tokens.push(token);
            }
        }
        Some(tokens)
    }
}
