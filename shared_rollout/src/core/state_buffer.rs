//! Recurrent-state side buffer.
//!
//! One [`RecurrentState`] per slot, indexed identically to the [`SlotPool`]
//! and guarded by the same tokens. A worker snapshots its carry-over state
//! here when it claims a slot; the learner reads it back as the bootstrap
//! state for that trajectory segment.

use std::cell::UnsafeCell;
use std::sync::Arc;

use super::slot_pool::{SlotPool, SlotToken};
use crate::algorithms::RecurrentState;

pub struct StateBuffer {
    pool_id: u64,
    states: Box<[UnsafeCell<RecurrentState>]>,
}

// SAFETY: entry `i` is only reachable through a borrow of slot `i`'s unique
// token, same discipline as `SlotPool`.
unsafe impl Sync for StateBuffer {}

impl StateBuffer {
    /// One copy of `template` per slot of `pool`.
    pub fn new(pool: &SlotPool, template: &RecurrentState) -> Arc<Self> {
        let states = (0..pool.num_slots())
            .map(|_| UnsafeCell::new(template.clone()))
            .collect();
        Arc::new(Self {
            pool_id: pool.id(),
            states,
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn check(&self, token: &SlotToken) {
        assert_eq!(
            token.pool_id(),
            self.pool_id,
            "slot token {} belongs to a different pool",
            token.index()
        );
        assert!(
            token.index() < self.states.len(),
            "slot index {} out of range for state buffer of {}",
            token.index(),
            self.states.len()
        );
    }

    /// Snapshot `state` into the entry for `token`'s slot.
    pub fn write(&self, token: &mut SlotToken, state: &RecurrentState) {
        self.check(token);
        // SAFETY: exclusive borrow of the unique token.
        let entry = unsafe { &mut *self.states[token.index()].get() };
        entry.copy_from(state);
    }

    pub fn read<'a>(&'a self, token: &'a SlotToken) -> &'a RecurrentState {
        self.check(token);
        // SAFETY: shared borrow of the token excludes a concurrent `write`.
        unsafe { &*self.states[token.index()].get() }
    }
}
