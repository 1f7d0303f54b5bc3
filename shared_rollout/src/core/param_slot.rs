//! Versioned policy parameter broadcast.
//!
//! ```text
//! Learner Thread                           Actor Thread
//! ┌──────────────────┐                     ┌──────────────────┐
//! │ update()         │                     │ policy replica   │
//! │       ↓          │                     │       ↑          │
//! │ policy_params()  │                     │ load_params()    │
//! │       ↓          │                     │       ↑          │
//! │   Vec<u8>  ─────────ParamSlot────────→ │  (version, bytes)│
//! └──────────────────┘                     └──────────────────┘
//! ```
//!
//! Workers poll at claim time and only copy when the version moved.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Latest serialised policy parameters plus a monotonically increasing version.
pub struct ParamSlot {
    bytes: Mutex<Option<Arc<Vec<u8>>>>,
    version: AtomicU64,
}

impl ParamSlot {
    pub fn new() -> Self {
        Self {
            bytes: Mutex::new(None),
            version: AtomicU64::new(0),
        }
    }

    pub fn with_initial(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(Arc::new(bytes))),
            version: AtomicU64::new(1),
        }
    }

    /// Current version; 0 means nothing was ever published.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Replace the published parameters.
    pub fn publish(&self, bytes: Vec<u8>) {
        let mut guard = self.bytes.lock();
        *guard = Some(Arc::new(bytes));
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Parameters newer than `seen`, with their version.
    ///
    /// Read under the lock so the returned version always matches the bytes.
    pub fn newer_than(&self, seen: u64) -> Option<(u64, Arc<Vec<u8>>)> {
        let guard = self.bytes.lock();
        let version = self.version.load(Ordering::Acquire);
        if version <= seen {
            return None;
        }
        guard.as_ref().map(|bytes| (version, Arc::clone(bytes)))
    }

    pub fn get(&self) -> Option<Arc<Vec<u8>>> {
        self.bytes.lock().clone()
    }
}

impl Default for ParamSlot {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedParamSlot = Arc<ParamSlot>;

pub fn param_slot() -> SharedParamSlot {
    Arc::new(ParamSlot::new())
}

pub fn param_slot_with(bytes: Vec<u8>) -> SharedParamSlot {
    Arc::new(ParamSlot::with_initial(bytes))
}
