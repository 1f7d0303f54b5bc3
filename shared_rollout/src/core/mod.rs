//! Shared-state primitives of the actor/learner pipeline.

pub mod counters;
pub mod episode_state;
pub mod index_queue;
pub mod param_slot;
pub mod slot_pool;
pub mod state_buffer;

pub use counters::{
    global_counters, CounterSnapshot, EpisodeSummary, GlobalCounters, SharedCounters,
};
pub use episode_state::EpisodeState;
pub use index_queue::{index_queues, Claim, FreeQueue, FullQueue};
pub use param_slot::{param_slot, param_slot_with, ParamSlot, SharedParamSlot};
pub use slot_pool::{Field, FieldSpec, SlotLayout, SlotMut, SlotPool, SlotRef, SlotToken};
pub use state_buffer::StateBuffer;
