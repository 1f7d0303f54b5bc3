//! Fixed pool of fixed-length trajectory slots.
//!
//! Every slot holds one buffer per tracked [`Field`], each with a leading
//! dimension of `T + 1` (one overlap frame plus `T` rollout frames). All
//! buffers are allocated once, up front, and never move.
//!
//! # Ownership
//!
//! The pool has no internal locking. Access rights to slot `i` are carried by
//! the single [`SlotToken`] minted for `i` at allocation time:
//!
//! ```text
//!   allocate() ──> [token 0, token 1, ..., token S-1]
//!                        │
//!                        ▼
//!   Free queue ──> Actor (slot_mut) ──> Full queue ──> Learner (slot) ──> Free queue
//! ```
//!
//! Tokens cannot be cloned, so holding `&mut SlotToken` proves exclusive
//! access to that slot's memory. Dropping a token abandons the slot.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::algorithms::PolicyOutput;
use crate::environment::{DType, Frame, SpaceSpec};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A quantity recorded at every timestep of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Obs,
    Reward,
    Terminated,
    Truncated,
    EpisodeReturn,
    EpisodeStep,
    LastAction,
    PolicyLogits,
    Baseline,
    Action,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Obs,
        Field::Reward,
        Field::Terminated,
        Field::Truncated,
        Field::EpisodeReturn,
        Field::EpisodeStep,
        Field::LastAction,
        Field::PolicyLogits,
        Field::Baseline,
        Field::Action,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Obs => "obs",
            Field::Reward => "reward",
            Field::Terminated => "terminated",
            Field::Truncated => "truncated",
            Field::EpisodeReturn => "episode_return",
            Field::EpisodeStep => "episode_step",
            Field::LastAction => "last_action",
            Field::PolicyLogits => "policy_logits",
            Field::Baseline => "baseline",
            Field::Action => "action",
        }
    }
}

/// Per-step shape and logical type of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub field: Field,
    /// Trailing shape of a single timestep (empty for scalars).
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl FieldSpec {
    pub fn new(field: Field, shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        Self {
            field,
            shape: shape.into(),
            dtype,
        }
    }

    /// Number of `f32` values stored per timestep.
    pub fn step_len(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Shape contract shared by every slot of a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotLayout {
    num_steps: usize,
    specs: Vec<FieldSpec>,
}

impl SlotLayout {
    /// Derive the ten field specs from the environment's spaces.
    pub fn from_spaces(observation: &SpaceSpec, action: &SpaceSpec, num_steps: usize) -> Self {
        let action_dtype = if action.is_discrete() {
            DType::I64
        } else {
            DType::F32
        };
        let specs = vec![
            FieldSpec::new(Field::Obs, observation.shape.clone(), observation.dtype),
            FieldSpec::new(Field::Reward, [], DType::F32),
            FieldSpec::new(Field::Terminated, [], DType::Bool),
            FieldSpec::new(Field::Truncated, [], DType::Bool),
            FieldSpec::new(Field::EpisodeReturn, [], DType::F32),
            FieldSpec::new(Field::EpisodeStep, [], DType::I32),
            FieldSpec::new(Field::LastAction, [action.action_dim()], action_dtype),
            FieldSpec::new(Field::PolicyLogits, [action.logits_dim()], DType::F32),
            FieldSpec::new(Field::Baseline, [], DType::F32),
            FieldSpec::new(Field::Action, [action.action_dim()], action_dtype),
        ];
        Self { num_steps, specs }
    }

    /// Rollout length `T`.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Frames per slot, `T + 1`.
    pub fn frames(&self) -> usize {
        self.num_steps + 1
    }

    pub fn spec(&self, field: Field) -> &FieldSpec {
        &self.specs[field.index()]
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }
}

/// Exclusive right to read and write one slot.
///
/// Minted once per index by [`SlotPool::allocate`] and moved between the
/// free and full queues. Not `Clone`.
#[derive(Debug)]
#[must_use = "dropping a slot token abandons the slot"]
pub struct SlotToken {
    index: usize,
    pool_id: u64,
}

impl SlotToken {
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn pool_id(&self) -> u64 {
        self.pool_id
    }
}

struct SlotRecord {
    fields: Vec<Box<[f32]>>,
}

/// Pre-allocated trajectory slots with stable addresses.
pub struct SlotPool {
    id: u64,
    layout: SlotLayout,
    slots: Box<[UnsafeCell<SlotRecord>]>,
}

// SAFETY: a slot's record is only reachable through `slot`/`slot_mut`, which
// require a borrow of that slot's unique, non-cloneable token. Two threads
// can therefore never alias the same record mutably.
unsafe impl Sync for SlotPool {}

impl SlotPool {
    /// Allocate `num_slots` zeroed slots and mint one token per index.
    pub fn allocate(num_slots: usize, layout: SlotLayout) -> (Arc<SlotPool>, Vec<SlotToken>) {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let frames = layout.frames();
        let slots: Box<[UnsafeCell<SlotRecord>]> = (0..num_slots)
            .map(|_| {
                let fields = layout
                    .specs()
                    .iter()
                    .map(|spec| vec![0.0f32; frames * spec.step_len()].into_boxed_slice())
                    .collect();
                UnsafeCell::new(SlotRecord { fields })
            })
            .collect();

        let tokens = (0..num_slots)
            .map(|index| SlotToken { index, pool_id: id })
            .collect();

        (Arc::new(Self { id, layout, slots }), tokens)
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn check(&self, token: &SlotToken) {
        assert_eq!(
            token.pool_id, self.id,
            "slot token {} belongs to a different pool",
            token.index
        );
        assert!(
            token.index < self.slots.len(),
            "slot index {} out of range for pool of {}",
            token.index,
            self.slots.len()
        );
    }

    /// Read-only view of the slot held by `token`.
    pub fn slot<'a>(&'a self, token: &'a SlotToken) -> SlotRef<'a> {
        self.check(token);
        // SAFETY: see `impl Sync`; the shared borrow of the token excludes a
        // concurrent `slot_mut` for the same index.
        let record = unsafe { &*self.slots[token.index].get() };
        SlotRef {
            index: token.index,
            layout: &self.layout,
            record,
        }
    }

    /// Writable view of the slot held by `token`.
    pub fn slot_mut<'a>(&'a self, token: &'a mut SlotToken) -> SlotMut<'a> {
        self.check(token);
        // SAFETY: the mutable borrow of the unique token guarantees no other
        // view of this record exists.
        let record = unsafe { &mut *self.slots[token.index].get() };
        SlotMut {
            index: token.index,
            layout: &self.layout,
            record,
        }
    }
}

fn frame_range(layout: &SlotLayout, field: Field, t: usize) -> std::ops::Range<usize> {
    assert!(
        t < layout.frames(),
        "timestep {} out of range for {} frames",
        t,
        layout.frames()
    );
    let len = layout.spec(field).step_len();
    t * len..(t + 1) * len
}

/// Shared view of one slot.
pub struct SlotRef<'a> {
    index: usize,
    layout: &'a SlotLayout,
    record: &'a SlotRecord,
}

impl<'a> SlotRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whole `(T+1) * step_len` buffer of a field.
    pub fn field(&self, field: Field) -> &'a [f32] {
        &self.record.fields[field.index()]
    }

    /// One timestep of a field.
    pub fn frame(&self, field: Field, t: usize) -> &'a [f32] {
        &self.record.fields[field.index()][frame_range(self.layout, field, t)]
    }

    /// First value of a timestep; convenient for scalar fields.
    pub fn scalar(&self, field: Field, t: usize) -> f32 {
        self.frame(field, t)[0]
    }
}

/// Exclusive view of one slot.
pub struct SlotMut<'a> {
    index: usize,
    layout: &'a SlotLayout,
    record: &'a mut SlotRecord,
}

impl<'a> SlotMut<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn field(&self, field: Field) -> &[f32] {
        &self.record.fields[field.index()]
    }

    pub fn frame(&self, field: Field, t: usize) -> &[f32] {
        &self.record.fields[field.index()][frame_range(self.layout, field, t)]
    }

    pub fn frame_mut(&mut self, field: Field, t: usize) -> &mut [f32] {
        let range = frame_range(self.layout, field, t);
        &mut self.record.fields[field.index()][range]
    }

    fn write(&mut self, field: Field, t: usize, values: &[f32]) {
        let dst = self.frame_mut(field, t);
        assert_eq!(
            dst.len(),
            values.len(),
            "{} width mismatch at t={}",
            field.name(),
            t
        );
        dst.copy_from_slice(values);
    }

    /// Write the environment fields of `frame` at timestep `t`.
    pub fn write_frame(&mut self, t: usize, frame: &Frame) {
        self.write(Field::Obs, t, &frame.obs);
        self.write(Field::Reward, t, &[frame.reward]);
        self.write(Field::Terminated, t, &[bool_value(frame.terminated)]);
        self.write(Field::Truncated, t, &[bool_value(frame.truncated)]);
        self.write(Field::EpisodeReturn, t, &[frame.episode_return]);
        self.write(Field::EpisodeStep, t, &[frame.episode_step as f32]);
        self.write(Field::LastAction, t, &frame.last_action);
    }

    /// Write the policy fields of `output` at timestep `t`.
    pub fn write_output(&mut self, t: usize, output: &PolicyOutput) {
        self.write(Field::PolicyLogits, t, &output.policy_logits);
        self.write(Field::Baseline, t, &[output.baseline]);
        self.write(Field::Action, t, &output.action);
    }
}

#[inline]
fn bool_value(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(num_steps: usize) -> SlotLayout {
        SlotLayout::from_spaces(
            &SpaceSpec::observation([2], DType::F32),
            &SpaceSpec::discrete(3),
            num_steps,
        )
    }

    fn frame(v: f32) -> Frame {
        Frame {
            obs: vec![v, v + 0.5],
            reward: v,
            terminated: false,
            truncated: true,
            episode_return: 2.0 * v,
            episode_step: 4,
            last_action: vec![1.0],
        }
    }

    #[test]
    fn test_layout_shapes() {
        let layout = layout(5);
        assert_eq!(layout.frames(), 6);
        assert_eq!(layout.spec(Field::Obs).shape, vec![2]);
        assert_eq!(layout.spec(Field::Reward).step_len(), 1);
        assert_eq!(layout.spec(Field::PolicyLogits).shape, vec![3]);
        assert_eq!(layout.spec(Field::Action).shape, vec![1]);
        assert_eq!(layout.spec(Field::Action).dtype, DType::I64);
        for (i, spec) in layout.specs().iter().enumerate() {
            assert_eq!(spec.field.index(), i);
        }
    }

    #[test]
    fn test_allocate_mints_one_token_per_slot() {
        let (pool, tokens) = SlotPool::allocate(4, layout(3));
        assert_eq!(pool.num_slots(), 4);
        let indices: Vec<usize> = tokens.iter().map(|t| t.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        for token in &tokens {
            let slot = pool.slot(token);
            assert_eq!(slot.field(Field::Obs).len(), 4 * 2);
            assert!(slot.field(Field::Obs).iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_write_and_read_frame() {
        let (pool, mut tokens) = SlotPool::allocate(2, layout(3));
        let token = &mut tokens[1];

        {
            let mut slot = pool.slot_mut(token);
            slot.write_frame(2, &frame(3.0));
            slot.write_output(
                2,
                &PolicyOutput {
                    action: vec![2.0],
                    baseline: 0.25,
                    policy_logits: vec![0.1, 0.2, 0.7],
                },
            );
        }

        let slot = pool.slot(token);
        assert_eq!(slot.index(), 1);
        assert_eq!(slot.frame(Field::Obs, 2), &[3.0, 3.5]);
        assert_eq!(slot.scalar(Field::Reward, 2), 3.0);
        assert_eq!(slot.scalar(Field::Terminated, 2), 0.0);
        assert_eq!(slot.scalar(Field::Truncated, 2), 1.0);
        assert_eq!(slot.scalar(Field::EpisodeStep, 2), 4.0);
        assert_eq!(slot.frame(Field::PolicyLogits, 2), &[0.1, 0.2, 0.7]);
        assert_eq!(slot.scalar(Field::Action, 2), 2.0);
        // Neighbouring frames untouched.
        assert_eq!(slot.frame(Field::Obs, 1), &[0.0, 0.0]);
    }

    #[test]
    fn test_slots_are_independent() {
        let (pool, mut tokens) = SlotPool::allocate(2, layout(1));
        let (a, b) = tokens.split_at_mut(1);
        pool.slot_mut(&mut a[0]).write_frame(0, &frame(1.0));
        pool.slot_mut(&mut b[0]).write_frame(0, &frame(9.0));
        assert_eq!(pool.slot(&a[0]).scalar(Field::Reward, 0), 1.0);
        assert_eq!(pool.slot(&b[0]).scalar(Field::Reward, 0), 9.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_timestep_out_of_range_aborts() {
        let (pool, tokens) = SlotPool::allocate(1, layout(2));
        let _ = pool.slot(&tokens[0]).frame(Field::Reward, 3);
    }

    #[test]
    #[should_panic(expected = "different pool")]
    fn test_foreign_token_aborts() {
        let (_pool_a, tokens_a) = SlotPool::allocate(1, layout(2));
        let (pool_b, _tokens_b) = SlotPool::allocate(1, layout(2));
        let _ = pool_b.slot(&tokens_a[0]);
    }

    #[test]
    #[should_panic(expected = "width mismatch")]
    fn test_width_mismatch_aborts() {
        let (pool, mut tokens) = SlotPool::allocate(1, layout(2));
        let mut bad = frame(1.0);
        bad.obs = vec![1.0, 2.0, 3.0];
        pool.slot_mut(&mut tokens[0]).write_frame(0, &bad);
    }
}
