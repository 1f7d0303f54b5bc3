//! Materialised training batch.
//!
//! A [`Batch`] owns copies of `B` slots stacked time-major: every field is a
//! contiguous `[T+1, B, field shape...]` array. It holds no view into the
//! slot pool, so the slots it came from can be handed back to the workers
//! as soon as it is built.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::algorithms::RecurrentState;
use crate::core::counters::EpisodeSummary;
use crate::core::slot_pool::{Field, SlotLayout, SlotPool, SlotToken};
use crate::core::state_buffer::StateBuffer;

#[derive(Debug, Clone)]
pub struct Batch {
    layout: SlotLayout,
    batch_size: usize,
    slot_indices: Vec<usize>,
    fields: Vec<Vec<f32>>,
}

impl Batch {
    /// Copy the slots held by `tokens`, in order, into a new batch.
    pub fn gather(pool: &SlotPool, tokens: &[SlotToken]) -> Self {
        let layout = pool.layout().clone();
        let batch_size = tokens.len();
        let frames = layout.frames();
        let slots: Vec<_> = tokens.iter().map(|token| pool.slot(token)).collect();

        let fields = Field::ALL
            .iter()
            .map(|&field| {
                let len = layout.spec(field).step_len();
                let mut data = Vec::with_capacity(frames * batch_size * len);
                for t in 0..frames {
                    for slot in &slots {
                        data.extend_from_slice(slot.frame(field, t));
                    }
                }
                data
            })
            .collect();

        Self {
            layout,
            batch_size,
            slot_indices: tokens.iter().map(SlotToken::index).collect(),
            fields,
        }
    }

    /// Rollout length `T`.
    pub fn num_steps(&self) -> usize {
        self.layout.num_steps()
    }

    pub fn frames(&self) -> usize {
        self.layout.frames()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Pool indices the batch was copied from, in claim order.
    pub fn slot_indices(&self) -> &[usize] {
        &self.slot_indices
    }

    /// Flat time-major data of a field.
    pub fn field(&self, field: Field) -> &[f32] {
        &self.fields[field.index()]
    }

    /// `[T+1, B, field shape...]`
    pub fn shape(&self, field: Field) -> Vec<usize> {
        let mut shape = vec![self.frames(), self.batch_size];
        shape.extend_from_slice(&self.layout.spec(field).shape);
        shape
    }

    /// Values of `field` at timestep `t` of batch entry `b`.
    pub fn get(&self, field: Field, t: usize, b: usize) -> &[f32] {
        assert!(b < self.batch_size, "batch entry {} out of range", b);
        let len = self.layout.spec(field).step_len();
        let start = (t * self.batch_size + b) * len;
        &self.fields[field.index()][start..start + len]
    }

    pub fn scalar(&self, field: Field, t: usize, b: usize) -> f32 {
        self.get(field, t, b)[0]
    }

    /// Episodes that ended inside the rollout frames `1..=T`.
    ///
    /// Frame 0 is the overlap frame and was already counted with the batch
    /// that produced it.
    pub fn completed_episodes(&self) -> Vec<EpisodeSummary> {
        let mut episodes = Vec::new();
        for t in 1..self.frames() {
            for b in 0..self.batch_size {
                let done = self.scalar(Field::Terminated, t, b) > 0.5
                    || self.scalar(Field::Truncated, t, b) > 0.5;
                if done {
                    episodes.push(EpisodeSummary {
                        episode_return: self.scalar(Field::EpisodeReturn, t, b),
                        episode_length: self.scalar(Field::EpisodeStep, t, b) as u32,
                    });
                }
            }
        }
        episodes
    }

    /// Export a field as a `[T+1, B, field shape...]` tensor.
    ///
    /// # Panics
    ///
    /// Panics if `D` does not equal the field's rank plus two.
    pub fn tensor<B: Backend, const D: usize>(
        &self,
        field: Field,
        device: &B::Device,
    ) -> Tensor<B, D> {
        let shape = self.shape(field);
        assert_eq!(
            shape.len(),
            D,
            "{} has rank {}, requested {}",
            field.name(),
            shape.len(),
            D
        );
        let data = TensorData::new(self.field(field).to_vec(), shape);
        Tensor::from_data(data, device)
    }
}

/// Bootstrap recurrent states paired with a [`Batch`], one per entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBatch {
    states: Vec<RecurrentState>,
}

impl StateBatch {
    pub fn gather(buffer: &StateBuffer, tokens: &[SlotToken]) -> Self {
        Self {
            states: tokens.iter().map(|token| buffer.read(token).clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, b: usize) -> &RecurrentState {
        &self.states[b]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecurrentState> {
        self.states.iter()
    }

    pub fn into_inner(self) -> Vec<RecurrentState> {
        self.states
    }
}
