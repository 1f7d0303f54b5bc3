//! Observation and action space descriptors.
//!
//! The pipeline treats observations and actions as opaque fixed-shape numeric
//! arrays. A [`SpaceSpec`] carries just enough to size the slot buffers and to
//! check that environments and policies agree with each other.

use serde::{Deserialize, Serialize};

/// Logical element type of a space or slot field.
///
/// Slot storage is always `f32`; the tag records what the values mean so a
/// consumer can cast back (e.g. action indices, episode step counts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    I64,
    I32,
    U8,
    Bool,
}

/// Whether a space is a finite set of choices or a bounded box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpaceKind {
    /// `n` discrete choices `0..n`.
    Discrete { n: usize },
    /// Real-valued box with uniform bounds.
    Continuous { low: f32, high: f32 },
}

/// `{shape, dtype, discrete|continuous, range}` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceSpec {
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub kind: SpaceKind,
}

impl SpaceSpec {
    /// Discrete space with `n` choices. Its shape is `(n,)`, matching the
    /// width of the logits a policy produces for it.
    pub fn discrete(n: usize) -> Self {
        Self {
            shape: vec![n],
            dtype: DType::I64,
            kind: SpaceKind::Discrete { n },
        }
    }

    /// Continuous box of the given shape and bounds.
    pub fn continuous(shape: impl Into<Vec<usize>>, low: f32, high: f32) -> Self {
        Self {
            shape: shape.into(),
            dtype: DType::F32,
            kind: SpaceKind::Continuous { low, high },
        }
    }

    /// Observation-style box with an explicit element type.
    pub fn observation(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
            kind: SpaceKind::Continuous {
                low: f32::NEG_INFINITY,
                high: f32::INFINITY,
            },
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self.kind, SpaceKind::Discrete { .. })
    }

    /// Number of elements in one sample of this space.
    pub fn flat_size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Width of a stored action: one index for discrete spaces, the leading
    /// dimension for continuous ones.
    pub fn action_dim(&self) -> usize {
        match self.kind {
            SpaceKind::Discrete { .. } => 1,
            SpaceKind::Continuous { .. } => self.shape.first().copied().unwrap_or(1),
        }
    }

    /// Width of the policy parameters stored per step.
    pub fn logits_dim(&self) -> usize {
        match self.kind {
            SpaceKind::Discrete { n } => n,
            SpaceKind::Continuous { .. } => self.shape.first().copied().unwrap_or(1),
        }
    }

    /// `(low, high)` range of valid values.
    pub fn range(&self) -> (f32, f32) {
        match self.kind {
            SpaceKind::Discrete { n } => (0.0, n.saturating_sub(1) as f32),
            SpaceKind::Continuous { low, high } => (low, high),
        }
    }
}
