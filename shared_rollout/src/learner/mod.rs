//! Learner side of the pipeline.
//!
//! - `BatchSampler`: drains Full into materialised batches, recycles slots
//! - `Batch` / `StateBatch`: time-major copies of sampled slots
//! - `Learner`: update loop run by one or more threads over a shared model

pub mod batch;
pub mod learner;
pub mod sampler;


pub use batch::{Batch, StateBatch};
pub use learner::{Learner, LearnerConfig, LearnerExit, LearnerHandle, LearnerShared, LearnerSummary};
pub use sampler::{BatchSampler, DEFAULT_POLL_INTERVAL};
