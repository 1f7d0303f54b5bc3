//! Algorithm-facing interfaces and numeric helpers.
//!
//! - `policy`: per-worker acting interface and recurrent state
//! - `model_update`: learner-side update interface and checkpoint blobs
//! - `gae`: Generalized Advantage Estimation
//! - `reference`: deterministic collaborators for smoke runs and tests

pub mod gae;
pub mod model_update;
pub mod policy;
pub mod reference;

pub use gae::{compute_gae, normalize_advantages, ADVANTAGE_EPS};
pub use model_update::{Metrics, ModelBlobs, ModelUpdate, UpdateContext, UpdateError};
pub use policy::{Policy, PolicyError, PolicyOutput, RecurrentState};
pub use reference::{UpdateTrace, ReferenceLearner, ReferencePolicy, SeenUpdate};
