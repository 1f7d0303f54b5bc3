//! Model checkpointing.
//!
//! At the end of a successful (or interrupted) run the trainer writes the
//! update collaborator's two blobs into the model directory:
//!
//! ```text
//! model/
//! ├── actor.bin     policy network
//! └── learner.bin   learner network
//! ```

pub mod checkpointer;

pub use checkpointer::{
    load_module_bytes, record_module_bytes, CheckpointError, CheckpointPaths, Checkpointer,
    ACTOR_FILE, LEARNER_FILE,
};
