//! Actor side of the pipeline.
//!
//! - `Worker`: one environment and one policy replica filling slots
//! - `ActorSupervisor`: spawns workers and performs the sentinel shutdown

pub mod supervisor;
pub mod worker;


pub use supervisor::{ActorSupervisor, ShutdownReport};
pub use worker::{
    Worker, WorkerConfig, WorkerError, WorkerExit, WorkerReport, WorkerShared,
    DEFAULT_CLAIM_POLL,
};
