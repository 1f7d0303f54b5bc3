//! Test suite for the training runners.
//!
//! - `config_tests`: builder defaults and validation
//! - `trainer_tests`: end-to-end runs over the reference collaborators,
//!   covering completion, learner failure, actor loss and interrupts

mod trainer_tests;
