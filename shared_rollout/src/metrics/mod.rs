//! Periodic training reports.
//!
//! - [`ConsoleLogger`]: fixed-width table on stdout
//! - [`CsvLogger`]: one CSV row per report
//! - [`MultiLogger`]: combine multiple loggers

pub mod logger;

pub use logger::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
