//! Training report loggers.
//!
//! The trainer builds one [`TrainingSnapshot`] per report interval and hands
//! it to a [`MetricsLogger`]. Backends decide how to render it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::algorithms::Metrics;

/// One periodic training report.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSnapshot {
    /// Global environment steps consumed by learners.
    pub step: u64,
    /// Global completed episodes.
    pub episode: u64,
    /// Mean length over the recent-episodes window.
    pub episode_length: Option<f32>,
    /// Mean return over the recent-episodes window.
    pub episode_reward: Option<f32>,
    /// Steps per second since the previous report.
    pub fps: f64,
    pub total_time_secs: f64,
    pub learning_rate: f64,
    /// Diagnostics from the latest update.
    pub metrics: Metrics,
}

impl TrainingSnapshot {
    pub fn new(step: u64, episode: u64) -> Self {
        Self {
            step,
            episode,
            episode_length: None,
            episode_reward: None,
            fps: 0.0,
            total_time_secs: 0.0,
            learning_rate: 0.0,
            metrics: Metrics::new(),
        }
    }

    pub fn with_episodes(mut self, reward: Option<f32>, length: Option<f32>) -> Self {
        self.episode_reward = reward;
        self.episode_length = length;
        self
    }

    pub fn with_timing(mut self, fps: f64, total_time_secs: f64) -> Self {
        self.fps = fps;
        self.total_time_secs = total_time_secs;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

impl<L: MetricsLogger + ?Sized> MetricsLogger for Box<L> {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        (**self).log(snapshot)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}

fn optional(value: Option<f32>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

// ============================================================================
// ConsoleLogger
// ============================================================================

/// Fixed-width table on stdout.
pub struct ConsoleLogger {
    show_header: bool,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self { show_header: true }
    }

    fn print_header(&self) {
        println!(
            "{:>12} {:>9} {:>10} {:>9} {:>9} {:>9} {:>10}  Metrics",
            "Step", "Episodes", "Reward", "Length", "FPS", "Time", "LR"
        );
        println!("{}", "-".repeat(90));
    }

    fn format_row(snapshot: &TrainingSnapshot) -> String {
        let metrics = snapshot
            .metrics
            .iter()
            .map(|(k, v)| format!("{}={:.4}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "{:>12} {:>9} {:>10} {:>9} {:>9.0} {:>8.1}s {:>10.2e}  {}",
            snapshot.step,
            snapshot.episode,
            optional(snapshot.episode_reward),
            optional(snapshot.episode_length),
            snapshot.fps,
            snapshot.total_time_secs,
            snapshot.learning_rate,
            metrics
        )
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }
        println!("{}", Self::format_row(snapshot));
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }
}

// ============================================================================
// CsvLogger
// ============================================================================

const CSV_COLUMNS: &str =
    "step,episode,episode_reward,episode_length,fps,total_time_secs,learning_rate";

/// One CSV row per report.
///
/// Metric columns are fixed by the first snapshot; later metrics with other
/// keys are dropped and missing ones are left empty.
pub struct CsvLogger<W: Write + Send = BufWriter<File>> {
    writer: W,
    metric_keys: Option<Vec<String>>,
}

impl CsvLogger<BufWriter<File>> {
    /// Create (truncate) the CSV file at `path`.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write + Send> CsvLogger<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer,
            metric_keys: None,
        }
    }

    pub fn into_inner(mut self) -> W {
        let _ = self.writer.flush();
        self.writer
    }

    fn write_row(&mut self, snapshot: &TrainingSnapshot) -> std::io::Result<()> {
        if self.metric_keys.is_none() {
            let keys: Vec<String> = snapshot.metrics.keys().cloned().collect();
            let mut header = CSV_COLUMNS.to_string();
            for key in &keys {
                header.push(',');
                header.push_str(key);
            }
            writeln!(self.writer, "{}", header)?;
            self.metric_keys = Some(keys);
        }

        let cell = |v: Option<f32>| v.map(|v| v.to_string()).unwrap_or_default();
        let mut row = format!(
            "{},{},{},{},{:.2},{:.3},{}",
            snapshot.step,
            snapshot.episode,
            cell(snapshot.episode_reward),
            cell(snapshot.episode_length),
            snapshot.fps,
            snapshot.total_time_secs,
            snapshot.learning_rate
        );
        for key in self.metric_keys.iter().flatten() {
            row.push(',');
            row.push_str(&cell(snapshot.metrics.get(key).copied()));
        }
        writeln!(self.writer, "{}", row)
    }
}

impl<W: Write + Send> MetricsLogger for CsvLogger<W> {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if let Err(err) = self.write_row(snapshot) {
            log::warn!("failed to write CSV report row: {}", err);
        }
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// MultiLogger
// ============================================================================

/// Fans every report out to several backends.
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
