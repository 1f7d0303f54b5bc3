//! Supervisor for the actor worker threads.
//!
//! Spawns workers, tracks their exit reports and performs the sentinel
//! shutdown: one stop sentinel per worker onto Free, then a bounded wait.
//! Workers still running after the timeout are detached and counted as
//! abandoned.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::worker::{Worker, WorkerReport, WorkerShared};
use crate::algorithms::Policy;
use crate::core::FreeQueue;
use crate::environment::Environment;

/// Outcome of [`ActorSupervisor::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that exited on a sentinel or an interrupt.
    pub joined: usize,
    /// Workers that exited with a fault.
    pub faulted: usize,
    /// Workers still running at the deadline, detached.
    pub abandoned: usize,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.joined + self.faulted + self.abandoned
    }
}

pub struct ActorSupervisor {
    free: FreeQueue,
    handles: Vec<(usize, JoinHandle<()>)>,
    done_tx: Sender<WorkerReport>,
    done_rx: Receiver<WorkerReport>,
    reports: Vec<WorkerReport>,
}

impl ActorSupervisor {
    /// Create a supervisor that sends its sentinels on `free`.
    pub fn new(free: FreeQueue) -> Self {
        let (done_tx, done_rx) = unbounded();
        Self {
            free,
            handles: Vec::new(),
            done_tx,
            done_rx,
            reports: Vec::new(),
        }
    }

    /// Spawn `worker` on its own thread.
    pub fn spawn<E, P>(&mut self, worker: Worker<E, P>, shared: WorkerShared) -> io::Result<()>
    where
        E: Environment + 'static,
        P: Policy + 'static,
    {
        let id = worker.id();
        let handle = worker.spawn(shared, self.done_tx.clone())?;
        self.handles.push((id, handle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Collect exit reports without blocking.
    pub fn poll(&mut self) -> &[WorkerReport] {
        while let Ok(report) = self.done_rx.try_recv() {
            self.reports.push(report);
        }
        &self.reports
    }

    /// Number of workers that have exited so far.
    pub fn finished_count(&mut self) -> usize {
        self.poll().len()
    }

    pub fn faulted_count(&mut self) -> usize {
        self.poll().iter().filter(|r| r.result.is_err()).count()
    }

    /// Enqueue one stop sentinel per spawned worker.
    pub fn stop_all(&self) {
        for _ in 0..self.handles.len() {
            self.free.send_stop();
        }
    }

    /// Stop every worker and wait at most `timeout` for them to exit.
    pub fn shutdown(mut self, timeout: Duration) -> ShutdownReport {
        self.stop_all();
        self.poll();

        let deadline = Instant::now() + timeout;
        while self.reports.len() < self.handles.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(remaining) {
                Ok(report) => self.reports.push(report),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut summary = ShutdownReport::default();
        for (id, handle) in self.handles {
            match self.reports.iter().find(|r| r.worker_id == id) {
                Some(report) => {
                    if report.result.is_ok() {
                        summary.joined += 1;
                    } else {
                        summary.faulted += 1;
                    }
                    if handle.join().is_err() {
                        log::warn!("Actor-{} panicked after reporting", id);
                    }
                }
                None => {
                    log::warn!("Actor-{} did not exit within {:?}, detaching", id, timeout);
                    summary.abandoned += 1;
                }
            }
        }

        log::info!(
            "actors shut down: {} joined, {} faulted, {} abandoned",
            summary.joined,
            summary.faulted,
            summary.abandoned
        );
        summary
    }
}
