//! Global training counters.
//!
//! Written only by learner threads after a successful update, read by the
//! reporting loop. A single mutex covers the step/episode pair and the
//! recent-episode window so a report always sees a consistent view.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Return and length of one completed episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub episode_return: f32,
    pub episode_length: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterSnapshot {
    pub global_step: u64,
    pub global_episode: u64,
    pub updates: u64,
    /// Mean return over the recent-episode window, if any episode finished.
    pub mean_return: Option<f32>,
    pub mean_length: Option<f32>,
}

#[derive(Debug)]
struct CounterState {
    global_step: u64,
    global_episode: u64,
    updates: u64,
    recent: VecDeque<EpisodeSummary>,
}

#[derive(Debug)]
pub struct GlobalCounters {
    state: Mutex<CounterState>,
    window: usize,
}

impl GlobalCounters {
    pub fn new(window: usize) -> Self {
        Self {
            state: Mutex::new(CounterState {
                global_step: 0,
                global_episode: 0,
                updates: 0,
                recent: VecDeque::with_capacity(window),
            }),
            window,
        }
    }

    pub fn global_step(&self) -> u64 {
        self.state.lock().global_step
    }

    pub fn global_episode(&self) -> u64 {
        self.state.lock().global_episode
    }

    /// Account for one finished update. Returns the new global step.
    pub fn record_update(&self, steps: u64, episodes: &[EpisodeSummary]) -> u64 {
        let mut state = self.state.lock();
        state.global_step += steps;
        state.global_episode += episodes.len() as u64;
        state.updates += 1;
        for episode in episodes {
            if state.recent.len() == self.window {
                state.recent.pop_front();
            }
            if self.window > 0 {
                state.recent.push_back(*episode);
            }
        }
        state.global_step
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let state = self.state.lock();
        let n = state.recent.len();
        let (mean_return, mean_length) = if n == 0 {
            (None, None)
        } else {
            let ret: f32 = state.recent.iter().map(|e| e.episode_return).sum();
            let len: f32 = state.recent.iter().map(|e| e.episode_length as f32).sum();
            (Some(ret / n as f32), Some(len / n as f32))
        };
        CounterSnapshot {
            global_step: state.global_step,
            global_episode: state.global_episode,
            updates: state.updates,
            mean_return,
            mean_length,
        }
    }
}

pub type SharedCounters = Arc<GlobalCounters>;

pub fn global_counters(window: usize) -> SharedCounters {
    Arc::new(GlobalCounters::new(window))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(r: f32, l: u32) -> EpisodeSummary {
        EpisodeSummary {
            episode_return: r,
            episode_length: l,
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = GlobalCounters::new(10);
        assert_eq!(counters.snapshot(), CounterSnapshot::default());

        counters.record_update(40, &[ep(3.0, 3)]);
        let step = counters.record_update(40, &[ep(5.0, 5), ep(1.0, 1)]);

        assert_eq!(step, 80);
        let snap = counters.snapshot();
        assert_eq!(snap.global_step, 80);
        assert_eq!(snap.global_episode, 3);
        assert_eq!(snap.updates, 2);
        assert!((snap.mean_return.unwrap() - 3.0).abs() < 1e-6);
        assert!((snap.mean_length.unwrap() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_recent_window_is_bounded() {
        let counters = global_counters(2);
        counters.record_update(1, &[ep(1.0, 1), ep(2.0, 2), ep(9.0, 9)]);

        let snap = counters.snapshot();
        assert_eq!(snap.global_episode, 3);
        assert!((snap.mean_return.unwrap() - 5.5).abs() < 1e-6);
    }

    #[test]
    fn test_concurrent_updates() {
        let counters = global_counters(10);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        c.record_update(8, &[]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counters.global_step(), 3200);
        assert_eq!(counters.global_episode(), 0);
    }
}
