//! Free/Full index queues.
//!
//! The two queues are the ownership-transfer protocol for the slot pool:
//! a [`SlotToken`] lives in exactly one of {Free, Full, a worker, a learner}
//! at any time. Free additionally carries a [`Claim::Stop`] sentinel that
//! tells an idle worker to exit.
//!
//! Both are bounded crossbeam channels. Each handle keeps a sender and a
//! receiver, so a queue never disconnects while any handle is alive.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::slot_pool::SlotToken;

/// What a worker receives from the free queue.
#[derive(Debug)]
pub enum Claim {
    Slot(SlotToken),
    /// No more work.
    Stop,
}

/// Queue of slots available for writing.
#[derive(Clone)]
pub struct FreeQueue {
    tx: Sender<Claim>,
    rx: Receiver<Claim>,
}

impl FreeQueue {
    /// Return a slot to the pool of writable slots.
    pub fn release(&self, token: SlotToken) {
        if let Err(err) = self.tx.send(Claim::Slot(token)) {
            log::error!("free queue closed, slot {} lost", index_of(&err.0));
        }
    }

    /// Enqueue one stop sentinel.
    pub fn send_stop(&self) {
        if self.tx.send(Claim::Stop).is_err() {
            log::error!("free queue closed, stop sentinel lost");
        }
    }

    /// Block until a slot or a sentinel is available.
    pub fn claim(&self) -> Claim {
        self.rx.recv().unwrap_or(Claim::Stop)
    }

    /// Like [`claim`](Self::claim) but gives up after `timeout`.
    pub fn claim_timeout(&self, timeout: Duration) -> Option<Claim> {
        match self.rx.recv_timeout(timeout) {
            Ok(claim) => Some(claim),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Claim::Stop),
        }
    }

    pub fn try_claim(&self) -> Option<Claim> {
        match self.rx.try_recv() {
            Ok(claim) => Some(claim),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Claim::Stop),
        }
    }

    /// Entries currently queued, sentinels included.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Queue of slots holding a completed rollout.
#[derive(Clone)]
pub struct FullQueue {
    tx: Sender<SlotToken>,
    rx: Receiver<SlotToken>,
}

impl FullQueue {
    /// Hand a filled slot to the learners.
    pub fn publish(&self, token: SlotToken) {
        if let Err(err) = self.tx.send(token) {
            log::error!("full queue closed, slot {} lost", err.0.index());
        }
    }

    /// Wait up to `timeout` for a filled slot.
    pub fn take_timeout(&self, timeout: Duration) -> Option<SlotToken> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_take(&self) -> Option<SlotToken> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

fn index_of(claim: &Claim) -> String {
    match claim {
        Claim::Slot(token) => token.index().to_string(),
        Claim::Stop => "<stop>".to_string(),
    }
}

/// Create the queue pair for a pool of `num_slots` slots.
///
/// Free is sized for every slot plus `num_sentinels` stop markers so that
/// neither releasing a slot nor sending a sentinel can block.
pub fn index_queues(num_slots: usize, num_sentinels: usize) -> (FreeQueue, FullQueue) {
    let (free_tx, free_rx) = bounded(num_slots + num_sentinels);
    let (full_tx, full_rx) = bounded(num_slots.max(1));
    (
        FreeQueue {
            tx: free_tx,
            rx: free_rx,
        },
        FullQueue {
            tx: full_tx,
            rx: full_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::slot_pool::{SlotLayout, SlotPool};
    use crate::environment::{DType, SpaceSpec};

    fn tokens(n: usize) -> Vec<SlotToken> {
        let layout = SlotLayout::from_spaces(
            &SpaceSpec::observation([1], DType::F32),
            &SpaceSpec::discrete(2),
            2,
        );
        SlotPool::allocate(n, layout).1
    }

    #[test]
    fn test_free_queue_is_fifo() {
        let (free, _full) = index_queues(3, 1);
        for token in tokens(3) {
            free.release(token);
        }
        assert_eq!(free.len(), 3);

        let order: Vec<usize> = (0..3)
            .map(|_| match free.claim() {
                Claim::Slot(t) => t.index(),
                Claim::Stop => panic!("unexpected stop"),
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(free.is_empty());
    }

    #[test]
    fn test_sentinel_follows_slots() {
        let (free, _full) = index_queues(1, 1);
        let mut toks = tokens(1);
        free.release(toks.remove(0));
        free.send_stop();

        assert!(matches!(free.claim(), Claim::Slot(_)));
        assert!(matches!(free.claim(), Claim::Stop));
        assert!(free.try_claim().is_none());
    }

    #[test]
    fn test_release_and_sentinels_never_block_at_capacity() {
        let (free, _full) = index_queues(4, 2);
        for token in tokens(4) {
            free.release(token);
        }
        free.send_stop();
        free.send_stop();
        assert_eq!(free.len(), 6);
    }

    #[test]
    fn test_full_queue_timeout() {
        let (_free, full) = index_queues(2, 0);
        assert!(full.take_timeout(Duration::from_millis(10)).is_none());

        let mut toks = tokens(2);
        full.publish(toks.remove(1));
        let got = full.take_timeout(Duration::from_millis(10));
        assert_eq!(got.map(|t| t.index()), Some(1));
    }
}
