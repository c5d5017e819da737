//! Time-ordered queue of in-flight projectile resolutions
//!
//! Deadlines are plain milliseconds on the gateway's clock, so the queue can be
//! driven by the server loop or stepped by hand in tests.

use shared::{SessionId, Tile};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A projectile waiting to land
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHit {
    pub attacker: SessionId,
    pub target: Tile,
    pub thrown_at: u64,
    pub deadline: u64,
    seq: u64,
}

impl Ord for PendingHit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for PendingHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
pub struct HitScheduler {
    queue: BinaryHeap<Reverse<PendingHit>>,
    flight_ms: u64,
    next_seq: u64,
}

impl HitScheduler {
    pub fn new(flight_ms: u64) -> Self {
        Self {
            queue: BinaryHeap::new(),
            flight_ms,
            next_seq: 0,
        }
    }

    /// Queues a resolution one flight latency after `now` and returns its deadline
    pub fn schedule(&mut self, attacker: SessionId, target: Tile, now: u64) -> u64 {
        let deadline = now.saturating_add(self.flight_ms);
        let seq = self.next_seq;
        self.next_seq += 1;

        self.queue.push(Reverse(PendingHit {
            attacker,
            target,
            thrown_at: now,
            deadline,
            seq,
        }));
        deadline
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(hit)| hit.deadline)
    }

    /// Removes and returns every hit due at `now`, earliest first
    pub fn drain_due(&mut self, now: u64) -> Vec<PendingHit> {
        let mut due = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|Reverse(hit)| hit.deadline <= now)
        {
            if let Some(Reverse(hit)) = self.queue.pop() {
                due.push(hit);
            }
        }
        due
    }

    /// In-flight hits ordered by deadline
    pub fn pending(&self) -> Vec<PendingHit> {
        let mut pending: Vec<PendingHit> =
            self.queue.iter().map(|Reverse(hit)| hit.clone()).collect();
        pending.sort();
        pending
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
