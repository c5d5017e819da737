//! Tile-by-tile movement along a planned path
//!
//! The stepper is driven by the frame loop with a millisecond clock. It never
//! holds partial-tile state: a step either happened or it did not.

use shared::{Tile, STEP_INTERVAL_MS};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct PathStepper {
    remaining: VecDeque<Tile>,
    next_step_at: u64,
    interval_ms: u64,
}

impl Default for PathStepper {
    fn default() -> Self {
        Self::new(STEP_INTERVAL_MS)
    }
}

impl PathStepper {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            remaining: VecDeque::new(),
            next_step_at: 0,
            interval_ms,
        }
    }

    /// Replaces any active path. The first element is the tile the player is
    /// standing on and is skipped; the next tile is reached one interval after `now`.
    pub fn start(&mut self, path: Vec<Tile>, now: u64) {
        self.remaining = path.into_iter().skip(1).collect();
        self.next_step_at = now + self.interval_ms;
    }

    pub fn cancel(&mut self) {
        self.remaining.clear();
    }

    pub fn is_moving(&self) -> bool {
        !self.remaining.is_empty()
    }

    pub fn destination(&self) -> Option<Tile> {
        self.remaining.back().copied()
    }

    /// Returns the next tile once its step time has come. At most one tile per
    /// call, so a stalled frame never makes the player skip tiles.
    pub fn advance(&mut self, now: u64) -> Option<Tile> {
        if self.remaining.is_empty() || now < self.next_step_at {
            return None;
        }

        let tile = self.remaining.pop_front()?;
        self.next_step_at = now + self.interval_ms;
        Some(tile)
    }
}
