//! Authoritative game state owned by the server
//!
//! The store is the only place player records are mutated. Everything handed
//! out of it is a copy, so no caller can hold a reference into the world.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{GridBounds, PlayerRecord, SessionId, Tile, MAX_INVENTORY};
use std::collections::HashMap;

/// Authoritative state of one connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSession {
    pub tile: Tile,
    pub inventory: u8,
    pub alive: bool,
    pub score: u32,
}

impl PlayerSession {
    fn spawn(tile: Tile) -> Self {
        Self {
            tile,
            inventory: 0,
            alive: true,
            score: 0,
        }
    }

    pub fn record(&self, id: &SessionId) -> PlayerRecord {
        PlayerRecord {
            id: id.clone(),
            x: self.tile.x,
            y: self.tile.y,
            inventory: self.inventory,
            alive: self.alive,
            score: self.score,
        }
    }
}

/// Returned by `increment_inventory` when the session already holds the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryFull;

/// Ordered mapping of session id to player state plus fixed grid dimensions.
///
/// Insertion order is kept alongside the map because hit resolution picks the
/// earliest-joined session when several share a tile.
pub struct GameStateStore {
    bounds: GridBounds,
    players: HashMap<SessionId, PlayerSession>,
    order: Vec<SessionId>,
    rng: StdRng,
}

impl GameStateStore {
    pub fn new(bounds: GridBounds) -> Self {
        Self::with_rng(bounds, StdRng::from_entropy())
    }

    pub fn with_rng(bounds: GridBounds, rng: StdRng) -> Self {
        Self {
            bounds,
            players: HashMap::new(),
            order: Vec::new(),
            rng,
        }
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Adds a session on a random tile. An existing session with the same id is replaced.
    pub fn create_session(&mut self, id: SessionId) -> PlayerRecord {
        let tile = Tile::new(
            self.rng.gen_range(0..self.bounds.width),
            self.rng.gen_range(0..self.bounds.height),
        );
        let session = PlayerSession::spawn(tile);

        if self.players.insert(id.clone(), session).is_none() {
            self.order.push(id.clone());
        }

        info!("Added player {} at {}", id, tile);
        session.record(&id)
    }

    pub fn remove_session(&mut self, id: &SessionId) -> Option<PlayerRecord> {
        let removed = self.players.remove(id)?;
        self.order.retain(|existing| existing != id);
        info!("Removed player {}", id);
        Some(removed.record(id))
    }

    pub fn session(&self, id: &SessionId) -> Option<PlayerSession> {
        self.players.get(id).copied()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.players.contains_key(id)
    }

    /// Overwrites the position. Bounds are the caller's responsibility.
    pub fn set_position(&mut self, id: &SessionId, tile: Tile) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.tile = tile;
                true
            }
            None => false,
        }
    }

    /// Returns the new count, or `InventoryFull` without mutating when already at max.
    /// Unknown sessions are reported as full since nothing can be added to them.
    pub fn increment_inventory(&mut self, id: &SessionId) -> Result<u8, InventoryFull> {
        let player = self.players.get_mut(id).ok_or(InventoryFull)?;
        if player.inventory >= MAX_INVENTORY {
            return Err(InventoryFull);
        }
        player.inventory += 1;
        Ok(player.inventory)
    }

    pub fn decrement_inventory(&mut self, id: &SessionId) -> Option<u8> {
        let player = self.players.get_mut(id)?;
        player.inventory = player.inventory.saturating_sub(1);
        Some(player.inventory)
    }

    /// Eliminates the first alive session (in join order, attacker excluded)
    /// standing on `target`. A missing or dead attacker resolves to nothing.
    pub fn resolve_hit(&mut self, attacker: &SessionId, target: Tile) -> Option<SessionId> {
        if !self.players.get(attacker).is_some_and(|p| p.alive) {
            return None;
        }

        let hit_id = self
            .order
            .iter()
            .filter(|id| *id != attacker)
            .find(|id| {
                self.players
                    .get(*id)
                    .is_some_and(|p| p.alive && p.tile == target)
            })?
            .clone();

        if let Some(hit) = self.players.get_mut(&hit_id) {
            hit.alive = false;
            hit.inventory = 0;
        }
        if let Some(thrower) = self.players.get_mut(attacker) {
            thrower.score += 1;
        }

        info!("Player {} hit player {} at {}", attacker, hit_id, target);
        Some(hit_id)
    }

    /// Brings an eliminated session back with an empty inventory. No-op when alive.
    pub fn revive(&mut self, id: &SessionId) -> bool {
        match self.players.get_mut(id) {
            Some(player) if !player.alive => {
                player.alive = true;
                player.inventory = 0;
                info!("Player {} revived", id);
                true
            }
            _ => false,
        }
    }

    /// Copies of every record in join order
    pub fn snapshot(&self) -> Vec<PlayerRecord> {
        self.order
            .iter()
            .filter_map(|id| self.players.get(id).map(|p| p.record(id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
