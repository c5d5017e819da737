//! Client-side view of the authoritative game
//!
//! Snapshots from the server are reconciled into two places: the locally
//! controlled player, whose position stays under the path stepper's control,
//! and the render proxies for every other player, owned by the render layer
//! and driven through [`ProxySink`].

use crate::pathfinding::PathPlanner;
use log::{debug, info};
use shared::{PlayerRecord, SessionId, Tile, MAX_INVENTORY};
use std::collections::HashSet;
use thiserror::Error;

/// Receiver of proxy lifecycle calls for remote players
pub trait ProxySink {
    fn spawn_proxy(&mut self, player: &PlayerRecord);
    fn update_proxy(&mut self, player: &PlayerRecord);
    fn despawn_proxy(&mut self, id: &SessionId);
}

/// Locally refused actions, shown to the player instead of being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Not connected")]
    NotConnected,
    #[error("Cannot move when dead")]
    MoveWhileDead,
    #[error("Cannot reach that tile")]
    Unreachable,
    #[error("Cannot throw when dead")]
    ThrowWhileDead,
    #[error("No projectiles available")]
    NoProjectiles,
    #[error("Cannot throw while moving")]
    ThrowWhileMoving,
    #[error("Cannot throw outside play area")]
    OutsidePlayArea,
    #[error("Cannot pick up when dead")]
    PickupWhileDead,
    #[error("Inventory full! ({max}/{max})", max = MAX_INVENTORY)]
    InventoryFull,
    #[error("Already alive")]
    ReviveWhileAlive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPlayer {
    pub tile: Tile,
    pub inventory: u8,
    pub alive: bool,
    pub score: u32,
    placed: bool,
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self {
            tile: Tile::default(),
            inventory: 0,
            alive: true,
            score: 0,
            placed: false,
        }
    }
}

/// What a snapshot changed for the local player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotOutcome {
    pub inventory_before: u8,
    pub inventory_after: u8,
    pub eliminated: bool,
    pub revived: bool,
}

impl SnapshotOutcome {
    /// Player-facing message for an inventory change, if any
    pub fn inventory_notice(&self) -> Option<String> {
        if self.inventory_after > self.inventory_before {
            if self.inventory_after == MAX_INVENTORY {
                Some(format!("Inventory full! ({}/{})", MAX_INVENTORY, MAX_INVENTORY))
            } else {
                Some(format!(
                    "Projectile picked up ({}/{})",
                    self.inventory_after, MAX_INVENTORY
                ))
            }
        } else if self.inventory_after < self.inventory_before && !self.eliminated {
            Some(format!(
                "Projectile thrown ({}/{})",
                self.inventory_after, MAX_INVENTORY
            ))
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct ClientGameState {
    session_id: Option<SessionId>,
    pub local: LocalPlayer,
    known_remote: HashSet<SessionId>,
    scoreboard: Vec<PlayerRecord>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Binds this state to a new session, forgetting the previous one
    pub fn set_session(&mut self, id: SessionId) {
        self.session_id = Some(id);
        self.local = LocalPlayer::default();
    }

    pub fn is_local(&self, id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(id)
    }

    pub fn known_remote_ids(&self) -> &HashSet<SessionId> {
        &self.known_remote
    }

    /// Latest records, highest score first
    pub fn scoreboard(&self) -> &[PlayerRecord] {
        &self.scoreboard
    }

    /// Reconciles an authoritative snapshot.
    ///
    /// The local player takes inventory, alive and score from the snapshot but
    /// keeps its own position once placed. Remote players get a proxy on first
    /// sight and updates afterwards; ids that vanished are despawned once.
    pub fn apply_server_state<S: ProxySink>(
        &mut self,
        players: &[PlayerRecord],
        sink: &mut S,
    ) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome {
            inventory_before: self.local.inventory,
            inventory_after: self.local.inventory,
            ..SnapshotOutcome::default()
        };

        let mut current = HashSet::with_capacity(players.len());

        for player in players {
            if self.is_local(&player.id) {
                outcome.eliminated = self.local.alive && !player.alive;
                outcome.revived = !self.local.alive && player.alive;
                self.apply_local(player);
                outcome.inventory_after = player.inventory;
                continue;
            }

            current.insert(player.id.clone());
            if self.known_remote.insert(player.id.clone()) {
                debug!("Spawning proxy for {}", player.id);
                sink.spawn_proxy(player);
            } else {
                sink.update_proxy(player);
            }
        }

        let departed: Vec<SessionId> = self
            .known_remote
            .iter()
            .filter(|id| !current.contains(*id))
            .cloned()
            .collect();
        for id in departed {
            debug!("Despawning proxy for {}", id);
            self.known_remote.remove(&id);
            sink.despawn_proxy(&id);
        }

        self.scoreboard = players.to_vec();
        self.scoreboard.sort_by(|a, b| b.score.cmp(&a.score));

        outcome
    }

    fn apply_local(&mut self, player: &PlayerRecord) {
        self.local.inventory = player.inventory;
        self.local.alive = player.alive;
        self.local.score = player.score;

        if !self.local.placed {
            self.local.tile = player.tile();
            self.local.placed = true;
            info!("Spawned at {}", self.local.tile);
        }
    }

    /// Handles a hit notification. Returns true when it was aimed at us.
    pub fn apply_hit(&mut self, hit_by: &SessionId, target: &SessionId) -> bool {
        if !self.is_local(target) {
            return false;
        }
        info!("Eliminated by {}", hit_by);
        self.local.alive = false;
        self.local.inventory = 0;
        true
    }

    /// Records a completed step of the local player
    pub fn step_to(&mut self, tile: Tile) {
        self.local.tile = tile;
    }

    /// Whether walking anywhere is allowed right now
    pub fn check_move(&self) -> Result<(), Rejection> {
        self.require_session()?;
        if !self.local.alive {
            return Err(Rejection::MoveWhileDead);
        }
        Ok(())
    }

    /// Plans a walk to `target`. `Ok(None)` means we are already there.
    pub fn plan_move(
        &self,
        target: Tile,
        planner: &PathPlanner,
    ) -> Result<Option<Vec<Tile>>, Rejection> {
        self.check_move()?;
        if target == self.local.tile {
            return Ok(None);
        }

        let path = planner.find_path(self.local.tile, target);
        if path.is_empty() {
            return Err(Rejection::Unreachable);
        }
        Ok(Some(path))
    }

    /// Validates a throw at the tile under the pointer
    pub fn check_throw(&self, target: Option<Tile>, moving: bool) -> Result<Tile, Rejection> {
        self.require_session()?;
        if moving {
            return Err(Rejection::ThrowWhileMoving);
        }
        if !self.local.alive {
            return Err(Rejection::ThrowWhileDead);
        }
        if self.local.inventory == 0 {
            return Err(Rejection::NoProjectiles);
        }
        target.ok_or(Rejection::OutsidePlayArea)
    }

    pub fn check_pickup(&self) -> Result<(), Rejection> {
        self.require_session()?;
        if !self.local.alive {
            return Err(Rejection::PickupWhileDead);
        }
        if self.local.inventory >= MAX_INVENTORY {
            return Err(Rejection::InventoryFull);
        }
        Ok(())
    }

    pub fn check_revive(&self) -> Result<(), Rejection> {
        self.require_session()?;
        if self.local.alive {
            return Err(Rejection::ReviveWhileAlive);
        }
        Ok(())
    }

    fn require_session(&self) -> Result<(), Rejection> {
        match self.session_id {
            Some(_) => Ok(()),
            None => Err(Rejection::NotConnected),
        }
    }
}
