//! Per-session protocol state machine in front of the game state store
//!
//! Every handler validates its intent against the live store, applies the
//! mutation, and returns the packets the network layer must deliver. Rejected
//! intents are logged and produce no output at all.

use crate::game::GameStateStore;
use crate::scheduler::{HitScheduler, PendingHit};
use log::{debug, info};
use shared::{Packet, SessionId, Tile, MAX_INVENTORY};
use thiserror::Error;

/// A delivery produced by the gateway, fanned out by the network layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Broadcast(Packet),
    Unicast { to: SessionId, packet: Packet },
}

/// Requests a connected session can make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Move(Tile),
    Throw(Tile),
    Pickup,
    Revive,
}

impl Intent {
    /// Maps a client packet to an intent. Handshake and control packets map to None.
    pub fn from_packet(packet: &Packet) -> Option<Self> {
        match *packet {
            Packet::Move { x, y } => Some(Intent::Move(Tile::new(x, y))),
            Packet::ThrowProjectile { to_x, to_y } => Some(Intent::Throw(Tile::new(to_x, to_y))),
            Packet::Pickup => Some(Intent::Pickup),
            Packet::Revive => Some(Intent::Revive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Eliminated,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("session is not connected")]
    UnknownSession,
    #[error("session is eliminated")]
    NotActive,
    #[error("session is not eliminated")]
    NotEliminated,
    #[error("tile {0} is outside the grid")]
    OutOfBounds(Tile),
    #[error("no projectiles left")]
    NoInventory,
    #[error("inventory full")]
    InventoryFull,
}

pub struct SessionGateway {
    store: GameStateStore,
    scheduler: HitScheduler,
}

impl SessionGateway {
    pub fn new(store: GameStateStore, flight_ms: u64) -> Self {
        Self {
            store,
            scheduler: HitScheduler::new(flight_ms),
        }
    }

    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    pub fn session_state(&self, id: &SessionId) -> SessionState {
        match self.store.session(id) {
            None => SessionState::Disconnected,
            Some(session) if session.alive => SessionState::Active,
            Some(_) => SessionState::Eliminated,
        }
    }

    pub fn connect(&mut self, id: SessionId) -> Vec<Outbound> {
        let player = self.store.create_session(id.clone());

        vec![
            Outbound::Unicast {
                to: id.clone(),
                packet: Packet::Connected {
                    session_id: id.clone(),
                },
            },
            Outbound::Unicast {
                to: id.clone(),
                packet: Packet::InitialState {
                    players: self.store.snapshot(),
                },
            },
            Outbound::Broadcast(Packet::PlayerJoined { id, player }),
            self.snapshot(),
        ]
    }

    /// Removes the session. In-flight throws from it stay queued and resolve as no-ops.
    pub fn disconnect(&mut self, id: &SessionId) -> Vec<Outbound> {
        if self.store.remove_session(id).is_none() {
            return Vec::new();
        }

        vec![
            Outbound::Broadcast(Packet::PlayerLeft { id: id.clone() }),
            self.snapshot(),
        ]
    }

    pub fn handle_intent(&mut self, id: &SessionId, intent: Intent, now: u64) -> Vec<Outbound> {
        let result = match intent {
            Intent::Move(tile) => self.handle_move(id, tile),
            Intent::Throw(target) => self.handle_throw(id, target, now),
            Intent::Pickup => self.handle_pickup(id),
            Intent::Revive => self.handle_revive(id),
        };

        match result {
            Ok(outbound) => outbound,
            Err(reason) => {
                debug!("Dropped {:?} from {}: {}", intent, id, reason);
                Vec::new()
            }
        }
    }

    fn require(&self, id: &SessionId, wanted: SessionState) -> Result<(), RejectReason> {
        match (self.session_state(id), wanted) {
            (SessionState::Disconnected, _) => Err(RejectReason::UnknownSession),
            (state, wanted) if state == wanted => Ok(()),
            (_, SessionState::Eliminated) => Err(RejectReason::NotEliminated),
            _ => Err(RejectReason::NotActive),
        }
    }

    fn handle_move(&mut self, id: &SessionId, tile: Tile) -> Result<Vec<Outbound>, RejectReason> {
        self.require(id, SessionState::Active)?;
        if !self.store.bounds().contains(tile) {
            return Err(RejectReason::OutOfBounds(tile));
        }

        self.store.set_position(id, tile);
        Ok(vec![self.snapshot()])
    }

    fn handle_throw(
        &mut self,
        id: &SessionId,
        target: Tile,
        now: u64,
    ) -> Result<Vec<Outbound>, RejectReason> {
        self.require(id, SessionState::Active)?;
        let thrower = self.store.session(id).ok_or(RejectReason::UnknownSession)?;
        if thrower.inventory == 0 {
            return Err(RejectReason::NoInventory);
        }
        if !self.store.bounds().contains(target) {
            return Err(RejectReason::OutOfBounds(target));
        }

        self.store.decrement_inventory(id);
        let deadline = self.scheduler.schedule(id.clone(), target, now);
        debug!("{} threw at {}, lands at {}ms", id, target, deadline);

        Ok(vec![
            Outbound::Broadcast(Packet::ProjectileThrown {
                from_x: thrower.tile.x,
                from_y: thrower.tile.y,
                to_x: target.x,
                to_y: target.y,
                thrower_id: id.clone(),
            }),
            self.snapshot(),
        ])
    }

    fn handle_pickup(&mut self, id: &SessionId) -> Result<Vec<Outbound>, RejectReason> {
        self.require(id, SessionState::Active)?;
        let count = self
            .store
            .increment_inventory(id)
            .map_err(|_| RejectReason::InventoryFull)?;

        debug!("{} picked up a projectile ({}/{})", id, count, MAX_INVENTORY);
        Ok(vec![self.snapshot()])
    }

    fn handle_revive(&mut self, id: &SessionId) -> Result<Vec<Outbound>, RejectReason> {
        self.require(id, SessionState::Eliminated)?;
        self.store.revive(id);
        Ok(vec![self.snapshot()])
    }

    /// Resolves every throw whose flight has ended against the state as it is now
    pub fn poll_due(&mut self, now: u64) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        for hit in self.scheduler.drain_due(now) {
            outbound.extend(self.resolve(hit));
        }
        outbound
    }

    fn resolve(&mut self, hit: PendingHit) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        match self.store.resolve_hit(&hit.attacker, hit.target) {
            Some(target) => {
                info!("Player {} eliminated by {}", target, hit.attacker);
                outbound.push(Outbound::Unicast {
                    to: target.clone(),
                    packet: Packet::HitNotification {
                        hit_by: hit.attacker,
                        target,
                    },
                });
            }
            None => debug!("Projectile from {} landed on {} without a hit", hit.attacker, hit.target),
        }

        outbound.push(self.snapshot());
        outbound
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    pub fn pending_hits(&self) -> Vec<PendingHit> {
        self.scheduler.pending()
    }

    fn snapshot(&self) -> Outbound {
        Outbound::Broadcast(Packet::StateSnapshot {
            players: self.store.snapshot(),
        })
    }
}
