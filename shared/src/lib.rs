use serde::{Deserialize, Serialize};
use std::fmt;

pub const GRID_WIDTH: i32 = 32;
pub const GRID_HEIGHT: i32 = 32;
pub const MAX_INVENTORY: u8 = 5;
pub const FLIGHT_LATENCY_MS: u64 = 500;
pub const STEP_INTERVAL_MS: u64 = 200;
pub const PROTOCOL_VERSION: u32 = 1;

/// Receive buffer size on both ends, one packet per datagram
pub const MAX_PACKET_SIZE: usize = 2048;

/// Largest roster whose full snapshot still fits in one datagram, even with
/// the longest session ids the server can hand out
pub const MAX_PLAYERS: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat,
    Move {
        x: i32,
        y: i32,
    },
    ThrowProjectile {
        to_x: i32,
        to_y: i32,
    },
    Pickup,
    Revive,
    Disconnect,

    Connected {
        session_id: SessionId,
    },
    InitialState {
        players: Vec<PlayerRecord>,
    },
    StateSnapshot {
        players: Vec<PlayerRecord>,
    },
    PlayerJoined {
        id: SessionId,
        player: PlayerRecord,
    },
    PlayerLeft {
        id: SessionId,
    },
    ProjectileThrown {
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
        thrower_id: SessionId,
    },
    HitNotification {
        hit_by: SessionId,
        target: SessionId,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// True for packets a client is allowed to send to the server
    pub fn is_client_bound(&self) -> bool {
        !matches!(
            self,
            Packet::Connect { .. }
                | Packet::Heartbeat
                | Packet::Move { .. }
                | Packet::ThrowProjectile { .. }
                | Packet::Pickup
                | Packet::Revive
                | Packet::Disconnect
        )
    }
}

/// Opaque connection identifier, stable for the lifetime of one connection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One grid cell, addressed by integer coordinates.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: Tile) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// 4-connected neighbours in up, right, down, left order. Not bounds checked.
    pub fn neighbours(&self) -> [Tile; 4] {
        [
            Tile::new(self.x, self.y - 1),
            Tile::new(self.x + 1, self.y),
            Tile::new(self.x, self.y + 1),
            Tile::new(self.x - 1, self.y),
        ]
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub width: i32,
    pub height: i32,
}

impl GridBounds {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, tile: Tile) -> bool {
        tile.x >= 0 && tile.x < self.width && tile.y >= 0 && tile.y < self.height
    }
}

impl Default for GridBounds {
    fn default() -> Self {
        Self::new(GRID_WIDTH, GRID_HEIGHT)
    }
}

/// Wire view of one player. Always a copy of the authoritative record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: SessionId,
    pub x: i32,
    pub y: i32,
    pub inventory: u8,
    pub alive: bool,
    pub score: u32,
}

impl PlayerRecord {
    pub fn tile(&self) -> Tile {
        Tile::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, x: i32, y: i32) -> PlayerRecord {
        PlayerRecord {
            id: SessionId::new(id),
            x,
            y,
            inventory: 2,
            alive: true,
            score: 7,
        }
    }

    #[test]
    fn test_grid_bounds_contains() {
        let bounds = GridBounds::default();
        assert!(bounds.contains(Tile::new(0, 0)));
        assert!(bounds.contains(Tile::new(31, 31)));
        assert!(!bounds.contains(Tile::new(32, 0)));
        assert!(!bounds.contains(Tile::new(0, 32)));
        assert!(!bounds.contains(Tile::new(-1, 5)));
        assert!(!bounds.contains(Tile::new(5, -1)));
    }

    #[test]
    fn test_tile_manhattan() {
        let a = Tile::new(1, 2);
        assert_eq!(a.manhattan(Tile::new(4, 6)), 7);
        assert_eq!(a.manhattan(a), 0);
        assert_eq!(Tile::new(-2, 0).manhattan(Tile::new(2, 0)), 4);
    }

    #[test]
    fn test_tile_neighbours_are_four_connected() {
        let tile = Tile::new(3, 3);
        for n in tile.neighbours() {
            assert_eq!(tile.manhattan(n), 1);
        }
    }

    #[test]
    fn test_record_tile() {
        assert_eq!(record("a", 4, 9).tile(), Tile::new(4, 9));
    }

    #[test]
    fn test_client_bound_classification() {
        assert!(!Packet::Pickup.is_client_bound());
        assert!(!Packet::Move { x: 1, y: 1 }.is_client_bound());
        assert!(Packet::PlayerLeft {
            id: SessionId::new("a")
        }
        .is_client_bound());
        assert!(Packet::Disconnected {
            reason: "Server full".to_string()
        }
        .is_client_bound());
    }

    #[test]
    fn test_packet_serialization_snapshot() {
        let packet = Packet::StateSnapshot {
            players: vec![record("s1", 1, 2), record("s2", 30, 31)],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::StateSnapshot { players } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].id.as_str(), "s1");
                assert_eq!(players[1].tile(), Tile::new(30, 31));
                assert_eq!(players[1].score, 7);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_throw() {
        let packet = Packet::ThrowProjectile { to_x: -3, to_y: 12 };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new("session-4");
        assert_eq!(id.to_string(), "session-4");
        assert_eq!(id.as_str(), "session-4");
    }

    #[test]
    fn test_snapshot_at_player_limit_fits_datagram() {
        // Widest id the roster can produce: "session-" followed by u64::MAX
        let players: Vec<PlayerRecord> = (0..MAX_PLAYERS)
            .map(|i| PlayerRecord {
                id: SessionId::new(format!("session-{}", u64::MAX - i as u64)),
                x: i32::MAX,
                y: i32::MIN,
                inventory: MAX_INVENTORY,
                alive: true,
                score: u32::MAX,
            })
            .collect();

        let data = bincode::serialize(&Packet::StateSnapshot { players }).unwrap();
        assert!(
            data.len() <= MAX_PACKET_SIZE,
            "snapshot is {} bytes",
            data.len()
        );
    }

    #[test]
    fn test_snapshot_of_64_players_overflows_datagram() {
        let players: Vec<PlayerRecord> = (1..=64)
            .map(|i| PlayerRecord {
                id: SessionId::new(format!("session-{}", i)),
                x: 0,
                y: 0,
                inventory: 0,
                alive: true,
                score: 0,
            })
            .collect();

        let data = bincode::serialize(&Packet::StateSnapshot { players }).unwrap();
        assert!(data.len() > MAX_PACKET_SIZE);
    }
}
