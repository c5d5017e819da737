//! Integration tests across the shared protocol, server gateway and client
//!
//! These tests validate cross-component interactions and real network behavior.

use bincode::{deserialize, serialize};
use client::game::ClientGameState;
use client::rendering::Renderer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::GameStateStore;
use server::gateway::{Intent, Outbound, SessionGateway, SessionState};
use shared::{
    GridBounds, Packet, PlayerRecord, SessionId, Tile, FLIGHT_LATENCY_MS, MAX_PACKET_SIZE,
    MAX_PLAYERS,
};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;
use tokio::time::sleep;

fn id(name: &str) -> SessionId {
    SessionId::new(name)
}

fn gateway() -> SessionGateway {
    let store = GameStateStore::with_rng(GridBounds::default(), StdRng::seed_from_u64(11));
    SessionGateway::new(store, FLIGHT_LATENCY_MS)
}

fn player(gateway: &SessionGateway, who: &SessionId) -> PlayerRecord {
    gateway
        .store()
        .snapshot()
        .into_iter()
        .find(|p| &p.id == who)
        .expect("session should exist")
}

fn hit_notifications(outbound: &[Outbound]) -> Vec<(SessionId, Packet)> {
    outbound
        .iter()
        .filter_map(|o| match o {
            Outbound::Unicast { to, packet } if matches!(packet, Packet::HitNotification { .. }) => {
                Some((to.clone(), packet.clone()))
            }
            _ => None,
        })
        .collect()
}

fn last_snapshot(outbound: &[Outbound]) -> Option<Vec<PlayerRecord>> {
    outbound.iter().rev().find_map(|o| match o {
        Outbound::Broadcast(Packet::StateSnapshot { players }) => Some(players.clone()),
        _ => None,
    })
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests real UDP socket communication with a bincode packet
    #[tokio::test]
    async fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; MAX_PACKET_SIZE];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        sleep(Duration::from_millis(10)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();

        let test_packet = Packet::ProjectileThrown {
            from_x: 1,
            from_y: 2,
            to_x: 3,
            to_y: 4,
            thrower_id: id("session-1"),
        };
        client_socket
            .send_to(&serialize(&test_packet).unwrap(), server_addr)
            .unwrap();

        let mut buf = [0; MAX_PACKET_SIZE];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();

        assert_eq!(received_packet, test_packet);
    }

    /// A snapshot of the largest allowed roster must fit the receive buffer
    #[test]
    fn full_snapshot_fits_datagram() {
        let players: Vec<PlayerRecord> = (0..MAX_PLAYERS as i32)
            .map(|i| PlayerRecord {
                id: id(&format!("session-{}", 1000 + i)),
                x: i,
                y: 31 - i,
                inventory: 5,
                alive: true,
                score: u32::MAX,
            })
            .collect();

        let data = serialize(&Packet::StateSnapshot { players }).unwrap();
        assert!(data.len() <= MAX_PACKET_SIZE, "snapshot is {} bytes", data.len());
    }
}

/// HIT RESOLUTION SCENARIOS
mod gateway_scenarios {
    use super::*;

    /// A at (5,5) throws at B standing on (5,5)
    fn setup_shared_tile() -> (SessionGateway, SessionId, SessionId) {
        let mut gateway = gateway();
        let (a, b) = (id("a"), id("b"));
        gateway.connect(a.clone());
        gateway.connect(b.clone());
        gateway.handle_intent(&a, Intent::Move(Tile::new(5, 5)), 0);
        gateway.handle_intent(&b, Intent::Move(Tile::new(5, 5)), 0);
        gateway.handle_intent(&a, Intent::Pickup, 0);
        (gateway, a, b)
    }

    #[test]
    fn stationary_target_is_eliminated() {
        let (mut gateway, a, b) = setup_shared_tile();

        let thrown = gateway.handle_intent(&a, Intent::Throw(Tile::new(5, 5)), 1000);
        assert!(!thrown.is_empty());
        assert_eq!(gateway.pending_hits().len(), 1);

        assert!(gateway.poll_due(1000 + FLIGHT_LATENCY_MS - 1).is_empty());
        let resolved = gateway.poll_due(1000 + FLIGHT_LATENCY_MS);

        let b_after = player(&gateway, &b);
        assert!(!b_after.alive);
        assert_eq!(b_after.inventory, 0);
        assert_eq!(player(&gateway, &a).score, 1);
        assert_eq!(
            hit_notifications(&resolved),
            vec![(
                b.clone(),
                Packet::HitNotification {
                    hit_by: a.clone(),
                    target: b.clone()
                }
            )]
        );
        assert_eq!(gateway.session_state(&b), SessionState::Eliminated);
    }

    #[test]
    fn target_that_moves_away_survives() {
        let (mut gateway, a, b) = setup_shared_tile();

        gateway.handle_intent(&a, Intent::Throw(Tile::new(5, 5)), 1000);
        gateway.handle_intent(&b, Intent::Move(Tile::new(6, 6)), 1200);
        let resolved = gateway.poll_due(1000 + FLIGHT_LATENCY_MS);

        assert!(player(&gateway, &b).alive);
        assert_eq!(player(&gateway, &a).score, 0);
        assert!(hit_notifications(&resolved).is_empty());
        // A snapshot still follows the resolution
        assert!(last_snapshot(&resolved).is_some());
    }

    #[test]
    fn eliminated_session_cannot_act() {
        let (mut gateway, a, b) = setup_shared_tile();
        gateway.handle_intent(&b, Intent::Pickup, 0);
        gateway.handle_intent(&a, Intent::Throw(Tile::new(5, 5)), 0);
        gateway.poll_due(FLIGHT_LATENCY_MS);

        let before = gateway.store().snapshot();
        assert!(gateway
            .handle_intent(&b, Intent::Move(Tile::new(1, 1)), 600)
            .is_empty());
        assert!(gateway
            .handle_intent(&b, Intent::Throw(Tile::new(5, 5)), 600)
            .is_empty());
        assert_eq!(gateway.store().snapshot(), before);
        assert!(gateway.pending_hits().is_empty());
    }

    #[test]
    fn shared_tile_hits_earliest_joined_only() {
        let mut gateway = gateway();
        let (first, second, thrower) = (id("first"), id("second"), id("thrower"));
        gateway.connect(first.clone());
        gateway.connect(second.clone());
        gateway.connect(thrower.clone());

        gateway.handle_intent(&first, Intent::Move(Tile::new(3, 3)), 0);
        gateway.handle_intent(&second, Intent::Move(Tile::new(3, 3)), 0);
        gateway.handle_intent(&thrower, Intent::Move(Tile::new(0, 0)), 0);
        gateway.handle_intent(&thrower, Intent::Pickup, 0);
        gateway.handle_intent(&thrower, Intent::Throw(Tile::new(3, 3)), 0);

        let resolved = gateway.poll_due(FLIGHT_LATENCY_MS);

        assert!(!player(&gateway, &first).alive);
        assert!(player(&gateway, &second).alive);
        assert_eq!(hit_notifications(&resolved).len(), 1);
        assert_eq!(player(&gateway, &thrower).score, 1);
    }

    #[test]
    fn revived_player_plays_again() {
        let (mut gateway, a, b) = setup_shared_tile();
        gateway.handle_intent(&a, Intent::Throw(Tile::new(5, 5)), 0);
        gateway.poll_due(FLIGHT_LATENCY_MS);

        assert!(!gateway.handle_intent(&b, Intent::Revive, 600).is_empty());
        assert_eq!(gateway.session_state(&b), SessionState::Active);
        assert!(!gateway
            .handle_intent(&b, Intent::Move(Tile::new(6, 5)), 700)
            .is_empty());
        assert_eq!(player(&gateway, &a).score, 1);
    }
}

/// CLIENT RECONCILIATION AGAINST REAL SERVER OUTPUT
mod reconciliation_tests {
    use super::*;

    #[test]
    fn departed_remote_torn_down_once() {
        let mut state = ClientGameState::new();
        let mut renderer = Renderer::new(800, 600);
        state.set_session(id("me"));

        let record = |name: &str| PlayerRecord {
            id: id(name),
            x: 0,
            y: 0,
            inventory: 0,
            alive: true,
            score: 0,
        };

        state.apply_server_state(&[record("me"), record("x"), record("y")], &mut renderer);
        assert_eq!(renderer.proxy_count(), 2);

        state.apply_server_state(&[record("me"), record("y")], &mut renderer);
        state.apply_server_state(&[record("me"), record("y")], &mut renderer);

        assert_eq!(renderer.proxy_count(), 1);
        assert!(renderer.proxy(&id("x")).is_none());
        assert!(renderer.proxy(&id("y")).is_some());
    }

    #[test]
    fn gateway_snapshots_drive_client_proxies() {
        let mut gateway = gateway();
        let mut state = ClientGameState::new();
        let mut renderer = Renderer::new(800, 600);
        let (me, other) = (id("me"), id("other"));

        let handshake = gateway.connect(me.clone());
        for outbound in &handshake {
            if let Outbound::Unicast {
                packet: Packet::Connected { session_id },
                ..
            } = outbound
            {
                state.set_session(session_id.clone());
            }
        }
        let spawn = player(&gateway, &me).tile();
        state.apply_server_state(&last_snapshot(&handshake).unwrap(), &mut renderer);
        assert_eq!(state.local.tile, spawn);

        let joined = gateway.connect(other.clone());
        state.apply_server_state(&last_snapshot(&joined).unwrap(), &mut renderer);
        assert!(renderer.proxy(&other).is_some());

        let left = gateway.disconnect(&other);
        state.apply_server_state(&last_snapshot(&left).unwrap(), &mut renderer);
        assert!(renderer.proxy(&other).is_none());
        assert!(state.known_remote_ids().is_empty());
    }
}

/// PROJECTILE VISUALS FROM SERVER EVENTS
mod projectile_visual_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use client::iso::IsoProjection;
    use client::rendering::ProjectileVisual;

    #[test]
    fn flight_starts_at_thrower_and_ends_with_resolution() {
        let mut gateway = gateway();
        let thrower = id("thrower");
        gateway.connect(thrower.clone());
        gateway.handle_intent(&thrower, Intent::Move(Tile::new(2, 7)), 0);
        gateway.handle_intent(&thrower, Intent::Pickup, 0);

        let outbound = gateway.handle_intent(&thrower, Intent::Throw(Tile::new(9, 1)), 100);
        let visual = outbound
            .iter()
            .find_map(|o| match o {
                Outbound::Broadcast(Packet::ProjectileThrown {
                    from_x,
                    from_y,
                    to_x,
                    to_y,
                    ..
                }) => Some(ProjectileVisual {
                    from: Tile::new(*from_x, *from_y),
                    to: Tile::new(*to_x, *to_y),
                    started_at: 100,
                }),
                _ => None,
            })
            .expect("throw should broadcast a projectile event");

        let iso = IsoProjection::default();
        let (x, y) = visual.position(100, &iso).unwrap();
        let (sx, sy) = iso.to_screen(Tile::new(2, 7));
        assert_approx_eq!(x, sx);
        assert_approx_eq!(y, sy);

        let deadline = gateway.next_deadline().unwrap();
        assert_eq!(deadline, 100 + FLIGHT_LATENCY_MS);
        assert!(visual.position(deadline - 1, &iso).is_some());
        assert!(visual.position(deadline, &iso).is_none());
    }
}

/// FULL SERVER OVER UDP
mod end_to_end {
    use super::*;
    use server::network::{Server, ServerConfig};
    use tokio::net::UdpSocket as TokioUdpSocket;
    use tokio::time::timeout;

    async fn send(socket: &TokioUdpSocket, packet: &Packet) {
        socket.send(&serialize(packet).unwrap()).await.unwrap();
    }

    /// Reads until `pick` returns Some, giving up after two seconds
    async fn recv_until<T>(socket: &TokioUdpSocket, pick: impl Fn(Packet) -> Option<T>) -> T {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        loop {
            let len = timeout(Duration::from_secs(2), socket.recv(&mut buf))
                .await
                .expect("timed out waiting for packet")
                .unwrap();
            if let Some(value) = pick(deserialize(&buf[..len]).unwrap()) {
                return value;
            }
        }
    }

    async fn join(server_addr: std::net::SocketAddr) -> (TokioUdpSocket, SessionId) {
        let socket = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(server_addr).await.unwrap();
        send(&socket, &Packet::Connect { client_version: shared::PROTOCOL_VERSION }).await;
        let session = recv_until(&socket, |p| match p {
            Packet::Connected { session_id } => Some(session_id),
            _ => None,
        })
        .await;
        (socket, session)
    }

    #[tokio::test]
    async fn throw_eliminates_player_over_udp() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            flight_ms: 50,
            ..ServerConfig::default()
        };
        let mut server = Server::new(config).await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let scenario = async {
            let (alice, alice_id) = join(server_addr).await;
            let (bob, bob_id) = join(server_addr).await;
            assert_ne!(alice_id, bob_id);

            send(&alice, &Packet::Move { x: 5, y: 5 }).await;
            send(&bob, &Packet::Move { x: 5, y: 5 }).await;
            send(&alice, &Packet::Pickup).await;

            let ready = |players: &[PlayerRecord]| {
                let on_tile = players
                    .iter()
                    .filter(|p| p.tile() == Tile::new(5, 5))
                    .count();
                let stocked = players
                    .iter()
                    .any(|p| p.id == alice_id && p.inventory == 1);
                on_tile == 2 && stocked
            };
            recv_until(&alice, |p| match p {
                Packet::StateSnapshot { players } if ready(&players) => Some(()),
                _ => None,
            })
            .await;

            send(&alice, &Packet::ThrowProjectile { to_x: 5, to_y: 5 }).await;

            let (hit_by, target) = recv_until(&bob, |p| match p {
                Packet::HitNotification { hit_by, target } => Some((hit_by, target)),
                _ => None,
            })
            .await;
            assert_eq!(hit_by, alice_id);
            assert_eq!(target, bob_id);

            let scores = recv_until(&alice, |p| match p {
                Packet::StateSnapshot { players } if players.iter().any(|p| !p.alive) => {
                    Some(players)
                }
                _ => None,
            })
            .await;
            let alice_record = scores.iter().find(|p| p.id == alice_id).unwrap();
            assert_eq!(alice_record.score, 1);
        };

        tokio::select! {
            result = server.run() => panic!("server stopped: {:?}", result.err().map(|e| e.to_string())),
            _ = scenario => {}
        }
    }

    #[test]
    fn server_binds_ephemeral_port() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let addr = tokio_test::block_on(async {
            let server = Server::new(config).await.unwrap();
            server.local_addr().unwrap()
        });
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn version_mismatch_is_refused() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let mut server = Server::new(config).await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let scenario = async {
            let socket = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
            socket.connect(server_addr).await.unwrap();
            send(&socket, &Packet::Connect { client_version: 999 }).await;
            recv_until(&socket, |p| match p {
                Packet::Disconnected { reason } => Some(reason),
                _ => None,
            })
            .await
        };

        let reason = tokio::select! {
            result = server.run() => panic!("server stopped: {:?}", result.err().map(|e| e.to_string())),
            reason = scenario => reason,
        };
        assert_eq!(reason, "Protocol version mismatch");
    }
}
