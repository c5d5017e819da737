//! Server network layer handling UDP communications and the event loop

use crate::client_manager::ClientManager;
use crate::game::GameStateStore;
use crate::gateway::{Intent, Outbound, SessionGateway};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    GridBounds, Packet, SessionId, FLIGHT_LATENCY_MS, MAX_PACKET_SIZE, MAX_PLAYERS,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep_until, Instant};

/// How long the loop sleeps when no projectile is in flight
const IDLE_WAKE: Duration = Duration::from_secs(1);

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: SessionId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<SessionId>,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    pub grid: GridBounds,
    pub flight_ms: u64,
    pub client_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max clients must be between 1 and {max}, got {requested}")]
    MaxClients { requested: usize, max: usize },
    #[error("grid dimensions must be positive, got {0}x{1}")]
    EmptyGrid(i32, i32),
}

impl ServerConfig {
    /// Rejects rosters whose snapshots would not fit in one datagram
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 || self.max_clients > MAX_PLAYERS {
            return Err(ConfigError::MaxClients {
                requested: self.max_clients,
                max: MAX_PLAYERS,
            });
        }
        if self.grid.width <= 0 || self.grid.height <= 0 {
            return Err(ConfigError::EmptyGrid(self.grid.width, self.grid.height));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_clients: MAX_PLAYERS,
            grid: GridBounds::default(),
            flight_ms: FLIGHT_LATENCY_MS,
            client_timeout: Duration::from_secs(5),
        }
    }
}

/// Main server coordinating networking and the session gateway
///
/// All gateway calls happen on the task running `run`, one message at a time,
/// so the store never sees interleaved mutations.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    gateway: SessionGateway,
    started: Instant,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let store = GameStateStore::new(config.grid);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            gateway: SessionGateway::new(store, config.flight_ms),
            started: Instant::now(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Milliseconds since the server started, the gateway's clock
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if exclude.as_ref() == Some(&client_id) {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<SessionId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Hands gateway output to the sender task, preserving order
    async fn dispatch(&self, outbound: Vec<Outbound>) {
        for delivery in outbound {
            match delivery {
                Outbound::Broadcast(packet) => self.broadcast_packet(packet, None),
                Outbound::Unicast { to, packet } => {
                    let addr = {
                        let clients = self.clients.read().await;
                        clients.addr_of(&to)
                    };
                    match addr {
                        Some(addr) => self.send_packet(packet, addr),
                        None => debug!("Skipping unicast to departed session {}", to),
                    }
                }
            }
        }
    }

    async fn drop_session(&mut self, client_id: &SessionId) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(client_id);
        }
        let outbound = self.gateway.disconnect(client_id);
        self.dispatch(outbound).await;
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.drop_session(&existing_id).await;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        match client_id {
            Some(client_id) => {
                let outbound = self.gateway.connect(client_id);
                self.dispatch(outbound).await;
            }
            None => self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            ),
        }
    }

    /// Routes one inbound packet to the gateway
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.touch(addr)
        };

        let Some(client_id) = client_id else {
            warn!("Packet from unknown client at {}", addr);
            return;
        };

        match packet {
            Packet::Heartbeat => {}
            Packet::Disconnect => self.drop_session(&client_id).await,
            other => match Intent::from_packet(&other) {
                Some(intent) => {
                    let now = self.now_ms();
                    let outbound = self.gateway.handle_intent(&client_id, intent, now);
                    self.dispatch(outbound).await;
                }
                None => warn!("Unexpected packet type from client at {}", addr),
            },
        }
    }

    /// Fires every projectile resolution that has come due
    async fn resolve_due_hits(&mut self) {
        let now = self.now_ms();
        let outbound = self.gateway.poll_due(now);
        self.dispatch(outbound).await;
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        info!("Server started successfully");

        loop {
            let wake = match self.gateway.next_deadline() {
                Some(deadline) => self.started + Duration::from_millis(deadline),
                None => Instant::now() + IDLE_WAKE,
            };

            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            let outbound = self.gateway.disconnect(&client_id);
                            self.dispatch(outbound).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle projectile landings
                _ = sleep_until(wake) => {
                    self.resolve_due_hits().await;
                },
            }
        }

        Ok(())
    }
}
