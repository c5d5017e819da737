use crate::game::ClientGameState;
use crate::input::{Command, InputManager};
use crate::iso::IsoProjection;
use crate::movement::PathStepper;
use crate::pathfinding::PathPlanner;
use crate::rendering::Renderer;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{GridBounds, Packet, Tile, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// UDP connection to the server, driven by a background tokio runtime.
///
/// The frame loop never blocks on the socket: outgoing packets are queued on a
/// channel and incoming ones are drained with [`NetworkLink::poll`].
pub struct NetworkLink {
    runtime: Runtime,
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    outbound_tx: mpsc::UnboundedSender<Packet>,
    inbound_rx: mpsc::UnboundedReceiver<Packet>,
}

impl NetworkLink {
    /// Binds a local socket, starts the network tasks and sends `Connect`
    pub fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let socket = Arc::new(runtime.block_on(UdpSocket::bind("0.0.0.0:0"))?);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        runtime.spawn(receive_loop(socket.clone(), server_addr, inbound_tx));
        runtime.spawn(send_loop(socket.clone(), server_addr, outbound_rx));
        runtime.spawn(heartbeat_loop(outbound_tx.clone()));

        info!("Connecting to {}", server_addr);
        let link = Self {
            runtime,
            socket,
            server_addr,
            outbound_tx,
            inbound_rx,
        };
        link.send(Packet::Connect {
            client_version: PROTOCOL_VERSION,
        });
        Ok(link)
    }

    pub fn send(&self, packet: Packet) {
        if let Err(e) = self.outbound_tx.send(packet) {
            error!("Network sender closed: {}", e);
        }
    }

    /// Everything received since the last call, in arrival order
    pub fn poll(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.inbound_rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    /// Sends `Disconnect` directly so it leaves before the runtime shuts down
    pub fn disconnect(&self) {
        let result = self.runtime.block_on(async {
            let data = serialize(&Packet::Disconnect)?;
            self.socket.send_to(&data, self.server_addr).await?;
            Ok::<(), Box<dyn std::error::Error>>(())
        });
        if let Err(e) = result {
            warn!("Failed to send disconnect: {}", e);
        }
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    inbound_tx: mpsc::UnboundedSender<Packet>,
) {
    let mut buffer = [0u8; MAX_PACKET_SIZE];
    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((len, addr)) => {
                if addr != server_addr {
                    debug!("Ignoring datagram from {}", addr);
                    continue;
                }
                match deserialize::<Packet>(&buffer[..len]) {
                    Ok(packet) if packet.is_client_bound() => {
                        if inbound_tx.send(packet).is_err() {
                            break;
                        }
                    }
                    Ok(packet) => warn!("Server sent a client packet: {:?}", packet),
                    Err(e) => warn!("Failed to deserialize packet: {}", e),
                }
            }
            Err(e) => {
                error!("Error receiving packet: {}", e);
                sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}

async fn send_loop(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
) {
    while let Some(packet) = outbound_rx.recv().await {
        match serialize(&packet) {
            Ok(data) => {
                if let Err(e) = socket.send_to(&data, server_addr).await {
                    error!("Failed to send packet: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize packet: {}", e),
        }
    }
}

async fn heartbeat_loop(outbound_tx: mpsc::UnboundedSender<Packet>) {
    let mut ticker = interval(HEARTBEAT_INTERVAL);
    loop {
        ticker.tick().await;
        if outbound_tx.send(Packet::Heartbeat).is_err() {
            break;
        }
    }
}

/// Frame-driven client tying the network link to local state and rendering
pub struct Client {
    link: NetworkLink,
    state: ClientGameState,
    planner: PathPlanner,
    stepper: PathStepper,
    projection: IsoProjection,
    input: InputManager,
    renderer: Renderer,
    clock: Instant,
}

impl Client {
    pub fn new(
        server_addr: &str,
        width: usize,
        height: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let bounds = GridBounds::default();
        Ok(Client {
            link: NetworkLink::connect(server_addr)?,
            state: ClientGameState::new(),
            planner: PathPlanner::new(bounds),
            stepper: PathStepper::default(),
            projection: IsoProjection::default(),
            input: InputManager::new(),
            renderer: Renderer::new(width, height),
            clock: Instant::now(),
        })
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn stepper(&self) -> &PathStepper {
        &self.stepper
    }

    fn now_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let now = self.now_ms();
            let commands = self.input.update(&self.projection, self.planner.bounds());
            if !self.update(commands, now) {
                break;
            }

            self.renderer.render(
                &self.state,
                &self.projection,
                self.planner.bounds(),
                self.stepper.destination(),
                now,
            );
            macroquad::window::next_frame().await;
        }

        if self.state.session_id().is_some() {
            self.link.disconnect();
        }
        Ok(())
    }

    /// One frame of work. Returns false when the player asked to quit.
    pub fn update(&mut self, commands: Vec<Command>, now: u64) -> bool {
        for packet in self.link.poll() {
            self.handle_packet(packet, now);
        }

        for command in commands {
            if !self.handle_command(command, now) {
                return false;
            }
        }

        self.advance_movement(now);
        true
    }

    fn handle_packet(&mut self, packet: Packet, now: u64) {
        match packet {
            Packet::Connected { session_id } => {
                info!("Connected! Session ID: {}", session_id);
                self.renderer
                    .notify(format!("Connected as {}", session_id), now);
                self.stepper.cancel();
                self.state.set_session(session_id);
            }

            Packet::InitialState { players } | Packet::StateSnapshot { players } => {
                let outcome = self.state.apply_server_state(&players, &mut self.renderer);
                if outcome.eliminated {
                    self.stepper.cancel();
                }
                if outcome.revived {
                    self.renderer.notify("Revived", now);
                }
                if let Some(notice) = outcome.inventory_notice() {
                    self.renderer.notify(notice, now);
                }
            }

            Packet::PlayerJoined { id, player } => {
                info!("{} joined at {}", id, player.tile());
            }

            Packet::PlayerLeft { id } => {
                info!("{} left", id);
            }

            Packet::ProjectileThrown {
                from_x,
                from_y,
                to_x,
                to_y,
                thrower_id,
            } => {
                debug!("{} threw at ({}, {})", thrower_id, to_x, to_y);
                self.renderer
                    .add_projectile(Tile::new(from_x, from_y), Tile::new(to_x, to_y), now);
            }

            Packet::HitNotification { hit_by, target } => {
                if self.state.apply_hit(&hit_by, &target) {
                    self.stepper.cancel();
                    self.renderer
                        .notify(format!("Hit by {}! Press R to revive", hit_by), now);
                } else {
                    debug!("{} hit {}", hit_by, target);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.stepper.cancel();
                self.renderer
                    .notify(format!("Disconnected: {}", reason), now);
            }

            other => warn!("Unexpected packet: {:?}", other),
        }
    }

    fn handle_command(&mut self, command: Command, now: u64) -> bool {
        let result = match command {
            Command::Quit => return false,
            // Clicks off the grid are ignored unless the player is dead
            Command::Walk(None) => self.state.check_move(),
            Command::Walk(Some(target)) => self
                .state
                .plan_move(target, &self.planner)
                .map(|plan| {
                    if let Some(path) = plan {
                        self.stepper.start(path, now);
                    }
                }),
            Command::Throw(target) => self
                .state
                .check_throw(target, self.stepper.is_moving())
                .map(|tile| {
                    self.link.send(Packet::ThrowProjectile {
                        to_x: tile.x,
                        to_y: tile.y,
                    })
                }),
            Command::Pickup => self
                .state
                .check_pickup()
                .map(|()| self.link.send(Packet::Pickup)),
            Command::Revive => self
                .state
                .check_revive()
                .map(|()| self.link.send(Packet::Revive)),
        };

        if let Err(rejection) = result {
            debug!("Rejected {:?}: {}", command, rejection);
            self.renderer.notify(rejection.to_string(), now);
        }
        true
    }

    fn advance_movement(&mut self, now: u64) {
        if !self.state.local.alive {
            self.stepper.cancel();
            return;
        }

        if let Some(tile) = self.stepper.advance(now) {
            self.state.step_to(tile);
            self.link.send(Packet::Move {
                x: tile.x,
                y: tile.y,
            });
        }
    }
}
