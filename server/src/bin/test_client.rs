//! Scripted bot: connects, stocks up, wanders and throws at whoever it sees.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use shared::{
    Packet, PlayerRecord, SessionId, Tile, MAX_INVENTORY, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Number of throws before disconnecting
    #[arg(short = 't', long, default_value = "10")]
    throws: u32,
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    server: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, server).await?;
    Ok(())
}

/// Reads packets until a snapshot arrives or the socket goes quiet
async fn latest_players(
    socket: &UdpSocket,
    buf: &mut [u8],
    wait: Duration,
) -> Option<Vec<PlayerRecord>> {
    let mut latest = None;
    while let Ok(Ok((len, _))) = timeout(wait, socket.recv_from(buf)).await {
        match deserialize::<Packet>(&buf[..len]) {
            Ok(Packet::StateSnapshot { players }) | Ok(Packet::InitialState { players }) => {
                latest = Some(players)
            }
            Ok(Packet::HitNotification { hit_by, .. }) => info!("Hit by {}", hit_by),
            Ok(_) => {}
            Err(e) => warn!("Failed to deserialize packet: {}", e),
        }
    }
    latest
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let server: SocketAddr = args.server.parse()?;
    let mut buf = [0u8; MAX_PACKET_SIZE];

    send(&socket, &Packet::Connect { client_version: PROTOCOL_VERSION }, server).await?;

    let session_id: SessionId = loop {
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
        match deserialize::<Packet>(&buf[..len])? {
            Packet::Connected { session_id } => break session_id,
            Packet::Disconnected { reason } => return Err(reason.into()),
            _ => {}
        }
    };
    info!("Connected as {}", session_id);

    let mut players = Vec::new();
    for _ in 0..args.throws {
        for _ in 0..MAX_INVENTORY {
            send(&socket, &Packet::Pickup, server).await?;
        }
        send(&socket, &Packet::Heartbeat, server).await?;

        if let Some(latest) = latest_players(&socket, &mut buf, Duration::from_millis(100)).await {
            players = latest;
        }

        let me = players.iter().find(|p| p.id == session_id).cloned();
        if let Some(me) = &me {
            if !me.alive {
                send(&socket, &Packet::Revive, server).await?;
                continue;
            }
        }

        let target = players
            .iter()
            .filter(|p| p.id != session_id && p.alive)
            .min_by_key(|p| me.as_ref().map_or(0, |m| m.tile().manhattan(p.tile())))
            .map(PlayerRecord::tile);

        match target {
            Some(tile) => {
                info!("Throwing at {}", tile);
                send(&socket, &Packet::ThrowProjectile { to_x: tile.x, to_y: tile.y }, server)
                    .await?;
            }
            None => {
                let step = me.map_or(Tile::new(0, 0), |m| {
                    Tile::new((m.x + 1) % shared::GRID_WIDTH, m.y)
                });
                send(&socket, &Packet::Move { x: step.x, y: step.y }, server).await?;
            }
        }

        sleep(Duration::from_millis(600)).await;
    }

    send(&socket, &Packet::Disconnect, server).await?;
    info!("Test client finished");
    Ok(())
}
