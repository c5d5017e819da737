//! # Game Server Library
//!
//! Authoritative server for the isometric arena. It owns every player record,
//! validates client intents, resolves projectile hits after their flight time,
//! and broadcasts full snapshots so clients can reconcile.
//!
//! ## Architecture
//!
//! ### Single-Threaded Event Loop
//! One task owns the [`gateway::SessionGateway`] and processes each inbound
//! packet to completion before the next. No locking is needed around game
//! state because nothing else can reach it. Socket reads, socket writes and
//! timeout checks run as side tasks that talk to the loop over channels.
//!
//! ### Delayed Hit Resolution
//! A throw does not resolve immediately. The gateway queues a pending hit in
//! [`scheduler::HitScheduler`] and the loop wakes when the earliest deadline
//! passes. Resolution reads the live store, so a target that walked away
//! during the flight is missed.
//!
//! ## Module Organization
//!
//! - `game`: the [`game::GameStateStore`], sole owner of player state
//! - `scheduler`: time-ordered queue of in-flight projectiles
//! - `gateway`: intent validation, session states, outbound packet lists
//! - `client_manager`: address to session bookkeeping and timeouts
//! - `network`: UDP sockets, channels and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod gateway;
pub mod network;
pub mod scheduler;
