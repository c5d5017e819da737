//! # Arena Client Library
//!
//! Client side of the isometric arena: the player clicks a tile to walk there,
//! right-clicks to throw and watches everyone else through server snapshots.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Reconciles authoritative snapshots with local state:
//! - Local player fields, with position owned by the stepper once placed
//! - Proxy lifecycle for remote players through the `ProxySink` trait
//! - Local validation of actions before they are sent
//!
//! ### Pathfinding and Movement (`pathfinding`, `movement`)
//! A* over the grid and a stepper that walks the result one tile per interval.
//!
//! ### Projection (`iso`)
//! Tile to screen conversion and its inverse for pointer picking.
//!
//! ### Network Module (`network`)
//! The UDP link, run on a background tokio runtime, and the frame-driven
//! `Client` that ties everything together.
//!
//! ### Input and Rendering (`input`, `rendering`)
//! macroquad input sampling and drawing. The renderer owns the remote proxies.

pub mod game;
pub mod input;
pub mod iso;
pub mod movement;
pub mod network;
pub mod pathfinding;
pub mod rendering;
