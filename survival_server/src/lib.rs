//! `survival_server`
//!
//! Server-side systems:
//! - World: resource population and placed buildings
//! - Player: avatar stats, inventory and alive/dead state machine
//! - Game: command handlers and the fixed-rate tick
//! - Server: connection fan-in/fan-out around a single mutator loop
//!
//! Networking model:
//! - TCP, one ordered stream per client for commands and events
//! - `gameState` snapshot broadcast every tick

pub mod game;
pub mod player;
pub mod rules;
pub mod server;
pub mod world;

pub use game::{Game, Rejected};
pub use server::GameServer;
