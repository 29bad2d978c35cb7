//! `survival_client`
//!
//! Client-side systems:
//! - Connection management (one reliable stream)
//! - Command helpers for every inbound server command
//! - A local world mirror maintained from server events
//!
//! Rendering, input capture and prediction live elsewhere.

pub mod client;

pub use client::GameClient;
