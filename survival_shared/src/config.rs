//! Configuration system.
//!
//! Loads configuration from JSON strings/files (file IO left to app).
//! Every field has a default, so a partial JSON object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::math::Bounds;

/// Highest usable tick rate: one tick per millisecond.
pub const MAX_TICK_HZ: u32 = 1000;

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Fixed simulation tick rate. Snapshots go out once per tick.
    /// Values outside `1..=MAX_TICK_HZ` are clamped.
    pub tick_hz: u32,
    pub world_width: f32,
    pub world_height: f32,
    /// Period of the background resource replenishment.
    pub replenish_interval_ms: u64,
    /// RNG seed for world generation and spawns. Random when unset.
    pub seed: Option<u64>,
    /// Player name (client only).
    pub player_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: 20,
            world_width: 3000.0,
            world_height: 3000.0,
            replenish_interval_ms: 2000,
            seed: None,
            player_name: "Player".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.world_width, self.world_height)
    }

    /// `tick_hz` clamped to `1..=MAX_TICK_HZ`, so a tick is never shorter
    /// than one millisecond.
    pub fn effective_tick_hz(&self) -> u32 {
        self.tick_hz.clamp(1, MAX_TICK_HZ)
    }

    /// Simulated milliseconds advanced by one tick; always at least 1.
    pub fn tick_step_ms(&self) -> u32 {
        1000 / self.effective_tick_hz()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_step_ms()))
    }

    pub fn replenish_interval(&self) -> Duration {
        Duration::from_millis(self.replenish_interval_ms.max(1))
    }
}
