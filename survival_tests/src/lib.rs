//! Shared fixtures for the integration tests.

use survival_server::{world::World, Game};
use survival_shared::{entity::EntityId, math::Bounds, math::Vec2};

/// Fixed step used by the fixtures (20 Hz).
pub const STEP_MS: u32 = 50;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A 3000x3000 game with no resources and a fixed seed.
pub fn empty_game(seed: u64) -> Game {
    let world = World::empty(Bounds::new(3000.0, 3000.0), Some(seed));
    Game::with_world(world, STEP_MS)
}

/// Joins a player and pins it to `at`.
pub fn join_at(game: &mut Game, name: &str, at: Vec2) -> EntityId {
    let id = game.allocate_id();
    let _ = game.add_player(id, name);
    if let Some(player) = game.player_mut(id) {
        player.position = at;
    }
    id
}

/// Runs `n` ticks, discarding the reports.
pub fn run_ticks(game: &mut Game, n: usize) {
    for _ in 0..n {
        let _ = game.tick();
    }
}
