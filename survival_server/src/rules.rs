//! Static game tables and tuning constants.

use survival_shared::model::{BuildingKind, Inventory, ItemKind, ResourceKind, SourceKind};

/// Max distance between a player and a resource it gathers (inclusive).
pub const GATHER_RANGE: f32 = 100.0;
/// Added to attacker range when the target is a building (inclusive).
pub const BUILDING_REACH_BONUS: f32 = 50.0;
/// Added to attacker range when the target is a player (inclusive).
pub const PLAYER_REACH_BONUS: f32 = 30.0;

pub const RESPAWN_DELAY_MS: u32 = 5000;
/// Ticks between passive income payouts.
pub const INCOME_PERIOD_TICKS: u32 = 60;

pub const PROJECTILE_HIT_RADIUS: f32 = 30.0;
pub const PROJECTILE_DAMAGE: i32 = 15;
/// Units per tick.
pub const PROJECTILE_SPEED: f32 = 15.0;
/// Ticks.
pub const PROJECTILE_LIFE: i32 = 60;

/// Resource population seeded at world creation.
pub const INITIAL_POPULATION: [(SourceKind, usize); 4] = [
    (SourceKind::Tree, 200),
    (SourceKind::Rock, 100),
    (SourceKind::Bush, 80),
    (SourceKind::GoldOre, 20),
];

/// What spawning a given source produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceProfile {
    pub kind: ResourceKind,
    pub amount: u32,
    pub scale: f32,
    pub color: &'static str,
}

pub fn resource_profile(source: SourceKind) -> ResourceProfile {
    match source {
        SourceKind::Tree => ResourceProfile {
            kind: ResourceKind::Wood,
            amount: 10,
            scale: 1.0,
            color: "#2d5a27",
        },
        SourceKind::Rock => ResourceProfile {
            kind: ResourceKind::Stone,
            amount: 5,
            scale: 0.8,
            color: "#7a7a7a",
        },
        SourceKind::Bush => ResourceProfile {
            kind: ResourceKind::Food,
            amount: 5,
            scale: 0.6,
            color: "#d42c2c",
        },
        SourceKind::GoldOre => ResourceProfile {
            kind: ResourceKind::Gold,
            amount: 3,
            scale: 0.7,
            color: "#ffd700",
        },
    }
}

pub fn building_cost(kind: &BuildingKind) -> Inventory {
    match kind {
        BuildingKind::Wall => Inventory::new(10, 0, 0, 0),
        BuildingKind::Spike => Inventory::new(15, 5, 0, 0),
        BuildingKind::Windmill => Inventory::new(50, 20, 0, 0),
        BuildingKind::Turret => Inventory::new(100, 50, 0, 10),
        BuildingKind::Other(_) => Inventory::new(10, 0, 0, 0),
    }
}

pub fn building_health(kind: &BuildingKind) -> i32 {
    match kind {
        BuildingKind::Wall => 300,
        BuildingKind::Spike => 150,
        BuildingKind::Windmill => 200,
        BuildingKind::Turret => 400,
        BuildingKind::Other(_) => 200,
    }
}

pub fn recipe(item: ItemKind) -> Inventory {
    match item {
        ItemKind::Pickaxe => Inventory::new(10, 5, 0, 0),
        ItemKind::Sword => Inventory::new(15, 10, 0, 0),
        ItemKind::Bow => Inventory::new(20, 5, 0, 0),
        ItemKind::Arrow => Inventory::new(2, 1, 0, 0),
    }
}
