//! Game data model.
//!
//! Plain data shared by the simulation and the wire protocol. Behaviour that
//! mutates these values lives in `survival_server`; this module only carries
//! small self-contained helpers (inventory arithmetic, kind parsing).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{entity::EntityId, math::Vec2};

/// What a resource credits to an inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Wood,
    Stone,
    Food,
    Gold,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [Self::Wood, Self::Stone, Self::Food, Self::Gold];
}

/// The world object a resource is harvested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Tree,
    Rock,
    Bush,
    GoldOre,
}

impl SourceKind {
    pub const ALL: [Self; 4] = [Self::Tree, Self::Rock, Self::Bush, Self::GoldOre];

    /// Parses a source name. `gold` is accepted as shorthand for `gold-ore`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tree" => Some(Self::Tree),
            "rock" => Some(Self::Rock),
            "bush" => Some(Self::Bush),
            "gold-ore" | "gold" => Some(Self::GoldOre),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Rock => "rock",
            Self::Bush => "bush",
            Self::GoldOre => "gold-ore",
        }
    }
}

/// A harvestable world object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: EntityId,
    /// Harvested kind credited on gather.
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub position: Vec2,
    pub amount: u32,
    pub scale: f32,
    pub color: String,
    #[serde(rename = "resourceType")]
    pub source: SourceKind,
}

/// Per-player resource counters. Also used as a cost bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub wood: u32,
    pub stone: u32,
    pub food: u32,
    pub gold: u32,
}

/// First resource an inventory could not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub kind: ResourceKind,
    pub required: u32,
    pub available: u32,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: need {}, have {}",
            self.kind, self.required, self.available
        )
    }
}

impl Inventory {
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    pub const fn new(wood: u32, stone: u32, food: u32, gold: u32) -> Self {
        Self {
            wood,
            stone,
            food,
            gold,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Food => self.food,
            ResourceKind::Gold => self.gold,
        }
    }

    fn slot_mut(&mut self, kind: ResourceKind) -> &mut u32 {
        match kind {
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
            ResourceKind::Food => &mut self.food,
            ResourceKind::Gold => &mut self.gold,
        }
    }

    pub fn credit(&mut self, kind: ResourceKind, amount: u32) {
        let slot = self.slot_mut(kind);
        *slot = slot.saturating_add(amount);
    }

    /// Returns the first kind (in `ResourceKind::ALL` order) `cost` exceeds.
    pub fn shortfall(&self, cost: &Inventory) -> Option<Shortfall> {
        ResourceKind::ALL.into_iter().find_map(|kind| {
            let required = cost.get(kind);
            let available = self.get(kind);
            (available < required).then_some(Shortfall {
                kind,
                required,
                available,
            })
        })
    }

    /// Debits `cost` in full, or leaves `self` untouched and reports the gap.
    pub fn try_debit(&mut self, cost: &Inventory) -> Result<(), Shortfall> {
        if let Some(short) = self.shortfall(cost) {
            return Err(short);
        }
        for kind in ResourceKind::ALL {
            *self.slot_mut(kind) -= cost.get(kind);
        }
        Ok(())
    }

    /// Empties the inventory, returning what it held.
    pub fn take_all(&mut self) -> Inventory {
        std::mem::take(self)
    }
}

/// Placeable structure type. Unknown names are kept verbatim and use default
/// cost and health.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildingKind {
    Wall,
    Spike,
    Windmill,
    Turret,
    Other(String),
}

impl From<String> for BuildingKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "wall" => Self::Wall,
            "spike" => Self::Spike,
            "windmill" => Self::Windmill,
            "turret" => Self::Turret,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for BuildingKind {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<BuildingKind> for String {
    fn from(kind: BuildingKind) -> Self {
        match kind {
            BuildingKind::Wall => "wall".into(),
            BuildingKind::Spike => "spike".into(),
            BuildingKind::Windmill => "windmill".into(),
            BuildingKind::Turret => "turret".into(),
            BuildingKind::Other(name) => name,
        }
    }
}

/// A placed, owned, damageable structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: BuildingKind,
    #[serde(flatten)]
    pub position: Vec2,
    /// Builder. Cleared when the builder respawns and forfeits its windmills;
    /// kept (dangling) when the builder disconnects.
    pub owner: Option<EntityId>,
    pub health: i32,
    pub max_health: i32,
}

/// Craftable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Pickaxe,
    Sword,
    Bow,
    Arrow,
}

impl ItemKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pickaxe" => Some(Self::Pickaxe),
            "sword" => Some(Self::Sword),
            "bow" => Some(Self::Bow),
            "arrow" => Some(Self::Arrow),
            _ => None,
        }
    }
}

/// Public projection of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: EntityId,
    pub name: String,
    #[serde(flatten)]
    pub position: Vec2,
    pub radius: f32,
    pub angle: f32,
    pub health: i32,
    pub max_health: i32,
    pub dead: bool,
    pub inventory: Inventory,
    pub selected_tool: String,
    pub tools: BTreeSet<ItemKind>,
    pub age: u32,
    pub xp: u32,
    pub windmills: u32,
}

/// A moving projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    pub id: EntityId,
    pub owner: EntityId,
    #[serde(flatten)]
    pub position: Vec2,
    pub angle: f32,
    pub speed: f32,
    /// Remaining life in ticks.
    pub life: i32,
}

/// Result of a resolved attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum AttackOutcome {
    /// No live target matched, or the target was out of reach.
    Miss,
    #[serde(rename_all = "camelCase")]
    BuildingDamaged { target: EntityId, health: i32 },
    #[serde(rename_all = "camelCase")]
    BuildingDestroyed {
        target: EntityId,
        kind: BuildingKind,
        owner: Option<EntityId>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerDamaged {
        target: EntityId,
        health: i32,
        max_health: i32,
    },
    #[serde(rename_all = "camelCase")]
    PlayerKilled {
        target: EntityId,
        dropped_resources: Inventory,
    },
}

impl AttackOutcome {
    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Miss)
    }
}

/// Immutable view of the simulation for periodic broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub players: Vec<PlayerView>,
    pub projectiles: Vec<Projectile>,
    pub buildings: Vec<Building>,
}

impl Snapshot {
    /// Players that are currently alive.
    pub fn alive_players(&self) -> impl Iterator<Item = &PlayerView> {
        self.players.iter().filter(|p| !p.dead)
    }
}
