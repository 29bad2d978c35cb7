//! Player entity and its alive/dead state machine.
//!
//! Transitions:
//! - `Alive -> Dead`: [`Player::take_damage`] drops health to zero or below.
//! - `Dead -> Alive`: [`Player::advance_respawn`] counts the timer down to
//!   zero, then the caller runs [`Player::respawn`] with a fresh position.
//!
//! A dead player ignores movement and is never a valid target.

use std::collections::BTreeSet;

use survival_shared::{
    entity::EntityId,
    math::{Bounds, Vec2},
    model::{Inventory, ItemKind, PlayerView},
    net::MoveInput,
};

use crate::rules::{INCOME_PERIOD_TICKS, RESPAWN_DELAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead { respawn_in_ms: u32 },
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: EntityId,
    pub name: String,
    pub position: Vec2,
    pub radius: f32,
    pub speed: f32,
    pub angle: f32,

    pub health: i32,
    pub max_health: i32,
    life: LifeState,

    pub damage: i32,
    pub range: f32,
    pub gather_speed: f32,

    pub inventory: Inventory,
    pub tools: BTreeSet<ItemKind>,
    pub selected_tool: String,

    windmills: u32,
    income_ticks: u32,

    pub age: u32,
    pub xp: u32,
}

impl Player {
    pub fn new(id: EntityId, name: &str, position: Vec2) -> Self {
        let name = match name.trim() {
            "" => "Player".to_string(),
            n => n.to_string(),
        };
        Self {
            id,
            name,
            position,
            radius: 25.0,
            speed: 3.0,
            angle: 0.0,
            health: 100,
            max_health: 100,
            life: LifeState::Alive,
            damage: 10,
            range: 60.0,
            gather_speed: 1.0,
            inventory: Inventory::EMPTY,
            tools: BTreeSet::new(),
            selected_tool: "hand".to_string(),
            windmills: 0,
            income_ticks: 0,
            age: 1,
            xp: 0,
        }
    }

    pub fn life(&self) -> LifeState {
        self.life
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.life, LifeState::Dead { .. })
    }

    pub fn windmills(&self) -> u32 {
        self.windmills
    }

    pub(crate) fn add_windmill(&mut self) {
        self.windmills += 1;
    }

    pub(crate) fn remove_windmill(&mut self) {
        self.windmills = self.windmills.saturating_sub(1);
    }

    /// Overwrites the supplied pose fields and re-clamps into `bounds`.
    /// Returns `false` (and changes nothing) while dead.
    pub fn apply_move(&mut self, input: &MoveInput, bounds: Bounds) -> bool {
        if self.is_dead() {
            return false;
        }
        if let Some(x) = input.x {
            self.position.x = x;
        }
        if let Some(y) = input.y {
            self.position.y = y;
        }
        if let Some(angle) = input.angle {
            self.angle = angle;
        }
        if let Some(tool) = &input.selected_tool {
            self.selected_tool.clone_from(tool);
        }
        self.position = bounds.clamp(self.position);
        true
    }

    /// Applies damage. On death returns the inventory the player dropped.
    pub(crate) fn take_damage(&mut self, amount: i32) -> Option<Inventory> {
        self.health -= amount;
        if self.health > 0 {
            return None;
        }
        self.life = LifeState::Dead {
            respawn_in_ms: RESPAWN_DELAY_MS,
        };
        Some(self.inventory.take_all())
    }

    /// Counts the respawn timer down by `step_ms`. Returns `true` once it has
    /// run out and the player is due to respawn.
    pub(crate) fn advance_respawn(&mut self, step_ms: u32) -> bool {
        match &mut self.life {
            LifeState::Dead { respawn_in_ms } if *respawn_in_ms > 0 => {
                *respawn_in_ms = respawn_in_ms.saturating_sub(step_ms);
                *respawn_in_ms == 0
            }
            _ => false,
        }
    }

    pub(crate) fn respawn(&mut self, position: Vec2) {
        self.life = LifeState::Alive;
        self.health = self.max_health;
        self.position = position;
        self.inventory = Inventory::EMPTY;
        self.windmills = 0;
        self.income_ticks = 0;
    }

    /// Advances the passive income counter. Returns the gold credited, if any.
    pub(crate) fn accrue_income(&mut self) -> Option<u32> {
        if self.is_dead() || self.windmills == 0 {
            return None;
        }
        self.income_ticks += 1;
        if self.income_ticks < INCOME_PERIOD_TICKS {
            return None;
        }
        self.income_ticks = 0;
        self.inventory.gold = self.inventory.gold.saturating_add(self.windmills);
        Some(self.windmills)
    }

    /// Marks `item` learned and applies its permanent stat overwrite.
    pub(crate) fn learn(&mut self, item: ItemKind) {
        let _ = self.tools.insert(item);
        match item {
            ItemKind::Sword => {
                self.damage = 25;
                self.range = 80.0;
            }
            ItemKind::Pickaxe => self.gather_speed = 2.0,
            ItemKind::Bow | ItemKind::Arrow => {}
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            position: self.position,
            radius: self.radius,
            angle: self.angle,
            health: self.health,
            max_health: self.max_health,
            dead: self.is_dead(),
            inventory: self.inventory,
            selected_tool: self.selected_tool.clone(),
            tools: self.tools.clone(),
            age: self.age,
            xp: self.xp,
            windmills: self.windmills,
        }
    }
}
