//! Simulation engine.
//!
//! `Game` owns every player, the world, and the projectile list. All
//! mutation goes through `&mut Game`: command handlers validate first and
//! either commit fully or return a [`Rejected`] with no state change, and
//! [`Game::tick`] advances time-based effects by one fixed step.
//!
//! Determinism notes:
//! - Players are iterated in ascending id order (`BTreeMap`), so the first
//!   projectile collision goes to the lowest player id.
//! - Projectiles are advanced in creation order.
//! - All randomness comes from the world's seedable RNG.

use std::collections::BTreeMap;

use survival_shared::{
    config::ServerConfig,
    entity::EntityId,
    math::Vec2,
    model::{
        AttackOutcome, Building, BuildingKind, Inventory, ItemKind, PlayerView, Projectile,
        Resource, ResourceKind, Shortfall, Snapshot,
    },
    net::{BuildRequest, MoveInput},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    player::Player,
    rules::{
        self, BUILDING_REACH_BONUS, GATHER_RANGE, PLAYER_REACH_BONUS, PROJECTILE_DAMAGE,
        PROJECTILE_HIT_RADIUS, PROJECTILE_LIFE, PROJECTILE_SPEED,
    },
    world::World,
};

/// Why a command had no effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejected {
    #[error("unknown player {0}")]
    UnknownPlayer(EntityId),
    #[error("player {0} is dead")]
    PlayerDead(EntityId),
    #[error("unknown resource {0}")]
    UnknownResource(EntityId),
    #[error("out of range: {distance:.2} > {limit:.2}")]
    OutOfRange { distance: f32, limit: f32 },
    #[error("insufficient resources ({0})")]
    InsufficientResources(Shortfall),
    #[error("unknown recipe {0:?}")]
    UnknownRecipe(String),
}

/// Pose after an applied move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moved {
    pub position: Vec2,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gathered {
    pub kind: ResourceKind,
    pub amount: u32,
    pub removed: EntityId,
    pub replacement: Resource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Built {
    pub building: Building,
    pub inventory: Inventory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Crafted {
    pub item: ItemKind,
    pub inventory: Inventory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileHit {
    pub projectile: EntityId,
    pub owner: EntityId,
    pub outcome: AttackOutcome,
}

/// Everything one tick changed that is worth announcing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub respawned: Vec<EntityId>,
    /// `(player, gold)` payouts.
    pub income: Vec<(EntityId, u32)>,
    pub hits: Vec<ProjectileHit>,
    pub expired: Vec<EntityId>,
}

pub struct Game {
    world: World,
    players: BTreeMap<EntityId, Player>,
    projectiles: Vec<Projectile>,
    tick: u64,
    step_ms: u32,
}

impl Game {
    pub fn new(cfg: &ServerConfig) -> Self {
        Self::with_world(World::new(cfg.bounds(), cfg.seed), cfg.tick_step_ms())
    }

    pub fn with_world(world: World, step_ms: u32) -> Self {
        Self {
            world,
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            tick: 0,
            step_ms,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Fresh id from the shared entity id space.
    pub fn allocate_id(&mut self) -> EntityId {
        self.world.allocate_id()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    fn acting_player(&self, id: EntityId) -> Result<&Player, Rejected> {
        let player = self.players.get(&id).ok_or(Rejected::UnknownPlayer(id))?;
        if player.is_dead() {
            return Err(Rejected::PlayerDead(id));
        }
        Ok(player)
    }

    fn acting_player_mut(&mut self, id: EntityId) -> Result<&mut Player, Rejected> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(Rejected::UnknownPlayer(id))?;
        if player.is_dead() {
            return Err(Rejected::PlayerDead(id));
        }
        Ok(player)
    }

    /// Registers a player at a random position. A player already registered
    /// under `id` is kept as is (life state, inventory and windmills
    /// included) and its current view is returned.
    pub fn add_player(&mut self, id: EntityId, name: &str) -> PlayerView {
        if let Some(existing) = self.players.get(&id) {
            debug!(player = %id, "Repeated join ignored");
            return existing.view();
        }
        let position = self.world.random_position();
        let player = Player::new(id, name, position);
        let view = player.view();
        self.players.insert(id, player);
        info!(player = %id, name = %view.name, x = view.position.x, y = view.position.y, "Player joined");
        view
    }

    /// Deregisters a player. Its buildings stay in the world.
    pub fn remove_player(&mut self, id: EntityId) -> Option<Player> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!(player = %id, "Player removed");
        }
        removed
    }

    pub fn apply_move(&mut self, id: EntityId, input: &MoveInput) -> Option<Moved> {
        let bounds = self.world.bounds();
        let player = self.players.get_mut(&id)?;
        player.apply_move(input, bounds).then_some(Moved {
            position: player.position,
            angle: player.angle,
        })
    }

    pub fn gather(
        &mut self,
        player_id: EntityId,
        resource_id: EntityId,
    ) -> Result<Gathered, Rejected> {
        let origin = self.acting_player(player_id)?.position;
        let resource = self
            .world
            .resource(resource_id)
            .ok_or(Rejected::UnknownResource(resource_id))?;

        let distance = origin.distance(resource.position);
        if distance > GATHER_RANGE {
            return Err(Rejected::OutOfRange {
                distance,
                limit: GATHER_RANGE,
            });
        }

        let (kind, amount) = (resource.kind, resource.amount);
        let _ = self.world.remove_resource(resource_id);
        if let Some(player) = self.players.get_mut(&player_id) {
            player.inventory.credit(kind, amount);
        }
        let replacement = self.world.spawn_resource(None);

        debug!(player = %player_id, resource = %resource_id, ?kind, amount, "Resource gathered");
        Ok(Gathered {
            kind,
            amount,
            removed: resource_id,
            replacement,
        })
    }

    pub fn build(&mut self, player_id: EntityId, req: &BuildRequest) -> Result<Built, Rejected> {
        let cost = rules::building_cost(&req.kind);
        let max_health = rules::building_health(&req.kind);
        let position = self.world.bounds().clamp(Vec2::new(req.x, req.y));

        let player = self.acting_player_mut(player_id)?;
        player
            .inventory
            .try_debit(&cost)
            .map_err(Rejected::InsufficientResources)?;
        if req.kind == BuildingKind::Windmill {
            player.add_windmill();
        }
        let inventory = player.inventory;

        let building = Building {
            id: self.world.allocate_id(),
            kind: req.kind.clone(),
            position,
            owner: Some(player_id),
            health: max_health,
            max_health,
        };
        self.world.insert_building(building.clone());

        debug!(player = %player_id, building = %building.id, kind = ?building.kind, "Building placed");
        Ok(Built {
            building,
            inventory,
        })
    }

    /// Melee attack against a player or building.
    ///
    /// A live player under `target_id` takes precedence over a building. Reach
    /// is `range + 30` against players and `range + 50` against buildings,
    /// both inclusive. Anything else resolves to [`AttackOutcome::Miss`].
    pub fn attack(
        &mut self,
        attacker_id: EntityId,
        target_id: EntityId,
    ) -> Result<AttackOutcome, Rejected> {
        let attacker = self.acting_player(attacker_id)?;
        let (origin, range, damage) = (attacker.position, attacker.range, attacker.damage);

        if let Some(target) = self
            .players
            .get_mut(&target_id)
            .filter(|t| !t.is_dead())
        {
            if origin.distance(target.position) > range + PLAYER_REACH_BONUS {
                return Ok(AttackOutcome::Miss);
            }
            let outcome = match target.take_damage(damage) {
                Some(dropped_resources) => {
                    info!(killer = %attacker_id, victim = %target_id, "Player killed");
                    AttackOutcome::PlayerKilled {
                        target: target_id,
                        dropped_resources,
                    }
                }
                None => AttackOutcome::PlayerDamaged {
                    target: target_id,
                    health: target.health,
                    max_health: target.max_health,
                },
            };
            return Ok(outcome);
        }

        let Some(building) = self.world.building_mut(target_id) else {
            return Ok(AttackOutcome::Miss);
        };
        if origin.distance(building.position) > range + BUILDING_REACH_BONUS {
            return Ok(AttackOutcome::Miss);
        }
        building.health -= damage;
        if building.health > 0 {
            return Ok(AttackOutcome::BuildingDamaged {
                target: target_id,
                health: building.health,
            });
        }

        let Some(destroyed) = self.world.remove_building(target_id) else {
            return Ok(AttackOutcome::Miss);
        };
        if destroyed.kind == BuildingKind::Windmill {
            if let Some(owner) = destroyed.owner.and_then(|o| self.players.get_mut(&o)) {
                owner.remove_windmill();
            }
        }
        debug!(attacker = %attacker_id, building = %target_id, kind = ?destroyed.kind, "Building destroyed");
        Ok(AttackOutcome::BuildingDestroyed {
            target: target_id,
            kind: destroyed.kind,
            owner: destroyed.owner,
        })
    }

    pub fn craft(&mut self, player_id: EntityId, item_type: &str) -> Result<Crafted, Rejected> {
        let player = self.acting_player_mut(player_id)?;
        let item =
            ItemKind::parse(item_type).ok_or_else(|| Rejected::UnknownRecipe(item_type.into()))?;
        player
            .inventory
            .try_debit(&rules::recipe(item))
            .map_err(Rejected::InsufficientResources)?;
        player.learn(item);

        debug!(player = %player_id, ?item, "Item crafted");
        Ok(Crafted {
            item,
            inventory: player.inventory,
        })
    }

    /// Ranged attack: launches a projectile from the owner's position.
    pub fn fire_projectile(&mut self, owner: EntityId, angle: f32) -> Result<Projectile, Rejected> {
        let origin = self.acting_player(owner)?.position;
        Ok(self.spawn_projectile(owner, origin, angle, PROJECTILE_SPEED, PROJECTILE_LIFE))
    }

    /// Appends a projectile with explicit kinematics.
    pub fn spawn_projectile(
        &mut self,
        owner: EntityId,
        position: Vec2,
        angle: f32,
        speed: f32,
        life: i32,
    ) -> Projectile {
        let projectile = Projectile {
            id: self.world.allocate_id(),
            owner,
            position,
            angle,
            speed,
            life,
        };
        self.projectiles.push(projectile.clone());
        projectile
    }

    /// Background replenishment: one resource of random kind.
    pub fn replenish(&mut self) -> Resource {
        self.world.spawn_resource(None)
    }

    /// Advances respawns, passive income and projectiles by one fixed step.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        for (&id, player) in self.players.iter_mut() {
            if player.advance_respawn(self.step_ms) {
                player.respawn(self.world.random_position());
                report.respawned.push(id);
            } else if let Some(gold) = player.accrue_income() {
                report.income.push((id, gold));
            }
        }
        for &id in &report.respawned {
            let released = self.world.release_windmills(id);
            debug!(player = %id, released, "Player respawned");
        }

        let players = &mut self.players;
        let hits = &mut report.hits;
        let expired = &mut report.expired;
        self.projectiles.retain_mut(|proj| {
            proj.position += Vec2::from_angle(proj.angle).scale(proj.speed);
            proj.life -= 1;

            let victim = players.values_mut().find(|p| {
                p.id != proj.owner
                    && !p.is_dead()
                    && p.position.distance(proj.position) < PROJECTILE_HIT_RADIUS
            });
            if let Some(victim) = victim {
                let outcome = match victim.take_damage(PROJECTILE_DAMAGE) {
                    Some(dropped_resources) => AttackOutcome::PlayerKilled {
                        target: victim.id,
                        dropped_resources,
                    },
                    None => AttackOutcome::PlayerDamaged {
                        target: victim.id,
                        health: victim.health,
                        max_health: victim.max_health,
                    },
                };
                hits.push(ProjectileHit {
                    projectile: proj.id,
                    owner: proj.owner,
                    outcome,
                });
                return false;
            }

            if proj.life <= 0 {
                expired.push(proj.id);
                return false;
            }
            true
        });

        report
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            players: self.players.values().map(Player::view).collect(),
            projectiles: self.projectiles.clone(),
            buildings: self.world.buildings().cloned().collect(),
        }
    }
}
