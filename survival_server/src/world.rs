//! World state: resources, buildings, and the shared id/RNG sources.
//!
//! Registries are `BTreeMap`s keyed by id so iteration order is stable.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, Rng, SeedableRng};
use survival_shared::{
    entity::{EntityId, IdAllocator},
    math::{Bounds, Vec2},
    model::{Building, BuildingKind, Resource, SourceKind},
};
use tracing::{debug, warn};

use crate::rules::{self, INITIAL_POPULATION};

pub struct World {
    bounds: Bounds,
    resources: BTreeMap<EntityId, Resource>,
    buildings: BTreeMap<EntityId, Building>,
    ids: IdAllocator,
    rng: StdRng,
}

impl World {
    /// Creates a world and seeds its initial resource population.
    pub fn new(bounds: Bounds, seed: Option<u64>) -> Self {
        let mut world = Self::empty(bounds, seed);
        world.generate_initial();
        world
    }

    /// Creates a world with no resources.
    pub fn empty(bounds: Bounds, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            bounds,
            resources: BTreeMap::new(),
            buildings: BTreeMap::new(),
            ids: IdAllocator::default(),
            rng,
        }
    }

    fn generate_initial(&mut self) {
        for (source, count) in INITIAL_POPULATION {
            for _ in 0..count {
                let _ = self.spawn_resource(Some(source));
            }
        }
        debug!(resources = self.resources.len(), "Initial resources generated");
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn allocate_id(&mut self) -> EntityId {
        self.ids.next()
    }

    /// Uniform point inside the world bounds.
    pub fn random_position(&mut self) -> Vec2 {
        Vec2::new(
            self.rng.gen::<f32>() * self.bounds.width,
            self.rng.gen::<f32>() * self.bounds.height,
        )
    }

    /// Spawns a resource of `source` (uniformly random when `None`) at a
    /// random position.
    pub fn spawn_resource(&mut self, source: Option<SourceKind>) -> Resource {
        let source = source
            .unwrap_or_else(|| SourceKind::ALL[self.rng.gen_range(0..SourceKind::ALL.len())]);
        let position = self.random_position();
        self.spawn_resource_at(source, position)
    }

    /// Spawns a resource by source name. Unknown names produce nothing.
    pub fn spawn_resource_named(&mut self, name: &str) -> Option<Resource> {
        let Some(source) = SourceKind::parse(name) else {
            warn!(kind = %name, "Attempted to spawn unknown resource kind; skipping");
            return None;
        };
        Some(self.spawn_resource(Some(source)))
    }

    /// Spawns a resource at a fixed position (clamped into bounds).
    pub fn spawn_resource_at(&mut self, source: SourceKind, position: Vec2) -> Resource {
        let profile = rules::resource_profile(source);
        let resource = Resource {
            id: self.ids.next(),
            kind: profile.kind,
            position: self.bounds.clamp(position),
            amount: profile.amount,
            scale: profile.scale,
            color: profile.color.to_string(),
            source,
        };
        self.resources.insert(resource.id, resource.clone());
        resource
    }

    pub fn resource(&self, id: EntityId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn remove_resource(&mut self, id: EntityId) -> Option<Resource> {
        self.resources.remove(&id)
    }

    pub fn insert_building(&mut self, building: Building) {
        self.buildings.insert(building.id, building);
    }

    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    pub fn remove_building(&mut self, id: EntityId) -> Option<Building> {
        self.buildings.remove(&id)
    }

    /// Clears `owner` on every windmill it owns. Returns how many were released.
    pub fn release_windmills(&mut self, owner: EntityId) -> usize {
        let mut released = 0;
        for building in self.buildings.values_mut() {
            if building.kind == BuildingKind::Windmill && building.owner == Some(owner) {
                building.owner = None;
                released += 1;
            }
        }
        released
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }
}
