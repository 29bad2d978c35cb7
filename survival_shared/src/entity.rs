//! Entity identifiers.
//!
//! Players, resources, buildings and projectiles all draw ids from one
//! allocator, so a bare id is never ambiguous between two live entities.
//! Ids are totally ordered; simulation code relies on that for stable
//! iteration (`BTreeMap<EntityId, _>`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next_id: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next_id: 1 }
    }
}

impl IdAllocator {
    /// Hands out the next unused id.
    pub fn next(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }
}
