//! The registry is the only owner of entity storage. Everything else refers to
//! entities by [`EntityId`] and re-checks membership before use.

use indexmap::IndexMap;

use crate::entity::{Entity, EntityId, EntityType, Spawn};

/// Entities keyed by id, iterated in insertion (or last z-sort) order.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: IndexMap<EntityId, Entity>,
    next_id: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Ids are never reused, even across `clear()`.
    pub fn add(&mut self, spawn: Spawn) -> EntityId {
        let id = EntityId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.entities.insert(id, Entity::new(id, spawn));
        id
    }

    /// Keeps the order of the remaining entities.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.shift_remove(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Write back an entity that was cloned out for an update. Returns false
    /// when the entity has been removed in the meantime.
    pub fn replace(&mut self, entity: Entity) -> bool {
        match self.entities.get_mut(&entity.id) {
            Some(slot) => {
                *slot = entity;
                true
            }
            None => false,
        }
    }

    /// Snapshot of ids in current order. Stays valid while the registry
    /// changes; callers skip ids that are gone by the time they reach them.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn ids_where(&self, predicate: impl Fn(&Entity) -> bool) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|entity| predicate(entity))
            .map(|entity| entity.id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn first_of_kind(&self, kind: EntityType) -> Option<&Entity> {
        self.entities
            .values()
            .find(|entity| entity.entity_type() == kind)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Ascending z-order; equal z-orders keep their relative order.
    pub fn sort_by_z_order(&mut self) {
        self.entities.sort_by(|_, a, _, b| a.z_order.cmp(&b.z_order));
    }
}

/// Registry changes requested while entities are being updated. Applied in
/// one go once the update pass is over.
#[derive(Debug, Default)]
pub struct Commands {
    spawns: Vec<Spawn>,
    despawns: Vec<EntityId>,
}

impl Commands {
    pub fn spawn(&mut self, spawn: Spawn) {
        self.spawns.push(spawn);
    }

    pub fn despawn(&mut self, id: EntityId) {
        if !self.despawns.contains(&id) {
            self.despawns.push(id);
        }
    }

    pub fn is_despawning(&self, id: EntityId) -> bool {
        self.despawns.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.despawns.is_empty()
    }

    pub fn clear(&mut self) {
        self.spawns.clear();
        self.despawns.clear();
    }

    /// Apply despawns, then spawns. Returns the removed entities (so owners
    /// can drop their references) and the ids of the new ones.
    pub fn flush(&mut self, registry: &mut EntityRegistry) -> (Vec<Entity>, Vec<EntityId>) {
        let removed = self
            .despawns
            .drain(..)
            .filter_map(|id| registry.remove(id))
            .collect();
        let added = self
            .spawns
            .drain(..)
            .map(|spawn| registry.add(spawn))
            .collect();
        (removed, added)
    }
}
