//! SceneWorld - ECS world with stable IDs, relations and change versions

use crate::change::{ChangeGroup, ChangeTicks};
use crate::components::{Prefab, Tracked, Transform};
use bimap::BiMap;
use glam::Mat4;
use kiln_core::{EntityId, KilnError, Result};
use std::collections::{HashMap, VecDeque};

/// Where a resolved component value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentSource {
    /// Stored on the entity itself
    Own,
    /// Shared from the given prefab
    Shared(EntityId),
}

/// The main ECS world for Kiln
///
/// Wraps hecs::World with:
/// - Stable EntityId mapping
/// - Named entity lookup
/// - Parent links (a forest) and prefab links (shared components)
/// - Per-entity change versions, see [`ChangeGroup`]
pub struct SceneWorld {
    /// The underlying hecs world
    world: hecs::World,
    /// Bidirectional mapping: EntityId <-> hecs::Entity
    id_map: BiMap<EntityId, hecs::Entity>,
    /// Entity name -> EntityId mapping
    name_map: HashMap<String, EntityId>,
    /// Parent relationships: child -> parent
    parents: HashMap<EntityId, EntityId>,
    /// Prefab relationships: instance -> prefab
    prefabs: HashMap<EntityId, EntityId>,
    /// Change versions per entity
    changes: HashMap<EntityId, ChangeTicks>,
    /// Monotonic world tick, advanced by every tracked change
    tick: u64,
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneWorld {
    /// Create a new empty world
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            id_map: BiMap::new(),
            name_map: HashMap::new(),
            parents: HashMap::new(),
            prefabs: HashMap::new(),
            changes: HashMap::new(),
            tick: 0,
        }
    }

    /// Spawn a new entity with a unique name
    pub fn spawn(&mut self, name: impl Into<String>) -> Result<EntityId> {
        let name = name.into();

        if self.name_map.contains_key(&name) {
            return Err(KilnError::DuplicateEntityName(name));
        }

        let id = self.spawn_anonymous();
        self.name_map.insert(name, id);
        Ok(id)
    }

    /// Spawn a new entity without a name
    pub fn spawn_anonymous(&mut self) -> EntityId {
        let id = EntityId::new();
        let hecs_entity = self.world.spawn(());

        self.tick += 1;
        self.id_map.insert(id, hecs_entity);
        self.changes.insert(id, ChangeTicks::new(self.tick));
        id
    }

    /// Spawn a prefab entity that other entities can share components from
    pub fn spawn_prefab(&mut self, name: impl Into<String>) -> Result<EntityId> {
        let id = self.spawn(name)?;
        self.insert(id, Prefab)?;
        Ok(id)
    }

    /// Despawn an entity; its children become roots and its instances lose their prefab
    pub fn despawn(&mut self, id: EntityId) -> Result<()> {
        let hecs_entity = self.entity(id)?;

        self.world
            .despawn(hecs_entity)
            .map_err(|_| KilnError::EntityNotFound(id.to_string()))?;

        self.name_map.retain(|_, v| *v != id);
        self.id_map.remove_by_left(&id);
        self.changes.remove(&id);
        self.parents.remove(&id);
        self.prefabs.remove(&id);

        let orphans: Vec<EntityId> = self
            .parents
            .iter()
            .filter(|(_, parent)| **parent == id)
            .map(|(child, _)| *child)
            .chain(
                self.prefabs
                    .iter()
                    .filter(|(_, prefab)| **prefab == id)
                    .map(|(instance, _)| *instance),
            )
            .collect();
        self.parents.retain(|_, parent| *parent != id);
        self.prefabs.retain(|_, prefab| *prefab != id);
        for orphan in orphans {
            self.mark_changed(orphan, ChangeGroup::Structure);
        }

        Ok(())
    }

    /// Get entity ID by name
    pub fn get_id(&self, name: &str) -> Option<EntityId> {
        self.name_map.get(name).copied()
    }

    /// Get entity name by ID
    pub fn get_name(&self, id: EntityId) -> Option<&str> {
        self.name_map
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }

    /// Check if an entity exists
    pub fn contains(&self, id: EntityId) -> bool {
        self.id_map.contains_left(&id)
    }

    /// Get number of entities
    pub fn entity_count(&self) -> usize {
        self.id_map.len()
    }

    /// All entity ids, ascending
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.id_map.left_values().copied().collect();
        ids.sort();
        ids
    }

    /// Attach or overwrite a component; either counts as a structural change.
    /// [`SceneWorld::set`] bumps only the component's own group on overwrite.
    pub fn insert<C: hecs::Component>(&mut self, id: EntityId, component: C) -> Result<()> {
        self.attach(id, component)?;
        self.mark_changed(id, ChangeGroup::Structure);
        Ok(())
    }

    /// Attach or overwrite a tracked component, bumping its change group
    pub fn set<C: Tracked>(&mut self, id: EntityId, component: C) -> Result<()> {
        if self.attach(id, component)? {
            self.mark_changed(id, ChangeGroup::Structure);
        }
        self.mark_changed(id, C::GROUP);
        Ok(())
    }

    /// Insert into hecs; true when the entity did not have `C` before
    fn attach<C: hecs::Component>(&mut self, id: EntityId, component: C) -> Result<bool> {
        let entity = self.entity(id)?;
        let added = self.world.get::<&C>(entity).is_err();
        self.world
            .insert_one(entity, component)
            .map_err(|_| KilnError::EntityNotFound(id.to_string()))?;
        Ok(added)
    }

    /// Mutate a tracked component in place. Returns false if the entity lacks it.
    pub fn modify<C: Tracked>(&mut self, id: EntityId, f: impl FnOnce(&mut C)) -> Result<bool> {
        let entity = self.entity(id)?;
        let found = match self.world.get::<&mut C>(entity) {
            Ok(mut component) => {
                f(&mut *component);
                true
            }
            Err(_) => false,
        };
        if found {
            self.mark_changed(id, C::GROUP);
        }
        Ok(found)
    }

    /// Detach a component, returning it if it was present
    pub fn remove<C: hecs::Component>(&mut self, id: EntityId) -> Result<Option<C>> {
        let entity = self.entity(id)?;
        match self.world.remove_one::<C>(entity) {
            Ok(component) => {
                self.mark_changed(id, ChangeGroup::Structure);
                Ok(Some(component))
            }
            Err(_) => Ok(None),
        }
    }

    /// Borrow a component stored on the entity itself
    pub fn get<C: hecs::Component>(&self, id: EntityId) -> Option<hecs::Ref<'_, C>> {
        let entity = *self.id_map.get_by_left(&id)?;
        self.world.get::<&C>(entity).ok()
    }

    /// Copy a component stored on the entity itself
    pub fn get_copied<C: hecs::Component + Copy>(&self, id: EntityId) -> Option<C> {
        self.get::<C>(id).map(|c| *c)
    }

    pub fn has<C: hecs::Component>(&self, id: EntityId) -> bool {
        self.get::<C>(id).is_some()
    }

    /// Read a component from the entity, falling back along its prefab chain
    pub fn resolve<C: hecs::Component + Copy>(&self, id: EntityId) -> Option<(C, ComponentSource)> {
        if let Some(own) = self.get_copied::<C>(id) {
            return Some((own, ComponentSource::Own));
        }
        let mut cursor = self.prefabs.get(&id).copied();
        while let Some(prefab) = cursor {
            if let Some(shared) = self.get_copied::<C>(prefab) {
                return Some((shared, ComponentSource::Shared(prefab)));
            }
            cursor = self.prefabs.get(&prefab).copied();
        }
        None
    }

    /// Set parent relationship, rejecting links that would form a cycle
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) -> Result<()> {
        self.entity(child)?;
        self.entity(parent)?;
        if chain_contains(&self.parents, parent, child) {
            return Err(KilnError::HierarchyError(format!(
                "making {} a child of {} would create a cycle",
                child, parent
            )));
        }

        self.parents.insert(child, parent);
        self.mark_changed(child, ChangeGroup::Structure);
        Ok(())
    }

    /// Detach an entity from its parent
    pub fn clear_parent(&mut self, child: EntityId) -> Result<()> {
        self.entity(child)?;
        if self.parents.remove(&child).is_some() {
            self.mark_changed(child, ChangeGroup::Structure);
        }
        Ok(())
    }

    /// Get parent of an entity
    pub fn get_parent(&self, child: EntityId) -> Option<EntityId> {
        self.parents.get(&child).copied()
    }

    /// Get children of an entity, ascending by id
    pub fn get_children(&self, parent: EntityId) -> Vec<EntityId> {
        let mut children: Vec<EntityId> = self
            .parents
            .iter()
            .filter(|(_, p)| **p == parent)
            .map(|(c, _)| *c)
            .collect();
        children.sort();
        children
    }

    /// Share the prefab's components with `instance` where it has none of its own
    pub fn set_instance_of(&mut self, instance: EntityId, prefab: EntityId) -> Result<()> {
        self.entity(instance)?;
        self.entity(prefab)?;
        if chain_contains(&self.prefabs, prefab, instance) {
            return Err(KilnError::HierarchyError(format!(
                "{} cannot be an instance of {}: prefab cycle",
                instance, prefab
            )));
        }

        self.prefabs.insert(instance, prefab);
        self.mark_changed(instance, ChangeGroup::Structure);
        Ok(())
    }

    pub fn get_prefab(&self, instance: EntityId) -> Option<EntityId> {
        self.prefabs.get(&instance).copied()
    }

    pub fn is_prefab(&self, id: EntityId) -> bool {
        self.has::<Prefab>(id)
    }

    /// Current world tick
    pub fn change_tick(&self) -> u64 {
        self.tick
    }

    /// Change versions of an entity
    pub fn changes(&self, id: EntityId) -> Option<ChangeTicks> {
        self.changes.get(&id).copied()
    }

    /// Bump `group` on an entity without writing a component
    pub fn mark_changed(&mut self, id: EntityId, group: ChangeGroup) {
        if let Some(ticks) = self.changes.get_mut(&id) {
            self.tick += 1;
            ticks.bump(group, self.tick);
        }
    }

    /// Entities ordered parents-first: roots ascending by id, then breadth-first
    pub fn cascade_order(&self) -> Vec<EntityId> {
        let mut children: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for (&child, &parent) in &self.parents {
            children.entry(parent).or_default().push(child);
        }
        for list in children.values_mut() {
            list.sort();
        }

        let mut roots: Vec<EntityId> = self
            .id_map
            .left_values()
            .filter(|id| !self.parents.contains_key(id))
            .copied()
            .collect();
        roots.sort();

        let mut order = Vec::with_capacity(self.id_map.len());
        let mut queue: VecDeque<EntityId> = roots.into();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(kids) = children.get(&id) {
                queue.extend(kids.iter().copied());
            }
        }
        order
    }

    /// The underlying hecs world, for component queries
    pub fn ecs(&self) -> &hecs::World {
        &self.world
    }

    /// Map a hecs entity back to its stable id
    pub fn id_of(&self, entity: hecs::Entity) -> Option<EntityId> {
        self.id_map.get_by_right(&entity).copied()
    }

    /// Clear the world
    pub fn clear(&mut self) {
        self.world.clear();
        self.id_map.clear();
        self.name_map.clear();
        self.parents.clear();
        self.prefabs.clear();
        self.changes.clear();
    }

    /// Overwrite the world matrix without bumping any change group
    pub(crate) fn store_transform(&mut self, id: EntityId, matrix: Mat4) -> Result<()> {
        let entity = self.entity(id)?;
        let mut transform = self
            .world
            .get::<&mut Transform>(entity)
            .map_err(|_| KilnError::EntityNotFound(format!("{} has no Transform", id)))?;
        transform.0 = matrix;
        Ok(())
    }

    fn entity(&self, id: EntityId) -> Result<hecs::Entity> {
        self.id_map
            .get_by_left(&id)
            .copied()
            .ok_or_else(|| KilnError::EntityNotFound(id.to_string()))
    }
}

/// Follow `links` from `start`; true if the walk reaches `target`
fn chain_contains(links: &HashMap<EntityId, EntityId>, start: EntityId, target: EntityId) -> bool {
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if current == target {
            return true;
        }
        cursor = links.get(&current).copied();
    }
    false
}
