//! Scene container
//!
//! A Scene owns its entities in a generational arena and tracks the
//! parent/child links between them. Child transforms are local to their
//! parent; [`Scene::world_transform`] composes the chain.

use std::sync::atomic::{AtomicU64, Ordering};

use silica_math::{Aabb, Transform2D};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::component::{Component, ComponentKinds};
use crate::entity::Entity;

new_key_type! {
    /// Generational key to an entity in a [`Scene`]
    pub struct EntityKey;
}

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a scene instance, used to bind a collider to one scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneId(u64);

impl SceneId {
    fn next() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// A collection of entities with optional parent/child relationships
#[derive(Debug)]
pub struct Scene {
    id: SceneId,
    entities: SlotMap<EntityKey, Entity>,
    parents: SecondaryMap<EntityKey, EntityKey>,
    children: SecondaryMap<EntityKey, Vec<EntityKey>>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a new empty scene
    pub fn new() -> Self {
        Self {
            id: SceneId::next(),
            entities: SlotMap::with_key(),
            parents: SecondaryMap::new(),
            children: SecondaryMap::new(),
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Add a top-level entity, running its components' attach hooks
    pub fn add_entity(&mut self, entity: Entity) -> EntityKey {
        let key = self.entities.insert(entity);
        self.entities[key].init_components(key);
        key
    }

    /// Add an entity as a child of `parent`
    ///
    /// Returns `None` (and drops the entity) if `parent` is not in the scene.
    pub fn add_child(&mut self, parent: EntityKey, entity: Entity) -> Option<EntityKey> {
        if !self.entities.contains_key(parent) {
            return None;
        }
        let key = self.add_entity(entity);
        self.parents.insert(key, parent);
        match self.children.get_mut(parent) {
            Some(siblings) => siblings.push(key),
            None => {
                self.children.insert(parent, vec![key]);
            }
        }
        Some(key)
    }

    /// Attach a component to an entity already in the scene, running its attach hook
    ///
    /// Returns the component of the same kind it replaces, or gives the
    /// component back if `key` is not in the scene.
    pub fn add_component(
        &mut self,
        key: EntityKey,
        component: impl Into<Component>,
    ) -> Result<Option<Component>, Component> {
        let mut component = component.into();
        let Some(entity) = self.entities.get_mut(key) else {
            return Err(component);
        };
        component.init(key);
        Ok(entity.add_component(component))
    }

    /// Remove an entity and all of its descendants
    ///
    /// Returns the removed entity itself; descendants are dropped.
    pub fn remove_entity(&mut self, key: EntityKey) -> Option<Entity> {
        let entity = self.entities.remove(key)?;

        if let Some(parent) = self.parents.remove(key) {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|&k| k != key);
            }
        }

        let mut pending = self.children.remove(key).unwrap_or_default();
        while let Some(child) = pending.pop() {
            self.entities.remove(child);
            self.parents.remove(child);
            if let Some(grandchildren) = self.children.remove(child) {
                pending.extend(grandchildren);
            }
        }
        Some(entity)
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Find the first entity with the given name
    pub fn find_by_name(&self, name: &str) -> Option<EntityKey> {
        self.entities
            .iter()
            .find(|(_, e)| e.name.as_deref() == Some(name))
            .map(|(key, _)| key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over keys and entities
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.entities.iter()
    }

    /// Iterate over entities carrying every kind in `kinds`
    pub fn iter_with(&self, kinds: ComponentKinds) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.entities
            .iter()
            .filter(move |(_, e)| e.kinds().contains(kinds))
    }

    pub fn parent(&self, key: EntityKey) -> Option<EntityKey> {
        self.parents.get(key).copied()
    }

    pub fn children(&self, key: EntityKey) -> &[EntityKey] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// World-space transform of an entity, composed through its ancestors
    pub fn world_transform(&self, key: EntityKey) -> Option<Transform2D> {
        let mut world = self.entities.get(key)?.transform;
        let mut current = key;
        while let Some(parent) = self.parents.get(current).copied() {
            let parent_transform = self.entities.get(parent)?.transform;
            world = parent_transform.compose(&world);
            current = parent;
        }
        Some(world)
    }

    /// World-space bounding box of an entity's collision shape
    pub fn collision_bounds(&self, key: EntityKey) -> Option<Aabb> {
        let collision = self.entities.get(key)?.collision()?;
        Some(collision.bounding_box(&self.world_transform(key)?))
    }

    /// Run every entity's behaviour for one frame
    pub fn update(&mut self, dt: f32) {
        for entity in self.entities.values_mut() {
            entity.run_behaviour(dt);
        }
    }
}
