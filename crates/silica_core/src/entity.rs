//! Entity and Color types
//!
//! An Entity is a named local transform plus at most one component of each
//! [`ComponentKind`].

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use silica_math::{Transform2D, Vec2};

use crate::component::{
    CollisionComponent, Component, ComponentKind, ComponentKinds, RenderComponent,
};
use crate::scene::EntityKey;

/// RGBA colour, each component 0.0-1.0
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque colour from RGB
    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub const WHITE: Self = Self::from_rgb(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::from_rgb(0.0, 0.0, 0.0);
    pub const RED: Self = Self::from_rgb(1.0, 0.0, 0.0);
    pub const GREEN: Self = Self::from_rgb(0.0, 0.5, 0.0);
    pub const AQUA: Self = Self::from_rgb(0.0, 1.0, 1.0);
    pub const YELLOW_GREEN: Self = Self::from_rgb(0.6, 0.8, 0.2);
}

/// An object in a scene
///
/// `transform` is relative to the parent entity, or to the world for
/// top-level entities. See [`Scene::world_transform`](crate::Scene::world_transform).
#[derive(Debug, Default)]
pub struct Entity {
    /// Optional name for lookup and logging
    pub name: Option<String>,
    /// Local transform
    pub transform: Transform2D,
    components: BTreeMap<ComponentKind, Component>,
}

impl Entity {
    /// Create an entity at the origin with no components
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity at a position
    pub fn at(position: Vec2) -> Self {
        Self {
            transform: Transform2D::from_position(position),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform2D) -> Self {
        self.transform = transform;
        self
    }

    /// Builder form of [`add_component`](Self::add_component)
    pub fn with_component(mut self, component: impl Into<Component>) -> Self {
        self.add_component(component);
        self
    }

    /// Attach a component, returning the one of the same kind it replaces
    ///
    /// Attach hooks run when the entity enters a scene. For an entity already
    /// in one, attach through [`Scene::add_component`](crate::Scene::add_component).
    pub fn add_component(&mut self, component: impl Into<Component>) -> Option<Component> {
        let component = component.into();
        self.components.insert(component.kind(), component)
    }

    pub fn remove_component(&mut self, kind: ComponentKind) -> Option<Component> {
        self.components.remove(&kind)
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.get(&kind)
    }

    pub fn has(&self, kind: ComponentKind) -> bool {
        self.components.contains_key(&kind)
    }

    /// Every kind this entity carries
    pub fn kinds(&self) -> ComponentKinds {
        self.components
            .keys()
            .fold(ComponentKinds::empty(), |acc, kind| acc | kind.flag())
    }

    pub fn collision(&self) -> Option<&CollisionComponent> {
        match self.components.get(&ComponentKind::Collision) {
            Some(Component::Collision(c)) => Some(c),
            _ => None,
        }
    }

    pub fn collision_mut(&mut self) -> Option<&mut CollisionComponent> {
        match self.components.get_mut(&ComponentKind::Collision) {
            Some(Component::Collision(c)) => Some(c),
            _ => None,
        }
    }

    pub fn render(&self) -> Option<&RenderComponent> {
        match self.components.get(&ComponentKind::Render) {
            Some(Component::Render(c)) => Some(c),
            _ => None,
        }
    }

    pub fn render_mut(&mut self) -> Option<&mut RenderComponent> {
        match self.components.get_mut(&ComponentKind::Render) {
            Some(Component::Render(c)) => Some(c),
            _ => None,
        }
    }

    /// Run every component's attach hook
    pub(crate) fn init_components(&mut self, owner: EntityKey) {
        for component in self.components.values_mut() {
            component.init(owner);
        }
    }

    /// Run the behaviour, if any
    ///
    /// The behaviour is detached while it runs so it can borrow the entity.
    pub(crate) fn run_behaviour(&mut self, dt: f32) {
        let Some(Component::Behaviour(mut behaviour)) = self.components.remove(&ComponentKind::Behaviour) else {
            return;
        };
        behaviour.run(self, dt);
        self.components
            .entry(ComponentKind::Behaviour)
            .or_insert(Component::Behaviour(behaviour));
    }
}
