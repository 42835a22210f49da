//! Entity components
//!
//! Components are plain data stored on an [`Entity`] keyed by their
//! [`ComponentKind`]. Per-entity reactions live in function fields:
//! - [`CollisionComponent`] carries an optional collision callback
//! - [`Behaviour`] carries a per-frame update function
//! - [`Component::init`] is the attach hook, run when the entity enters a scene
//!   or when [`Scene::add_component`](crate::Scene::add_component) attaches it later

use std::fmt;

use bitflags::bitflags;
use silica_collision::CollisionTag;
use silica_math::{Aabb, Shape, Transform2D};

use crate::entity::{Color, Entity};
use crate::scene::EntityKey;

/// Result returned by collision callbacks
pub type CallbackResult = Result<(), Box<dyn std::error::Error>>;

/// Reaction run when the owning entity's shape touches a registered partner
///
/// The callback receives its own entity mutably, so it can change local
/// state (a render colour, a counter component) without capturing it.
pub type CollisionCallback = Box<dyn FnMut(&mut Entity, &CollisionEvent) -> CallbackResult>;

/// Per-frame update function of a [`Behaviour`]
pub type UpdateFn = Box<dyn FnMut(&mut Entity, f32)>;

/// What a collision callback learns about the other party
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEvent {
    /// The entity this one collided with
    pub other: EntityKey,
    /// Tag of the other entity's collision component
    pub other_tag: CollisionTag,
    /// World-space bounding box of the other entity's shape this frame
    pub other_bounds: Aabb,
}

/// The closed set of component kinds an entity can carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Collision,
    Render,
    Behaviour,
}

bitflags! {
    /// Set of component kinds, used to filter entities by capability
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ComponentKinds: u8 {
        const COLLISION = 1 << 0;
        const RENDER = 1 << 1;
        const BEHAVIOUR = 1 << 2;
    }
}

impl ComponentKind {
    /// The flag for this kind
    pub fn flag(self) -> ComponentKinds {
        match self {
            ComponentKind::Collision => ComponentKinds::COLLISION,
            ComponentKind::Render => ComponentKinds::RENDER,
            ComponentKind::Behaviour => ComponentKinds::BEHAVIOUR,
        }
    }
}

/// Tagged shape that takes part in scene collision checks
pub struct CollisionComponent {
    /// Category used for tag-pair filtering
    pub tag: CollisionTag,
    /// Local-space shape; placed by the owning entity's world transform
    pub shape: Shape,
    callback: Option<CollisionCallback>,
    owner: Option<EntityKey>,
}

impl CollisionComponent {
    /// Create a collision component without a callback
    pub fn new(tag: CollisionTag, shape: impl Into<Shape>) -> Self {
        Self {
            tag,
            shape: shape.into(),
            callback: None,
            owner: None,
        }
    }

    /// Create a collision component that reacts to collisions
    pub fn with_callback<F>(tag: CollisionTag, shape: impl Into<Shape>, callback: F) -> Self
    where
        F: FnMut(&mut Entity, &CollisionEvent) -> CallbackResult + 'static,
    {
        let mut component = Self::new(tag, shape);
        component.callback = Some(Box::new(callback));
        component
    }

    /// Replace the callback
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Entity, &CollisionEvent) -> CallbackResult + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Entity this component was attached to, once it has entered a scene
    pub fn owner(&self) -> Option<EntityKey> {
        self.owner
    }

    /// Record the owning entity
    pub fn init(&mut self, owner: EntityKey) {
        self.owner = Some(owner);
    }

    /// World-space bounding box of the shape under the entity's transform
    ///
    /// Always recomputed: the transform may have changed since the last call.
    pub fn bounding_box(&self, world: &Transform2D) -> Aabb {
        self.shape.aabb(world)
    }

    pub(crate) fn take_callback(&mut self) -> Option<CollisionCallback> {
        self.callback.take()
    }

    /// Put a callback back after dispatch, unless it was replaced meanwhile
    pub(crate) fn restore_callback(&mut self, callback: CollisionCallback) {
        if self.callback.is_none() {
            self.callback = Some(callback);
        }
    }
}

impl fmt::Debug for CollisionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionComponent")
            .field("tag", &self.tag)
            .field("shape", &self.shape)
            .field("has_callback", &self.callback.is_some())
            .field("owner", &self.owner)
            .finish()
    }
}

/// Flat-colour outline render data
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderComponent {
    pub color: Color,
}

impl RenderComponent {
    pub fn new(color: Color) -> Self {
        Self { color }
    }
}

impl Default for RenderComponent {
    fn default() -> Self {
        Self::new(Color::WHITE)
    }
}

/// Per-frame logic attached to an entity
pub struct Behaviour {
    update: UpdateFn,
}

impl Behaviour {
    pub fn new<F>(update: F) -> Self
    where
        F: FnMut(&mut Entity, f32) + 'static,
    {
        Self {
            update: Box::new(update),
        }
    }

    pub(crate) fn run(&mut self, entity: &mut Entity, dt: f32) {
        (self.update)(entity, dt);
    }
}

impl fmt::Debug for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Behaviour")
    }
}

/// Any component an entity can hold
#[derive(Debug)]
pub enum Component {
    Collision(CollisionComponent),
    Render(RenderComponent),
    Behaviour(Behaviour),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Collision(_) => ComponentKind::Collision,
            Component::Render(_) => ComponentKind::Render,
            Component::Behaviour(_) => ComponentKind::Behaviour,
        }
    }

    /// Attach hook, run once the owning entity has a key
    pub fn init(&mut self, owner: EntityKey) {
        match self {
            Component::Collision(collision) => collision.init(owner),
            Component::Render(_) | Component::Behaviour(_) => {}
        }
    }
}

impl From<CollisionComponent> for Component {
    fn from(c: CollisionComponent) -> Self {
        Component::Collision(c)
    }
}

impl From<RenderComponent> for Component {
    fn from(c: RenderComponent) -> Self {
        Component::Render(c)
    }
}

impl From<Behaviour> for Component {
    fn from(c: Behaviour) -> Self {
        Component::Behaviour(c)
    }
}
