//! Core types for the Silica engine
//!
//! This crate provides the entity model and per-frame collision checking:
//!
//! - [`Entity`] - A named transform holding at most one component per kind
//! - [`Component`] - Collision, render or behaviour data attached to an entity
//! - [`Scene`] - Container for entities with parent/child links
//! - [`EntityKey`] - Generational key to an entity in a scene
//! - [`SceneCollider`] - Broadphase, tag filtering, narrowphase and callback dispatch
//! - [`SceneTemplate`] - Loadable/saveable scene description

mod component;
mod entity;
mod scene;
mod collider;
mod template;

pub use component::{
    Behaviour, CallbackResult, CollisionCallback, CollisionComponent, CollisionEvent, Component,
    ComponentKind, ComponentKinds, RenderComponent, UpdateFn,
};
pub use entity::{Color, Entity};
pub use scene::{EntityKey, Scene, SceneId};
pub use collider::{ColliderError, CollisionStats, SceneCollider};
pub use template::{
    ColliderTemplate, EntityTemplate, SceneLoadError, SceneSaveError, SceneTemplate, ShapeTemplate,
    TagPalette,
};

// Re-export commonly used types for convenience
pub use silica_collision::{CollisionTag, DynamicTree, TreeConfig, TreeError};
pub use silica_math::{Aabb, Circle, Polygon, Rectangle, Shape, Transform2D, Vec2};
