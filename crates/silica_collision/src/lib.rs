//! 2D broadphase collision for Silica
//!
//! This crate provides the spatial index and category model used by the
//! scene collider:
//! - [`DynamicTree`] - self-balancing AABB tree with fattened leaves
//! - [`CollisionTag`] - identity token for a category of collidables
//! - [`TagPairs`] - symmetric whitelist of tag combinations

pub mod error;
pub mod tag;
pub mod tree;

pub use error::TreeError;
pub use tag::{CollisionTag, TagPairs};
pub use tree::{DynamicTree, Pairs, Query, TreeConfig};

// Re-export geometry types that appear in this crate's API
pub use silica_math::{Aabb, Vec2};
