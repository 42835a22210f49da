//! 2D Mathematics Library
//!
//! Geometry primitives consumed by the Silica collision and scene crates.
//!
//! ## Core Types
//!
//! - [`Vec2`] - 2D vector
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`Transform2D`] - Position, rotation and uniform scale
//!
//! ## Shape Types
//!
//! - [`Shape`] - Collision shape (convex polygon or circle) with bounding box
//!   and exact intersection queries
//! - [`Polygon`], [`Circle`], [`Rectangle`]

mod vec2;
mod aabb;
mod transform;
pub mod shape;

pub use vec2::Vec2;
pub use aabb::Aabb;
pub use transform::Transform2D;
pub use shape::{Circle, Polygon, Rectangle, Shape};
