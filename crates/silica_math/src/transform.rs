//! 2D Transform (position, rotation, scale)

use serde::{Serialize, Deserialize};
use crate::Vec2;

/// A 2D transform with position, rotation and uniform scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    /// Position in world units
    pub position: Vec2,
    /// Counter-clockwise rotation in radians
    pub rotation: f32,
    /// Uniform scale factor
    pub scale: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    /// Create an identity transform
    pub fn identity() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: 1.0,
        }
    }

    /// Create a transform with just a position
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec2, rotation: f32) -> Self {
        Self {
            position,
            rotation,
            scale: 1.0,
        }
    }

    /// Transform a point from local space to world space
    ///
    /// Applies scale, then rotation, then translation.
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        (p * self.scale).rotated(self.rotation) + self.position
    }

    /// Transform a direction (no translation)
    pub fn transform_direction(&self, d: Vec2) -> Vec2 {
        (d * self.scale).rotated(self.rotation)
    }

    /// Compose a child transform expressed in this transform's space
    ///
    /// The result maps child-local points straight to world space:
    /// `self.compose(&child).transform_point(p) == self.transform_point(child.transform_point(p))`.
    pub fn compose(&self, child: &Transform2D) -> Transform2D {
        Transform2D {
            position: self.transform_point(child.position),
            rotation: self.rotation + child.rotation,
            scale: self.scale * child.scale,
        }
    }
}
