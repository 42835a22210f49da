//! Convex collision shapes and the separating-axis narrowphase
//!
//! Shapes are stored in local space. Every query takes the world
//! [`Transform2D`] of the owning entity, so a shape never has to be rebuilt
//! when its entity moves.

use crate::{Aabb, Transform2D, Vec2};

/// A convex polygon in local space
///
/// Vertices must describe a convex outline with at least three points.
/// Winding order does not matter.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<Vec2>,
}

impl Polygon {
    /// Create a polygon from its local-space vertices
    pub fn new(vertices: Vec<Vec2>) -> Self {
        debug_assert!(vertices.len() >= 3, "polygon needs at least three vertices");
        Self { vertices }
    }

    /// Local-space vertices
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Vertices mapped through `transform` into world space
    pub fn world_vertices(&self, transform: &Transform2D) -> Vec<Vec2> {
        self.vertices.iter().map(|v| transform.transform_point(*v)).collect()
    }

    /// Whether the outline is convex and simple, in either winding
    ///
    /// Every corner must turn the same way and the turns must add up to one
    /// full revolution, which rejects self-intersecting stars.
    pub fn is_convex(&self) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }

        let mut sign = 0.0_f32;
        let mut turning = 0.0_f32;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let c = self.vertices[(i + 2) % n];
            let (incoming, outgoing) = (b - a, c - b);
            let cross = incoming.cross(outgoing);
            if cross != 0.0 {
                if sign * cross < 0.0 {
                    return false;
                }
                sign = cross;
            }
            turning += cross.atan2(incoming.dot(outgoing));
        }
        sign != 0.0 && (turning.abs() - std::f32::consts::TAU).abs() < 1.0e-3
    }
}

/// A circle in local space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    /// Offset of the center from the entity origin
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    /// Create a circle centered on the entity origin
    pub fn new(radius: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            radius,
        }
    }
}

/// Width/height rectangle, used as a polygon factory
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Build a polygon for this rectangle centered on the local origin
    pub fn create_polygon(&self) -> Polygon {
        let hw = self.width * 0.5;
        let hh = self.height * 0.5;
        Polygon::new(vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ])
    }
}

/// Collision shape attached to an entity
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Polygon(Polygon),
    Circle(Circle),
}

impl From<Polygon> for Shape {
    fn from(polygon: Polygon) -> Self {
        Shape::Polygon(polygon)
    }
}

impl From<Circle> for Shape {
    fn from(circle: Circle) -> Self {
        Shape::Circle(circle)
    }
}

impl From<Rectangle> for Shape {
    fn from(rect: Rectangle) -> Self {
        Shape::Polygon(rect.create_polygon())
    }
}

impl Shape {
    /// World-space bounding box of the shape under `transform`
    ///
    /// Rotated polygons are bounded by their transformed vertices, so the box
    /// is tight for every orientation.
    pub fn aabb(&self, transform: &Transform2D) -> Aabb {
        match self {
            Shape::Polygon(polygon) => {
                let points = polygon.vertices.iter().map(|v| transform.transform_point(*v));
                Aabb::from_points(points)
                    .unwrap_or_else(|| Aabb::new(transform.position, transform.position))
            }
            Shape::Circle(circle) => {
                let center = transform.transform_point(circle.center);
                let r = circle.radius * transform.scale.abs();
                Aabb::from_center_half_extents(center, Vec2::splat(r))
            }
        }
    }

    /// Exact intersection test between two placed shapes
    ///
    /// Touching boundaries count as an intersection.
    pub fn intersects(&self, transform: &Transform2D, other: &Shape, other_transform: &Transform2D) -> bool {
        match (self, other) {
            (Shape::Polygon(a), Shape::Polygon(b)) => {
                polygon_vs_polygon(&a.world_vertices(transform), &b.world_vertices(other_transform))
            }
            (Shape::Circle(a), Shape::Circle(b)) => {
                let (ca, ra) = world_circle(a, transform);
                let (cb, rb) = world_circle(b, other_transform);
                let reach = ra + rb;
                (cb - ca).length_squared() <= reach * reach
            }
            (Shape::Polygon(p), Shape::Circle(c)) => {
                let (center, radius) = world_circle(c, other_transform);
                polygon_vs_circle(&p.world_vertices(transform), center, radius)
            }
            (Shape::Circle(c), Shape::Polygon(p)) => {
                let (center, radius) = world_circle(c, transform);
                polygon_vs_circle(&p.world_vertices(other_transform), center, radius)
            }
        }
    }
}

fn world_circle(circle: &Circle, transform: &Transform2D) -> (Vec2, f32) {
    (transform.transform_point(circle.center), circle.radius * transform.scale.abs())
}

/// Project points onto `axis`, returning (min, max)
fn project(points: &[Vec2], axis: Vec2) -> (f32, f32) {
    points.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    })
}

fn edge_normals(points: &[Vec2]) -> impl Iterator<Item = Vec2> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[(i + 1) % n] - points[i]).perp())
}

fn separated(a: (f32, f32), b: (f32, f32)) -> bool {
    a.1 < b.0 || b.1 < a.0
}

fn polygon_vs_polygon(a: &[Vec2], b: &[Vec2]) -> bool {
    edge_normals(a)
        .chain(edge_normals(b))
        .filter(|axis| axis.length_squared() > 0.0)
        .all(|axis| !separated(project(a, axis), project(b, axis)))
}

fn polygon_vs_circle(poly: &[Vec2], center: Vec2, radius: f32) -> bool {
    let closest = poly
        .iter()
        .copied()
        .min_by(|x, y| {
            (*x - center)
                .length_squared()
                .total_cmp(&(*y - center).length_squared())
        });
    let Some(closest) = closest else {
        return false;
    };

    let vertex_axis = closest - center;
    if vertex_axis.length_squared() == 0.0 {
        // Circle center sits on a vertex
        return true;
    }

    edge_normals(poly)
        .chain(std::iter::once(vertex_axis))
        .filter(|axis| axis.length_squared() > 0.0)
        .all(|axis| {
            let axis = axis.normalized();
            let c = center.dot(axis);
            !separated(project(poly, axis), (c - radius, c + radius))
        })
}
