//! Scene templates
//!
//! Serializable description of a scene, loaded from and saved to RON files.
//! Templates name their collision tags with strings; a [`TagPalette`] maps
//! those names to the shared [`CollisionTag`] instances the game code
//! registers with its [`SceneCollider`].
//!
//! Callbacks and behaviours are code, not data, so they are attached after
//! [`SceneTemplate::instantiate`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Serialize, Deserialize};
use silica_collision::CollisionTag;
use silica_math::{Circle, Polygon, Rectangle, Shape, Transform2D, Vec2};

use crate::collider::SceneCollider;
use crate::component::{CollisionComponent, RenderComponent};
use crate::entity::{Color, Entity};
use crate::scene::{EntityKey, Scene};

/// Named collision tags shared between templates and code
#[derive(Debug, Clone, Default)]
pub struct TagPalette {
    tags: HashMap<String, CollisionTag>,
}

impl TagPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the tag for `name`, creating it on first use
    pub fn define(&mut self, name: impl Into<String>) -> CollisionTag {
        *self.tags.entry(name.into()).or_insert_with(CollisionTag::new)
    }

    /// Bind `name` to an existing tag, returning the previous binding
    pub fn insert(&mut self, name: impl Into<String>, tag: CollisionTag) -> Option<CollisionTag> {
        self.tags.insert(name.into(), tag)
    }

    pub fn get(&self, name: &str) -> Option<CollisionTag> {
        self.tags.get(name).copied()
    }

    fn lookup(&self, name: &str) -> Result<CollisionTag, SceneLoadError> {
        self.get(name)
            .ok_or_else(|| SceneLoadError::UnknownTag(name.to_string()))
    }
}

/// Serializable collision shape, in the entity's local space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShapeTemplate {
    /// Axis-aligned rectangle centered on the origin
    Rectangle { width: f32, height: f32 },
    /// Circle centered on the origin
    Circle { radius: f32 },
    /// Convex polygon, either winding
    Polygon { vertices: Vec<[f32; 2]> },
}

impl ShapeTemplate {
    pub fn rectangle(width: f32, height: f32) -> Self {
        ShapeTemplate::Rectangle { width, height }
    }

    pub fn circle(radius: f32) -> Self {
        ShapeTemplate::Circle { radius }
    }

    /// Create the shape this template describes
    pub fn create_shape(&self) -> Result<Shape, SceneLoadError> {
        match self {
            ShapeTemplate::Rectangle { width, height } => Ok(Rectangle::new(*width, *height).into()),
            ShapeTemplate::Circle { radius } => Ok(Circle::new(*radius).into()),
            ShapeTemplate::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(SceneLoadError::InvalidShape(format!(
                        "polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    )));
                }
                let polygon = Polygon::new(vertices.iter().map(|&[x, y]| Vec2::new(x, y)).collect());
                if !polygon.is_convex() {
                    return Err(SceneLoadError::InvalidShape(
                        "polygon outline is not convex".to_string(),
                    ));
                }
                Ok(polygon.into())
            }
        }
    }
}

/// Collision component description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderTemplate {
    /// Tag name, resolved through a [`TagPalette`]
    pub tag: String,
    pub shape: ShapeTemplate,
}

/// Serializable entity description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    /// Optional name for this entity (for lookup)
    #[serde(default)]
    pub name: Option<String>,
    /// Transform relative to the parent, or to the world at the top level
    #[serde(default)]
    pub transform: Transform2D,
    #[serde(default)]
    pub collider: Option<ColliderTemplate>,
    /// Outline colour; entities without one are not drawn
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub children: Vec<EntityTemplate>,
}

impl EntityTemplate {
    /// Create an entity template at a position
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            name: None,
            transform: Transform2D::from_position(Vec2::new(x, y)),
            collider: None,
            color: None,
            children: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn with_collider(mut self, tag: impl Into<String>, shape: ShapeTemplate) -> Self {
        self.collider = Some(ColliderTemplate {
            tag: tag.into(),
            shape,
        });
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_child(mut self, child: EntityTemplate) -> Self {
        self.children.push(child);
        self
    }

    /// Convert this template (without its children) to an Entity
    pub fn to_entity(&self, palette: &TagPalette) -> Result<Entity, SceneLoadError> {
        let mut entity = Entity::new().with_transform(self.transform);
        if let Some(ref name) = self.name {
            entity = entity.with_name(name.clone());
        }
        if let Some(ref collider) = self.collider {
            let tag = palette.lookup(&collider.tag)?;
            entity.add_component(CollisionComponent::new(tag, collider.shape.create_shape()?));
        }
        if let Some(color) = self.color {
            entity.add_component(RenderComponent::new(color));
        }
        Ok(entity)
    }
}

/// A serializable scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTemplate {
    /// Scene name (for display/debugging)
    pub name: String,
    /// Top-level entity templates
    pub entities: Vec<EntityTemplate>,
    /// Tag-name pairs to register with the collider
    #[serde(default)]
    pub pairs: Vec<(String, String)>,
}

impl SceneTemplate {
    /// Create a new empty scene template
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            pairs: Vec::new(),
        }
    }

    /// Load a scene template from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SceneLoadError> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse a scene template from RON text
    pub fn from_ron_str(contents: &str) -> Result<Self, SceneLoadError> {
        Ok(ron::from_str(contents)?)
    }

    /// Serialize to pretty RON text
    pub fn to_ron_string(&self) -> Result<String, SceneSaveError> {
        let pretty = ron::ser::PrettyConfig::new()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Save a scene template to a RON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SceneSaveError> {
        fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    pub fn add_entity(&mut self, entity: EntityTemplate) {
        self.entities.push(entity);
    }

    /// Record a tag pair for [`register_pairs`](Self::register_pairs)
    pub fn with_pair(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.pairs.push((a.into(), b.into()));
        self
    }

    /// Build a scene from this template
    ///
    /// Fails on the first tag name missing from `palette`; no partial scene
    /// is returned.
    pub fn instantiate(&self, palette: &TagPalette) -> Result<Scene, SceneLoadError> {
        let mut scene = Scene::new();
        for template in &self.entities {
            spawn(&mut scene, None, template, palette)?;
        }
        Ok(scene)
    }

    /// Register this template's tag pairs with a collider
    pub fn register_pairs(&self, palette: &TagPalette, collider: &mut SceneCollider) -> Result<(), SceneLoadError> {
        for (a, b) in &self.pairs {
            collider.register(palette.lookup(a)?, palette.lookup(b)?);
        }
        Ok(())
    }
}

fn spawn(
    scene: &mut Scene,
    parent: Option<EntityKey>,
    template: &EntityTemplate,
    palette: &TagPalette,
) -> Result<EntityKey, SceneLoadError> {
    let entity = template.to_entity(palette)?;
    let key = match parent {
        Some(parent) => scene
            .add_child(parent, entity)
            .ok_or(SceneLoadError::MissingParent(parent))?,
        None => scene.add_entity(entity),
    };
    for child in &template.children {
        spawn(scene, Some(key), child, palette)?;
    }
    Ok(key)
}

/// Error loading or instantiating a scene template
#[derive(Debug)]
pub enum SceneLoadError {
    /// IO error (file not found, permission denied, etc.)
    Io(io::Error),
    /// Parse error (invalid RON syntax)
    Parse(ron::error::SpannedError),
    /// A collider names a tag missing from the palette
    UnknownTag(String),
    /// A shape that cannot be built
    InvalidShape(String),
    /// A child entity's parent is not in the scene
    MissingParent(EntityKey),
    /// A named entity the caller relies on is not in the scene
    MissingEntity(String),
}

impl From<io::Error> for SceneLoadError {
    fn from(e: io::Error) -> Self {
        SceneLoadError::Io(e)
    }
}

impl From<ron::error::SpannedError> for SceneLoadError {
    fn from(e: ron::error::SpannedError) -> Self {
        SceneLoadError::Parse(e)
    }
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::Io(e) => write!(f, "IO error: {}", e),
            SceneLoadError::Parse(e) => write!(f, "Parse error: {}", e),
            SceneLoadError::UnknownTag(name) => write!(f, "Unknown collision tag: {}", name),
            SceneLoadError::InvalidShape(reason) => write!(f, "Invalid shape: {}", reason),
            SceneLoadError::MissingEntity(name) => write!(f, "Missing entity: {}", name),
            SceneLoadError::MissingParent(key) => write!(f, "Missing parent entity: {:?}", key),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// Error saving a scene template
#[derive(Debug)]
pub enum SceneSaveError {
    /// IO error (permission denied, disk full, etc.)
    Io(io::Error),
    /// Serialization error
    Serialize(ron::Error),
}

impl From<io::Error> for SceneSaveError {
    fn from(e: io::Error) -> Self {
        SceneSaveError::Io(e)
    }
}

impl From<ron::Error> for SceneSaveError {
    fn from(e: ron::Error) -> Self {
        SceneSaveError::Serialize(e)
    }
}

impl std::fmt::Display for SceneSaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneSaveError::Io(e) => write!(f, "IO error: {}", e),
            SceneSaveError::Serialize(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for SceneSaveError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero_and_wall() -> SceneTemplate {
        let mut template = SceneTemplate::new("test").with_pair("hero", "wall");
        template.add_entity(
            EntityTemplate::at(0.0, 0.0)
                .with_name("hero")
                .with_collider("hero", ShapeTemplate::rectangle(48.0, 48.0))
                .with_color(Color::AQUA)
                .with_child(
                    EntityTemplate::at(60.0, 0.0)
                        .with_name("sub-hero")
                        .with_collider("hero", ShapeTemplate::circle(12.0)),
                ),
        );
        template.add_entity(
            EntityTemplate::at(200.0, 0.0)
                .with_name("wall")
                .with_collider("wall", ShapeTemplate::rectangle(48.0, 48.0))
                .with_color(Color::GREEN),
        );
        template
    }

    #[test]
    fn test_instantiate_builds_hierarchy() {
        let mut palette = TagPalette::new();
        let hero = palette.define("hero");
        let wall = palette.define("wall");

        let scene = hero_and_wall().instantiate(&palette).unwrap();
        assert_eq!(scene.len(), 3);

        let hero_key = scene.find_by_name("hero").unwrap();
        let sub_key = scene.find_by_name("sub-hero").unwrap();
        let wall_key = scene.find_by_name("wall").unwrap();

        assert_eq!(scene.parent(sub_key), Some(hero_key));
        assert_eq!(scene.get(sub_key).unwrap().collision().unwrap().tag, hero);
        assert_eq!(scene.get(wall_key).unwrap().collision().unwrap().tag, wall);
        assert_eq!(scene.get(wall_key).unwrap().render().unwrap().color, Color::GREEN);
        assert!(scene.get(sub_key).unwrap().render().is_none());
    }

    #[test]
    fn test_unknown_tag_fails() {
        let mut palette = TagPalette::new();
        palette.define("hero");

        match hero_and_wall().instantiate(&palette) {
            Err(SceneLoadError::UnknownTag(name)) => assert_eq!(name, "wall"),
            other => panic!("expected UnknownTag, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_register_pairs() {
        let mut palette = TagPalette::new();
        let hero = palette.define("hero");
        let wall = palette.define("wall");

        let mut collider = SceneCollider::default();
        hero_and_wall().register_pairs(&palette, &mut collider).unwrap();
        assert!(collider.is_registered(wall, hero));
    }

    #[test]
    fn test_palette_define_is_stable() {
        let mut palette = TagPalette::new();
        let first = palette.define("hero");
        assert_eq!(palette.define("hero"), first);
        assert_ne!(palette.define("wall"), first);

        let shared = CollisionTag::new();
        palette.insert("enemy", shared);
        assert_eq!(palette.get("enemy"), Some(shared));
        assert_eq!(palette.get("missing"), None);
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let shape = ShapeTemplate::Polygon {
            vertices: vec![[0.0, 0.0], [1.0, 0.0]],
        };
        assert!(matches!(shape.create_shape(), Err(SceneLoadError::InvalidShape(_))));

        let triangle = ShapeTemplate::Polygon {
            vertices: vec![[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]],
        };
        assert!(matches!(triangle.create_shape(), Ok(Shape::Polygon(_))));
    }

    #[test]
    fn test_concave_polygon_rejected() {
        let notched = ShapeTemplate::Polygon {
            vertices: vec![[0.0, 0.0], [2.0, 0.0], [1.0, 1.0], [2.0, 2.0], [0.0, 2.0]],
        };
        match notched.create_shape() {
            Err(SceneLoadError::InvalidShape(reason)) => assert!(reason.contains("convex")),
            other => panic!("expected InvalidShape, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_child_under_missing_parent() {
        let palette = TagPalette::new();
        let mut scene = Scene::new();
        let parent = scene.add_entity(Entity::new());
        scene.remove_entity(parent);

        let child = EntityTemplate::at(1.0, 0.0).with_name("orphan");
        match spawn(&mut scene, Some(parent), &child, &palette) {
            Err(SceneLoadError::MissingParent(key)) => assert_eq!(key, parent),
            other => panic!("expected MissingParent, got {:?}", other),
        }
        assert!(scene.is_empty());
    }

    #[test]
    fn test_ron_text_survives_save() {
        let template = hero_and_wall();
        let text = template.to_ron_string().unwrap();
        assert!(text.contains("SceneTemplate"));
        assert_eq!(SceneTemplate::from_ron_str(&text).unwrap(), template);
    }

    #[test]
    fn test_parse_handwritten_ron() {
        let ron = r#"
            SceneTemplate(
                name: "walls",
                entities: [
                    (
                        name: Some("wall"),
                        transform: (position: (x: 24.0, y: 24.0), rotation: 0.0, scale: 1.0),
                        collider: Some((tag: "wall", shape: (type: "Rectangle", width: 48.0, height: 48.0))),
                    ),
                ],
            )
        "#;
        let template = SceneTemplate::from_ron_str(ron).unwrap();
        assert!(template.pairs.is_empty());
        assert!(template.entities[0].children.is_empty());

        let mut palette = TagPalette::new();
        palette.define("wall");
        let scene = template.instantiate(&palette).unwrap();
        let wall = scene.find_by_name("wall").unwrap();
        assert_eq!(scene.collision_bounds(wall).unwrap().min, Vec2::ZERO);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SceneTemplate::from_ron_str("SceneTemplate(name: 3)"),
            Err(SceneLoadError::Parse(_))
        ));
    }
}
