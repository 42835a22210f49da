//! Hero-and-walls demo scene
//!
//! A ring of square walls around an open field, with a spinning hero that
//! bounces around the field dragging a spinning sub-hero at arm's length.
//! Hero and sub-hero carry separate tags, each registered against the walls.
//! Anything touching something else is drawn in a highlight colour for
//! that frame.

use silica_core::{
    Behaviour, Color, CollisionTag, EntityKey, EntityTemplate, Scene, SceneCollider,
    SceneLoadError, SceneTemplate, ShapeTemplate, TagPalette, TreeConfig, Vec2,
};

use crate::config::DemoConfig;

const HERO_COLOR: Color = Color::AQUA;
const SUB_HERO_COLOR: Color = Color::WHITE;
const WALL_COLOR: Color = Color::GREEN;
const HIT_COLOR: Color = Color::YELLOW_GREEN;

/// Sub-hero spin relative to the hero, in radians per second
const SUB_HERO_SPIN: f32 = std::f32::consts::FRAC_PI_4;

/// A populated demo scene with its collider
pub struct DemoScene {
    pub scene: Scene,
    pub collider: SceneCollider,
    pub hero: EntityKey,
    pub sub_hero: EntityKey,
    pub hero_tag: CollisionTag,
    pub sub_hero_tag: CollisionTag,
    pub wall_tag: CollisionTag,
}

/// Builder for the hero-and-walls scene
///
/// # Example
/// ```ignore
/// let demo = SceneBuilder::new(&config.demo)
///     .with_tree_config(TreeConfig::from(&config.collision))
///     .build()?;
/// ```
pub struct SceneBuilder {
    config: DemoConfig,
    tree_config: TreeConfig,
}

impl SceneBuilder {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            config: config.clone(),
            tree_config: TreeConfig::default(),
        }
    }

    pub fn with_tree_config(mut self, tree_config: TreeConfig) -> Self {
        self.tree_config = tree_config;
        self
    }

    /// Size of the walled field in world units
    pub fn field_size(&self) -> Vec2 {
        Vec2::new(
            self.config.columns as f32 * self.config.cell_size,
            self.config.rows as f32 * self.config.cell_size,
        )
    }

    /// Scene description without behaviours or callbacks
    pub fn template(&self) -> SceneTemplate {
        let cell = self.config.cell_size;
        let columns = self.config.columns.max(2);
        let rows = self.config.rows.max(2);
        let size = self.field_size();

        let mut template = SceneTemplate::new("hero_walls")
            .with_pair("hero", "wall")
            .with_pair("sub_hero", "wall");
        let wall = |x: f32, y: f32| {
            EntityTemplate::at(x, y)
                .with_collider("wall", ShapeTemplate::rectangle(cell, cell))
                .with_color(WALL_COLOR)
        };

        for i in 0..columns {
            let x = (i as f32 + 0.5) * cell;
            template.add_entity(wall(x, 0.5 * cell));
            template.add_entity(wall(x, size.y - 0.5 * cell));
        }
        for j in 1..rows - 1 {
            let y = (j as f32 + 0.5) * cell;
            template.add_entity(wall(0.5 * cell, y));
            template.add_entity(wall(size.x - 0.5 * cell, y));
        }

        template.add_entity(
            EntityTemplate::at(size.x * 0.5, size.y * 0.5)
                .with_name("hero")
                .with_collider("hero", ShapeTemplate::rectangle(cell, cell))
                .with_color(HERO_COLOR)
                .with_child(
                    EntityTemplate::at(cell * 2.0, cell * 0.5)
                        .with_name("sub_hero")
                        .with_collider("sub_hero", ShapeTemplate::rectangle(cell, cell))
                        .with_color(SUB_HERO_COLOR),
                ),
        );
        template
    }

    /// Instantiate the scene and attach its behaviours and callbacks
    pub fn build(self) -> Result<DemoScene, SceneLoadError> {
        let template = self.template();
        let mut palette = TagPalette::new();
        let hero_tag = palette.define("hero");
        let sub_hero_tag = palette.define("sub_hero");
        let wall_tag = palette.define("wall");

        let mut scene = template.instantiate(&palette)?;
        let mut collider = SceneCollider::with_config(self.tree_config);
        template.register_pairs(&palette, &mut collider)?;

        let hero = scene
            .find_by_name("hero")
            .ok_or_else(|| SceneLoadError::MissingEntity("hero".to_string()))?;
        let sub_hero = scene
            .find_by_name("sub_hero")
            .ok_or_else(|| SceneLoadError::MissingEntity("sub_hero".to_string()))?;

        let bases: Vec<(EntityKey, Color)> = scene
            .iter()
            .map(|(key, entity)| (key, entity.render().map(|r| r.color).unwrap_or_default()))
            .collect();
        for (key, base) in bases {
            let behaviour = if key == hero {
                self.hero_behaviour(base)
            } else if key == sub_hero {
                spin_and_reset(SUB_HERO_SPIN, base)
            } else {
                reset_color(base)
            };
            if scene.add_component(key, behaviour).is_err() {
                continue;
            }

            if let Some(collision) = scene.get_mut(key).and_then(|e| e.collision_mut()) {
                collision.set_callback(|entity, _| {
                    if let Some(render) = entity.render_mut() {
                        render.color = HIT_COLOR;
                    }
                    Ok(())
                });
            }
        }

        log::info!(
            "Built demo scene: {} entities, field {:.0}x{:.0}",
            scene.len(),
            self.field_size().x,
            self.field_size().y
        );

        Ok(DemoScene {
            scene,
            collider,
            hero,
            sub_hero,
            hero_tag,
            sub_hero_tag,
            wall_tag,
        })
    }

    /// Bounce around the inside of the ring while spinning
    fn hero_behaviour(&self, base: Color) -> Behaviour {
        let cell = self.config.cell_size;
        let size = self.field_size();
        let spin = self.config.hero_spin;
        // Keep the hero's center far enough in that it grazes the walls
        let min = Vec2::splat(cell);
        let max = size - Vec2::splat(cell);
        let mut velocity = Vec2::new(1.0, 0.6).normalized() * self.config.hero_speed;

        Behaviour::new(move |entity, dt| {
            let transform = &mut entity.transform;
            transform.position += velocity * dt;
            transform.rotation += spin * dt;

            if transform.position.x < min.x || transform.position.x > max.x {
                velocity.x = -velocity.x;
                transform.position.x = transform.position.x.clamp(min.x, max.x);
            }
            if transform.position.y < min.y || transform.position.y > max.y {
                velocity.y = -velocity.y;
                transform.position.y = transform.position.y.clamp(min.y, max.y);
            }

            if let Some(render) = entity.render_mut() {
                render.color = base;
            }
        })
    }
}

/// Spin in place and restore the base colour
fn spin_and_reset(spin: f32, base: Color) -> Behaviour {
    Behaviour::new(move |entity, dt| {
        entity.transform.rotation += spin * dt;
        if let Some(render) = entity.render_mut() {
            render.color = base;
        }
    })
}

/// Restore the base colour at the start of each frame
fn reset_color(base: Color) -> Behaviour {
    Behaviour::new(move |entity, _| {
        if let Some(render) = entity.render_mut() {
            render.color = base;
        }
    })
}
