//! Per-frame scene collision checking
//!
//! [`SceneCollider`] keeps a [`DynamicTree`] in step with the collision
//! components of one [`Scene`] and dispatches callbacks for registered tag
//! pairs whose shapes actually touch. Each call to
//! [`check_collisions`](SceneCollider::check_collisions) runs four phases:
//!
//! 1. Sync: insert, refit or remove one tree proxy per collision entity
//! 2. Broadphase: walk the tree's overlapping pairs, dropping pairs whose
//!    tag combination was never registered
//! 3. Narrowphase: exact shape tests on the remaining pairs
//! 4. Dispatch: run both entities' callbacks for each contact

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, trace, warn};
use silica_collision::{CollisionTag, DynamicTree, TagPairs, TreeConfig, TreeError};
use silica_math::{Aabb, Transform2D};
use slotmap::SecondaryMap;

use crate::component::CollisionEvent;
use crate::scene::{EntityKey, Scene, SceneId};

/// Counters for one collision check
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionStats {
    /// Proxies tracked by the tree after sync
    pub proxies: usize,
    /// Proxies added this frame
    pub inserted: usize,
    /// Proxies dropped because their entity or component went away
    pub removed: usize,
    /// Proxies that left their fattened box and were re-inserted
    pub reinserted: usize,
    /// Overlapping fat-box pairs reported by the tree
    pub candidate_pairs: usize,
    /// Candidate pairs skipped because their tags are not registered
    pub filtered_pairs: usize,
    /// Exact shape tests performed
    pub narrowphase_tests: usize,
    /// Pairs whose shapes intersect
    pub contacts: usize,
    /// Callbacks invoked
    pub callbacks: usize,
    /// Callbacks that returned an error or panicked
    pub callback_failures: usize,
    /// Box-overlap tests performed by the pair walk
    pub overlap_tests: usize,
}

/// Error from a collision check
#[derive(Debug)]
pub enum ColliderError {
    /// The tree rejected a proxy operation for an entity
    Tree { entity: EntityKey, source: TreeError },
    /// The collider is bound to a different scene
    SceneMismatch { bound: SceneId, given: SceneId },
}

impl fmt::Display for ColliderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColliderError::Tree { entity, source } => {
                write!(f, "Tree error for entity {:?}: {}", entity, source)
            }
            ColliderError::SceneMismatch { bound, given } => {
                write!(f, "Collider is bound to {} but was given {}", bound, given)
            }
        }
    }
}

impl std::error::Error for ColliderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ColliderError::Tree { source, .. } => Some(source),
            ColliderError::SceneMismatch { .. } => None,
        }
    }
}

/// Where a collision entity sits this frame
#[derive(Clone, Copy, Debug)]
struct Placed {
    tag: CollisionTag,
    world: Transform2D,
    bounds: Aabb,
}

/// Collision context for one scene
///
/// Owns the broadphase tree and the registered tag pairs. The tree holds
/// [`EntityKey`]s only; entities stay in the scene.
#[derive(Debug)]
pub struct SceneCollider {
    tree: DynamicTree<EntityKey>,
    pairs: TagPairs,
    scene: Option<SceneId>,
    last_stats: CollisionStats,
}

impl Default for SceneCollider {
    fn default() -> Self {
        Self::new(DynamicTree::new())
    }
}

impl SceneCollider {
    /// Create a collider around an existing tree
    pub fn new(tree: DynamicTree<EntityKey>) -> Self {
        Self {
            tree,
            pairs: TagPairs::new(),
            scene: None,
            last_stats: CollisionStats::default(),
        }
    }

    /// Create a collider with an empty tree using `config`
    pub fn with_config(config: TreeConfig) -> Self {
        Self::new(DynamicTree::with_config(config))
    }

    /// Bind to `scene`, dropping every proxy tracked for a previous scene
    pub fn set_scene(&mut self, scene: &Scene) {
        if self.scene != Some(scene.id()) {
            debug!("Collider bound to {}", scene.id());
        }
        self.scene = Some(scene.id());
        self.tree.clear();
        self.last_stats = CollisionStats::default();
    }

    /// Scene this collider is bound to, if any
    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    /// Enable collision checks between two tags
    ///
    /// Order does not matter. Returns false if the pair was already registered.
    pub fn register(&mut self, a: CollisionTag, b: CollisionTag) -> bool {
        self.pairs.register(a, b)
    }

    /// Disable collision checks between two tags
    pub fn unregister(&mut self, a: CollisionTag, b: CollisionTag) -> bool {
        self.pairs.unregister(a, b)
    }

    pub fn is_registered(&self, a: CollisionTag, b: CollisionTag) -> bool {
        self.pairs.is_registered(a, b)
    }

    /// The broadphase tree
    pub fn tree(&self) -> &DynamicTree<EntityKey> {
        &self.tree
    }

    /// Counters from the most recent successful check
    pub fn last_stats(&self) -> &CollisionStats {
        &self.last_stats
    }

    /// Run one frame of collision checking over `scene`
    ///
    /// Binds the collider to `scene` on first use. Callback errors and panics
    /// are logged and counted; they never stop dispatch of the remaining
    /// contacts.
    pub fn check_collisions(&mut self, scene: &mut Scene) -> Result<CollisionStats, ColliderError> {
        let bound = self.scene;
        match bound {
            None => self.set_scene(scene),
            Some(bound) if bound != scene.id() => {
                return Err(ColliderError::SceneMismatch {
                    bound,
                    given: scene.id(),
                });
            }
            Some(_) => {}
        }

        let mut stats = CollisionStats::default();
        let placed = self.sync(scene, &mut stats)?;

        let mut candidates = Vec::new();
        let mut walk = self.tree.query_pairs();
        for (a, b) in walk.by_ref() {
            stats.candidate_pairs += 1;
            let (Some(pa), Some(pb)) = (placed.get(a), placed.get(b)) else {
                continue;
            };
            if !self.pairs.is_registered(pa.tag, pb.tag) {
                stats.filtered_pairs += 1;
                continue;
            }
            candidates.push((a, b));
        }
        stats.overlap_tests = walk.overlap_tests();

        let mut contacts = Vec::new();
        for (a, b) in candidates {
            let (Some(ca), Some(cb)) = (
                scene.get(a).and_then(|e| e.collision()),
                scene.get(b).and_then(|e| e.collision()),
            ) else {
                continue;
            };
            stats.narrowphase_tests += 1;
            if ca.shape.intersects(&placed[a].world, &cb.shape, &placed[b].world) {
                contacts.push((a, b));
            }
        }
        stats.contacts = contacts.len();

        for (a, b) in contacts {
            dispatch(scene, a, b, &placed[b], &mut stats);
            dispatch(scene, b, a, &placed[a], &mut stats);
        }

        trace!(
            "Collision check: {} proxies, {} candidates ({} filtered), {} contacts, {} overlap tests",
            stats.proxies,
            stats.candidate_pairs,
            stats.filtered_pairs,
            stats.contacts,
            stats.overlap_tests
        );
        self.last_stats = stats;
        Ok(stats)
    }

    /// Bring the tree in line with the scene's collision entities
    fn sync(
        &mut self,
        scene: &mut Scene,
        stats: &mut CollisionStats,
    ) -> Result<SecondaryMap<EntityKey, Placed>, ColliderError> {
        // Components attached through `Entity::add_component` after the entity
        // entered the scene missed their attach hook
        let unowned: Vec<EntityKey> = scene
            .iter()
            .filter(|(key, entity)| entity.collision().is_some_and(|c| c.owner() != Some(*key)))
            .map(|(key, _)| key)
            .collect();
        for key in unowned {
            if let Some(collision) = scene.get_mut(key).and_then(|e| e.collision_mut()) {
                debug!("Collision component on {:?} attached outside the scene, running its init", key);
                collision.init(key);
            }
        }

        let mut placed = SecondaryMap::new();
        for (key, entity) in scene.iter() {
            let Some(collision) = entity.collision() else {
                continue;
            };
            let Some(world) = scene.world_transform(key) else {
                continue;
            };
            placed.insert(
                key,
                Placed {
                    tag: collision.tag,
                    world,
                    bounds: collision.bounding_box(&world),
                },
            );
        }

        let stale: Vec<EntityKey> = self.tree.items().filter(|key| !placed.contains_key(*key)).collect();
        for key in stale {
            self.tree
                .remove(key)
                .map_err(|source| ColliderError::Tree { entity: key, source })?;
            debug!("Removed collision proxy for {:?}", key);
            stats.removed += 1;
        }

        for (key, place) in &placed {
            if self.tree.contains(key) {
                let moved = self
                    .tree
                    .update(key, place.bounds)
                    .map_err(|source| ColliderError::Tree { entity: key, source })?;
                if moved {
                    stats.reinserted += 1;
                }
            } else {
                self.tree
                    .insert(key, place.bounds)
                    .map_err(|source| ColliderError::Tree { entity: key, source })?;
                debug!("Inserted collision proxy for {:?}", key);
                stats.inserted += 1;
            }
        }

        stats.proxies = self.tree.len();
        Ok(placed)
    }
}

/// Run `key`'s callback for a contact with `other`
///
/// The callback is taken out of its component for the call so it can borrow
/// the entity mutably. A panic inside it is caught and counted like a
/// returned error, and the callback goes back on its component either way.
fn dispatch(scene: &mut Scene, key: EntityKey, other: EntityKey, other_place: &Placed, stats: &mut CollisionStats) {
    let Some(entity) = scene.get_mut(key) else {
        return;
    };
    let Some(mut callback) = entity.collision_mut().and_then(|c| c.take_callback()) else {
        return;
    };

    let event = CollisionEvent {
        other,
        other_tag: other_place.tag,
        other_bounds: other_place.bounds,
    };
    stats.callbacks += 1;
    match catch_unwind(AssertUnwindSafe(|| callback(entity, &event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            stats.callback_failures += 1;
            warn!("Collision callback for {:?} (against {:?}) failed: {}", key, other, e);
        }
        Err(payload) => {
            stats.callback_failures += 1;
            warn!(
                "Collision callback for {:?} (against {:?}) panicked: {}",
                key,
                other,
                panic_message(payload.as_ref())
            );
        }
    }

    if let Some(collision) = entity.collision_mut() {
        collision.restore_callback(callback);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{CollisionComponent, ComponentKind, RenderComponent};
    use crate::entity::{Color, Entity};
    use silica_math::{Circle, Rectangle, Vec2};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn block(tag: CollisionTag, x: f32, y: f32) -> Entity {
        Entity::at(Vec2::new(x, y)).with_component(CollisionComponent::new(tag, Rectangle::new(48.0, 48.0)))
    }

    fn counting_block(tag: CollisionTag, x: f32, y: f32, hits: &Rc<Cell<usize>>) -> Entity {
        let hits = Rc::clone(hits);
        Entity::at(Vec2::new(x, y)).with_component(CollisionComponent::with_callback(
            tag,
            Rectangle::new(48.0, 48.0),
            move |_, _| {
                hits.set(hits.get() + 1);
                Ok(())
            },
        ))
    }

    #[test]
    fn test_unregistered_pairs_skip_narrowphase() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let hits = Rc::new(Cell::new(0));
        let mut scene = Scene::new();
        scene.add_entity(counting_block(hero, 0.0, 0.0, &hits));
        scene.add_entity(counting_block(wall, 10.0, 0.0, &hits));

        let mut collider = SceneCollider::default();
        let stats = collider.check_collisions(&mut scene).unwrap();

        assert_eq!(stats.candidate_pairs, 1);
        assert_eq!(stats.filtered_pairs, 1);
        assert_eq!(stats.narrowphase_tests, 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_registration_is_symmetric_and_idempotent() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let hits = Rc::new(Cell::new(0));
        let mut scene = Scene::new();
        scene.add_entity(counting_block(hero, 0.0, 0.0, &hits));
        scene.add_entity(counting_block(wall, 10.0, 0.0, &hits));

        let mut collider = SceneCollider::default();
        assert!(collider.register(wall, hero));
        assert!(!collider.register(hero, wall));
        assert!(collider.is_registered(hero, wall));

        let stats = collider.check_collisions(&mut scene).unwrap();
        assert_eq!(stats.contacts, 1);
        assert_eq!(stats.callbacks, 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_failing_callback_does_not_suppress_others() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let hits = Rc::new(Cell::new(0));
        let failures = Rc::new(Cell::new(0));

        let mut scene = Scene::new();
        scene.add_entity(block(hero, 0.0, 0.0));
        let failing = Rc::clone(&failures);
        scene.add_entity(Entity::at(Vec2::new(-40.0, 0.0)).with_component(CollisionComponent::with_callback(
            wall,
            Rectangle::new(48.0, 48.0),
            move |_, _| {
                failing.set(failing.get() + 1);
                Err("wall reaction failed".into())
            },
        )));
        scene.add_entity(counting_block(wall, 40.0, 0.0, &hits));

        let mut collider = SceneCollider::default();
        collider.register(hero, wall);
        let stats = collider.check_collisions(&mut scene).unwrap();

        assert_eq!(stats.contacts, 2);
        assert_eq!(failures.get(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(stats.callbacks, 2);
        assert_eq!(stats.callback_failures, 1);

        // The failing callback stays attached for the next frame
        collider.check_collisions(&mut scene).unwrap();
        assert_eq!(failures.get(), 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_panicking_callback_is_isolated_and_kept() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let hits = Rc::new(Cell::new(0));
        let calls = Rc::new(Cell::new(0));

        let mut scene = Scene::new();
        scene.add_entity(block(hero, 0.0, 0.0));
        let counter = Rc::clone(&calls);
        let panicking = scene.add_entity(Entity::at(Vec2::new(-40.0, 0.0)).with_component(
            CollisionComponent::with_callback(wall, Rectangle::new(48.0, 48.0), move |_, _| {
                counter.set(counter.get() + 1);
                panic!("wall reaction blew up");
            }),
        ));
        scene.add_entity(counting_block(wall, 40.0, 0.0, &hits));

        let mut collider = SceneCollider::default();
        collider.register(hero, wall);
        let stats = collider.check_collisions(&mut scene).unwrap();

        assert_eq!(stats.contacts, 2);
        assert_eq!((stats.callbacks, stats.callback_failures), (2, 1));
        assert_eq!((calls.get(), hits.get()), (1, 1));
        assert!(scene.get(panicking).unwrap().collision().unwrap().has_callback());

        collider.check_collisions(&mut scene).unwrap();
        assert_eq!((calls.get(), hits.get()), (2, 2));
    }

    #[test]
    fn test_callback_recolours_own_entity() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let mut scene = Scene::new();
        let hero_key = scene.add_entity(
            block(hero, 0.0, 0.0)
                .with_component(RenderComponent::new(Color::AQUA)),
        );
        if let Some(collision) = scene.get_mut(hero_key).and_then(|e| e.collision_mut()) {
            collision.set_callback(move |entity, event| {
                assert_eq!(event.other_tag, wall);
                if let Some(render) = entity.render_mut() {
                    render.color = Color::YELLOW_GREEN;
                }
                Ok(())
            });
        }
        let wall_key = scene.add_entity(block(wall, 30.0, 30.0));

        let mut collider = SceneCollider::default();
        collider.register(hero, wall);
        collider.check_collisions(&mut scene).unwrap();

        assert_eq!(scene.get(hero_key).unwrap().render().unwrap().color, Color::YELLOW_GREEN);
        assert_eq!(scene.collision_bounds(wall_key), Some(Aabb::new(Vec2::new(6.0, 6.0), Vec2::new(54.0, 54.0))));
    }

    #[test]
    fn test_event_reports_other_party() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut scene = Scene::new();
        let log = Rc::clone(&seen);
        scene.add_entity(Entity::new().with_component(CollisionComponent::with_callback(
            hero,
            Circle::new(10.0),
            move |_, event| {
                log.borrow_mut().push(*event);
                Ok(())
            },
        )));
        let wall_key = scene.add_entity(block(wall, 30.0, 0.0));

        let mut collider = SceneCollider::default();
        collider.register(hero, wall);
        collider.check_collisions(&mut scene).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].other, wall_key);
        assert_eq!(seen[0].other_tag, wall);
        assert_eq!(Some(seen[0].other_bounds), scene.collision_bounds(wall_key));
    }

    #[test]
    fn test_touching_edges_collide() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let mut scene = Scene::new();
        scene.add_entity(block(hero, 0.0, 0.0));
        scene.add_entity(block(wall, 48.0, 0.0));
        scene.add_entity(block(wall, 49.0, 100.0));

        let mut collider = SceneCollider::default();
        collider.register(hero, wall);
        assert_eq!(collider.check_collisions(&mut scene).unwrap().contacts, 1);
    }

    #[test]
    fn test_fat_overlap_without_contact() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let mut scene = Scene::new();
        scene.add_entity(block(hero, 0.0, 0.0));
        scene.add_entity(block(wall, 50.0, 0.0));

        let mut collider = SceneCollider::default();
        collider.register(hero, wall);
        let stats = collider.check_collisions(&mut scene).unwrap();

        assert_eq!(stats.candidate_pairs, 1);
        assert_eq!(stats.narrowphase_tests, 1);
        assert_eq!(stats.contacts, 0);
    }

    #[test]
    fn test_proxies_follow_scene_lifecycle() {
        let tag = CollisionTag::new();
        let mut scene = Scene::new();
        let a = scene.add_entity(block(tag, 0.0, 0.0));
        let b = scene.add_entity(block(tag, 100.0, 0.0));
        scene.add_entity(Entity::new().with_component(RenderComponent::default()));

        let mut collider = SceneCollider::default();
        let stats = collider.check_collisions(&mut scene).unwrap();
        assert_eq!((stats.proxies, stats.inserted), (2, 2));

        scene.remove_entity(a);
        scene.get_mut(b).unwrap().remove_component(ComponentKind::Collision);
        let stats = collider.check_collisions(&mut scene).unwrap();
        assert_eq!((stats.proxies, stats.removed), (0, 2));
        assert!(collider.tree().is_empty());
        assert_eq!(collider.last_stats(), &stats);
    }

    #[test]
    fn test_late_attached_components_collide_and_know_their_owner() {
        let tag = CollisionTag::new();
        let mut scene = Scene::new();
        let a = scene.add_entity(Entity::at(Vec2::new(0.0, 0.0)));
        let b = scene.add_entity(Entity::at(Vec2::new(10.0, 0.0)));

        let mut collider = SceneCollider::default();
        collider.register(tag, tag);
        assert_eq!(collider.check_collisions(&mut scene).unwrap().proxies, 0);

        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        scene
            .add_component(
                a,
                CollisionComponent::with_callback(tag, Rectangle::new(48.0, 48.0), move |_, _| {
                    counter.set(counter.get() + 1);
                    Ok(())
                }),
            )
            .unwrap();
        scene
            .get_mut(b)
            .unwrap()
            .add_component(CollisionComponent::new(tag, Rectangle::new(48.0, 48.0)));
        assert_eq!(scene.get(b).unwrap().collision().unwrap().owner(), None);

        let stats = collider.check_collisions(&mut scene).unwrap();
        assert_eq!((stats.inserted, stats.contacts), (2, 1));
        assert_eq!(hits.get(), 1);
        assert_eq!(scene.get(a).unwrap().collision().unwrap().owner(), Some(a));
        assert_eq!(scene.get(b).unwrap().collision().unwrap().owner(), Some(b));
    }

    #[test]
    fn test_small_moves_stay_in_fat_box() {
        let tag = CollisionTag::new();
        let mut scene = Scene::new();
        let key = scene.add_entity(block(tag, 0.0, 0.0));

        let mut collider = SceneCollider::default();
        collider.check_collisions(&mut scene).unwrap();

        scene.get_mut(key).unwrap().transform.position.x += 1.0;
        assert_eq!(collider.check_collisions(&mut scene).unwrap().reinserted, 0);

        scene.get_mut(key).unwrap().transform.position.x += 20.0;
        assert_eq!(collider.check_collisions(&mut scene).unwrap().reinserted, 1);
        collider.tree().validate().unwrap();
    }

    #[test]
    fn test_child_collides_at_world_position() {
        let (hero, wall) = (CollisionTag::new(), CollisionTag::new());
        let hits = Rc::new(Cell::new(0));
        let mut scene = Scene::new();
        let parent = scene.add_entity(Entity::at(Vec2::new(200.0, 0.0)));
        scene.add_child(parent, counting_block(hero, 0.0, 100.0, &hits)).unwrap();
        scene.add_entity(block(wall, 200.0, 100.0));
        scene.add_entity(block(wall, 0.0, 100.0));

        let mut collider = SceneCollider::default();
        collider.register(hero, wall);
        collider.check_collisions(&mut scene).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_scene_binding() {
        let mut first = Scene::new();
        let mut second = Scene::new();
        let tag = CollisionTag::new();
        first.add_entity(block(tag, 0.0, 0.0));
        second.add_entity(block(tag, 0.0, 0.0));
        second.add_entity(block(tag, 0.0, 0.0));

        let mut collider = SceneCollider::default();
        collider.check_collisions(&mut first).unwrap();
        assert_eq!(collider.scene(), Some(first.id()));

        let err = collider.check_collisions(&mut second).unwrap_err();
        assert!(matches!(err, ColliderError::SceneMismatch { bound, given } if bound == first.id() && given == second.id()));

        collider.set_scene(&second);
        assert_eq!(collider.check_collisions(&mut second).unwrap().proxies, 2);
    }

    #[test]
    fn test_error_display_and_source() {
        use std::error::Error;

        let mut scene = Scene::new();
        let entity = scene.add_entity(Entity::new());
        let err = ColliderError::Tree {
            entity,
            source: TreeError::NotFound,
        };
        assert!(err.to_string().starts_with("Tree error for entity"));
        assert!(err.source().is_some());

        let other = Scene::new();
        let err = ColliderError::SceneMismatch {
            bound: scene.id(),
            given: other.id(),
        };
        assert!(err.source().is_none());
    }
}
