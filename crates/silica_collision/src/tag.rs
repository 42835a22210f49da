//! Collision tags and the registered tag-pair table

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

/// Identity token for a category of collidable entities ("hero", "wall", ...)
///
/// Every call to [`CollisionTag::new`] yields a distinct tag. Copies of a tag
/// compare equal; two separately created tags never do, so callers share one
/// instance per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollisionTag(u64);

impl CollisionTag {
    /// Create a new unique tag
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity, stable for the life of the process
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Unordered pair of tags, normalised so `(a, b)` and `(b, a)` are one key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct TagPair(CollisionTag, CollisionTag);

impl TagPair {
    fn new(a: CollisionTag, b: CollisionTag) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Whitelist of tag combinations eligible for narrowphase and callbacks
#[derive(Clone, Debug, Default)]
pub struct TagPairs {
    pairs: HashSet<TagPair>,
}

impl TagPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an unordered pair. Returns `false` if it was already present.
    pub fn register(&mut self, a: CollisionTag, b: CollisionTag) -> bool {
        self.pairs.insert(TagPair::new(a, b))
    }

    /// Remove a registration. Returns `false` if it was not present.
    pub fn unregister(&mut self, a: CollisionTag, b: CollisionTag) -> bool {
        self.pairs.remove(&TagPair::new(a, b))
    }

    /// Whether `(a, b)` or `(b, a)` has been registered
    #[inline]
    pub fn is_registered(&self, a: CollisionTag, b: CollisionTag) -> bool {
        self.pairs.contains(&TagPair::new(a, b))
    }

    /// Number of distinct registered pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_unique() {
        let a = CollisionTag::new();
        let b = CollisionTag::new();
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_copies_share_identity() {
        let hero = CollisionTag::new();
        let copy = hero;
        assert_eq!(hero, copy);
    }

    #[test]
    fn test_registration_is_symmetric() {
        let hero = CollisionTag::new();
        let wall = CollisionTag::new();
        let mut pairs = TagPairs::new();
        pairs.register(hero, wall);

        assert!(pairs.is_registered(hero, wall));
        assert!(pairs.is_registered(wall, hero));
        assert!(!pairs.is_registered(hero, hero));
    }

    #[test]
    fn test_registration_is_idempotent() {
        let hero = CollisionTag::new();
        let wall = CollisionTag::new();
        let mut pairs = TagPairs::new();

        assert!(pairs.register(hero, wall));
        assert!(!pairs.register(wall, hero));
        assert!(!pairs.register(hero, wall));
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_self_pair() {
        let bullet = CollisionTag::new();
        let mut pairs = TagPairs::new();
        pairs.register(bullet, bullet);
        assert!(pairs.is_registered(bullet, bullet));
    }

    #[test]
    fn test_unregister() {
        let a = CollisionTag::new();
        let b = CollisionTag::new();
        let mut pairs = TagPairs::new();
        pairs.register(a, b);
        assert!(pairs.unregister(b, a));
        assert!(!pairs.is_registered(a, b));
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_equal_looking_tags_do_not_match() {
        // Two tags created "the same way" are still different categories
        let walls = CollisionTag::new();
        let walls_again = CollisionTag::new();
        let hero = CollisionTag::new();
        let mut pairs = TagPairs::new();
        pairs.register(hero, walls);
        assert!(!pairs.is_registered(hero, walls_again));
    }
}
