//! Dynamic AABB tree broadphase
//!
//! A bounding-volume hierarchy over fattened axis-aligned boxes. Leaves wrap
//! one tracked object each; every branch has exactly two children and stores
//! the exact union of their boxes.
//!
//! - Insertion walks down from the root choosing the child whose box grows
//!   the least (greedy area heuristic), then splices in a new branch.
//! - Ancestors of every structural change are rebalanced with AVL-style
//!   rotations and refitted.
//! - Leaves store a fattened box, so [`DynamicTree::update`] is a no-op while
//!   the object stays inside it.

use std::collections::HashMap;
use std::hash::Hash;

use silica_math::{Aabb, Vec2};
use slotmap::{new_key_type, SlotMap};

use crate::error::TreeError;

new_key_type! {
    /// Key to a node in the tree's arena
    struct NodeKey;
}

/// Tuning parameters for the tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeConfig {
    /// Fattening margin per axis as a fraction of the box extent on that axis
    pub fat_margin_ratio: f32,
    /// Lower bound on the fattening margin, in world units
    pub min_fat_margin: f32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            fat_margin_ratio: 0.1,
            min_fat_margin: 0.01,
        }
    }
}

impl TreeConfig {
    pub fn new(fat_margin_ratio: f32, min_fat_margin: f32) -> Self {
        Self {
            fat_margin_ratio,
            min_fat_margin,
        }
    }

    /// Margin added on each side of `aabb`
    pub fn margin(&self, aabb: &Aabb) -> Vec2 {
        let size = aabb.size();
        Vec2::new(
            (size.x * self.fat_margin_ratio).max(self.min_fat_margin),
            (size.y * self.fat_margin_ratio).max(self.min_fat_margin),
        )
    }

    /// The box a leaf stores for `aabb`
    pub fn fatten(&self, aabb: &Aabb) -> Aabb {
        aabb.expanded(self.margin(aabb))
    }
}

#[derive(Clone, Debug)]
enum NodeKind<K> {
    Leaf(K),
    Branch(NodeKey, NodeKey),
}

#[derive(Clone, Debug)]
struct Node<K> {
    aabb: Aabb,
    parent: Option<NodeKey>,
    /// Leaves are height 0
    height: u32,
    kind: NodeKind<K>,
}

/// Bounding-volume hierarchy keyed by caller-supplied object handles
///
/// The tree never owns the objects it tracks; `K` is a small copyable
/// handle (an entity key, an index) reported back by queries.
#[derive(Clone, Debug)]
pub struct DynamicTree<K> {
    nodes: SlotMap<NodeKey, Node<K>>,
    root: Option<NodeKey>,
    leaves: HashMap<K, NodeKey>,
    config: TreeConfig,
}

impl<K: Copy + Eq + Hash> Default for DynamicTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash> DynamicTree<K> {
    /// Create an empty tree with the default configuration
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create an empty tree with a custom configuration
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            leaves: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of tracked objects
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Total node count, leaves and branches
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Height of the root (0 for a single leaf or an empty tree)
    pub fn height(&self) -> u32 {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    pub fn contains(&self, item: K) -> bool {
        self.leaves.contains_key(&item)
    }

    /// The fattened box currently stored for `item`
    pub fn fat_aabb(&self, item: K) -> Option<Aabb> {
        self.leaves.get(&item).map(|&leaf| self.nodes[leaf].aabb)
    }

    /// Iterate over every tracked object (arbitrary order)
    pub fn items(&self) -> impl Iterator<Item = K> + '_ {
        self.leaves.keys().copied()
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
        self.root = None;
    }

    /// Start tracking `item` with bounding box `aabb`
    ///
    /// Returns [`TreeError::DuplicateInsertion`] if `item` is already tracked;
    /// the tree is left unchanged in that case.
    pub fn insert(&mut self, item: K, aabb: Aabb) -> Result<(), TreeError> {
        if self.leaves.contains_key(&item) {
            return Err(TreeError::DuplicateInsertion);
        }

        let leaf = self.nodes.insert(Node {
            aabb: self.config.fatten(&aabb),
            parent: None,
            height: 0,
            kind: NodeKind::Leaf(item),
        });
        self.leaves.insert(item, leaf);
        self.insert_leaf(leaf);
        Ok(())
    }

    /// Stop tracking `item`
    pub fn remove(&mut self, item: K) -> Result<(), TreeError> {
        let leaf = self.leaves.remove(&item).ok_or(TreeError::NotFound)?;
        self.remove_leaf(leaf);
        self.nodes.remove(leaf);
        Ok(())
    }

    /// Move `item` to a new bounding box
    ///
    /// If `aabb` still fits inside the stored fat box nothing changes and
    /// `Ok(false)` is returned. Otherwise the leaf is re-inserted with a
    /// freshly fattened box and `Ok(true)` is returned.
    pub fn update(&mut self, item: K, aabb: Aabb) -> Result<bool, TreeError> {
        let leaf = *self.leaves.get(&item).ok_or(TreeError::NotFound)?;
        if self.nodes[leaf].aabb.contains(&aabb) {
            return Ok(false);
        }

        self.remove_leaf(leaf);
        self.nodes[leaf].aabb = self.config.fatten(&aabb);
        self.insert_leaf(leaf);
        Ok(true)
    }

    /// Lazily yield every object whose fat box overlaps `aabb`
    ///
    /// Calling `query` again restarts the traversal.
    pub fn query(&self, aabb: Aabb) -> Query<'_, K> {
        Query {
            tree: self,
            aabb,
            stack: self.root.into_iter().collect(),
            overlap_tests: 0,
        }
    }

    /// Lazily yield every unordered pair of objects whose fat boxes overlap
    ///
    /// Each pair appears once per traversal, in one of its two orders.
    pub fn query_pairs(&self) -> Pairs<'_, K> {
        Pairs {
            tree: self,
            stack: self.root.map(PairTask::Within).into_iter().collect(),
            overlap_tests: 0,
        }
    }

    /// Check every structural invariant of the tree
    ///
    /// - the root has no parent and every child points back at its parent
    /// - every branch box is the exact union of its children's boxes
    /// - every branch height is one more than its tallest child
    /// - every leaf is mapped from exactly one tracked object and every
    ///   node is reachable from the root
    pub fn validate(&self) -> Result<(), String> {
        let Some(root) = self.root else {
            if self.nodes.is_empty() && self.leaves.is_empty() {
                return Ok(());
            }
            return Err(format!(
                "empty tree still holds {} nodes and {} leaves",
                self.nodes.len(),
                self.leaves.len()
            ));
        };

        if self.nodes[root].parent.is_some() {
            return Err("root has a parent".to_string());
        }

        let mut reachable = 0;
        self.validate_node(root, &mut reachable)?;
        if reachable != self.nodes.len() {
            return Err(format!(
                "{} of {} nodes reachable from the root",
                reachable,
                self.nodes.len()
            ));
        }

        let mut leaf_count = 0;
        for (key, node) in &self.nodes {
            if let NodeKind::Leaf(item) = &node.kind {
                leaf_count += 1;
                if self.leaves.get(item) != Some(&key) {
                    return Err(format!("leaf {:?} is not mapped from its object", key));
                }
            }
        }
        if leaf_count != self.leaves.len() {
            return Err(format!(
                "{} leaves in the arena but {} tracked objects",
                leaf_count,
                self.leaves.len()
            ));
        }
        Ok(())
    }

    fn validate_node(&self, index: NodeKey, reachable: &mut usize) -> Result<u32, String> {
        let node = self
            .nodes
            .get(index)
            .ok_or_else(|| format!("dangling node {:?}", index))?;
        *reachable += 1;

        match node.kind {
            NodeKind::Leaf(_) => {
                if node.height != 0 {
                    return Err(format!("leaf {:?} has height {}", index, node.height));
                }
                Ok(0)
            }
            NodeKind::Branch(left, right) => {
                for child in [left, right] {
                    let parent = self.nodes.get(child).and_then(|c| c.parent);
                    if parent != Some(index) {
                        return Err(format!("child {:?} does not point back at {:?}", child, index));
                    }
                }
                let left_height = self.validate_node(left, reachable)?;
                let right_height = self.validate_node(right, reachable)?;

                if node.height != 1 + left_height.max(right_height) {
                    return Err(format!("branch {:?} has stale height {}", index, node.height));
                }
                let union = self.nodes[left].aabb.union(&self.nodes[right].aabb);
                if node.aabb != union {
                    return Err(format!("branch {:?} box is not the union of its children", index));
                }
                Ok(node.height)
            }
        }
    }

    fn insert_leaf(&mut self, leaf: NodeKey) {
        let Some(root) = self.root else {
            self.nodes[leaf].parent = None;
            self.root = Some(leaf);
            return;
        };

        let leaf_box = self.nodes[leaf].aabb;
        let sibling = self.pick_sibling(root, &leaf_box);
        let old_parent = self.nodes[sibling].parent;
        let branch_box = leaf_box.union(&self.nodes[sibling].aabb);
        let branch_height = self.nodes[sibling].height + 1;

        let branch = self.nodes.insert(Node {
            aabb: branch_box,
            parent: old_parent,
            height: branch_height,
            kind: NodeKind::Branch(sibling, leaf),
        });
        match old_parent {
            Some(parent) => self.replace_child(parent, sibling, branch),
            None => self.root = Some(branch),
        }
        self.nodes[sibling].parent = Some(branch);
        self.nodes[leaf].parent = Some(branch);

        self.refit(Some(branch));
    }

    /// Greedy descent: stop where making a new parent is cheaper than
    /// pushing the leaf into either child.
    fn pick_sibling(&self, root: NodeKey, leaf_box: &Aabb) -> NodeKey {
        let mut index = root;
        while let NodeKind::Branch(left, right) = self.nodes[index].kind {
            let area = self.nodes[index].aabb.area();
            let combined_area = self.nodes[index].aabb.union(leaf_box).area();

            let cost = 2.0 * combined_area;
            // Every ancestor below here grows by at least this much
            let inheritance = 2.0 * (combined_area - area);

            let cost_left = self.descend_cost(left, leaf_box) + inheritance;
            let cost_right = self.descend_cost(right, leaf_box) + inheritance;

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }
        index
    }

    fn descend_cost(&self, child: NodeKey, leaf_box: &Aabb) -> f32 {
        let node = &self.nodes[child];
        let grown = node.aabb.union(leaf_box).area();
        match node.kind {
            NodeKind::Leaf(_) => grown,
            NodeKind::Branch(..) => grown - node.aabb.area(),
        }
    }

    /// Detach `leaf` from the hierarchy; the node itself stays in the arena
    fn remove_leaf(&mut self, leaf: NodeKey) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let Some(parent) = self.nodes[leaf].parent else {
            return;
        };
        let Some(sibling) = self.other_child(parent, leaf) else {
            return;
        };
        let grandparent = self.nodes[parent].parent;

        self.nodes.remove(parent);
        self.nodes[leaf].parent = None;
        self.nodes[sibling].parent = grandparent;

        match grandparent {
            Some(grandparent) => {
                self.replace_child(grandparent, parent, sibling);
                self.refit(Some(grandparent));
            }
            None => self.root = Some(sibling),
        }
    }

    fn other_child(&self, parent: NodeKey, child: NodeKey) -> Option<NodeKey> {
        match self.nodes[parent].kind {
            NodeKind::Branch(left, right) if left == child => Some(right),
            NodeKind::Branch(left, right) if right == child => Some(left),
            _ => None,
        }
    }

    fn replace_child(&mut self, parent: NodeKey, old: NodeKey, new: NodeKey) {
        if let NodeKind::Branch(left, right) = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    /// Walk up from `start`, rebalancing and refitting every ancestor
    fn refit(&mut self, start: Option<NodeKey>) {
        let mut index = start;
        while let Some(current) = index {
            let current = self.balance(current);
            self.recompute(current);
            index = self.nodes[current].parent;
        }
    }

    fn recompute(&mut self, index: NodeKey) {
        if let NodeKind::Branch(left, right) = self.nodes[index].kind {
            let (l, r) = (&self.nodes[left], &self.nodes[right]);
            let aabb = l.aabb.union(&r.aabb);
            let height = 1 + l.height.max(r.height);
            let node = &mut self.nodes[index];
            node.aabb = aabb;
            node.height = height;
        }
    }

    /// Rotate the taller child of `a` above it if the child heights differ
    /// by more than one. Returns the node now occupying `a`'s position.
    fn balance(&mut self, a: NodeKey) -> NodeKey {
        let NodeKind::Branch(b, c) = self.nodes[a].kind else {
            return a;
        };

        let diff = self.nodes[c].height as i64 - self.nodes[b].height as i64;
        if diff > 1 {
            self.rotate_up(a, c, b)
        } else if diff < -1 {
            self.rotate_up(a, b, c)
        } else {
            a
        }
    }

    /// Promote `up` (a child of `a`) into `a`'s place.
    ///
    /// `up` keeps its taller child; `a` keeps `stay` and adopts `up`'s
    /// shorter child.
    fn rotate_up(&mut self, a: NodeKey, up: NodeKey, stay: NodeKey) -> NodeKey {
        let NodeKind::Branch(f, g) = self.nodes[up].kind else {
            return a;
        };
        let (tall, short) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };

        let a_parent = self.nodes[a].parent;
        self.nodes[up].parent = a_parent;
        match a_parent {
            Some(parent) => self.replace_child(parent, a, up),
            None => self.root = Some(up),
        }

        self.nodes[a].kind = NodeKind::Branch(stay, short);
        self.nodes[a].parent = Some(up);
        self.nodes[short].parent = Some(a);
        self.recompute(a);

        self.nodes[up].kind = NodeKind::Branch(a, tall);
        self.recompute(up);
        up
    }
}

/// Iterator returned by [`DynamicTree::query`]
#[derive(Clone, Debug)]
pub struct Query<'a, K> {
    tree: &'a DynamicTree<K>,
    aabb: Aabb,
    stack: Vec<NodeKey>,
    overlap_tests: usize,
}

impl<K> Query<'_, K> {
    /// Box-overlap tests performed so far
    pub fn overlap_tests(&self) -> usize {
        self.overlap_tests
    }
}

impl<K: Copy> Iterator for Query<'_, K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        let tree = self.tree;
        while let Some(index) = self.stack.pop() {
            let node = &tree.nodes[index];
            self.overlap_tests += 1;
            if !node.aabb.overlaps(&self.aabb) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(item) => return Some(*item),
                NodeKind::Branch(left, right) => {
                    self.stack.push(*left);
                    self.stack.push(*right);
                }
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug)]
enum PairTask {
    /// All pairs inside one subtree
    Within(NodeKey),
    /// All pairs with one leaf in each subtree
    Across(NodeKey, NodeKey),
}

/// Iterator returned by [`DynamicTree::query_pairs`]
#[derive(Clone, Debug)]
pub struct Pairs<'a, K> {
    tree: &'a DynamicTree<K>,
    stack: Vec<PairTask>,
    overlap_tests: usize,
}

impl<K> Pairs<'_, K> {
    /// Box-overlap tests performed so far
    pub fn overlap_tests(&self) -> usize {
        self.overlap_tests
    }
}

impl<K: Copy> Iterator for Pairs<'_, K> {
    type Item = (K, K);

    fn next(&mut self) -> Option<(K, K)> {
        let tree = self.tree;
        while let Some(task) = self.stack.pop() {
            match task {
                PairTask::Within(index) => {
                    if let NodeKind::Branch(left, right) = tree.nodes[index].kind {
                        self.stack.push(PairTask::Within(left));
                        self.stack.push(PairTask::Within(right));
                        self.stack.push(PairTask::Across(left, right));
                    }
                }
                PairTask::Across(a, b) => {
                    let (node_a, node_b) = (&tree.nodes[a], &tree.nodes[b]);
                    self.overlap_tests += 1;
                    if !node_a.aabb.overlaps(&node_b.aabb) {
                        continue;
                    }
                    match (&node_a.kind, &node_b.kind) {
                        (NodeKind::Leaf(x), NodeKind::Leaf(y)) => return Some((*x, *y)),
                        (NodeKind::Leaf(_), NodeKind::Branch(l, r)) => {
                            self.stack.push(PairTask::Across(a, *l));
                            self.stack.push(PairTask::Across(a, *r));
                        }
                        (NodeKind::Branch(l, r), NodeKind::Leaf(_)) => {
                            self.stack.push(PairTask::Across(*l, b));
                            self.stack.push(PairTask::Across(*r, b));
                        }
                        (NodeKind::Branch(al, ar), NodeKind::Branch(bl, br)) => {
                            // Split the taller side
                            if node_a.height >= node_b.height {
                                self.stack.push(PairTask::Across(*al, b));
                                self.stack.push(PairTask::Across(*ar, b));
                            } else {
                                self.stack.push(PairTask::Across(a, *bl));
                                self.stack.push(PairTask::Across(a, *br));
                            }
                        }
                    }
                }
            }
        }
        None
    }
}
