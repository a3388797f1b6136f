//! Dynamic AABB tree with fat leaves and AVL style rotations.
//!
//! Leaves store bounds padded by a fixed margin plus a velocity-predicted
//! margin; a leaf is re-inserted only when its tight bounds escape the fat
//! bounds. Insertion descends by a perimeter cost heuristic.

use std::collections::HashMap;

use glam::Vec2;

use super::{Proxy, SpatialIndex};
use crate::physics::bounds::BoundingBox;
use crate::physics::collider::ColliderId;
use crate::physics::ray::Ray;

const NULL_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct TreeNode {
    bounds: BoundingBox,
    parent: usize,
    left: usize,
    right: usize,
    /// Leaves have height 0.
    height: i32,
    proxy: Option<Proxy>,
}

impl TreeNode {
    fn leaf(bounds: BoundingBox, proxy: Proxy) -> Self {
        Self {
            bounds,
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: 0,
            proxy: Some(proxy),
        }
    }

    fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Balanced bounding volume hierarchy over collider proxies.
#[derive(Debug, Clone)]
pub struct AabbTree {
    nodes: Vec<TreeNode>,
    free: Vec<usize>,
    root: usize,
    leaves: HashMap<ColliderId, usize>,
    padding: f32,
    velocity_multiplier: f32,
    world_bounds: Option<BoundingBox>,
}

impl Default for AabbTree {
    fn default() -> Self {
        Self::new(0.1, 2.0)
    }
}

impl AabbTree {
    pub fn new(padding: f32, velocity_multiplier: f32) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NULL_NODE,
            leaves: HashMap::new(),
            padding,
            velocity_multiplier,
            world_bounds: None,
        }
    }

    /// Colliders leaving `bounds` are dropped from the tree with a warning.
    pub fn with_world_bounds(mut self, bounds: BoundingBox) -> Self {
        self.world_bounds = Some(bounds);
        self
    }

    /// Height of the root (0 for a single leaf or an empty tree).
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    pub fn root_bounds(&self) -> Option<BoundingBox> {
        (self.root != NULL_NODE).then(|| self.nodes[self.root].bounds)
    }

    /// Fat bounds stored for a tracked collider.
    pub fn fat_bounds(&self, id: ColliderId) -> Option<BoundingBox> {
        self.leaves.get(&id).map(|&i| self.nodes[i].bounds)
    }

    /// Check parent links, heights and bounds containment.
    pub fn validate(&self) -> bool {
        if self.root == NULL_NODE {
            return self.leaves.is_empty();
        }
        self.nodes[self.root].parent == NULL_NODE && self.validate_node(self.root)
    }

    fn validate_node(&self, index: usize) -> bool {
        let node = &self.nodes[index];
        if node.is_leaf() {
            return node.height == 0 && node.proxy.is_some();
        }
        let (left, right) = (&self.nodes[node.left], &self.nodes[node.right]);
        left.parent == index
            && right.parent == index
            && node.height == 1 + left.height.max(right.height)
            && node.bounds.contains(&left.bounds)
            && node.bounds.contains(&right.bounds)
            && self.validate_node(node.left)
            && self.validate_node(node.right)
    }

    fn allocate(&mut self, node: TreeNode) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        node.proxy = None;
        node.parent = NULL_NODE;
        node.left = NULL_NODE;
        node.right = NULL_NODE;
        node.height = -1;
        self.free.push(index);
    }

    fn descend_cost(&self, child: usize, leaf_bounds: &BoundingBox, inheritance_cost: f32) -> f32 {
        let node = &self.nodes[child];
        let combined = leaf_bounds.combine(&node.bounds).perimeter();
        if node.is_leaf() {
            combined + inheritance_cost
        } else {
            combined - node.bounds.perimeter() + inheritance_cost
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Find the best sibling.
        let leaf_bounds = self.nodes[leaf].bounds;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let node = &self.nodes[index];
            let (left, right) = (node.left, node.right);
            let area = node.bounds.perimeter();
            let combined_area = node.bounds.combine(&leaf_bounds).perimeter();

            let cost = 2.0 * combined_area;
            let inheritance_cost = 2.0 * (combined_area - area);
            let cost_left = self.descend_cost(left, &leaf_bounds, inheritance_cost);
            let cost_right = self.descend_cost(right, &leaf_bounds, inheritance_cost);

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate(TreeNode {
            bounds: leaf_bounds.combine(&self.nodes[sibling].bounds),
            parent: old_parent,
            left: sibling,
            right: leaf,
            height: self.nodes[sibling].height + 1,
            proxy: None,
        });

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent].left == sibling {
            self.nodes[old_parent].left = new_parent;
        } else {
            self.nodes[old_parent].right = new_parent;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        self.refit_from(new_parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.release(parent);
        } else {
            if self.nodes[grand_parent].left == parent {
                self.nodes[grand_parent].left = sibling;
            } else {
                self.nodes[grand_parent].right = sibling;
            }
            self.nodes[sibling].parent = grand_parent;
            self.release(parent);
            self.refit_from(grand_parent);
        }
        self.nodes[leaf].parent = NULL_NODE;
    }

    /// Walk to the root rebalancing and refitting.
    fn refit_from(&mut self, start: usize) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);
            let (left, right) = (self.nodes[index].left, self.nodes[index].right);
            self.nodes[index].height = 1 + self.nodes[left].height.max(self.nodes[right].height);
            self.nodes[index].bounds = self.nodes[left].bounds.combine(&self.nodes[right].bounds);
            index = self.nodes[index].parent;
        }
    }

    /// Rotate `a` if its children's heights differ by more than one.
    /// Returns the index of the new subtree root.
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }

        let b = self.nodes[a].left;
        let c = self.nodes[a].right;
        let balance = self.nodes[c].height - self.nodes[b].height;

        if balance > 1 {
            self.rotate_up(a, c, b, false)
        } else if balance < -1 {
            self.rotate_up(a, b, c, true)
        } else {
            a
        }
    }

    /// Lift `up` (a child of `a`) above `a`; `other` is `a`'s remaining child.
    /// `up_was_left` tells which slot of `a` `up` occupied.
    fn rotate_up(&mut self, a: usize, up: usize, other: usize, up_was_left: bool) -> usize {
        let f = self.nodes[up].left;
        let g = self.nodes[up].right;

        // Swap a and up.
        self.nodes[up].left = a;
        self.nodes[up].parent = self.nodes[a].parent;
        self.nodes[a].parent = up;

        let grand = self.nodes[up].parent;
        if grand == NULL_NODE {
            self.root = up;
        } else if self.nodes[grand].left == a {
            self.nodes[grand].left = up;
        } else {
            self.nodes[grand].right = up;
        }

        // The taller grandchild stays with `up`, the shorter moves under `a`.
        let (keep, give) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[up].right = keep;
        if up_was_left {
            self.nodes[a].left = give;
        } else {
            self.nodes[a].right = give;
        }
        self.nodes[give].parent = a;

        self.nodes[a].bounds = self.nodes[other].bounds.combine(&self.nodes[give].bounds);
        self.nodes[up].bounds = self.nodes[a].bounds.combine(&self.nodes[keep].bounds);
        self.nodes[a].height = 1 + self.nodes[other].height.max(self.nodes[give].height);
        self.nodes[up].height = 1 + self.nodes[a].height.max(self.nodes[keep].height);
        up
    }

    fn fatten(&self, proxy: &Proxy, elapsed: f32) -> BoundingBox {
        proxy
            .bounds
            .pad(self.padding)
            .extend_by(proxy.velocity * elapsed * self.velocity_multiplier)
    }

    fn visit(
        &self,
        overlaps: &dyn Fn(&BoundingBox) -> bool,
        visitor: &mut dyn FnMut(&Proxy) -> bool,
    ) {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !overlaps(&node.bounds) {
                continue;
            }
            match &node.proxy {
                Some(proxy) => {
                    if visitor(proxy) {
                        return;
                    }
                }
                None => {
                    stack.push(node.right);
                    stack.push(node.left);
                }
            }
        }
    }
}

impl SpatialIndex for AabbTree {
    fn track(&mut self, proxy: Proxy) {
        if self.leaves.contains_key(&proxy.id()) {
            self.update(&[proxy], 0.0);
            return;
        }
        let leaf = self.allocate(TreeNode::leaf(proxy.bounds.pad(self.padding), proxy));
        self.leaves.insert(proxy.id(), leaf);
        self.insert_leaf(leaf);
    }

    fn untrack(&mut self, id: ColliderId) -> bool {
        let Some(leaf) = self.leaves.remove(&id) else {
            return false;
        };
        self.remove_leaf(leaf);
        self.release(leaf);
        true
    }

    fn update(&mut self, proxies: &[Proxy], elapsed: f32) -> usize {
        let mut moved = 0;
        for proxy in proxies {
            let Some(&leaf) = self.leaves.get(&proxy.id()) else {
                continue;
            };
            if let Some(world) = self.world_bounds {
                if !world.contains(&proxy.bounds) {
                    tracing::warn!(
                        "collider {} left the world bounds and is no longer tracked",
                        proxy.id()
                    );
                    self.untrack(proxy.id());
                    continue;
                }
            }

            self.nodes[leaf].proxy = Some(*proxy);
            if self.nodes[leaf].bounds.contains(&proxy.bounds) {
                continue;
            }

            self.remove_leaf(leaf);
            self.nodes[leaf].bounds = self.fatten(proxy, elapsed);
            self.insert_leaf(leaf);
            moved += 1;
        }
        moved
    }

    fn query(&self, bounds: &BoundingBox, visitor: &mut dyn FnMut(&Proxy) -> bool) {
        self.visit(&|node: &BoundingBox| node.overlaps(bounds, 0.0), visitor);
    }

    fn query_point(&self, point: Vec2, visitor: &mut dyn FnMut(&Proxy) -> bool) {
        self.visit(&|node: &BoundingBox| node.contains_point(point), visitor);
    }

    fn ray_cast_query(&self, ray: &Ray, max_distance: f32, visitor: &mut dyn FnMut(&Proxy) -> bool) {
        self.visit(&|node: &BoundingBox| node.ray_cast(ray, max_distance), visitor);
    }

    fn contains(&self, id: ColliderId) -> bool {
        self.leaves.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.leaves.len()
    }

    fn tracked(&self) -> Vec<ColliderId> {
        self.leaves.keys().copied().collect()
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.leaves.clear();
        self.root = NULL_NODE;
    }
}
