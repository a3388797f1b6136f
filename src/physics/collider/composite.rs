use std::collections::HashMap;

use glam::{Affine2, Vec2};

use super::{Collider, ColliderId, Shape};
use crate::physics::bounds::BoundingBox;
use crate::physics::broadphase::aabb_tree::AabbTree;
use crate::physics::broadphase::{Proxy, SpatialIndex};

/// Group of leaf colliders sharing one owner, indexed by a private AABB tree.
#[derive(Debug)]
pub struct Composite {
    children: Vec<Collider>,
    /// Child index by collider id, for resolving tree hits.
    slots: HashMap<ColliderId, usize>,
    tree: AabbTree,
}

impl Clone for Composite {
    fn clone(&self) -> Self {
        Self::new(self.children.clone())
    }
}

impl Composite {
    pub fn new(children: Vec<Collider>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child.shape {
                Shape::Composite(inner) => flat.extend(inner.children),
                _ => flat.push(child),
            }
        }

        let mut tree = AabbTree::new(0.0, 0.0);
        let mut slots = HashMap::with_capacity(flat.len());
        for (slot, child) in flat.iter().enumerate() {
            tree.track(Proxy::new(child.handle(), child.bounds(), Vec2::ZERO));
            slots.insert(child.id, slot);
        }
        Self {
            children: flat,
            slots,
            tree,
        }
    }

    pub fn children(&self) -> &[Collider] {
        &self.children
    }

    pub fn child(&self, id: ColliderId) -> Option<&Collider> {
        self.slots.get(&id).map(|&slot| &self.children[slot])
    }

    /// Children whose world bounds overlap `bounds`.
    pub fn query(&self, bounds: &BoundingBox) -> Vec<&Collider> {
        let mut found = Vec::new();
        self.tree.query(bounds, &mut |proxy: &Proxy| {
            if let Some(child) = self.child(proxy.handle.id) {
                if child.bounds().overlaps(bounds, 0.0) {
                    found.push(child);
                }
            }
            false
        });
        found
    }

    pub(super) fn adopt(&mut self, composite: ColliderId, owner: Option<hecs::Entity>) {
        for child in &mut self.children {
            child.composite = Some(composite);
            child.owner = owner;
        }
    }

    pub(super) fn set_owner(&mut self, owner: hecs::Entity) {
        for child in &mut self.children {
            child.owner = Some(owner);
        }
    }

    pub(super) fn update(&mut self, transform: &Affine2) -> BoundingBox {
        let mut bounds = BoundingBox::EMPTY;
        let mut proxies = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            child.update(transform);
            bounds = bounds.combine(&child.bounds());
            proxies.push(Proxy::new(child.handle(), child.bounds(), Vec2::ZERO));
        }
        self.tree.update(&proxies, 0.0);
        bounds
    }

    pub(super) fn local_bounds(&self) -> BoundingBox {
        self.children
            .iter()
            .fold(BoundingBox::EMPTY, |b, c| b.combine(&c.local_bounds()))
    }
}
