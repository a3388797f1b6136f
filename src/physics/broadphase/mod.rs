//! Broadphase spatial indexes.
//!
//! Both indexes are caches over collider bounds: they may be cleared and
//! rebuilt from the current colliders at any time without changing results.

pub mod aabb_tree;
pub mod hash_grid;

use glam::Vec2;

use super::bounds::BoundingBox;
use super::collider::{ColliderHandle, ColliderId};
use super::config::BroadphaseConfig;
use super::ray::Ray;

pub use aabb_tree::AabbTree;
pub use hash_grid::SparseHashGrid;

/// What a spatial index stores per leaf collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proxy {
    pub handle: ColliderHandle,
    /// Tight world bounds.
    pub bounds: BoundingBox,
    /// Owner velocity, used for predictive padding.
    pub velocity: Vec2,
}

impl Proxy {
    pub fn new(handle: ColliderHandle, bounds: BoundingBox, velocity: Vec2) -> Self {
        Self {
            handle,
            bounds,
            velocity,
        }
    }

    pub fn id(&self) -> ColliderId {
        self.handle.id
    }
}

/// Which index the collision processor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadphaseKind {
    #[default]
    AabbTree,
    SparseHashGrid,
}

/// Common contract of the spatial indexes. Visitors return `true` to stop.
pub trait SpatialIndex: Send + Sync {
    fn track(&mut self, proxy: Proxy);

    /// Returns false when the id was not tracked.
    fn untrack(&mut self, id: ColliderId) -> bool;

    /// Refresh tracked proxies. Returns how many changed their index placement.
    fn update(&mut self, proxies: &[Proxy], elapsed: f32) -> usize;

    fn query(&self, bounds: &BoundingBox, visitor: &mut dyn FnMut(&Proxy) -> bool);

    fn query_point(&self, point: Vec2, visitor: &mut dyn FnMut(&Proxy) -> bool);

    /// Visit proxies whose (padded) bounds the ray crosses within `max_distance`.
    fn ray_cast_query(&self, ray: &Ray, max_distance: f32, visitor: &mut dyn FnMut(&Proxy) -> bool);

    fn contains(&self, id: ColliderId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tracked(&self) -> Vec<ColliderId>;

    fn clear(&mut self);

    fn rebuild(&mut self, proxies: &[Proxy]) {
        self.clear();
        for proxy in proxies {
            self.track(*proxy);
        }
    }
}

/// Build the index selected by `config`.
pub fn create_index(config: &BroadphaseConfig) -> Box<dyn SpatialIndex> {
    match config.kind {
        BroadphaseKind::AabbTree => {
            let mut tree = AabbTree::new(config.padding, config.velocity_multiplier);
            if let Some(world) = config.world_bounds {
                tree = tree.with_world_bounds(world);
            }
            Box::new(tree)
        }
        BroadphaseKind::SparseHashGrid => {
            Box::new(SparseHashGrid::new(config.cell_size, config.padding))
        }
    }
}
