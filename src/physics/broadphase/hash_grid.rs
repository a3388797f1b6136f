//! Sparse uniform hash grid.
//!
//! A proxy is stored in every cell its padded bounds cover. Cells only change
//! when the covered cell range changes, so small motions are free.

use std::collections::{HashMap, HashSet};

use glam::{IVec2, Vec2};

use super::{Proxy, SpatialIndex};
use crate::physics::bounds::BoundingBox;
use crate::physics::collider::ColliderId;
use crate::physics::ray::Ray;

#[derive(Debug, Clone)]
struct GridProxy {
    proxy: Proxy,
    padded: BoundingBox,
    min: IVec2,
    max: IVec2,
}

#[derive(Debug, Clone)]
pub struct SparseHashGrid {
    cell_size: f32,
    padding: f32,
    cells: HashMap<IVec2, Vec<ColliderId>>,
    proxies: HashMap<ColliderId, GridProxy>,
}

impl Default for SparseHashGrid {
    fn default() -> Self {
        Self::new(2.0, 0.1)
    }
}

impl SparseHashGrid {
    pub fn new(cell_size: f32, padding: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            padding,
            cells: HashMap::new(),
            proxies: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_of(&self, point: Vec2) -> IVec2 {
        (point / self.cell_size).floor().as_ivec2()
    }

    fn cell_range(&self, bounds: &BoundingBox) -> (IVec2, IVec2) {
        (self.cell_of(bounds.min()), self.cell_of(bounds.max()))
    }

    fn insert_cells(&mut self, id: ColliderId, min: IVec2, max: IVec2) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                self.cells.entry(IVec2::new(x, y)).or_default().push(id);
            }
        }
    }

    fn remove_cells(&mut self, id: ColliderId, min: IVec2, max: IVec2) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                let key = IVec2::new(x, y);
                if let Some(ids) = self.cells.get_mut(&key) {
                    ids.retain(|other| *other != id);
                    if ids.is_empty() {
                        self.cells.remove(&key);
                    }
                }
            }
        }
    }

    fn visit_range(
        &self,
        min: IVec2,
        max: IVec2,
        filter: &dyn Fn(&GridProxy) -> bool,
        visitor: &mut dyn FnMut(&Proxy) -> bool,
    ) {
        let mut seen = HashSet::new();
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                let Some(ids) = self.cells.get(&IVec2::new(x, y)) else {
                    continue;
                };
                for id in ids {
                    if !seen.insert(*id) {
                        continue;
                    }
                    if let Some(entry) = self.proxies.get(id) {
                        if filter(entry) && visitor(&entry.proxy) {
                            return;
                        }
                    }
                }
            }
        }
    }

    fn occupied_extent(&self) -> Option<(IVec2, IVec2)> {
        let mut keys = self.cells.keys();
        let first = *keys.next()?;
        Some(keys.fold((first, first), |(lo, hi), k| (lo.min(*k), hi.max(*k))))
    }
}

impl SpatialIndex for SparseHashGrid {
    fn track(&mut self, proxy: Proxy) {
        if self.proxies.contains_key(&proxy.id()) {
            self.update(&[proxy], 0.0);
            return;
        }
        let padded = proxy.bounds.pad(self.padding);
        let (min, max) = self.cell_range(&padded);
        self.insert_cells(proxy.id(), min, max);
        self.proxies.insert(
            proxy.id(),
            GridProxy {
                proxy,
                padded,
                min,
                max,
            },
        );
    }

    fn untrack(&mut self, id: ColliderId) -> bool {
        let Some(entry) = self.proxies.remove(&id) else {
            return false;
        };
        self.remove_cells(id, entry.min, entry.max);
        true
    }

    fn update(&mut self, proxies: &[Proxy], _elapsed: f32) -> usize {
        let mut moved = 0;
        for proxy in proxies {
            let padded = proxy.bounds.pad(self.padding);
            let (min, max) = self.cell_range(&padded);
            let Some(entry) = self.proxies.get_mut(&proxy.id()) else {
                continue;
            };
            entry.proxy = *proxy;
            entry.padded = padded;
            if entry.min == min && entry.max == max {
                continue;
            }
            let (old_min, old_max) = (entry.min, entry.max);
            entry.min = min;
            entry.max = max;
            self.remove_cells(proxy.id(), old_min, old_max);
            self.insert_cells(proxy.id(), min, max);
            moved += 1;
        }
        moved
    }

    fn query(&self, bounds: &BoundingBox, visitor: &mut dyn FnMut(&Proxy) -> bool) {
        let (min, max) = self.cell_range(bounds);
        self.visit_range(
            min,
            max,
            &|entry: &GridProxy| entry.padded.overlaps(bounds, 0.0),
            visitor,
        );
    }

    fn query_point(&self, point: Vec2, visitor: &mut dyn FnMut(&Proxy) -> bool) {
        let cell = self.cell_of(point);
        self.visit_range(
            cell,
            cell,
            &|entry: &GridProxy| entry.padded.contains_point(point),
            visitor,
        );
    }

    /// Walks cells along the ray (Amanatides-Woo) so nearer cells are visited first.
    fn ray_cast_query(&self, ray: &Ray, max_distance: f32, visitor: &mut dyn FnMut(&Proxy) -> bool) {
        if ray.dir == Vec2::ZERO {
            return;
        }
        let Some((lo, hi)) = self.occupied_extent() else {
            return;
        };
        let extent = BoundingBox::from_min_max(
            lo.as_vec2() * self.cell_size,
            (hi + IVec2::ONE).as_vec2() * self.cell_size,
        );
        let Some(t_enter) = extent.ray_cast_time(ray, max_distance) else {
            return;
        };

        let start = ray.point_at(t_enter);
        let mut cell = self.cell_of(start).clamp(lo, hi);
        let step = IVec2::new(ray.dir.x.signum() as i32, ray.dir.y.signum() as i32);
        let boundary = |c: i32, s: i32| (c + i32::from(s > 0)) as f32 * self.cell_size;
        let mut t_max = Vec2::new(
            if ray.dir.x != 0.0 {
                t_enter + (boundary(cell.x, step.x) - start.x) / ray.dir.x
            } else {
                f32::INFINITY
            },
            if ray.dir.y != 0.0 {
                t_enter + (boundary(cell.y, step.y) - start.y) / ray.dir.y
            } else {
                f32::INFINITY
            },
        );
        let t_delta = Vec2::new(
            self.cell_size / ray.dir.x.abs(),
            self.cell_size / ray.dir.y.abs(),
        );

        let mut seen = HashSet::new();
        let mut t = t_enter;
        while t <= max_distance && cell.cmpge(lo).all() && cell.cmple(hi).all() {
            if let Some(ids) = self.cells.get(&cell) {
                let mut hits: Vec<(f32, &GridProxy)> = ids
                    .iter()
                    .filter(|id| seen.insert(**id))
                    .filter_map(|id| self.proxies.get(id))
                    .filter_map(|entry| {
                        entry
                            .padded
                            .ray_cast_time(ray, max_distance)
                            .map(|hit| (hit, entry))
                    })
                    .collect();
                hits.sort_by(|a, b| a.0.total_cmp(&b.0));
                for (_, entry) in hits {
                    if visitor(&entry.proxy) {
                        return;
                    }
                }
            }

            if t_max.x < t_max.y {
                cell.x += step.x;
                t = t_max.x;
                t_max.x += t_delta.x;
            } else {
                cell.y += step.y;
                t = t_max.y;
                t_max.y += t_delta.y;
            }
        }
    }

    fn contains(&self, id: ColliderId) -> bool {
        self.proxies.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.proxies.len()
    }

    fn tracked(&self) -> Vec<ColliderId> {
        self.proxies.keys().copied().collect()
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.proxies.clear();
    }
}
