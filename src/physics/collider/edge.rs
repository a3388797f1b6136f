use glam::{Affine2, Vec2};

use crate::physics::bounds::BoundingBox;
use crate::physics::ray::Segment;

/// Line segment in the owner's local frame.
#[derive(Debug, Clone)]
pub struct Edge {
    begin: Vec2,
    end: Vec2,
    world: Segment,
}

impl Edge {
    pub fn new(begin: Vec2, end: Vec2, offset: Vec2) -> Self {
        let begin = begin + offset;
        let end = end + offset;
        Self {
            begin,
            end,
            world: Segment::new(begin, end),
        }
    }

    pub fn local_begin(&self) -> Vec2 {
        self.begin
    }

    pub fn local_end(&self) -> Vec2 {
        self.end
    }

    pub fn local_segment(&self) -> Segment {
        Segment::new(self.begin, self.end)
    }

    pub fn world_segment(&self) -> Segment {
        self.world
    }

    pub(super) fn update(&mut self, transform: &Affine2) -> BoundingBox {
        self.world = self.local_segment().transform(transform);
        BoundingBox::from_points(&[self.world.begin, self.world.end])
    }

    pub(super) fn local_bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&[self.begin, self.end])
    }
}
