//! ECS components used by the collision core.

pub mod physics;
pub mod transform;
