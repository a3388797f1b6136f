//! hecs integration.
//!
//! Bodies are plain `hecs::Entity` ids carrying [`Transform`](components::transform::Transform),
//! [`GlobalTransform`](components::transform::GlobalTransform),
//! [`RigidBody`](components::physics::RigidBody) and a
//! [`Collider`](crate::physics::collider::Collider).

pub mod components;

pub mod prelude {
    pub use super::components::physics::{
        BodyOptions, CollisionGroup, CollisionType, RigidBody, SleepInfo, SleepState,
    };
    pub use super::components::transform::{GlobalTransform, Transform};
}
