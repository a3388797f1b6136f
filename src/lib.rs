//! Rein 2D collision core
//!
//! Collision detection and resolution for 2D rigid bodies stored in a
//! `hecs::World`.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **ecs** - hecs components (`Transform`, `GlobalTransform`, `RigidBody`)
//! 2. **physics::collider** - Circle, polygon, edge and composite geometry
//! 3. **physics::broadphase** - AABB tree and sparse hash grid spatial indexes
//! 4. **physics::narrowphase** - Pairwise contact generation
//! 5. **physics::solver** - Arcade and realistic contact solvers
//! 6. **physics** - `PhysicsWorld` fixed timestep pipeline
//! 7. **physics::mirror** - Flat body records for off thread integration (feature = "mirror")

pub mod ecs;
pub mod error;
pub mod physics;

// Re-export commonly used types
pub use error::{PhysicsError, Result};

pub use ecs::components::physics::{BodyOptions, CollisionGroup, CollisionType, RigidBody};
pub use ecs::components::transform::{GlobalTransform, Transform};

pub use physics::bounds::BoundingBox;
pub use physics::broadphase::BroadphaseKind;
pub use physics::collider::{Collider, ColliderHandle, ColliderId, Shape};
pub use physics::config::{ContactSolveBias, PhysicsConfig, SolverKind};
pub use physics::contact::Contact;
pub use physics::events::{CollisionEvent, CollisionHooks, Side};
pub use physics::ray::{Ray, RayCastHit};
pub use physics::PhysicsWorld;

pub use glam;
pub use hecs;
