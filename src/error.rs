//! Error types for the collision core.

use thiserror::Error;

use crate::physics::collider::ColliderId;

#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("entity {0:?} has no rigid body")]
    MissingBody(hecs::Entity),

    #[error("entity {0:?} has no collider")]
    MissingCollider(hecs::Entity),

    #[error("collider {0} is not tracked by the collision processor")]
    UntrackedCollider(ColliderId),

    #[error("invalid physics configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("body record buffer of {len} bytes is not a multiple of {record} bytes")]
    MisalignedRecords { len: usize, record: usize },

    #[error("mirror worker is no longer running")]
    WorkerDisconnected,
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
