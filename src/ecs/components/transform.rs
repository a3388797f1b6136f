//! Transform components for ECS entities.

use glam::{Affine2, Vec2};

/// Local-space transform. Stores position, rotation (radians), and scale separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Transform {
    /// Create an identity transform.
    pub fn identity() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }

    /// Create a transform from a position.
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Create a transform from a position and a rotation in radians.
    pub fn from_position_rotation(position: Vec2, rotation: f32) -> Self {
        Self {
            position,
            rotation,
            scale: Vec2::ONE,
        }
    }

    /// Convert to an affine matrix (translation * rotation * scale).
    pub fn to_affine(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// World-space transform matrix. Refreshed by `rigid_body::sync_transforms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalTransform(pub Affine2);

impl GlobalTransform {
    pub fn from_transform(transform: &Transform) -> Self {
        Self(transform.to_affine())
    }

    pub fn translation(&self) -> Vec2 {
        self.0.translation
    }
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self(Affine2::IDENTITY)
    }
}
