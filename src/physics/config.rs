//! Simulation configuration.
//!
//! Every value is read when the world steps, so changes made through
//! [`PhysicsWorld::set_config`](super::PhysicsWorld::set_config) apply on the
//! next step.

use glam::Vec2;

use super::bounds::BoundingBox;
use super::broadphase::BroadphaseKind;
use crate::error::{PhysicsError, Result};

/// Contact solver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverKind {
    /// Positional correction only; cheap and stable for platformers.
    Arcade,
    /// Sequential impulses with friction, restitution, and warm starting.
    #[default]
    Realistic,
}

/// Axis the arcade solver resolves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactSolveBias {
    #[default]
    None,
    VerticalFirst,
    HorizontalFirst,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadphaseConfig {
    pub kind: BroadphaseKind,
    /// Fixed padding added to every fat bound. Default: 0.1.
    pub padding: f32,
    /// Scale applied to `velocity * elapsed` when extending fat bounds. Default: 2.0.
    pub velocity_multiplier: f32,
    /// Hash grid cell edge length. Default: 2.0.
    pub cell_size: f32,
    /// Colliders leaving these bounds are untracked.
    pub world_bounds: Option<BoundingBox>,
}

impl Default for BroadphaseConfig {
    fn default() -> Self {
        Self {
            kind: BroadphaseKind::default(),
            padding: 0.1,
            velocity_multiplier: 2.0,
            cell_size: 2.0,
            world_bounds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastBodyConfig {
    pub enabled: bool,
    /// Ray cast every active body regardless of its speed.
    pub force: bool,
    /// Distance a snapped body is left inside the surface it hit. Default: 0.01.
    pub surface_epsilon: f32,
}

impl Default for FastBodyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force: false,
            surface_epsilon: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealisticConfig {
    /// Default: 8.
    pub velocity_iterations: u32,
    /// Default: 3.
    pub position_iterations: u32,
    /// Penetration left unresolved to keep resting contacts stable. Default: 0.005.
    pub slop: f32,
    /// Baumgarte factor. Default: 0.2.
    pub steering_factor: f32,
    /// Most negative correction per iteration. Default: -0.2.
    pub max_correction: f32,
    pub warm_start: bool,
    /// Reuse a cached impulse when the contact point moved less than this. Default: 0.1.
    pub warm_start_distance: f32,
    /// Approach speed below which restitution is ignored. Default: 1.0.
    pub restitution_velocity_threshold: f32,
}

impl Default for RealisticConfig {
    fn default() -> Self {
        Self {
            velocity_iterations: 8,
            position_iterations: 3,
            slop: 0.005,
            steering_factor: 0.2,
            max_correction: -0.2,
            warm_start: true,
            warm_start_distance: 0.1,
            restitution_velocity_threshold: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArcadeConfig {
    pub contact_solve_bias: ContactSolveBias,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepConfig {
    pub enabled: bool,
    /// Motion below which a body may fall asleep. Default: 0.07.
    pub sleep_epsilon: f32,
    /// Motion above which a sleeping island wakes. Default: 0.21.
    pub wake_threshold: f32,
    /// Weight of the previous motion in the moving average. Default: 0.9.
    pub sleep_bias: f32,
    /// Seconds an island must stay still before sleeping. Default: 1.0.
    pub sleep_time: f32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sleep_epsilon: 0.07,
            wake_threshold: 0.07 * 3.0,
            sleep_bias: 0.9,
            sleep_time: 1.0,
        }
    }
}

/// Values used for body fields left unset in [`BodyOptions`](crate::ecs::components::physics::BodyOptions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDefaults {
    pub mass: f32,
    pub restitution: f32,
    pub friction: f32,
    pub can_sleep: bool,
    /// Motion given to a freshly created or woken body.
    pub initial_sleep_motion: f32,
}

impl Default for BodyDefaults {
    fn default() -> Self {
        Self {
            mass: 1.0,
            restitution: 0.2,
            friction: 0.5,
            can_sleep: true,
            initial_sleep_motion: 0.07 * 5.0,
        }
    }
}

/// Configuration for the physics simulation.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, -9.81).
    pub gravity: Vec2,
    /// Fixed timestep for physics updates in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per frame. Default: 4.
    pub max_substeps: u32,
    pub solver: SolverKind,
    pub broadphase: BroadphaseConfig,
    pub fast_body: FastBodyConfig,
    pub realistic: RealisticConfig,
    pub arcade: ArcadeConfig,
    pub sleep: SleepConfig,
    pub body: BodyDefaults,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            solver: SolverKind::default(),
            broadphase: BroadphaseConfig::default(),
            fast_body: FastBodyConfig::default(),
            realistic: RealisticConfig::default(),
            arcade: ArcadeConfig::default(),
            sleep: SleepConfig::default(),
            body: BodyDefaults::default(),
        }
    }
}

impl PhysicsConfig {
    /// Rejects settings the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_timestep > 0.0) {
            return Err(PhysicsError::InvalidConfig("fixed_timestep must be positive"));
        }
        if self.max_substeps == 0 {
            return Err(PhysicsError::InvalidConfig("max_substeps must be at least 1"));
        }
        if self.realistic.velocity_iterations == 0 || self.realistic.position_iterations == 0 {
            return Err(PhysicsError::InvalidConfig(
                "solver iteration counts must be at least 1",
            ));
        }
        if !(self.broadphase.cell_size > 0.0) {
            return Err(PhysicsError::InvalidConfig("cell_size must be positive"));
        }
        if self.broadphase.padding < 0.0 || self.broadphase.velocity_multiplier < 0.0 {
            return Err(PhysicsError::InvalidConfig(
                "broadphase padding and velocity multiplier must not be negative",
            ));
        }
        if self.realistic.max_correction > 0.0 {
            return Err(PhysicsError::InvalidConfig("max_correction must not be positive"));
        }
        if !(0.0..=1.0).contains(&self.sleep.sleep_bias) {
            return Err(PhysicsError::InvalidConfig("sleep_bias must be within 0..=1"));
        }
        if self.fast_body.surface_epsilon < 0.0 {
            return Err(PhysicsError::InvalidConfig("surface_epsilon must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PhysicsConfig::default();
        assert_eq!(config.gravity, Vec2::new(0.0, -9.81));
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < 1e-10);
        assert_eq!(config.max_substeps, 4);
        assert_eq!(config.solver, SolverKind::Realistic);
        assert_eq!(config.broadphase.kind, BroadphaseKind::AabbTree);
        assert!((config.realistic.slop - 0.005).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PhysicsConfig::default();
        config.fixed_timestep = 0.0;
        assert!(matches!(config.validate(), Err(PhysicsError::InvalidConfig(_))));

        let mut config = PhysicsConfig::default();
        config.realistic.velocity_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = PhysicsConfig::default();
        config.broadphase.cell_size = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = PhysicsConfig::default();
        config.sleep.sleep_bias = 1.5;
        assert!(config.validate().is_err());
    }
}
