//! Physics components for ECS entities.

use glam::Vec2;

use crate::physics::collider::Collider;
use crate::physics::config::{BodyDefaults, SleepConfig};

/// How a body takes part in collision resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionType {
    /// Moved by contacts, gravity and impulses.
    Active,
    /// Never moved by the solver. May still move by its own velocity.
    Fixed,
    /// Detected and reported, never resolved.
    Passive,
    /// Excluded from collision entirely.
    PreventCollision,
}

/// Category/mask filter. Two bodies may collide when each one's mask
/// contains the other's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionGroup {
    pub category: u32,
    pub mask: u32,
}

impl CollisionGroup {
    /// Collides with everything.
    pub const ALL: Self = Self {
        category: u32::MAX,
        mask: u32::MAX,
    };
    /// Collides with nothing.
    pub const NONE: Self = Self {
        category: 0,
        mask: 0,
    };

    pub const fn new(category: u32, mask: u32) -> Self {
        Self { category, mask }
    }

    pub fn collides_with(&self, other: &CollisionGroup) -> bool {
        (self.category & other.mask) != 0 && (other.category & self.mask) != 0
    }

    /// Group that collides with everything this group does not.
    pub fn invert(&self) -> Self {
        Self {
            category: !self.category,
            mask: !self.mask,
        }
    }
}

impl Default for CollisionGroup {
    fn default() -> Self {
        Self::ALL
    }
}

/// Sleep state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    Awake,
    Sleeping,
}

/// Sleep bookkeeping for a body.
#[derive(Debug, Clone, Copy)]
pub struct SleepInfo {
    pub state: SleepState,
    /// Exponential moving average of `|v|^2 + w^2`.
    pub motion: f32,
    /// Seconds spent continuously below the sleep threshold.
    pub timer: f32,
    pub can_sleep: bool,
}

impl SleepInfo {
    pub fn new(can_sleep: bool, initial_motion: f32) -> Self {
        Self {
            state: SleepState::Awake,
            motion: initial_motion,
            timer: 0.0,
            can_sleep,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.state == SleepState::Sleeping
    }

    /// Fold the current velocities into the moving average and advance the
    /// still timer.
    pub fn update_motion(&mut self, linear_velocity: Vec2, angular_velocity: f32, config: &SleepConfig, dt: f32) {
        let current = linear_velocity.length_squared() + angular_velocity * angular_velocity;
        let motion = config.sleep_bias * self.motion + (1.0 - config.sleep_bias) * current;
        self.motion = motion.min(10.0 * config.sleep_epsilon);
        if self.is_candidate(config) {
            self.timer += dt;
        } else {
            self.timer = 0.0;
        }
    }

    /// Still enough to fall asleep once the rest of its island agrees.
    pub fn is_candidate(&self, config: &SleepConfig) -> bool {
        self.can_sleep && self.motion < config.sleep_epsilon
    }

    pub(crate) fn wake(&mut self, wake_motion: f32) {
        self.state = SleepState::Awake;
        self.timer = 0.0;
        self.motion = wake_motion;
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedInertia {
    mass: f32,
    revision: u32,
    value: f32,
}

/// Per-body overrides merged onto [`BodyDefaults`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyOptions {
    pub collision_type: Option<CollisionType>,
    pub group: Option<CollisionGroup>,
    pub mass: Option<f32>,
    pub restitution: Option<f32>,
    pub friction: Option<f32>,
    pub can_sleep: Option<bool>,
    pub use_gravity: Option<bool>,
    pub lock_rotation: Option<bool>,
}

/// Rigid body component.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub collision_type: CollisionType,
    pub group: CollisionGroup,
    mass: f32,
    inertia: Option<CachedInertia>,
    pub linear_velocity: Vec2,
    /// Constant acceleration applied every step on top of gravity.
    pub acceleration: Vec2,
    pub angular_velocity: f32,
    pub torque: f32,
    /// Coefficient of restitution (0.0 - 1.0).
    pub restitution: f32,
    /// Friction coefficient (0.0 - 1.0).
    pub friction: f32,
    pub use_gravity: bool,
    pub lock_rotation: bool,
    /// Inactive bodies are neither integrated nor collided.
    pub active: bool,
    pub sleep: SleepInfo,
    pub(crate) old_position: Vec2,
    pub(crate) old_rotation: f32,
    pub(crate) island: Option<usize>,
}

impl RigidBody {
    /// Create a body from config defaults plus per-body overrides.
    pub fn with_options(defaults: &BodyDefaults, options: BodyOptions) -> Self {
        let collision_type = options.collision_type.unwrap_or(CollisionType::Active);
        let can_sleep = options.can_sleep.unwrap_or(defaults.can_sleep);
        Self {
            collision_type,
            group: options.group.unwrap_or_default(),
            mass: options.mass.unwrap_or(defaults.mass).max(f32::EPSILON),
            inertia: None,
            linear_velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            angular_velocity: 0.0,
            torque: 0.0,
            restitution: options.restitution.unwrap_or(defaults.restitution),
            friction: options.friction.unwrap_or(defaults.friction),
            use_gravity: options.use_gravity.unwrap_or(true),
            lock_rotation: options.lock_rotation.unwrap_or(false),
            active: true,
            sleep: SleepInfo::new(can_sleep, defaults.initial_sleep_motion),
            old_position: Vec2::ZERO,
            old_rotation: 0.0,
            island: None,
        }
    }

    /// Create a new active rigid body with the given mass.
    pub fn new_active(mass: f32) -> Self {
        Self::with_options(
            &BodyDefaults::default(),
            BodyOptions {
                mass: Some(mass),
                ..Default::default()
            },
        )
    }

    /// Create a new fixed rigid body.
    pub fn new_fixed() -> Self {
        Self::with_collision_type(CollisionType::Fixed)
    }

    /// Create a new passive rigid body (detected, never resolved).
    pub fn new_passive() -> Self {
        Self::with_collision_type(CollisionType::Passive)
    }

    fn with_collision_type(collision_type: CollisionType) -> Self {
        Self::with_options(
            &BodyDefaults::default(),
            BodyOptions {
                collision_type: Some(collision_type),
                ..Default::default()
            },
        )
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Set mass. Invalidates the cached moment of inertia.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(f32::EPSILON);
        self.inertia = None;
    }

    pub fn is_fixed(&self) -> bool {
        self.collision_type == CollisionType::Fixed
    }

    /// Zero for fixed bodies.
    pub fn inverse_mass(&self) -> f32 {
        if self.is_fixed() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Moment of inertia derived from the attached collider, cached until
    /// the mass or the collider geometry changes.
    pub fn inertia(&mut self, collider: &Collider) -> f32 {
        let revision = collider.revision();
        match self.inertia {
            Some(cached) if cached.mass == self.mass && cached.revision == revision => cached.value,
            _ => {
                let value = collider.inertia(self.mass);
                self.inertia = Some(CachedInertia {
                    mass: self.mass,
                    revision,
                    value,
                });
                value
            }
        }
    }

    /// Last cached inertia, if any.
    pub fn cached_inertia(&self) -> Option<f32> {
        self.inertia.map(|c| c.value)
    }

    /// Zero for fixed bodies, rotation locked bodies, or before the inertia is known.
    pub fn inverse_inertia(&self) -> f32 {
        if self.is_fixed() || self.lock_rotation {
            return 0.0;
        }
        match self.inertia {
            Some(cached) if cached.value > 0.0 => 1.0 / cached.value,
            _ => 0.0,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep.is_sleeping()
    }

    /// Put the body to sleep (zeroing its motion) or wake it.
    pub fn set_sleeping(&mut self, sleeping: bool, wake_motion: f32) {
        if sleeping {
            self.sleep.state = SleepState::Sleeping;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.sleep.motion = 0.0;
        } else {
            self.sleep.wake(wake_motion);
        }
    }

    /// Position before the most recent integration step.
    pub fn old_position(&self) -> Vec2 {
        self.old_position
    }

    /// Island index assigned during the last step, if any.
    pub fn island(&self) -> Option<usize> {
        self.island
    }

    /// Apply an impulse at the center of mass.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2) {
        if self.collision_type != CollisionType::Active {
            return;
        }
        self.linear_velocity += impulse * self.inverse_mass();
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32) {
        if self.collision_type != CollisionType::Active {
            return;
        }
        self.angular_velocity += impulse * self.inverse_inertia();
    }

    /// Apply an impulse at a world point; `position` is the body's world position.
    pub fn apply_impulse(&mut self, point: Vec2, impulse: Vec2, position: Vec2) {
        self.apply_linear_impulse(impulse);
        self.apply_angular_impulse((point - position).perp_dot(impulse));
    }
}

impl Default for RigidBody {
    fn default() -> Self {
        Self::new_active(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_group_filtering() {
        let player = CollisionGroup::new(0b01, 0b10);
        let enemy = CollisionGroup::new(0b10, 0b01);
        let ghost = CollisionGroup::new(0b01, 0b00);

        assert!(player.collides_with(&enemy));
        assert!(!player.collides_with(&player));
        assert!(!ghost.collides_with(&enemy));
        assert!(CollisionGroup::ALL.collides_with(&player));
        assert!(!CollisionGroup::NONE.collides_with(&CollisionGroup::ALL));
        assert!(player.invert().collides_with(&player.invert().invert().invert()));
    }

    #[test]
    fn test_fixed_body_has_zero_inverse_mass() {
        let mut body = RigidBody::new_fixed();
        body.set_mass(50.0);
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.inverse_inertia(), 0.0);
    }

    #[test]
    fn test_inertia_is_cached_until_mass_changes() {
        let collider = Collider::circle(2.0);
        let mut body = RigidBody::new_active(4.0);
        let first = body.inertia(&collider);
        assert!((first - 8.0).abs() < 1e-5, "m r^2 / 2 = 8, got {first}");
        assert_eq!(body.cached_inertia(), Some(first));

        body.set_mass(1.0);
        assert_eq!(body.cached_inertia(), None);
        assert!((body.inertia(&collider) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_options_override_defaults() {
        let defaults = BodyDefaults::default();
        let body = RigidBody::with_options(
            &defaults,
            BodyOptions {
                collision_type: Some(CollisionType::Passive),
                friction: Some(0.9),
                can_sleep: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(body.collision_type, CollisionType::Passive);
        assert_eq!(body.friction, 0.9);
        assert_eq!(body.restitution, defaults.restitution);
        assert!(!body.sleep.can_sleep);
    }

    #[test]
    fn test_impulse_ignored_by_non_active() {
        let mut fixed = RigidBody::new_fixed();
        fixed.apply_linear_impulse(Vec2::X * 10.0);
        assert_eq!(fixed.linear_velocity, Vec2::ZERO);

        let mut active = RigidBody::new_active(2.0);
        active.apply_linear_impulse(Vec2::X * 10.0);
        assert_eq!(active.linear_velocity, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn test_sleeping_zeroes_motion() {
        let mut body = RigidBody::new_active(1.0);
        body.linear_velocity = Vec2::new(1.0, 1.0);
        body.angular_velocity = 2.0;
        body.set_sleeping(true, 0.35);
        assert!(body.is_sleeping());
        assert_eq!(body.linear_velocity, Vec2::ZERO);
        assert_eq!(body.angular_velocity, 0.0);

        body.set_sleeping(false, 0.35);
        assert!(!body.is_sleeping());
        assert_eq!(body.sleep.motion, 0.35);
    }

    #[test]
    fn test_sleep_motion_average() {
        let config = SleepConfig::default();
        let mut info = SleepInfo::new(true, 0.0);
        info.update_motion(Vec2::new(3.0, 4.0), 0.0, &config, 0.5);
        assert!((info.motion - 10.0 * config.sleep_epsilon).abs() < 1e-6, "clamped, got {}", info.motion);
        assert_eq!(info.timer, 0.0);

        let mut still = SleepInfo::new(true, 0.0);
        still.update_motion(Vec2::ZERO, 0.0, &config, 0.5);
        still.update_motion(Vec2::ZERO, 0.0, &config, 0.5);
        assert!(still.is_candidate(&config));
        assert!((still.timer - 1.0).abs() < 1e-6);

        let mut restless = SleepInfo::new(false, 0.0);
        restless.update_motion(Vec2::ZERO, 0.0, &config, 0.5);
        assert!(!restless.is_candidate(&config));
        assert_eq!(restless.timer, 0.0);
    }
}
