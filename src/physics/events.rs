//! Collision notifications and user hooks.
//!
//! Events are collected during a step and drained by the caller afterwards.
//! Pre and post collision events are reported once per participant for every
//! resolved contact. Start and end events are reported per logical pair, so a
//! composite touching something with several children produces one start.

use std::collections::HashMap;

use glam::Vec2;

use super::collider::{ColliderHandle, ColliderId};
use super::contact::Contact;
use super::pair::PairId;

/// Face of an axis aligned box a direction points through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    None,
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    /// Classify by the dominant axis of `direction` (y up).
    pub fn from_direction(direction: Vec2) -> Side {
        if direction == Vec2::ZERO || !direction.is_finite() {
            return Side::None;
        }
        if direction.x.abs() >= direction.y.abs() {
            if direction.x < 0.0 {
                Side::Left
            } else {
                Side::Right
            }
        } else if direction.y < 0.0 {
            Side::Bottom
        } else {
            Side::Top
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::None => Side::None,
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }
}

/// Notification addressed to one participant of a collision.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionEvent {
    /// A contact is about to be resolved.
    PreCollision {
        this: ColliderHandle,
        other: ColliderHandle,
        side: Side,
        mtv: Vec2,
    },
    /// A contact was resolved this step.
    PostCollision {
        this: ColliderHandle,
        other: ColliderHandle,
        side: Side,
        mtv: Vec2,
    },
    /// First step the logical pair touches.
    CollisionStart {
        this: ColliderHandle,
        other: ColliderHandle,
        side: Side,
        contact: Contact,
    },
    /// First step the logical pair no longer touches.
    CollisionEnd {
        this: ColliderHandle,
        other: ColliderHandle,
    },
}

impl CollisionEvent {
    /// Collider the event is addressed to.
    pub fn this(&self) -> ColliderHandle {
        match self {
            CollisionEvent::PreCollision { this, .. }
            | CollisionEvent::PostCollision { this, .. }
            | CollisionEvent::CollisionStart { this, .. }
            | CollisionEvent::CollisionEnd { this, .. } => *this,
        }
    }

    pub fn other(&self) -> ColliderHandle {
        match self {
            CollisionEvent::PreCollision { other, .. }
            | CollisionEvent::PostCollision { other, .. }
            | CollisionEvent::CollisionStart { other, .. }
            | CollisionEvent::CollisionEnd { other, .. } => *other,
        }
    }
}

/// Event queue filled during a step.
#[derive(Debug, Default)]
pub struct CollisionEvents {
    events: Vec<CollisionEvent>,
}

impl CollisionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CollisionEvent) {
        self.events.push(event);
    }

    /// PreCollision for both participants; B sees the opposite side.
    pub fn pre_collision(&mut self, contact: &Contact) {
        let side = contact.side();
        self.push(CollisionEvent::PreCollision {
            this: contact.collider_a,
            other: contact.collider_b,
            side,
            mtv: contact.mtv,
        });
        self.push(CollisionEvent::PreCollision {
            this: contact.collider_b,
            other: contact.collider_a,
            side: side.opposite(),
            mtv: -contact.mtv,
        });
    }

    /// PostCollision for both participants; B sees the opposite side.
    pub fn post_collision(&mut self, contact: &Contact) {
        let side = contact.side();
        self.push(CollisionEvent::PostCollision {
            this: contact.collider_a,
            other: contact.collider_b,
            side,
            mtv: contact.mtv,
        });
        self.push(CollisionEvent::PostCollision {
            this: contact.collider_b,
            other: contact.collider_a,
            side: side.opposite(),
            mtv: -contact.mtv,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, CollisionEvent> {
        self.events.drain(..)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// User callbacks consulted while solving.
pub trait CollisionHooks {
    /// Return false to cancel the contact before it is resolved.
    fn pre_collision(&mut self, contact: &Contact) -> bool {
        let _ = contact;
        true
    }
}

impl CollisionHooks for () {}

/// Tracks touching logical pairs across steps to derive start and end events.
#[derive(Debug, Default)]
pub struct ContactTracker {
    touching: HashMap<PairId, Contact>,
}

impl ContactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare this step's contacts against the previous step's.
    /// Cancelled contacts count as not touching.
    pub fn update(&mut self, contacts: &[Contact], events: &mut CollisionEvents) {
        let mut current: HashMap<PairId, Contact> = HashMap::with_capacity(contacts.len());
        for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
            current.entry(contact.logical_id).or_insert_with(|| contact.clone());
        }

        for (id, contact) in &current {
            if self.touching.contains_key(id) {
                continue;
            }
            tracing::trace!("collision start {}", id);
            let side = contact.side();
            events.push(CollisionEvent::CollisionStart {
                this: contact.collider_a,
                other: contact.collider_b,
                side,
                contact: contact.clone(),
            });
            events.push(CollisionEvent::CollisionStart {
                this: contact.collider_b,
                other: contact.collider_a,
                side: side.opposite(),
                contact: contact.clone().flip(),
            });
        }

        for (id, contact) in &self.touching {
            if current.contains_key(id) {
                continue;
            }
            tracing::trace!("collision end {}", id);
            events.push(CollisionEvent::CollisionEnd {
                this: contact.collider_a,
                other: contact.collider_b,
            });
            events.push(CollisionEvent::CollisionEnd {
                this: contact.collider_b,
                other: contact.collider_a,
            });
        }

        self.touching = current;
    }

    /// Logical pairs touching as of the last update.
    pub fn is_touching(&self, id: PairId) -> bool {
        self.touching.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.touching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touching.is_empty()
    }

    /// Forget pairs involving a removed collider, reporting their end.
    pub fn forget(&mut self, id: ColliderId, events: &mut CollisionEvents) {
        self.touching.retain(|pair, contact| {
            if pair.low() != id && pair.high() != id {
                return true;
            }
            events.push(CollisionEvent::CollisionEnd {
                this: contact.collider_a,
                other: contact.collider_b,
            });
            events.push(CollisionEvent::CollisionEnd {
                this: contact.collider_b,
                other: contact.collider_a,
            });
            false
        });
    }
}
