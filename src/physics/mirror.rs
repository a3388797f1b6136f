//! Flat body records for integrating off the main thread.
//!
//! [`snapshot`] copies the integrable state of every body into plain
//! [`BodyRecord`]s that can cross a thread or process boundary as bytes.
//! [`integrate_records`] advances them the same way
//! [`rigid_body::integrate`](super::rigid_body::integrate) advances the world,
//! and [`apply`] copies the results back.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use glam::Vec2;
use hecs::Entity;

use crate::ecs::components::physics::{CollisionType, RigidBody};
use crate::ecs::components::transform::Transform;
use crate::error::{PhysicsError, Result};

const FLAG_ACTIVE: u32 = 1;
const FLAG_SLEEPING: u32 = 1 << 1;
const FLAG_GRAVITY: u32 = 1 << 2;
const FLAG_LOCK_ROTATION: u32 = 1 << 3;
const FLAG_ACCELERATES: u32 = 1 << 4;

/// Body state layout shared with the worker.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BodyRecord {
    pub entity_lo: u32,
    pub entity_hi: u32,
    pub flags: u32,
    pub position: [f32; 2],
    pub rotation: f32,
    pub linear_velocity: [f32; 2],
    pub angular_velocity: f32,
    pub acceleration: [f32; 2],
    pub torque: f32,
    pub inverse_inertia: f32,
}

impl BodyRecord {
    pub const SIZE: usize = std::mem::size_of::<BodyRecord>();

    pub fn new(entity: Entity, transform: &Transform, body: &RigidBody) -> Self {
        let bits = entity.to_bits().get();
        let mut flags = 0;
        if body.active {
            flags |= FLAG_ACTIVE;
        }
        if body.is_sleeping() {
            flags |= FLAG_SLEEPING;
        }
        if body.use_gravity {
            flags |= FLAG_GRAVITY;
        }
        if body.lock_rotation {
            flags |= FLAG_LOCK_ROTATION;
        }
        if body.collision_type == CollisionType::Active {
            flags |= FLAG_ACCELERATES;
        }
        Self {
            entity_lo: bits as u32,
            entity_hi: (bits >> 32) as u32,
            flags,
            position: transform.position.to_array(),
            rotation: transform.rotation,
            linear_velocity: body.linear_velocity.to_array(),
            angular_velocity: body.angular_velocity,
            acceleration: body.acceleration.to_array(),
            torque: body.torque,
            inverse_inertia: body.inverse_inertia(),
        }
    }

    pub fn entity(&self) -> Option<Entity> {
        Entity::from_bits(u64::from(self.entity_lo) | (u64::from(self.entity_hi) << 32))
    }

    fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Records for every body with a `Transform`, in entity order.
pub fn snapshot(world: &hecs::World) -> Vec<BodyRecord> {
    let mut records: Vec<(Entity, BodyRecord)> = world
        .query::<(&Transform, &RigidBody)>()
        .iter()
        .map(|(entity, (transform, body))| (entity, BodyRecord::new(entity, transform, body)))
        .collect();
    records.sort_by_key(|(entity, _)| entity.id());
    records.into_iter().map(|(_, record)| record).collect()
}

/// Copy poses and velocities back. Records for despawned entities are
/// skipped. Returns the number of bodies written.
pub fn apply(world: &mut hecs::World, records: &[BodyRecord]) -> usize {
    let mut written = 0;
    for record in records {
        let Some(entity) = record.entity() else {
            continue;
        };
        let Ok((transform, body)) = world.query_one_mut::<(&mut Transform, &mut RigidBody)>(entity) else {
            tracing::debug!("mirror record for missing entity {:?}", entity);
            continue;
        };
        body.old_position = transform.position;
        body.old_rotation = transform.rotation;
        transform.position = Vec2::from_array(record.position);
        transform.rotation = record.rotation;
        body.linear_velocity = Vec2::from_array(record.linear_velocity);
        body.angular_velocity = record.angular_velocity;
        written += 1;
    }
    written
}

pub fn encode(records: &[BodyRecord]) -> Vec<u8> {
    bytemuck::cast_slice(records).to_vec()
}

/// Decode a buffer produced by [`encode`]. The buffer need not be aligned.
pub fn decode(bytes: &[u8]) -> Result<Vec<BodyRecord>> {
    if bytes.len() % BodyRecord::SIZE != 0 {
        return Err(PhysicsError::MisalignedRecords {
            len: bytes.len(),
            record: BodyRecord::SIZE,
        });
    }
    Ok(bytes
        .chunks_exact(BodyRecord::SIZE)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// Euler step over flat records, matching the world integrator.
pub fn integrate_records(records: &mut [BodyRecord], gravity: Vec2, dt: f32) {
    for record in records.iter_mut() {
        if !record.has(FLAG_ACTIVE) || record.has(FLAG_SLEEPING) {
            continue;
        }
        let mut acceleration = Vec2::ZERO;
        if record.has(FLAG_ACCELERATES) {
            acceleration = Vec2::from_array(record.acceleration);
            if record.has(FLAG_GRAVITY) {
                acceleration += gravity;
            }
        }
        let mut velocity = Vec2::from_array(record.linear_velocity);
        record.angular_velocity += record.torque * record.inverse_inertia * dt;

        let position = Vec2::from_array(record.position) + velocity * dt + 0.5 * acceleration * dt * dt;
        velocity += acceleration * dt;
        record.position = position.to_array();
        record.linear_velocity = velocity.to_array();
        if !record.has(FLAG_LOCK_ROTATION) {
            record.rotation += record.angular_velocity * dt;
        }
    }
}

struct Request {
    bytes: Vec<u8>,
    gravity: Vec2,
    dt: f32,
}

/// Background thread integrating encoded records.
pub struct MirrorWorker {
    requests: Option<Sender<Request>>,
    responses: Receiver<Result<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl MirrorWorker {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            for request in request_rx {
                let response = decode(&request.bytes).map(|mut records| {
                    integrate_records(&mut records, request.gravity, request.dt);
                    encode(&records)
                });
                if response_tx.send(response).is_err() {
                    break;
                }
            }
            tracing::trace!("mirror worker exiting");
        });

        Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
        }
    }

    /// Queue one integration step.
    pub fn submit(&self, records: &[BodyRecord], gravity: Vec2, dt: f32) -> Result<()> {
        let requests = self.requests.as_ref().ok_or(PhysicsError::WorkerDisconnected)?;
        requests
            .send(Request {
                bytes: encode(records),
                gravity,
                dt,
            })
            .map_err(|_| PhysicsError::WorkerDisconnected)
    }

    /// Block until the oldest queued step finishes.
    pub fn receive(&self) -> Result<Vec<BodyRecord>> {
        let bytes = self
            .responses
            .recv()
            .map_err(|_| PhysicsError::WorkerDisconnected)??;
        decode(&bytes)
    }

    /// Integrate the whole world on the worker and write the result back.
    pub fn step(&self, world: &mut hecs::World, gravity: Vec2, dt: f32) -> Result<usize> {
        self.submit(&snapshot(world), gravity, dt)?;
        let records = self.receive()?;
        Ok(apply(world, &records))
    }
}

impl Drop for MirrorWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("mirror worker panicked");
            }
        }
    }
}
