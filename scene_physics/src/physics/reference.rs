//! Small deterministic in-process solver
//!
//! Integrates gravity and velocity with explicit Euler, reports overlapping
//! shapes as contacts and answers ray queries analytically. Joints are stored
//! but not solved; they only suppress contacts between the bodies they connect.

use crate::error::PhysicsError;
use crate::physics::accumulator::PhysicsAccumulator;
use crate::physics::collision::broad_phase::sweep_and_prune;
use crate::physics::collision::shapes::shapes_overlap;
use crate::physics::collision::{Ray, AABB};
use crate::physics::components::ColliderShape;
use crate::physics::pair_hash::ShapeId;
use crate::physics::solver::{
    BodyDesc, BodyHandle, JointDesc, JointHandle, RawContact, RayQuery, RaySegment,
    RaycastControl, RaycastMode, ShapeDesc, Solver, SolverHit, TimestepPolicy,
};
use glam::{Quat, Vec3};
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

const VELOCITY_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone)]
struct ReferenceBody {
    mass: f32,
    position: Vec3,
    rotation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    linear_damping: f32,
    angular_damping: f32,
    collision_group: u32,
    collision_mask: u32,
    shapes: Vec<ShapeDesc>,
    shape_ids: Vec<ShapeId>,
}

impl ReferenceBody {
    fn is_dynamic(&self) -> bool {
        self.mass > 0.0
    }

    /// World pose of the shape at `index`
    fn shape_pose(&self, index: usize) -> (Vec3, Quat) {
        let shape = &self.shapes[index];
        (
            self.position + self.rotation * shape.offset,
            self.rotation * shape.rotation,
        )
    }

    fn accepts(&self, group: u32, mask: u32) -> bool {
        self.collision_group & mask != 0 && self.collision_mask & group != 0
    }
}

/// Shape placed in the world for one step
struct PlacedShape {
    body: BodyHandle,
    shape: ShapeId,
    geometry: ColliderShape,
    pose: (Vec3, Quat),
}

/// Reference implementation of [`Solver`]
#[derive(Debug, Default)]
pub struct ReferenceSolver {
    bodies: BTreeMap<BodyHandle, ReferenceBody>,
    joints: BTreeMap<JointHandle, JointDesc>,
    gravity: Vec3,
    accumulator: Option<PhysicsAccumulator>,
    next_body: u32,
    next_joint: u32,
    next_shape: u32,
    /// Ids released by removed bodies, handed out before fresh ones
    free_shapes: Vec<ShapeId>,
    steps_taken: u64,
    contacts: Vec<RawContact>,
}

impl ReferenceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Internal steps run since creation
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn contains_body(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body)
    }

    pub fn body_mass(&self, body: BodyHandle) -> Option<f32> {
        self.bodies.get(&body).map(|b| b.mass)
    }

    pub fn body_velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.linear_velocity)
    }

    pub fn set_body_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        let state = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        state.linear_velocity = velocity;
        Ok(())
    }

    /// Geometry and response flag of a shape
    pub fn shape(&self, body: BodyHandle, shape: ShapeId) -> Option<(ColliderShape, bool)> {
        let state = self.bodies.get(&body)?;
        let index = state.shape_ids.iter().position(|id| *id == shape)?;
        let desc = &state.shapes[index];
        Some((desc.geometry, desc.collision_response))
    }

    /// Local offset of a shape from its body origin
    pub fn shape_offset(&self, body: BodyHandle, shape: ShapeId) -> Option<Vec3> {
        let state = self.bodies.get(&body)?;
        let index = state.shape_ids.iter().position(|id| *id == shape)?;
        Some(state.shapes[index].offset)
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = self.gravity;
        for body in self.bodies.values_mut().filter(|b| b.is_dynamic()) {
            body.linear_velocity += gravity * dt;
            body.linear_velocity *= (1.0 - body.linear_damping).clamp(0.0, 1.0).powf(dt);
            body.angular_velocity *= (1.0 - body.angular_damping).clamp(0.0, 1.0).powf(dt);

            if body.linear_velocity.length_squared() > VELOCITY_EPSILON {
                body.position += body.linear_velocity * dt;
            }

            if body.angular_velocity.length_squared() > VELOCITY_EPSILON {
                let angle = body.angular_velocity.length() * dt;
                let axis = body.angular_velocity.normalize();
                body.rotation = (Quat::from_axis_angle(axis, angle) * body.rotation).normalize();
            }
        }
    }

    fn detect_contacts(&mut self) {
        self.contacts.clear();

        let placed: Vec<PlacedShape> = self
            .bodies
            .iter()
            .flat_map(|(&handle, body)| {
                (0..body.shapes.len()).map(move |index| PlacedShape {
                    body: handle,
                    shape: body.shape_ids[index],
                    geometry: body.shapes[index].geometry,
                    pose: body.shape_pose(index),
                })
            })
            .collect();
        let bounds: Vec<AABB> = placed
            .iter()
            .map(|p| p.geometry.world_aabb(p.pose.0, p.pose.1))
            .collect();

        let jointed: HashSet<(BodyHandle, BodyHandle)> = self
            .joints
            .values()
            .filter(|joint| !joint.collide_connected)
            .map(|joint| ordered(joint.body_a, joint.body_b))
            .collect();

        for (i, j) in sweep_and_prune(&bounds) {
            let (a, b) = (&placed[i], &placed[j]);
            if a.body == b.body || jointed.contains(&ordered(a.body, b.body)) {
                continue;
            }

            let (Some(body_a), Some(body_b)) = (self.bodies.get(&a.body), self.bodies.get(&b.body))
            else {
                continue;
            };
            if !body_a.is_dynamic() && !body_b.is_dynamic() {
                continue;
            }
            if !body_a.accepts(body_b.collision_group, body_b.collision_mask) {
                continue;
            }

            if shapes_overlap(&a.geometry, a.pose, &b.geometry, b.pose) {
                self.contacts.push(RawContact::new(a.shape, b.shape));
            }
        }
    }

    /// Take `count` shape ids, reusing released ones first
    fn allocate_shapes(&mut self, count: usize) -> Result<Vec<ShapeId>, PhysicsError> {
        let mut ids = Vec::with_capacity(count);
        while ids.len() < count {
            if let Some(id) = self.free_shapes.pop() {
                ids.push(id);
                continue;
            }
            match ShapeId::try_from(self.next_shape) {
                Ok(id) => {
                    self.next_shape += 1;
                    ids.push(id);
                }
                Err(err) => {
                    self.free_shapes.extend(ids);
                    return Err(err);
                }
            }
        }
        Ok(ids)
    }

    fn sub_step(&mut self, dt: f32, on_post_step: &mut dyn FnMut(&[RawContact])) {
        self.integrate(dt);
        self.detect_contacts();
        self.steps_taken += 1;
        trace!(dt, contacts = self.contacts.len(), "Reference solver step");
        on_post_step(&self.contacts);
    }
}

fn ordered(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Solver for ReferenceSolver {
    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, PhysicsError> {
        let shape_ids = self.allocate_shapes(desc.shapes.len())?;

        let handle = BodyHandle(self.next_body);
        self.next_body += 1;

        self.bodies.insert(
            handle,
            ReferenceBody {
                mass: desc.mass,
                position: desc.position,
                rotation: desc.rotation,
                linear_velocity: desc.linear_velocity,
                angular_velocity: desc.angular_velocity,
                linear_damping: desc.linear_damping,
                angular_damping: desc.angular_damping,
                collision_group: desc.collision_group,
                collision_mask: desc.collision_mask,
                shapes: desc.shapes.clone(),
                shape_ids,
            },
        );
        Ok(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError> {
        let removed = self
            .bodies
            .remove(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        self.free_shapes.extend(removed.shape_ids);
        Ok(())
    }

    fn body_shapes(&self, body: BodyHandle) -> &[ShapeId] {
        self.bodies
            .get(&body)
            .map(|b| b.shape_ids.as_slice())
            .unwrap_or(&[])
    }

    fn body_pose(&self, body: BodyHandle) -> Option<(Vec3, Quat)> {
        self.bodies.get(&body).map(|b| (b.position, b.rotation))
    }

    fn set_body_pose(
        &mut self,
        body: BodyHandle,
        position: Vec3,
        rotation: Quat,
    ) -> Result<(), PhysicsError> {
        let state = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        state.position = position;
        state.rotation = rotation;
        Ok(())
    }

    fn update_shape(
        &mut self,
        body: BodyHandle,
        shape: ShapeId,
        geometry: &ColliderShape,
        collision_response: bool,
    ) -> Result<(), PhysicsError> {
        let state = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        let index = state
            .shape_ids
            .iter()
            .position(|id| *id == shape)
            .ok_or(PhysicsError::UnknownShape(body, shape))?;

        let desc = &mut state.shapes[index];
        desc.geometry = *geometry;
        desc.collision_response = collision_response;
        Ok(())
    }

    fn create_joint(&mut self, desc: &JointDesc) -> Result<JointHandle, PhysicsError> {
        for body in [desc.body_a, desc.body_b] {
            if !self.bodies.contains_key(&body) {
                return Err(PhysicsError::UnknownBody(body));
            }
        }

        let handle = JointHandle(self.next_joint);
        self.next_joint += 1;
        self.joints.insert(handle, desc.clone());
        Ok(handle)
    }

    fn remove_joint(&mut self, joint: JointHandle) -> Result<(), PhysicsError> {
        self.joints
            .remove(&joint)
            .map(|_| ())
            .ok_or(PhysicsError::UnknownJoint(joint))
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn step(
        &mut self,
        policy: TimestepPolicy,
        wall_dt: f32,
        on_post_step: &mut dyn FnMut(&[RawContact]),
    ) {
        match policy {
            TimestepPolicy::Fixed {
                timestep,
                max_sub_steps,
            } => {
                let stale = self.accumulator.as_ref().map_or(true, |acc| {
                    acc.fixed_timestep != timestep || acc.max_steps != max_sub_steps
                });
                if stale {
                    self.accumulator = Some(PhysicsAccumulator::new(timestep, max_sub_steps));
                }
                let steps = self
                    .accumulator
                    .as_mut()
                    .map_or(0, |acc| acc.accumulate(wall_dt));
                for _ in 0..steps {
                    self.sub_step(timestep, on_post_step);
                }
            }
            TimestepPolicy::Variable => {
                if wall_dt > 0.0 {
                    self.sub_step(wall_dt, on_post_step);
                }
            }
        }
    }

    fn raycast(
        &self,
        segment: &RaySegment,
        query: &RayQuery,
        on_hit: &mut dyn FnMut(&SolverHit) -> RaycastControl,
    ) -> bool {
        let length = segment.length();
        if length <= f32::EPSILON {
            return false;
        }
        let ray = Ray::new(segment.start, segment.end - segment.start);

        let mut closest: Option<SolverHit> = None;
        let mut any_hit = false;

        for (&handle, body) in &self.bodies {
            if !body.accepts(query.collision_group, query.collision_mask) {
                continue;
            }

            for (index, shape) in body.shapes.iter().enumerate() {
                let (position, rotation) = body.shape_pose(index);
                let Some(hit) = shape.geometry.raycast(position, rotation, &ray, length) else {
                    continue;
                };
                if hit.backface && query.skip_backfaces {
                    continue;
                }

                let solver_hit = SolverHit {
                    body: handle,
                    shape: body.shape_ids[index],
                    point: ray.at(hit.distance),
                    normal: hit.normal,
                    distance: hit.distance,
                };
                any_hit = true;

                match query.mode {
                    RaycastMode::Any => {
                        on_hit(&solver_hit);
                        return true;
                    }
                    RaycastMode::Closest => {
                        if closest.map_or(true, |c| solver_hit.distance < c.distance) {
                            closest = Some(solver_hit);
                        }
                    }
                    RaycastMode::All => {
                        if on_hit(&solver_hit) == RaycastControl::Stop {
                            return true;
                        }
                    }
                }
            }
        }

        if let Some(hit) = closest {
            on_hit(&hit);
        }
        any_hit
    }
}
