//! Physics world resource pairing the solver with entity bookkeeping
//!
//! Every body, shape and joint that enters or leaves the solver goes through this
//! type, so the entity maps and the shape-to-entity map used for contact events
//! change in the same call as the solver itself.

use crate::error::PhysicsError;
use crate::physics::contacts::ContactEventTracker;
use crate::physics::pair_hash::ShapeId;
use crate::physics::solver::{BodyDesc, BodyHandle, JointDesc, JointHandle, Solver, TimestepPolicy};
use glam::Vec3;
use hecs::Entity;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

/// Entities joined by a solver joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointLink {
    /// Entity whose rigid body lists the joint
    pub owner: Entity,
    /// Entity on the other end
    pub connected: Entity,
}

/// Physics world resource containing the solver and its entity mappings
pub struct PhysicsWorld<S: Solver> {
    /// The rigid-body solver
    pub(crate) solver: S,

    /// Contact diffing, fed by the solver's post-step hook
    pub(crate) contacts: ContactEventTracker,

    /// Mapping from entity to rigid body handle
    entity_to_body: HashMap<Entity, BodyHandle>,

    /// Mapping from body handle to entity, standalone collider bodies included
    body_to_entity: HashMap<BodyHandle, Entity>,

    /// Standalone static bodies of colliders without a rigid body
    lonely_bodies: HashMap<Entity, BodyHandle>,

    /// Live joints and the entities they connect
    joints: HashMap<JointHandle, JointLink>,
}

impl<S: Solver> PhysicsWorld<S> {
    /// Wrap a solver
    pub fn new(solver: S) -> Self {
        info!("Initializing physics world");

        Self {
            solver,
            contacts: ContactEventTracker::new(),
            entity_to_body: HashMap::new(),
            body_to_entity: HashMap::new(),
            lonely_bodies: HashMap::new(),
            joints: HashMap::new(),
        }
    }

    /// The wrapped solver
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Mutable access to the wrapped solver
    ///
    /// Adding or removing bodies through this bypasses the entity maps.
    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// The contact tracker
    pub fn contacts(&self) -> &ContactEventTracker {
        &self.contacts
    }

    /// Set the gravity vector for the simulation
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.solver.set_gravity(gravity);
        debug!("Physics gravity set to: {:?}", gravity);
    }

    pub fn gravity(&self) -> Vec3 {
        self.solver.gravity()
    }

    /// Advance the solver, diffing contacts after every internal step
    pub fn step(&mut self, policy: TimestepPolicy, wall_dt: f32) {
        let contacts = &mut self.contacts;
        let mut steps = 0u32;
        self.solver.step(policy, wall_dt, &mut |raw| {
            contacts.on_post_step(raw);
            steps += 1;
        });
        trace!(wall_dt, steps, "Physics step");
    }

    /// Create the rigid body of `entity` in the solver
    ///
    /// `shape_owners[i]` is the collider entity that contributed `desc.shapes[i]`.
    pub fn insert_body(
        &mut self,
        entity: Entity,
        desc: &BodyDesc,
        shape_owners: &[Entity],
    ) -> Result<BodyHandle, PhysicsError> {
        if self.entity_to_body.contains_key(&entity) {
            self.remove_body(entity);
        }

        let handle = self.solver.create_body(desc)?;
        for (&shape, &owner) in self.solver.body_shapes(handle).iter().zip(shape_owners) {
            self.contacts.register_shape(shape, owner);
        }

        self.entity_to_body.insert(entity, handle);
        self.body_to_entity.insert(handle, entity);
        debug!(entity = ?entity, body = ?handle, shapes = desc.shapes.len(), "Inserted rigid body");
        Ok(handle)
    }

    /// Remove the rigid body of `entity` and its shapes from the solver
    pub fn remove_body(&mut self, entity: Entity) -> Option<BodyHandle> {
        let handle = self.entity_to_body.remove(&entity)?;
        self.body_to_entity.remove(&handle);
        self.release(handle);
        debug!(entity = ?entity, body = ?handle, "Removed rigid body");
        Some(handle)
    }

    /// Create the standalone static body of a collider without a rigid body
    pub fn insert_lonely_body(
        &mut self,
        entity: Entity,
        desc: &BodyDesc,
    ) -> Result<BodyHandle, PhysicsError> {
        if self.lonely_bodies.contains_key(&entity) {
            self.remove_lonely_body(entity);
        }

        let handle = self.solver.create_body(desc)?;
        for &shape in self.solver.body_shapes(handle) {
            self.contacts.register_shape(shape, entity);
        }

        self.lonely_bodies.insert(entity, handle);
        self.body_to_entity.insert(handle, entity);
        debug!(entity = ?entity, body = ?handle, "Inserted lonely collider body");
        Ok(handle)
    }

    /// Remove the standalone body of a collider
    pub fn remove_lonely_body(&mut self, entity: Entity) -> Option<BodyHandle> {
        let handle = self.lonely_bodies.remove(&entity)?;
        self.body_to_entity.remove(&handle);
        self.release(handle);
        debug!(entity = ?entity, body = ?handle, "Removed lonely collider body");
        Some(handle)
    }

    fn release(&mut self, handle: BodyHandle) {
        for &shape in self.solver.body_shapes(handle) {
            self.contacts.unregister_shape(shape);
        }
        if let Err(err) = self.solver.remove_body(handle) {
            warn!(body = ?handle, error = %err, "Solver refused body removal");
        }
    }

    /// Create a joint in the solver
    pub fn insert_joint(
        &mut self,
        link: JointLink,
        desc: &JointDesc,
    ) -> Result<JointHandle, PhysicsError> {
        let handle = self.solver.create_joint(desc)?;
        self.joints.insert(handle, link);
        debug!(owner = ?link.owner, connected = ?link.connected, joint = ?handle, "Inserted joint");
        Ok(handle)
    }

    /// Remove a joint from the solver
    pub fn remove_joint(&mut self, handle: JointHandle) -> Option<JointLink> {
        let link = self.joints.remove(&handle)?;
        if let Err(err) = self.solver.remove_joint(handle) {
            warn!(joint = ?handle, error = %err, "Solver refused joint removal");
        }
        debug!(joint = ?handle, "Removed joint");
        Some(link)
    }

    /// Remove every joint owned by or connected to `entity`
    ///
    /// Returns the removed handles with their links so owners can mark the joints dirty.
    pub fn remove_joints_touching(&mut self, entity: Entity) -> Vec<(JointHandle, JointLink)> {
        let handles: Vec<JointHandle> = self
            .joints
            .iter()
            .filter(|(_, link)| link.owner == entity || link.connected == entity)
            .map(|(handle, _)| *handle)
            .collect();

        handles
            .into_iter()
            .filter_map(|handle| self.remove_joint(handle).map(|link| (handle, link)))
            .collect()
    }

    /// Joints whose owning body is `entity`
    pub fn joints_owned_by(&self, entity: Entity) -> Vec<JointHandle> {
        self.joints
            .iter()
            .filter(|(_, link)| link.owner == entity)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Get the rigid body handle for an entity
    pub fn body_handle(&self, entity: Entity) -> Option<BodyHandle> {
        self.entity_to_body.get(&entity).copied()
    }

    /// Get the standalone collider body for an entity
    pub fn lonely_body(&self, entity: Entity) -> Option<BodyHandle> {
        self.lonely_bodies.get(&entity).copied()
    }

    /// Get the entity for a body handle
    pub fn entity_for_body(&self, handle: BodyHandle) -> Option<Entity> {
        self.body_to_entity.get(&handle).copied()
    }

    /// Get the collider entity for a shape
    pub fn entity_for_shape(&self, shape: ShapeId) -> Option<Entity> {
        self.contacts.entity_for_shape(shape)
    }

    /// Entities that currently own a rigid body
    pub fn body_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entity_to_body.keys().copied()
    }

    /// Entities that currently own a standalone collider body
    pub fn lonely_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.lonely_bodies.keys().copied()
    }

    pub fn body_count(&self) -> usize {
        self.entity_to_body.len()
    }

    pub fn lonely_count(&self) -> usize {
        self.lonely_bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Clean up every solver resource tied to an entity
    ///
    /// Joints go first, then the rigid body, then any standalone collider body.
    pub fn cleanup_entity(&mut self, entity: Entity) -> Vec<(JointHandle, JointLink)> {
        let removed_joints = self.remove_joints_touching(entity);
        self.remove_body(entity);
        self.remove_lonely_body(entity);
        removed_joints
    }
}
