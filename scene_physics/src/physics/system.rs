//! Physics update system
//!
//! Drives one tick of the integration layer: pushes dirty scene state into the
//! solver, moves standalone colliders, steps the simulation and writes the
//! resulting poses back into the scene graph.

use crate::config::PhysicsConfig;
use crate::core::entity::World;
use crate::error::PhysicsError;
use crate::physics::components::{Collider, RigidBody, SyncState};
use crate::physics::contacts::PhysicsEvent;
use crate::physics::lonely::{self, owning_body, world_matrix};
use crate::physics::pair_hash::ShapeId;
use crate::physics::raycast::{RaycastOptions, RaycastResult};
use crate::physics::solver::{
    BodyDesc, BodyHandle, JointDesc, JointHandle, RaycastControl, ShapeDesc, Solver,
};
use crate::physics::sync::sync_transforms;
use crate::physics::world::{JointLink, PhysicsWorld};
use glam::{Mat4, Vec3};
use hecs::Entity;
use tracing::{debug, info, trace, warn};

/// Whether the system advances the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    /// Initialize, step and sync every tick
    #[default]
    Active,
    /// Leave the solver and the scene untouched
    Passive,
}

/// Per-tick driver tying a [`Solver`] to the scene graph
pub struct PhysicsSystem<S: Solver> {
    physics: PhysicsWorld<S>,
    config: PhysicsConfig,
    mode: SimulationMode,
    /// Set by `play` so the next tick repositions every standalone collider
    force_lonely_update: bool,
    /// Depth-sorted sync order, reused between ticks
    sync_order: Vec<(usize, Entity)>,
    /// Rigid body entities visited by `initialize`
    body_scratch: Vec<Entity>,
    /// Dirty colliders of clean bodies as `(body entity, collider entity)`, sorted by body
    dirty_colliders: Vec<(Entity, Entity)>,
    /// Collider entities visited by lonely reconciliation
    collider_scratch: Vec<Entity>,
}

impl<S: Solver> PhysicsSystem<S> {
    /// Create a system around a solver, applying the configured gravity
    pub fn new(solver: S, config: PhysicsConfig) -> Result<Self, PhysicsError> {
        config.validate()?;

        let mut physics = PhysicsWorld::new(solver);
        physics.set_gravity(config.gravity);

        info!(
            step_frequency = config.step_frequency,
            max_sub_steps = config.max_sub_steps,
            "Physics system created"
        );

        Ok(Self {
            physics,
            config,
            mode: SimulationMode::Active,
            force_lonely_update: false,
            sync_order: Vec::new(),
            body_scratch: Vec::new(),
            dirty_colliders: Vec::new(),
            collider_scratch: Vec::new(),
        })
    }

    /// Run one tick
    ///
    /// Events left undrained from the previous active tick are discarded, so
    /// [`drain_events`](Self::drain_events) only ever yields the events of the
    /// latest tick.
    pub fn process(&mut self, world: &mut World, delta_time: f32) {
        if self.mode == SimulationMode::Passive {
            trace!("Physics system passive, skipping tick");
            return;
        }

        let stale = self.physics.contacts.discard_events();
        if stale > 0 {
            trace!(stale, "Discarded undrained physics events");
        }

        // Step 1: Push new and dirty bodies, joints and colliders into the solver
        self.initialize(world);

        // Step 2: Follow moved standalone colliders
        let force = std::mem::take(&mut self.force_lonely_update);
        self.update_lonely_colliders(world, force);

        // Step 3: Step the simulation; contacts are diffed after every internal step
        self.step(delta_time);

        // Step 4: Write solver poses back to the scene
        self.sync_transforms(world);
    }

    /// Bring the solver in line with the scene
    ///
    /// Rigid bodies first, then joints (which need both bodies), then standalone
    /// collider bodies.
    pub fn initialize(&mut self, world: &mut World) {
        self.cleanup_removed_entities(world);

        let mut bodies = std::mem::take(&mut self.body_scratch);
        bodies.clear();
        bodies.extend(world.query::<&RigidBody>().iter().map(|(entity, _)| entity));

        self.collect_dirty_colliders(world);

        for &entity in &bodies {
            let dirty = world
                .get::<RigidBody>(entity)
                .map(|body| body.state.is_dirty())
                .unwrap_or(false);

            if dirty {
                self.build_body(world, entity);
            } else {
                self.refresh_colliders(world, entity);
            }
        }

        for &entity in &bodies {
            self.build_joints(world, entity);
        }
        self.body_scratch = bodies;

        lonely::reconcile(world, &mut self.physics, &mut self.collider_scratch);
    }

    /// Reposition standalone collider bodies whose entity moved, or all of them if `force`
    pub fn update_lonely_colliders(&mut self, world: &World, force: bool) {
        lonely::update_lonely_colliders(world, &mut self.physics, force);
    }

    /// Advance the solver by `delta_time` seconds of wall-clock time
    pub fn step(&mut self, delta_time: f32) {
        self.physics.step(self.config.timestep_policy(), delta_time);
    }

    /// Write solver poses of every simulated entity back into its transforms
    pub fn sync_transforms(&mut self, world: &mut World) {
        sync_transforms(world, &self.physics, &mut self.sync_order);
    }

    /// Switch to passive mode
    pub fn pause(&mut self) {
        if self.mode != SimulationMode::Passive {
            info!("Physics paused");
        }
        self.mode = SimulationMode::Passive;
    }

    /// Switch to active mode; standalone colliders are repositioned on the next tick
    pub fn play(&mut self) {
        if self.mode != SimulationMode::Active {
            info!("Physics resumed");
        }
        self.mode = SimulationMode::Active;
        self.force_lonely_update = true;
    }

    /// Pause and mark everything for a full rebuild when play resumes
    pub fn stop(&mut self, world: &mut World) {
        self.pause();

        for (_, body) in world.query_mut::<&mut RigidBody>() {
            body.set_to_dirty();
        }
        for (_, collider) in world.query_mut::<&mut Collider>() {
            collider.set_to_dirty();
        }
        self.physics.contacts.clear_contacts();

        info!("Physics stopped");
    }

    /// Drop every solver resource of an entity
    ///
    /// Joints touching the entity go first, then its rigid body and its standalone
    /// collider body. Call this before despawning; an entity that keeps its
    /// `RigidBody` is rebuilt on the next tick.
    pub fn remove_entity(&mut self, world: &mut World, entity: Entity) {
        let removed_joints = self.physics.cleanup_entity(entity);
        mark_joints_dirty(world, &removed_joints);

        if let Ok(mut body) = world.get_mut::<RigidBody>(entity) {
            body.handle = None;
            body.set_to_dirty();
            for joint in &mut body.joints {
                joint.handle = None;
                joint.state = SyncState::Dirty;
            }
        }
        if let Ok(mut collider) = world.get_mut::<Collider>(entity) {
            collider.lonely_body = None;
            collider.shape_id = None;
            collider.body_entity = None;
            collider.set_to_dirty();
        }

        debug!(entity = ?entity, "Removed entity from physics");
    }

    /// Take the collider off an entity and out of the solver
    pub fn remove_collider(&mut self, world: &mut World, entity: Entity) -> Option<Collider> {
        let mut collider = world.remove_one::<Collider>(entity).ok()?;

        self.physics.remove_lonely_body(entity);
        if let Some(owner) = collider.body_entity.take() {
            if let Ok(mut body) = world.get_mut::<RigidBody>(owner) {
                body.set_to_dirty();
            }
        }
        collider.lonely_body = None;
        collider.shape_id = None;
        collider.set_to_dirty();

        debug!(entity = ?entity, "Removed collider");
        Some(collider)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        self.physics.set_gravity(gravity);
    }

    pub fn gravity(&self) -> Vec3 {
        self.physics.gravity()
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn physics(&self) -> &PhysicsWorld<S> {
        &self.physics
    }

    pub fn solver(&self) -> &S {
        self.physics.solver()
    }

    pub fn solver_mut(&mut self) -> &mut S {
        self.physics.solver_mut()
    }

    /// Take the contact and sub-step events of the latest tick
    ///
    /// Call after every `process`; the next active tick drops whatever is left.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, PhysicsEvent> {
        self.physics.contacts.drain_events()
    }

    pub fn body_handle(&self, entity: Entity) -> Option<BodyHandle> {
        self.physics.body_handle(entity)
    }

    pub fn entity_for_body(&self, handle: BodyHandle) -> Option<Entity> {
        self.physics.entity_for_body(handle)
    }

    pub fn entity_for_shape(&self, shape: ShapeId) -> Option<Entity> {
        self.physics.entity_for_shape(shape)
    }

    pub fn raycast_any(
        &self,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        options: &RaycastOptions,
        result: &mut RaycastResult,
    ) -> bool {
        self.physics
            .raycast_any(origin, direction, distance, options, result)
    }

    pub fn raycast_closest(
        &self,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        options: &RaycastOptions,
        result: &mut RaycastResult,
    ) -> bool {
        self.physics
            .raycast_closest(origin, direction, distance, options, result)
    }

    pub fn raycast_all<F>(
        &self,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        options: &RaycastOptions,
        on_hit: F,
    ) -> bool
    where
        F: FnMut(&RaycastResult) -> RaycastControl,
    {
        self.physics
            .raycast_all(origin, direction, distance, options, on_hit)
    }

    /// Release solver resources of entities that were despawned or lost their
    /// physics components without going through `remove_entity`
    fn cleanup_removed_entities(&mut self, world: &mut World) {
        let stale_bodies: Vec<Entity> = self
            .physics
            .body_entities()
            .filter(|entity| !world.has::<RigidBody>(*entity))
            .collect();
        for entity in stale_bodies {
            debug!(entity = ?entity, "Cleaning up body of removed entity");
            let removed_joints = self.physics.remove_joints_touching(entity);
            mark_joints_dirty(world, &removed_joints);
            self.physics.remove_body(entity);
        }

        let stale_lonely: Vec<Entity> = self
            .physics
            .lonely_entities()
            .filter(|entity| !world.has::<Collider>(*entity))
            .collect();
        for entity in stale_lonely {
            debug!(entity = ?entity, "Cleaning up lonely body of removed collider");
            self.physics.remove_lonely_body(entity);
        }
    }

    /// Colliders making up the compound shape of the body on `entity`
    fn compound_colliders(world: &World, entity: Entity) -> Vec<Entity> {
        let mut colliders: Vec<Entity> = world
            .query::<&Collider>()
            .iter()
            .map(|(collider_entity, _)| collider_entity)
            .filter(|collider_entity| owning_body(world, *collider_entity) == Some(entity))
            .collect();
        // Own collider first, then descendants in a stable order
        colliders.sort_by_key(|collider_entity| {
            (*collider_entity != entity, world.depth(*collider_entity), collider_entity.id())
        });
        colliders
    }

    /// Create or rebuild the solver body of a dirty rigid body
    fn build_body(&mut self, world: &mut World, entity: Entity) {
        // Joints on either side of a rebuilt body must be rebuilt too
        let removed_joints = self.physics.remove_joints_touching(entity);
        mark_joints_dirty(world, &removed_joints);
        self.physics.remove_body(entity);

        let (_, body_rotation, body_position) = world_matrix(world, entity).to_scale_rotation_translation();
        let body_inverse = Mat4::from_rotation_translation(body_rotation, body_position).inverse();

        let owners = Self::compound_colliders(world, entity);
        let mut shapes = Vec::with_capacity(owners.len());
        for &collider_entity in &owners {
            let Ok(collider) = world.get::<Collider>(collider_entity) else {
                continue;
            };
            let (scale, rotation, position) =
                world_matrix(world, collider_entity).to_scale_rotation_translation();
            shapes.push(ShapeDesc {
                geometry: collider.shape.scaled(scale),
                offset: body_inverse.transform_point3(position),
                rotation: body_rotation.inverse() * rotation,
                collision_response: collider.collision_response(),
                material: collider.material,
            });
        }

        let Ok(body) = world.get::<RigidBody>(entity) else {
            return;
        };
        let desc = BodyDesc {
            mass: body.mass,
            position: body_position,
            rotation: body_rotation,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            linear_damping: body.linear_damping,
            angular_damping: body.angular_damping,
            collision_group: body.collision_group,
            collision_mask: body.collision_mask,
            shapes,
        };
        drop(body);

        match self.physics.insert_body(entity, &desc, &owners) {
            Ok(handle) => {
                if let Ok(mut body) = world.get_mut::<RigidBody>(entity) {
                    body.handle = Some(handle);
                    body.state = SyncState::Clean;
                }

                let shape_ids = self.physics.solver().body_shapes(handle).to_vec();
                for (&collider_entity, shape_id) in owners.iter().zip(shape_ids) {
                    if let Ok(mut collider) = world.get_mut::<Collider>(collider_entity) {
                        collider.body_entity = Some(entity);
                        collider.shape_id = Some(shape_id);
                        collider.state = SyncState::Clean;
                    }
                }
                debug!(entity = ?entity, body = ?handle, colliders = owners.len(), "Initialized rigid body");
            }
            Err(err) => {
                warn!(entity = ?entity, error = %err, "Failed to create rigid body");
                if let Ok(mut body) = world.get_mut::<RigidBody>(entity) {
                    body.handle = None;
                }
            }
        }
    }

    /// Gather dirty colliders attached to a body in one pass over the world
    fn collect_dirty_colliders(&mut self, world: &World) {
        self.dirty_colliders.clear();
        self.dirty_colliders.extend(
            world
                .query::<&Collider>()
                .iter()
                .filter(|(_, collider)| collider.state.is_dirty())
                .filter_map(|(collider_entity, collider)| {
                    collider.body_entity.map(|body| (body, collider_entity))
                }),
        );
        self.dirty_colliders.sort_unstable();
    }

    /// Push dirty colliders of a clean body into its existing shapes
    fn refresh_colliders(&mut self, world: &mut World, entity: Entity) {
        let start = self
            .dirty_colliders
            .partition_point(|(body, _)| *body < entity);
        if self.dirty_colliders.get(start).map(|(body, _)| *body) != Some(entity) {
            return;
        }
        let Some(handle) = self.physics.body_handle(entity) else {
            return;
        };

        let mut index = start;
        while let Some(&(body, collider_entity)) = self.dirty_colliders.get(index) {
            if body != entity {
                break;
            }
            index += 1;

            let (scale, _, _) = world_matrix(world, collider_entity).to_scale_rotation_translation();
            let Ok(mut collider) = world.get_mut::<Collider>(collider_entity) else {
                continue;
            };
            // An earlier rebuild this pass may have taken the collider over
            if !collider.state.is_dirty() || collider.body_entity != Some(entity) {
                continue;
            }
            let Some(shape) = collider.shape_id else {
                continue;
            };

            match self.physics.solver.update_shape(
                handle,
                shape,
                &collider.shape.scaled(scale),
                collider.collision_response(),
            ) {
                Ok(()) => {
                    collider.state = SyncState::Clean;
                    trace!(entity = ?collider_entity, "Refreshed collider shape");
                }
                Err(err) => {
                    warn!(entity = ?collider_entity, error = %err, "Failed to refresh collider shape");
                }
            }
        }
    }

    /// Create dirty joints of the body on `entity` and drop joints it no longer lists
    fn build_joints(&mut self, world: &mut World, entity: Entity) {
        let (handle_a, pending, listed) = {
            let Ok(body) = world.get::<RigidBody>(entity) else {
                return;
            };
            let Some(handle_a) = body.handle else {
                return;
            };
            let pending: Vec<_> = body
                .joints
                .iter()
                .enumerate()
                .filter(|(_, joint)| joint.state.is_dirty())
                .map(|(index, joint)| (index, joint.clone()))
                .collect();
            let listed: Vec<JointHandle> =
                body.joints.iter().filter_map(|joint| joint.handle).collect();
            (handle_a, pending, listed)
        };

        for stale in self.physics.joints_owned_by(entity) {
            if !listed.contains(&stale) {
                self.physics.remove_joint(stale);
            }
        }

        for (index, joint) in pending {
            if let Some(old) = joint.handle {
                self.physics.remove_joint(old);
            }

            let handle_b = world
                .get::<RigidBody>(joint.connected_entity)
                .ok()
                .and_then(|peer| peer.handle);
            let Some(handle_b) = handle_b else {
                let err = PhysicsError::MissingJointBody(joint.connected_entity);
                warn!(entity = ?entity, error = %err, "Joint left uninitialized");
                set_joint(world, entity, index, None, SyncState::Dirty);
                continue;
            };

            let desc = JointDesc {
                kind: joint.kind,
                body_a: handle_a,
                body_b: handle_b,
                anchor_a: joint.local_anchor,
                anchor_b: joint.connected_anchor,
                collide_connected: joint.collide_connected,
            };
            let link = JointLink {
                owner: entity,
                connected: joint.connected_entity,
            };

            match self.physics.insert_joint(link, &desc) {
                Ok(handle) => set_joint(world, entity, index, Some(handle), SyncState::Clean),
                Err(err) => {
                    warn!(entity = ?entity, error = %err, "Failed to create joint");
                    set_joint(world, entity, index, None, SyncState::Dirty);
                }
            }
        }
    }
}

fn set_joint(
    world: &World,
    entity: Entity,
    index: usize,
    handle: Option<JointHandle>,
    state: SyncState,
) {
    if let Ok(mut body) = world.get_mut::<RigidBody>(entity) {
        if let Some(joint) = body.joints.get_mut(index) {
            joint.handle = handle;
            joint.state = state;
        }
    }
}

/// Flag joints that were removed from the solver for re-creation
fn mark_joints_dirty(world: &World, removed: &[(JointHandle, JointLink)]) {
    for (handle, link) in removed {
        if let Ok(mut body) = world.get_mut::<RigidBody>(link.owner) {
            for joint in body
                .joints
                .iter_mut()
                .filter(|joint| joint.handle == Some(*handle))
            {
                joint.handle = None;
                joint.state = SyncState::Dirty;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{update_hierarchy_system, GlobalTransform, Parent, Transform};
    use crate::physics::components::{ColliderShape, Joint, JointKind};
    use crate::physics::reference::ReferenceSolver;

    fn system() -> PhysicsSystem<ReferenceSolver> {
        PhysicsSystem::new(ReferenceSolver::new(), PhysicsConfig::default()).unwrap()
    }

    fn tick(system: &mut PhysicsSystem<ReferenceSolver>, world: &mut World) {
        update_hierarchy_system(world);
        system.process(world, 1.0 / 60.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PhysicsConfig {
            step_frequency: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            PhysicsSystem::new(ReferenceSolver::new(), config),
            Err(PhysicsError::Config(_))
        ));
    }

    #[test]
    fn test_gravity_reaches_solver() {
        let mut system = system();
        assert_eq!(system.solver().gravity(), Vec3::new(0.0, -10.0, 0.0));
        system.set_gravity(Vec3::ZERO);
        assert_eq!(system.solver().gravity(), Vec3::ZERO);
        assert_eq!(system.config().gravity, Vec3::ZERO);
    }

    #[test]
    fn test_compound_body_includes_descendant_colliders() {
        let mut world = World::new();
        let mut system = system();
        let root = world.spawn_with_transform((
            Transform::from_position(Vec3::new(0.0, 5.0, 0.0)),
            RigidBody::dynamic(2.0),
            Collider::sphere(0.5),
        ));
        let arm = world.spawn_with_transform((
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            Parent(root),
            Collider::box_collider(Vec3::splat(0.25)),
        ));
        // Carries its own body, so it is not part of the compound
        let separate = world.spawn_with_transform((
            Transform::from_position(Vec3::new(-1.0, 0.0, 0.0)),
            Parent(root),
            RigidBody::dynamic(1.0),
            Collider::sphere(0.1),
        ));
        update_hierarchy_system(&mut world);
        system.initialize(&mut world);

        let handle = system.body_handle(root).unwrap();
        let shapes = system.solver().body_shapes(handle).to_vec();
        assert_eq!(shapes.len(), 2);
        assert_eq!(system.entity_for_shape(shapes[0]), Some(root));
        assert_eq!(system.entity_for_shape(shapes[1]), Some(arm));
        let offset = system.solver().shape_offset(handle, shapes[1]).unwrap();
        assert!((offset - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);

        let arm_collider = world.get::<Collider>(arm).unwrap();
        assert_eq!(arm_collider.body_entity, Some(root));
        assert!(arm_collider.lonely_body.is_none());
        assert!(system.body_handle(separate).is_some());
        assert_eq!(system.physics().lonely_count(), 0);
    }

    #[test]
    fn test_dirty_collider_refreshes_shape_in_place() {
        let mut world = World::new();
        let mut system = system();
        let entity = world.spawn_with_transform((
            Transform::default(),
            RigidBody::fixed(),
            Collider::sphere(0.5),
        ));
        system.initialize(&mut world);
        let handle = system.body_handle(entity).unwrap();

        {
            let mut collider = world.get_mut::<Collider>(entity).unwrap();
            collider.shape = ColliderShape::Sphere { radius: 2.0 };
            collider.is_trigger = true;
            collider.set_to_dirty();
        }
        system.initialize(&mut world);

        assert_eq!(system.body_handle(entity), Some(handle));
        let shape = world.get::<Collider>(entity).unwrap().shape_id.unwrap();
        assert_eq!(
            system.solver().shape(handle, shape),
            Some((ColliderShape::Sphere { radius: 2.0 }, false))
        );
    }

    #[test]
    fn test_joint_waits_for_peer_body() {
        let mut world = World::new();
        let mut system = system();
        let peer = world.spawn_with_transform((Transform::default(),));
        let owner = world.spawn_with_transform((
            Transform::default(),
            RigidBody::dynamic(1.0).with_joint(Joint::new(JointKind::Ball, peer)),
        ));

        system.initialize(&mut world);
        assert_eq!(system.physics().joint_count(), 0);
        assert!(world.get::<RigidBody>(owner).unwrap().joints[0].state.is_dirty());

        world.insert_one(peer, RigidBody::fixed()).unwrap();
        system.initialize(&mut world);
        assert_eq!(system.physics().joint_count(), 1);
        let joint_state = world.get::<RigidBody>(owner).unwrap().joints[0].state;
        assert_eq!(joint_state, SyncState::Clean);
    }

    #[test]
    fn test_rebuilding_a_body_rebuilds_its_joints() {
        let mut world = World::new();
        let mut system = system();
        let peer = world.spawn_with_transform((Transform::default(), RigidBody::fixed()));
        let owner = world.spawn_with_transform((
            Transform::default(),
            RigidBody::dynamic(1.0).with_joint(Joint::new(JointKind::Fixed, peer)),
        ));
        system.initialize(&mut world);
        let first = world.get::<RigidBody>(owner).unwrap().joints[0].handle;
        assert!(first.is_some());

        world.get_mut::<RigidBody>(peer).unwrap().set_to_dirty();
        system.initialize(&mut world);

        let second = world.get::<RigidBody>(owner).unwrap().joints[0].handle;
        assert!(second.is_some());
        assert_ne!(first, second);
        assert_eq!(system.physics().joint_count(), 1);
        assert_eq!(system.solver().joint_count(), 1);
    }

    #[test]
    fn test_removed_joint_leaves_solver() {
        let mut world = World::new();
        let mut system = system();
        let peer = world.spawn_with_transform((Transform::default(), RigidBody::fixed()));
        let owner = world.spawn_with_transform((
            Transform::default(),
            RigidBody::dynamic(1.0).with_joint(Joint::new(JointKind::Ball, peer)),
        ));
        system.initialize(&mut world);
        assert_eq!(system.solver().joint_count(), 1);

        world.get_mut::<RigidBody>(owner).unwrap().joints.clear();
        system.initialize(&mut world);
        assert_eq!(system.solver().joint_count(), 0);
    }

    #[test]
    fn test_passive_mode_skips_everything() {
        let mut world = World::new();
        let mut system = system();
        let entity = world.spawn_with_transform((
            Transform::from_position(Vec3::new(0.0, 10.0, 0.0)),
            RigidBody::dynamic(1.0),
        ));

        system.pause();
        for _ in 0..5 {
            tick(&mut system, &mut world);
        }

        assert_eq!(system.mode(), SimulationMode::Passive);
        assert_eq!(system.solver().body_count(), 0);
        assert_eq!(system.solver().steps_taken(), 0);
        assert_eq!(
            world.get::<Transform>(entity).unwrap().position,
            Vec3::new(0.0, 10.0, 0.0)
        );
    }

    #[test]
    fn test_active_tick_moves_dynamic_bodies() {
        let mut world = World::new();
        let mut system = system();
        let entity = world.spawn_with_transform((
            Transform::from_position(Vec3::new(0.0, 10.0, 0.0)),
            RigidBody::dynamic(1.0),
            Collider::sphere(0.5),
        ));

        for _ in 0..10 {
            tick(&mut system, &mut world);
        }

        let y = world.get::<Transform>(entity).unwrap().position.y;
        assert!(y < 10.0);
        assert!(world.get::<GlobalTransform>(entity).unwrap().position().y < 10.0);
    }

    #[test]
    fn test_remove_collider_drops_lonely_body() {
        let mut world = World::new();
        let mut system = system();
        let entity = world.spawn_with_transform((Transform::default(), Collider::default()));
        system.initialize(&mut world);
        assert_eq!(system.solver().body_count(), 1);

        let collider = system.remove_collider(&mut world, entity).unwrap();
        assert!(collider.lonely_body.is_none());
        assert_eq!(system.solver().body_count(), 0);
        assert_eq!(system.physics().contacts().shape_count(), 0);
        assert!(system.remove_collider(&mut world, entity).is_none());
    }

    #[test]
    fn test_dirty_colliders_refresh_only_their_own_body() {
        let mut world = World::new();
        let mut system = system();
        let left = world.spawn_with_transform((
            Transform::default(),
            RigidBody::fixed(),
            Collider::sphere(0.5),
        ));
        let arm = world.spawn_with_transform((
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            Parent(left),
            Collider::sphere(0.25),
        ));
        let right = world.spawn_with_transform((
            Transform::from_position(Vec3::new(10.0, 0.0, 0.0)),
            RigidBody::fixed(),
            Collider::sphere(0.5),
        ));
        update_hierarchy_system(&mut world);
        system.initialize(&mut world);
        let left_handle = system.body_handle(left).unwrap();
        let right_handle = system.body_handle(right).unwrap();

        {
            let mut collider = world.get_mut::<Collider>(arm).unwrap();
            collider.shape = ColliderShape::Sphere { radius: 0.75 };
            collider.set_to_dirty();
        }
        system.initialize(&mut world);

        assert_eq!(system.body_handle(left), Some(left_handle));
        assert_eq!(system.body_handle(right), Some(right_handle));
        let arm_shape = world.get::<Collider>(arm).unwrap().shape_id.unwrap();
        assert_eq!(
            system.solver().shape(left_handle, arm_shape),
            Some((ColliderShape::Sphere { radius: 0.75 }, true))
        );
        assert!(!world.get::<Collider>(arm).unwrap().state.is_dirty());
        let right_shape = world.get::<Collider>(right).unwrap().shape_id.unwrap();
        assert_eq!(
            system.solver().shape(right_handle, right_shape),
            Some((ColliderShape::Sphere { radius: 0.5 }, true))
        );

        // Nothing is dirty any more, so the next pass has no work queued
        system.initialize(&mut world);
        assert!(system.dirty_colliders.is_empty());
    }

    #[test]
    fn test_scratch_buffers_are_reused_between_ticks() {
        let mut world = World::new();
        let mut system = system();
        for x in 0..4 {
            world.spawn_with_transform((
                Transform::from_position(Vec3::new(x as f32 * 3.0, 0.0, 0.0)),
                RigidBody::dynamic(1.0),
                Collider::sphere(0.5),
            ));
        }
        world.spawn_with_transform((Transform::default(), Collider::default()));

        tick(&mut system, &mut world);
        let bodies = system.body_scratch.as_ptr();
        let colliders = system.collider_scratch.as_ptr();
        assert_eq!(system.body_scratch.len(), 4);
        assert_eq!(system.collider_scratch.len(), 5);

        for _ in 0..5 {
            tick(&mut system, &mut world);
        }
        assert_eq!(system.body_scratch.as_ptr(), bodies);
        assert_eq!(system.collider_scratch.as_ptr(), colliders);
    }

    #[test]
    fn test_rebuilding_lonely_collider_never_runs_out_of_shape_ids() {
        let mut world = World::new();
        let mut system = system();
        let entity = world.spawn_with_transform((Transform::default(), Collider::default()));

        for _ in 0..70_000 {
            world.get_mut::<Collider>(entity).unwrap().set_to_dirty();
            system.initialize(&mut world);
        }

        let collider = world.get::<Collider>(entity).unwrap();
        let handle = collider.lonely_body.unwrap();
        assert!(!collider.state.is_dirty());
        assert_eq!(system.solver().body_count(), 1);
        assert_eq!(system.physics().contacts().shape_count(), 1);
        assert_eq!(system.entity_for_shape(collider.shape_id.unwrap()), Some(entity));
        assert_eq!(system.entity_for_body(handle), Some(entity));
    }

    #[test]
    fn test_undrained_events_do_not_pile_up() {
        let mut world = World::new();
        let mut system = system();
        world.spawn_with_transform((
            Transform::default(),
            RigidBody::dynamic(1.0),
            Collider::sphere(0.5),
        ));

        for _ in 0..600 {
            tick(&mut system, &mut world);
        }
        let buffered = system.physics().contacts().events().len();
        assert!(buffered > 0);
        assert!(buffered <= system.config().max_sub_steps as usize);

        // A passive tick leaves the latest events for the caller
        system.pause();
        tick(&mut system, &mut world);
        assert_eq!(system.drain_events().count(), buffered);
    }
}
