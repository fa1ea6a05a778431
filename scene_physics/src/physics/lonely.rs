//! Colliders without an owning rigid body
//!
//! A collider whose entity and ancestors carry no [`RigidBody`] still has to
//! collide and answer ray queries. It gets a standalone zero-mass body built from
//! its world-space shape, which follows the entity's transform every tick. Once
//! a rigid body appears above it, the standalone body goes away and the owner
//! rebuilds its compound shape with the collider included.

use crate::core::entity::world::MAX_HIERARCHY_DEPTH;
use crate::core::entity::{GlobalTransform, Transform, World};
use crate::physics::components::{Collider, RigidBody, SyncState};
use crate::physics::solver::{BodyDesc, ShapeDesc, Solver};
use crate::physics::world::PhysicsWorld;
use glam::{Mat4, Quat, Vec3};
use hecs::Entity;
use tracing::{debug, trace, warn};

/// Nearest entity at or above `entity` that carries a rigid body
pub fn owning_body(world: &World, entity: Entity) -> Option<Entity> {
    let mut current = entity;
    for _ in 0..=MAX_HIERARCHY_DEPTH {
        if world.has::<RigidBody>(current) {
            return Some(current);
        }
        current = world.parent_of(current)?;
    }
    None
}

/// World matrix of an entity, falling back to its local transform before the
/// hierarchy has run
pub(crate) fn world_matrix(world: &World, entity: Entity) -> Mat4 {
    if let Ok(global) = world.get::<GlobalTransform>(entity) {
        return global.matrix;
    }
    world
        .get::<Transform>(entity)
        .map(|transform| transform.to_matrix())
        .unwrap_or(Mat4::IDENTITY)
}

/// Static body carrying a single collider in world space
fn lonely_body_desc(collider: &Collider, matrix: Mat4) -> BodyDesc {
    let (scale, rotation, position) = matrix.to_scale_rotation_translation();
    let shape = ShapeDesc {
        collision_response: collider.collision_response(),
        material: collider.material,
        ..ShapeDesc::new(collider.shape.scaled(scale))
    };
    BodyDesc::new(0.0, position, rotation).with_shape(shape)
}

/// Bring standalone bodies in line with the current ownership of every collider
///
/// Runs as the last stage of initialization, after rigid bodies and joints.
///
/// `colliders` is scratch space reused between calls.
pub fn reconcile<S: Solver>(
    world: &mut World,
    physics: &mut PhysicsWorld<S>,
    colliders: &mut Vec<Entity>,
) {
    colliders.clear();
    colliders.extend(world.query::<&Collider>().iter().map(|(entity, _)| entity));

    for &entity in colliders.iter() {
        let owner = owning_body(world, entity);
        let matrix = world_matrix(world, entity);
        let Ok(mut collider) = world.get_mut::<Collider>(entity) else {
            continue;
        };

        // Owners that need rebuilding once this collider is handled
        let mut rebuild: [Option<Entity>; 2] = [None, None];

        match owner {
            None => {
                if collider.lonely_body.is_some() && !collider.state.is_dirty() {
                    continue;
                }

                rebuild[0] = collider.body_entity.take();
                if physics.remove_lonely_body(entity).is_some() {
                    trace!(entity = ?entity, "Replacing dirty lonely collider body");
                }

                match physics.insert_lonely_body(entity, &lonely_body_desc(&collider, matrix)) {
                    Ok(handle) => {
                        collider.lonely_body = Some(handle);
                        collider.shape_id = physics.solver().body_shapes(handle).first().copied();
                        collider.state = SyncState::Clean;
                    }
                    Err(err) => {
                        warn!(entity = ?entity, error = %err, "Failed to create lonely collider body");
                        collider.lonely_body = None;
                        collider.shape_id = None;
                    }
                }
            }
            Some(owner) => {
                if collider.lonely_body.take().is_some() {
                    physics.remove_lonely_body(entity);
                    debug!(entity = ?entity, owner = ?owner, "Collider attached to a rigid body");
                }
                // An owner built this tick already carries the collider
                if collider.body_entity != Some(owner) {
                    collider.shape_id = None;
                    rebuild[0] = Some(owner);
                    rebuild[1] = collider.body_entity;
                }
            }
        }

        drop(collider);
        for body_entity in rebuild.into_iter().flatten() {
            if let Ok(mut body) = world.get_mut::<RigidBody>(body_entity) {
                body.set_to_dirty();
            }
        }
    }
}

/// Move standalone bodies to their entity's current world pose
///
/// Only colliders whose global transform changed this frame are touched unless
/// `force` is set.
pub fn update_lonely_colliders<S: Solver>(
    world: &World,
    physics: &mut PhysicsWorld<S>,
    force: bool,
) {
    let mut updated = 0usize;

    for (entity, (collider, global)) in world.query::<(&Collider, &GlobalTransform)>().iter() {
        let Some(handle) = collider.lonely_body else {
            continue;
        };
        if !force && !global.changed {
            continue;
        }

        let (scale, rotation, position): (Vec3, Quat, Vec3) = global.to_scale_rotation_translation();
        if let Err(err) = physics.solver.set_body_pose(handle, position, rotation) {
            warn!(entity = ?entity, error = %err, "Failed to move lonely collider body");
            continue;
        }

        if let Some(shape) = collider.shape_id {
            if let Err(err) = physics.solver.update_shape(
                handle,
                shape,
                &collider.shape.scaled(scale),
                collider.collision_response(),
            ) {
                warn!(entity = ?entity, error = %err, "Failed to refresh lonely collider shape");
            }
        }
        updated += 1;
    }

    if updated > 0 {
        trace!(updated, force, "Updated lonely colliders");
    }
}
