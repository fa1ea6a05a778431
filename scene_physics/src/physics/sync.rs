//! Writing solver poses back into the scene graph
//!
//! The solver works in world space and knows nothing about parenting. Every
//! simulated entity gets its world pose converted back into a transform relative
//! to its parent. Entities are processed roots first, so a parent's global
//! transform is final before any child is composed against it.

use crate::core::entity::{GlobalTransform, Transform, World};
use crate::physics::components::RigidBody;
use crate::physics::lonely::world_matrix;
use crate::physics::solver::Solver;
use crate::physics::world::PhysicsWorld;
use glam::{Mat4, Vec3};
use hecs::Entity;
use tracing::{trace, warn};

/// Copy solver poses of every simulated entity into its `Transform` and `GlobalTransform`
///
/// `order` is scratch space reused between calls.
pub fn sync_transforms<S: Solver>(
    world: &mut World,
    physics: &PhysicsWorld<S>,
    order: &mut Vec<(usize, Entity)>,
) {
    order.clear();
    for (entity, body) in world.query_mut::<&mut RigidBody>() {
        body.updated = false;
        if body.handle.is_some() {
            order.push((0, entity));
        }
    }

    for (depth, entity) in order.iter_mut() {
        *depth = world.depth(*entity);
    }
    order.sort_unstable_by_key(|(depth, _)| *depth);

    for &(_, entity) in order.iter() {
        let handle = match world.get::<RigidBody>(entity) {
            Ok(body) if !body.updated => body.handle,
            _ => None,
        };
        let Some(handle) = handle else {
            continue;
        };

        let Some((position, rotation)) = physics.solver().body_pose(handle) else {
            warn!(entity = ?entity, body = ?handle, "Simulated entity has no pose in the solver");
            continue;
        };

        let scale = world
            .get::<Transform>(entity)
            .map(|transform| transform.scale)
            .unwrap_or(Vec3::ONE);
        let body_world = Mat4::from_scale_rotation_translation(scale, rotation, position);

        let parent_global = world
            .parent_of(entity)
            .map(|parent| world_matrix(world, parent));
        let local = match parent_global {
            Some(parent_matrix) => parent_matrix.inverse() * body_world,
            None => body_world,
        };
        let (_, local_rotation, local_position) = local.to_scale_rotation_translation();

        let existing = world.get_mut::<Transform>(entity).ok().map(|mut transform| {
            transform.set_pose(local_position, local_rotation);
            transform.to_matrix()
        });
        let local_matrix = match existing {
            Some(matrix) => matrix,
            None => {
                let transform = Transform::from_position_rotation(local_position, local_rotation);
                let matrix = transform.to_matrix();
                if let Err(err) = world.insert_one(entity, transform) {
                    warn!(entity = ?entity, error = %err, "Failed to attach transform");
                }
                matrix
            }
        };

        let global_matrix = parent_global.unwrap_or(Mat4::IDENTITY) * local_matrix;
        let written = world
            .get_mut::<GlobalTransform>(entity)
            .ok()
            .map(|mut global| global.overwrite(global_matrix))
            .is_some();
        if !written {
            if let Err(err) = world.insert_one(entity, GlobalTransform::written(global_matrix)) {
                warn!(entity = ?entity, error = %err, "Failed to attach global transform");
            }
        }

        if let Ok(mut body) = world.get_mut::<RigidBody>(entity) {
            body.updated = true;
        }
    }

    trace!(synced = order.len(), "Transform sync completed");
}
