//! Hierarchy system for updating global transforms based on parent relationships

use super::components::{GlobalTransform, Parent, Transform};
use super::world::World;
use glam::Mat4;
use hecs::Entity;
use std::collections::{HashMap, HashSet};
use tracing::{error, trace};

/// Update the hierarchy system, calculating global transforms from local transforms
/// and parent relationships using breadth-first traversal.
///
/// Every visited entity gets its `GlobalTransform::changed` flag set to whether its
/// matrix moved since the last update, which is what the physics layer reads to
/// decide which static colliders need repositioning.
pub fn update_hierarchy_system(world: &mut World) {
    let inner = world.inner_mut();

    let mut children: HashMap<Entity, Vec<Entity>> = HashMap::new();
    for (entity, (parent, _)) in inner.query::<(&Parent, &Transform)>().iter() {
        children.entry(parent.0).or_default().push(entity);
    }

    // Find root entities (entities with Transform but no Parent)
    let mut queue: Vec<(Entity, Mat4)> = inner
        .query::<&Transform>()
        .without::<&Parent>()
        .iter()
        .map(|(entity, transform)| (entity, transform.to_matrix()))
        .collect();

    let mut visited: HashSet<Entity> = queue.iter().map(|(entity, _)| *entity).collect();
    let mut next_level = Vec::new();

    trace!(root_count = queue.len(), "Starting hierarchy update");

    while !queue.is_empty() {
        for (entity, world_matrix) in queue.drain(..) {
            write_global(inner, entity, world_matrix);

            let Some(child_entities) = children.get(&entity) else {
                continue;
            };

            for &child in child_entities {
                if !visited.insert(child) {
                    error!(
                        parent = ?entity,
                        child = ?child,
                        "Cyclic parent-child relationship detected in hierarchy"
                    );
                    continue;
                }

                let local_matrix = inner
                    .get::<&Transform>(child)
                    .map(|transform| transform.to_matrix())
                    .unwrap_or(Mat4::IDENTITY);
                next_level.push((child, world_matrix * local_matrix));
            }
        }

        std::mem::swap(&mut queue, &mut next_level);
    }

    trace!(processed_count = visited.len(), "Hierarchy update completed");
}

fn write_global(inner: &mut hecs::World, entity: Entity, matrix: Mat4) {
    match inner.query_one_mut::<&mut GlobalTransform>(entity) {
        Ok(global) => global.update(matrix),
        Err(_) => {
            let _ = inner.insert_one(entity, GlobalTransform::written(matrix));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn test_root_global_transform() {
        let mut world = World::new();
        let root = world.spawn((Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),));

        update_hierarchy_system(&mut world);

        let global = world.get::<GlobalTransform>(root).unwrap();
        assert_eq!(global.position(), Vec3::new(1.0, 2.0, 3.0));
        assert!(global.changed);
    }

    #[test]
    fn test_child_composes_with_parent() {
        let mut world = World::new();
        let parent = world.spawn((Transform::from_position_rotation(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        ),));
        let child = world.spawn((
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            Parent(parent),
        ));
        let grandchild = world.spawn((
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            Parent(child),
        ));

        update_hierarchy_system(&mut world);

        // +X rotated a quarter turn about Y points along -Z
        let child_pos = world.get::<GlobalTransform>(child).unwrap().position();
        assert!((child_pos - Vec3::new(10.0, 0.0, -1.0)).length() < 1e-5);

        let grandchild_pos = world.get::<GlobalTransform>(grandchild).unwrap().position();
        assert!((grandchild_pos - Vec3::new(10.0, 1.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_changed_flag_clears_when_static() {
        let mut world = World::new();
        let entity = world.spawn((Transform::from_position(Vec3::X),));

        update_hierarchy_system(&mut world);
        assert!(world.get::<GlobalTransform>(entity).unwrap().changed);

        update_hierarchy_system(&mut world);
        assert!(!world.get::<GlobalTransform>(entity).unwrap().changed);

        world.get_mut::<Transform>(entity).unwrap().position = Vec3::Y;
        update_hierarchy_system(&mut world);
        assert!(world.get::<GlobalTransform>(entity).unwrap().changed);
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let mut world = World::new();
        let root = world.spawn((Transform::default(),));
        let a = world.spawn((Transform::default(), Parent(root)));
        let b = world.spawn((Transform::default(), Parent(a)));
        // Detached cycle: never reached from a root, never updated
        let c = world.spawn((Transform::default(),));
        let d = world.spawn((Transform::default(), Parent(c)));
        world.insert_one(c, Parent(d)).unwrap();

        update_hierarchy_system(&mut world);

        assert!(world.get::<GlobalTransform>(b).is_ok());
        assert!(world.get::<GlobalTransform>(c).is_err());
    }
}
