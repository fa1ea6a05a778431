//! Scene world: a hecs world plus the parent-chain queries physics needs

use super::components::{GlobalTransform, Parent, Transform};
use hecs::Entity;
use tracing::{debug, error};

/// Upper bound on parent chain walks; deeper chains are treated as cycles
pub(crate) const MAX_HIERARCHY_DEPTH: usize = 256;

/// Thin wrapper around [`hecs::World`]
pub struct World {
    inner: hecs::World,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
        }
    }

    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        self.inner.spawn(components)
    }

    /// Spawn a scene node, filling in `Transform` and `GlobalTransform` when the
    /// bundle lacks them
    ///
    /// The global matrix starts out as the local one and is flagged changed, so
    /// a standalone collider spawned this way is placed on the first tick.
    pub fn spawn_with_transform(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        let entity = self.inner.spawn(components);

        if !self.has::<Transform>(entity) {
            let _ = self.inner.insert_one(entity, Transform::default());
            debug!(entity = ?entity, "Added default Transform");
        }

        if !self.has::<GlobalTransform>(entity) {
            let local = self
                .get::<Transform>(entity)
                .map(|transform| transform.to_matrix())
                .unwrap_or_default();
            let _ = self.inner.insert_one(entity, GlobalTransform::written(local));
        }

        entity
    }

    /// Borrow a component; fails if the entity is gone or lacks it
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Mutably borrow a component through a shared world
    ///
    /// hecs checks borrows at runtime per component type, so holding two of
    /// these for the same type panics even across different entities.
    pub fn get_mut<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, T>, hecs::ComponentError> {
        self.inner.get::<&mut T>(entity)
    }

    pub fn has<T: hecs::Component>(&self, entity: Entity) -> bool {
        self.inner
            .entity(entity)
            .map(|entity_ref| entity_ref.has::<T>())
            .unwrap_or(false)
    }

    pub fn insert_one(
        &mut self,
        entity: Entity,
        component: impl hecs::Component,
    ) -> Result<(), hecs::NoSuchEntity> {
        self.inner.insert_one(entity, component)
    }

    pub fn remove_one<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<T, hecs::ComponentError> {
        self.inner.remove_one::<T>(entity)
    }

    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query()
    }

    pub fn query_mut<Q: hecs::Query>(&mut self) -> hecs::QueryMut<'_, Q> {
        self.inner.query_mut()
    }

    /// Remove an entity outright
    ///
    /// Solver objects it owned are released on the next physics tick.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.despawn(entity)
    }

    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.get::<Parent>(entity).ok().map(|parent| parent.0)
    }

    /// Number of ancestors above an entity; roots have depth zero
    pub fn depth(&self, entity: Entity) -> usize {
        let mut depth = 0;
        let mut current = entity;
        while let Some(parent) = self.parent_of(current) {
            depth += 1;
            if depth > MAX_HIERARCHY_DEPTH {
                error!(entity = ?entity, "Parent chain too deep, assuming a cycle");
                break;
            }
            current = parent;
        }
        depth
    }

    pub(crate) fn inner_mut(&mut self) -> &mut hecs::World {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_spawn_with_transform_fills_missing() {
        let mut world = World::new();
        let entity = world.spawn_with_transform(());

        assert_eq!(*world.get::<Transform>(entity).unwrap(), Transform::default());
        assert!(world.get::<GlobalTransform>(entity).unwrap().changed);
    }

    #[test]
    fn test_spawn_with_transform_seeds_global_from_local() {
        let mut world = World::new();
        let entity =
            world.spawn_with_transform((Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),));

        assert_eq!(
            world.get::<Transform>(entity).unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
        assert_eq!(
            world.get::<GlobalTransform>(entity).unwrap().position(),
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_depth_follows_parents() {
        let mut world = World::new();
        let root = world.spawn((Transform::default(),));
        let child = world.spawn((Transform::default(), Parent(root)));
        let grandchild = world.spawn((Transform::default(), Parent(child)));

        assert_eq!(world.parent_of(child), Some(root));
        assert_eq!(world.parent_of(root), None);
        assert_eq!(world.depth(root), 0);
        assert_eq!(world.depth(child), 1);
        assert_eq!(world.depth(grandchild), 2);
    }

    #[test]
    fn test_depth_survives_cycle() {
        let mut world = World::new();
        let a = world.spawn((Transform::default(),));
        let b = world.spawn((Transform::default(), Parent(a)));
        world.insert_one(a, Parent(b)).unwrap();

        assert!(world.depth(a) > MAX_HIERARCHY_DEPTH);
    }

    #[test]
    fn test_has_and_remove_one() {
        let mut world = World::new();
        let entity = world.spawn((Transform::default(),));
        assert!(world.has::<Transform>(entity));
        assert!(!world.has::<Parent>(entity));

        let removed = world.remove_one::<Transform>(entity).unwrap();
        assert_eq!(removed, Transform::default());
        assert!(!world.has::<Transform>(entity));

        world.despawn(entity).unwrap();
        assert!(!world.has::<Transform>(entity));
    }
}
