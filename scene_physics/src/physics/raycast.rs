//! Ray queries against the simulation, reported in entity terms

use crate::physics::components::ALL_GROUPS;
use crate::physics::solver::{RayQuery, RaySegment, RaycastControl, RaycastMode, Solver, SolverHit};
use crate::physics::world::PhysicsWorld;
use glam::Vec3;
use hecs::Entity;

/// Filtering for ray queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaycastOptions {
    /// Groups the ray tests against
    pub collision_mask: u32,
    /// Groups the ray belongs to
    pub collision_group: u32,
    /// Ignore surfaces hit from behind, such as the inside of a shape the ray starts in
    pub skip_backfaces: bool,
}

impl Default for RaycastOptions {
    fn default() -> Self {
        Self {
            collision_mask: ALL_GROUPS,
            collision_group: ALL_GROUPS,
            skip_backfaces: true,
        }
    }
}

impl RaycastOptions {
    fn to_query(self, mode: RaycastMode) -> RayQuery {
        RayQuery {
            mode,
            collision_mask: self.collision_mask,
            collision_group: self.collision_group,
            skip_backfaces: self.skip_backfaces,
        }
    }
}

/// A ray hit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RaycastResult {
    /// Entity owning the struck body, if it is still registered
    pub entity: Option<Entity>,
    pub point: Vec3,
    pub normal: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
}

impl<S: Solver> PhysicsWorld<S> {
    fn to_result(&self, hit: &SolverHit) -> RaycastResult {
        RaycastResult {
            entity: self.entity_for_body(hit.body),
            point: hit.point,
            normal: hit.normal,
            distance: hit.distance,
        }
    }

    fn single_hit(
        &self,
        mode: RaycastMode,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        options: &RaycastOptions,
        result: &mut RaycastResult,
    ) -> bool {
        let segment = RaySegment::from_direction(origin, direction, distance);
        let mut found = None;
        let hit = self.solver.raycast(&segment, &options.to_query(mode), &mut |hit| {
            found = Some(*hit);
            RaycastControl::Stop
        });

        match found {
            Some(solver_hit) if hit => {
                *result = self.to_result(&solver_hit);
                true
            }
            _ => false,
        }
    }

    /// Report any hit along the ray; `result` is only written on a hit
    ///
    /// `direction` must be normalized.
    pub fn raycast_any(
        &self,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        options: &RaycastOptions,
        result: &mut RaycastResult,
    ) -> bool {
        self.single_hit(RaycastMode::Any, origin, direction, distance, options, result)
    }

    /// Report the hit nearest to `origin`; `result` is only written on a hit
    ///
    /// `direction` must be normalized.
    pub fn raycast_closest(
        &self,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        options: &RaycastOptions,
        result: &mut RaycastResult,
    ) -> bool {
        self.single_hit(RaycastMode::Closest, origin, direction, distance, options, result)
    }

    /// Feed every hit along the ray to `on_hit`, in the order the solver finds them
    ///
    /// Returning [`RaycastControl::Stop`] ends the traversal. Returns whether
    /// anything was hit.
    pub fn raycast_all<F>(
        &self,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        options: &RaycastOptions,
        mut on_hit: F,
    ) -> bool
    where
        F: FnMut(&RaycastResult) -> RaycastControl,
    {
        let segment = RaySegment::from_direction(origin, direction, distance);
        self.solver
            .raycast(&segment, &options.to_query(RaycastMode::All), &mut |hit| {
                on_hit(&self.to_result(hit))
            })
    }
}
