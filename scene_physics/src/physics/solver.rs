//! Boundary with the rigid-body solver
//!
//! The integration layer never integrates, detects collisions or solves
//! constraints itself. It talks to a solver through the [`Solver`] trait, which
//! keeps the solver swappable and lets tests drive the layer with a scripted one.

use crate::error::PhysicsError;
use crate::physics::components::{ColliderShape, JointKind, PhysicsMaterial, ALL_GROUPS};
use crate::physics::pair_hash::ShapeId;
use glam::{Quat, Vec3};

/// Handle to a body living in the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

/// Handle to a joint living in the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(pub u32);

/// How the solver advances time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimestepPolicy {
    /// Fixed steps of `timestep`, at most `max_sub_steps` per call, catching up with the wall clock
    Fixed { timestep: f32, max_sub_steps: u32 },
    /// One step of exactly the wall-clock delta
    Variable,
}

/// One shape of a body, placed relative to the body origin
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDesc {
    pub geometry: ColliderShape,
    pub offset: Vec3,
    pub rotation: Quat,
    /// False for triggers: contacts are reported but not resolved
    pub collision_response: bool,
    pub material: Option<PhysicsMaterial>,
}

impl ShapeDesc {
    /// A shape centred on the body origin
    pub fn new(geometry: ColliderShape) -> Self {
        Self {
            geometry,
            offset: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            collision_response: true,
            material: None,
        }
    }
}

/// Everything the solver needs to create a body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    /// Zero mass makes the body static
    pub mass: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub collision_group: u32,
    pub collision_mask: u32,
    pub shapes: Vec<ShapeDesc>,
}

impl BodyDesc {
    /// A body at a pose with no shapes yet
    pub fn new(mass: f32, position: Vec3, rotation: Quat) -> Self {
        Self {
            mass,
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            collision_group: 1,
            collision_mask: ALL_GROUPS,
            shapes: Vec::new(),
        }
    }

    /// Add a shape to the body
    pub fn with_shape(mut self, shape: ShapeDesc) -> Self {
        self.shapes.push(shape);
        self
    }
}

/// Everything the solver needs to create a joint
#[derive(Debug, Clone, PartialEq)]
pub struct JointDesc {
    pub kind: JointKind,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
    pub collide_connected: bool,
}

/// A pair of shapes the solver found touching during a step
///
/// The solver may report the same pair more than once per step (one record per
/// contact manifold) and in either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawContact {
    pub shape_a: ShapeId,
    pub shape_b: ShapeId,
}

impl RawContact {
    pub fn new(shape_a: ShapeId, shape_b: ShapeId) -> Self {
        Self { shape_a, shape_b }
    }
}

/// World-space segment a ray query runs along
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegment {
    pub start: Vec3,
    pub end: Vec3,
}

impl RaySegment {
    /// Segment from an origin along an already-normalized direction
    pub fn from_direction(origin: Vec3, direction: Vec3, distance: f32) -> Self {
        Self {
            start: origin,
            end: origin + direction * distance,
        }
    }

    pub fn length(&self) -> f32 {
        (self.end - self.start).length()
    }
}

/// Which hits a ray query reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaycastMode {
    /// The first hit found, in no particular order
    Any,
    /// Only the nearest hit along the segment
    Closest,
    /// Every hit, in traversal order, until the callback stops it
    All,
}

/// A ray query in solver terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayQuery {
    pub mode: RaycastMode,
    /// Groups the ray tests against
    pub collision_mask: u32,
    /// Groups the ray itself belongs to
    pub collision_group: u32,
    /// Ignore surfaces facing away from the ray
    pub skip_backfaces: bool,
}

/// Callback verdict for multi-hit ray queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaycastControl {
    Continue,
    Stop,
}

/// A ray hit as the solver reports it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverHit {
    pub body: BodyHandle,
    pub shape: ShapeId,
    pub point: Vec3,
    pub normal: Vec3,
    /// Distance from the segment start
    pub distance: f32,
}

/// Capabilities the integration layer needs from a rigid-body solver
pub trait Solver {
    /// Create a body and add it to the simulation
    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, PhysicsError>;

    /// Remove a body and its shapes from the simulation
    fn remove_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError>;

    /// Ids of a body's shapes, in the order of its [`BodyDesc::shapes`]
    fn body_shapes(&self, body: BodyHandle) -> &[ShapeId];

    /// Current world pose of a body
    fn body_pose(&self, body: BodyHandle) -> Option<(Vec3, Quat)>;

    /// Teleport a body
    fn set_body_pose(
        &mut self,
        body: BodyHandle,
        position: Vec3,
        rotation: Quat,
    ) -> Result<(), PhysicsError>;

    /// Replace a shape's geometry and response flag in place
    fn update_shape(
        &mut self,
        body: BodyHandle,
        shape: ShapeId,
        geometry: &ColliderShape,
        collision_response: bool,
    ) -> Result<(), PhysicsError>;

    fn create_joint(&mut self, desc: &JointDesc) -> Result<JointHandle, PhysicsError>;

    fn remove_joint(&mut self, joint: JointHandle) -> Result<(), PhysicsError>;

    fn set_gravity(&mut self, gravity: Vec3);

    fn gravity(&self) -> Vec3;

    /// Advance the simulation by `wall_dt` seconds of wall-clock time
    ///
    /// `on_post_step` must be called exactly once after every internal step with
    /// the contacts found during that step.
    fn step(
        &mut self,
        policy: TimestepPolicy,
        wall_dt: f32,
        on_post_step: &mut dyn FnMut(&[RawContact]),
    );

    /// Run a ray query, feeding hits to `on_hit`; returns whether anything was hit
    fn raycast(
        &self,
        segment: &RaySegment,
        query: &RayQuery,
        on_hit: &mut dyn FnMut(&SolverHit) -> RaycastControl,
    ) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_from_direction() {
        let segment = RaySegment::from_direction(Vec3::new(1.0, 0.0, 0.0), Vec3::Y, 5.0);
        assert_eq!(segment.start, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(segment.end, Vec3::new(1.0, 5.0, 0.0));
        assert!((segment.length() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_body_desc_builder() {
        let desc = BodyDesc::new(0.0, Vec3::X, Quat::IDENTITY)
            .with_shape(ShapeDesc::new(ColliderShape::Sphere { radius: 1.0 }));
        assert_eq!(desc.shapes.len(), 1);
        assert!(desc.shapes[0].collision_response);
        assert_eq!(desc.collision_mask, ALL_GROUPS);
    }
}
