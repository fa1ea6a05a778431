//! Physics integration: solver boundary, contact events, standalone colliders,
//! ray queries and transform write-back

pub mod accumulator;
pub mod collision;
pub mod components;
pub mod contacts;
pub mod lonely;
pub mod pair_hash;
pub mod raycast;
pub mod reference;
pub mod solver;
pub mod sync;
pub mod system;
pub mod world;

pub use components::{
    Collider, ColliderShape, Joint, JointKind, PhysicsMaterial, RigidBody, SyncState, ALL_GROUPS,
};
pub use contacts::{ContactEventTracker, PhysicsEvent};
pub use pair_hash::{ContactPairKey, ShapeId};
pub use raycast::{RaycastOptions, RaycastResult};
pub use reference::ReferenceSolver;
pub use solver::{
    BodyDesc, BodyHandle, JointDesc, JointHandle, RawContact, RayQuery, RaySegment,
    RaycastControl, RaycastMode, ShapeDesc, Solver, SolverHit, TimestepPolicy,
};
pub use system::{PhysicsSystem, SimulationMode};
pub use world::{JointLink, PhysicsWorld};
