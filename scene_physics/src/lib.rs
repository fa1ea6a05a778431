//! Physics integration layer for the entity system
//!
//! This crate connects an external rigid-body solver to a hecs-based scene graph.
//! It tracks contact pairs between steps and turns them into begin/during/end
//! events, keeps colliders without a rigid body alive as standalone static bodies,
//! and writes solver poses back into parent-relative entity transforms.

pub mod config;
pub mod core;
pub mod error;
pub mod physics;

// Re-export commonly used types
pub mod prelude {
    // Entity system types
    pub use crate::core::entity::{
        update_hierarchy_system, Entity, GlobalTransform, Parent, Transform, World,
    };

    // Math types
    pub use glam::{Mat4, Quat, Vec3};

    // Config and error types
    pub use crate::config::PhysicsConfig;
    pub use crate::error::{ConfigError, PhysicsError};

    // Physics types
    pub use crate::physics::{
        Collider, ColliderShape, ContactPairKey, Joint, JointKind, PhysicsEvent, PhysicsMaterial,
        PhysicsSystem, PhysicsWorld, RaycastControl, RaycastOptions, RaycastResult,
        ReferenceSolver, RigidBody, ShapeId, SimulationMode, Solver, SyncState, TimestepPolicy,
    };
}

/// Initialize logging for the physics layer
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
