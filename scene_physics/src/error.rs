//! Error types for the physics layer

use crate::physics::pair_hash::ShapeId;
use crate::physics::solver::{BodyHandle, JointHandle};
use hecs::Entity;

/// Errors that can occur while loading or validating a physics configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid physics configuration: {0}")]
    Invalid(String),
}

/// Errors reported by the solver boundary
///
/// None of these abort a tick. The system logs them and carries on, so a
/// failure shows up as a missing body or a skipped event rather than a panic.
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("Shape id {0} does not fit in 16 bits")]
    ShapeIdOverflow(u32),

    #[error("Unknown body handle {0:?}")]
    UnknownBody(BodyHandle),

    #[error("Body {0:?} has no shape {1:?}")]
    UnknownShape(BodyHandle, ShapeId),

    #[error("Unknown joint handle {0:?}")]
    UnknownJoint(JointHandle),

    #[error("Joint target {0:?} has no simulation body")]
    MissingJointBody(Entity),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
