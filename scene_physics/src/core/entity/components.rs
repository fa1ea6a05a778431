//! Scene graph components the physics layer reads from and writes back to

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Pose of an entity relative to its parent
///
/// Physics only ever writes `position` and `rotation`; `scale` belongs to the scene.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the rigid part of the pose, leaving scale alone
    pub fn set_pose(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation;
    }

    /// Local matrix (scale, then rotation, then translation)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// World-space matrix of an entity, maintained by the hierarchy pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GlobalTransform {
    pub matrix: Mat4,
    /// Whether the matrix moved during the current frame
    #[serde(skip)]
    pub changed: bool,
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self::from_matrix(Mat4::IDENTITY)
    }
}

impl GlobalTransform {
    pub fn from_matrix(matrix: Mat4) -> Self {
        Self {
            matrix,
            changed: false,
        }
    }

    /// A matrix that was just written this frame
    pub fn written(matrix: Mat4) -> Self {
        Self {
            matrix,
            changed: true,
        }
    }

    /// Store a recomputed matrix, flagging a change only if it differs
    pub fn update(&mut self, matrix: Mat4) {
        self.changed = self.matrix != matrix;
        self.matrix = matrix;
    }

    /// Store a matrix and flag it changed unconditionally
    pub fn overwrite(&mut self, matrix: Mat4) {
        self.matrix = matrix;
        self.changed = true;
    }

    pub fn position(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn to_scale_rotation_translation(&self) -> (Vec3, Quat, Vec3) {
        self.matrix.to_scale_rotation_translation()
    }
}

/// Link to the entity whose transform this one is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub hecs::Entity);
