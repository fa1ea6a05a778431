//! Physics components for the entity system

use crate::physics::pair_hash::ShapeId;
use crate::physics::solver::{BodyHandle, JointHandle};
use glam::Vec3;
use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Synchronization state of a body, collider or joint with the solver
///
/// Anything `Dirty` is rebuilt by the next initialize pass. Freshly created and
/// deserialized components start dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncState {
    /// Needs (re)initialization before the next step
    #[default]
    Dirty,
    /// Matches what the solver holds
    Clean,
}

impl SyncState {
    /// Whether the next initialize pass must rebuild this object
    pub fn is_dirty(self) -> bool {
        self == SyncState::Dirty
    }
}

/// Collision filter bits matching every group
pub const ALL_GROUPS: u32 = u32::MAX;

/// Rigidbody component for physics simulation
///
/// The body's shape is the compound of the entity's own collider and the colliders
/// of descendants that carry no rigid body of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBody {
    /// Mass in kilograms; zero makes the body static
    pub mass: f32,

    /// Linear damping coefficient
    pub linear_damping: f32,

    /// Angular damping coefficient
    pub angular_damping: f32,

    /// Initial linear velocity in world space
    pub linear_velocity: Vec3,

    /// Initial angular velocity in world space
    pub angular_velocity: Vec3,

    /// Groups this body belongs to
    pub collision_group: u32,

    /// Groups this body collides with
    pub collision_mask: u32,

    /// Constraints owned by this body
    #[serde(skip)]
    pub joints: Vec<Joint>,

    #[serde(skip)]
    pub state: SyncState,

    /// Solver body, present once initialized
    #[serde(skip)]
    pub handle: Option<BodyHandle>,

    /// Set once the transform sync pass has written this body back
    #[serde(skip)]
    pub updated: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            mass: 1.0,
            linear_damping: 0.01,
            angular_damping: 0.01,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            collision_group: 1,
            collision_mask: ALL_GROUPS,
            joints: Vec::new(),
            state: SyncState::Dirty,
            handle: None,
            updated: false,
        }
    }
}

impl RigidBody {
    /// Create a dynamic rigidbody with the given mass
    pub fn dynamic(mass: f32) -> Self {
        Self {
            mass,
            ..Default::default()
        }
    }

    /// Create a static rigidbody (zero mass)
    pub fn fixed() -> Self {
        Self {
            mass: 0.0,
            ..Default::default()
        }
    }

    /// Set the initial linear velocity
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Attach a joint to this body
    pub fn with_joint(mut self, joint: Joint) -> Self {
        self.joints.push(joint);
        self
    }

    /// Whether the solver moves this body
    pub fn is_dynamic(&self) -> bool {
        self.mass > 0.0
    }

    /// Force a rebuild on the next initialize pass
    pub fn set_to_dirty(&mut self) {
        self.state = SyncState::Dirty;
    }
}

/// Collision shape types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ColliderShape {
    /// Sphere with radius
    Sphere { radius: f32 },
    /// Box with half-extents (width/2, height/2, depth/2)
    Box { half_extents: Vec3 },
    /// Capsule with radius and half-height (height is along Y axis)
    Capsule { radius: f32, half_height: f32 },
}

impl Default for ColliderShape {
    fn default() -> Self {
        ColliderShape::Box {
            half_extents: Vec3::splat(0.5),
        }
    }
}

impl ColliderShape {
    /// The shape resized by a world scale
    ///
    /// Round shapes cannot scale non-uniformly, so they take the largest axis
    /// that affects them.
    pub fn scaled(&self, scale: Vec3) -> Self {
        let scale = scale.abs();
        match *self {
            ColliderShape::Sphere { radius } => ColliderShape::Sphere {
                radius: radius * scale.max_element(),
            },
            ColliderShape::Box { half_extents } => ColliderShape::Box {
                half_extents: half_extents * scale,
            },
            ColliderShape::Capsule {
                radius,
                half_height,
            } => ColliderShape::Capsule {
                radius: radius * scale.x.max(scale.z),
                half_height: half_height * scale.y,
            },
        }
    }
}

/// Surface properties handed to the solver
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PhysicsMaterial {
    /// Friction coefficient
    pub friction: f32,
    /// Restitution (bounciness) coefficient
    pub restitution: f32,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.0,
        }
    }
}

/// Collider component for collision detection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Collider {
    /// Collision shape in the entity's local space
    pub shape: ColliderShape,

    /// Is this a trigger (no collision response)
    pub is_trigger: bool,

    /// Optional surface material
    pub material: Option<PhysicsMaterial>,

    #[serde(skip)]
    pub state: SyncState,

    /// Entity whose rigid body currently carries this collider
    #[serde(skip)]
    pub body_entity: Option<Entity>,

    /// Standalone static body used while no rigid body carries this collider
    #[serde(skip)]
    pub lonely_body: Option<BodyHandle>,

    /// Solver id of the shape built from this collider
    #[serde(skip)]
    pub shape_id: Option<ShapeId>,
}

impl Collider {
    /// Create a sphere collider
    pub fn sphere(radius: f32) -> Self {
        Self {
            shape: ColliderShape::Sphere { radius },
            ..Default::default()
        }
    }

    /// Create a box collider
    pub fn box_collider(half_extents: Vec3) -> Self {
        Self {
            shape: ColliderShape::Box { half_extents },
            ..Default::default()
        }
    }

    /// Create a capsule collider
    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self {
            shape: ColliderShape::Capsule {
                radius,
                half_height,
            },
            ..Default::default()
        }
    }

    /// Set this collider as a trigger
    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Set the physics material for this collider
    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = Some(material);
        self
    }

    /// Whether contacts with this collider produce a physical response
    pub fn collision_response(&self) -> bool {
        !self.is_trigger
    }

    /// Force a rebuild on the next initialize pass
    pub fn set_to_dirty(&mut self) {
        self.state = SyncState::Dirty;
    }
}

/// Kind of constraint a joint imposes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    /// Anchors coincide, rotation is free
    Ball,
    /// Anchors coincide, rotation only about the axis (in the owning body's space)
    Hinge { axis: Vec3 },
    /// Relative pose is locked
    Fixed,
}

/// Constraint between the owning entity's rigid body and another entity's rigid body
#[derive(Debug, Clone)]
pub struct Joint {
    pub kind: JointKind,
    /// Entity carrying the other rigid body
    pub connected_entity: Entity,
    /// Anchor in the owning body's space
    pub local_anchor: Vec3,
    /// Anchor in the connected body's space
    pub connected_anchor: Vec3,
    /// Whether the two bodies still generate contacts with each other
    pub collide_connected: bool,
    pub state: SyncState,
    /// Solver joint, present once initialized
    pub handle: Option<JointHandle>,
}

impl Joint {
    /// Create a joint towards another entity's body
    pub fn new(kind: JointKind, connected_entity: Entity) -> Self {
        Self {
            kind,
            connected_entity,
            local_anchor: Vec3::ZERO,
            connected_anchor: Vec3::ZERO,
            collide_connected: false,
            state: SyncState::Dirty,
            handle: None,
        }
    }

    /// Set both anchors
    pub fn with_anchors(mut self, local_anchor: Vec3, connected_anchor: Vec3) -> Self {
        self.local_anchor = local_anchor;
        self.connected_anchor = connected_anchor;
        self
    }
}
