//! Entity-Component System (ECS) functionality
//!
//! This module provides the scene graph the physics layer writes into:
//! transform components, parent links and hierarchy propagation.

pub mod components;
pub mod hierarchy;
pub mod world;

// Re-export commonly used types
pub use components::{GlobalTransform, Parent, Transform};
pub use hierarchy::update_hierarchy_system;
pub use world::World;

// Re-export hecs types that users will need
pub use hecs::Entity;
