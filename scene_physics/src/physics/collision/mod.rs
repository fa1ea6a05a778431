//! Geometry used by the reference solver for contacts and ray queries

pub mod broad_phase;
pub mod shapes;

use glam::Vec3;

/// Axis-aligned bounding box for broad phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from a center point and half-extents
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// An inverted box that any point expands into
    pub fn empty() -> Self {
        Self::new(Vec3::splat(f32::MAX), Vec3::splat(f32::MIN))
    }

    /// Check if this AABB overlaps with another
    pub fn overlaps(&self, other: &AABB) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Expand this AABB to include a point
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Merge two AABBs
    pub fn merge(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Ray with a normalized direction
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Point along the ray at distance t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Intersection of a ray with one shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRayHit {
    /// Distance along the ray
    pub distance: f32,
    /// Outward surface normal at the hit point
    pub normal: Vec3,
    /// The ray started inside the shape and hit the surface from behind
    pub backface: bool,
}
