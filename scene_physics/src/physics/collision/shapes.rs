//! Collision shape bounds, overlap tests and ray intersection

use super::{Ray, ShapeRayHit, AABB};
use crate::physics::components::ColliderShape;
use glam::{Quat, Vec3};

const PARALLEL_EPSILON: f32 = 1e-8;

impl ColliderShape {
    /// Get the AABB for this shape transformed by position and rotation
    pub fn world_aabb(&self, position: Vec3, rotation: Quat) -> AABB {
        match *self {
            ColliderShape::Sphere { radius } => {
                AABB::from_center_half_extents(position, Vec3::splat(radius))
            }
            ColliderShape::Box { half_extents } => {
                let mut aabb = AABB::empty();
                for corner in 0..8 {
                    let sign = Vec3::new(
                        if corner & 1 == 0 { -1.0 } else { 1.0 },
                        if corner & 2 == 0 { -1.0 } else { 1.0 },
                        if corner & 4 == 0 { -1.0 } else { 1.0 },
                    );
                    aabb.expand_to_include(position + rotation * (half_extents * sign));
                }
                aabb
            }
            ColliderShape::Capsule {
                radius,
                half_height,
            } => {
                let axis = rotation * Vec3::new(0.0, half_height, 0.0);
                let top = AABB::from_center_half_extents(position + axis, Vec3::splat(radius));
                let bottom = AABB::from_center_half_extents(position - axis, Vec3::splat(radius));
                top.merge(&bottom)
            }
        }
    }

    /// Check if a point is inside the shape (in local space)
    pub fn contains_point(&self, point: Vec3) -> bool {
        match *self {
            ColliderShape::Sphere { radius } => point.length_squared() <= radius * radius,
            ColliderShape::Box { half_extents } => point.abs().cmple(half_extents).all(),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => {
                let closest = Vec3::new(0.0, point.y.clamp(-half_height, half_height), 0.0);
                (point - closest).length_squared() <= radius * radius
            }
        }
    }

    /// Cast a world-space ray against this shape placed at a pose
    ///
    /// A ray starting inside the shape reports the exit point, flagged as a backface.
    pub fn raycast(
        &self,
        position: Vec3,
        rotation: Quat,
        ray: &Ray,
        max_distance: f32,
    ) -> Option<ShapeRayHit> {
        let inverse = rotation.conjugate();
        let local = Ray {
            origin: inverse * (ray.origin - position),
            direction: inverse * ray.direction,
        };

        let hit = match *self {
            ColliderShape::Sphere { radius } => ray_sphere(&local, Vec3::ZERO, radius),
            ColliderShape::Box { half_extents } => ray_box(&local, half_extents),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => ray_capsule(self, &local, radius, half_height),
        }?;

        if hit.distance > max_distance {
            return None;
        }

        Some(ShapeRayHit {
            normal: rotation * hit.normal,
            ..hit
        })
    }
}

/// Whether two posed shapes overlap
///
/// Sphere pairs and sphere-box pairs are tested exactly; every other
/// combination falls back to their world bounds.
pub fn shapes_overlap(
    shape_a: &ColliderShape,
    pose_a: (Vec3, Quat),
    shape_b: &ColliderShape,
    pose_b: (Vec3, Quat),
) -> bool {
    match (*shape_a, *shape_b) {
        (ColliderShape::Sphere { radius: radius_a }, ColliderShape::Sphere { radius: radius_b }) => {
            let radius_sum = radius_a + radius_b;
            (pose_b.0 - pose_a.0).length_squared() <= radius_sum * radius_sum
        }
        (ColliderShape::Sphere { radius }, ColliderShape::Box { half_extents }) => {
            sphere_box_overlap(pose_a.0, radius, pose_b, half_extents)
        }
        (ColliderShape::Box { half_extents }, ColliderShape::Sphere { radius }) => {
            sphere_box_overlap(pose_b.0, radius, pose_a, half_extents)
        }
        _ => shape_a
            .world_aabb(pose_a.0, pose_a.1)
            .overlaps(&shape_b.world_aabb(pose_b.0, pose_b.1)),
    }
}

fn sphere_box_overlap(
    sphere_pos: Vec3,
    sphere_radius: f32,
    (box_pos, box_rot): (Vec3, Quat),
    box_half_extents: Vec3,
) -> bool {
    // Closest point on the box, in the box's local space
    let local_sphere_pos = box_rot.conjugate() * (sphere_pos - box_pos);
    let closest = local_sphere_pos.clamp(-box_half_extents, box_half_extents);
    (local_sphere_pos - closest).length_squared() <= sphere_radius * sphere_radius
}

/// Both roots of a ray against a sphere, nearest first
fn sphere_roots(ray: &Ray, center: Vec3, radius: f32) -> Option<(f32, f32)> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    Some((-b - root, -b + root))
}

fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<ShapeRayHit> {
    let (t_near, t_far) = sphere_roots(ray, center, radius)?;
    let inside = (ray.origin - center).length_squared() <= radius * radius;
    let distance = if inside { t_far } else { t_near };
    if distance < 0.0 {
        return None;
    }

    Some(ShapeRayHit {
        distance,
        normal: (ray.at(distance) - center) / radius,
        backface: inside,
    })
}

fn ray_box(ray: &Ray, half_extents: Vec3) -> Option<ShapeRayHit> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_normal = Vec3::ZERO;
    let mut exit_normal = Vec3::ZERO;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let direction = ray.direction[axis];
        let extent = half_extents[axis];

        if direction.abs() < PARALLEL_EPSILON {
            if origin.abs() > extent {
                return None;
            }
            continue;
        }

        let mut unit = Vec3::ZERO;
        unit[axis] = direction.signum();
        let t1 = (-extent - origin) / direction;
        let t2 = (extent - origin) / direction;
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };

        if near > t_enter {
            t_enter = near;
            enter_normal = -unit;
        }
        if far < t_exit {
            t_exit = far;
            exit_normal = unit;
        }
    }

    if t_enter > t_exit || t_exit < 0.0 {
        return None;
    }

    if t_enter >= 0.0 {
        Some(ShapeRayHit {
            distance: t_enter,
            normal: enter_normal,
            backface: false,
        })
    } else {
        Some(ShapeRayHit {
            distance: t_exit,
            normal: exit_normal,
            backface: true,
        })
    }
}

fn ray_capsule(
    shape: &ColliderShape,
    ray: &Ray,
    radius: f32,
    half_height: f32,
) -> Option<ShapeRayHit> {
    if shape.contains_point(ray.origin) {
        return exit_from_inside(ray, radius, half_height);
    }

    let mut best: Option<ShapeRayHit> = None;
    let mut keep_nearest = |distance: f32, normal: Vec3| {
        if distance >= 0.0 && best.map_or(true, |hit| distance < hit.distance) {
            best = Some(ShapeRayHit {
                distance,
                normal,
                backface: false,
            });
        }
    };

    // Cylinder wall
    let a = ray.direction.x * ray.direction.x + ray.direction.z * ray.direction.z;
    if a > PARALLEL_EPSILON {
        let b = ray.origin.x * ray.direction.x + ray.origin.z * ray.direction.z;
        let c = ray.origin.x * ray.origin.x + ray.origin.z * ray.origin.z - radius * radius;
        let discriminant = b * b - a * c;
        if discriminant >= 0.0 {
            let t = (-b - discriminant.sqrt()) / a;
            let point = ray.at(t);
            if point.y.abs() <= half_height {
                keep_nearest(t, Vec3::new(point.x, 0.0, point.z) / radius);
            }
        }
    }

    // Hemispherical caps
    for cap in [half_height, -half_height] {
        let center = Vec3::new(0.0, cap, 0.0);
        if let Some((t_near, _)) = sphere_roots(ray, center, radius) {
            let point = ray.at(t_near);
            if point.y * cap.signum() >= half_height {
                keep_nearest(t_near, (point - center) / radius);
            }
        }
    }

    best
}

/// Exit point of a ray that starts inside a capsule
fn exit_from_inside(ray: &Ray, radius: f32, half_height: f32) -> Option<ShapeRayHit> {
    let mut exit: Option<ShapeRayHit> = None;
    let mut keep_farthest = |distance: f32, normal: Vec3| {
        if distance >= 0.0 && exit.map_or(true, |hit| distance > hit.distance) {
            exit = Some(ShapeRayHit {
                distance,
                normal,
                backface: true,
            });
        }
    };

    let a = ray.direction.x * ray.direction.x + ray.direction.z * ray.direction.z;
    if a > PARALLEL_EPSILON {
        let b = ray.origin.x * ray.direction.x + ray.origin.z * ray.direction.z;
        let c = ray.origin.x * ray.origin.x + ray.origin.z * ray.origin.z - radius * radius;
        let discriminant = b * b - a * c;
        if discriminant >= 0.0 {
            let t = (-b + discriminant.sqrt()) / a;
            let point = ray.at(t);
            if point.y.abs() <= half_height {
                keep_farthest(t, Vec3::new(point.x, 0.0, point.z) / radius);
            }
        }
    }

    for cap in [half_height, -half_height] {
        let center = Vec3::new(0.0, cap, 0.0);
        if let Some((_, t_far)) = sphere_roots(ray, center, radius) {
            let point = ray.at(t_far);
            if point.y * cap.signum() >= half_height {
                keep_farthest(t_far, (point - center) / radius);
            }
        }
    }

    exit
}
