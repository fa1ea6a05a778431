//! Broad phase collision detection using sweep and prune

use super::AABB;
use glam::Vec3;
use std::cmp::Ordering;

/// Axis for sweep and prune
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn extent(self, aabb: &AABB) -> (f32, f32) {
        match self {
            Axis::X => (aabb.min.x, aabb.max.x),
            Axis::Y => (aabb.min.y, aabb.max.y),
            Axis::Z => (aabb.min.z, aabb.max.z),
        }
    }
}

/// Endpoint for sweep and prune
struct Endpoint {
    value: f32,
    index: usize,
    is_min: bool,
}

/// Indices of every overlapping pair of boxes, each as `(smaller, larger)`, sorted
pub fn sweep_and_prune(boxes: &[AABB]) -> Vec<(usize, usize)> {
    if boxes.len() < 2 {
        return Vec::new();
    }

    let axis = determine_best_axis(boxes);

    let mut endpoints = Vec::with_capacity(boxes.len() * 2);
    for (index, aabb) in boxes.iter().enumerate() {
        let (min_value, max_value) = axis.extent(aabb);
        endpoints.push(Endpoint {
            value: min_value,
            index,
            is_min: true,
        });
        endpoints.push(Endpoint {
            value: max_value,
            index,
            is_min: false,
        });
    }
    // Starts before ends at equal values so touching boxes still pair up
    endpoints.sort_by(|a, b| {
        a.value
            .partial_cmp(&b.value)
            .unwrap_or(Ordering::Equal)
            .then(b.is_min.cmp(&a.is_min))
    });

    let mut pairs = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    for endpoint in endpoints {
        if endpoint.is_min {
            for &active_index in &active {
                if boxes[active_index].overlaps(&boxes[endpoint.index]) {
                    pairs.push((
                        active_index.min(endpoint.index),
                        active_index.max(endpoint.index),
                    ));
                }
            }
            active.push(endpoint.index);
        } else {
            active.retain(|&idx| idx != endpoint.index);
        }
    }

    pairs.sort_unstable();
    pairs.dedup();
    pairs
}

/// Axis with the highest variance of box centers
fn determine_best_axis(boxes: &[AABB]) -> Axis {
    let count = boxes.len() as f32;
    let mean = boxes.iter().map(AABB::center).sum::<Vec3>() / count;
    let variance = boxes
        .iter()
        .map(|aabb| {
            let diff = aabb.center() - mean;
            diff * diff
        })
        .sum::<Vec3>()
        / count;

    if variance.x > variance.y && variance.x > variance.z {
        Axis::X
    } else if variance.y > variance.z {
        Axis::Y
    } else {
        Axis::Z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force_pairs(boxes: &[AABB]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes[i].overlaps(&boxes[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    #[test]
    fn test_sweep_and_prune() {
        let boxes = vec![
            AABB::new(Vec3::ZERO, Vec3::ONE),
            AABB::new(Vec3::splat(0.5), Vec3::splat(1.5)),
            AABB::new(Vec3::splat(10.0), Vec3::splat(11.0)),
        ];

        let pairs = sweep_and_prune(&boxes);
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn test_touching_boxes_pair() {
        let boxes = vec![
            AABB::new(Vec3::ZERO, Vec3::ONE),
            AABB::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0)),
        ];
        assert_eq!(sweep_and_prune(&boxes), vec![(0, 1)]);
    }

    #[test]
    fn test_matches_brute_force() {
        let boxes: Vec<AABB> = (0..24)
            .map(|i| {
                let center = Vec3::new(
                    (i % 5) as f32 * 0.9,
                    (i % 3) as f32 * 1.7,
                    (i / 6) as f32 * 0.8,
                );
                AABB::from_center_half_extents(center, Vec3::splat(0.5))
            })
            .collect();

        assert_eq!(sweep_and_prune(&boxes), brute_force_pairs(&boxes));
    }
}
