use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    partitioning::{Bvh, BvhBuildStrategy},
};

use super::narrow_phase::{ParryShape, static_shape};
use super::types::{Iso, StaticShape};

/// Acceleration structure for broad-phase queries over immutable world statics.
///
/// Notes:
/// - Finite shapes (Cuboid, Sphere, Capsule) are stored as world-space AABBs in a BVH.
///   Planes are handled separately because they are infinite.
/// - `non_plane_indices` maps each BVH leaf back to its index in the original slice.
/// - `plane_indices` stores indices of planes in the original slice.
pub struct WorldAccel {
    pub bvh: Bvh,
    pub non_plane_indices: Vec<usize>,
    pub plane_indices: Vec<usize>,
}

impl WorldAccel {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.non_plane_indices.is_empty() && self.plane_indices.is_empty()
    }

    /// Number of finite entries (AABBs) in this accelerator.
    #[inline]
    pub fn len(&self) -> usize {
        self.non_plane_indices.len()
    }

    /// Indices of every static that may touch `query`: all planes, then BVH hits
    /// in ascending index order so iteration is deterministic.
    pub fn candidates(&self, query: &Aabb) -> Vec<usize> {
        let mut finite: Vec<usize> = self
            .bvh
            .intersect_aabb(query)
            .map(|leaf_idx| self.non_plane_indices[leaf_idx as usize])
            .collect();
        finite.sort_unstable();
        let mut out = self.plane_indices.clone();
        out.extend(finite);
        out
    }
}

/// Build the broad-phase accelerator over a list of static shapes.
pub fn build_world_accel<'a>(statics: impl IntoIterator<Item = &'a StaticShape>) -> WorldAccel {
    let mut aabbs: Vec<Aabb> = Vec::new();
    let mut non_plane_indices: Vec<usize> = Vec::new();
    let mut plane_indices: Vec<usize> = Vec::new();

    for (i, s) in statics.into_iter().enumerate() {
        match s {
            StaticShape::Plane { .. } => plane_indices.push(i),
            _ => {
                let (shape, iso) = static_shape(s);
                aabbs.push(shape.aabb(&iso));
                non_plane_indices.push(i);
            }
        }
    }

    WorldAccel {
        bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs),
        non_plane_indices,
        plane_indices,
    }
}

/// AABB covering `shape` at both ends of a translation, inflated by `margin`.
pub(crate) fn swept_aabb(shape: &ParryShape, start: &Iso, end: &Iso, margin: f32) -> Aabb {
    let swept = aabb_union(&shape.aabb(start), &shape.aabb(end));
    aabb_inflate(&swept, margin)
}

/// Compute the union of two AABBs.
fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    let min = na::Point3::new(
        a.mins.x.min(b.mins.x),
        a.mins.y.min(b.mins.y),
        a.mins.z.min(b.mins.z),
    );
    let max = na::Point3::new(
        a.maxs.x.max(b.maxs.x),
        a.maxs.y.max(b.maxs.y),
        a.maxs.z.max(b.maxs.z),
    );
    Aabb {
        mins: min,
        maxs: max,
    }
}

/// Inflate an AABB by `margin` on all sides.
fn aabb_inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = na::Vector3::new(margin, margin, margin);
    Aabb {
        mins: a.mins - delta,
        maxs: a.maxs + delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::types::{Transform, Vec3};

    fn cube_at(x: f32) -> StaticShape {
        StaticShape::Cuboid {
            half_extents: Vec3::new(1.0, 1.0, 1.0),
            transform: Transform::from_translation(Vec3::new(x, 0.0, 0.0)),
        }
    }

    #[test]
    fn planes_are_always_candidates() {
        let statics = [
            cube_at(100.0),
            StaticShape::Plane {
                normal: Vec3::z(),
                dist: 0.0,
            },
        ];
        let accel = build_world_accel(statics.iter());
        assert_eq!(accel.len(), 1);
        assert_eq!(accel.plane_indices, vec![1]);

        let far_away = Aabb::new(na::Point3::new(-1.0, -1.0, -1.0), na::Point3::new(1.0, 1.0, 1.0));
        assert_eq!(accel.candidates(&far_away), vec![1]);
    }

    #[test]
    fn candidates_are_sorted_and_pruned() {
        let statics = [cube_at(10.0), cube_at(0.0), cube_at(-10.0), cube_at(3.0)];
        let accel = build_world_accel(statics.iter());

        let query = Aabb::new(na::Point3::new(-0.5, -0.5, -0.5), na::Point3::new(2.5, 0.5, 0.5));
        assert_eq!(accel.candidates(&query), vec![1, 3]);
    }
}
