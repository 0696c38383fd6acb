/*!
Collision root module.

Movement never talks to a physics engine directly. Everything it needs from
the world goes through [`CollisionBackend`]: overlap tests, sweeps, and
minimum-translation queries. The submodules provide a reference backend
built on parry for immutable static geometry:

- types:        shared data types (Transform, StaticShape, CollisionShape, HitResult, Mtd)
- settings:     backend tolerances
- broad:        BVH over static AABBs, candidate queries
- narrow_phase: thin wrappers over parry queries (shape casts, contacts, intersections)
- world:        `StaticWorld`, the backend implementation
*/

pub mod broad;
pub mod narrow_phase;
pub mod settings;
pub mod types;
pub mod world;

pub use broad::{WorldAccel, build_world_accel};
pub use types::{CollisionShape, HitResult, Iso, Mtd, Quat, StaticShape, Transform, Vec3};
pub use world::{StaticEntry, StaticWorld};

use crate::tags::CollisionChannel;

/// Synchronous collision queries used by the movement primitives.
///
/// Implementations must be deterministic: the same query against the same world
/// must return the same answer.
pub trait CollisionBackend: Send + Sync {
    /// True when `shape` placed at `location`/`rotation` overlaps anything blocking `channel`.
    fn overlap_test(
        &self,
        shape: &CollisionShape,
        location: Vec3,
        rotation: Quat,
        channel: CollisionChannel,
    ) -> bool;

    /// Sweep `shape` from `from` to `to` and report the first blocking hit.
    fn sweep(
        &self,
        shape: &CollisionShape,
        from: Vec3,
        to: Vec3,
        rotation: Quat,
        channel: CollisionChannel,
    ) -> HitResult;

    /// Translation that would move `shape` out of everything it currently overlaps.
    /// `None` when nothing overlaps.
    fn compute_mtd(
        &self,
        shape: &CollisionShape,
        location: Vec3,
        rotation: Quat,
        channel: CollisionChannel,
    ) -> Option<Mtd>;
}

/// Convenience: build a `StaticShape::Plane` from a world-space plane pose:
/// - normal = rotation * +Z
/// - dist = dot(normal, translation) + optional offset
#[inline]
pub fn plane_from_pose(rotation: Quat, translation: Vec3, offset_along_normal: f32) -> StaticShape {
    let normal = rotation * Vec3::z();
    let dist = normal.dot(&translation) + offset_along_normal;
    StaticShape::Plane { normal, dist }
}

/// Convenience: build a `StaticShape::Cuboid` with given half extents and pose.
#[inline]
pub fn cuboid_from_pose(half_extents: Vec3, translation: Vec3, rotation: Quat) -> StaticShape {
    StaticShape::Cuboid {
        half_extents,
        transform: Transform {
            translation,
            rotation,
        },
    }
}
