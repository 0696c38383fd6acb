/*!
Core collision types and math aliases shared by the collision submodules.

This module contains no algorithms. It defines the data exchanged between
the collision backend contract, the reference static world, and the movement
primitives that consume sweep/overlap results:
- math aliases (`Vec3`, `Quat`, `Iso`) and the world-space `Transform`
- `StaticShape`: immutable world geometry
- `CollisionShape`: the shape swept on behalf of the moving agent
- `HitResult` / `Mtd`: what a backend reports back
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    #[inline]
    pub fn identity() -> Self {
        Self::new(Vec3::zeros(), Quat::identity())
    }

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// Convert to nalgebra `Isometry3` for use with parry narrow-phase queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        iso_from(self.translation, self.rotation)
    }

    /// Transform a point given in this transform's local space into world space.
    #[inline]
    pub fn transform_point(&self, local: &Vec3) -> Vec3 {
        self.rotation * local + self.translation
    }

    /// Express a world-space point in this transform's local space.
    #[inline]
    pub fn inverse_transform_point(&self, world: &Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.translation)
    }
}

#[inline]
pub fn iso_from(translation: Vec3, rotation: Quat) -> Iso {
    Iso::from_parts(
        na::Translation3::new(translation.x, translation.y, translation.z),
        rotation,
    )
}

/// Static collision shapes supported by the reference world.
///
/// - Plane: infinite plane in world-space represented by its normal and offset (dist)
///          satisfying: normal ⋅ x = dist. Everything behind the plane is solid.
/// - Cuboid: oriented box with half-extents in local space, placed by `transform`.
/// - Capsule: aligned with the local +Z axis.
#[derive(Clone, Copy, Debug)]
pub enum StaticShape {
    Plane {
        /// World-space unit normal of the plane.
        normal: Vec3,
        /// Plane offset along the normal, i.e., normal ⋅ x = dist.
        dist: f32,
    },
    Cuboid {
        /// Local-space half-extents (hx, hy, hz).
        half_extents: Vec3,
        /// World-space pose of the cuboid.
        transform: Transform,
    },
    Sphere {
        radius: f32,
        /// World-space pose (translation used; rotation ignored).
        transform: Transform,
    },
    Capsule {
        radius: f32,
        /// Half of the cylinder length along the local +Z axis.
        half_height: f32,
        transform: Transform,
    },
}

/// Shape swept on behalf of the moving agent, centred on the agent location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollisionShape {
    /// Capsule along the agent's local +Z. `half_height` is the half-length of the
    /// cylinder section, so the total height is `2 * half_height + 2 * radius`.
    Capsule { radius: f32, half_height: f32 },
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

impl CollisionShape {
    #[inline]
    pub fn capsule(radius: f32, half_height: f32) -> Self {
        CollisionShape::Capsule {
            radius,
            half_height,
        }
    }

    /// The same shape grown by `inflation` on every side. Negative values are ignored.
    pub fn inflated(&self, inflation: f32) -> Self {
        let d = inflation.max(0.0);
        match *self {
            CollisionShape::Capsule {
                radius,
                half_height,
            } => CollisionShape::Capsule {
                radius: radius + d,
                half_height,
            },
            CollisionShape::Box { half_extents } => CollisionShape::Box {
                half_extents: half_extents.add_scalar(d),
            },
            CollisionShape::Sphere { radius } => CollisionShape::Sphere { radius: radius + d },
        }
    }

    /// Distance from the centre to the bottom of the shape along local -Z.
    pub fn half_height_total(&self) -> f32 {
        match *self {
            CollisionShape::Capsule {
                radius,
                half_height,
            } => half_height + radius,
            CollisionShape::Box { half_extents } => half_extents.z,
            CollisionShape::Sphere { radius } => radius,
        }
    }
}

/// Result of a sweep reported by a collision backend.
///
/// `normal` is the surface normal of what was hit, pointing back toward the mover.
/// `time` is the fraction of the requested trace actually travelled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitResult {
    pub blocking: bool,
    pub start_penetrating: bool,
    pub penetration_depth: f32,
    pub normal: Vec3,
    pub time: f32,
    pub trace_start: Vec3,
    pub trace_end: Vec3,
    /// Agent location at `time` along the trace.
    pub location: Vec3,
    /// Backend identifier of the object hit, if any.
    pub object: Option<u64>,
}

impl HitResult {
    /// A trace that reached its end without touching anything.
    pub fn no_hit(trace_start: Vec3, trace_end: Vec3) -> Self {
        Self {
            blocking: false,
            start_penetrating: false,
            penetration_depth: 0.0,
            normal: Vec3::zeros(),
            time: 1.0,
            trace_start,
            trace_end,
            location: trace_end,
            object: None,
        }
    }

    /// A blocking hit that did not start inside geometry.
    #[inline]
    pub fn is_valid_blocking_hit(&self) -> bool {
        self.blocking && !self.start_penetrating
    }

    /// Distance actually travelled along the trace.
    #[inline]
    pub fn distance(&self) -> f32 {
        (self.location - self.trace_start).norm()
    }
}

/// Minimum translation that separates a shape from everything it overlaps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mtd {
    /// Unit direction, zero when the overlaps cancel out.
    pub direction: Vec3,
    pub distance: f32,
}

impl Mtd {
    /// Overlapping, but with no usable way out.
    pub const ZERO: Mtd = Mtd {
        direction: Vec3::new(0.0, 0.0, 0.0),
        distance: 0.0,
    };

    pub fn from_adjustment(adjustment: Vec3) -> Self {
        let distance = adjustment.norm();
        if distance <= crate::collision::settings::DIST_EPS {
            return Self::ZERO;
        }
        Self {
            direction: adjustment / distance,
            distance,
        }
    }

    #[inline]
    pub fn adjustment(&self) -> Vec3 {
        self.direction * self.distance
    }
}
