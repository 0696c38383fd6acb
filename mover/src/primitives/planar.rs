use crate::collision::Vec3;
use crate::constants::{SMALL_NUMBER, default_up};

/// Plane every movement vector and location is confined to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlanarConstraint {
    normal: Vec3,
    origin: Vec3,
}

impl PlanarConstraint {
    /// `None` when `normal` is degenerate.
    pub fn new(normal: Vec3, origin: Vec3) -> Option<Self> {
        let len_sq = normal.norm_squared();
        if len_sq <= SMALL_NUMBER {
            return None;
        }
        Some(Self {
            normal: normal / len_sq.sqrt(),
            origin,
        })
    }

    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Remove the component of `v` along the plane normal.
    #[inline]
    pub fn constrain_direction(&self, v: Vec3) -> Vec3 {
        v - self.normal * v.dot(&self.normal)
    }

    /// Project a location onto the plane.
    #[inline]
    pub fn constrain_location(&self, p: Vec3) -> Vec3 {
        p - self.normal * (p - self.origin).dot(&self.normal)
    }
}

/// Constrain a direction to the optional plane.
#[inline]
pub fn constrain_to_plane(plane: Option<&PlanarConstraint>, v: Vec3) -> Vec3 {
    match plane {
        Some(p) => p.constrain_direction(v),
        None => v,
    }
}

/// Constrain a surface normal to the optional plane and renormalize it.
///
/// Returns zero when the normal lies entirely along the plane normal.
pub fn constrain_normal_to_plane(plane: Option<&PlanarConstraint>, normal: Vec3) -> Vec3 {
    let n = constrain_to_plane(plane, normal);
    safe_normal(n)
}

/// Unit vector in the direction of `v`, or zero when `v` is (nearly) zero.
#[inline]
pub fn safe_normal(v: Vec3) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq <= SMALL_NUMBER {
        Vec3::zeros()
    } else {
        v / len_sq.sqrt()
    }
}

/// Clamp the length of `v` to at most `max`.
#[inline]
pub fn clamp_to_max_size(v: Vec3, max: f32) -> Vec3 {
    let max = max.max(0.0);
    let len_sq = v.norm_squared();
    if len_sq > max * max && len_sq > SMALL_NUMBER {
        v * (max / len_sq.sqrt())
    } else {
        v
    }
}

/// Up direction opposite to gravity; falls back to +Z when gravity is zero.
#[inline]
pub fn up_from_gravity(gravity: Vec3) -> Vec3 {
    let up = safe_normal(-gravity);
    if up == Vec3::zeros() { default_up() } else { up }
}

/// Component of `v` along `up`.
#[inline]
pub fn vertical_part(v: Vec3, up: Vec3) -> Vec3 {
    up * v.dot(&up)
}

/// Component of `v` perpendicular to `up`.
#[inline]
pub fn planar_part(v: Vec3, up: Vec3) -> Vec3 {
    v - vertical_part(v, up)
}

/// Right-handed basis `(right, forward, up)` for decomposing adjustments.
///
/// For `up = +Z` this is exactly the world X/Y/Z axes.
pub fn planar_basis(up: Vec3) -> (Vec3, Vec3, Vec3) {
    let up = safe_normal(up);
    let up = if up == Vec3::zeros() { default_up() } else { up };
    let reference = if up.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    let right = safe_normal(reference - up * reference.dot(&up));
    let forward = up.cross(&right);
    (right, forward, up)
}
