use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    query::{self, ShapeCastOptions},
    shape::{self as pshape, Shape},
};

use super::types::{CollisionShape, Iso, StaticShape, Vec3, iso_from};

/// Concrete parry shape, kept on the stack so queries need no allocation.
pub(crate) enum ParryShape {
    Ball(pshape::Ball),
    Cuboid(pshape::Cuboid),
    Capsule(pshape::Capsule),
    HalfSpace(pshape::HalfSpace),
}

impl ParryShape {
    #[inline]
    pub(crate) fn as_dyn(&self) -> &dyn Shape {
        match self {
            ParryShape::Ball(s) => s,
            ParryShape::Cuboid(s) => s,
            ParryShape::Capsule(s) => s,
            ParryShape::HalfSpace(s) => s,
        }
    }

    #[inline]
    pub(crate) fn aabb(&self, iso: &Iso) -> Aabb {
        self.as_dyn().compute_aabb(iso)
    }
}

/// Parry shape for the moving agent. Capsules are aligned with local +Z.
pub(crate) fn agent_shape(shape: &CollisionShape) -> ParryShape {
    match *shape {
        CollisionShape::Capsule {
            radius,
            half_height,
        } => ParryShape::Capsule(pshape::Capsule::new_z(half_height, radius)),
        CollisionShape::Box { half_extents } => ParryShape::Cuboid(pshape::Cuboid::new(half_extents)),
        CollisionShape::Sphere { radius } => ParryShape::Ball(pshape::Ball::new(radius)),
    }
}

/// Parry shape and world pose for a static shape.
///
/// Planes become a `HalfSpace` positioned at `normal * dist`.
pub(crate) fn static_shape(shape: &StaticShape) -> (ParryShape, Iso) {
    match *shape {
        StaticShape::Plane { normal, dist } => {
            let unit_n = na::Unit::new_normalize(normal);
            let origin = unit_n.into_inner() * dist;
            (
                ParryShape::HalfSpace(pshape::HalfSpace::new(unit_n)),
                iso_from(origin, na::UnitQuaternion::identity()),
            )
        }
        StaticShape::Cuboid {
            half_extents,
            transform,
        } => (
            ParryShape::Cuboid(pshape::Cuboid::new(half_extents)),
            transform.iso(),
        ),
        StaticShape::Sphere { radius, transform } => (
            ParryShape::Ball(pshape::Ball::new(radius)),
            iso_from(transform.translation, na::UnitQuaternion::identity()),
        ),
        StaticShape::Capsule {
            radius,
            half_height,
            transform,
        } => (
            ParryShape::Capsule(pshape::Capsule::new_z(half_height, radius)),
            transform.iso(),
        ),
    }
}

/// Contact between the agent and a static shape, expressed from the agent's side.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ContactInfo {
    /// Signed separation; negative when penetrating.
    pub dist: f32,
    /// Unit surface normal pointing from the static shape toward the agent.
    pub normal: Vec3,
}

/// Time of impact (fraction of `vel`) of the agent swept against one static shape.
///
/// Uses `stop_at_penetration = false` so a shape already overlapping the agent does
/// not block a motion that leaves it.
pub(crate) fn cast_against_static(
    agent_iso: &Iso,
    agent: &ParryShape,
    vel: &Vec3,
    target: &ParryShape,
    target_iso: &Iso,
) -> Option<f32> {
    let mut opts = ShapeCastOptions::with_max_time_of_impact(1.0);
    opts.stop_at_penetration = false;
    match query::cast_shapes(
        agent_iso,
        vel,
        agent.as_dyn(),
        target_iso,
        &na::Vector3::zeros(),
        target.as_dyn(),
        opts,
    ) {
        Ok(hit) => hit.map(|h| h.time_of_impact),
        Err(err) => {
            log::warn!("Unsupported shape cast pair: {err:?}");
            None
        }
    }
}

/// Closest contact between the agent and one static shape within `prediction`.
pub(crate) fn contact_with_static(
    agent_iso: &Iso,
    agent: &ParryShape,
    target: &ParryShape,
    target_iso: &Iso,
    prediction: f32,
) -> Option<ContactInfo> {
    // Static shape first: plane contacts are only signed correctly in this order, and
    // normal1 then points out of the obstacle toward the agent.
    match query::contact(
        target_iso,
        target.as_dyn(),
        agent_iso,
        agent.as_dyn(),
        prediction,
    ) {
        Ok(Some(c)) => Some(ContactInfo {
            dist: c.dist,
            normal: c.normal1.into_inner(),
        }),
        Ok(None) => None,
        Err(err) => {
            log::warn!("Unsupported contact pair: {err:?}");
            None
        }
    }
}

/// Boolean overlap test between the agent and one static shape.
pub(crate) fn intersects_static(
    agent_iso: &Iso,
    agent: &ParryShape,
    target: &ParryShape,
    target_iso: &Iso,
) -> bool {
    match query::intersection_test(agent_iso, agent.as_dyn(), target_iso, target.as_dyn()) {
        Ok(hit) => hit,
        Err(err) => {
            log::warn!("Unsupported intersection pair: {err:?}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::types::Transform;

    fn floor() -> StaticShape {
        StaticShape::Plane {
            normal: Vec3::z(),
            dist: 0.0,
        }
    }

    #[test]
    fn falling_sphere_hits_floor_at_expected_fraction() {
        let agent = agent_shape(&CollisionShape::Sphere { radius: 1.0 });
        let (plane, plane_iso) = static_shape(&floor());
        let start = iso_from(Vec3::new(0.0, 0.0, 3.0), na::UnitQuaternion::identity());

        // Sphere bottom is 2 units above the floor; a 4 unit drop touches halfway.
        let toi = cast_against_static(&start, &agent, &Vec3::new(0.0, 0.0, -4.0), &plane, &plane_iso)
            .expect("hit");
        assert!((toi - 0.5).abs() < 1.0e-3, "toi = {toi}");
    }

    #[test]
    fn contact_normal_points_toward_agent() {
        let agent = agent_shape(&CollisionShape::Sphere { radius: 1.0 });
        let (cube, cube_iso) = static_shape(&StaticShape::Cuboid {
            half_extents: Vec3::new(1.0, 1.0, 1.0),
            transform: Transform::from_translation(Vec3::zeros()),
        });
        // Sphere centre 1.5 above the cube centre: 0.5 deep through the top face.
        let at = iso_from(Vec3::new(0.0, 0.0, 1.5), na::UnitQuaternion::identity());
        let c = contact_with_static(&at, &agent, &cube, &cube_iso, 0.0).expect("contact");
        assert!(c.dist < 0.0);
        assert!((c.dist + 0.5).abs() < 1.0e-3);
        assert!(c.normal.z > 0.99, "normal = {:?}", c.normal);
    }

    #[test]
    fn sphere_above_a_plane_has_positive_separation() {
        let agent = agent_shape(&CollisionShape::Sphere { radius: 10.0 });
        let (plane, plane_iso) = static_shape(&floor());
        let at = iso_from(Vec3::new(25.0, -40.0, 50.0), na::UnitQuaternion::identity());
        assert!(contact_with_static(&at, &agent, &plane, &plane_iso, 0.0).is_none());

        let c = contact_with_static(&at, &agent, &plane, &plane_iso, 100.0).expect("within prediction");
        assert!((c.dist - 40.0).abs() < 1.0e-3, "dist = {}", c.dist);
        assert!(c.normal.z > 0.99, "normal = {:?}", c.normal);

        // Sunk 4 units into the floor.
        let sunk = iso_from(Vec3::new(0.0, 0.0, 6.0), na::UnitQuaternion::identity());
        let c = contact_with_static(&sunk, &agent, &plane, &plane_iso, 0.0).expect("contact");
        assert!((c.dist + 4.0).abs() < 1.0e-3, "dist = {}", c.dist);
        assert!(c.normal.z > 0.99);
    }

    #[test]
    fn separated_shapes_do_not_intersect() {
        let agent = agent_shape(&CollisionShape::capsule(0.5, 1.0));
        let (ball, ball_iso) = static_shape(&StaticShape::Sphere {
            radius: 1.0,
            transform: Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
        });
        let at = iso_from(Vec3::zeros(), na::UnitQuaternion::identity());
        assert!(!intersects_static(&at, &agent, &ball, &ball_iso));
        let near = iso_from(Vec3::new(4.0, 0.0, 0.0), na::UnitQuaternion::identity());
        assert!(intersects_static(&near, &agent, &ball, &ball_iso));
    }
}
