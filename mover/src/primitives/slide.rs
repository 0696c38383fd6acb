//! Sliding along blocking surfaces.

use crate::collision::{HitResult, Quat, Vec3};
use crate::constants::{KINDA_SMALL_NUMBER, SAME_WALL_NUDGE, SMALL_MOVE_DISTANCE};

use super::body::MovingBody;
use super::penetration::try_safe_move;
use super::planar::{PlanarConstraint, constrain_normal_to_plane, constrain_to_plane, safe_normal};

/// Substep name for the slide moves.
pub const SLIDE_ALONG_SURFACE: &str = "SlideAlongSurface";
/// Substep name for the initial move of [`try_move_and_slide`].
pub const MOVE_AND_SLIDE: &str = "MoveAndSlide";

/// `delta` projected onto the surface with `normal`, scaled by `percent`.
///
/// The normal is constrained to the planar constraint (if any) before projecting, so the
/// result never leaves the plane.
pub fn compute_slide_delta(
    delta: Vec3,
    normal: Vec3,
    percent: f32,
    plane: Option<&PlanarConstraint>,
) -> Vec3 {
    let n = constrain_normal_to_plane(plane, normal);
    let projected = delta - n * delta.dot(&n);
    constrain_to_plane(plane, projected * percent)
}

/// Adjust a slide delta that ran into a second wall.
///
/// For corners of 90 degrees or less the move follows the crease between the two walls,
/// never pointing back against `delta`. Otherwise it slides along the new wall; a slide that
/// would oppose `delta` becomes zero, and hitting the same wall again nudges off it.
pub fn compute_two_wall_adjusted_delta(
    delta: Vec3,
    hit: &HitResult,
    old_normal: Vec3,
    plane: Option<&PlanarConstraint>,
) -> Vec3 {
    let normal = hit.normal;
    let remaining = 1.0 - hit.time;
    let dot = old_normal.dot(&normal);

    let adjusted = if dot <= 0.0 {
        let crease = safe_normal(normal.cross(&old_normal));
        let along = crease * (delta.dot(&crease) * remaining);
        if delta.dot(&along) < 0.0 { -along } else { along }
    } else {
        let slide = compute_slide_delta(delta, normal, remaining, plane);
        if slide.dot(&delta) <= 0.0 {
            Vec3::zeros()
        } else if (dot - 1.0).abs() < KINDA_SMALL_NUMBER {
            slide + normal * SAME_WALL_NUDGE
        } else {
            slide
        }
    };
    constrain_to_plane(plane, adjusted)
}

#[inline]
fn is_nearly_zero(v: Vec3, tolerance: f32) -> bool {
    v.x.abs() <= tolerance && v.y.abs() <= tolerance && v.z.abs() <= tolerance
}

/// Slide the agent along the surface of `hit` for `percent` of `delta`.
///
/// Makes at most two moves: the slide itself, and, if that slide is blocked by a second
/// surface, a two-wall adjusted move. Returns the fraction (0..1) of the slide actually
/// applied. `hit` is updated with the last blocking result.
pub fn try_move_to_slide_along_surface(
    body: &mut MovingBody<'_>,
    delta: Vec3,
    percent: f32,
    rotation: Quat,
    normal: Vec3,
    hit: &mut HitResult,
    handle_impact: bool,
) -> f32 {
    if !hit.blocking {
        return 0.0;
    }
    let old_normal = normal;
    let mut slide = compute_slide_delta(delta, normal, percent, body.planar());
    if slide.dot(&delta) <= 0.0 {
        return 0.0;
    }

    let (_, first) = try_safe_move(body, slide, rotation, true, SLIDE_ALONG_SURFACE);
    *hit = first;
    let first_percent = first.time;
    let mut applied = first_percent;

    if first.is_valid_blocking_hit() {
        if handle_impact {
            body.handle_impact(&first, slide);
        }
        slide = compute_two_wall_adjusted_delta(slide, &first, old_normal, body.planar());

        if !is_nearly_zero(slide, SMALL_MOVE_DISTANCE) && slide.dot(&delta) > 0.0 {
            let (_, second) = try_safe_move(body, slide, rotation, true, SLIDE_ALONG_SURFACE);
            applied += second.time * (1.0 - first_percent);
            if handle_impact && second.blocking {
                body.handle_impact(&second, slide);
            }
            *hit = second;
        }
    }
    applied.clamp(0.0, 1.0)
}

/// Move by `delta`; on a blocking hit report the impact and slide for the rest.
///
/// Returns the fraction of `delta` covered, counting the slide as covering its share of the
/// remainder.
pub fn try_move_and_slide(body: &mut MovingBody<'_>, delta: Vec3, rotation: Quat) -> f32 {
    let delta = constrain_to_plane(body.planar(), delta);
    let (_, mut hit) = try_safe_move(body, delta, rotation, true, MOVE_AND_SLIDE);
    if !hit.is_valid_blocking_hit() {
        return hit.time.clamp(0.0, 1.0);
    }
    let first = hit.time;
    body.handle_impact(&hit, delta);
    let normal = hit.normal;
    let slid =
        try_move_to_slide_along_surface(body, delta, 1.0 - first, rotation, normal, &mut hit, true);
    (first + (1.0 - first) * slid).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionShape, StaticEntry, StaticShape, StaticWorld, Transform};
    use crate::primitives::body::AgentBody;
    use crate::primitives::move_record::MovementRecord;
    use crate::sim::events::MoverEvent;
    use crate::tags::CollisionChannel;
    use proptest::prelude::*;

    fn wall_hit(normal: Vec3, time: f32) -> HitResult {
        HitResult {
            blocking: true,
            normal,
            time,
            ..HitResult::no_hit(Vec3::zeros(), Vec3::zeros())
        }
    }

    fn wall_world() -> StaticWorld {
        // Wall face at x = 100.
        StaticWorld::new(vec![StaticEntry::solid(
            2,
            StaticShape::Cuboid {
                half_extents: Vec3::new(10.0, 500.0, 500.0),
                transform: Transform::from_translation(Vec3::new(110.0, 0.0, 0.0)),
            },
        )])
    }

    #[test]
    fn head_on_slide_does_nothing() {
        let world = wall_world();
        let mut agent = AgentBody::new(Transform::from_translation(Vec3::new(89.0, 0.0, 0.0)));
        let mut record = MovementRecord::new();
        let mut events = Vec::new();
        let mut body = MovingBody::new(
            &world,
            &mut agent,
            &mut record,
            &mut events,
            CollisionShape::Sphere { radius: 10.0 },
            CollisionChannel::Pawn,
            Vec3::z(),
        );
        let mut hit = wall_hit(-Vec3::x(), 0.0);
        let start = body.location();
        let pct = try_move_to_slide_along_surface(
            &mut body,
            Vec3::new(100.0, 0.0, 0.0),
            1.0,
            Quat::identity(),
            -Vec3::x(),
            &mut hit,
            true,
        );
        assert_eq!(pct, 0.0);
        assert_eq!(body.location(), start);
        assert!(events.is_empty());
    }

    #[test]
    fn non_blocking_hit_is_ignored() {
        let world = wall_world();
        let mut agent = AgentBody::new(Transform::identity());
        let mut record = MovementRecord::new();
        let mut events = Vec::new();
        let mut body = MovingBody::new(
            &world,
            &mut agent,
            &mut record,
            &mut events,
            CollisionShape::Sphere { radius: 10.0 },
            CollisionChannel::Pawn,
            Vec3::z(),
        );
        let mut hit = HitResult::no_hit(Vec3::zeros(), Vec3::x());
        let pct = try_move_to_slide_along_surface(
            &mut body,
            Vec3::new(10.0, 10.0, 0.0),
            1.0,
            Quat::identity(),
            -Vec3::x(),
            &mut hit,
            true,
        );
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn diagonal_move_slides_along_wall() {
        let world = wall_world();
        let mut agent = AgentBody::new(Transform::from_translation(Vec3::new(50.0, 0.0, 0.0)));
        let mut record = MovementRecord::new();
        let mut events = Vec::new();
        let mut body = MovingBody::new(
            &world,
            &mut agent,
            &mut record,
            &mut events,
            CollisionShape::Sphere { radius: 10.0 },
            CollisionChannel::Pawn,
            Vec3::z(),
        );
        let pct = try_move_and_slide(&mut body, Vec3::new(80.0, 80.0, 0.0), Quat::identity());
        let loc = body.location();
        assert!(loc.x < 90.0, "went into the wall: {loc:?}");
        assert!(loc.y > 70.0, "did not slide: {loc:?}");
        assert!(pct > 0.0 && pct <= 1.0);
        assert!(matches!(events.first(), Some(MoverEvent::Impact(_))));
    }

    #[test]
    fn same_wall_twice_nudges_off() {
        let hit = wall_hit(-Vec3::x(), 0.5);
        let adjusted =
            compute_two_wall_adjusted_delta(Vec3::new(0.0, 10.0, 0.0), &hit, -Vec3::x(), None);
        assert!((adjusted.y - 5.0).abs() < 1.0e-5);
        assert!((adjusted.x + SAME_WALL_NUDGE).abs() < 1.0e-6);
    }

    #[test]
    fn blocked_move_stops_at_the_wall_without_sinking_into_the_floor() {
        let world = StaticWorld::new(vec![
            StaticEntry::solid(
                1,
                StaticShape::Plane {
                    normal: Vec3::z(),
                    dist: 0.0,
                },
            ),
            StaticEntry::solid(
                2,
                StaticShape::Cuboid {
                    half_extents: Vec3::new(10.0, 500.0, 500.0),
                    transform: Transform::from_translation(Vec3::new(110.0, 0.0, 0.0)),
                },
            ),
        ]);
        let start = Vec3::new(50.0, 0.0, 10.5);
        let mut agent = AgentBody::new(Transform::from_translation(start));
        let mut record = MovementRecord::new();
        let mut events = Vec::new();
        let mut body = MovingBody::new(
            &world,
            &mut agent,
            &mut record,
            &mut events,
            CollisionShape::Sphere { radius: 10.0 },
            CollisionChannel::Pawn,
            Vec3::z(),
        );

        let pct = try_move_and_slide(&mut body, Vec3::new(100.0, 0.0, 0.0), Quat::identity());
        assert!((0.0..=1.0).contains(&pct), "percent out of range: {pct}");
        let first = body.location();
        assert!(first.x <= 90.0 + 1.0e-3, "went into the wall: {first:?}");
        assert!(first.x > 85.0, "stopped short: {first:?}");
        assert!(first.y.abs() < 1.0e-3);
        assert!((first.z - start.z).abs() < 1.0e-3, "floor pushed the agent: {first:?}");

        // Pressing on into the wall gains nothing along its normal.
        let pct = try_move_and_slide(&mut body, Vec3::new(100.0, 0.0, 0.0), Quat::identity());
        assert!((0.0..=1.0).contains(&pct));
        let second = body.location();
        assert!((second.x - first.x).abs() < 0.1, "moved along the normal: {first:?} -> {second:?}");
        assert!((second.z - start.z).abs() < 1.0e-3);
        drop(body);
        assert!(events.iter().any(|e| matches!(e, MoverEvent::Impact(_))));
    }

    proptest! {
        #[test]
        fn slide_is_orthogonal_to_unconstrained_normal(
            dx in -100.0f32..100.0, dy in -100.0f32..100.0, dz in -100.0f32..100.0,
            nx in -1.0f32..1.0, ny in -1.0f32..1.0, nz in -1.0f32..1.0,
            pct in 0.0f32..1.0,
        ) {
            let n = Vec3::new(nx, ny, nz);
            prop_assume!(n.norm() > 0.1);
            let out = compute_slide_delta(Vec3::new(dx, dy, dz), n, pct, None);
            prop_assert!(out.dot(&n.normalize()).abs() < 1.0e-2);
        }

        #[test]
        fn corner_result_follows_the_crease(
            dx in -100.0f32..100.0, dy in -100.0f32..100.0, dz in -100.0f32..100.0,
            ax in -1.0f32..1.0, ay in -1.0f32..1.0, az in -1.0f32..1.0,
            bx in -1.0f32..1.0, by in -1.0f32..1.0, bz in -1.0f32..1.0,
            time in 0.0f32..1.0,
        ) {
            let a = Vec3::new(ax, ay, az);
            let b = Vec3::new(bx, by, bz);
            prop_assume!(a.norm() > 0.1 && b.norm() > 0.1);
            let old = a.normalize();
            let hit = wall_hit(b.normalize(), time);
            prop_assume!(old.dot(&hit.normal) <= 0.0);
            let crease = hit.normal.cross(&old);
            prop_assume!(crease.norm() > 0.1);

            let delta = Vec3::new(dx, dy, dz);
            let out = compute_two_wall_adjusted_delta(delta, &hit, old, None);
            prop_assert!(out.cross(&crease.normalize()).norm() <= 1.0e-3 * (1.0 + out.norm()));
            prop_assert!(out.dot(&delta) >= -1.0e-3);
        }
    }
}
