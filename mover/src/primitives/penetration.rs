//! Getting unstuck: depenetration and the "move, and if stuck, resolve then retry" helper.

use crate::collision::{HitResult, Quat, Vec3};
use crate::constants::{PENETRATION_OVERLAP_CHECK_INFLATION, PENETRATION_PULLBACK_DISTANCE};

use super::body::MovingBody;
use super::planar::{PlanarConstraint, constrain_to_plane};

/// Substep name used for every depenetration move.
pub const RESOLVE_PENETRATION: &str = "ResolvePenetration";

/// Push-out vector for a hit that started in penetration, zero otherwise.
///
/// The result is the hit normal scaled by `depth + PENETRATION_PULLBACK_DISTANCE`; a hit with
/// no reported depth is treated as penetrating by the pullback distance.
pub fn compute_penetration_adjustment(hit: &HitResult, plane: Option<&PlanarConstraint>) -> Vec3 {
    if !hit.start_penetrating {
        return Vec3::zeros();
    }
    let depth = if hit.penetration_depth > 0.0 {
        hit.penetration_depth
    } else {
        PENETRATION_PULLBACK_DISTANCE
    };
    constrain_to_plane(plane, hit.normal * (depth + PENETRATION_PULLBACK_DISTANCE))
}

/// Try to move the agent out of penetration using `adjustment`.
///
/// 1. Teleport to `trace_start + adjustment` if the slightly inflated shape fits there.
/// 2. Otherwise sweep along the adjustment.
/// 3. Still stuck: sweep along the adjustment combined with a second push-out.
/// 4. Still stuck: sweep along the adjustment plus the originally attempted move.
///
/// Returns whether the agent moved. Every successful move is recorded as an irrelevant
/// `ResolvePenetration` substep.
pub fn try_move_to_resolve_penetration(
    body: &mut MovingBody<'_>,
    adjustment: Vec3,
    hit: &HitResult,
    rotation: Quat,
) -> bool {
    let adjustment = constrain_to_plane(body.planar(), adjustment);
    if adjustment == Vec3::zeros() {
        return false;
    }
    let before = body.location();

    let target = hit.trace_start + adjustment;
    if !body.overlap_test_at(target, rotation, PENETRATION_OVERLAP_CHECK_INFLATION) {
        body.teleport(target, rotation);
        log::trace!("resolved penetration by teleporting {adjustment:?}");
        record_resolve(body, before);
        return true;
    }

    let (mut moved, sweep_hit) = body.move_component(adjustment, rotation, true);

    if !moved && sweep_hit.start_penetrating {
        // Two surfaces: combine both push-outs.
        let second = compute_penetration_adjustment(&sweep_hit, body.planar());
        let combined = adjustment + second;
        if second != adjustment && combined != Vec3::zeros() {
            moved = body.move_component(combined, rotation, true).0;
        }
    }

    if !moved {
        let attempted = constrain_to_plane(body.planar(), hit.trace_end - hit.trace_start);
        if attempted != Vec3::zeros() {
            moved = body.move_component(adjustment + attempted, rotation, true).0;
        }
    }

    if moved {
        record_resolve(body, before);
    }
    moved
}

fn record_resolve(body: &mut MovingBody<'_>, before: Vec3) {
    let delta = body.location() - before;
    body.record().record(RESOLVE_PENETRATION, delta, false);
}

/// Move by `delta`; if the move starts in penetration, resolve it and retry once.
///
/// The displacement actually achieved by the (final) move is recorded as a relevant substep
/// named `substep_name`.
pub fn try_safe_move(
    body: &mut MovingBody<'_>,
    delta: Vec3,
    rotation: Quat,
    sweep: bool,
    substep_name: &'static str,
) -> (bool, HitResult) {
    let (mut moved, mut hit) = {
        let before = body.location();
        let result = body.move_component(delta, rotation, sweep);
        let after = body.location();
        record_move(body, substep_name, after - before);
        result
    };

    if hit.start_penetrating {
        let adjustment = compute_penetration_adjustment(&hit, body.planar());
        if try_move_to_resolve_penetration(body, adjustment, &hit, rotation) {
            let before = body.location();
            let retry = body.move_component(delta, rotation, sweep);
            let after = body.location();
            record_move(body, substep_name, after - before);
            moved = retry.0;
            hit = retry.1;
        }
    }
    (moved, hit)
}

fn record_move(body: &mut MovingBody<'_>, name: &'static str, delta: Vec3) {
    if delta != Vec3::zeros() {
        body.record().record(name, delta, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionShape, StaticEntry, StaticShape, StaticWorld, Transform};
    use crate::primitives::body::AgentBody;
    use crate::primitives::move_record::MovementRecord;
    use crate::tags::CollisionChannel;
    use proptest::prelude::*;

    fn floor() -> StaticWorld {
        StaticWorld::new(vec![StaticEntry::solid(
            1,
            StaticShape::Plane {
                normal: Vec3::z(),
                dist: 0.0,
            },
        )])
    }

    fn penetrating_hit(depth: f32) -> HitResult {
        HitResult {
            blocking: true,
            start_penetrating: true,
            penetration_depth: depth,
            normal: Vec3::z(),
            ..HitResult::no_hit(Vec3::zeros(), Vec3::zeros())
        }
    }

    #[test]
    fn adjustment_is_zero_without_start_penetration() {
        let hit = HitResult::no_hit(Vec3::zeros(), Vec3::x());
        assert_eq!(compute_penetration_adjustment(&hit, None), Vec3::zeros());
    }

    #[test]
    fn missing_depth_uses_pullback_twice() {
        let adj = compute_penetration_adjustment(&penetrating_hit(0.0), None);
        assert!((adj.z - 2.0 * PENETRATION_PULLBACK_DISTANCE).abs() < 1.0e-6);
    }

    #[test]
    fn safe_move_climbs_out_of_the_floor_and_retries() {
        let world = floor();
        let mut agent = AgentBody::new(Transform::from_translation(Vec3::new(0.0, 0.0, 6.0)));
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

        let (moved, hit) = try_safe_move(
            &mut body,
            Vec3::new(20.0, 0.0, 0.0),
            Quat::identity(),
            true,
            "Move",
        );
        assert!(moved);
        assert!(!hit.start_penetrating);
        let loc = body.location();
        assert!(loc.z >= 10.0, "still sunk: {loc:?}");
        assert!((loc.x - 20.0).abs() < 1.0e-3);

        let names: Vec<_> = record.substeps().iter().map(|s| s.name).collect();
        assert_eq!(names, vec![RESOLVE_PENETRATION, "Move"]);
        // Depenetration never counts as intended movement.
        assert!(record.relevant_move_delta().z.abs() < 1.0e-6);
    }

    proptest! {
        #[test]
        fn adjustment_is_depth_plus_pullback_along_the_normal(
            depth in 0.001f32..50.0,
            nx in -1.0f32..1.0, ny in -1.0f32..1.0, nz in -1.0f32..1.0,
        ) {
            let n = Vec3::new(nx, ny, nz);
            prop_assume!(n.norm() > 0.1);
            let hit = HitResult { normal: n.normalize(), ..penetrating_hit(depth) };
            let adj = compute_penetration_adjustment(&hit, None);
            prop_assert!((adj.norm() - (depth + PENETRATION_PULLBACK_DISTANCE)).abs() < 1.0e-4);
            prop_assert!(adj.dot(&hit.normal) > 0.0);
        }
    }
}
