use crate::collision::{Quat, Vec3};
use crate::primitives::{
    ComputeVelocityParams, FloorResult, MoveInputType, compute_velocity, find_floor, is_walkable,
    planar_part, safe_normal, try_move_to_slide_along_surface, try_safe_move,
};
use crate::sim::{
    BaseProvider, CommonMovementSettings, LAST_FLOOR_RESULT, MovementBase, ProposedMove, SettingsKind,
    SyncState,
};
use crate::tags::{MovementTag, MovementTags};

use super::{
    FALLING, MoveGenContext, MovementEndState, MovementMode, SimulationTickParams, integrate_rotation,
    turn_toward,
};

const WALK: &str = "Walk";
const FLOOR_SNAP: &str = "FloorSnap";

/// Gap to the floor below which no snap is attempted.
const FLOOR_SNAP_TOLERANCE: f32 = 0.1;

/// Floor-following movement on walkable surfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct WalkingMode;

impl MovementMode for WalkingMode {
    fn generate_move(&self, ctx: &MoveGenContext<'_>) -> ProposedMove {
        let up = ctx.up;
        let s = ctx.settings;
        let dt = ctx.time_step.delta_seconds();
        let intent = planar_part(ctx.input.move_direction_intent(), up);

        let velocity = compute_velocity(&ComputeVelocityParams {
            delta_seconds: dt,
            initial_velocity: planar_part(ctx.start_state.velocity, up),
            move_direction_intent: intent,
            move_input_type: ctx.input.move_input_type,
            move_input: planar_part(ctx.input.move_input, up),
            max_speed: s.max_speed,
            turning_boost: s.turning_boost,
            friction: s.ground_friction,
            deceleration: s.deceleration,
            acceleration: s.acceleration,
            use_acceleration_for_velocity_move: s.use_acceleration_for_velocity_move,
        });

        let face = ctx.input.orientation_intent.or_else(|| {
            (ctx.input.move_input_type == MoveInputType::DirectionalIntent
                && intent.norm_squared() > f32::EPSILON)
                .then_some(intent)
        });
        ProposedMove {
            linear_velocity: velocity,
            angular_velocity: turn_toward(ctx.start_state.orientation, face, up, s.rotation_rate_deg, dt),
            direction_intent: safe_normal(intent),
            ..Default::default()
        }
    }

    fn simulation_tick(&self, params: &mut SimulationTickParams<'_, '_>, out: &mut SyncState) -> MovementEndState {
        let dt = params.time_step.delta_seconds();
        let settings = params.settings;
        let start = params.start_state;
        let up = params.mover.up;
        let rotation = integrate_rotation(start.orientation, params.proposed_move.angular_velocity, dt);
        out.move_direction_intent = params.proposed_move.direction_intent;
        out.orientation = rotation;

        if params.input.is_jump_just_pressed && settings.jump_upwards_speed > 0.0 {
            out.velocity = planar_part(params.proposed_move.linear_velocity, up) + up * settings.jump_upwards_speed;
            out.location = params.mover.location();
            out.movement_base = None;
            log::trace!("jump: handing {} ms to {FALLING}", params.time_step.step_ms);
            return MovementEndState::switch_to(FALLING, params.time_step.step_ms);
        }

        let mover = &mut *params.mover;
        let relevant_before = mover.record().relevant_move_delta();

        // Follow the floor we start on.
        let floor = find_floor(mover, settings.floor_sweep_distance, settings.max_walk_slope_cos);
        let mut delta = params.proposed_move.linear_velocity * dt;
        if floor.is_walkable() {
            delta = project_onto_ramp(delta, floor.hit.normal, up);
        }

        let (_, mut hit) = try_safe_move(mover, delta, rotation, true, WALK);
        if hit.is_valid_blocking_hit() {
            mover.handle_impact(&hit, delta);
            let normal = if is_walkable(hit.normal, up, settings.max_walk_slope_cos) {
                hit.normal
            } else {
                // Walls are treated as vertical so sliding never climbs them.
                let flat = safe_normal(planar_part(hit.normal, up));
                if flat == Vec3::zeros() { hit.normal } else { flat }
            };
            let remaining = 1.0 - hit.time;
            try_move_to_slide_along_surface(mover, delta, remaining, rotation, normal, &mut hit, true);
        }

        // Stick to the floor.
        let floor = find_floor(mover, settings.floor_sweep_distance, settings.max_walk_slope_cos);
        if floor.is_walkable() && floor.floor_dist > FLOOR_SNAP_TOLERANCE {
            mover.record().lock_relevancy(false);
            try_safe_move(mover, -up * floor.floor_dist, rotation, true, FLOOR_SNAP);
            mover.record().unlock_relevancy();
        }
        params.blackboard.set(LAST_FLOOR_RESULT, floor);

        let location = mover.location();
        let moved = mover.record().relevant_move_delta() - relevant_before;
        out.location = location;
        out.velocity = if dt > 0.0 { moved / dt } else { Vec3::zeros() };
        out.movement_base = capture_base(&floor, params.bases, location, rotation);

        if floor.is_walkable() {
            MovementEndState::done()
        } else {
            out.movement_base = None;
            MovementEndState::switch_to(FALLING, 0.0)
        }
    }

    fn tags(&self) -> MovementTags {
        MovementTags::from_flags(&[MovementTag::Grounded])
    }

    fn required_shared_settings(&self) -> &'static [&'static str] {
        &[CommonMovementSettings::KIND]
    }
}

/// Keep the planar part of `delta` and follow the ramp with `normal` vertically.
fn project_onto_ramp(delta: Vec3, normal: Vec3, up: Vec3) -> Vec3 {
    let n_up = normal.dot(&up);
    if n_up <= f32::EPSILON {
        return delta;
    }
    let planar = planar_part(delta, up);
    planar - up * (planar.dot(&normal) / n_up)
}

fn capture_base(
    floor: &FloorResult,
    bases: &dyn BaseProvider,
    location: Vec3,
    rotation: Quat,
) -> Option<MovementBase> {
    let id = floor.object()?;
    let base_transform = bases.base_transform(id, None)?;
    Some(MovementBase::capture(id, None, &base_transform, location, rotation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_projection_keeps_planar_motion() {
        let normal = Vec3::new(-1.0, 0.0, 1.0).normalize();
        let d = project_onto_ramp(Vec3::new(10.0, 0.0, 0.0), normal, Vec3::z());
        assert!((d.x - 10.0).abs() < 1.0e-5);
        // Walking uphill on a 45 degree ramp.
        assert!((d.z - 10.0).abs() < 1.0e-4);
        assert!(d.dot(&normal).abs() < 1.0e-4);
    }
}
