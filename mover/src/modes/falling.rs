use crate::primitives::{
    ComputeCombinedVelocityParams, ComputeVelocityParams, compute_combined_velocity, is_walkable,
    planar_part, safe_normal, try_move_to_slide_along_surface, try_safe_move, vertical_part,
};
use crate::sim::{CommonMovementSettings, ProposedMove, SettingsKind, SyncState};
use crate::tags::{MovementTag, MovementTags};

use super::{
    MoveGenContext, MovementEndState, MovementMode, SimulationTickParams, WALKING, integrate_rotation,
    turn_toward,
};

const FALL: &str = "Fall";

/// Ballistic movement under gravity with limited air control. Lands on walkable surfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct FallingMode;

impl MovementMode for FallingMode {
    fn generate_move(&self, ctx: &MoveGenContext<'_>) -> ProposedMove {
        let up = ctx.up;
        let s = ctx.settings;
        let dt = ctx.time_step.delta_seconds();
        let intent = planar_part(ctx.input.move_direction_intent(), up);

        // Air control acts on the planar velocity; any planar share of gravity is external.
        let planar = compute_combined_velocity(&ComputeCombinedVelocityParams {
            base: ComputeVelocityParams {
                delta_seconds: dt,
                initial_velocity: planar_part(ctx.start_state.velocity, up),
                move_direction_intent: intent,
                move_input_type: ctx.input.move_input_type,
                move_input: planar_part(ctx.input.move_input, up),
                max_speed: s.max_speed,
                turning_boost: s.turning_boost,
                friction: s.falling_lateral_friction,
                deceleration: 0.0,
                acceleration: s.acceleration * s.air_control.clamp(0.0, 1.0),
                use_acceleration_for_velocity_move: true,
            },
            external_acceleration: planar_part(ctx.gravity, up),
            overall_max_speed: s.terminal_velocity,
        });

        let mut vertical = vertical_part(ctx.start_state.velocity, up) + vertical_part(ctx.gravity, up) * dt;
        let down_speed = -vertical.dot(&up);
        if down_speed > s.terminal_velocity {
            vertical = -up * s.terminal_velocity;
        }

        ProposedMove {
            linear_velocity: planar + vertical,
            angular_velocity: turn_toward(
                ctx.start_state.orientation,
                ctx.input.orientation_intent,
                up,
                s.rotation_rate_deg,
                dt,
            ),
            direction_intent: safe_normal(intent),
            ..Default::default()
        }
    }

    fn simulation_tick(&self, params: &mut SimulationTickParams<'_, '_>, out: &mut SyncState) -> MovementEndState {
        let dt = params.time_step.delta_seconds();
        let step_ms = params.time_step.step_ms;
        let walkable_cos = params.settings.max_walk_slope_cos;
        let mover = &mut *params.mover;
        let up = mover.up;
        let rotation = integrate_rotation(params.start_state.orientation, params.proposed_move.angular_velocity, dt);
        let mut velocity = params.proposed_move.linear_velocity;
        let delta = velocity * dt;

        out.orientation = rotation;
        out.move_direction_intent = params.proposed_move.direction_intent;
        out.movement_base = None;

        let (_, mut hit) = try_safe_move(mover, delta, rotation, true, FALL);
        let mut end = MovementEndState::done();

        if hit.is_valid_blocking_hit() {
            let landed = is_walkable(hit.normal, up, walkable_cos) && delta.dot(&up) <= 0.0;
            if landed {
                velocity = planar_part(velocity, up);
                end = MovementEndState::switch_to(WALKING, (1.0 - hit.time) * step_ms);
            } else {
                mover.handle_impact(&hit, delta);
                let normal = hit.normal;
                try_move_to_slide_along_surface(mover, delta, 1.0 - hit.time, rotation, normal, &mut hit, true);
                // Lose the velocity that went into the surface.
                velocity -= normal * velocity.dot(&normal).min(0.0);
                if hit.is_valid_blocking_hit() && is_walkable(hit.normal, up, walkable_cos) {
                    velocity = planar_part(velocity, up);
                    end = MovementEndState::switch_to(WALKING, 0.0);
                }
            }
        }

        out.location = mover.location();
        out.velocity = velocity;
        end
    }

    fn tags(&self) -> MovementTags {
        MovementTags::from_flags(&[MovementTag::Airborne])
    }

    fn required_shared_settings(&self) -> &'static [&'static str] {
        &[CommonMovementSettings::KIND]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::Vec3;
    use crate::constants::default_gravity;
    use crate::sim::{InputCmd, SharedSettings, SimBlackboard, TimeStep};

    #[test]
    fn gravity_accelerates_down_and_respects_terminal_velocity() {
        let shared = SharedSettings::with_common_defaults();
        let mut settings = shared.common();
        settings.terminal_velocity = 100.0;
        let input = InputCmd::default();
        let bb = SimBlackboard::new();
        let ts = TimeStep::new(0, 0.0, 100.0);

        let state = SyncState::default();
        let ctx = MoveGenContext {
            time_step: &ts,
            start_state: &state,
            input: &input,
            settings: &settings,
            shared: &shared,
            blackboard: &bb,
            gravity: default_gravity(),
            up: Vec3::z(),
        };
        let first = FallingMode.generate_move(&ctx);
        assert!((first.linear_velocity.z + 98.0).abs() < 1.0e-3);

        let mut next = state.clone();
        next.velocity = first.linear_velocity;
        let ctx = MoveGenContext {
            start_state: &next,
            ..ctx
        };
        let second = FallingMode.generate_move(&ctx);
        assert!((second.linear_velocity.z + 100.0).abs() < 1.0e-3);
    }
}
