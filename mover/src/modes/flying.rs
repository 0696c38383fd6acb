use crate::collision::Vec3;
use crate::primitives::{ComputeVelocityParams, compute_velocity, safe_normal, try_move_and_slide};
use crate::sim::{CommonMovementSettings, ProposedMove, SettingsKind, SyncState};
use crate::tags::{MovementTag, MovementTags};

use super::{MoveGenContext, MovementEndState, MovementMode, SimulationTickParams, integrate_rotation, turn_toward};

/// Free 3D movement without gravity.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlyingMode;

impl MovementMode for FlyingMode {
    fn generate_move(&self, ctx: &MoveGenContext<'_>) -> ProposedMove {
        let s = ctx.settings;
        let dt = ctx.time_step.delta_seconds();
        let intent = ctx.input.move_direction_intent();

        let velocity = compute_velocity(&ComputeVelocityParams {
            delta_seconds: dt,
            initial_velocity: ctx.start_state.velocity,
            move_direction_intent: intent,
            move_input_type: ctx.input.move_input_type,
            move_input: ctx.input.move_input,
            max_speed: s.max_speed,
            turning_boost: s.turning_boost,
            friction: s.ground_friction,
            deceleration: s.deceleration,
            acceleration: s.acceleration,
            use_acceleration_for_velocity_move: s.use_acceleration_for_velocity_move,
        });

        ProposedMove {
            linear_velocity: velocity,
            angular_velocity: turn_toward(
                ctx.start_state.orientation,
                ctx.input.orientation_intent,
                ctx.up,
                s.rotation_rate_deg,
                dt,
            ),
            direction_intent: safe_normal(intent),
            ..Default::default()
        }
    }

    fn simulation_tick(&self, params: &mut SimulationTickParams<'_, '_>, out: &mut SyncState) -> MovementEndState {
        let dt = params.time_step.delta_seconds();
        let rotation = integrate_rotation(params.start_state.orientation, params.proposed_move.angular_velocity, dt);
        let mover = &mut *params.mover;
        let relevant_before = mover.record().relevant_move_delta();

        try_move_and_slide(mover, params.proposed_move.linear_velocity * dt, rotation);

        let moved = mover.record().relevant_move_delta() - relevant_before;
        out.location = mover.location();
        out.orientation = rotation;
        out.velocity = if dt > 0.0 { moved / dt } else { Vec3::zeros() };
        out.move_direction_intent = params.proposed_move.direction_intent;
        out.movement_base = None;
        MovementEndState::done()
    }

    fn tags(&self) -> MovementTags {
        MovementTags::from_flags(&[MovementTag::Flying])
    }

    fn required_shared_settings(&self) -> &'static [&'static str] {
        &[CommonMovementSettings::KIND]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionShape, StaticWorld, Transform};
    use crate::constants::default_gravity;
    use crate::primitives::{AgentBody, MovementRecord, MovingBody};
    use crate::sim::{InputCmd, NoBases, SharedSettings, SimBlackboard, TimeStep};
    use crate::tags::CollisionChannel;

    #[test]
    fn flies_straight_up_in_open_space() {
        let world = StaticWorld::new(Vec::new());
        let shared = SharedSettings::with_common_defaults();
        let settings = shared.common();
        let mut bb = SimBlackboard::new();
        let ts = TimeStep::new(0, 0.0, 100.0);
        let input = InputCmd::velocity(Vec3::new(0.0, 0.0, 300.0));
        let start = SyncState::default();

        let proposed = {
            let ctx = MoveGenContext {
                time_step: &ts,
                start_state: &start,
                input: &input,
                settings: &settings,
                shared: &shared,
                blackboard: &bb,
                gravity: default_gravity(),
                up: Vec3::z(),
            };
            FlyingMode.generate_move(&ctx)
        };
        assert!(proposed.linear_velocity.z > 0.0);

        let mut body = AgentBody::new(Transform::identity());
        let mut record = MovementRecord::new();
        let mut events = Vec::new();
        let mut mover = MovingBody::new(
            &world,
            &mut body,
            &mut record,
            &mut events,
            CollisionShape::capsule(30.0, 60.0),
            CollisionChannel::Pawn,
            Vec3::z(),
        );
        let mut params = SimulationTickParams {
            time_step: ts,
            start_state: &start,
            input: &input,
            proposed_move: proposed.clone(),
            settings: &settings,
            shared: &shared,
            blackboard: &mut bb,
            mover: &mut mover,
            gravity: default_gravity(),
            bases: &NoBases,
        };
        let mut out = start.clone();
        let end = FlyingMode.simulation_tick(&mut params, &mut out);

        assert_eq!(end, MovementEndState::done());
        let expected = proposed.linear_velocity * 0.1;
        assert!((out.location - expected).norm() < 1.0e-3);
        assert!((out.velocity - proposed.linear_velocity).norm() < 1.0e-2);
    }
}
