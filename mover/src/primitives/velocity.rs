//! Velocity shaping: acceleration, braking, turning and speed clamps.

use crate::collision::Vec3;
use crate::constants::{
    BRAKE_TO_STOP_VELOCITY, BRAKING_SUBSTEP_MAX, BRAKING_SUBSTEP_MIN, BRAKING_SUBSTEP_TIME,
    KINDA_SMALL_NUMBER, MAX_SPEED_TOLERANCE, MIN_TICK_TIME,
};

use super::planar::{clamp_to_max_size, safe_normal};

/// How the move input of a tick is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MoveInputType {
    /// No movement requested.
    #[default]
    None,
    /// A direction with magnitude 0..1 (analog strength).
    DirectionalIntent,
    /// A desired velocity in world units per second.
    Velocity,
}

/// Inputs to [`compute_velocity`].
#[derive(Clone, Copy, Debug)]
pub struct ComputeVelocityParams {
    pub delta_seconds: f32,
    pub initial_velocity: Vec3,
    /// Directional intent (length 0..1). Ignored for velocity input.
    pub move_direction_intent: Vec3,
    pub move_input_type: MoveInputType,
    /// Desired velocity, for [`MoveInputType::Velocity`].
    pub move_input: Vec3,
    pub max_speed: f32,
    pub turning_boost: f32,
    pub friction: f32,
    pub deceleration: f32,
    pub acceleration: f32,
    /// Blend toward a velocity input at `acceleration` instead of snapping to it.
    pub use_acceleration_for_velocity_move: bool,
}

impl Default for ComputeVelocityParams {
    fn default() -> Self {
        Self {
            delta_seconds: 0.0,
            initial_velocity: Vec3::zeros(),
            move_direction_intent: Vec3::zeros(),
            move_input_type: MoveInputType::DirectionalIntent,
            move_input: Vec3::zeros(),
            max_speed: 800.0,
            turning_boost: 8.0,
            friction: 0.0,
            deceleration: 0.0,
            acceleration: 4000.0,
            use_acceleration_for_velocity_move: true,
        }
    }
}

/// Inputs to [`compute_combined_velocity`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ComputeCombinedVelocityParams {
    /// Intent shaping, exactly as for [`compute_velocity`].
    pub base: ComputeVelocityParams,
    /// Acceleration added on top of the intent result (e.g. from a layered move).
    pub external_acceleration: Vec3,
    /// Clamp applied after the external contribution.
    pub overall_max_speed: f32,
}

/// True when `velocity` is over `max_speed`, allowing [`MAX_SPEED_TOLERANCE`] slack.
#[inline]
pub fn is_exceeding_max_speed(velocity: Vec3, max_speed: f32) -> bool {
    let max = max_speed.max(0.0) * MAX_SPEED_TOLERANCE;
    velocity.norm_squared() > max * max
}

/// Slow `velocity` by friction and a constant braking deceleration.
///
/// Integrated in sub-steps so results are stable at low frame rates. The velocity never
/// reverses direction: crossing zero stops it.
pub fn apply_velocity_braking(velocity: Vec3, delta_seconds: f32, friction: f32, deceleration: f32) -> Vec3 {
    if velocity == Vec3::zeros() || delta_seconds < MIN_TICK_TIME {
        return velocity;
    }
    let friction = friction.max(0.0);
    let deceleration = deceleration.max(0.0);
    let zero_friction = friction == 0.0;
    let zero_braking = deceleration == 0.0;
    if zero_friction && zero_braking {
        return velocity;
    }

    let old = velocity;
    let mut v = velocity;
    let max_step = BRAKING_SUBSTEP_TIME.clamp(BRAKING_SUBSTEP_MIN, BRAKING_SUBSTEP_MAX);
    let rev_accel = if zero_braking {
        Vec3::zeros()
    } else {
        -deceleration * safe_normal(v)
    };

    let mut remaining = delta_seconds;
    while remaining >= MIN_TICK_TIME {
        // Zero friction is time invariant, so one step is enough.
        let dt = if remaining > max_step && !zero_friction {
            max_step.min(remaining * 0.5)
        } else {
            remaining
        };
        remaining -= dt;

        v += (-friction * v + rev_accel) * dt;

        if v.dot(&old) <= 0.0 {
            return Vec3::zeros();
        }
    }

    let speed_sq = v.norm_squared();
    if speed_sq <= KINDA_SMALL_NUMBER
        || (!zero_braking && speed_sq <= BRAKE_TO_STOP_VELOCITY * BRAKE_TO_STOP_VELOCITY)
    {
        return Vec3::zeros();
    }
    v
}

/// New velocity from an initial velocity and this tick's input.
///
/// Directional intent: brake when there is no intent or when over the (analog scaled) max
/// speed, otherwise turn toward the intent, then accelerate along it. Braking that started
/// above max speed never drops the agent below max while it still moves with the intent.
///
/// Velocity input: snap to the requested velocity clamped to max speed, or approach it at
/// `acceleration` without overshooting.
///
/// Output speed never exceeds `max(max_speed, |initial_velocity|) * MAX_SPEED_TOLERANCE`.
pub fn compute_velocity(params: &ComputeVelocityParams) -> Vec3 {
    let dt = params.delta_seconds.max(0.0);
    let max_speed = params.max_speed.max(0.0);

    match params.move_input_type {
        MoveInputType::Velocity => {
            let target = clamp_to_max_size(params.move_input, max_speed);
            if !params.use_acceleration_for_velocity_move {
                return target;
            }
            let diff = target - params.initial_velocity;
            let step = params.acceleration.abs() * dt;
            let diff_len = diff.norm();
            if diff_len <= step || diff_len <= f32::EPSILON {
                target
            } else {
                params.initial_velocity + diff * (step / diff_len)
            }
        }
        MoveInputType::DirectionalIntent | MoveInputType::None => {
            let control = if params.move_input_type == MoveInputType::None {
                Vec3::zeros()
            } else {
                clamp_to_max_size(params.move_direction_intent, 1.0)
            };
            let analog = control.norm();
            let max_pawn_speed = max_speed * analog;
            let zero_accel = analog <= f32::EPSILON;

            let mut v = params.initial_velocity;
            let over_max = is_exceeding_max_speed(v, max_pawn_speed);

            if zero_accel || over_max {
                let old = v;
                v = apply_velocity_braking(v, dt, params.friction, params.deceleration);
                // Don't let braking lower us below max speed if we started above it.
                if over_max
                    && v.norm_squared() < max_pawn_speed * max_pawn_speed
                    && control.dot(&old) > 0.0
                {
                    v = safe_normal(old) * max_pawn_speed;
                }
            } else {
                // Friction affects our ability to change direction.
                let accel_dir = safe_normal(control);
                let speed = v.norm();
                let blend = (dt * params.friction * params.turning_boost.max(0.0)).min(1.0);
                v -= (v - accel_dir * speed) * blend;
            }

            if !zero_accel {
                let new_max_input_speed = if is_exceeding_max_speed(v, max_pawn_speed) {
                    v.norm()
                } else {
                    max_pawn_speed
                };
                v += control * params.acceleration.abs() * dt;
                v = clamp_to_max_size(v, new_max_input_speed);
            }
            v
        }
    }
}

/// Intent shaping followed by an external acceleration, each with its own clamp.
///
/// The external clamp is `max(overall_max_speed, |intent result|)`, so an external push can
/// never slow an agent below what the intent step produced.
pub fn compute_combined_velocity(params: &ComputeCombinedVelocityParams) -> Vec3 {
    let intent = compute_velocity(&params.base);
    let limit = intent.norm().max(params.overall_max_speed.max(0.0));
    let dt = params.base.delta_seconds.max(0.0);
    clamp_to_max_size(intent + params.external_acceleration * dt, limit)
}
