/*!
Movement modes and the state machine that runs them.

A mode is a named strategy: every tick it proposes a move from the input and the current
state, then carries that move out against collision. Exactly one mode is current at a time.

- transition:    rules that switch modes
- state_machine: mode registry, queued changes and the per-tick substep loop
- walking / falling / flying: built-in modes
*/

pub mod falling;
pub mod flying;
pub mod state_machine;
pub mod transition;
pub mod walking;

pub use falling::FallingMode;
pub use flying::FlyingMode;
pub use state_machine::{ModeStateMachine, NextModeRequest, StateMachineTick};
pub use transition::{ConditionTransition, Transition, TransitionContext};
pub use walking::WalkingMode;

use crate::collision::{Quat, Vec3};
use crate::primitives::MovingBody;
use crate::sim::{
    BaseProvider, CommonMovementSettings, InputCmd, ProposedMove, SharedSettings, SimBlackboard,
    SyncState, TimeStep,
};
use crate::tags::MovementTags;

/// Names of the built-in modes.
pub const WALKING: &str = "Walking";
pub const FALLING: &str = "Falling";
pub const FLYING: &str = "Flying";

/// Read-only inputs for proposing a move.
pub struct MoveGenContext<'a> {
    pub time_step: &'a TimeStep,
    pub start_state: &'a SyncState,
    pub input: &'a InputCmd,
    /// Per-tick settings, already adjusted by active modifiers.
    pub settings: &'a CommonMovementSettings,
    pub shared: &'a SharedSettings,
    pub blackboard: &'a SimBlackboard,
    pub gravity: Vec3,
    pub up: Vec3,
}

/// Everything a mode needs to carry out its proposed move.
pub struct SimulationTickParams<'a, 'b> {
    pub time_step: TimeStep,
    pub start_state: &'a SyncState,
    pub input: &'a InputCmd,
    pub proposed_move: ProposedMove,
    pub settings: &'a CommonMovementSettings,
    pub shared: &'a SharedSettings,
    pub blackboard: &'a mut SimBlackboard,
    pub mover: &'a mut MovingBody<'b>,
    pub gravity: Vec3,
    pub bases: &'a dyn BaseProvider,
}

/// How a mode's tick ended.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovementEndState {
    /// Continue this tick in another mode.
    pub next_mode: Option<String>,
    /// Unused part of the step (ms) handed to `next_mode`.
    pub remaining_ms: f32,
}

impl MovementEndState {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn switch_to(mode: impl Into<String>, remaining_ms: f32) -> Self {
        Self {
            next_mode: Some(mode.into()),
            remaining_ms: remaining_ms.max(0.0),
        }
    }
}

/// A named movement strategy.
///
/// Modes hold no per-tick state: everything that must survive a tick lives in the sync state
/// so that rollback restores it.
pub trait MovementMode: Send + Sync {
    fn generate_move(&self, ctx: &MoveGenContext<'_>) -> ProposedMove;

    /// Carry out `params.proposed_move`, writing the resulting state into `out`.
    fn simulation_tick(&self, params: &mut SimulationTickParams<'_, '_>, out: &mut SyncState) -> MovementEndState;

    fn on_registered(&mut self, _name: &str) {}
    fn on_unregistered(&mut self) {}
    fn on_activate(&mut self) {}
    fn on_deactivate(&mut self) {}

    /// Tags the agent carries while this mode is current.
    fn tags(&self) -> MovementTags {
        MovementTags::default()
    }

    /// Kinds of shared settings this mode reads.
    fn required_shared_settings(&self) -> &'static [&'static str] {
        &[]
    }

    /// A mode that only exists to be specialised and must not be registered.
    fn is_abstract(&self) -> bool {
        false
    }
}

/// Turn from `current` toward facing `intent` (projected onto the plane normal to `up`), at
/// most `rate_deg` degrees per second. Returns the scaled-axis angular velocity.
pub fn turn_toward(current: Quat, intent: Option<Vec3>, up: Vec3, rate_deg: f32, dt: f32) -> Vec3 {
    let Some(intent) = intent else {
        return Vec3::zeros();
    };
    let flat = intent - up * intent.dot(&up);
    if flat.norm_squared() <= f32::EPSILON || dt <= 0.0 {
        return Vec3::zeros();
    }
    let forward = current * Vec3::x();
    let forward = forward - up * forward.dot(&up);
    if forward.norm_squared() <= f32::EPSILON {
        return Vec3::zeros();
    }
    let forward = forward.normalize();
    let flat = flat.normalize();
    let angle = forward.cross(&flat).dot(&up).atan2(forward.dot(&flat));
    let max_step = rate_deg.max(0.0).to_radians() * dt;
    let step = if rate_deg < 0.0 {
        angle
    } else {
        angle.clamp(-max_step, max_step)
    };
    up * (step / dt)
}

/// Integrate an angular velocity over `dt` seconds.
pub fn integrate_rotation(orientation: Quat, angular_velocity: Vec3, dt: f32) -> Quat {
    if angular_velocity.norm_squared() <= f32::EPSILON {
        return orientation;
    }
    Quat::from_scaled_axis(angular_velocity * dt) * orientation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turning_is_rate_limited() {
        let w = turn_toward(Quat::identity(), Some(Vec3::y()), Vec3::z(), 90.0, 0.5);
        // 90 deg/s over half a second: 45 degrees of the needed 90.
        let turned = integrate_rotation(Quat::identity(), w, 0.5);
        let forward = turned * Vec3::x();
        let expected = std::f32::consts::FRAC_PI_4;
        assert!((forward.y.atan2(forward.x) - expected).abs() < 1.0e-4);
    }

    #[test]
    fn no_intent_no_turn() {
        assert_eq!(turn_toward(Quat::identity(), None, Vec3::z(), 90.0, 0.1), Vec3::zeros());
        assert_eq!(
            turn_toward(Quat::identity(), Some(Vec3::z()), Vec3::z(), 90.0, 0.1),
            Vec3::zeros()
        );
    }
}
