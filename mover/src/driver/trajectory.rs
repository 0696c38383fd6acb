use crate::collision::{Quat, Vec3};
use crate::modes::{MoveGenContext, integrate_rotation};
use crate::primitives::up_from_gravity;
use crate::sim::{InputCmd, SyncState, TimeStep};

use super::Mover;

/// Upper bound on the samples of one prediction.
pub const MAX_TRAJECTORY_SAMPLES: usize = 1024;

/// One predicted future state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectorySample {
    /// Simulation time of the sample.
    pub time_ms: f64,
    pub location: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
}

impl Mover {
    /// Predict the agent's path for `seconds` by repeatedly asking the current mode for a
    /// move under `input` and integrating it, ignoring collision.
    ///
    /// Returns at least one and at most [`MAX_TRAJECTORY_SAMPLES`] samples. Nothing is simulated for real: the published state, the
    /// body and the blackboard are left alone. Without a current mode the agent is assumed to
    /// keep its velocity.
    pub fn predicted_trajectory(&self, seconds: f32, samples_per_second: f32, input: &InputCmd) -> Vec<TrajectorySample> {
        let wanted = (seconds * samples_per_second).floor();
        let count = if wanted.is_nan() {
            1
        } else {
            wanted.clamp(1.0, MAX_TRAJECTORY_SAMPLES as f32) as usize
        };
        let step_ms = if samples_per_second > 0.0 {
            1000.0 / samples_per_second
        } else {
            seconds.max(0.0) * 1000.0
        };
        let dt = step_ms * 0.001;
        let up = up_from_gravity(self.gravity);

        let mut state: SyncState = self.sync_state().clone();
        let mut settings = self.shared.common();
        state.modifiers.adjust_settings(&mut settings);

        let start_ms = self.last_time_step.end_time_ms().max(0.0);
        let first_frame = self.last_time_step.server_frame + 1;
        let mut samples = Vec::with_capacity(count);

        for i in 0..count {
            let time_step = TimeStep::new(first_frame + i as i64, start_ms + f64::from(step_ms) * i as f64, step_ms);
            let ctx = MoveGenContext {
                time_step: &time_step,
                start_state: &state,
                input,
                settings: &settings,
                shared: &self.shared,
                blackboard: &self.blackboard,
                gravity: self.gravity,
                up,
            };
            let (velocity, orientation) = match self.fsm.propose_move(&ctx, &state.layered_moves) {
                Some(proposed) => (
                    proposed.linear_velocity,
                    integrate_rotation(state.orientation, proposed.angular_velocity, dt),
                ),
                None => (state.velocity, state.orientation),
            };

            state.location += velocity * dt;
            state.orientation = orientation;
            state.velocity = velocity;
            samples.push(TrajectorySample {
                time_ms: time_step.end_time_ms(),
                location: state.location,
                orientation: state.orientation,
                velocity: state.velocity,
            });
        }
        samples
    }
}
