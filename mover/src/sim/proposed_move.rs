use crate::collision::Vec3;
use crate::hash::StateHasher;

/// How a layered contribution combines with the mode's own proposed move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MoveMixMode {
    /// Add the linear velocity to the mode's.
    #[default]
    AdditiveVelocity,
    /// Replace the mode's linear velocity.
    OverrideVelocity,
    /// Replace both linear and angular velocity.
    OverrideAll,
}

impl MoveMixMode {
    #[inline]
    pub fn is_override(self) -> bool {
        !matches!(self, MoveMixMode::AdditiveVelocity)
    }

    pub(crate) fn hash_into(self, hasher: &mut StateHasher) {
        hasher.update_u32(self as u32);
    }
}

/// What a mode or layered move wants the agent to do this step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProposedMove {
    /// World units per second.
    pub linear_velocity: Vec3,
    /// Scaled-axis angular velocity, radians per second.
    pub angular_velocity: Vec3,
    /// Unit direction the agent intends to move in; zero when idle.
    pub direction_intent: Vec3,
    pub mix_mode: MoveMixMode,
    /// Mode the agent should switch to, if any.
    pub preferred_mode: Option<String>,
}

impl ProposedMove {
    pub fn with_velocity(linear_velocity: Vec3) -> Self {
        Self {
            linear_velocity,
            ..Default::default()
        }
    }

    #[inline]
    pub fn has_direction_intent(&self) -> bool {
        self.direction_intent.norm_squared() > f32::EPSILON
    }

    /// Combine a layered contribution into this move according to its mix mode.
    ///
    /// Only velocities are mixed; the preferred mode is left to the caller.
    pub fn mix(&mut self, layer: &ProposedMove) {
        match layer.mix_mode {
            MoveMixMode::AdditiveVelocity => {
                self.linear_velocity += layer.linear_velocity;
                self.angular_velocity += layer.angular_velocity;
            }
            MoveMixMode::OverrideVelocity => {
                self.linear_velocity = layer.linear_velocity;
            }
            MoveMixMode::OverrideAll => {
                self.linear_velocity = layer.linear_velocity;
                self.angular_velocity = layer.angular_velocity;
            }
        }
    }
}
