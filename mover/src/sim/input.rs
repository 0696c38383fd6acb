use crate::collision::Vec3;
use crate::primitives::MoveInputType;

use super::data::DataCollection;

/// One tick's worth of intent from a player or AI.
#[derive(Clone, Debug, Default)]
pub struct InputCmd {
    pub move_input_type: MoveInputType,
    /// Directional intent (length 0..1) or desired velocity, per `move_input_type`.
    pub move_input: Vec3,
    /// Direction the agent should face, if any.
    pub orientation_intent: Option<Vec3>,
    /// Mode switch requested by the input source.
    pub suggested_mode: Option<String>,
    pub is_jump_just_pressed: bool,
    pub is_jump_pressed: bool,
    /// Input-derived data blocks.
    pub data: DataCollection,
}

impl InputCmd {
    /// Directional intent toward `direction`, clamped to unit length.
    pub fn directional(direction: Vec3) -> Self {
        let len = direction.norm();
        let intent = if len > 1.0 { direction / len } else { direction };
        Self {
            move_input_type: MoveInputType::DirectionalIntent,
            move_input: intent,
            ..Default::default()
        }
    }

    /// Request a velocity directly.
    pub fn velocity(velocity: Vec3) -> Self {
        Self {
            move_input_type: MoveInputType::Velocity,
            move_input: velocity,
            ..Default::default()
        }
    }

    pub fn with_jump(mut self) -> Self {
        self.is_jump_just_pressed = true;
        self.is_jump_pressed = true;
        self
    }

    pub fn with_suggested_mode(mut self, mode: impl Into<String>) -> Self {
        self.suggested_mode = Some(mode.into());
        self
    }

    /// Directional intent, or zero for other input types.
    pub fn move_direction_intent(&self) -> Vec3 {
        match self.move_input_type {
            MoveInputType::DirectionalIntent => self.move_input,
            MoveInputType::Velocity | MoveInputType::None => Vec3::zeros(),
        }
    }
}

/// Supplies one [`InputCmd`] per tick.
pub trait InputProducer: Send {
    fn produce_input(&mut self, delta_time_ms: f32) -> InputCmd;
}

impl<F> InputProducer for F
where
    F: FnMut(f32) -> InputCmd + Send,
{
    fn produce_input(&mut self, delta_time_ms: f32) -> InputCmd {
        self(delta_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_input_is_clamped() {
        let cmd = InputCmd::directional(Vec3::new(3.0, 4.0, 0.0));
        assert!((cmd.move_input.norm() - 1.0).abs() < 1.0e-6);
        assert_eq!(InputCmd::velocity(Vec3::x()).move_direction_intent(), Vec3::zeros());
    }

    #[test]
    fn closures_produce_input() {
        let mut calls = 0;
        let mut producer = |_dt: f32| {
            calls += 1;
            InputCmd::directional(Vec3::x())
        };
        let cmd = producer.produce_input(16.0);
        assert_eq!(cmd.move_input, Vec3::x());
        assert_eq!(calls, 1);
    }
}
