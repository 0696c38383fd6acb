/// Simulation time descriptor for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeStep {
    /// Step duration in milliseconds.
    pub step_ms: f32,
    /// Simulation time at the start of the step, in milliseconds.
    pub base_sim_time_ms: f64,
    /// Monotonically increasing frame counter.
    pub server_frame: i64,
    /// This step replays a frame already simulated once.
    pub is_resimulating: bool,
}

impl Default for TimeStep {
    /// The "never processed" sentinel.
    fn default() -> Self {
        Self {
            step_ms: 0.0,
            base_sim_time_ms: -1.0,
            server_frame: -1,
            is_resimulating: false,
        }
    }
}

impl TimeStep {
    pub fn new(server_frame: i64, base_sim_time_ms: f64, step_ms: f32) -> Self {
        Self {
            step_ms,
            base_sim_time_ms,
            server_frame,
            is_resimulating: false,
        }
    }

    #[inline]
    pub fn delta_seconds(&self) -> f32 {
        self.step_ms.max(0.0) * 0.001
    }

    #[inline]
    pub fn end_time_ms(&self) -> f64 {
        self.base_sim_time_ms + f64::from(self.step_ms.max(0.0))
    }

    /// True for the sentinel value.
    #[inline]
    pub fn is_unset(&self) -> bool {
        self.server_frame < 0 && self.base_sim_time_ms < 0.0
    }

    /// A copy covering the tail of this step, starting `elapsed_ms` in.
    pub fn remainder(&self, elapsed_ms: f32) -> Self {
        let elapsed = elapsed_ms.clamp(0.0, self.step_ms.max(0.0));
        Self {
            step_ms: self.step_ms - elapsed,
            base_sim_time_ms: self.base_sim_time_ms + f64::from(elapsed),
            ..*self
        }
    }
}
