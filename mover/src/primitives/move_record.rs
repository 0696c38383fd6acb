use crate::collision::Vec3;
use crate::constants::MIN_TICK_TIME;

/// One displacement applied during a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct MovementSubstep {
    /// What caused the move, e.g. `"SlideAlongSurface"` or `"ResolvePenetration"`.
    pub name: &'static str,
    pub moved_delta: Vec3,
    /// Whether this substep counts toward the relevant (intended) movement.
    pub is_relevant: bool,
}

/// Append-only ledger of the substeps taken during one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovementRecord {
    substeps: Vec<MovementSubstep>,
    total_move_delta: Vec3,
    relevant_move_delta: Vec3,
    total_delta_seconds: f32,
    relevancy_lock: Option<bool>,
}

impl MovementRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a substep. While relevancy is locked, the lock overrides `is_relevant`.
    pub fn append(&mut self, mut substep: MovementSubstep) {
        if let Some(locked) = self.relevancy_lock {
            substep.is_relevant = locked;
        }
        self.total_move_delta += substep.moved_delta;
        if substep.is_relevant {
            self.relevant_move_delta += substep.moved_delta;
        }
        self.substeps.push(substep);
    }

    pub fn record(&mut self, name: &'static str, moved_delta: Vec3, is_relevant: bool) {
        self.append(MovementSubstep {
            name,
            moved_delta,
            is_relevant,
        });
    }

    /// Force every following substep to the given relevancy until unlocked.
    pub fn lock_relevancy(&mut self, relevant: bool) {
        self.relevancy_lock = Some(relevant);
    }

    pub fn unlock_relevancy(&mut self) {
        self.relevancy_lock = None;
    }

    pub fn add_delta_seconds(&mut self, seconds: f32) {
        self.total_delta_seconds += seconds.max(0.0);
    }

    pub fn substeps(&self) -> &[MovementSubstep] {
        &self.substeps
    }

    pub fn total_move_delta(&self) -> Vec3 {
        self.total_move_delta
    }

    pub fn relevant_move_delta(&self) -> Vec3 {
        self.relevant_move_delta
    }

    pub fn total_delta_seconds(&self) -> f32 {
        self.total_delta_seconds
    }

    /// Velocity implied by the relevant movement. Zero for an empty time span.
    pub fn relevant_velocity(&self) -> Vec3 {
        if self.total_delta_seconds > MIN_TICK_TIME {
            self.relevant_move_delta / self.total_delta_seconds
        } else {
            Vec3::zeros()
        }
    }

    /// Total distance travelled, counting every substep.
    pub fn total_distance(&self) -> f32 {
        self.substeps.iter().map(|s| s.moved_delta.norm()).sum()
    }

    /// Fraction (0..1) of `intended` actually covered by the relevant movement.
    pub fn percent_applied(&self, intended: Vec3) -> f32 {
        let len_sq = intended.norm_squared();
        if len_sq <= f32::EPSILON {
            return 1.0;
        }
        (self.relevant_move_delta.dot(&intended) / len_sq).clamp(0.0, 1.0)
    }

    /// Clear for reuse at the start of a tick.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
