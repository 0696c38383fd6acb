use nalgebra as na;

/// Slack applied when deciding whether a velocity is over its maximum speed.
///
/// A velocity counts as "exceeding" only when `|v|^2 > (max * SPEED_TOLERANCE)^2`, which keeps
/// values that landed a hair over the clamp from being braked every tick.
pub const MAX_SPEED_TOLERANCE: f32 = 1.01;

/// Distance added on top of a reported penetration depth when pushing out of geometry.
pub const PENETRATION_PULLBACK_DISTANCE: f32 = 0.125;

/// Inflation applied to the agent shape for the "does it fit here" check during depenetration.
pub const PENETRATION_OVERLAP_CHECK_INFLATION: f32 = 0.1;

/// Moves shorter than this (world units) are treated as zero when chaining slides.
pub const SMALL_MOVE_DISTANCE: f32 = 1.0e-3;

/// Generic "nearly equal" threshold for unit-vector dot comparisons.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Squared-length threshold below which a vector is considered zero.
pub const SMALL_NUMBER: f32 = 1.0e-8;

/// Nudge applied along the wall normal when a second slide hits the same wall again.
pub const SAME_WALL_NUDGE: f32 = 0.01;

/// Smallest time slice (seconds) that braking integrates.
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// Target sub-step length for velocity braking (seconds), clamped to
/// [`BRAKING_SUBSTEP_MIN`, `BRAKING_SUBSTEP_MAX`].
pub const BRAKING_SUBSTEP_TIME: f32 = 1.0 / 33.0;
pub const BRAKING_SUBSTEP_MIN: f32 = 1.0 / 75.0;
pub const BRAKING_SUBSTEP_MAX: f32 = 1.0 / 20.0;

/// Speed (world units / s) under which braking deceleration snaps the velocity to zero.
pub const BRAKE_TO_STOP_VELOCITY: f32 = 10.0;

/// Remaining sub-step time (ms) below which the mode loop stops re-entering.
pub const SMALL_TIME_STEP_MS: f32 = 1.0e-3;

/// Default cap on consecutive mode re-entries inside a single tick.
pub const DEFAULT_MAX_SUBSTEPS: u32 = 4;

/// Location difference tolerated before finalize re-applies the state transform.
pub const LOCATION_TOLERANCE: f32 = 1.0e-4;

/// Rotation difference (radians) tolerated before finalize re-applies the state transform.
pub const ROTATOR_TOLERANCE: f32 = 1.0e-3;

/// Location difference (world units) above which out-of-band movement is reported.
pub const OUT_OF_BAND_TOLERANCE: f32 = 1.0e-2;

/// Default gravity: 980 units/s^2 along -Z (centimetre scale).
#[inline]
pub fn default_gravity() -> na::Vector3<f32> {
    na::Vector3::new(0.0, 0.0, -980.0)
}

/// Default up direction when gravity is zero or unset.
#[inline]
pub fn default_up() -> na::Vector3<f32> {
    na::Vector3::z()
}
