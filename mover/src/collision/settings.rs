/*!
Tolerances used by the reference collision backend.

Distances are in world units (centimetre scale). Favor practical world-space
tolerances over machine epsilon for robust behavior.
*/

/// Separation kept from surfaces when a sweep stops on a hit.
/// Too large creates visible gaps; too small risks reporting start-penetration on the next move.
pub const DEFAULT_SKIN: f32 = 0.05;

/// Contacts shallower than this do not count as starting in penetration.
pub const PENETRATION_TOLERANCE: f32 = 0.01;

/// Extra distance added to each contact when summing a minimum translation distance,
/// so the adjusted shape ends clear of the surface rather than exactly touching it.
pub const MTD_EXTRA_DISTANCE: f32 = 0.02;

/// Minimum squared movement threshold to consider a sweep meaningful.
pub const MIN_MOVE_SQ: f32 = 1.0e-8;

/// Practical small distance for comparisons.
pub const DIST_EPS: f32 = 1.0e-6;
