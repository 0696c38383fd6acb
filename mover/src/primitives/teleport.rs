use crate::collision::{CollisionBackend, CollisionShape, Quat, Vec3};
use crate::constants::KINDA_SMALL_NUMBER;
use crate::tags::CollisionChannel;

use super::planar::{planar_basis, planar_part, vertical_part};

/// Find a spot near `location` where `shape` does not overlap blocking geometry.
///
/// Returns `location` itself when it is already free. Otherwise the backend's minimum
/// translation is tried in decreasing order of preference: its vertical part, its planar
/// part, then the whole of it. Outside an active simulation, single planar axes and sign
/// flips of the translation are tried too.
///
/// `None` when nothing fits; the caller's location is never modified.
pub fn find_teleport_spot(
    backend: &dyn CollisionBackend,
    shape: &CollisionShape,
    channel: CollisionChannel,
    location: Vec3,
    rotation: Quat,
    up: Vec3,
    in_active_simulation: bool,
) -> Option<Vec3> {
    let fits = |candidate: Vec3| !backend.overlap_test(shape, candidate, rotation, channel);

    if fits(location) {
        return Some(location);
    }

    let mtd = backend.compute_mtd(shape, location, rotation, channel)?;
    let adjustment = mtd.adjustment();
    if adjustment.norm_squared() <= KINDA_SMALL_NUMBER * KINDA_SMALL_NUMBER {
        log::debug!("teleport spot search at {location:?}: overlaps cancel, no way out");
        return None;
    }

    let mut candidates = vec![
        vertical_part(adjustment, up),
        planar_part(adjustment, up),
        adjustment,
    ];

    if !in_active_simulation {
        let (right, forward, up_axis) = planar_basis(up);
        let r = adjustment.dot(&right);
        let f = adjustment.dot(&forward);
        let u = adjustment.dot(&up_axis);
        candidates.push(right * r);
        candidates.push(forward * f);
        candidates.push(-right * r + forward * f + up_axis * u);
        candidates.push(right * r - forward * f + up_axis * u);
        candidates.push(-right * r - forward * f + up_axis * u);
    }

    candidates
        .into_iter()
        .filter(|offset| offset.norm_squared() > KINDA_SMALL_NUMBER * KINDA_SMALL_NUMBER)
        .map(|offset| location + offset)
        .find(|candidate| fits(*candidate))
}
