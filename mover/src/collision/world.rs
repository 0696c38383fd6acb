/*!
Reference collision backend over immutable static shapes.

Sweeps follow the usual character-controller rules:
- A shape the agent already penetrates (deeper than `PENETRATION_TOLERANCE`) blocks the
  sweep at time 0 with `start_penetrating` set, unless the motion leaves it.
- Otherwise the earliest shape-cast impact wins and the agent stops `skin` short of it.
*/

use rapier3d::parry::bounding_volume::Aabb;

use super::CollisionBackend;
use super::broad::{self, WorldAccel};
use super::narrow_phase::{self, ParryShape};
use super::settings::{DEFAULT_SKIN, DIST_EPS, MIN_MOVE_SQ, MTD_EXTRA_DISTANCE, PENETRATION_TOLERANCE};
use super::types::{CollisionShape, HitResult, Iso, Mtd, Quat, StaticShape, Vec3, iso_from};
use crate::tags::{CollisionChannel, CollisionChannels};

/// One static shape placed in the world.
#[derive(Clone, Copy, Debug)]
pub struct StaticEntry {
    /// Identifier reported back in [`HitResult::object`].
    pub id: u64,
    pub shape: StaticShape,
    /// Channels this shape blocks.
    pub blocks: CollisionChannels,
}

impl StaticEntry {
    /// Entry that blocks every channel.
    pub fn solid(id: u64, shape: StaticShape) -> Self {
        Self {
            id,
            shape,
            blocks: CollisionChannel::blocking_all(),
        }
    }
}

/// Prepared static entry: parry shape and pose built once.
struct Prepared {
    entry: StaticEntry,
    shape: ParryShape,
    iso: Iso,
}

/// Immutable world of static shapes answering [`CollisionBackend`] queries.
pub struct StaticWorld {
    statics: Vec<Prepared>,
    accel: WorldAccel,
    skin: f32,
}

impl StaticWorld {
    pub fn new(entries: Vec<StaticEntry>) -> Self {
        let accel = broad::build_world_accel(entries.iter().map(|e| &e.shape));
        let statics = entries
            .into_iter()
            .map(|entry| {
                let (shape, iso) = narrow_phase::static_shape(&entry.shape);
                Prepared { entry, shape, iso }
            })
            .collect();
        Self {
            statics,
            accel,
            skin: DEFAULT_SKIN,
        }
    }

    /// Override the separation kept from surfaces after a blocking sweep.
    pub fn with_skin(mut self, skin: f32) -> Self {
        self.skin = skin.max(0.0);
        self
    }

    #[inline]
    pub fn skin(&self) -> f32 {
        self.skin
    }

    pub fn len(&self) -> usize {
        self.statics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statics.is_empty()
    }

    /// Candidate entries blocking `channel` whose bounds touch `query`.
    fn blocking_candidates<'a>(
        &'a self,
        query: &Aabb,
        channel: CollisionChannel,
    ) -> impl Iterator<Item = &'a Prepared> + 'a {
        self.accel
            .candidates(query)
            .into_iter()
            .map(move |idx| &self.statics[idx])
            .filter(move |p| p.entry.blocks.has(channel))
    }
}

impl CollisionBackend for StaticWorld {
    fn overlap_test(
        &self,
        shape: &CollisionShape,
        location: Vec3,
        rotation: Quat,
        channel: CollisionChannel,
    ) -> bool {
        let agent = narrow_phase::agent_shape(shape);
        let iso = iso_from(location, rotation);
        let bounds = agent.aabb(&iso);
        self.blocking_candidates(&bounds, channel)
            .any(|p| narrow_phase::intersects_static(&iso, &agent, &p.shape, &p.iso))
    }

    fn sweep(
        &self,
        shape: &CollisionShape,
        from: Vec3,
        to: Vec3,
        rotation: Quat,
        channel: CollisionChannel,
    ) -> HitResult {
        let agent = narrow_phase::agent_shape(shape);
        let start_iso = iso_from(from, rotation);
        let end_iso = iso_from(to, rotation);
        let delta = to - from;
        let len_sq = delta.norm_squared();
        let bounds = broad::swept_aabb(&agent, &start_iso, &end_iso, self.skin);

        // 1) Initial penetration: deepest overlap the motion does not leave.
        let mut deepest: Option<(f32, Vec3, u64)> = None;
        for p in self.blocking_candidates(&bounds, channel) {
            let Some(c) =
                narrow_phase::contact_with_static(&start_iso, &agent, &p.shape, &p.iso, 0.0)
            else {
                continue;
            };
            let depth = -c.dist;
            if depth <= PENETRATION_TOLERANCE {
                continue;
            }
            let moving_out = len_sq > MIN_MOVE_SQ && delta.dot(&c.normal) > 0.0;
            if moving_out {
                continue;
            }
            if deepest.is_none_or(|(d, _, _)| depth > d) {
                deepest = Some((depth, c.normal, p.entry.id));
            }
        }
        if let Some((depth, normal, id)) = deepest {
            return HitResult {
                blocking: true,
                start_penetrating: true,
                penetration_depth: depth,
                normal,
                time: 0.0,
                trace_start: from,
                trace_end: to,
                location: from,
                object: Some(id),
            };
        }

        if len_sq <= MIN_MOVE_SQ {
            return HitResult::no_hit(from, to);
        }

        // 2) Earliest time of impact across candidates.
        let mut best: Option<(f32, &Prepared)> = None;
        for p in self.blocking_candidates(&bounds, channel) {
            let toi =
                narrow_phase::cast_against_static(&start_iso, &agent, &delta, &p.shape, &p.iso);
            if let Some(toi) = toi {
                if best.is_none_or(|(b, _)| toi < b) {
                    best = Some((toi, p));
                }
            }
        }

        let Some((toi, hit_static)) = best else {
            return HitResult::no_hit(from, to);
        };

        // 3) Travel up to the contact point (minus skin).
        let len = len_sq.sqrt();
        let dir = delta / len;
        let travel = (len * toi).max(0.0);
        let advance = (travel - self.skin).max(0.0);
        let location = from + dir * advance;

        // Normal from a contact query at the impact pose, in world space.
        let impact_iso = iso_from(from + dir * travel, rotation);
        let mut normal = narrow_phase::contact_with_static(
            &impact_iso,
            &agent,
            &hit_static.shape,
            &hit_static.iso,
            self.skin * 2.0 + DIST_EPS,
        )
        .map(|c| c.normal)
        .unwrap_or(-dir);
        // Ensure the normal opposes motion (consistent with slide logic).
        if normal.dot(&dir) > 0.0 {
            normal = -normal;
        }

        HitResult {
            blocking: true,
            start_penetrating: false,
            penetration_depth: 0.0,
            normal,
            time: (advance / len).clamp(0.0, 1.0),
            trace_start: from,
            trace_end: to,
            location,
            object: Some(hit_static.entry.id),
        }
    }

    fn compute_mtd(
        &self,
        shape: &CollisionShape,
        location: Vec3,
        rotation: Quat,
        channel: CollisionChannel,
    ) -> Option<Mtd> {
        let agent = narrow_phase::agent_shape(shape);
        let iso = iso_from(location, rotation);
        let bounds = agent.aabb(&iso);

        let mut any = false;
        let mut sum = Vec3::zeros();
        for p in self.blocking_candidates(&bounds, channel) {
            let contact = narrow_phase::contact_with_static(&iso, &agent, &p.shape, &p.iso, 0.0);
            if let Some(c) = contact.filter(|c| c.dist <= 0.0) {
                any = true;
                sum += c.normal * (-c.dist + MTD_EXTRA_DISTANCE);
            }
        }
        any.then(|| Mtd::from_adjustment(sum))
    }
}
