use crate::collision::{CollisionBackend, CollisionShape, HitResult, Quat, Transform, Vec3};
use crate::constants::SMALL_NUMBER;
use crate::sim::events::{ImpactEvent, MoverEvent};
use crate::tags::CollisionChannel;

use super::move_record::MovementRecord;
use super::planar::PlanarConstraint;

/// The agent's actual spatial transform, as seen by the rest of the application.
///
/// Inside a deferred scope writes are held back and committed once when the scope ends,
/// so a tick with many sub-moves produces a single spatial update. Reads always see the
/// latest written value.
#[derive(Clone, Debug)]
pub struct AgentBody {
    committed: Transform,
    pending: Option<Transform>,
    deferred: bool,
    spatial_updates: u64,
}

impl AgentBody {
    pub fn new(transform: Transform) -> Self {
        Self {
            committed: transform,
            pending: None,
            deferred: false,
            spatial_updates: 0,
        }
    }

    /// Latest transform, including uncommitted deferred writes.
    #[inline]
    pub fn transform(&self) -> Transform {
        self.pending.unwrap_or(self.committed)
    }

    #[inline]
    pub fn location(&self) -> Vec3 {
        self.transform().translation
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.transform().rotation
    }

    /// Transform visible to observers outside the simulation.
    #[inline]
    pub fn committed(&self) -> Transform {
        self.committed
    }

    pub fn set_transform(&mut self, transform: Transform) {
        if self.deferred {
            self.pending = Some(transform);
        } else {
            self.committed = transform;
            self.spatial_updates += 1;
        }
    }

    pub fn begin_deferred(&mut self) {
        self.deferred = true;
    }

    /// Leave the deferred scope and commit the pending transform, if any.
    pub fn end_deferred(&mut self) {
        self.deferred = false;
        if let Some(t) = self.pending.take() {
            self.committed = t;
            self.spatial_updates += 1;
        }
    }

    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Number of committed spatial updates so far.
    #[inline]
    pub fn spatial_updates(&self) -> u64 {
        self.spatial_updates
    }
}

/// Everything a movement primitive needs to move the agent for one tick:
/// the collision backend, the agent body, and the sinks for substeps and impacts.
pub struct MovingBody<'a> {
    backend: &'a dyn CollisionBackend,
    body: &'a mut AgentBody,
    record: &'a mut MovementRecord,
    events: &'a mut Vec<MoverEvent>,
    pub shape: CollisionShape,
    pub channel: CollisionChannel,
    pub planar: Option<PlanarConstraint>,
    pub up: Vec3,
    /// Mode impacts are attributed to.
    pub mode: Option<String>,
}

impl<'a> MovingBody<'a> {
    pub fn new(
        backend: &'a dyn CollisionBackend,
        body: &'a mut AgentBody,
        record: &'a mut MovementRecord,
        events: &'a mut Vec<MoverEvent>,
        shape: CollisionShape,
        channel: CollisionChannel,
        up: Vec3,
    ) -> Self {
        Self {
            backend,
            body,
            record,
            events,
            shape,
            channel,
            planar: None,
            up,
            mode: None,
        }
    }

    pub fn with_planar(mut self, planar: Option<PlanarConstraint>) -> Self {
        self.planar = planar;
        self
    }

    #[inline]
    pub fn backend(&self) -> &dyn CollisionBackend {
        self.backend
    }

    #[inline]
    pub fn location(&self) -> Vec3 {
        self.body.location()
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.body.rotation()
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        self.body.transform()
    }

    #[inline]
    pub fn record(&mut self) -> &mut MovementRecord {
        &mut *self.record
    }

    #[inline]
    pub fn planar(&self) -> Option<&PlanarConstraint> {
        self.planar.as_ref()
    }

    /// Sweep from the current location without moving.
    pub fn sweep_test(&self, delta: Vec3, rotation: Quat) -> HitResult {
        let from = self.location();
        self.backend
            .sweep(&self.shape, from, from + delta, rotation, self.channel)
    }

    /// Overlap test at an arbitrary location with an optionally inflated shape.
    pub fn overlap_test_at(&self, location: Vec3, rotation: Quat, inflation: f32) -> bool {
        let shape = self.shape.inflated(inflation);
        self.backend
            .overlap_test(&shape, location, rotation, self.channel)
    }

    /// Move by `delta`, optionally sweeping for blocking geometry.
    ///
    /// Returns `false` (and leaves the body untouched) when the sweep starts in penetration.
    pub fn move_component(&mut self, delta: Vec3, rotation: Quat, sweep: bool) -> (bool, HitResult) {
        let from = self.location();
        let to = from + delta;
        let same_rotation = self.rotation().angle_to(&rotation) <= f32::EPSILON;
        if delta.norm_squared() <= SMALL_NUMBER && same_rotation {
            return (true, HitResult::no_hit(from, to));
        }
        if !sweep {
            self.body.set_transform(Transform::new(to, rotation));
            return (true, HitResult::no_hit(from, to));
        }

        let hit = self.backend.sweep(&self.shape, from, to, rotation, self.channel);
        if hit.start_penetrating {
            return (false, hit);
        }
        self.body.set_transform(Transform::new(hit.location, rotation));
        (true, hit)
    }

    /// Place the agent without sweeping.
    pub fn teleport(&mut self, location: Vec3, rotation: Quat) {
        self.body.set_transform(Transform::new(location, rotation));
    }

    /// Report a blocking hit encountered while trying to move by `attempted_delta`.
    pub fn handle_impact(&mut self, hit: &HitResult, attempted_delta: Vec3) {
        self.events.push(MoverEvent::Impact(ImpactEvent {
            mode: self.mode.clone(),
            hit: *hit,
            attempted_delta,
        }));
    }

    pub(crate) fn push_event(&mut self, event: MoverEvent) {
        self.events.push(event);
    }
}
