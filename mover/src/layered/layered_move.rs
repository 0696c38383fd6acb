use std::any::Any;
use std::fmt::Debug;

use crate::collision::Vec3;
use crate::hash::StateHasher;
use crate::modes::MoveGenContext;
use crate::sim::{MoveMixMode, ProposedMove, SyncState, TimeStep};
use crate::tags::{MovementTag, MovementTags};

/// Stable external reference to a queued or active layered move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayeredMoveHandle(pub u32);

/// State every layered move carries.
#[derive(Clone, Debug, PartialEq)]
pub struct LayeredMoveBase {
    pub handle: LayeredMoveHandle,
    pub mix_mode: MoveMixMode,
    /// Higher wins when several overrides are active.
    pub priority: u8,
    /// Negative for a move that lasts until cancelled.
    pub duration_ms: f32,
    /// Set when the move becomes active; negative before that.
    pub start_sim_time_ms: f64,
    pub preferred_mode: Option<String>,
    pub tags: MovementTags,
}

impl Default for LayeredMoveBase {
    fn default() -> Self {
        Self {
            handle: LayeredMoveHandle::default(),
            mix_mode: MoveMixMode::AdditiveVelocity,
            priority: 0,
            duration_ms: -1.0,
            start_sim_time_ms: -1.0,
            preferred_mode: None,
            tags: MovementTags::default(),
        }
    }
}

impl LayeredMoveBase {
    pub fn new(mix_mode: MoveMixMode, duration_ms: f32) -> Self {
        Self {
            mix_mode,
            duration_ms,
            ..Default::default()
        }
    }

    #[inline]
    pub fn has_started(&self) -> bool {
        self.start_sim_time_ms >= 0.0
    }

    #[inline]
    pub fn end_time_ms(&self) -> Option<f64> {
        (self.duration_ms >= 0.0 && self.has_started())
            .then(|| self.start_sim_time_ms + f64::from(self.duration_ms))
    }

    pub fn is_finished(&self, now_ms: f64) -> bool {
        self.end_time_ms().is_some_and(|end| now_ms >= end)
    }

    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.handle.0);
        self.mix_mode.hash_into(hasher);
        hasher.update_u32(u32::from(self.priority));
        hasher.update_f32(self.duration_ms);
        hasher.update_f64(self.start_sim_time_ms);
        hasher.update_opt_str(self.preferred_mode.as_deref());
        hasher.update_u64(self.tags.bits);
    }
}

/// A time-bounded motion contributor mixed on top of the current mode's move.
pub trait LayeredMove: Debug + Send + Sync {
    fn base(&self) -> &LayeredMoveBase;
    fn base_mut(&mut self) -> &mut LayeredMoveBase;

    /// Called once when the move becomes active.
    fn on_start(&mut self, _start: &SyncState, _time_step: &TimeStep) {}

    /// This step's contribution. `None` contributes nothing.
    fn generate_move(&self, ctx: &MoveGenContext<'_>) -> Option<ProposedMove>;

    fn is_finished(&self, now_ms: f64) -> bool {
        self.base().is_finished(now_ms)
    }

    /// Registered type name, used by the dynamic queueing registry and digests.
    fn type_name(&self) -> &'static str;

    fn clone_box(&self) -> Box<dyn LayeredMove>;

    /// Feed move-specific fields into the state digest.
    fn hash_into(&self, _hasher: &mut StateHasher) {}

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn LayeredMove> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Moves at a constant velocity for the duration.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearVelocityMove {
    pub base: LayeredMoveBase,
    pub velocity: Vec3,
}

impl LinearVelocityMove {
    pub fn new(velocity: Vec3, duration_ms: f32, mix_mode: MoveMixMode) -> Self {
        Self {
            base: LayeredMoveBase::new(mix_mode, duration_ms),
            velocity,
        }
    }
}

impl LayeredMove for LinearVelocityMove {
    fn base(&self) -> &LayeredMoveBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayeredMoveBase {
        &mut self.base
    }

    fn generate_move(&self, _ctx: &MoveGenContext<'_>) -> Option<ProposedMove> {
        Some(ProposedMove {
            linear_velocity: self.velocity,
            mix_mode: self.base.mix_mode,
            ..Default::default()
        })
    }

    fn type_name(&self) -> &'static str {
        "LinearVelocityMove"
    }

    fn clone_box(&self) -> Box<dyn LayeredMove> {
        Box::new(self.clone())
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_vec3(&self.velocity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Travels from wherever the agent is when the move starts to `target`, arriving exactly
/// when the duration runs out (if nothing blocks it).
#[derive(Clone, Debug, PartialEq)]
pub struct MoveToPointMove {
    pub base: LayeredMoveBase,
    pub target: Vec3,
    start: Option<Vec3>,
}

impl MoveToPointMove {
    pub fn new(target: Vec3, duration_ms: f32) -> Self {
        Self {
            base: LayeredMoveBase::new(MoveMixMode::OverrideVelocity, duration_ms.max(1.0)),
            target,
            start: None,
        }
    }

    /// Location captured when the move started.
    pub fn start(&self) -> Option<Vec3> {
        self.start
    }
}

impl LayeredMove for MoveToPointMove {
    fn base(&self) -> &LayeredMoveBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayeredMoveBase {
        &mut self.base
    }

    fn on_start(&mut self, start: &SyncState, _time_step: &TimeStep) {
        self.start = Some(start.location);
    }

    fn generate_move(&self, ctx: &MoveGenContext<'_>) -> Option<ProposedMove> {
        let end = self.base.end_time_ms()?;
        let step_ms = f64::from(ctx.time_step.step_ms.max(0.0));
        let remaining_ms = (end - ctx.time_step.base_sim_time_ms).max(step_ms);
        if remaining_ms <= 0.0 {
            return None;
        }
        let to_target = self.target - ctx.start_state.location;
        let velocity = to_target / (remaining_ms * 0.001) as f32;
        Some(ProposedMove {
            linear_velocity: velocity,
            mix_mode: self.base.mix_mode,
            ..Default::default()
        })
    }

    fn type_name(&self) -> &'static str {
        "MoveToPointMove"
    }

    fn clone_box(&self) -> Box<dyn LayeredMove> {
        Box::new(self.clone())
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_vec3(&self.target);
        match &self.start {
            Some(s) => {
                hasher.update_bool(true);
                hasher.update_vec3(s);
            }
            None => hasher.update_bool(false),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Queued and active layered moves of one sync state.
#[derive(Clone, Debug, Default)]
pub struct LayeredMoveGroup {
    active: Vec<Box<dyn LayeredMove>>,
    queued: Vec<Box<dyn LayeredMove>>,
}

impl LayeredMoveGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a move; it becomes active at the next tick boundary.
    pub fn queue(&mut self, layered_move: Box<dyn LayeredMove>) {
        self.queued.push(layered_move);
    }

    pub fn active(&self) -> &[Box<dyn LayeredMove>] {
        &self.active
    }

    pub fn queued(&self) -> &[Box<dyn LayeredMove>] {
        &self.queued
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.queued.is_empty()
    }

    /// Promote every queued move to active, stamping its start time.
    pub fn activate_queued(&mut self, start: &SyncState, time_step: &TimeStep) -> usize {
        let count = self.queued.len();
        for mut layered_move in self.queued.drain(..) {
            layered_move.base_mut().start_sim_time_ms = time_step.base_sim_time_ms;
            layered_move.on_start(start, time_step);
            log::trace!(
                "layered move {} ({:?}) started",
                layered_move.type_name(),
                layered_move.base().handle
            );
            self.active.push(layered_move);
        }
        count
    }

    /// Mix every active move's contribution into `base_move`.
    ///
    /// Moves are visited in descending priority (ties keep activation order). The first
    /// override replaces the base velocity; later overrides are ignored; additive moves
    /// always add. The highest-priority preferred mode wins.
    pub fn generate(&self, ctx: &MoveGenContext<'_>, base_move: ProposedMove) -> ProposedMove {
        let mut order: Vec<&dyn LayeredMove> = self.active.iter().map(|m| m.as_ref()).collect();
        order.sort_by(|a, b| b.base().priority.cmp(&a.base().priority));

        let mut result = base_move;
        let mut overridden = false;
        let mut preferred: Option<String> = None;
        for layered_move in order {
            let Some(contribution) = layered_move.generate_move(ctx) else {
                continue;
            };
            if contribution.mix_mode.is_override() {
                if overridden {
                    continue;
                }
                overridden = true;
            }
            result.mix(&contribution);
            if preferred.is_none() {
                preferred = layered_move.base().preferred_mode.clone();
            }
        }
        if preferred.is_some() {
            result.preferred_mode = preferred;
        }
        result
    }

    /// Drop finished moves, returning their handles.
    pub fn retire_finished(&mut self, now_ms: f64) -> Vec<LayeredMoveHandle> {
        let mut retired = Vec::new();
        self.active.retain(|m| {
            let done = m.is_finished(now_ms);
            if done {
                retired.push(m.base().handle);
            }
            !done
        });
        retired
    }

    /// Remove the move with `handle` from the active or queued set.
    pub fn cancel(&mut self, handle: LayeredMoveHandle) -> bool {
        let before = self.active.len() + self.queued.len();
        self.active.retain(|m| m.base().handle != handle);
        self.queued.retain(|m| m.base().handle != handle);
        before != self.active.len() + self.queued.len()
    }

    pub fn find(&self, handle: LayeredMoveHandle) -> Option<&dyn LayeredMove> {
        self.active
            .iter()
            .chain(self.queued.iter())
            .find(|m| m.base().handle == handle)
            .map(|m| m.as_ref())
    }

    /// True when an active move carries `tag`.
    pub fn has_tag(&self, tag: MovementTag) -> bool {
        self.active.iter().any(|m| m.base().tags.has(tag))
    }

    pub fn clear_queued(&mut self) {
        self.queued.clear();
    }

    pub fn hash_into(&self, hasher: &mut StateHasher) {
        for list in [&self.active, &self.queued] {
            hasher.update_u64(list.len() as u64);
            for m in list {
                hasher.update_str(m.type_name());
                m.base().hash_into(hasher);
                m.hash_into(hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{InputCmd, SharedSettings, SimBlackboard};

    fn with_ctx<R>(state: &SyncState, ts: &TimeStep, f: impl FnOnce(&MoveGenContext<'_>) -> R) -> R {
        let input = InputCmd::default();
        let shared = SharedSettings::with_common_defaults();
        let settings = shared.common();
        let blackboard = SimBlackboard::new();
        let ctx = MoveGenContext {
            time_step: ts,
            start_state: state,
            input: &input,
            settings: &settings,
            shared: &shared,
            blackboard: &blackboard,
            gravity: crate::constants::default_gravity(),
            up: Vec3::z(),
        };
        f(&ctx)
    }

    fn with_handle(mut m: impl LayeredMove + 'static, handle: u32, priority: u8) -> Box<dyn LayeredMove> {
        m.base_mut().handle = LayeredMoveHandle(handle);
        m.base_mut().priority = priority;
        Box::new(m)
    }

    #[test]
    fn highest_priority_override_wins_and_additives_add() {
        let state = SyncState::default();
        let ts = TimeStep::new(0, 0.0, 16.0);
        let mut group = LayeredMoveGroup::new();
        group.queue(with_handle(
            LinearVelocityMove::new(Vec3::new(100.0, 0.0, 0.0), -1.0, MoveMixMode::OverrideVelocity),
            1,
            1,
        ));
        group.queue(with_handle(
            LinearVelocityMove::new(Vec3::new(0.0, 200.0, 0.0), -1.0, MoveMixMode::OverrideVelocity),
            2,
            5,
        ));
        group.queue(with_handle(
            LinearVelocityMove::new(Vec3::new(0.0, 0.0, 7.0), -1.0, MoveMixMode::AdditiveVelocity),
            3,
            0,
        ));
        assert_eq!(group.activate_queued(&state, &ts), 3);

        let base = ProposedMove::with_velocity(Vec3::new(1.0, 1.0, 1.0));
        let mixed = with_ctx(&state, &ts, |ctx| group.generate(ctx, base));
        assert_eq!(mixed.linear_velocity, Vec3::new(0.0, 200.0, 7.0));
    }

    #[test]
    fn moves_retire_after_their_duration() {
        let state = SyncState::default();
        let mut group = LayeredMoveGroup::new();
        group.queue(with_handle(
            LinearVelocityMove::new(Vec3::x(), 100.0, MoveMixMode::AdditiveVelocity),
            1,
            0,
        ));
        group.activate_queued(&state, &TimeStep::new(0, 1000.0, 16.0));
        assert!(group.retire_finished(1050.0).is_empty());
        assert_eq!(group.retire_finished(1100.0), vec![LayeredMoveHandle(1)]);
        assert!(group.is_empty());
    }

    #[test]
    fn cancel_finds_queued_and_active() {
        let state = SyncState::default();
        let mut group = LayeredMoveGroup::new();
        group.queue(with_handle(
            LinearVelocityMove::new(Vec3::x(), -1.0, MoveMixMode::AdditiveVelocity),
            1,
            0,
        ));
        group.activate_queued(&state, &TimeStep::new(0, 0.0, 16.0));
        group.queue(with_handle(
            LinearVelocityMove::new(Vec3::y(), -1.0, MoveMixMode::AdditiveVelocity),
            2,
            0,
        ));
        assert!(group.find(LayeredMoveHandle(2)).is_some());
        assert!(group.cancel(LayeredMoveHandle(2)));
        assert!(group.cancel(LayeredMoveHandle(1)));
        assert!(!group.cancel(LayeredMoveHandle(1)));
        assert!(group.is_empty());
    }

    #[test]
    fn move_to_point_arrives_at_the_end() {
        let state = SyncState::default();
        let mut m = MoveToPointMove::new(Vec3::new(100.0, 0.0, 0.0), 1000.0);
        m.base_mut().start_sim_time_ms = 0.0;
        m.on_start(&state, &TimeStep::new(0, 0.0, 100.0));
        assert_eq!(m.start(), Some(Vec3::zeros()));

        // Halfway through, 50 units left over 500 ms.
        let mut half = SyncState::default();
        half.location = Vec3::new(50.0, 0.0, 0.0);
        let ts = TimeStep::new(5, 500.0, 100.0);
        let proposed = with_ctx(&half, &ts, |ctx| m.generate_move(ctx)).expect("active");
        assert!((proposed.linear_velocity.x - 100.0).abs() < 1.0e-3);
    }
}
