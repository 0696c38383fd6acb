use std::any::Any;
use std::fmt::Debug;

use crate::hash::{Digest, StateHasher};
use crate::sim::{CommonMovementSettings, SyncState, TimeStep};
use crate::tags::{MovementTag, MovementTags};

/// Stable external reference to a queued or active modifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModifierHandle(pub u32);

/// What a modifier hook gets to look at.
#[derive(Clone, Copy, Debug)]
pub struct ModifierContext<'a> {
    pub time_step: &'a TimeStep,
    /// State being produced by the current tick.
    pub state: &'a SyncState,
}

/// State every modifier carries.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifierBase {
    pub handle: ModifierHandle,
    /// Negative for a modifier that lasts until cancelled.
    pub duration_ms: f32,
    pub start_sim_time_ms: f64,
    pub tags: MovementTags,
    cancelled: bool,
}

impl Default for ModifierBase {
    fn default() -> Self {
        Self {
            handle: ModifierHandle::default(),
            duration_ms: -1.0,
            start_sim_time_ms: -1.0,
            tags: MovementTags::default(),
            cancelled: false,
        }
    }
}

impl ModifierBase {
    pub fn new(duration_ms: f32) -> Self {
        Self {
            duration_ms,
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: MovementTag) -> Self {
        self.tags.add(tag);
        self
    }

    /// Flag for removal at the end of the next tick.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_finished(&self, now_ms: f64) -> bool {
        if self.cancelled {
            return true;
        }
        self.duration_ms >= 0.0
            && self.start_sim_time_ms >= 0.0
            && now_ms >= self.start_sim_time_ms + f64::from(self.duration_ms)
    }

    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.handle.0);
        hasher.update_f32(self.duration_ms);
        hasher.update_f64(self.start_sim_time_ms);
        hasher.update_u64(self.tags.bits);
        hasher.update_bool(self.cancelled);
    }
}

/// A persistent change to the movement rules, such as a speed multiplier.
///
/// Modifiers change rules by editing the per-tick copy of the movement settings in
/// [`adjust_settings`](MovementModifier::adjust_settings).
pub trait MovementModifier: Debug + Send + Sync {
    fn base(&self) -> &ModifierBase;
    fn base_mut(&mut self) -> &mut ModifierBase;

    fn on_start(&mut self, _ctx: &ModifierContext<'_>) {}
    fn on_pre_movement(&mut self, _ctx: &ModifierContext<'_>) {}
    fn on_post_movement(&mut self, _ctx: &ModifierContext<'_>) {}
    fn on_end(&mut self, _ctx: &ModifierContext<'_>) {}

    fn adjust_settings(&self, _settings: &mut CommonMovementSettings) {}

    fn is_finished(&self, now_ms: f64) -> bool {
        self.base().is_finished(now_ms)
    }

    fn type_name(&self) -> &'static str;

    fn clone_box(&self) -> Box<dyn MovementModifier>;

    /// Feed the modifier's identifying content (not its timing) into `hasher`.
    fn hash_content(&self, _hasher: &mut StateHasher) {}

    /// Structural identity used to recognise "the same modifier" across states.
    fn match_key(&self) -> Digest {
        let mut hasher = StateHasher::new();
        hasher.update_str(self.type_name());
        hasher.update_u64(self.base().tags.bits);
        self.hash_content(&mut hasher);
        hasher.finalize()
    }

    fn matches(&self, other: &dyn MovementModifier) -> bool {
        self.match_key() == other.match_key()
    }

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn MovementModifier> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Scales max speed and acceleration.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeedScaleModifier {
    pub base: ModifierBase,
    pub scale: f32,
}

impl SpeedScaleModifier {
    pub fn new(scale: f32, duration_ms: f32) -> Self {
        Self {
            base: ModifierBase::new(duration_ms).with_tag(MovementTag::SpeedModified),
            scale: scale.max(0.0),
        }
    }
}

impl MovementModifier for SpeedScaleModifier {
    fn base(&self) -> &ModifierBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModifierBase {
        &mut self.base
    }

    fn adjust_settings(&self, settings: &mut CommonMovementSettings) {
        settings.max_speed *= self.scale;
        settings.acceleration *= self.scale;
    }

    fn type_name(&self) -> &'static str {
        "SpeedScaleModifier"
    }

    fn clone_box(&self) -> Box<dyn MovementModifier> {
        Box::new(self.clone())
    }

    fn hash_content(&self, hasher: &mut StateHasher) {
        hasher.update_f32(self.scale);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Queued and active modifiers of one sync state.
#[derive(Clone, Debug, Default)]
pub struct ModifierGroup {
    active: Vec<Box<dyn MovementModifier>>,
    queued: Vec<Box<dyn MovementModifier>>,
}

impl ModifierGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, modifier: Box<dyn MovementModifier>) {
        self.queued.push(modifier);
    }

    pub fn active(&self) -> &[Box<dyn MovementModifier>] {
        &self.active
    }

    pub fn queued(&self) -> &[Box<dyn MovementModifier>] {
        &self.queued
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.queued.is_empty()
    }

    /// Promote queued modifiers to active and fire their `on_start`.
    pub fn activate_queued(&mut self, ctx: &ModifierContext<'_>) -> usize {
        let count = self.queued.len();
        for mut modifier in self.queued.drain(..) {
            modifier.base_mut().start_sim_time_ms = ctx.time_step.base_sim_time_ms;
            modifier.on_start(ctx);
            self.active.push(modifier);
        }
        count
    }

    pub fn pre_movement(&mut self, ctx: &ModifierContext<'_>) {
        for m in &mut self.active {
            m.on_pre_movement(ctx);
        }
    }

    pub fn post_movement(&mut self, ctx: &ModifierContext<'_>) {
        for m in &mut self.active {
            m.on_post_movement(ctx);
        }
    }

    /// Apply every active modifier to `settings`, in activation order.
    pub fn adjust_settings(&self, settings: &mut CommonMovementSettings) {
        for m in &self.active {
            m.adjust_settings(settings);
        }
    }

    /// Remove finished (or cancelled) modifiers, firing `on_end` for each.
    pub fn retire_finished(&mut self, ctx: &ModifierContext<'_>) -> Vec<ModifierHandle> {
        let now = ctx.time_step.end_time_ms();
        let mut retired = Vec::new();
        let mut kept = Vec::with_capacity(self.active.len());
        for mut m in self.active.drain(..) {
            if m.is_finished(now) {
                m.on_end(ctx);
                retired.push(m.base().handle);
            } else {
                kept.push(m);
            }
        }
        self.active = kept;
        retired
    }

    /// Cancel by handle: queued modifiers are dropped outright, active ones are flagged and
    /// end (with `on_end`) at the next retirement.
    pub fn cancel(&mut self, handle: ModifierHandle) -> bool {
        let queued_before = self.queued.len();
        self.queued.retain(|m| m.base().handle != handle);
        if self.queued.len() != queued_before {
            return true;
        }
        match self.active.iter_mut().find(|m| m.base().handle == handle) {
            Some(m) => {
                m.base_mut().cancel();
                true
            }
            None => false,
        }
    }

    /// Active first, then queued.
    pub fn find(&self, handle: ModifierHandle) -> Option<&dyn MovementModifier> {
        self.active
            .iter()
            .chain(self.queued.iter())
            .find(|m| m.base().handle == handle)
            .map(|m| m.as_ref())
    }

    pub fn find_by_type<T: MovementModifier + 'static>(&self) -> Option<&T> {
        self.active
            .iter()
            .chain(self.queued.iter())
            .find_map(|m| m.as_any().downcast_ref::<T>())
    }

    pub fn has_tag(&self, tag: MovementTag) -> bool {
        self.active.iter().any(|m| m.base().tags.has(tag))
    }

    pub fn clear_queued(&mut self) {
        self.queued.clear();
    }

    pub(crate) fn active_mut(&mut self) -> &mut Vec<Box<dyn MovementModifier>> {
        &mut self.active
    }

    pub fn hash_into(&self, hasher: &mut StateHasher) {
        for list in [&self.active, &self.queued] {
            hasher.update_u64(list.len() as u64);
            for m in list {
                hasher.update_bytes(&m.match_key());
                m.base().hash_into(hasher);
            }
        }
    }
}
