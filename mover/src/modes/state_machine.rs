//! The mode registry and the per-tick substep loop.
//!
//! One mode is current at a time. Each tick the machine applies queued requests (or evaluates
//! transitions), asks the current mode for a move, mixes in layered moves and lets the mode
//! carry it out. A mode may hand the unused part of the step to another mode, which then
//! continues the same tick.

use std::collections::BTreeMap;

use crate::collision::Vec3;
use crate::constants::{DEFAULT_MAX_SUBSTEPS, SMALL_TIME_STEP_MS};
use crate::error::{ConfigError, MoverError};
use crate::layered::{
    EffectContext, InstantMovementEffect, LayeredMove, LayeredMoveGroup, LayeredMoveHandle,
    ModifierContext, ModifierGroup, ModifierHandle, MovementModifier,
};
use crate::primitives::MovingBody;
use crate::sim::{
    BaseProvider, InputCmd, MoverEvent, ProposedMove, SharedSettings, SimBlackboard, SyncState,
    TimeStep,
};
use crate::tags::MovementTags;

use super::transition::{Transition, TransitionContext};
use super::{MoveGenContext, MovementMode, SimulationTickParams};

/// A pending request to switch modes at the next opportunity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextModeRequest {
    pub name: String,
    /// Run exit/entry even when `name` is already current.
    pub should_reenter: bool,
}

/// Inputs of one state machine tick.
pub struct StateMachineTick<'a, 'b> {
    pub time_step: TimeStep,
    pub start_state: &'a SyncState,
    pub input: &'a InputCmd,
    pub shared: &'a SharedSettings,
    pub blackboard: &'a mut SimBlackboard,
    pub mover: &'a mut MovingBody<'b>,
    pub gravity: Vec3,
    pub bases: &'a dyn BaseProvider,
}

struct ModeEntry {
    mode: Box<dyn MovementMode>,
    transitions: Vec<Box<dyn Transition>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingCancel {
    Modifier(ModifierHandle),
    LayeredMove(LayeredMoveHandle),
}

/// Registry of named modes plus the queues feeding the next tick.
pub struct ModeStateMachine {
    modes: BTreeMap<String, ModeEntry>,
    global_transitions: Vec<Box<dyn Transition>>,
    current: Option<String>,
    default_mode: Option<String>,
    queued: Option<NextModeRequest>,
    queued_layered_moves: Vec<Box<dyn LayeredMove>>,
    queued_modifiers: Vec<Box<dyn MovementModifier>>,
    queued_effects: Vec<Box<dyn InstantMovementEffect>>,
    pending_cancels: Vec<PendingCancel>,
    next_handle: u32,
    max_substeps: u32,
}

impl Default for ModeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeStateMachine")
            .field("modes", &self.modes.keys().collect::<Vec<_>>())
            .field("current", &self.current)
            .field("queued", &self.queued)
            .finish()
    }
}

impl ModeStateMachine {
    pub fn new() -> Self {
        Self {
            modes: BTreeMap::new(),
            global_transitions: Vec::new(),
            current: None,
            default_mode: None,
            queued: None,
            queued_layered_moves: Vec::new(),
            queued_modifiers: Vec::new(),
            queued_effects: Vec::new(),
            pending_cancels: Vec::new(),
            next_handle: 1,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
        }
    }

    pub fn set_max_substeps(&mut self, max_substeps: u32) {
        self.max_substeps = max_substeps.max(1);
    }

    // ---------- registry ----------

    /// Register `mode` under `name`, replacing any mode already registered there (its
    /// transitions are kept).
    pub fn add_mode(&mut self, name: impl Into<String>, mut mode: Box<dyn MovementMode>) -> Result<(), MoverError> {
        let name = name.into();
        if mode.is_abstract() {
            log::warn!("refusing to register abstract movement mode `{name}`");
            return Err(MoverError::InvalidMode(name));
        }
        mode.on_registered(&name);
        match self.modes.get_mut(&name) {
            Some(entry) => {
                entry.mode.on_unregistered();
                entry.mode = mode;
            }
            None => {
                self.modes.insert(
                    name,
                    ModeEntry {
                        mode,
                        transitions: Vec::new(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Unregister `name`. Removing the current mode leaves the machine without one until
    /// another mode is queued.
    pub fn remove_mode(&mut self, name: &str) -> bool {
        let Some(mut entry) = self.modes.remove(name) else {
            return false;
        };
        entry.mode.on_unregistered();
        if self.current.as_deref() == Some(name) {
            log::warn!("unregistered the current movement mode `{name}`; no mode is active until one is queued");
            self.current = None;
        }
        if self.queued.as_ref().is_some_and(|q| q.name == name) {
            self.queued = None;
        }
        true
    }

    pub fn has_mode(&self, name: &str) -> bool {
        self.modes.contains_key(name)
    }

    pub fn mode(&self, name: &str) -> Option<&dyn MovementMode> {
        self.modes.get(name).map(|e| e.mode.as_ref())
    }

    pub fn mode_names(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    /// Attach a transition evaluated only while `mode` is current.
    pub fn add_mode_transition(&mut self, mode: &str, transition: Box<dyn Transition>) -> bool {
        match self.modes.get_mut(mode) {
            Some(entry) => {
                entry.transitions.push(transition);
                true
            }
            None => {
                log::warn!("cannot add transition to unregistered mode `{mode}`");
                false
            }
        }
    }

    /// Attach a transition evaluated whatever the current mode.
    pub fn add_global_transition(&mut self, transition: Box<dyn Transition>) {
        self.global_transitions.push(transition);
    }

    /// Mode entered on the first tick and after a rollback to a state without one.
    pub fn set_default_mode(&mut self, name: impl Into<String>) {
        self.default_mode = Some(name.into());
    }

    pub fn default_mode(&self) -> Option<&str> {
        self.default_mode.as_deref()
    }

    // ---------- current / queued mode ----------

    pub fn current_mode_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_mode(&self) -> Option<&dyn MovementMode> {
        self.current.as_deref().and_then(|name| self.mode(name))
    }

    /// Tags of the current mode; empty without one.
    pub fn current_mode_tags(&self) -> MovementTags {
        self.current_mode().map(|m| m.tags()).unwrap_or_default()
    }

    pub fn queued_mode(&self) -> Option<&NextModeRequest> {
        self.queued.as_ref()
    }

    /// True when a tick would have a mode to run.
    pub fn has_mode_to_run(&self) -> bool {
        self.current_mode().is_some() || self.queued.is_some()
    }

    /// True when a tick starting from `start` would have a mode to run.
    pub fn can_simulate(&self, start: &SyncState) -> bool {
        self.has_mode_to_run() || start.mode_name().is_some_and(|name| self.has_mode(name))
    }

    /// Request a switch to `name` at the next opportunity. Unknown names are ignored.
    pub fn queue_next_mode(&mut self, name: &str, should_reenter: bool) -> bool {
        if !self.modes.contains_key(name) {
            log::warn!("ignoring request for unregistered movement mode `{name}`");
            return false;
        }
        self.queued = Some(NextModeRequest {
            name: name.to_owned(),
            should_reenter,
        });
        true
    }

    // ---------- layered moves, modifiers, effects ----------

    fn allocate_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        handle
    }

    /// Queue a layered move for the next tick and return its handle.
    pub fn queue_layered_move(&mut self, mut layered_move: Box<dyn LayeredMove>) -> LayeredMoveHandle {
        let handle = LayeredMoveHandle(self.allocate_handle());
        layered_move.base_mut().handle = handle;
        self.queued_layered_moves.push(layered_move);
        handle
    }

    /// Queue a modifier for the next tick and return its handle.
    pub fn queue_modifier(&mut self, mut modifier: Box<dyn MovementModifier>) -> ModifierHandle {
        let handle = ModifierHandle(self.allocate_handle());
        modifier.base_mut().handle = handle;
        self.queued_modifiers.push(modifier);
        handle
    }

    pub fn queue_instant_effect(&mut self, effect: Box<dyn InstantMovementEffect>) {
        self.queued_effects.push(effect);
    }

    /// Cancel a modifier that is still waiting here, or remember to cancel it in the state
    /// next tick.
    pub fn cancel_modifier(&mut self, handle: ModifierHandle) {
        let before = self.queued_modifiers.len();
        self.queued_modifiers.retain(|m| m.base().handle != handle);
        if before == self.queued_modifiers.len() {
            self.pending_cancels.push(PendingCancel::Modifier(handle));
        }
    }

    pub fn cancel_layered_move(&mut self, handle: LayeredMoveHandle) {
        let before = self.queued_layered_moves.len();
        self.queued_layered_moves.retain(|m| m.base().handle != handle);
        if before == self.queued_layered_moves.len() {
            self.pending_cancels.push(PendingCancel::LayeredMove(handle));
        }
    }

    pub fn find_queued_modifier(&self, handle: ModifierHandle) -> Option<&dyn MovementModifier> {
        self.queued_modifiers
            .iter()
            .find(|m| m.base().handle == handle)
            .map(|m| m.as_ref())
    }

    pub fn find_queued_layered_move(&self, handle: LayeredMoveHandle) -> Option<&dyn LayeredMove> {
        self.queued_layered_moves
            .iter()
            .find(|m| m.base().handle == handle)
            .map(|m| m.as_ref())
    }

    // ---------- validation / rollback ----------

    /// Every configuration problem, in a stable order. Empty when the machine is usable.
    pub fn validate(&self, shared: &SharedSettings) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        match self.default_mode.as_deref() {
            None => errors.push(ConfigError::NoStartingMode),
            Some(name) if !self.modes.contains_key(name) => {
                errors.push(ConfigError::StartingModeNotRegistered(name.to_owned()));
            }
            Some(_) => {}
        }
        for (name, entry) in &self.modes {
            if entry.mode.is_abstract() {
                errors.push(ConfigError::AbstractMode(name.clone()));
            }
            for kind in entry.mode.required_shared_settings() {
                if !shared.contains(kind) {
                    errors.push(ConfigError::MissingSharedSettings {
                        mode: name.clone(),
                        kind,
                    });
                }
            }
            self.check_targets(name, &entry.transitions, &mut errors);
        }
        self.check_targets("global", &self.global_transitions, &mut errors);
        errors
    }

    fn check_targets(&self, owner: &str, transitions: &[Box<dyn Transition>], errors: &mut Vec<ConfigError>) {
        for target in transitions.iter().filter_map(|t| t.target_hint()) {
            if !self.modes.contains_key(target) {
                errors.push(ConfigError::UnknownTransitionTarget {
                    owner: owner.to_owned(),
                    target: target.to_owned(),
                });
            }
        }
    }

    /// Adopt the mode of a restored state and drop everything queued for the discarded future.
    ///
    /// No activation hooks fire: the restored state already reflects the mode being active.
    pub fn on_rollback(&mut self, restored: &SyncState) {
        self.queued = None;
        self.queued_layered_moves.clear();
        self.queued_modifiers.clear();
        self.queued_effects.clear();
        self.pending_cancels.clear();

        match restored.mode_name().filter(|name| self.modes.contains_key(*name)) {
            Some(name) => self.current = Some(name.to_owned()),
            None => {
                self.current = None;
                if let Some(default) = self.default_mode.clone() {
                    self.queue_next_mode(&default, false);
                }
            }
        }
    }

    // ---------- tick ----------

    /// Proposed move of the current mode with `layered` mixed in, or `None` without a mode.
    pub fn propose_move(&self, ctx: &MoveGenContext<'_>, layered: &LayeredMoveGroup) -> Option<ProposedMove> {
        let mode = self.current_mode()?;
        Some(layered.generate(ctx, mode.generate_move(ctx)))
    }

    /// Run one tick starting from `tick.start_state` and return the produced state.
    pub fn on_simulation_tick(&mut self, tick: StateMachineTick<'_, '_>) -> SyncState {
        let StateMachineTick {
            time_step,
            start_state,
            input,
            shared,
            blackboard,
            mover,
            gravity,
            bases,
        } = tick;
        let mut out = start_state.clone();

        // The incoming state is authoritative about which mode is current.
        if let Some(name) = start_state.mode_name() {
            if self.current.as_deref() != Some(name) && self.modes.contains_key(name) {
                self.current = Some(name.to_owned());
            }
        }

        self.flush_queues(&mut out);
        self.apply_instant_effects(&time_step, &mut out, mover);

        out.layered_moves.activate_queued(start_state, &time_step);
        with_modifiers(&mut out, &time_step, |modifiers, ctx| {
            modifiers.activate_queued(ctx);
            modifiers.pre_movement(ctx);
        });

        let mut settings = shared.common();
        out.modifiers.adjust_settings(&mut settings);

        let mut sub_step = time_step;
        let mut substeps = 0u32;
        let mut preferred: Option<String> = None;
        loop {
            substeps += 1;
            match self.queued.take() {
                Some(request) => {
                    self.set_mode(&request.name, request.should_reenter, mover);
                }
                None => {
                    let ctx = TransitionContext {
                        time_step: &sub_step,
                        state: &out,
                        input,
                        current_mode: self.current.as_deref(),
                        blackboard: &*blackboard,
                    };
                    if let Some(request) = self.evaluate_transitions(&ctx) {
                        self.set_mode(&request.name, request.should_reenter, mover);
                    }
                }
            }
            out.movement_mode.clone_from(&self.current);
            let Some(mode_name) = self.current.clone() else {
                break;
            };
            let Some(entry) = self.modes.get(&mode_name) else {
                break;
            };
            mover.mode = Some(mode_name.clone());

            let substep_start = out.clone();
            let mut proposed = {
                let ctx = MoveGenContext {
                    time_step: &sub_step,
                    start_state: &substep_start,
                    input,
                    settings: &settings,
                    shared,
                    blackboard: &*blackboard,
                    gravity,
                    up: mover.up,
                };
                out.layered_moves.generate(&ctx, entry.mode.generate_move(&ctx))
            };
            if let Some(pref) = proposed.preferred_mode.take() {
                if pref != mode_name {
                    preferred = Some(pref);
                }
            }

            let mut params = SimulationTickParams {
                time_step: sub_step,
                start_state: &substep_start,
                input,
                proposed_move: proposed,
                settings: &settings,
                shared,
                blackboard: &mut *blackboard,
                mover: &mut *mover,
                gravity,
                bases,
            };
            let end = entry.mode.simulation_tick(&mut params, &mut out);

            let remaining_ms = end.remaining_ms.min(sub_step.step_ms);
            let elapsed_ms = sub_step.step_ms - remaining_ms;
            mover.record().add_delta_seconds(elapsed_ms * 0.001);

            let Some(next) = end.next_mode else {
                break;
            };
            if remaining_ms > SMALL_TIME_STEP_MS && substeps < self.max_substeps {
                log::trace!("{mode_name} hands {remaining_ms} ms to {next}");
                self.queue_next_mode(&next, false);
                sub_step = sub_step.remainder(elapsed_ms);
                continue;
            }
            // Out of time or substeps: switch now so the output names the new mode.
            if self.has_mode(&next) {
                self.set_mode(&next, false, mover);
            } else {
                log::warn!("mode `{mode_name}` requested unregistered mode `{next}`");
            }
            break;
        }
        out.movement_mode.clone_from(&self.current);

        if let Some(pref) = preferred {
            if self.queued.is_none() {
                self.queue_next_mode(&pref, false);
            }
        }

        with_modifiers(&mut out, &time_step, |modifiers, ctx| {
            modifiers.post_movement(ctx);
            let ended = modifiers.retire_finished(ctx);
            if !ended.is_empty() {
                log::trace!("modifiers ended: {ended:?}");
            }
        });
        let retired = out.layered_moves.retire_finished(time_step.end_time_ms());
        if !retired.is_empty() {
            log::trace!("layered moves finished: {retired:?}");
        }
        out
    }

    fn flush_queues(&mut self, out: &mut SyncState) {
        for cancel in self.pending_cancels.drain(..) {
            match cancel {
                PendingCancel::Modifier(handle) => {
                    out.modifiers.cancel(handle);
                }
                PendingCancel::LayeredMove(handle) => {
                    out.layered_moves.cancel(handle);
                }
            }
        }
        for layered_move in self.queued_layered_moves.drain(..) {
            out.layered_moves.queue(layered_move);
        }
        for modifier in self.queued_modifiers.drain(..) {
            out.modifiers.queue(modifier);
        }
    }

    fn apply_instant_effects(&mut self, time_step: &TimeStep, out: &mut SyncState, mover: &mut MovingBody<'_>) {
        if self.queued_effects.is_empty() {
            return;
        }
        let before = out.transform();
        let mut next_mode = None;
        for mut effect in std::mem::take(&mut self.queued_effects) {
            let mut ctx = EffectContext {
                time_step,
                state: &mut *out,
                backend: mover.backend(),
                shape: mover.shape,
                channel: mover.channel,
                up: mover.up,
                next_mode: None,
            };
            let applied = effect.apply(&mut ctx);
            if ctx.next_mode.is_some() {
                next_mode = ctx.next_mode;
            }
            log::debug!("instant effect {} applied: {applied}", effect.type_name());
        }
        if out.transform() != before {
            mover.teleport(out.location, out.orientation);
        }
        if let Some(name) = next_mode {
            self.queue_next_mode(&name, false);
        }
    }

    fn evaluate_transitions(&self, ctx: &TransitionContext<'_>) -> Option<NextModeRequest> {
        let local = self
            .current
            .as_deref()
            .and_then(|name| self.modes.get(name))
            .map(|entry| entry.transitions.as_slice())
            .unwrap_or_default();

        for transition in local.iter().chain(self.global_transitions.iter()) {
            let Some(target) = transition.evaluate(ctx) else {
                continue;
            };
            let reenter = transition.allow_mode_reentry();
            if ctx.current_mode == Some(target.as_str()) && !reenter {
                continue;
            }
            if !self.modes.contains_key(&target) {
                log::warn!("transition targets unregistered mode `{target}`");
                continue;
            }
            transition.on_trigger(ctx);
            return Some(NextModeRequest {
                name: target,
                should_reenter: reenter,
            });
        }
        None
    }

    /// Make `name` current, firing exit/entry hooks and a mode-changed event.
    fn set_mode(&mut self, name: &str, should_reenter: bool, mover: &mut MovingBody<'_>) -> bool {
        if !self.modes.contains_key(name) {
            log::warn!("cannot switch to unregistered movement mode `{name}`");
            return false;
        }
        if self.current.as_deref() == Some(name) && !should_reenter {
            return false;
        }
        let previous = self.current.take();
        if let Some(old) = previous.as_deref().and_then(|p| self.modes.get_mut(p)) {
            old.mode.on_deactivate();
        }
        if let Some(new) = self.modes.get_mut(name) {
            new.mode.on_activate();
        }
        self.current = Some(name.to_owned());
        mover.mode = self.current.clone();
        log::debug!("movement mode {previous:?} -> {name}");
        mover.push_event(MoverEvent::ModeChanged {
            previous,
            new: self.current.clone(),
        });
        true
    }
}

/// Run `f` on the modifiers of `out` with a context viewing the rest of `out`.
fn with_modifiers(
    out: &mut SyncState,
    time_step: &TimeStep,
    f: impl FnOnce(&mut ModifierGroup, &ModifierContext<'_>),
) {
    let mut modifiers = std::mem::take(&mut out.modifiers);
    let ctx = ModifierContext {
        time_step,
        state: &*out,
    };
    f(&mut modifiers, &ctx);
    out.modifiers = modifiers;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionShape, StaticEntry, StaticShape, StaticWorld, Transform};
    use crate::constants::default_gravity;
    use crate::layered::{LinearVelocityMove, SpeedScaleModifier};
    use crate::modes::{
        ConditionTransition, FALLING, FLYING, FallingMode, FlyingMode, MovementEndState, WALKING, WalkingMode,
    };
    use crate::primitives::{AgentBody, MovementRecord};
    use crate::sim::{MoveMixMode, NoBases};
    use crate::tags::CollisionChannel;

    const STAND_Z: f32 = 90.05;

    fn floor_world() -> StaticWorld {
        StaticWorld::new(vec![StaticEntry::solid(
            1,
            StaticShape::Plane {
                normal: Vec3::z(),
                dist: 0.0,
            },
        )])
    }

    fn machine() -> ModeStateMachine {
        let mut fsm = ModeStateMachine::new();
        fsm.add_mode(WALKING, Box::new(WalkingMode)).unwrap();
        fsm.add_mode(FALLING, Box::new(FallingMode)).unwrap();
        fsm.add_mode(FLYING, Box::new(FlyingMode)).unwrap();
        fsm.set_default_mode(WALKING);
        fsm
    }

    struct Ticked {
        state: SyncState,
        events: Vec<MoverEvent>,
        record: MovementRecord,
    }

    fn tick(fsm: &mut ModeStateMachine, world: &StaticWorld, start: &SyncState, input: &InputCmd, frame: i64) -> Ticked {
        let shared = SharedSettings::with_common_defaults();
        let mut bb = SimBlackboard::new();
        let mut body = AgentBody::new(start.transform());
        let mut record = MovementRecord::new();
        let mut events = Vec::new();
        let state = {
            let mut mover = MovingBody::new(
                world,
                &mut body,
                &mut record,
                &mut events,
                CollisionShape::capsule(30.0, 60.0),
                CollisionChannel::Pawn,
                Vec3::z(),
            );
            fsm.on_simulation_tick(StateMachineTick {
                time_step: TimeStep::new(frame, frame as f64 * 16.0, 16.0),
                start_state: start,
                input,
                shared: &shared,
                blackboard: &mut bb,
                mover: &mut mover,
                gravity: default_gravity(),
                bases: &NoBases,
            })
        };
        Ticked { state, events, record }
    }

    fn mode_changes(events: &[MoverEvent]) -> Vec<(Option<String>, Option<String>)> {
        events
            .iter()
            .filter_map(|e| match e {
                MoverEvent::ModeChanged { previous, new } => Some((previous.clone(), new.clone())),
                _ => None,
            })
            .collect()
    }

    #[derive(Debug)]
    struct Template;

    impl MovementMode for Template {
        fn generate_move(&self, _ctx: &MoveGenContext<'_>) -> ProposedMove {
            ProposedMove::default()
        }

        fn simulation_tick(
            &self,
            _params: &mut SimulationTickParams<'_, '_>,
            _out: &mut SyncState,
        ) -> MovementEndState {
            MovementEndState::done()
        }

        fn is_abstract(&self) -> bool {
            true
        }
    }

    #[test]
    fn abstract_modes_are_rejected() {
        let mut fsm = machine();
        assert!(matches!(fsm.add_mode("Template", Box::new(Template)), Err(MoverError::InvalidMode(_))));
        assert!(!fsm.has_mode("Template"));
    }

    #[test]
    fn unknown_queued_mode_is_ignored() {
        let mut fsm = machine();
        assert!(!fsm.queue_next_mode("Swimming", false));
        assert!(fsm.queued_mode().is_none());
    }

    #[test]
    fn first_tick_enters_the_queued_mode_once() {
        let world = floor_world();
        let mut fsm = machine();
        fsm.queue_next_mode(WALKING, false);
        let start = SyncState::from_transform(Transform::from_translation(Vec3::new(0.0, 0.0, STAND_Z)));

        let t = tick(&mut fsm, &world, &start, &InputCmd::default(), 0);
        assert_eq!(t.state.mode_name(), Some(WALKING));
        assert_eq!(mode_changes(&t.events), vec![(None, Some(WALKING.to_owned()))]);

        let t = tick(&mut fsm, &world, &t.state, &InputCmd::default(), 1);
        assert!(mode_changes(&t.events).is_empty());
        assert_eq!(fsm.current_mode_name(), Some(WALKING));
    }

    #[test]
    fn falling_lands_and_walks_within_the_same_tick() {
        let world = floor_world();
        let mut fsm = machine();
        let mut start = SyncState::from_transform(Transform::from_translation(Vec3::new(0.0, 0.0, STAND_Z + 2.0)));
        start.movement_mode = Some(FALLING.to_owned());
        start.velocity = Vec3::new(0.0, 0.0, -400.0);

        let t = tick(&mut fsm, &world, &start, &InputCmd::default(), 0);
        assert_eq!(t.state.mode_name(), Some(WALKING));
        assert_eq!(
            mode_changes(&t.events),
            vec![(Some(FALLING.to_owned()), Some(WALKING.to_owned()))]
        );
        assert!(t.state.velocity.z.abs() < 1.0e-3);
        assert!((t.record.total_delta_seconds() - 0.016).abs() < 1.0e-4);
    }

    #[test]
    fn walking_off_a_ledge_falls() {
        let world = StaticWorld::new(Vec::new());
        let mut fsm = machine();
        let mut start = SyncState::from_transform(Transform::from_translation(Vec3::new(0.0, 0.0, STAND_Z)));
        start.movement_mode = Some(WALKING.to_owned());

        let t = tick(&mut fsm, &world, &start, &InputCmd::default(), 0);
        assert_eq!(t.state.mode_name(), Some(FALLING));
    }

    #[test]
    fn transitions_switch_modes_and_skip_reentry() {
        let world = floor_world();
        let mut fsm = machine();
        fsm.add_global_transition(Box::new(ConditionTransition::new(FLYING, |ctx| ctx.input.is_jump_pressed)));
        let mut start = SyncState::from_transform(Transform::from_translation(Vec3::new(0.0, 0.0, STAND_Z)));
        start.movement_mode = Some(WALKING.to_owned());
        let mut input = InputCmd::default();
        input.is_jump_pressed = true;

        let t = tick(&mut fsm, &world, &start, &input, 0);
        assert_eq!(t.state.mode_name(), Some(FLYING));

        // Already flying: the same transition does not fire again.
        let t = tick(&mut fsm, &world, &t.state, &input, 1);
        assert!(mode_changes(&t.events).is_empty());
    }

    #[test]
    fn reentry_fires_hooks_again() {
        let world = floor_world();
        let mut fsm = machine();
        let mut start = SyncState::from_transform(Transform::from_translation(Vec3::new(0.0, 0.0, STAND_Z)));
        start.movement_mode = Some(WALKING.to_owned());
        fsm.queue_next_mode(WALKING, true);

        let t = tick(&mut fsm, &world, &start, &InputCmd::default(), 0);
        assert_eq!(
            mode_changes(&t.events),
            vec![(Some(WALKING.to_owned()), Some(WALKING.to_owned()))]
        );
    }

    #[test]
    fn removing_the_current_mode_leaves_none() {
        let mut fsm = machine();
        fsm.queue_next_mode(FLYING, false);
        let world = floor_world();
        let start = SyncState::from_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 200.0)));
        tick(&mut fsm, &world, &start, &InputCmd::default(), 0);
        assert_eq!(fsm.current_mode_name(), Some(FLYING));

        assert!(fsm.remove_mode(FLYING));
        assert_eq!(fsm.current_mode_name(), None);
        assert!(!fsm.has_mode_to_run());
    }

    #[test]
    fn queued_layers_activate_next_tick_and_rollback_drops_them() {
        let world = floor_world();
        let mut fsm = machine();
        let mut start = SyncState::from_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 200.0)));
        start.movement_mode = Some(FLYING.to_owned());

        let lm = fsm.queue_layered_move(Box::new(LinearVelocityMove::new(
            Vec3::new(100.0, 0.0, 0.0),
            32.0,
            MoveMixMode::OverrideVelocity,
        )));
        let modifier = fsm.queue_modifier(Box::new(SpeedScaleModifier::new(0.5, -1.0)));
        assert_ne!(lm.0, modifier.0);
        assert!(fsm.find_queued_modifier(modifier).is_some());

        let t = tick(&mut fsm, &world, &start, &InputCmd::default(), 0);
        assert!(t.state.layered_moves.find(lm).is_some());
        assert!(t.state.modifiers.find(modifier).is_some());
        assert!((t.state.location.x - 1.6).abs() < 1.0e-3);

        fsm.queue_modifier(Box::new(SpeedScaleModifier::new(2.0, -1.0)));
        fsm.queue_next_mode(WALKING, false);
        fsm.on_rollback(&start);
        assert!(fsm.queued_mode().is_none());
        assert_eq!(fsm.current_mode_name(), Some(FLYING));
        let t = tick(&mut fsm, &world, &start, &InputCmd::default(), 0);
        assert!(t.state.modifiers.is_empty());
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut fsm = ModeStateMachine::new();
        fsm.add_mode(WALKING, Box::new(WalkingMode)).unwrap();
        fsm.add_global_transition(Box::new(ConditionTransition::new("Swimming", |_| false)));
        fsm.set_default_mode("Gliding");

        let errors = fsm.validate(&SharedSettings::new());
        assert!(errors.contains(&ConfigError::StartingModeNotRegistered("Gliding".into())));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::MissingSharedSettings { .. })));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownTransitionTarget { .. })));

        let ok = machine();
        assert!(ok.validate(&SharedSettings::with_common_defaults()).is_empty());
    }
}
