/*!
The per-agent simulation driver.

`Mover` owns everything one agent needs between ticks: the mode state machine, the agent
body, the double-buffered published state, the blackboard and the observers. The network or
time layer calls [`Mover::simulation_tick`], [`Mover::rollback`] and [`Mover::finalize`]
at times of its choosing.

- builder:       assembling a mover and validating its configuration
- double_buffer: readable/writable state slots
- trajectory:    collision-free prediction of future states
- proxy:         modifier hooks for interpolated remote agents
*/

pub mod builder;
pub mod double_buffer;
pub mod proxy;
pub mod trajectory;

pub use builder::MoverBuilder;
pub use double_buffer::{DoubleBuffer, FrameState};
pub use proxy::{ProxyModifierChanges, sync_proxy_modifiers};
pub use trajectory::{MAX_TRAJECTORY_SAMPLES, TrajectorySample};

use std::any::Any;
use std::sync::Arc;
use std::thread::ThreadId;

use crate::collision::{CollisionBackend, CollisionShape, Quat, Transform, Vec3};
use crate::config::MoverConfig;
use crate::constants::{LOCATION_TOLERANCE, OUT_OF_BAND_TOLERANCE, ROTATOR_TOLERANCE};
use crate::error::{ConfigError, MoverError};
use crate::layered::{
    InstantMovementEffect, LayeredMove, LayeredMoveHandle, ModifierHandle, MoveTypeRegistry,
    MovementModifier,
};
use crate::modes::{
    ModeStateMachine, MovementMode, StateMachineTick, Transition, integrate_rotation, turn_toward,
};
use crate::primitives::{
    AgentBody, FloorResult, MovementRecord, MovingBody, PlanarConstraint, up_from_gravity,
};
use crate::sim::{
    AuxState, BaseProvider, DataPersistence, EventDispatcher, InputCmd, InputProducer,
    InvalidationReason, LAST_FLOOR_RESULT, MovementBase, MoverEvent, ObserverId, SharedSettings,
    SimBlackboard, SyncBlock, SyncState, TimeStep,
};
use crate::tags::{CollisionChannel, MovementTag, MovementTags};

/// Inputs of one tick.
#[derive(Clone, Debug, Default)]
pub struct TickStartData {
    pub input: InputCmd,
    pub sync: SyncState,
    pub aux: AuxState,
}

/// Outputs of one tick.
#[derive(Clone, Debug)]
pub struct TickEndData {
    pub sync: SyncState,
    pub aux: AuxState,
    pub move_record: MovementRecord,
    /// Everything raised during the tick, in occurrence order.
    pub events: Vec<MoverEvent>,
}

/// Simulation driver for one agent.
pub struct Mover {
    config: MoverConfig,
    fsm: ModeStateMachine,
    shared: SharedSettings,
    registry: MoveTypeRegistry,
    backend: Arc<dyn CollisionBackend>,
    bases: Arc<dyn BaseProvider>,
    shape: CollisionShape,
    channel: CollisionChannel,
    gravity: Vec3,
    planar: Option<PlanarConstraint>,
    body: AgentBody,
    buffer: DoubleBuffer<FrameState>,
    blackboard: SimBlackboard,
    dispatcher: EventDispatcher,
    persistence: Vec<DataPersistence>,
    input_producer: Option<Box<dyn InputProducer>>,
    external_tags: MovementTags,
    simulation_enabled: bool,
    has_rolled_back: bool,
    warned_no_mode: bool,
    newest_time_step: TimeStep,
    last_time_step: TimeStep,
    last_input: InputCmd,
    last_produced_input: Option<InputCmd>,
    owner_thread: ThreadId,
}

impl std::fmt::Debug for Mover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mover")
            .field("mode", &self.fsm.current_mode_name())
            .field("location", &self.body.location())
            .field("simulation_enabled", &self.simulation_enabled)
            .field("newest_time_step", &self.newest_time_step)
            .finish()
    }
}

impl Mover {
    // ---------- tick ----------

    /// Advance the agent by one step.
    ///
    /// Never fails: without a usable mode the tick echoes its input state.
    pub fn simulation_tick(&mut self, time_step: &TimeStep, start: &TickStartData) -> TickEndData {
        let mut time_step = *time_step;
        time_step.is_resimulating = !self.newest_time_step.is_unset()
            && time_step.base_sim_time_ms <= self.newest_time_step.base_sim_time_ms;

        let mut events = Vec::new();
        if std::mem::take(&mut self.has_rolled_back) {
            events.push(MoverEvent::PostRollback {
                time_step,
                prior_time_step: self.last_time_step,
            });
        }
        events.push(MoverEvent::PreSimulationTick(time_step));
        let mut record = MovementRecord::new();

        if !self.simulation_enabled || !self.fsm.can_simulate(&start.sync) {
            if !self.warned_no_mode {
                log::warn!("mover has no usable movement mode; ticks leave the state unchanged");
                self.warned_no_mode = true;
            }
            events.push(MoverEvent::PostSimulationTick(time_step));
            return self.finish_tick(time_step, &start.input, start.sync.clone(), start.aux.clone(), record, events);
        }

        let mut sync_in = start.sync.clone();
        self.follow_base(&mut sync_in);

        if !sync_in.is_based() {
            let drift = (self.body.location() - sync_in.location).norm();
            if drift > OUT_OF_BAND_TOLERANCE {
                log::warn!(
                    "agent moved outside the simulation by {drift:.3} units before frame {}",
                    time_step.server_frame
                );
            }
        }
        self.body.set_transform(sync_in.transform());

        for persistence in &self.persistence {
            sync_in.data.add_boxed(persistence.propagate(&start.sync.data));
        }

        if let Some(suggested) = start.input.suggested_mode.as_deref() {
            if sync_in.mode_name() != Some(suggested) {
                self.fsm.queue_next_mode(suggested, false);
            }
        }

        events.push(MoverEvent::PreMovement(time_step));

        let deferred = self.config.use_deferred_group_movement && std::thread::current().id() == self.owner_thread;
        if deferred {
            self.body.begin_deferred();
        }
        let up = up_from_gravity(self.gravity);
        let out = {
            let mut mover = MovingBody::new(
                &*self.backend,
                &mut self.body,
                &mut record,
                &mut events,
                self.shape,
                self.channel,
                up,
            )
            .with_planar(self.planar);
            self.fsm.on_simulation_tick(StateMachineTick {
                time_step,
                start_state: &sync_in,
                input: &start.input,
                shared: &self.shared,
                blackboard: &mut self.blackboard,
                mover: &mut mover,
                gravity: self.gravity,
                bases: &*self.bases,
            })
        };
        if deferred {
            self.body.end_deferred();
        }

        if self.config.warn_on_post_sim_difference {
            let diff = (self.body.location() - out.location).norm();
            if diff > LOCATION_TOLERANCE {
                log::warn!(
                    "frame {}: written state is {diff:.4} units away from the agent transform",
                    time_step.server_frame
                );
            }
        }

        log::trace!(
            "frame {} [{}]: {} substeps, moved {:?}",
            time_step.server_frame,
            out.mode_name().unwrap_or("-"),
            record.substeps().len(),
            record.total_move_delta()
        );

        events.push(MoverEvent::PostMovement(time_step));
        events.push(MoverEvent::PostSimulationTick(time_step));
        self.finish_tick(time_step, &start.input, out, start.aux.clone(), record, events)
    }

    fn finish_tick(
        &mut self,
        time_step: TimeStep,
        input: &InputCmd,
        sync: SyncState,
        aux: AuxState,
        move_record: MovementRecord,
        events: Vec<MoverEvent>,
    ) -> TickEndData {
        if time_step.server_frame > self.newest_time_step.server_frame
            || time_step.base_sim_time_ms > self.newest_time_step.base_sim_time_ms
        {
            self.newest_time_step = time_step;
        }
        self.last_time_step = time_step;
        self.last_input = input.clone();
        self.buffer.publish(FrameState {
            sync: sync.clone(),
            aux: aux.clone(),
        });
        self.dispatcher.dispatch(&events);
        TickEndData {
            sync,
            aux,
            move_record,
            events,
        }
    }

    /// Move a based state along with its base.
    fn follow_base(&self, state: &mut SyncState) {
        let Some(base) = &state.movement_base else {
            return;
        };
        match self.bases.base_transform(base.base_id, base.bone.as_deref()) {
            Some(base_transform) => {
                let (location, orientation) = base.world_pose(&base_transform);
                state.location = location;
                state.orientation = orientation;
            }
            None => log::debug!("movement base {} is unknown; keeping the world pose", base.base_id),
        }
    }

    // ---------- rollback / finalize ----------

    /// Replace the current state with an authoritative older one.
    ///
    /// The next tick reports itself as the first tick after a rollback.
    pub fn rollback(&mut self, old_state: &SyncState, new_state: &SyncState, new_aux: &AuxState) {
        self.dispatcher.dispatch(&[MoverEvent::PreRollback {
            discarded: Box::new(old_state.clone()),
            restoring: Box::new(new_state.clone()),
        }]);

        let mut restored = new_state.clone();
        self.follow_base(&mut restored);
        self.buffer.publish(FrameState {
            sync: restored.clone(),
            aux: new_aux.clone(),
        });
        self.body.set_transform(restored.transform());
        self.blackboard.invalidate(InvalidationReason::Rollback);
        self.fsm.on_rollback(&restored);
        self.has_rolled_back = true;
        log::debug!(
            "rolled back to {:?} in mode {:?}",
            restored.location,
            restored.mode_name()
        );
    }

    /// Accept a tick's result as final, re-applying its transform only on material drift.
    pub fn finalize(&mut self, state: &SyncState, aux: &AuxState) {
        let actual = self.body.transform();
        let moved = (actual.translation - state.location).norm() > LOCATION_TOLERANCE;
        let turned = actual.rotation.angle_to(&state.orientation) > ROTATOR_TOLERANCE;
        if moved || turned {
            log::trace!("finalize re-applies the state transform");
            self.body.set_transform(state.transform());
        }
        let published = self.buffer.readable();
        if published.sync.digest() != state.digest() {
            self.buffer.publish(FrameState {
                sync: state.clone(),
                aux: aux.clone(),
            });
        }
        self.dispatcher.dispatch(&[MoverEvent::PostFinalize]);
    }

    // ---------- input ----------

    /// Ask the input producer for a command and remember it.
    pub fn produce_input(&mut self, delta_time_ms: f32) -> InputCmd {
        let cmd = match self.input_producer.as_mut() {
            Some(producer) => producer.produce_input(delta_time_ms),
            None => InputCmd::default(),
        };
        self.last_produced_input = Some(cmd.clone());
        cmd
    }

    pub fn set_input_producer(&mut self, producer: impl InputProducer + 'static) {
        self.input_producer = Some(Box::new(producer));
    }

    pub fn last_produced_input(&self) -> Option<&InputCmd> {
        self.last_produced_input.as_ref()
    }

    // ---------- readers ----------

    pub fn frame_state(&self) -> &FrameState {
        self.buffer.readable()
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.buffer.readable().sync
    }

    pub fn aux_state(&self) -> &AuxState {
        &self.buffer.readable().aux
    }

    pub fn movement_mode_name(&self) -> Option<&str> {
        self.sync_state().mode_name()
    }

    pub fn velocity(&self) -> Vec3 {
        self.sync_state().velocity
    }

    pub fn movement_intent(&self) -> Vec3 {
        self.sync_state().move_direction_intent
    }

    pub fn movement_base(&self) -> Option<&MovementBase> {
        self.sync_state().movement_base.as_ref()
    }

    /// Orientation the agent is turning toward: the last input's orientation intent, else the
    /// current orientation.
    pub fn target_orientation(&self) -> Quat {
        let current = self.sync_state().orientation;
        let up = up_from_gravity(self.gravity);
        let Some(intent) = self.last_input.orientation_intent else {
            return current;
        };
        // An unlimited turn rate over one second lands exactly on the intent.
        integrate_rotation(current, turn_toward(current, Some(intent), up, -1.0, 1.0), 1.0)
    }

    pub fn last_input(&self) -> &InputCmd {
        &self.last_input
    }

    pub fn last_time_step(&self) -> TimeStep {
        self.last_time_step
    }

    /// Newest time step processed so far; only moves forward.
    pub fn newest_time_step(&self) -> TimeStep {
        self.newest_time_step
    }

    pub fn last_floor_result(&self) -> Option<FloorResult> {
        self.blackboard.get::<FloorResult>(LAST_FLOOR_RESULT).copied()
    }

    pub fn find_sync_data<T: SyncBlock>(&self) -> Option<&T> {
        self.sync_state().data.find::<T>()
    }

    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    pub fn body(&self) -> &AgentBody {
        &self.body
    }

    pub fn transform(&self) -> Transform {
        self.body.transform()
    }

    pub fn is_simulation_enabled(&self) -> bool {
        self.simulation_enabled
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn state_machine(&self) -> &ModeStateMachine {
        &self.fsm
    }

    pub fn shared_settings(&self) -> &SharedSettings {
        &self.shared
    }

    pub fn shared_settings_mut(&mut self) -> &mut SharedSettings {
        &mut self.shared
    }

    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let errors = self.fsm.validate(&self.shared);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    // ---------- tags ----------

    /// True when the agent, its current mode, an active modifier or an active layered move
    /// carries `tag`.
    pub fn has_tag(&self, tag: MovementTag) -> bool {
        let state = self.sync_state();
        self.external_tags.has(tag)
            || self.fsm.current_mode_tags().has(tag)
            || state.modifiers.has_tag(tag)
            || state.layered_moves.has_tag(tag)
    }

    pub fn add_tag(&mut self, tag: MovementTag) {
        self.external_tags.add(tag);
    }

    pub fn remove_tag(&mut self, tag: MovementTag) {
        self.external_tags.remove(tag);
    }

    // ---------- modes ----------

    pub fn add_mode(&mut self, name: impl Into<String>, mode: Box<dyn MovementMode>) -> Result<(), MoverError> {
        self.fsm.add_mode(name, mode)
    }

    pub fn remove_mode(&mut self, name: &str) -> bool {
        self.fsm.remove_mode(name)
    }

    pub fn add_mode_transition(&mut self, mode: &str, transition: Box<dyn Transition>) -> bool {
        self.fsm.add_mode_transition(mode, transition)
    }

    pub fn add_global_transition(&mut self, transition: Box<dyn Transition>) {
        self.fsm.add_global_transition(transition);
    }

    pub fn queue_next_mode(&mut self, name: &str, should_reenter: bool) -> bool {
        self.fsm.queue_next_mode(name, should_reenter)
    }

    // ---------- layered moves, modifiers, effects ----------

    pub fn queue_layered_move(&mut self, layered_move: Box<dyn LayeredMove>) -> LayeredMoveHandle {
        self.fsm.queue_layered_move(layered_move)
    }

    pub fn queue_movement_modifier(&mut self, modifier: Box<dyn MovementModifier>) -> ModifierHandle {
        self.fsm.queue_modifier(modifier)
    }

    pub fn queue_instant_effect(&mut self, effect: Box<dyn InstantMovementEffect>) {
        self.fsm.queue_instant_effect(effect);
    }

    /// Queue a layered move from a type-erased payload registered under `type_name`.
    ///
    /// Nothing is queued when the payload does not match.
    pub fn queue_layered_move_dynamic(&mut self, type_name: &str, payload: &dyn Any) -> Result<LayeredMoveHandle, MoverError> {
        let layered_move = self.registry.make_layered_move(type_name, payload)?;
        Ok(self.fsm.queue_layered_move(layered_move))
    }

    /// Queue a modifier from a type-erased payload registered under `type_name`.
    pub fn queue_movement_modifier_dynamic(&mut self, type_name: &str, payload: &dyn Any) -> Result<ModifierHandle, MoverError> {
        let modifier = self.registry.make_modifier(type_name, payload)?;
        Ok(self.fsm.queue_modifier(modifier))
    }

    pub fn registry_mut(&mut self) -> &mut MoveTypeRegistry {
        &mut self.registry
    }

    pub fn cancel_modifier(&mut self, handle: ModifierHandle) {
        self.fsm.cancel_modifier(handle);
    }

    pub fn cancel_layered_move(&mut self, handle: LayeredMoveHandle) {
        self.fsm.cancel_layered_move(handle);
    }

    /// Active or queued modifier with `handle`.
    pub fn find_movement_modifier(&self, handle: ModifierHandle) -> Option<&dyn MovementModifier> {
        self.sync_state()
            .modifiers
            .find(handle)
            .or_else(|| self.fsm.find_queued_modifier(handle))
    }

    pub fn find_modifier_by_type<T: MovementModifier + 'static>(&self) -> Option<&T> {
        self.sync_state().modifiers.find_by_type::<T>()
    }

    pub fn find_layered_move(&self, handle: LayeredMoveHandle) -> Option<&dyn LayeredMove> {
        self.sync_state()
            .layered_moves
            .find(handle)
            .or_else(|| self.fsm.find_queued_layered_move(handle))
    }

    // ---------- observers ----------

    pub fn subscribe(&mut self, observer: impl FnMut(&MoverEvent) + Send + 'static) -> ObserverId {
        self.dispatcher.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.dispatcher.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{StaticEntry, StaticShape, StaticWorld};
    use crate::layered::{LinearVelocityMove, SpeedScaleModifier, TeleportEffect};
    use crate::modes::{FALLING, WALKING};
    use crate::sim::MoveMixMode;
    use std::sync::Mutex;

    fn floor() -> Arc<dyn CollisionBackend> {
        Arc::new(StaticWorld::new(vec![StaticEntry::solid(
            1,
            StaticShape::Plane {
                normal: Vec3::z(),
                dist: 0.0,
            },
        )]))
    }

    fn mover() -> Mover {
        MoverBuilder::new(floor())
            .with_default_modes()
            .initial_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 90.05)))
            .build()
    }

    fn step(m: &mut Mover, frame: i64, input: InputCmd) -> TickEndData {
        let ts = TimeStep::new(frame, frame as f64 * 16.0, 16.0);
        let start = TickStartData {
            input,
            sync: m.sync_state().clone(),
            aux: m.aux_state().clone(),
        };
        let end = m.simulation_tick(&ts, &start);
        m.finalize(&end.sync, &end.aux);
        end
    }

    #[test]
    fn walks_forward_and_publishes() {
        let mut m = mover();
        for frame in 0..10 {
            step(&mut m, frame, InputCmd::directional(Vec3::x()));
        }
        assert_eq!(m.movement_mode_name(), Some(WALKING));
        assert!(m.sync_state().location.x > 0.0);
        assert!((m.sync_state().location.z - 90.05).abs() < 0.2);
        assert_eq!(m.transform().translation, m.sync_state().location);
        assert!(m.has_tag(MovementTag::Grounded));
        assert!(m.last_floor_result().is_some_and(|f| f.is_walkable()));
    }

    #[test]
    fn jump_leaves_the_ground() {
        let mut m = mover();
        step(&mut m, 0, InputCmd::default());
        let end = step(&mut m, 1, InputCmd::default().with_jump());
        assert_eq!(end.sync.mode_name(), Some(FALLING));
        assert!(end.sync.velocity.z > 0.0);
        assert!(m.has_tag(MovementTag::Airborne));
    }

    #[test]
    fn events_arrive_in_order() {
        let mut m = mover();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        m.subscribe(move |e| {
            let name = match e {
                MoverEvent::PreSimulationTick(_) => "pre_sim",
                MoverEvent::PreMovement(_) => "pre_move",
                MoverEvent::ModeChanged { .. } => "mode",
                MoverEvent::PostMovement(_) => "post_move",
                MoverEvent::PostSimulationTick(_) => "post_sim",
                MoverEvent::PostFinalize => "finalize",
                _ => "other",
            };
            sink.lock().unwrap().push(name);
        });
        step(&mut m, 0, InputCmd::default());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["pre_sim", "pre_move", "mode", "post_move", "post_sim", "finalize"]
        );
    }

    #[test]
    fn invalid_starting_mode_echoes_state() {
        let mut m = MoverBuilder::new(floor())
            .with_default_modes()
            .config(MoverConfig::default().with_starting_mode("Swimming"))
            .initial_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 500.0)))
            .build();
        assert!(!m.is_simulation_enabled());
        assert!(m.validate().is_err());
        let before = m.sync_state().clone();
        let end = step(&mut m, 0, InputCmd::directional(Vec3::x()));
        assert_eq!(end.sync, before);
    }

    #[test]
    fn rollback_flags_the_next_tick() {
        let mut m = mover();
        let initial = m.sync_state().clone();
        let aux = m.aux_state().clone();
        for frame in 0..3 {
            step(&mut m, frame, InputCmd::directional(Vec3::x()));
        }
        let current = m.sync_state().clone();
        m.rollback(&current, &initial, &aux);
        assert_eq!(m.sync_state(), &initial);
        assert_eq!(m.transform().translation, initial.location);

        let end = step(&mut m, 0, InputCmd::directional(Vec3::x()));
        assert!(matches!(end.events.first(), Some(MoverEvent::PostRollback { .. })));
        let resim = end.events.iter().find_map(|e| match e {
            MoverEvent::PreSimulationTick(ts) => Some(ts.is_resimulating),
            _ => None,
        });
        assert_eq!(resim, Some(true));
        assert_eq!(m.newest_time_step().server_frame, 2);
    }

    #[test]
    fn queued_modifier_is_findable_before_and_after_activation() {
        let mut m = mover();
        let handle = m.queue_movement_modifier(Box::new(SpeedScaleModifier::new(0.5, -1.0)));
        assert!(m.find_movement_modifier(handle).is_some());
        step(&mut m, 0, InputCmd::default());
        assert!(m.find_movement_modifier(handle).is_some());
        assert!(m.find_modifier_by_type::<SpeedScaleModifier>().is_some());
        assert!(m.has_tag(MovementTag::SpeedModified));

        m.cancel_modifier(handle);
        step(&mut m, 1, InputCmd::default());
        assert!(m.find_movement_modifier(handle).is_none());
    }

    #[test]
    fn dynamic_queueing_rejects_mismatched_payloads() {
        let mut m = mover();
        let wrong = SpeedScaleModifier::new(2.0, 100.0);
        let err = m.queue_layered_move_dynamic("LinearVelocityMove", &wrong);
        assert!(matches!(err, Err(MoverError::TypeMismatch { .. })));
        assert!(matches!(
            m.queue_layered_move_dynamic("Nope", &wrong),
            Err(MoverError::UnknownType(_))
        ));

        let ok = LinearVelocityMove::new(Vec3::new(0.0, 200.0, 0.0), 100.0, MoveMixMode::AdditiveVelocity);
        let handle = m.queue_layered_move_dynamic("LinearVelocityMove", &ok).unwrap();
        assert!(m.find_layered_move(handle).is_some());
    }

    #[test]
    fn teleport_effect_moves_the_body() {
        let mut m = mover();
        step(&mut m, 0, InputCmd::default());
        m.queue_instant_effect(Box::new(TeleportEffect::new(Vec3::new(500.0, 0.0, 90.05))));
        let end = step(&mut m, 1, InputCmd::default());
        assert!((end.sync.location.x - 500.0).abs() < 1.0);
        assert!((m.transform().translation.x - 500.0).abs() < 1.0);
    }

    #[test]
    fn produced_input_is_cached() {
        let mut m = mover();
        m.set_input_producer(|_dt: f32| InputCmd::directional(Vec3::y()));
        let cmd = m.produce_input(16.0);
        assert_eq!(cmd.move_input, Vec3::y());
        assert_eq!(m.last_produced_input().map(|c| c.move_input), Some(Vec3::y()));
    }
}
