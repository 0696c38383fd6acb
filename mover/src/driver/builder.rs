use std::sync::Arc;

use crate::collision::{CollisionBackend, CollisionShape, Transform};
use crate::config::MoverConfig;
use crate::constants::default_gravity;
use crate::error::ConfigError;
use crate::layered::MoveTypeRegistry;
use crate::modes::{FALLING, FLYING, FallingMode, FlyingMode, ModeStateMachine, MovementMode, Transition, WALKING, WalkingMode};
use crate::primitives::AgentBody;
use crate::sim::{
    AuxState, BaseProvider, DataPersistence, EventDispatcher, InputCmd, InputProducer, NoBases,
    SettingsKind, SharedSettings, SimBlackboard, SyncBlock, SyncState, TimeStep,
};
use crate::tags::{CollisionChannel, MovementTags};

use super::{DoubleBuffer, FrameState, Mover};

/// Default agent shape: a capsule 180 units tall.
pub const DEFAULT_AGENT_SHAPE: CollisionShape = CollisionShape::Capsule {
    radius: 30.0,
    half_height: 60.0,
};

/// Assembles a [`Mover`].
///
/// Configuration problems never make `build` fail: they are logged and the resulting mover
/// does not simulate.
pub struct MoverBuilder {
    config: MoverConfig,
    backend: Arc<dyn CollisionBackend>,
    bases: Arc<dyn BaseProvider>,
    shape: CollisionShape,
    channel: CollisionChannel,
    modes: Vec<(String, Box<dyn MovementMode>)>,
    transitions: Vec<(Option<String>, Box<dyn Transition>)>,
    shared: SharedSettings,
    persistence: Vec<DataPersistence>,
    input_producer: Option<Box<dyn InputProducer>>,
    initial_transform: Transform,
    registry: MoveTypeRegistry,
}

impl MoverBuilder {
    pub fn new(backend: Arc<dyn CollisionBackend>) -> Self {
        Self {
            config: MoverConfig::default(),
            backend,
            bases: Arc::new(NoBases),
            shape: DEFAULT_AGENT_SHAPE,
            channel: CollisionChannel::Pawn,
            modes: Vec::new(),
            transitions: Vec::new(),
            shared: SharedSettings::with_common_defaults(),
            persistence: Vec::new(),
            input_producer: None,
            initial_transform: Transform::identity(),
            registry: MoveTypeRegistry::with_builtins(),
        }
    }

    /// Register walking, falling and flying, starting in walking unless a starting mode is
    /// already configured.
    pub fn with_default_modes(mut self) -> Self {
        self.modes.push((WALKING.to_owned(), Box::new(WalkingMode)));
        self.modes.push((FALLING.to_owned(), Box::new(FallingMode)));
        self.modes.push((FLYING.to_owned(), Box::new(FlyingMode)));
        if self.config.starting_movement_mode.is_none() {
            self.config.starting_movement_mode = Some(WALKING.to_owned());
        }
        self
    }

    pub fn config(mut self, config: MoverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn shape(mut self, shape: CollisionShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn channel(mut self, channel: CollisionChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn mode(mut self, name: impl Into<String>, mode: Box<dyn MovementMode>) -> Self {
        self.modes.push((name.into(), mode));
        self
    }

    pub fn starting_mode(mut self, name: impl Into<String>) -> Self {
        self.config.starting_movement_mode = Some(name.into());
        self
    }

    /// Transition evaluated only while `mode` is current.
    pub fn mode_transition(mut self, mode: impl Into<String>, transition: Box<dyn Transition>) -> Self {
        self.transitions.push((Some(mode.into()), transition));
        self
    }

    pub fn global_transition(mut self, transition: Box<dyn Transition>) -> Self {
        self.transitions.push((None, transition));
        self
    }

    /// Replace every shared settings object.
    pub fn shared_settings(mut self, shared: SharedSettings) -> Self {
        self.shared = shared;
        self
    }

    pub fn settings<T: SettingsKind>(mut self, settings: T) -> Self {
        self.shared.insert(settings);
        self
    }

    /// Keep a block of kind `T` in every output state.
    pub fn persist<T: SyncBlock>(mut self, copy_from_prior_frame: bool) -> Self {
        self.persistence.push(DataPersistence::of::<T>(copy_from_prior_frame));
        self
    }

    pub fn input_producer(mut self, producer: impl InputProducer + 'static) -> Self {
        self.input_producer = Some(Box::new(producer));
        self
    }

    pub fn base_provider(mut self, bases: Arc<dyn BaseProvider>) -> Self {
        self.bases = bases;
        self
    }

    pub fn initial_transform(mut self, transform: Transform) -> Self {
        self.initial_transform = transform;
        self
    }

    pub fn registry(mut self, registry: MoveTypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> Mover {
        let Self {
            config,
            backend,
            bases,
            shape,
            channel,
            modes,
            transitions,
            shared,
            persistence,
            input_producer,
            initial_transform,
            registry,
        } = self;

        let mut fsm = ModeStateMachine::new();
        fsm.set_max_substeps(config.max_substeps);
        for (name, mode) in modes {
            // Rejections are logged by the state machine.
            let _ = fsm.add_mode(name, mode);
        }
        for (owner, transition) in transitions {
            match owner {
                Some(mode) => {
                    fsm.add_mode_transition(&mode, transition);
                }
                None => fsm.add_global_transition(transition),
            }
        }
        if let Some(start) = config.starting_movement_mode.as_deref() {
            fsm.set_default_mode(start);
        }

        let errors = fsm.validate(&shared);
        for error in &errors {
            log::warn!("mover configuration: {error}");
        }
        let simulation_enabled = !errors.iter().any(|e| {
            matches!(
                e,
                ConfigError::NoStartingMode
                    | ConfigError::StartingModeNotRegistered(_)
                    | ConfigError::AbstractMode(_)
                    | ConfigError::MissingSharedSettings { .. }
            )
        });
        if simulation_enabled {
            if let Some(start) = config.starting_movement_mode.as_deref() {
                fsm.queue_next_mode(start, false);
            }
        } else {
            log::warn!("mover will not simulate until its configuration is fixed");
        }

        let mut initial = SyncState::from_transform(initial_transform);
        for p in &persistence {
            initial.data.add_boxed((p.make_default)());
        }

        let gravity = config.gravity_override_vec().unwrap_or_else(default_gravity);
        let planar = config.planar_constraint.and_then(|p| p.to_constraint());

        Mover {
            fsm,
            shared,
            registry,
            backend,
            bases,
            shape,
            channel,
            gravity,
            planar,
            body: AgentBody::new(initial_transform),
            buffer: DoubleBuffer::new(FrameState {
                sync: initial,
                aux: AuxState::default(),
            }),
            blackboard: SimBlackboard::new(),
            dispatcher: EventDispatcher::default(),
            persistence,
            input_producer,
            external_tags: MovementTags::default(),
            simulation_enabled,
            has_rolled_back: false,
            warned_no_mode: false,
            newest_time_step: TimeStep::default(),
            last_time_step: TimeStep::default(),
            last_input: InputCmd::default(),
            last_produced_input: None,
            owner_thread: std::thread::current().id(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::StaticWorld;
    use crate::hash::StateHasher;
    use crate::modes::WALKING;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Stamina(f32);

    impl SyncBlock for Stamina {
        const KIND: &'static str = "Stamina";

        fn hash_into(&self, hasher: &mut StateHasher) {
            hasher.update_f32(self.0);
        }
    }

    #[test]
    fn default_modes_start_walking() {
        let m = MoverBuilder::new(Arc::new(StaticWorld::new(Vec::new())))
            .with_default_modes()
            .build();
        assert!(m.is_simulation_enabled());
        assert!(m.validate().is_ok());
        assert_eq!(m.state_machine().queued_mode().map(|q| q.name.as_str()), Some(WALKING));
    }

    #[test]
    fn missing_settings_disable_simulation() {
        let m = MoverBuilder::new(Arc::new(StaticWorld::new(Vec::new())))
            .with_default_modes()
            .shared_settings(SharedSettings::new())
            .build();
        assert!(!m.is_simulation_enabled());
        let errors = m.validate().unwrap_err();
        assert!(errors.iter().all(|e| matches!(e, ConfigError::MissingSharedSettings { .. })));
    }

    #[test]
    fn persistent_blocks_exist_from_the_start() {
        let m = MoverBuilder::new(Arc::new(StaticWorld::new(Vec::new())))
            .with_default_modes()
            .persist::<Stamina>(true)
            .build();
        assert_eq!(m.find_sync_data::<Stamina>(), Some(&Stamina(0.0)));
    }
}
