use std::any::{Any, type_name};
use std::collections::BTreeMap;

use crate::error::MoverError;

use super::layered_move::{LayeredMove, LinearVelocityMove, MoveToPointMove};
use super::modifier::{MovementModifier, SpeedScaleModifier};

type LayeredFactory = fn(&dyn Any) -> Option<Box<dyn LayeredMove>>;
type ModifierFactory = fn(&dyn Any) -> Option<Box<dyn MovementModifier>>;

struct Entry<F> {
    rust_type: &'static str,
    make: F,
}

/// Known layered move and modifier types, by name, for queueing from type-erased payloads.
pub struct MoveTypeRegistry {
    layered: BTreeMap<&'static str, Entry<LayeredFactory>>,
    modifiers: BTreeMap<&'static str, Entry<ModifierFactory>>,
}

impl Default for MoveTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl MoveTypeRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            layered: BTreeMap::new(),
            modifiers: BTreeMap::new(),
        }
    }

    /// Registry knowing the built-in layered moves and modifiers.
    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        r.register_layered_move::<LinearVelocityMove>("LinearVelocityMove");
        r.register_layered_move::<MoveToPointMove>("MoveToPointMove");
        r.register_modifier::<SpeedScaleModifier>("SpeedScaleModifier");
        r
    }

    pub fn register_layered_move<T: LayeredMove + Clone + 'static>(&mut self, name: &'static str) {
        fn make<T: LayeredMove + Clone + 'static>(payload: &dyn Any) -> Option<Box<dyn LayeredMove>> {
            payload
                .downcast_ref::<T>()
                .map(|m| Box::new(m.clone()) as Box<dyn LayeredMove>)
        }
        self.layered.insert(
            name,
            Entry {
                rust_type: type_name::<T>(),
                make: make::<T>,
            },
        );
    }

    pub fn register_modifier<T: MovementModifier + Clone + 'static>(&mut self, name: &'static str) {
        fn make<T: MovementModifier + Clone + 'static>(
            payload: &dyn Any,
        ) -> Option<Box<dyn MovementModifier>> {
            payload
                .downcast_ref::<T>()
                .map(|m| Box::new(m.clone()) as Box<dyn MovementModifier>)
        }
        self.modifiers.insert(
            name,
            Entry {
                rust_type: type_name::<T>(),
                make: make::<T>,
            },
        );
    }

    /// Build a layered move from `payload`, which must be the type registered as `name`.
    pub fn make_layered_move(&self, name: &str, payload: &dyn Any) -> Result<Box<dyn LayeredMove>, MoverError> {
        let entry = self
            .layered
            .get(name)
            .ok_or_else(|| MoverError::UnknownType(name.to_owned()))?;
        (entry.make)(payload).ok_or_else(|| mismatch(entry.rust_type, payload))
    }

    /// Build a modifier from `payload`, which must be the type registered as `name`.
    pub fn make_modifier(&self, name: &str, payload: &dyn Any) -> Result<Box<dyn MovementModifier>, MoverError> {
        let entry = self
            .modifiers
            .get(name)
            .ok_or_else(|| MoverError::UnknownType(name.to_owned()))?;
        (entry.make)(payload).ok_or_else(|| mismatch(entry.rust_type, payload))
    }
}

fn mismatch(expected: &'static str, payload: &dyn Any) -> MoverError {
    log::warn!("rejected dynamic payload: expected {expected}");
    MoverError::TypeMismatch {
        expected: expected.to_owned(),
        found: format!("{:?}", payload.type_id()),
    }
}
