use crate::collision::{HitResult, Vec3};

use super::sync_state::SyncState;
use super::time_step::TimeStep;

/// A blocking hit met while moving.
#[derive(Clone, Debug, PartialEq)]
pub struct ImpactEvent {
    /// Mode that was moving the agent.
    pub mode: Option<String>,
    pub hit: HitResult,
    pub attempted_delta: Vec3,
}

/// Notifications raised by the driver, in occurrence order.
#[derive(Clone, Debug)]
pub enum MoverEvent {
    ModeChanged {
        previous: Option<String>,
        new: Option<String>,
    },
    Impact(ImpactEvent),
    PreSimulationTick(TimeStep),
    PreMovement(TimeStep),
    PostMovement(TimeStep),
    PostSimulationTick(TimeStep),
    /// First tick after a rollback.
    PostRollback {
        time_step: TimeStep,
        prior_time_step: TimeStep,
    },
    /// Raised before a rollback overwrites the current state.
    PreRollback {
        discarded: Box<SyncState>,
        restoring: Box<SyncState>,
    },
    PostFinalize,
}

impl MoverEvent {
    pub fn as_impact(&self) -> Option<&ImpactEvent> {
        match self {
            MoverEvent::Impact(impact) => Some(impact),
            _ => None,
        }
    }
}

/// Identifies a subscription so it can be removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u32);

type Observer = Box<dyn FnMut(&MoverEvent) + Send>;

/// Observer callbacks owned by a mover, invoked synchronously.
#[derive(Default)]
pub struct EventDispatcher {
    observers: Vec<(ObserverId, Observer)>,
    next_id: u32,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn subscribe(&mut self, observer: impl FnMut(&MoverEvent) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        before != self.observers.len()
    }

    /// Deliver `events` to every observer, event by event.
    pub fn dispatch(&mut self, events: &[MoverEvent]) {
        for event in events {
            for (_, observer) in &mut self.observers {
                observer(event);
            }
        }
    }
}
