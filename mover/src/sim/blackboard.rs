use std::any::Any;
use std::collections::BTreeMap;

/// Blackboard key under which walking stores its last [`FloorResult`](crate::primitives::FloorResult).
pub const LAST_FLOOR_RESULT: &str = "LastFloorResult";

/// Why the blackboard is being cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidationReason {
    Rollback,
    FullReset,
}

/// Per-agent cache of derived query results shared between modes.
///
/// Nothing here is part of the replicated state: every entry must be recomputable, and the
/// whole board is dropped on rollback.
#[derive(Default)]
pub struct SimBlackboard {
    entries: BTreeMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for SimBlackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl SimBlackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Any + Send + Sync>(&mut self, key: &'static str, value: T) {
        self.entries.insert(key, Box::new(value));
    }

    /// `None` when missing or stored with a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn invalidate(&mut self, reason: InvalidationReason) {
        if !self.entries.is_empty() {
            log::trace!("blackboard invalidated ({reason:?}), {} entries", self.entries.len());
        }
        self.entries.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
