use crate::collision::Transform;

/// Resolves the world transform of objects an agent can stand on or ride.
pub trait BaseProvider: Send + Sync {
    /// World transform of `base_id` (optionally of one of its bones). `None` when unknown.
    fn base_transform(&self, base_id: u64, bone: Option<&str>) -> Option<Transform>;
}

/// Provider for worlds where nothing moves: every base is unknown.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBases;

impl BaseProvider for NoBases {
    fn base_transform(&self, _base_id: u64, _bone: Option<&str>) -> Option<Transform> {
        None
    }
}

/// Provider backed by a fixed id-to-transform table. Bones are ignored.
#[derive(Clone, Debug, Default)]
pub struct StaticBases {
    bases: std::collections::BTreeMap<u64, Transform>,
}

impl StaticBases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, base_id: u64, transform: Transform) {
        self.bases.insert(base_id, transform);
    }

    pub fn with(mut self, base_id: u64, transform: Transform) -> Self {
        self.set(base_id, transform);
        self
    }
}

impl BaseProvider for StaticBases {
    fn base_transform(&self, base_id: u64, _bone: Option<&str>) -> Option<Transform> {
        self.bases.get(&base_id).copied()
    }
}
