use crate::collision::{Quat, Transform, Vec3};
use crate::hash::{Digest, StateHasher};
use crate::layered::{LayeredMoveGroup, ModifierGroup};

use super::data::DataCollection;

/// Reference to an object the agent stands on or rides, plus the agent pose relative to it.
#[derive(Clone, Debug, PartialEq)]
pub struct MovementBase {
    pub base_id: u64,
    pub bone: Option<String>,
    pub relative_location: Vec3,
    pub relative_rotation: Quat,
}

impl MovementBase {
    /// Capture the agent's world pose relative to `base_transform`.
    pub fn capture(base_id: u64, bone: Option<String>, base_transform: &Transform, location: Vec3, rotation: Quat) -> Self {
        Self {
            base_id,
            bone,
            relative_location: base_transform.inverse_transform_point(&location),
            relative_rotation: base_transform.rotation.inverse() * rotation,
        }
    }

    /// World pose of the agent for the base at `base_transform`.
    pub fn world_pose(&self, base_transform: &Transform) -> (Vec3, Quat) {
        (
            base_transform.transform_point(&self.relative_location),
            base_transform.rotation * self.relative_rotation,
        )
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.base_id);
        hasher.update_opt_str(self.bone.as_deref());
        hasher.update_vec3(&self.relative_location);
        hasher.update_quat(&self.relative_rotation);
    }
}

/// The replicable snapshot of one agent's simulation state.
#[derive(Clone, Debug)]
pub struct SyncState {
    pub location: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    /// Direction the agent was asked to move last tick.
    pub move_direction_intent: Vec3,
    pub movement_mode: Option<String>,
    pub movement_base: Option<MovementBase>,
    pub data: DataCollection,
    pub layered_moves: LayeredMoveGroup,
    pub modifiers: ModifierGroup,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            location: Vec3::zeros(),
            orientation: Quat::identity(),
            velocity: Vec3::zeros(),
            move_direction_intent: Vec3::zeros(),
            movement_mode: None,
            movement_base: None,
            data: DataCollection::new(),
            layered_moves: LayeredMoveGroup::new(),
            modifiers: ModifierGroup::new(),
        }
    }
}

impl SyncState {
    /// A state at `transform` with nothing else set.
    pub fn from_transform(transform: Transform) -> Self {
        Self {
            location: transform.translation,
            orientation: transform.rotation,
            ..Default::default()
        }
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        Transform::new(self.location, self.orientation)
    }

    #[inline]
    pub fn mode_name(&self) -> Option<&str> {
        self.movement_mode.as_deref()
    }

    #[inline]
    pub fn is_based(&self) -> bool {
        self.movement_base.is_some()
    }

    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_vec3(&self.location);
        hasher.update_quat(&self.orientation);
        hasher.update_vec3(&self.velocity);
        hasher.update_vec3(&self.move_direction_intent);
        hasher.update_opt_str(self.movement_mode.as_deref());
        match &self.movement_base {
            Some(base) => {
                hasher.update_bool(true);
                base.hash_into(hasher);
            }
            None => hasher.update_bool(false),
        }
        self.data.hash_into(hasher);
        self.layered_moves.hash_into(hasher);
        self.modifiers.hash_into(hasher);
    }

    /// Canonical content digest. Equal digests mean equal states.
    pub fn digest(&self) -> Digest {
        let mut hasher = StateHasher::new();
        self.hash_into(&mut hasher);
        hasher.finalize()
    }
}

impl PartialEq for SyncState {
    fn eq(&self, other: &Self) -> bool {
        self.digest() == other.digest()
    }
}

/// Persistent, non-replicated data travelling alongside a [`SyncState`].
#[derive(Clone, Debug, Default)]
pub struct AuxState {
    pub data: DataCollection,
}
