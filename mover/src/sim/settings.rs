use std::any::Any;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A settings object shared between movement modes.
pub trait SettingsKind: Any + Clone + std::fmt::Debug + Send + Sync {
    const KIND: &'static str;
}

/// Tuning values used by the built-in modes. Units: world units (cm) and seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonMovementSettings {
    pub max_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub turning_boost: f32,
    pub ground_friction: f32,
    /// Cosine of the steepest walkable slope.
    pub max_walk_slope_cos: f32,
    /// How far below the agent to look for a floor.
    pub floor_sweep_distance: f32,
    pub jump_upwards_speed: f32,
    /// Fraction of acceleration available while falling.
    pub air_control: f32,
    pub terminal_velocity: f32,
    pub falling_lateral_friction: f32,
    /// Degrees per second the agent may turn toward its orientation intent.
    pub rotation_rate_deg: f32,
    pub use_acceleration_for_velocity_move: bool,
}

impl Default for CommonMovementSettings {
    fn default() -> Self {
        Self {
            max_speed: 800.0,
            acceleration: 4000.0,
            deceleration: 8000.0,
            turning_boost: 8.0,
            ground_friction: 8.0,
            max_walk_slope_cos: 0.71,
            floor_sweep_distance: 40.0,
            jump_upwards_speed: 500.0,
            air_control: 0.4,
            terminal_velocity: 4000.0,
            falling_lateral_friction: 0.0,
            rotation_rate_deg: 540.0,
            use_acceleration_for_velocity_move: true,
        }
    }
}

impl SettingsKind for CommonMovementSettings {
    const KIND: &'static str = "CommonMovementSettings";
}

/// Settings objects shared by every mode of one mover, one per kind.
#[derive(Default)]
pub struct SharedSettings {
    entries: BTreeMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for SharedSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl SharedSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared settings holding only the default [`CommonMovementSettings`].
    pub fn with_common_defaults() -> Self {
        let mut s = Self::new();
        s.insert(CommonMovementSettings::default());
        s
    }

    pub fn insert<T: SettingsKind>(&mut self, settings: T) {
        self.entries.insert(T::KIND, Box::new(settings));
    }

    pub fn get<T: SettingsKind>(&self) -> Option<&T> {
        self.entries.get(T::KIND).and_then(|b| b.downcast_ref::<T>())
    }

    pub fn get_mut<T: SettingsKind>(&mut self) -> Option<&mut T> {
        self.entries.get_mut(T::KIND).and_then(|b| b.downcast_mut::<T>())
    }

    #[inline]
    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// The common settings, or defaults when none were supplied.
    pub fn common(&self) -> CommonMovementSettings {
        self.get::<CommonMovementSettings>().cloned().unwrap_or_default()
    }
}
