use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::collision::Vec3;
use crate::constants::DEFAULT_MAX_SUBSTEPS;
use crate::primitives::PlanarConstraint;

/// Environment variable toggling the post-simulation transform check.
pub const ENV_WARN_ON_POST_SIM_DIFFERENCE: &str = "MOVER_WARN_ON_POST_SIM_DIFFERENCE";
/// Environment variable toggling deferred (grouped) spatial updates.
pub const ENV_USE_DEFERRED_GROUP_MOVEMENT: &str = "MOVER_USE_DEFERRED_GROUP_MOVEMENT";

/// Process-wide diagnostic defaults. Resolved once, never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessDefaults {
    pub warn_on_post_sim_difference: bool,
    pub use_deferred_group_movement: bool,
}

static PROCESS_DEFAULTS: OnceLock<ProcessDefaults> = OnceLock::new();

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            log::warn!("Ignoring unrecognised value `{other}` for {name}");
            None
        }
    }
}

/// Per-mover configuration.
///
/// Deserializable so embedders can load it alongside their own data. Missing fields fall
/// back to [`MoverConfig::default`], whose diagnostic toggles come from
/// [`MoverConfig::process_defaults`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverConfig {
    /// Mode the state machine enters on its first tick.
    pub starting_movement_mode: Option<String>,
    /// Compare the written state to the agent transform after every tick and warn on mismatch.
    pub warn_on_post_sim_difference: bool,
    /// Group all spatial updates of a tick into one commit when ticking on the owning thread.
    pub use_deferred_group_movement: bool,
    /// Replaces the default gravity when set.
    pub gravity_override: Option<[f32; 3]>,
    /// Optional plane all movement is confined to.
    pub planar_constraint: Option<PlanarConstraintConfig>,
    /// Maximum mode re-entries within one tick.
    pub max_substeps: u32,
}

/// Serializable form of [`PlanarConstraint`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanarConstraintConfig {
    pub normal: [f32; 3],
    #[serde(default)]
    pub origin: [f32; 3],
}

impl PlanarConstraintConfig {
    pub fn to_constraint(&self) -> Option<PlanarConstraint> {
        PlanarConstraint::new(Vec3::from(self.normal), Vec3::from(self.origin))
    }
}

impl MoverConfig {
    /// Diagnostic defaults read from the environment on first use.
    pub fn process_defaults() -> ProcessDefaults {
        *PROCESS_DEFAULTS.get_or_init(|| ProcessDefaults {
            warn_on_post_sim_difference: env_flag(ENV_WARN_ON_POST_SIM_DIFFERENCE)
                .unwrap_or(false),
            use_deferred_group_movement: env_flag(ENV_USE_DEFERRED_GROUP_MOVEMENT)
                .unwrap_or(true),
        })
    }

    pub fn with_starting_mode(mut self, name: impl Into<String>) -> Self {
        self.starting_movement_mode = Some(name.into());
        self
    }

    pub fn gravity_override_vec(&self) -> Option<Vec3> {
        self.gravity_override.map(Vec3::from)
    }
}

impl Default for MoverConfig {
    fn default() -> Self {
        let defaults = Self::process_defaults();
        Self {
            starting_movement_mode: None,
            warn_on_post_sim_difference: defaults.warn_on_post_sim_difference,
            use_deferred_group_movement: defaults.use_deferred_group_movement,
            gravity_override: None,
            planar_constraint: None,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg: MoverConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(cfg, MoverConfig::default());
        assert_eq!(cfg.max_substeps, DEFAULT_MAX_SUBSTEPS);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg: MoverConfig = serde_json::from_str(
            r#"{ "starting_movement_mode": "Walking", "gravity_override": [0.0, 0.0, -500.0] }"#,
        )
        .expect("parse");
        assert_eq!(cfg.starting_movement_mode.as_deref(), Some("Walking"));
        assert_eq!(cfg.gravity_override_vec(), Some(Vec3::new(0.0, 0.0, -500.0)));
        assert_eq!(cfg.max_substeps, DEFAULT_MAX_SUBSTEPS);
    }

    #[test]
    fn process_defaults_are_stable() {
        // Resolved once; repeated reads return the same value.
        assert_eq!(MoverConfig::process_defaults(), MoverConfig::process_defaults());
    }

    #[test]
    fn planar_constraint_config_normalizes() {
        let cfg = PlanarConstraintConfig {
            normal: [0.0, 2.0, 0.0],
            origin: [0.0; 3],
        };
        let plane = cfg.to_constraint().expect("valid plane");
        assert!((plane.normal().norm() - 1.0).abs() < 1.0e-6);
    }
}
