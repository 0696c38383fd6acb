use std::fmt::Debug;

use crate::collision::{CollisionBackend, CollisionShape, Quat, Vec3};
use crate::primitives::find_teleport_spot;
use crate::sim::{SyncState, TimeStep};
use crate::tags::CollisionChannel;

/// What an instant effect may read and edit.
pub struct EffectContext<'a> {
    pub time_step: &'a TimeStep,
    /// The state being produced by this tick. Edits land directly in the output.
    pub state: &'a mut SyncState,
    pub backend: &'a dyn CollisionBackend,
    pub shape: CollisionShape,
    pub channel: CollisionChannel,
    pub up: Vec3,
    /// Set to request a mode change at this tick boundary.
    pub next_mode: Option<String>,
}

/// A one-shot edit of the sync state applied at the start of the next tick.
pub trait InstantMovementEffect: Debug + Send + Sync {
    /// Returns whether the effect took place.
    fn apply(&mut self, ctx: &mut EffectContext<'_>) -> bool;

    fn type_name(&self) -> &'static str;
}

/// Teleport to a free spot near `location`.
#[derive(Clone, Debug, PartialEq)]
pub struct TeleportEffect {
    pub location: Vec3,
    /// New orientation; keeps the current one when `None`.
    pub rotation: Option<Quat>,
    pub keep_velocity: bool,
}

impl TeleportEffect {
    pub fn new(location: Vec3) -> Self {
        Self {
            location,
            rotation: None,
            keep_velocity: false,
        }
    }
}

impl InstantMovementEffect for TeleportEffect {
    fn apply(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        let rotation = self.rotation.unwrap_or(ctx.state.orientation);
        let spot = find_teleport_spot(
            ctx.backend,
            &ctx.shape,
            ctx.channel,
            self.location,
            rotation,
            ctx.up,
            true,
        );
        let Some(spot) = spot else {
            log::debug!("teleport to {:?} failed: no free spot", self.location);
            return false;
        };
        ctx.state.location = spot;
        ctx.state.orientation = rotation;
        if !self.keep_velocity {
            ctx.state.velocity = Vec3::zeros();
        }
        // A teleport detaches from whatever the agent was standing on.
        ctx.state.movement_base = None;
        true
    }

    fn type_name(&self) -> &'static str {
        "TeleportEffect"
    }
}

/// Set (or add to) the velocity, optionally forcing a mode.
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyVelocityEffect {
    pub velocity: Vec3,
    pub additive: bool,
    pub force_mode: Option<String>,
}

impl ApplyVelocityEffect {
    pub fn new(velocity: Vec3) -> Self {
        Self {
            velocity,
            additive: false,
            force_mode: None,
        }
    }

    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }

    pub fn forcing_mode(mut self, mode: impl Into<String>) -> Self {
        self.force_mode = Some(mode.into());
        self
    }
}

impl InstantMovementEffect for ApplyVelocityEffect {
    fn apply(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        if self.additive {
            ctx.state.velocity += self.velocity;
        } else {
            ctx.state.velocity = self.velocity;
        }
        if self.force_mode.is_some() {
            ctx.next_mode.clone_from(&self.force_mode);
        }
        true
    }

    fn type_name(&self) -> &'static str {
        "ApplyVelocityEffect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{StaticEntry, StaticShape, StaticWorld};

    fn apply(effect: &mut dyn InstantMovementEffect, world: &StaticWorld, state: &mut SyncState) -> (bool, Option<String>) {
        let ts = TimeStep::new(0, 0.0, 16.0);
        let mut ctx = EffectContext {
            time_step: &ts,
            state,
            backend: world,
            shape: CollisionShape::Sphere { radius: 10.0 },
            channel: CollisionChannel::Pawn,
            up: Vec3::z(),
            next_mode: None,
        };
        let applied = effect.apply(&mut ctx);
        (applied, ctx.next_mode)
    }

    #[test]
    fn teleport_lands_above_the_floor() {
        let world = StaticWorld::new(vec![StaticEntry::solid(
            1,
            StaticShape::Plane {
                normal: Vec3::z(),
                dist: 0.0,
            },
        )]);
        let mut state = SyncState::default();
        state.velocity = Vec3::new(5.0, 0.0, 0.0);
        let (applied, _) = apply(&mut TeleportEffect::new(Vec3::new(100.0, 0.0, 2.0)), &world, &mut state);
        assert!(applied);
        assert!(state.location.z >= 10.0);
        assert_eq!(state.velocity, Vec3::zeros());
    }

    #[test]
    fn velocity_effect_can_force_a_mode() {
        let world = StaticWorld::new(Vec::new());
        let mut state = SyncState::default();
        state.velocity = Vec3::new(1.0, 0.0, 0.0);
        let mut effect = ApplyVelocityEffect::new(Vec3::new(0.0, 0.0, 300.0))
            .additive()
            .forcing_mode("Falling");
        let (applied, next) = apply(&mut effect, &world, &mut state);
        assert!(applied);
        assert_eq!(state.velocity, Vec3::new(1.0, 0.0, 300.0));
        assert_eq!(next.as_deref(), Some("Falling"));
    }
}
