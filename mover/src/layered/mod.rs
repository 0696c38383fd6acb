/*!
Contributors that sit on top of the current movement mode.

- layered_move:   time-bounded velocity contributions mixed into the mode's move
- modifier:       persistent rule changes with start/pre/post/end hooks
- instant_effect: one-shot state edits applied at a tick boundary
- registry:       name-to-type table for queueing from type-erased payloads
*/

pub mod instant_effect;
pub mod layered_move;
pub mod modifier;
pub mod registry;

pub use instant_effect::{ApplyVelocityEffect, EffectContext, InstantMovementEffect, TeleportEffect};
pub use layered_move::{
    LayeredMove, LayeredMoveBase, LayeredMoveGroup, LayeredMoveHandle, LinearVelocityMove,
    MoveToPointMove,
};
pub use modifier::{
    ModifierBase, ModifierContext, ModifierGroup, ModifierHandle, MovementModifier,
    SpeedScaleModifier,
};
pub use registry::MoveTypeRegistry;
