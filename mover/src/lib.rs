pub mod bitmask_flags;
pub mod collision;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod hash;
pub mod layered;
pub mod liaison;
pub mod modes;
pub mod primitives;
pub mod sim;
pub mod tags;

pub use collision::{CollisionBackend, CollisionShape, HitResult, Quat, StaticEntry, StaticShape, StaticWorld, Transform, Vec3};
pub use config::{MoverConfig, PlanarConstraintConfig};
pub use driver::{Mover, MoverBuilder, TickEndData, TickStartData, TrajectorySample};
pub use error::{ConfigError, MoverError};
pub use hash::Digest;
pub use layered::{
    InstantMovementEffect, LayeredMove, LayeredMoveHandle, ModifierHandle, MoveTypeRegistry, MovementModifier,
};
pub use liaison::{BackendLiaison, FixedStepLiaison};
pub use modes::{FALLING, FLYING, MovementMode, Transition, WALKING};
pub use sim::{AuxState, InputCmd, MoverEvent, SyncBlock, SyncState, TimeStep};
pub use tags::{CollisionChannel, MovementTag, MovementTags};
