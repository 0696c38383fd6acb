//! Gameplay tags and collision channels, both backed by [`BitmaskFlags`].

use crate::bitmask_flags::BitmaskFlags;
use crate::define_bitmask_flags;

define_bitmask_flags!(MovementTag, u64, {
    Grounded,
    Airborne,
    Flying,
    SpeedModified,
    LayeredMoveActive,
    DisableGravity,
    Teleporting,
    Rooted,
    Custom0,
    Custom1,
    Custom2,
    Custom3,
});

/// Tags a mode, modifier, layered move or the agent itself carries.
pub type MovementTags = BitmaskFlags<u64>;

define_bitmask_flags!(CollisionChannel, u32, {
    WorldStatic,
    WorldDynamic,
    Pawn,
    Vehicle,
    Camera,
    Visibility,
});

/// Set of channels a static shape blocks.
pub type CollisionChannels = BitmaskFlags<u32>;

impl CollisionChannel {
    /// Channels blocked by ordinary level geometry.
    pub fn blocking_all() -> CollisionChannels {
        CollisionChannels::from_flags(&[
            CollisionChannel::WorldStatic,
            CollisionChannel::WorldDynamic,
            CollisionChannel::Pawn,
            CollisionChannel::Vehicle,
            CollisionChannel::Camera,
            CollisionChannel::Visibility,
        ])
    }
}
