/*!
Stateless movement primitives shared by every movement mode.

- planar:      planar constraint and vector helpers (up, planar/vertical split)
- velocity:    acceleration, braking and speed clamps
- body:        the agent body and the per-tick moving context
- move_record: ledger of the substeps taken during a tick
- penetration: depenetration and the safe-move helper
- slide:       sliding along one or two blocking surfaces
- teleport:    searching for a free spot near a location
- floor:       floor probing
*/

pub mod body;
pub mod floor;
pub mod move_record;
pub mod penetration;
pub mod planar;
pub mod slide;
pub mod teleport;
pub mod velocity;

pub use body::{AgentBody, MovingBody};
pub use floor::{FloorResult, find_floor, is_walkable};
pub use move_record::{MovementRecord, MovementSubstep};
pub use penetration::{compute_penetration_adjustment, try_move_to_resolve_penetration, try_safe_move};
pub use planar::{
    PlanarConstraint, clamp_to_max_size, constrain_normal_to_plane, constrain_to_plane, planar_basis,
    planar_part, safe_normal, up_from_gravity, vertical_part,
};
pub use slide::{
    compute_slide_delta, compute_two_wall_adjusted_delta, try_move_and_slide,
    try_move_to_slide_along_surface,
};
pub use teleport::find_teleport_spot;
pub use velocity::{
    ComputeCombinedVelocityParams, ComputeVelocityParams, MoveInputType, apply_velocity_braking,
    compute_combined_velocity, compute_velocity, is_exceeding_max_speed,
};
