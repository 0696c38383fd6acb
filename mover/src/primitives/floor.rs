use crate::collision::{HitResult, Vec3};

use super::body::MovingBody;

/// What lies under the agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloorResult {
    pub blocking_hit: bool,
    /// The surface hit is flat enough to stand on.
    pub walkable_floor: bool,
    pub hit: HitResult,
    /// Gap between the agent and the floor along -up.
    pub floor_dist: f32,
}

impl FloorResult {
    /// Nothing within reach.
    pub fn none(hit: HitResult) -> Self {
        Self {
            blocking_hit: false,
            walkable_floor: false,
            hit,
            floor_dist: 0.0,
        }
    }

    #[inline]
    pub fn is_walkable(&self) -> bool {
        self.blocking_hit && self.walkable_floor
    }

    /// Backend object the agent stands on.
    pub fn object(&self) -> Option<u64> {
        if self.is_walkable() { self.hit.object } else { None }
    }
}

/// True when a surface with `normal` is flat enough to stand on.
#[inline]
pub fn is_walkable(normal: Vec3, up: Vec3, max_walk_slope_cos: f32) -> bool {
    normal.dot(&up) >= max_walk_slope_cos
}

/// Sweep down along `-up` by `distance` looking for a floor.
pub fn find_floor(body: &MovingBody<'_>, distance: f32, max_walk_slope_cos: f32) -> FloorResult {
    let down = -body.up * distance.max(0.0);
    let hit = body.sweep_test(down, body.rotation());
    if !hit.blocking {
        return FloorResult::none(hit);
    }
    let floor_dist = if hit.start_penetrating {
        0.0
    } else {
        hit.distance()
    };
    FloorResult {
        blocking_hit: true,
        walkable_floor: is_walkable(hit.normal, body.up, max_walk_slope_cos),
        hit,
        floor_dist,
    }
}
