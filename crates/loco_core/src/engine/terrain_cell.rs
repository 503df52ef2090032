//! Move-square bookkeeping
//!
//! The controller tracks which move square (`MOVE_SQUARE_SIZE` elmos) the
//! unit occupies. Entering a new square clamps diagonal corner cuts past
//! impassable squares; the lookahead walks [`super::line_table`] toward the
//! waypoints to spot blockage before the unit gets there.

use super::body::UnitId;
use super::external::{SpatialIndex, TerrainSampler};
use super::line_table::crossed_cells;
use super::math::{flat_dist, flat_dist_sq, Vec3};
use super::physics_constants::grid::{MIN_PASSABLE_SPEED_MOD, MOVE_SQUARE_SIZE};
use super::profile::CapabilityProfile;
use super::world::{ObstacleStore, UnitStore};

pub type Cell = (i32, i32);

/// Inset from a square edge when clamping back into it.
const EDGE_INSET: f32 = 0.01;

/// Share of a square an impassable or structure-blocked square counts as.
const STRUCTURE_WEIGHT: f32 = 0.3;

#[inline]
pub fn move_square_of(pos: Vec3) -> Cell {
    (
        (pos.x / MOVE_SQUARE_SIZE).floor() as i32,
        (pos.z / MOVE_SQUARE_SIZE).floor() as i32,
    )
}

#[inline]
pub fn cell_center(cell: Cell) -> Vec3 {
    Vec3::new(
        (cell.0 as f32 + 0.5) * MOVE_SQUARE_SIZE,
        0.0,
        (cell.1 as f32 + 0.5) * MOVE_SQUARE_SIZE,
    )
}

#[inline]
fn passable(capability: &CapabilityProfile, terrain: &dyn TerrainSampler, cell: Cell) -> bool {
    terrain.cell_speed(capability, cell.0, cell.1) > MIN_PASSABLE_SPEED_MOD
}

/// A live, blocking static obstacle covers `point`.
pub fn static_blocker_at(
    spatial: &dyn SpatialIndex,
    obstacles: &ObstacleStore,
    point: Vec3,
) -> bool {
    spatial
        .obstacles_near(point, MOVE_SQUARE_SIZE * 0.5)
        .into_iter()
        .filter_map(|id| obstacles.get(id))
        .any(|o| !o.dead && o.blocking && flat_dist(o.pos, point) < o.radius)
}

/// Another live, grounded unit covers `point`.
fn unit_at(spatial: &dyn SpatialIndex, units: &UnitStore, point: Vec3, exclude: UnitId) -> bool {
    spatial
        .units_near(point, MOVE_SQUARE_SIZE * 0.5)
        .into_iter()
        .filter(|id| *id != exclude)
        .filter_map(|id| units.get(id))
        .any(|u| {
            !u.body.dead && !u.body.in_transport && flat_dist(u.body.pos, point) < u.body.radius()
        })
}

/// Impassable terrain or a static blocker at the square's centre.
pub fn cell_blocked(
    capability: &CapabilityProfile,
    terrain: &dyn TerrainSampler,
    spatial: &dyn SpatialIndex,
    obstacles: &ObstacleStore,
    cell: Cell,
) -> bool {
    !passable(capability, terrain, cell) || static_blocker_at(spatial, obstacles, cell_center(cell))
}

/// Whether the straight line between two squares crosses a blocked square.
///
/// Only the intermediate squares are checked. Offsets beyond the lookahead
/// table are reported clear.
pub fn line_blocked(
    capability: &CapabilityProfile,
    terrain: &dyn TerrainSampler,
    spatial: &dyn SpatialIndex,
    obstacles: &ObstacleStore,
    from: Cell,
    to: Cell,
) -> bool {
    let Some(cells) = crossed_cells(to.0 - from.0, to.1 - from.1) else {
        return false;
    };
    cells
        .iter()
        .any(|&(dx, dz)| {
            cell_blocked(capability, terrain, spatial, obstacles, (from.0 + dx, from.1 + dz))
        })
}

/// Keep a unit from cutting diagonally past an impassable neighbour.
///
/// Checks the axis the unit is moving less along first, like a driver
/// squeezing along a wall. Returns the square the unit ends up in.
pub fn clamp_diagonal(
    capability: &CapabilityProfile,
    terrain: &dyn TerrainSampler,
    pos: &mut Vec3,
    front: Vec3,
    old: Cell,
    new: Cell,
) -> Cell {
    if !passable(capability, terrain, old) {
        return new;
    }
    let mut result = new;
    let clamp_x = |pos: &mut Vec3, result: &mut Cell| {
        if result.0 != old.0 && !passable(capability, terrain, (result.0, old.1)) {
            pos.x = if result.0 > old.0 {
                old.0 as f32 * MOVE_SQUARE_SIZE + (MOVE_SQUARE_SIZE - EDGE_INSET)
            } else {
                old.0 as f32 * MOVE_SQUARE_SIZE + EDGE_INSET
            };
            result.0 = old.0;
        }
    };
    let clamp_z = |pos: &mut Vec3, result: &mut Cell| {
        if result.1 != old.1 && !passable(capability, terrain, (old.0, result.1)) {
            pos.z = if result.1 > old.1 {
                old.1 as f32 * MOVE_SQUARE_SIZE + (MOVE_SQUARE_SIZE - EDGE_INSET)
            } else {
                old.1 as f32 * MOVE_SQUARE_SIZE + EDGE_INSET
            };
            result.1 = old.1;
        }
    };
    if front.x.abs() < front.z.abs() {
        clamp_x(pos, &mut result);
        clamp_z(pos, &mut result);
    } else {
        clamp_z(pos, &mut result);
        clamp_x(pos, &mut result);
    }
    result
}

/// Whether the area around `goal` is open enough to keep trying for it.
///
/// Looks at every square centre inside the disc of radius
/// `dist(pos, goal)` around the goal. Impassable or structure-blocked
/// squares weigh [`STRUCTURE_WEIGHT`], squares occupied by other units
/// count as fully blocked.
pub fn goal_feasible(
    capability: &CapabilityProfile,
    terrain: &dyn TerrainSampler,
    spatial: &dyn SpatialIndex,
    units: &UnitStore,
    obstacles: &ObstacleStore,
    caller: UnitId,
    pos: Vec3,
    goal: Vec3,
    clog_fraction: f32,
) -> bool {
    let goal_dist = flat_dist(pos, goal);
    let (width, depth) = terrain.bounds();
    let max_x = ((width / MOVE_SQUARE_SIZE) as i32 - 1).max(0);
    let max_z = ((depth / MOVE_SQUARE_SIZE) as i32 - 1).max(0);
    let min_cx = (((goal.x - goal_dist) / MOVE_SQUARE_SIZE) as i32).max(0);
    let min_cz = (((goal.z - goal_dist) / MOVE_SQUARE_SIZE) as i32).max(0);
    let max_cx = (((goal.x + goal_dist) / MOVE_SQUARE_SIZE) as i32).min(max_x);
    let max_cz = (((goal.z + goal_dist) / MOVE_SQUARE_SIZE) as i32).min(max_z);

    let mut blocked = 0.0f32;
    let mut squares = 0.0f32;
    for cz in min_cz..=max_cz {
        for cx in min_cx..=max_cx {
            let center = cell_center((cx, cz));
            if flat_dist_sq(center, goal) >= goal_dist * goal_dist {
                continue;
            }
            if !passable(capability, terrain, (cx, cz))
                || static_blocker_at(spatial, obstacles, center)
            {
                blocked += STRUCTURE_WEIGHT;
                squares += STRUCTURE_WEIGHT;
            } else {
                squares += 1.0;
                if unit_at(spatial, units, center, caller) {
                    blocked += 1.0;
                }
            }
        }
    }
    squares <= 0.0 || blocked / squares <= clog_fraction
}
