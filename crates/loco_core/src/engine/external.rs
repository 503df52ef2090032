//! Collaborator seams
//!
//! The locomotion core does not search paths, sample heightmaps or index
//! bodies itself. It talks to three collaborators through these traits; the
//! crate ships reference implementations in [`super::path_oracle`],
//! [`super::terrain`] and [`super::spatial`].
//!
//! All three are called from inside the synchronized tick, so implementations
//! must be deterministic: same calls in the same order, same answers.

use serde::{Deserialize, Serialize};

use super::body::{ObstacleId, UnitId};
use super::math::Vec3;
use super::physics_constants::grid::MOVE_SQUARE_SIZE;
use super::profile::CapabilityProfile;

/// Opaque handle to a path held by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(pub u32);

pub trait PathOracle {
    /// Plan from `start` to within `goal_radius` of `goal`; `None` when unreachable.
    fn request_path(
        &mut self,
        capability: &CapabilityProfile,
        terrain: &dyn TerrainSampler,
        start: Vec3,
        goal: Vec3,
        goal_radius: f32,
        caller: UnitId,
    ) -> Option<PathId>;

    /// Next waypoint after `caller_pos`, skipping any within `lookahead` of it.
    /// `None` is the sentinel for a lost or unknown path.
    fn next_waypoint(&mut self, path: PathId, caller_pos: Vec3, lookahead: f32) -> Option<Vec3>;

    fn delete_path(&mut self, path: PathId);

    /// Periodic refresh; may re-validate the remaining waypoints.
    fn update_path(&mut self, path: PathId, terrain: &dyn TerrainSampler);

    /// Passive notification that passability changed inside a box.
    fn terrain_changed(&mut self, _min: Vec3, _max: Vec3) {}
}

pub trait TerrainSampler {
    fn height(&self, x: f32, z: f32) -> f32;

    /// 0 = flat, 1 = vertical
    fn slope(&self, x: f32, z: f32) -> f32;

    fn normal(&self, x: f32, z: f32) -> Vec3;

    /// Speed multiplier in [0, 1] for a capability at a position (0 = impassable).
    fn speed_modifier(&self, capability: &CapabilityProfile, pos: Vec3) -> f32;

    /// Map extent (x, z) in elmos.
    fn bounds(&self) -> (f32, f32);

    /// Speed multiplier of a whole move square.
    fn cell_speed(&self, capability: &CapabilityProfile, cell_x: i32, cell_z: i32) -> f32 {
        let (width, depth) = self.bounds();
        let x = (cell_x as f32 + 0.5) * MOVE_SQUARE_SIZE;
        let z = (cell_z as f32 + 0.5) * MOVE_SQUARE_SIZE;
        if cell_x < 0 || cell_z < 0 || x > width || z > depth {
            return 0.0;
        }
        self.speed_modifier(capability, Vec3::new(x, 0.0, z))
    }

    /// Clamp a position into the map.
    fn clamp_in_bounds(&self, pos: Vec3) -> Vec3 {
        let (width, depth) = self.bounds();
        Vec3::new(pos.x.clamp(0.0, width - 1.0), pos.y, pos.z.clamp(0.0, depth - 1.0))
    }
}

/// Shared proximity index, mutated in place by the tick driver.
///
/// Query results are conservative (callers check exact distances) and come
/// back sorted by ascending id.
pub trait SpatialIndex {
    fn units_near(&self, pos: Vec3, radius: f32) -> Vec<UnitId>;

    fn obstacles_near(&self, pos: Vec3, radius: f32) -> Vec<ObstacleId>;

    fn unit_moved(&mut self, id: UnitId, pos: Vec3, radius: f32);

    fn obstacle_placed(&mut self, id: ObstacleId, pos: Vec3, radius: f32);

    fn remove_unit(&mut self, id: UnitId);

    fn remove_obstacle(&mut self, id: ObstacleId);
}
