//! Straight-line path oracle
//!
//! Reference [`PathOracle`] for open maps: a path is the straight segment from
//! start to goal, cut into `PATH_RESOLUTION` waypoints. Requests are refused
//! when the goal area or the segment crosses impassable terrain; there is no
//! search around obstacles.

use fxhash::FxHashMap;
use log::debug;

use super::body::UnitId;
use super::external::{PathId, PathOracle, TerrainSampler};
use super::math::{flat, flat_dist, flat_len, Vec3};
use super::physics_constants::grid::{MIN_PASSABLE_SPEED_MOD, PATH_RESOLUTION, SQUARE_SIZE};
use super::profile::CapabilityProfile;

#[derive(Debug, Clone)]
struct StraightPath {
    capability: CapabilityProfile,
    waypoints: Vec<Vec3>,
    cursor: usize,
    dirty: bool,
    lost: bool,
}

#[derive(Debug, Default)]
pub struct DirectPathOracle {
    paths: FxHashMap<PathId, StraightPath>,
    next_id: u32,
    requests: u64,
}

impl DirectPathOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently held.
    pub fn live_paths(&self) -> usize {
        self.paths.len()
    }

    /// Path requests answered so far (found or not).
    pub fn request_count(&self) -> u64 {
        self.requests
    }

    fn segment_passable(
        capability: &CapabilityProfile,
        terrain: &dyn TerrainSampler,
        from: Vec3,
        to: Vec3,
    ) -> bool {
        let step = SQUARE_SIZE * 0.5;
        let len = flat_dist(from, to);
        let samples = (len / step).ceil().max(1.0) as usize;
        (1..=samples).all(|i| {
            let t = i as f32 / samples as f32;
            let p = from + (to - from) * t;
            terrain.speed_modifier(capability, p) > MIN_PASSABLE_SPEED_MOD
        })
    }

    fn build_waypoints(start: Vec3, end: Vec3) -> Vec<Vec3> {
        let delta = flat(end - start);
        let len = flat_len(delta);
        let count = (len / PATH_RESOLUTION).ceil().max(1.0) as usize;
        (1..=count)
            .map(|i| {
                if i == count {
                    end
                } else {
                    start + delta * (i as f32 / count as f32)
                }
            })
            .collect()
    }
}

impl PathOracle for DirectPathOracle {
    fn request_path(
        &mut self,
        capability: &CapabilityProfile,
        terrain: &dyn TerrainSampler,
        start: Vec3,
        goal: Vec3,
        goal_radius: f32,
        caller: UnitId,
    ) -> Option<PathId> {
        self.requests += 1;
        let dist = flat_dist(start, goal);
        // Stop at the edge of the goal disc when the goal itself is blocked.
        let end = if terrain.speed_modifier(capability, goal) > MIN_PASSABLE_SPEED_MOD {
            goal
        } else if dist > goal_radius && goal_radius > 0.0 {
            let back = (start - goal) * (goal_radius / dist);
            let edge = goal + back;
            if terrain.speed_modifier(capability, edge) <= MIN_PASSABLE_SPEED_MOD {
                debug!("{}: no path, goal area blocked", caller);
                return None;
            }
            edge
        } else {
            debug!("{}: no path, goal blocked", caller);
            return None;
        };

        if !Self::segment_passable(capability, terrain, start, end) {
            debug!("{}: no path, straight line blocked", caller);
            return None;
        }

        self.next_id += 1;
        let id = PathId(self.next_id);
        self.paths.insert(
            id,
            StraightPath {
                capability: capability.clone(),
                waypoints: Self::build_waypoints(start, end),
                cursor: 0,
                dirty: false,
                lost: false,
            },
        );
        Some(id)
    }

    fn next_waypoint(&mut self, path: PathId, caller_pos: Vec3, lookahead: f32) -> Option<Vec3> {
        let path = self.paths.get_mut(&path)?;
        if path.lost {
            return None;
        }
        let last = path.waypoints.len().checked_sub(1)?;
        while path.cursor < last
            && flat_dist(path.waypoints[path.cursor], caller_pos) <= lookahead
        {
            path.cursor += 1;
        }
        let waypoint = path.waypoints[path.cursor];
        if path.cursor < last {
            path.cursor += 1;
        }
        Some(waypoint)
    }

    fn delete_path(&mut self, path: PathId) {
        self.paths.remove(&path);
    }

    fn update_path(&mut self, path: PathId, terrain: &dyn TerrainSampler) {
        let Some(path) = self.paths.get_mut(&path) else {
            return;
        };
        if !path.dirty {
            return;
        }
        path.dirty = false;
        let remaining = &path.waypoints[path.cursor.saturating_sub(1)..];
        let blocked = remaining
            .windows(2)
            .any(|w| !Self::segment_passable(&path.capability, terrain, w[0], w[1]));
        if blocked {
            path.lost = true;
        }
    }

    fn terrain_changed(&mut self, _min: Vec3, _max: Vec3) {
        for path in self.paths.values_mut() {
            path.dirty = true;
        }
    }
}
