//! Heightmap terrain sampler
//!
//! Corner heights on a `SQUARE_SIZE` grid, a terrain type per square and an
//! optional hard-blocked flag per square. Used by the scenario runner and
//! tests; games plug in their own [`TerrainSampler`].

use serde::{Deserialize, Serialize};

use super::external::TerrainSampler;
use super::math::{safe_normalize, Vec3};
use super::physics_constants::grid::SQUARE_SIZE;
use super::profile::CapabilityProfile;
use crate::error::{LocoError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightGrid {
    /// Squares along x
    width: usize,
    /// Squares along z
    depth: usize,
    /// (width + 1) * (depth + 1) corner heights, row-major in z
    heights: Vec<f32>,
    terrain_types: Vec<u8>,
    blocked: Vec<bool>,
}

impl HeightGrid {
    /// Level map of `width` x `depth` squares at height 0.
    pub fn flat(width: usize, depth: usize) -> Self {
        Self {
            width,
            depth,
            heights: vec![0.0; (width + 1) * (depth + 1)],
            terrain_types: vec![0; width * depth],
            blocked: vec![false; width * depth],
        }
    }

    pub fn from_heights(width: usize, depth: usize, heights: Vec<f32>) -> Result<Self> {
        if width == 0 || depth == 0 {
            return Err(LocoError::InvalidScenario("terrain must be at least one square".into()));
        }
        let expected = (width + 1) * (depth + 1);
        if heights.len() != expected {
            return Err(LocoError::InvalidScenario(format!(
                "terrain needs {} corner heights, got {}",
                expected,
                heights.len()
            )));
        }
        let mut grid = Self::flat(width, depth);
        grid.heights = heights;
        Ok(grid)
    }

    pub fn width_squares(&self) -> usize {
        self.width
    }

    pub fn depth_squares(&self) -> usize {
        self.depth
    }

    pub fn set_corner_height(&mut self, x: usize, z: usize, height: f32) {
        if x <= self.width && z <= self.depth {
            self.heights[z * (self.width + 1) + x] = height;
        }
    }

    pub fn set_terrain_type(&mut self, x: usize, z: usize, terrain_type: u8) {
        if x < self.width && z < self.depth {
            self.terrain_types[z * self.width + x] = terrain_type;
        }
    }

    /// Mark every square overlapping the elmo rectangle as impassable.
    pub fn block_rect(&mut self, min: Vec3, max: Vec3) {
        let x0 = (min.x / SQUARE_SIZE).floor().max(0.0) as usize;
        let z0 = (min.z / SQUARE_SIZE).floor().max(0.0) as usize;
        let x1 = ((max.x / SQUARE_SIZE).ceil().max(0.0) as usize).min(self.width);
        let z1 = ((max.z / SQUARE_SIZE).ceil().max(0.0) as usize).min(self.depth);
        for z in z0..z1 {
            for x in x0..x1 {
                self.blocked[z * self.width + x] = true;
            }
        }
    }

    #[inline]
    fn corner(&self, x: usize, z: usize) -> f32 {
        let x = x.min(self.width);
        let z = z.min(self.depth);
        self.heights[z * (self.width + 1) + x]
    }

    /// Square containing an elmo position, if inside the map.
    #[inline]
    fn square_at(&self, x: f32, z: f32) -> Option<(usize, usize)> {
        if x < 0.0 || z < 0.0 {
            return None;
        }
        let sx = (x / SQUARE_SIZE) as usize;
        let sz = (z / SQUARE_SIZE) as usize;
        if sx >= self.width || sz >= self.depth {
            return None;
        }
        Some((sx, sz))
    }

    fn square_speed(&self, capability: &CapabilityProfile, sx: usize, sz: usize) -> f32 {
        let idx = sz * self.width + sx;
        if self.blocked[idx] {
            return 0.0;
        }
        let cx = (sx as f32 + 0.5) * SQUARE_SIZE;
        let cz = (sz as f32 + 0.5) * SQUARE_SIZE;
        let speed = capability.terrain_speed(self.terrain_types[idx])
            * capability.slope_speed(self.slope(cx, cz));
        speed.clamp(0.0, 1.0)
    }
}

impl TerrainSampler for HeightGrid {
    fn height(&self, x: f32, z: f32) -> f32 {
        let max_x = self.width as f32 * SQUARE_SIZE;
        let max_z = self.depth as f32 * SQUARE_SIZE;
        let fx = x.clamp(0.0, max_x) / SQUARE_SIZE;
        let fz = z.clamp(0.0, max_z) / SQUARE_SIZE;
        let ix = (fx.floor() as usize).min(self.width.saturating_sub(1));
        let iz = (fz.floor() as usize).min(self.depth.saturating_sub(1));
        let tx = fx - ix as f32;
        let tz = fz - iz as f32;
        let h00 = self.corner(ix, iz);
        let h10 = self.corner(ix + 1, iz);
        let h01 = self.corner(ix, iz + 1);
        let h11 = self.corner(ix + 1, iz + 1);
        let near = h00 + (h10 - h00) * tx;
        let far = h01 + (h11 - h01) * tx;
        near + (far - near) * tz
    }

    fn slope(&self, x: f32, z: f32) -> f32 {
        (1.0 - self.normal(x, z).y).clamp(0.0, 1.0)
    }

    fn normal(&self, x: f32, z: f32) -> Vec3 {
        let max_x = self.width as f32 * SQUARE_SIZE;
        let max_z = self.depth as f32 * SQUARE_SIZE;
        let ix = ((x.clamp(0.0, max_x) / SQUARE_SIZE) as usize).min(self.width.saturating_sub(1));
        let iz = ((z.clamp(0.0, max_z) / SQUARE_SIZE) as usize).min(self.depth.saturating_sub(1));
        let h00 = self.corner(ix, iz);
        let h10 = self.corner(ix + 1, iz);
        let h01 = self.corner(ix, iz + 1);
        let h11 = self.corner(ix + 1, iz + 1);
        let dhdx = ((h10 - h00) + (h11 - h01)) * 0.5 / SQUARE_SIZE;
        let dhdz = ((h01 - h00) + (h11 - h10)) * 0.5 / SQUARE_SIZE;
        safe_normalize(Vec3::new(-dhdx, 1.0, -dhdz))
    }

    fn speed_modifier(&self, capability: &CapabilityProfile, pos: Vec3) -> f32 {
        match self.square_at(pos.x, pos.z) {
            Some((sx, sz)) => self.square_speed(capability, sx, sz),
            None => 0.0,
        }
    }

    fn bounds(&self) -> (f32, f32) {
        (self.width as f32 * SQUARE_SIZE, self.depth as f32 * SQUARE_SIZE)
    }

    /// Slowest of the four heightmap squares in the move square.
    fn cell_speed(&self, capability: &CapabilityProfile, cell_x: i32, cell_z: i32) -> f32 {
        if cell_x < 0 || cell_z < 0 {
            return 0.0;
        }
        let sx = cell_x as usize * 2;
        let sz = cell_z as usize * 2;
        if sx >= self.width || sz >= self.depth {
            return 0.0;
        }
        let mut speed = 1.0f32;
        for dz in 0..2 {
            for dx in 0..2 {
                let (x, z) = (sx + dx, sz + dz);
                if x < self.width && z < self.depth {
                    speed = speed.min(self.square_speed(capability, x, z));
                }
            }
        }
        speed
    }
}
