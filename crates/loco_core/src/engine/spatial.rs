//! Uniform-grid spatial index
//!
//! Bodies are registered in every bucket their footprint overlaps. Queries
//! gather the buckets overlapping the query disc and return ids in ascending
//! order, so the hash-map layout never leaks into simulation order.

use fxhash::FxHashMap;

use super::body::{ObstacleId, UnitId};
use super::external::SpatialIndex;
use super::math::Vec3;
use super::sort_keys::{canonical_obstacle_order, canonical_unit_order};

type Bucket = (i32, i32);

const DEFAULT_BUCKET_SIZE: f32 = 64.0;

#[derive(Debug)]
pub struct GridSpatialIndex {
    bucket_size: f32,
    unit_buckets: FxHashMap<Bucket, Vec<UnitId>>,
    unit_cells: FxHashMap<UnitId, Vec<Bucket>>,
    obstacle_buckets: FxHashMap<Bucket, Vec<ObstacleId>>,
    obstacle_cells: FxHashMap<ObstacleId, Vec<Bucket>>,
}

impl Default for GridSpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE)
    }
}

impl GridSpatialIndex {
    pub fn new(bucket_size: f32) -> Self {
        Self {
            bucket_size: bucket_size.max(1.0),
            unit_buckets: FxHashMap::default(),
            unit_cells: FxHashMap::default(),
            obstacle_buckets: FxHashMap::default(),
            obstacle_cells: FxHashMap::default(),
        }
    }

    fn covered(&self, pos: Vec3, radius: f32) -> Vec<Bucket> {
        let r = radius.max(0.0);
        let x0 = ((pos.x - r) / self.bucket_size).floor() as i32;
        let x1 = ((pos.x + r) / self.bucket_size).floor() as i32;
        let z0 = ((pos.z - r) / self.bucket_size).floor() as i32;
        let z1 = ((pos.z + r) / self.bucket_size).floor() as i32;
        let mut cells = Vec::with_capacity(((x1 - x0 + 1) * (z1 - z0 + 1)).max(1) as usize);
        for z in z0..=z1 {
            for x in x0..=x1 {
                cells.push((x, z));
            }
        }
        cells
    }

    pub fn unit_count(&self) -> usize {
        self.unit_cells.len()
    }
}

impl SpatialIndex for GridSpatialIndex {
    fn units_near(&self, pos: Vec3, radius: f32) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self
            .covered(pos, radius)
            .iter()
            .filter_map(|cell| self.unit_buckets.get(cell))
            .flatten()
            .copied()
            .collect();
        canonical_unit_order(&mut ids);
        ids
    }

    fn obstacles_near(&self, pos: Vec3, radius: f32) -> Vec<ObstacleId> {
        let mut ids: Vec<ObstacleId> = self
            .covered(pos, radius)
            .iter()
            .filter_map(|cell| self.obstacle_buckets.get(cell))
            .flatten()
            .copied()
            .collect();
        canonical_obstacle_order(&mut ids);
        ids
    }

    fn unit_moved(&mut self, id: UnitId, pos: Vec3, radius: f32) {
        let cells = self.covered(pos, radius);
        if self.unit_cells.get(&id) == Some(&cells) {
            return;
        }
        self.remove_unit(id);
        for cell in &cells {
            self.unit_buckets.entry(*cell).or_default().push(id);
        }
        self.unit_cells.insert(id, cells);
    }

    fn obstacle_placed(&mut self, id: ObstacleId, pos: Vec3, radius: f32) {
        self.remove_obstacle(id);
        let cells = self.covered(pos, radius);
        for cell in &cells {
            self.obstacle_buckets.entry(*cell).or_default().push(id);
        }
        self.obstacle_cells.insert(id, cells);
    }

    fn remove_unit(&mut self, id: UnitId) {
        if let Some(cells) = self.unit_cells.remove(&id) {
            for cell in cells {
                if let Some(bucket) = self.unit_buckets.get_mut(&cell) {
                    bucket.retain(|other| *other != id);
                    if bucket.is_empty() {
                        self.unit_buckets.remove(&cell);
                    }
                }
            }
        }
    }

    fn remove_obstacle(&mut self, id: ObstacleId) {
        if let Some(cells) = self.obstacle_cells.remove(&id) {
            for cell in cells {
                if let Some(bucket) = self.obstacle_buckets.get_mut(&cell) {
                    bucket.retain(|other| *other != id);
                    if bucket.is_empty() {
                        self.obstacle_buckets.remove(&cell);
                    }
                }
            }
        }
    }
}
