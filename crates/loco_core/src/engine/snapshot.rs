//! State Snapshot API for the locomotion simulation
//!
//! `snapshot()`/`restore()` for checkpointing and resuming a simulation. The
//! owning engine treats the encoded bytes as opaque and ships them through
//! its own save/network machinery.
//!
//! # Example
//! ```ignore
//! let mut sim = Simulation::new(/* ... */);
//! sim.run(100);
//!
//! // Capture state
//! let bytes = sim.snapshot().to_msgpack()?;
//!
//! // Continue elsewhere; collaborators are supplied fresh
//! let snapshot = SimulationSnapshot::from_msgpack(&bytes)?;
//! let resumed = Simulation::restore(snapshot, terrain, paths, spatial)?;
//! ```
//!
//! Path handles are not portable between oracle instances: restoring runs
//! each controller's `post_load` hook, which asks the new oracle again.

use serde::{Deserialize, Serialize};

use super::config::LocoConfig;
use super::world::{ObstacleStore, UnitStore};
use crate::error::{LocoError, Result};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete simulation state for checkpoint/restore
///
/// Contains all mutable state needed to deterministically resume. The
/// collaborators (terrain, path oracle, spatial index) are not included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Layout version, checked on restore
    pub version: u32,

    // ========== Time State ==========
    /// Last completed tick
    pub tick: u64,

    // ========== Tuning ==========
    #[serde(default)]
    pub config: LocoConfig,

    // ========== Bodies ==========
    /// Unit slots, indexed by id
    pub units: UnitStore,
    /// Static obstacle slots, indexed by id
    #[serde(default)]
    pub obstacles: ObstacleStore,

    // ========== RNG State ==========
    /// Original seed used to create the RNG
    pub rng_seed: u64,
    /// Current word position in the RNG stream (for restoration)
    pub rng_word_pos: u128,
}

impl SimulationSnapshot {
    /// Encode as named MessagePack
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack, rejecting other layout versions
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = rmp_serde::from_slice(bytes)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Serialize snapshot to pretty-printed JSON string
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize snapshot from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(LocoError::SnapshotVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(())
    }

    /// Number of live units held.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::body::UnitBody;
    use crate::engine::controller::GroundMover;
    use crate::engine::world::Unit;
    use crate::{MoveProfile, MoveStrategy, UnitId, Vec3};

    fn sample() -> SimulationSnapshot {
        let mut units = UnitStore::default();
        let pos = Vec3::new(10.0, 0.0, 20.0);
        let body = UnitBody::new(UnitId(1), 0, MoveProfile::default(), pos, 300);
        let mover = GroundMover::new(MoveStrategy::Modern, &body);
        units.put(Unit { body, mover });
        SimulationSnapshot {
            version: SNAPSHOT_VERSION,
            tick: 42,
            config: LocoConfig::default(),
            units,
            obstacles: ObstacleStore::default(),
            rng_seed: 7,
            rng_word_pos: 96,
        }
    }

    #[test]
    fn test_msgpack_preserves_state() {
        let snap = sample();
        let bytes = snap.to_msgpack().unwrap();
        let back = SimulationSnapshot::from_msgpack(&bytes).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.unit_count(), 1);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut snap = sample();
        snap.version = SNAPSHOT_VERSION + 1;
        let json = snap.to_json_pretty().unwrap();
        let err = SimulationSnapshot::from_json(&json).unwrap_err();
        assert!(matches!(err, LocoError::SnapshotVersion { found: 2, expected: 1 }));
    }

    #[test]
    fn test_garbage_bytes_are_an_error() {
        assert!(SimulationSnapshot::from_msgpack(&[0xc1, 0x00, 0x13]).is_err());
    }
}
