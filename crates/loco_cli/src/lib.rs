//! Headless scenario runner support
//!
//! Snapshot files: MessagePack snapshot → LZ4 → SHA256 checksum, plus
//! determinism checks that replay a scenario and compare state hashes.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use loco_core::engine::path_oracle::DirectPathOracle;
use loco_core::engine::spatial::GridSpatialIndex;
use loco_core::{load_scenario, Scenario, ScenarioReport, Simulation, SimulationSnapshot};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Snapshot file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Snapshot layout version
    pub snapshot_version: u32,
    /// Tick the snapshot was taken at
    pub tick: u64,
    pub unit_count: usize,
    /// SHA256 of the compressed file (hex)
    pub checksum: String,
    /// Simulation state hash at `tick`
    pub state_hash: String,
    /// Encoded size before compression (bytes)
    pub original_size: u64,
    /// File size (bytes)
    pub compressed_size: u64,
    /// compressed / original
    pub compression_ratio: f64,
}

/// Outcome of replaying one scenario several times.
#[derive(Debug, Clone, Serialize)]
pub struct DeterminismReport {
    pub scenario: String,
    pub runs: usize,
    /// Hash trace of the first run
    pub trace: Vec<(u64, String)>,
    /// First `(run, tick)` whose hash differs from the first run
    pub divergence: Option<(usize, u64)>,
}

impl DeterminismReport {
    pub fn is_deterministic(&self) -> bool {
        self.divergence.is_none()
    }
}

/// Write `sim`'s state as an LZ4-compressed MessagePack snapshot.
pub fn save_snapshot(sim: &Simulation, out: &Path) -> Result<SnapshotMetadata> {
    let snapshot = sim.snapshot();
    let bytes = snapshot.to_msgpack().context("Failed to encode snapshot")?;
    let original_size = bytes.len() as u64;

    let compressed = lz4_flex::compress_prepend_size(&bytes);
    let compressed_size = compressed.len() as u64;

    let mut hasher = Sha256::new();
    hasher.update(&compressed);
    let checksum = format!("{:x}", hasher.finalize());

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    fs::write(out, &compressed)
        .with_context(|| format!("Failed to write snapshot: {}", out.display()))?;

    Ok(SnapshotMetadata {
        snapshot_version: snapshot.version,
        tick: snapshot.tick,
        unit_count: snapshot.unit_count(),
        checksum,
        state_hash: sim.state_hash()?,
        original_size,
        compressed_size,
        compression_ratio: compressed_size as f64 / original_size.max(1) as f64,
    })
}

/// Whether the file's SHA256 matches `expected_checksum`.
pub fn verify_snapshot(file: &Path, expected_checksum: &str) -> Result<bool> {
    let bytes =
        fs::read(file).with_context(|| format!("Failed to read snapshot: {}", file.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let actual = format!("{:x}", hasher.finalize());
    Ok(actual == expected_checksum)
}

pub fn load_snapshot(file: &Path) -> Result<SimulationSnapshot> {
    let compressed =
        fs::read(file).with_context(|| format!("Failed to read snapshot: {}", file.display()))?;
    let bytes = lz4_flex::decompress_size_prepended(&compressed)
        .context("Failed to decompress LZ4")?;
    let snapshot = SimulationSnapshot::from_msgpack(&bytes).context("Failed to decode snapshot")?;
    Ok(snapshot)
}

/// Resume a saved snapshot on the scenario's map with fresh reference collaborators.
pub fn resume_snapshot(scenario: &Scenario, file: &Path) -> Result<Simulation> {
    let snapshot = load_snapshot(file)?;
    let terrain = scenario.terrain()?;
    let sim = Simulation::restore(
        snapshot,
        Box::new(terrain),
        Box::new(DirectPathOracle::new()),
        Box::new(GridSpatialIndex::default()),
    )
    .context("Failed to restore snapshot")?;
    Ok(sim)
}

pub fn run_scenario_file(path: &Path) -> Result<ScenarioReport> {
    let scenario = load_scenario(path)
        .with_context(|| format!("Failed to load scenario {}", path.display()))?;
    let report = scenario
        .run()
        .with_context(|| format!("Scenario '{}' failed to run", scenario.id))?;
    if report.passed() {
        info!("{}: passed ({} ticks, hash {})", report.id, report.ticks, report.state_hash);
    } else {
        for failure in &report.assertion_failures {
            warn!("{}: {}", report.id, failure);
        }
    }
    Ok(report)
}

/// Replay `scenario` `runs` times and compare hash traces sampled every `every` ticks.
pub fn check_determinism(
    scenario: &Scenario,
    runs: usize,
    every: u64,
) -> Result<DeterminismReport> {
    if runs < 2 {
        bail!("determinism check needs at least 2 runs, got {}", runs);
    }
    let trace = scenario.hash_trace(every)?;
    let mut divergence = None;
    for run in 1..runs {
        let other = scenario.hash_trace(every)?;
        let first_diff = trace
            .iter()
            .zip(other.iter())
            .find(|(a, b)| a != b)
            .map(|((tick, _), _)| *tick);
        if let Some(tick) = first_diff {
            warn!("{}: run {} diverged at tick {}", scenario.id, run, tick);
            divergence = Some((run, tick));
            break;
        }
    }
    Ok(DeterminismReport {
        scenario: scenario.id.clone(),
        runs,
        trace,
        divergence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SCENARIO: &str = r#"
id: pair
seed: 3
ticks: 90
map: { width: 48, depth: 48 }
classes:
  tank:
    name: tank
    max_speed: 2.0
    acc_rate: 0.1
    dec_rate: 0.2
    turn_rate: 1000.0
    mass: 100.0
    radius: 8.0
units:
  - { class: tank, pos: [60.0, 60.0] }
  - { class: tank, pos: [200.0, 60.0], team: 1 }
orders:
  - { at: 0, type: move, unit: 1, goal: [60.0, 250.0] }
  - { at: 10, type: impulse, unit: 2, vector: [0.0, 4.0, 6.0] }
"#;

    #[test]
    fn test_save_verify_load_snapshot() -> Result<()> {
        let scenario = Scenario::from_yaml_str(SCENARIO)?;
        let (_, sim) = scenario.run_with_simulation()?;
        let out = NamedTempFile::new()?;

        let meta = save_snapshot(&sim, out.path())?;
        assert_eq!(meta.tick, 90);
        assert_eq!(meta.unit_count, 2);
        assert!(verify_snapshot(out.path(), &meta.checksum)?);
        assert!(!verify_snapshot(out.path(), "00")?);

        let loaded = load_snapshot(out.path())?;
        assert_eq!(loaded, sim.snapshot());
        Ok(())
    }

    #[test]
    fn test_resume_matches_saved_hash() -> Result<()> {
        let scenario = Scenario::from_yaml_str(SCENARIO)?;
        let mut sim = scenario.build()?;
        sim.run(5);
        let out = NamedTempFile::new()?;
        let meta = save_snapshot(&sim, out.path())?;
        let resumed = resume_snapshot(&scenario, out.path())?;
        assert_eq!(resumed.state_hash()?, meta.state_hash);
        Ok(())
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"not a snapshot")?;
        assert!(load_snapshot(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_scenario_is_deterministic() -> Result<()> {
        let scenario = Scenario::from_yaml_str(SCENARIO)?;
        let report = check_determinism(&scenario, 3, 30)?;
        assert!(report.is_deterministic());
        assert_eq!(report.trace.len(), 3);
        Ok(())
    }

    #[test]
    fn test_single_run_rejected() {
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        assert!(check_determinism(&scenario, 1, 30).is_err());
    }

    #[test]
    fn test_run_scenario_file() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        file.write_all(SCENARIO.as_bytes())?;
        let report = run_scenario_file(file.path())?;
        assert!(report.passed());
        assert_eq!(report.units.len(), 2);
        Ok(())
    }
}
