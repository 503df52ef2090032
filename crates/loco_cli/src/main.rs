//! Locomotion scenario CLI
//!
//! Runs scenario files headless, checks lockstep determinism and writes
//! state snapshots.

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "loco")]
#[command(about = "Run and verify ground-unit locomotion scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run scenario files and check their assertions
    Run {
        /// Scenario files (YAML, or JSON by extension)
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,

        /// Write the reports as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Replay a scenario several times and compare state hashes
    CheckDeterminism {
        /// Scenario file
        scenario: PathBuf,

        /// Number of replays
        #[arg(long, default_value = "3")]
        runs: usize,

        /// Compare hashes every N ticks
        #[arg(long, default_value = "30")]
        every: u64,
    },

    /// Run a scenario and save its final state as a snapshot
    Snapshot {
        /// Scenario file
        scenario: PathBuf,

        /// Output snapshot file (MsgPack+LZ4)
        #[arg(long)]
        out: PathBuf,

        /// Verify the snapshot after writing
        #[arg(long, default_value = "false")]
        verify: bool,

        /// Output metadata JSON file
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Resume a snapshot on a scenario's map and keep simulating
    Resume {
        /// Scenario file providing the map
        scenario: PathBuf,

        /// Snapshot file written by `snapshot`
        #[arg(long)]
        from: PathBuf,

        /// Ticks to simulate after restoring
        #[arg(long, default_value = "0")]
        ticks: u64,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scenarios, report } => {
            let mut reports = Vec::with_capacity(scenarios.len());
            for path in &scenarios {
                let result = loco_cli::run_scenario_file(path)?;
                let status = if result.passed() { "ok" } else { "FAILED" };
                println!(
                    "{:<32} {:>6} ticks  {}  {}",
                    result.id,
                    result.ticks,
                    &result.state_hash[..16],
                    status
                );
                for failure in &result.assertion_failures {
                    println!("    {}", failure);
                }
                reports.push(result);
            }
            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&reports)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write report {}", path.display()))?;
                println!("\nReport saved to: {}", path.display());
            }
            let failed = reports.iter().filter(|r| !r.passed()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} scenarios failed", failed, reports.len());
            }
        }

        Commands::CheckDeterminism { scenario, runs, every } => {
            let scenario = loco_core::load_scenario(&scenario)
                .with_context(|| format!("Failed to load scenario {}", scenario.display()))?;
            let report = loco_cli::check_determinism(&scenario, runs, every)?;
            match report.divergence {
                None => {
                    let last = report.trace.last().map(|(_, h)| h.as_str()).unwrap_or("-");
                    println!(
                        "{}: {} runs identical, final hash {}",
                        report.scenario, report.runs, last
                    );
                }
                Some((run, tick)) => {
                    anyhow::bail!("{}: run {} diverged at tick {}", report.scenario, run, tick);
                }
            }
        }

        Commands::Snapshot {
            scenario,
            out,
            verify,
            metadata,
        } => {
            let scenario = loco_core::load_scenario(&scenario)
                .with_context(|| format!("Failed to load scenario {}", scenario.display()))?;
            let (_, sim) = scenario.run_with_simulation()?;
            let meta = loco_cli::save_snapshot(&sim, &out)?;
            print_metadata(&meta);

            if verify {
                verify_snapshot_integrity(&out, &meta.checksum)?;
            }
            if let Some(metadata_path) = metadata {
                save_metadata(&metadata_path, &meta)?;
            }
        }

        Commands::Resume { scenario, from, ticks } => {
            let scenario = loco_core::load_scenario(&scenario)
                .with_context(|| format!("Failed to load scenario {}", scenario.display()))?;
            let mut sim = loco_cli::resume_snapshot(&scenario, &from)?;
            let start = sim.tick();
            sim.run(ticks);
            println!("resumed at tick {}, now at tick {}", start, sim.tick());
            for unit in sim.units() {
                println!(
                    "  {}  pos=({:.1}, {:.1}, {:.1})  heading={}  {:?}",
                    unit.body.id,
                    unit.body.pos.x,
                    unit.body.pos.y,
                    unit.body.pos.z,
                    unit.body.heading,
                    unit.mover.progress()
                );
            }
            println!("state hash: {}", sim.state_hash()?);
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn print_metadata(meta: &loco_cli::SnapshotMetadata) {
    println!("Snapshot written");
    println!("   Tick:            {}", meta.tick);
    println!("   Units:           {}", meta.unit_count);
    println!("   Encoded size:    {} bytes", meta.original_size);
    println!("   Compressed size: {} bytes", meta.compressed_size);
    println!("   Compression:     {:.1}%", meta.compression_ratio * 100.0);
    println!("   Checksum:        {}", meta.checksum);
    println!("   State hash:      {}", meta.state_hash);
}

#[cfg(feature = "cli")]
fn verify_snapshot_integrity(path: &std::path::Path, checksum: &str) -> Result<()> {
    if loco_cli::verify_snapshot(path, checksum)? {
        println!("Snapshot verification passed");
        Ok(())
    } else {
        anyhow::bail!("Snapshot verification failed - checksum mismatch")
    }
}

#[cfg(feature = "cli")]
fn save_metadata(path: &PathBuf, meta: &loco_cli::SnapshotMetadata) -> Result<()> {
    let metadata_json = serde_json::to_string_pretty(meta)?;
    std::fs::write(path, metadata_json)?;
    println!("Metadata saved to: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("loco CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
