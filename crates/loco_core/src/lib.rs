//! # loco_core - Deterministic Ground-Unit Locomotion Core
//!
//! Turns a commanded destination into per-tick pose updates for ground units
//! inside a lockstep-synchronized simulation.
//!
//! ## Features
//! - Path following over waypoints streamed from a path oracle
//! - Acceleration and turn-rate limited speed/heading control
//! - Throttled obstacle-avoidance steering
//! - Mass/speed weighted collision resolution with push, crush and damage
//! - Skid/impact physics for units hit by external impulses
//! - Bit-reproducible tick driver with snapshot/restore and a sync checksum
//!
//! ## Usage
//! ```rust
//! use loco_core::engine::path_oracle::DirectPathOracle;
//! use loco_core::engine::spatial::GridSpatialIndex;
//! use loco_core::engine::terrain::HeightGrid;
//! use loco_core::{LocoConfig, MoveProfile, ProgressState, Simulation, UnitSpawn, Vec3};
//!
//! let mut sim = Simulation::new(
//!     LocoConfig::default(),
//!     Box::new(HeightGrid::flat(64, 64)),
//!     Box::new(DirectPathOracle::new()),
//!     Box::new(GridSpatialIndex::default()),
//!     7,
//! );
//! let id = sim
//!     .spawn_unit(UnitSpawn::new(MoveProfile::default(), Vec3::new(40.0, 0.0, 40.0)))
//!     .unwrap();
//! sim.start_moving(id, Vec3::new(200.0, 0.0, 40.0), 8.0, None).unwrap();
//! sim.run(400);
//! assert_eq!(sim.unit(id).unwrap().mover.progress(), ProgressState::Done);
//! ```

// Simulation APIs often require many parameters for physics, state, etc.
#![allow(clippy::too_many_arguments)]
// Struct initialization pattern used intentionally
#![allow(clippy::field_reassign_with_default)]
// Loop style - grid walks read better with explicit indices
#![allow(clippy::needless_range_loop)]

pub mod engine;
pub mod error;

pub use engine::body::{Obstacle, ObstacleId, PhysicalState, UnitBody, UnitId};
pub use engine::config::LocoConfig;
pub use engine::controller::{GroundMover, MoveContext};
pub use engine::events::{FailureReason, MoveEvent, MoveEventKind};
pub use engine::external::{PathId, PathOracle, SpatialIndex, TerrainSampler};
pub use engine::math::Vec3;
pub use engine::profile::{CapabilityProfile, MoveProfile};
pub use engine::scenario_loader::{load_scenario, Scenario, ScenarioReport};
pub use engine::snapshot::SimulationSnapshot;
pub use engine::state::{MovementState, ProgressState};
pub use engine::strategy::MoveStrategy;
pub use engine::world::{PointTarget, Simulation, Unit, UnitSpawn};
pub use error::{LocoError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
