//! Scenario files
//!
//! A scenario is a small map, a set of unit classes, the units and obstacles
//! placed on it, and orders timed by tick. Running one builds a
//! [`Simulation`] with the reference collaborators, plays it for `ticks`
//! ticks and checks the assertions against the raised events and final
//! state.
//!
//! Units get ids in declaration order starting at 1, obstacles likewise;
//! orders and assertions refer to units by that id.
//!
//! ```yaml
//! id: straight_line
//! seed: 7
//! ticks: 120
//! map: { width: 64, depth: 64 }
//! classes:
//!   tank: { name: tank, max_speed: 2.0, acc_rate: 0.1, dec_rate: 0.2,
//!           turn_rate: 1000.0, mass: 100.0, radius: 8.0 }
//! units:
//!   - { class: tank, pos: [40.0, 40.0] }
//! orders:
//!   - { at: 0, type: move, unit: 1, goal: [140.0, 40.0] }
//! assertions:
//!   - { event: arrived, count_min: 1 }
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::body::{Obstacle, UnitId};
use super::config::LocoConfig;
use super::events::MoveEvent;
use super::math::Vec3;
use super::path_oracle::DirectPathOracle;
use super::profile::MoveProfile;
use super::spatial::GridSpatialIndex;
use super::state::ProgressState;
use super::strategy::MoveStrategy;
use super::terrain::HeightGrid;
use super::world::{PointTarget, Simulation, UnitSpawn};
use crate::error::{LocoError, Result};

const DEFAULT_GOAL_RADIUS: f32 = 8.0;
const DEFAULT_POS_TOLERANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioPreset {
    Modern,
    Classic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioRect {
    /// `[x, z]` elmos
    pub min: [f32; 2],
    pub max: [f32; 2],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMap {
    /// Squares along x
    pub width: usize,
    /// Squares along z
    pub depth: usize,
    /// `(width + 1) * (depth + 1)` corner heights; flat when absent
    #[serde(default)]
    pub heights: Option<Vec<f32>>,
    /// Impassable areas
    #[serde(default)]
    pub blocked: Vec<ScenarioRect>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioUnit {
    pub class: String,
    /// `[x, z]` elmos; height follows the terrain
    pub pos: [f32; 2],
    #[serde(default)]
    pub team: u8,
    #[serde(default)]
    pub heading: i16,
    #[serde(default)]
    pub strategy: Option<MoveStrategy>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioObstacle {
    pub pos: [f32; 2],
    pub radius: f32,
    pub mass: f32,
    #[serde(default = "default_true")]
    pub blocking: bool,
    #[serde(default = "default_true")]
    pub crush_resistant: bool,
    #[serde(default)]
    pub min_collision_speed: Option<f32>,
}

fn default_true() -> bool {
    true
}

fn default_goal_radius() -> f32 {
    DEFAULT_GOAL_RADIUS
}

fn default_tolerance() -> f32 {
    DEFAULT_POS_TOLERANCE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioOrder {
    Move {
        unit: u32,
        goal: [f32; 2],
        #[serde(default = "default_goal_radius")]
        radius: f32,
        #[serde(default)]
        speed: Option<f32>,
    },
    Stop {
        unit: u32,
    },
    Impulse {
        unit: u32,
        vector: [f32; 3],
    },
    PointAt {
        unit: u32,
        target: [f32; 2],
        #[serde(default)]
        distance: f32,
        #[serde(default = "default_true")]
        aggressive: bool,
    },
    PointAtUnit {
        unit: u32,
        target: u32,
        #[serde(default)]
        distance: f32,
        #[serde(default = "default_true")]
        aggressive: bool,
    },
    SetMaxSpeed {
        unit: u32,
        speed: f32,
    },
}

impl ScenarioOrder {
    fn unit(&self) -> u32 {
        match self {
            ScenarioOrder::Move { unit, .. }
            | ScenarioOrder::Stop { unit }
            | ScenarioOrder::Impulse { unit, .. }
            | ScenarioOrder::PointAt { unit, .. }
            | ScenarioOrder::PointAtUnit { unit, .. }
            | ScenarioOrder::SetMaxSpeed { unit, .. } => *unit,
        }
    }
}

/// An order issued right before tick `at + 1` is simulated.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimedOrder {
    pub at: u64,
    #[serde(flatten)]
    pub order: ScenarioOrder,
}

/// Bounds on how often an event kind was raised.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioAssertion {
    /// Event name as in [`super::events::MoveEventKind::name`]
    pub event: String,
    /// Only count events raised by this unit
    #[serde(default)]
    pub unit: Option<u32>,
    #[serde(default)]
    pub count_min: Option<u32>,
    #[serde(default)]
    pub count_max: Option<u32>,
}

/// Checks on a unit after the last tick.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioUnitAssertion {
    pub unit: u32,
    #[serde(default)]
    pub progress: Option<ProgressState>,
    /// `[x, z]` the unit must end within `tolerance` of
    #[serde(default)]
    pub near: Option<[f32; 2]>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
    #[serde(default)]
    pub alive: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub seed: u64,
    pub ticks: u64,
    /// Tuning preset; `config` overrides it entirely
    #[serde(default)]
    pub preset: Option<ScenarioPreset>,
    #[serde(default)]
    pub config: Option<LocoConfig>,
    pub map: ScenarioMap,
    pub classes: BTreeMap<String, MoveProfile>,
    #[serde(default)]
    pub units: Vec<ScenarioUnit>,
    #[serde(default)]
    pub obstacles: Vec<ScenarioObstacle>,
    #[serde(default)]
    pub orders: Vec<TimedOrder>,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
    #[serde(default)]
    pub unit_assertions: Vec<ScenarioUnitAssertion>,
}

/// Final state of one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub id: u32,
    pub pos: [f32; 3],
    pub heading: i16,
    pub speed: f32,
    pub progress: ProgressState,
    pub health: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub id: String,
    pub seed: u64,
    pub ticks: u64,
    pub state_hash: String,
    pub events_by_type: BTreeMap<String, usize>,
    pub units: Vec<UnitReport>,
    pub assertion_failures: Vec<String>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.assertion_failures.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Load a scenario; `.json` files are read as JSON, anything else as YAML.
pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let scenario = if is_json {
        Scenario::from_json_str(&raw)?
    } else {
        Scenario::from_yaml_str(&raw)?
    };
    info!("loaded scenario '{}' from {}", scenario.id, path.display());
    Ok(scenario)
}

impl Scenario {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check cross references: classes, unit ids, map shape.
    pub fn validate(&self) -> Result<()> {
        let invalid =
            |msg: String| Err(LocoError::InvalidScenario(format!("{}: {}", self.id, msg)));
        if self.map.width == 0 || self.map.depth == 0 {
            return invalid("map must have at least one square".to_string());
        }
        for (i, unit) in self.units.iter().enumerate() {
            if !self.classes.contains_key(&unit.class) {
                return invalid(format!("unit {} uses unknown class '{}'", i + 1, unit.class));
            }
        }
        let known = |id: u32| id >= 1 && id as usize <= self.units.len();
        for order in &self.orders {
            if !known(order.order.unit()) {
                return invalid(format!(
                    "order at tick {} targets unknown unit {}",
                    order.at,
                    order.order.unit()
                ));
            }
            if let ScenarioOrder::PointAtUnit { target, .. } = order.order {
                if !known(target) {
                    return invalid(format!(
                        "order at tick {} points at unknown unit {}",
                        order.at, target
                    ));
                }
            }
        }
        for assertion in &self.unit_assertions {
            if !known(assertion.unit) {
                return invalid(format!("assertion on unknown unit {}", assertion.unit));
            }
        }
        Ok(())
    }

    fn loco_config(&self) -> LocoConfig {
        match (&self.config, self.preset) {
            (Some(config), _) => config.clone(),
            (None, Some(ScenarioPreset::Classic)) => LocoConfig::classic(),
            (None, Some(ScenarioPreset::Modern)) => LocoConfig::modern(),
            (None, None) => LocoConfig::default(),
        }
    }

    pub fn terrain(&self) -> Result<HeightGrid> {
        let mut grid = match &self.map.heights {
            Some(heights) => {
                HeightGrid::from_heights(self.map.width, self.map.depth, heights.clone())?
            }
            None => HeightGrid::flat(self.map.width, self.map.depth),
        };
        for rect in &self.map.blocked {
            grid.block_rect(
                Vec3::new(rect.min[0], 0.0, rect.min[1]),
                Vec3::new(rect.max[0], 0.0, rect.max[1]),
            );
        }
        Ok(grid)
    }

    /// Simulation at tick 0 with every unit and obstacle placed.
    pub fn build(&self) -> Result<Simulation> {
        self.validate()?;
        let config = self.loco_config();
        config.validate()?;
        let terrain = self.terrain()?;
        let mut sim = Simulation::new(
            config,
            Box::new(terrain),
            Box::new(DirectPathOracle::new()),
            Box::new(GridSpatialIndex::default()),
            self.seed,
        );
        for unit in &self.units {
            let profile = self
                .classes
                .get(&unit.class)
                .cloned()
                .ok_or_else(|| {
                    LocoError::InvalidScenario(format!("unknown class '{}'", unit.class))
                })?;
            let mut spawn = UnitSpawn::new(profile, Vec3::new(unit.pos[0], 0.0, unit.pos[1]))
                .team(unit.team)
                .heading(unit.heading);
            if let Some(strategy) = unit.strategy {
                spawn = spawn.strategy(strategy);
            }
            sim.spawn_unit(spawn)?;
        }
        for obstacle in &self.obstacles {
            let pos = Vec3::new(obstacle.pos[0], 0.0, obstacle.pos[1]);
            let mut placed = Obstacle::new(pos, obstacle.radius, obstacle.mass);
            placed.pos.y = sim.terrain().height(pos.x, pos.z);
            placed.blocking = obstacle.blocking;
            placed.crush_resistant = obstacle.crush_resistant;
            if let Some(speed) = obstacle.min_collision_speed {
                placed.min_collision_speed = speed;
            }
            sim.add_obstacle(placed);
        }
        Ok(sim)
    }

    pub fn run(&self) -> Result<ScenarioReport> {
        let (report, _sim) = self.run_with_simulation()?;
        Ok(report)
    }

    /// Play the scenario and keep the final simulation for inspection.
    pub fn run_with_simulation(&self) -> Result<(ScenarioReport, Simulation)> {
        let (sim, events) = self.play(|_| Ok(()))?;
        let report = self.report(&sim, &events)?;
        Ok((report, sim))
    }

    /// State hash after every `every`-th tick (and the last one).
    pub fn hash_trace(&self, every: u64) -> Result<Vec<(u64, String)>> {
        let every = every.max(1);
        let last = self.ticks;
        let mut trace = Vec::new();
        self.play(|sim| {
            if sim.tick() % every == 0 || sim.tick() == last {
                trace.push((sim.tick(), sim.state_hash()?));
            }
            Ok(())
        })?;
        Ok(trace)
    }

    /// Build, then step `ticks` times issuing orders on schedule; `observe`
    /// sees the simulation after every tick.
    fn play(
        &self,
        mut observe: impl FnMut(&Simulation) -> Result<()>,
    ) -> Result<(Simulation, Vec<MoveEvent>)> {
        let mut sim = self.build()?;
        let mut orders = self.orders.clone();
        orders.sort_by_key(|o| o.at);
        let mut pending = orders.into_iter().peekable();
        let mut events = Vec::new();

        for _ in 0..self.ticks {
            while let Some(order) = pending.next_if(|o| o.at <= sim.tick()) {
                if let Err(err) = apply_order(&mut sim, &order.order) {
                    if !err.is_recoverable() {
                        return Err(err);
                    }
                    warn!("{}: order at tick {} skipped: {}", self.id, order.at, err);
                }
            }
            sim.step();
            events.extend(sim.drain_events());
            observe(&sim)?;
        }
        for order in pending {
            warn!(
                "{}: order at tick {} never issued (run ends at {})",
                self.id, order.at, self.ticks
            );
        }
        Ok((sim, events))
    }

    fn report(&self, sim: &Simulation, events: &[MoveEvent]) -> Result<ScenarioReport> {
        let mut events_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for event in events {
            *events_by_type.entry(event.kind.name().to_string()).or_insert(0) += 1;
        }

        let mut assertion_failures = Vec::new();
        for assertion in &self.assertions {
            let min = assertion.count_min.unwrap_or(0);
            let max = assertion.count_max.unwrap_or(u32::MAX);
            let count = events
                .iter()
                .filter(|e| e.kind.name() == assertion.event)
                .filter(|e| assertion.unit.map_or(true, |id| e.unit == UnitId(id)))
                .count() as u32;
            if count < min || count > max {
                assertion_failures.push(format!(
                    "Event {} count {} outside [{}, {}]",
                    assertion.event, count, min, max
                ));
            }
        }

        for assertion in &self.unit_assertions {
            let id = UnitId(assertion.unit);
            let unit = sim.unit(id);
            if let Some(alive) = assertion.alive {
                if unit.is_some() != alive {
                    assertion_failures.push(format!(
                        "{} alive={} expected {}",
                        id,
                        unit.is_some(),
                        alive
                    ));
                }
            }
            let Some(unit) = unit else {
                if assertion.progress.is_some() || assertion.near.is_some() {
                    assertion_failures.push(format!("{} no longer exists", id));
                }
                continue;
            };
            if let Some(expected) = assertion.progress {
                if unit.mover.progress() != expected {
                    assertion_failures.push(format!(
                        "{} progress {:?} expected {:?}",
                        id,
                        unit.mover.progress(),
                        expected
                    ));
                }
            }
            if let Some(near) = assertion.near {
                let dx = unit.body.pos.x - near[0];
                let dz = unit.body.pos.z - near[1];
                let dist = (dx * dx + dz * dz).sqrt();
                if dist > assertion.tolerance {
                    assertion_failures.push(format!(
                        "{} at ({:.2}, {:.2}) is {:.2} from expected ({:.2}, {:.2})",
                        id, unit.body.pos.x, unit.body.pos.z, dist, near[0], near[1]
                    ));
                }
            }
        }

        let units = sim
            .units()
            .map(|u| UnitReport {
                id: u.body.id.0,
                pos: [u.body.pos.x, u.body.pos.y, u.body.pos.z],
                heading: u.body.heading,
                speed: u.mover.current_speed(),
                progress: u.mover.progress(),
                health: u.body.health,
            })
            .collect();

        Ok(ScenarioReport {
            id: self.id.clone(),
            seed: self.seed,
            ticks: sim.tick(),
            state_hash: sim.state_hash()?,
            events_by_type,
            units,
            assertion_failures,
        })
    }
}

fn apply_order(sim: &mut Simulation, order: &ScenarioOrder) -> Result<()> {
    match *order {
        ScenarioOrder::Move {
            unit,
            goal,
            radius,
            speed,
        } => sim.start_moving(UnitId(unit), Vec3::new(goal[0], 0.0, goal[1]), radius, speed),
        ScenarioOrder::Stop { unit } => sim.stop_moving(UnitId(unit)),
        ScenarioOrder::Impulse { unit, vector } => sim
            .apply_impulse(UnitId(unit), Vec3::new(vector[0], vector[1], vector[2]))
            .map(|_| ()),
        ScenarioOrder::PointAt {
            unit,
            target,
            distance,
            aggressive,
        } => sim.keep_pointing_to(
            UnitId(unit),
            PointTarget::Position(Vec3::new(target[0], 0.0, target[1])),
            distance,
            aggressive,
        ),
        ScenarioOrder::PointAtUnit {
            unit,
            target,
            distance,
            aggressive,
        } => sim.keep_pointing_to(
            UnitId(unit),
            PointTarget::Unit(UnitId(target)),
            distance,
            aggressive,
        ),
        ScenarioOrder::SetMaxSpeed { unit, speed } => sim.set_max_speed(UnitId(unit), speed),
    }
}
