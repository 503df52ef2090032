pub mod avoidance; // Throttled lateral steering around blocking bodies
pub mod body; // Unit/obstacle bodies and ids
pub mod collision; // Post-move overlap resolution (push/crush/damage)
pub mod config; // Tuning configuration + presets
pub mod controller; // GroundMover: per-unit locomotion state machine
pub mod debug_flags; // Debug output gating (env-based)
pub mod events;
pub mod external; // Path oracle / terrain / spatial index seams
pub mod line_table; // Precomputed cell-offset lookahead table
pub mod math;
pub mod path_oracle; // Straight-line reference oracle
pub mod physics_constants;
pub mod profile; // Move/capability profiles per unit class
pub mod scenario_loader;
pub mod skid; // Skid, flight and controlled-drop physics
pub mod snapshot;
pub mod sort_keys; // Stable tie-breakers for deterministic ordering
pub mod spatial; // Uniform-grid spatial index
pub mod speed_control; // Wanted speed, braking and reverse heuristics
pub mod state;
pub mod strategy; // Modern vs classic move strategy
pub mod terrain; // Heightmap terrain sampler
pub mod terrain_cell; // Move-square bookkeeping + goal feasibility
pub mod timestep;
pub mod world; // Simulation tick driver

#[cfg(test)]
pub mod test_fixtures; // Shared builders for scenario tests

#[cfg(test)]
mod scenario_tests; // End-to-end locomotion scenarios
