/// timestep.rs
/// Fixed Lockstep Timestep Constants
///
/// Every replica advances the simulation in whole ticks. The fast pass runs
/// each tick; the slow pass runs once per `SLOW_UPDATE_INTERVAL` ticks,
/// strictly after that tick's fast pass.

/// Simulation ticks per second
pub const TICKS_PER_SECOND: u64 = 30;

/// Ticks between slow-pass bookkeeping runs
pub const SLOW_UPDATE_INTERVAL: u64 = 16;

/// Minimum ticks between two full path requests of one unit
pub const MAX_REPATH_FREQUENCY: u64 = 30;

/// Ticks between obstacle-avoidance re-evaluations
pub const AVOIDANCE_INTERVAL: u64 = 4;

/// Ticks ahead at which moving obstacles are evaluated
pub const AVOIDANCE_LOOKAHEAD_TICKS: f32 = 30.0;

// Compile-time validation
const _: () = assert!(SLOW_UPDATE_INTERVAL < TICKS_PER_SECOND);
const _: () = assert!(AVOIDANCE_INTERVAL < SLOW_UPDATE_INTERVAL);

/// Whether the slow pass runs on `tick`.
#[inline]
pub fn is_slow_tick(tick: u64) -> bool {
    tick % SLOW_UPDATE_INTERVAL == 0
}
