//! Steering and failure-handling thresholds

use serde::{Deserialize, Serialize};

/// Avoidance and direction-choice tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Lateral push per unit of overlap with an object on the path line
    pub avoidance_strength: f32,
    /// Scale avoidance of movable bodies by their relative mass
    pub mass_weighted_avoidance: bool,
    /// Allow driving backwards when the reverse ETA is lower
    pub allow_reverse: bool,
    /// Waypoints further than this are always approached forwards (elmos)
    pub reverse_max_distance: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            avoidance_strength: 1.5,
            mass_weighted_avoidance: true,
            allow_reverse: true,
            reverse_max_distance: 320.0,
        }
    }
}

impl SteeringConfig {
    pub fn classic() -> Self {
        Self {
            avoidance_strength: 2.0,
            mass_weighted_avoidance: false,
            allow_reverse: false,
            ..Self::default()
        }
    }
}

/// Stuck detection and bounded retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    /// ETA failures tolerated before the slow pass repaths or gives up
    pub max_eta_failures: u32,
    /// Goals further than this are never declared clogged (elmos)
    pub goal_near_distance: f32,
    /// Blocked fraction of the goal area above which the goal is clogged
    pub goal_clog_fraction: f32,
    /// Path requests issued within this radius of the previous one count as non-moving
    pub non_moving_radius: f32,
    /// Non-moving path requests tolerated before failing
    pub max_non_moving_failures: u32,
    /// Ticks added to the turn-rate derived idle threshold
    pub idle_slack_ticks: u32,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            max_eta_failures: 8,
            goal_near_distance: 200.0,
            goal_clog_fraction: 0.4,
            non_moving_radius: 20.0,
            max_non_moving_failures: 10,
            idle_slack_ticks: 30,
        }
    }
}
