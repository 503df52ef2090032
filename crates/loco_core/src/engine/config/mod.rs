//! # Locomotion Configuration Module
//!
//! Central tuning configuration for the locomotion core.
//!
//! ## Presets
//! - `modern()` (default): current move strategy, mass-weighted avoidance
//! - `classic()`: legacy move strategy kept for replay compatibility
//!
//! ## Usage
//! ```rust
//! use loco_core::engine::config::LocoConfig;
//!
//! let config = LocoConfig::default();
//! let classic = LocoConfig::classic();
//! let from_env = LocoConfig::from_env_or_default();
//! ```
//!
//! ## Environment Variables
//!
//! - `LOCO_MOVE_PROFILE`: Select preset (classic, modern)

mod impact_config;
mod steering_config;

pub use impact_config::{CollisionConfig, SkidConfig};
pub use steering_config::{FailureConfig, SteeringConfig};

use serde::{Deserialize, Serialize};
use std::env;

use super::strategy::MoveStrategy;
use crate::error::{LocoError, Result};

/// Complete locomotion tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocoConfig {
    /// Strategy for units spawned without an explicit one
    #[serde(default)]
    pub default_strategy: MoveStrategy,
    /// Steering and avoidance
    #[serde(default)]
    pub steering: SteeringConfig,
    /// Post-move collision response
    #[serde(default)]
    pub collision: CollisionConfig,
    /// Skid/impact physics
    #[serde(default)]
    pub skid: SkidConfig,
    /// Stuck detection and bounded retry
    #[serde(default)]
    pub failure: FailureConfig,
}

impl Default for LocoConfig {
    fn default() -> Self {
        Self {
            default_strategy: MoveStrategy::default(),
            steering: SteeringConfig::default(),
            collision: CollisionConfig::default(),
            skid: SkidConfig::default(),
            failure: FailureConfig::default(),
        }
    }
}

impl LocoConfig {
    /// Current behaviour
    pub fn modern() -> Self {
        Self {
            default_strategy: MoveStrategy::Modern,
            ..Self::default()
        }
    }

    /// Legacy behaviour (tunneling allowed, no reversing, unweighted avoidance)
    pub fn classic() -> Self {
        Self {
            default_strategy: MoveStrategy::Classic,
            steering: SteeringConfig::classic(),
            collision: CollisionConfig::classic(),
            ..Self::default()
        }
    }

    /// Load from environment variable LOCO_MOVE_PROFILE or use default
    pub fn from_env_or_default() -> Self {
        match env::var("LOCO_MOVE_PROFILE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "classic" => Self::classic(),
            "modern" => Self::modern(),
            _ => Self::default(),
        }
    }

    /// Reject settings that would break the controller's invariants.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.skid.impulse_threshold > 0.0, "skid.impulse_threshold must be positive"),
            (self.skid.speed_reduction > 0.0, "skid.speed_reduction must be positive"),
            (
                (0.0..=1.0).contains(&self.skid.residual_decay),
                "skid.residual_decay must be within [0, 1]",
            ),
            (
                (0.0..=1.0).contains(&self.collision.speed_decay),
                "collision.speed_decay must be within [0, 1]",
            ),
            (
                (0.0..=1.0).contains(&self.failure.goal_clog_fraction),
                "failure.goal_clog_fraction must be within [0, 1]",
            ),
            (
                self.steering.avoidance_strength >= 0.0,
                "steering.avoidance_strength must not be negative",
            ),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, reason)) => Err(LocoError::InvalidScenario(reason.to_string())),
            None => Ok(()),
        }
    }
}

// ========== Tests ==========

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = LocoConfig::default();
        assert!((cfg.skid.impulse_threshold - 3.0).abs() < 1e-6);
        assert!((cfg.skid.speed_reduction - 0.35).abs() < 1e-6);
        assert_eq!(cfg.failure.max_eta_failures, 8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_classic_preset() {
        let cfg = LocoConfig::classic();
        assert_eq!(cfg.default_strategy, MoveStrategy::Classic);
        assert!(!cfg.steering.allow_reverse);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_invalid_decay_rejected() {
        let mut cfg = LocoConfig::default();
        cfg.collision.speed_decay = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let cfg: LocoConfig = serde_yaml::from_str("skid:\n  impulse_threshold: 5.0\n").unwrap();
        assert_eq!(cfg.skid.impulse_threshold, 5.0);
        assert_eq!(cfg.skid.normal_threshold, SkidConfig::default().normal_threshold);
        assert_eq!(cfg.failure, FailureConfig::default());
    }
}
