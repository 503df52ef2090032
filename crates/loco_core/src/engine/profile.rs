//! Move and capability profiles
//!
//! A [`MoveProfile`] describes how a unit class moves and how heavy it is.
//! Its embedded [`CapabilityProfile`] is the part the terrain sampler and the
//! path oracle consume (what ground the class can cross, and how fast).

use serde::{Deserialize, Serialize};

use super::math::HEADING_CIRCLE;
use crate::error::{LocoError, Result};

/// Terrain capability of a unit class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub name: String,
    /// Steepest crossable slope (0 = flat, 1 = vertical)
    pub max_slope: f32,
    /// Speed multiplier per terrain type index; missing entries count as 1.0
    #[serde(default)]
    pub terrain_speeds: Vec<f32>,
}

impl Default for CapabilityProfile {
    fn default() -> Self {
        Self {
            name: "tank".to_string(),
            max_slope: 0.36,
            terrain_speeds: Vec::new(),
        }
    }
}

impl CapabilityProfile {
    /// Speed multiplier for a terrain type.
    #[inline]
    pub fn terrain_speed(&self, terrain_type: u8) -> f32 {
        self.terrain_speeds
            .get(terrain_type as usize)
            .copied()
            .unwrap_or(1.0)
            .max(0.0)
    }

    /// Speed multiplier for a slope: full speed on the flat, half speed at
    /// `max_slope`, impassable beyond it.
    #[inline]
    pub fn slope_speed(&self, slope: f32) -> f32 {
        if slope > self.max_slope {
            0.0
        } else if self.max_slope <= 0.0 {
            1.0
        } else {
            1.0 - 0.5 * (slope / self.max_slope)
        }
    }
}

/// Physical and locomotion profile of a unit class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveProfile {
    pub name: String,
    /// Forward speed cap (elmos/tick)
    pub max_speed: f32,
    /// Reverse speed cap (elmos/tick), 0 disables reversing
    #[serde(default)]
    pub max_reverse_speed: f32,
    /// Acceleration (elmos/tick²)
    pub acc_rate: f32,
    /// Braking (elmos/tick²)
    pub dec_rate: f32,
    /// Heading units per tick
    pub turn_rate: f32,
    pub mass: f32,
    /// Footprint radius (elmos)
    pub radius: f32,
    /// Impact speed above which collisions hurt; negative disables collision damage
    #[serde(default = "default_min_collision_speed")]
    pub min_collision_speed: f32,
    #[serde(default)]
    pub push_resistant: bool,
    #[serde(default)]
    pub crush_resistant: bool,
    /// Heaviest body this class can run over
    #[serde(default)]
    pub crush_strength: f32,
    /// Slopes steeper than `max_slope * slide_tolerance` start a slide (needs >= 1)
    #[serde(default)]
    pub slide_tolerance: f32,
    /// Keep the up vector vertical instead of following the ground normal
    #[serde(default = "default_upright")]
    pub upright: bool,
    #[serde(default = "default_max_health")]
    pub max_health: f32,
    #[serde(default)]
    pub capability: CapabilityProfile,
}

fn default_min_collision_speed() -> f32 {
    1.0
}

fn default_upright() -> bool {
    true
}

fn default_max_health() -> f32 {
    1000.0
}

impl Default for MoveProfile {
    fn default() -> Self {
        Self {
            name: "tank".to_string(),
            max_speed: 2.0,
            max_reverse_speed: 0.0,
            acc_rate: 0.1,
            dec_rate: 0.2,
            turn_rate: 1000.0,
            mass: 100.0,
            radius: 8.0,
            min_collision_speed: default_min_collision_speed(),
            push_resistant: false,
            crush_resistant: false,
            crush_strength: 25.0,
            slide_tolerance: 0.0,
            upright: default_upright(),
            max_health: default_max_health(),
            capability: CapabilityProfile::default(),
        }
    }
}

impl MoveProfile {
    pub fn validate(&self) -> Result<()> {
        let reason = if !(self.max_speed > 0.0) {
            Some("max_speed must be positive")
        } else if !(self.max_reverse_speed >= 0.0) {
            Some("max_reverse_speed must not be negative")
        } else if !(self.acc_rate > 0.0) {
            Some("acc_rate must be positive")
        } else if !(self.dec_rate > 0.0) {
            Some("dec_rate must be positive")
        } else if !(self.turn_rate >= 1.0) {
            Some("turn_rate must be at least one heading unit per tick")
        } else if !(self.mass > 0.0) {
            Some("mass must be positive")
        } else if !(self.radius > 0.0) {
            Some("radius must be positive")
        } else if !(self.max_health > 0.0) {
            Some("max_health must be positive")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(LocoError::InvalidProfile {
                profile: self.name.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Ticks for a full 360° turn.
    #[inline]
    pub fn turn_period_ticks(&self) -> f32 {
        HEADING_CIRCLE / self.turn_rate
    }

    /// Largest speed in either direction.
    #[inline]
    pub fn max_any_speed(&self) -> f32 {
        self.max_speed.max(self.max_reverse_speed)
    }
}
