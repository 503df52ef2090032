//! Collision and skid thresholds

use serde::{Deserialize, Serialize};

/// Post-move collision response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Push non-allied units out of the way as well
    pub push_enemies: bool,
    /// Mover speed retained per resolved collision
    pub speed_decay: f32,
    /// Damage per (closing speed × mass)
    pub damage_factor: f32,
    /// Cosine of the forward cone in which a static blocker triggers a repath
    pub repath_cone_cos: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            push_enemies: false,
            speed_decay: 0.97,
            damage_factor: 0.2,
            repath_cone_cos: 0.866,
        }
    }
}

impl CollisionConfig {
    pub fn classic() -> Self {
        Self {
            repath_cone_cos: 1.0,
            ..Self::default()
        }
    }
}

/// Skid/impact physics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkidConfig {
    /// Impulse magnitude that breaks traction
    pub impulse_threshold: f32,
    /// Impulse component along the ground normal that breaks traction
    pub normal_threshold: f32,
    /// Velocity component along the ground normal that launches the unit
    pub flying_threshold: f32,
    /// Speed lost per tick while sliding on the ground
    pub speed_reduction: f32,
    /// Damage per (impact speed × mass) on landing or hitting a blocker
    pub impact_damage_factor: f32,
    /// Residual (sub-threshold) impulse retained per tick
    pub residual_decay: f32,
    /// Rebound off static blockers, times impact speed
    pub collision_bounce: f32,
    /// Skid speed retained after a body-to-body hit
    pub collision_speed_retain: f32,
}

impl Default for SkidConfig {
    fn default() -> Self {
        Self {
            impulse_threshold: 3.0,
            normal_threshold: 0.3,
            flying_threshold: 0.2,
            speed_reduction: 0.35,
            impact_damage_factor: 0.2,
            residual_decay: 0.9,
            collision_bounce: 1.8,
            collision_speed_retain: 0.9,
        }
    }
}
