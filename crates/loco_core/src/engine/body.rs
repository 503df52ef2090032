//! Unit and obstacle bodies
//!
//! [`UnitBody`] is the slice of a game entity the locomotion core is allowed
//! to see: pose, physical profile, lifecycle flags and health. Everything
//! else about the entity (weapons, scripts, command queue) stays outside.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::math::{vector_from_heading, Vec3};
use super::profile::MoveProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObstacleId(pub u32);

impl fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obstacle#{}", self.0)
    }
}

/// Contact with the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PhysicalState {
    #[default]
    OnGround,
    Flying,
}

/// Pose, profile and lifecycle state of one ground unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitBody {
    pub id: UnitId,
    /// Ally team; equal values are allied
    pub team: u8,
    pub profile: MoveProfile,
    pub pos: Vec3,
    pub heading: i16,
    pub up: Vec3,
    /// Displacement over the last tick
    pub velocity: Vec3,
    pub physical_state: PhysicalState,
    pub health: f32,
    pub stunned: bool,
    pub being_built: bool,
    /// Controlled drop (e.g. unloaded from the air)
    pub falling: bool,
    /// Gravity multiplier while falling
    pub fall_speed: f32,
    pub in_transport: bool,
    pub dead: bool,
    /// Accumulated impulse that has not (yet) broken traction
    pub residual_impulse: Vec3,
    /// Set while the unit's mover is executing an order
    pub active_move: bool,
}

impl UnitBody {
    pub fn new(id: UnitId, team: u8, profile: MoveProfile, pos: Vec3, heading: i16) -> Self {
        let health = profile.max_health;
        Self {
            id,
            team,
            profile,
            pos,
            heading,
            up: Vec3::new(0.0, 1.0, 0.0),
            velocity: Vec3::zeros(),
            physical_state: PhysicalState::OnGround,
            health,
            stunned: false,
            being_built: false,
            falling: false,
            fall_speed: 0.2,
            in_transport: false,
            dead: false,
            residual_impulse: Vec3::zeros(),
            active_move: false,
        }
    }

    /// Ground-plane facing direction.
    #[inline]
    pub fn front(&self) -> Vec3 {
        vector_from_heading(self.heading)
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.profile.radius
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.profile.mass
    }

    #[inline]
    pub fn allied_with(&self, team: u8) -> bool {
        self.team == team
    }

    /// Apply damage; returns true when this hit killed the unit.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if self.dead || amount <= 0.0 {
            return false;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.dead = true;
            return true;
        }
        false
    }
}

/// Static obstacle ("feature"): rocks, wrecks, trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub pos: Vec3,
    pub radius: f32,
    pub mass: f32,
    /// Non-blocking obstacles are walked through
    pub blocking: bool,
    pub crush_resistant: bool,
    /// Impact speed an obstacle shrugs off; negative makes it impact-proof
    #[serde(default = "default_obstacle_min_collision_speed")]
    pub min_collision_speed: f32,
    pub health: f32,
    pub dead: bool,
}

fn default_obstacle_min_collision_speed() -> f32 {
    1.0
}

impl Obstacle {
    pub fn new(pos: Vec3, radius: f32, mass: f32) -> Self {
        Self {
            id: ObstacleId(0),
            pos,
            radius,
            mass,
            blocking: true,
            crush_resistant: false,
            min_collision_speed: default_obstacle_min_collision_speed(),
            health: 200.0,
            dead: false,
        }
    }

    /// Apply damage; returns true when this hit destroyed the obstacle.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if self.dead || amount <= 0.0 {
            return false;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.dead = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_kills_once() {
        let mut body = UnitBody::new(UnitId(1), 0, MoveProfile::default(), Vec3::zeros(), 0);
        assert!(!body.apply_damage(400.0));
        assert!(body.apply_damage(700.0));
        assert!(body.dead);
        assert!(!body.apply_damage(10.0));
    }

    #[test]
    fn test_front_follows_heading() {
        let body = UnitBody::new(UnitId(1), 0, MoveProfile::default(), Vec3::zeros(), 16384);
        assert!((body.front().x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(UnitId(3).to_string(), "unit#3");
        assert_eq!(ObstacleId(9).to_string(), "obstacle#9");
    }
}
