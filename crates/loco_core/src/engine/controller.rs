//! GroundMover: per-unit locomotion controller
//!
//! Each tick the driver calls [`GroundMover::update`] once per unit, in
//! ascending id order, and [`GroundMover::slow_update`] on slow ticks after
//! the fast pass.
//!
//! ## Fast pass
//! 1. dead / in transport: nothing
//! 2. skidding: skid physics ([`super::skid`]) owns the body
//! 3. falling: controlled drop
//! 4. stunned / under construction: speed forced to zero
//! 5. otherwise follow the path: waypoint bookkeeping, forward/reverse
//!    choice, avoidance steering, turn-rate limited heading, acc/dec limited
//!    speed, then position integration and collision resolution
//!
//! ## Slow pass
//! Repath on ETA failures or idling, give up after one unsuccessful repath,
//! restart the engine when a path went missing, clamp into the map and let
//! the oracle refresh the held path.
//!
//! ## Progress
//! `Idle` → `Active` on [`GroundMover::start_moving`]; `Active` → `Done` on
//! arrival or [`GroundMover::stop_moving`]; `Active` → `Failed` through
//! `fail()`. A path handle is only held while `Active`.

use log::{debug, info};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::avoidance;
use super::body::{UnitBody, UnitId};
use super::collision::resolve_collisions;
use super::config::{LocoConfig, SkidConfig};
use super::debug_flags::controller_debug_enabled;
use super::events::{FailureReason, MoveEvent, MoveEventKind};
use super::external::{PathOracle, SpatialIndex, TerrainSampler};
use super::math::{
    flat, flat_dir, flat_dist, flat_len, heading_delta, heading_from_vector, max_heading_step,
    step_heading, up,
    Vec3, HEADING_HALF_CIRCLE,
};
use super::physics_constants::collision::MIN_SEPARATION;
use super::physics_constants::grid::{MIN_PASSABLE_SPEED_MOD, PATH_RESOLUTION};
use super::physics_constants::path_follow::{
    ETA2_BASE_DISTANCE, ETA2_EXTENSION_TICKS, ETA2_SLACK_TICKS, ETA_BASE_DISTANCE,
    ETA_MISS_PENALTY,
    ETA_SLACK_TICKS, IDLE_PROGRESS_FRACTION, LOOKAHEAD_MAX_SKIPS, LOOKAHEAD_SQUARES_SQ,
    MINIMUM_SPEED,
    MIN_WAYPOINT_DISTANCE, WAYPOINT_ALIGNMENT, WAYPOINT_LOOKAHEAD,
};
use super::skid;
use super::speed_control::{
    braking_distance, reverse_is_faster, step_speed, turn_radius, wanted_speed, SpeedInputs,
};
use super::state::{MainHeading, MovementState, ProgressState};
use super::strategy::MoveStrategy;
use super::terrain_cell::{
    cell_blocked, clamp_diagonal, goal_feasible, line_blocked, move_square_of,
};
use super::timestep::{MAX_REPATH_FREQUENCY, TICKS_PER_SECOND};
use super::world::{ObstacleStore, UnitStore};

/// Everything a controller may touch during one unit's update.
///
/// The unit being updated is taken out of `units` for the duration, so
/// `units` only holds its neighbours.
pub struct MoveContext<'a> {
    pub tick: u64,
    pub config: &'a LocoConfig,
    pub terrain: &'a dyn TerrainSampler,
    pub paths: &'a mut dyn PathOracle,
    pub spatial: &'a mut dyn SpatialIndex,
    pub units: &'a mut UnitStore,
    pub obstacles: &'a mut ObstacleStore,
    /// Synced RNG shared by every replica
    pub rng: &'a mut ChaCha8Rng,
    pub events: &'a mut Vec<MoveEvent>,
}

impl MoveContext<'_> {
    #[inline]
    pub fn emit(&mut self, unit: UnitId, kind: MoveEventKind) {
        self.events.push(MoveEvent::new(self.tick, unit, kind));
    }
}

/// Locomotion controller of one ground unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundMover {
    strategy: MoveStrategy,
    state: MovementState,
}

impl GroundMover {
    pub fn new(strategy: MoveStrategy, body: &UnitBody) -> Self {
        let p = &body.profile;
        let mut state = MovementState::new(
            body.pos,
            p.max_speed,
            p.max_reverse_speed,
            p.turn_rate,
            p.acc_rate,
            p.dec_rate,
        );
        state.move_square = move_square_of(body.pos);
        Self { strategy, state }
    }

    // ========== Accessors ==========

    pub fn strategy(&self) -> MoveStrategy {
        self.strategy
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut MovementState {
        &mut self.state
    }

    pub fn progress(&self) -> ProgressState {
        self.state.progress
    }

    pub fn current_speed(&self) -> f32 {
        self.state.current_speed
    }

    pub fn wanted_speed(&self) -> f32 {
        self.state.wanted_speed
    }

    pub fn waypoint(&self) -> Vec3 {
        self.state.waypoint
    }

    pub fn next_waypoint(&self) -> Vec3 {
        self.state.next_waypoint
    }

    pub fn goal(&self) -> (Vec3, f32) {
        (self.state.goal_pos, self.state.goal_radius)
    }

    pub fn is_skidding(&self) -> bool {
        self.state.is_skidding()
    }

    pub fn is_reversing(&self) -> bool {
        self.state.reversing
    }

    pub fn has_path(&self) -> bool {
        self.state.path.is_some()
    }

    // ========== Orders ==========

    /// Head for `goal`, stopping within `goal_radius` of it.
    ///
    /// `speed` caps the travel speed; `None` means full speed.
    pub fn start_moving(
        &mut self,
        body: &mut UnitBody,
        goal: Vec3,
        goal_radius: f32,
        speed: Option<f32>,
        ctx: &mut MoveContext<'_>,
    ) {
        let goal = Vec3::new(goal.x, 0.0, goal.z);
        let s = &mut self.state;
        s.goal_pos = goal;
        s.goal_radius = goal_radius.max(0.0);
        s.at_goal = body.pos.x == goal.x && body.pos.z == goal.z;
        s.have_final_waypoint = false;
        s.main_heading = None;
        s.progress = ProgressState::Active;
        s.idle = Default::default();
        s.eta = Default::default();
        s.non_moving_failures = 0;
        s.want_repath = false;
        s.requested_speed = match speed {
            Some(speed) => speed.clamp(0.0, s.max_speed),
            None => s.max_speed,
        };
        body.active_move = true;

        if controller_debug_enabled() {
            debug!("{}: start moving to {:?} r={} from {:?}", body.id, goal, goal_radius, body.pos);
        }
        // a fresh goal always replaces the held path
        self.stop_engine(body, ctx);
        self.start_engine(body, ctx);
    }

    pub fn stop_moving(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        self.stop_engine(body, ctx);
        self.state.main_heading = None;
        self.state.progress = ProgressState::Done;
        self.state.want_repath = false;
        body.active_move = false;
    }

    /// Keep facing `target`. Only aggressive pointing turns the unit when it
    /// has no path to follow; `distance` > 0 limits it to that range.
    pub fn keep_pointing_to(&mut self, target: Vec3, distance: f32, aggressive: bool) {
        self.state.main_heading = Some(MainHeading {
            target,
            distance: distance.max(0.0),
            aggressive,
        });
    }

    pub fn set_max_speed(&mut self, body: &UnitBody, speed: f32) {
        let speed = speed.clamp(0.0, body.profile.max_speed);
        let s = &mut self.state;
        s.requested_speed = if s.requested_speed == s.max_speed {
            speed
        } else {
            s.requested_speed.min(speed)
        };
        s.max_speed = speed;
        s.current_speed = s.current_speed.min(s.direction_cap());
    }

    pub fn leave_transport(&mut self, body: &mut UnitBody) {
        body.in_transport = false;
        // guarantees the next update reports a pose change
        self.state.old_pos = body.pos + body.up * 0.001;
    }

    /// Path handles do not survive a restore; ask the oracle again.
    pub fn post_load(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        self.state.move_square = move_square_of(body.pos);
        if self.state.path.is_none() {
            return;
        }
        self.state.path = ctx.paths.request_path(
            &body.profile.capability,
            ctx.terrain,
            body.pos,
            self.state.goal_pos,
            self.state.goal_radius,
            body.id,
        );
        if self.state.path.is_some() {
            self.state.next_waypoint = body.pos;
            self.get_next_waypoint(body, ctx);
            self.get_next_waypoint(body, ctx);
        }
    }

    pub fn on_impulse(
        &mut self,
        body: &mut UnitBody,
        impulse: Vec3,
        cfg: &SkidConfig,
        terrain: &dyn TerrainSampler,
        rng: &mut ChaCha8Rng,
        tick: u64,
        events: &mut Vec<MoveEvent>,
    ) -> bool {
        skid::on_impulse(&mut self.state, body, impulse, cfg, terrain, rng, tick, events)
    }

    pub(crate) fn knock(
        &mut self,
        body: &mut UnitBody,
        impulse: Vec3,
        rng: &mut ChaCha8Rng,
        tick: u64,
        events: &mut Vec<MoveEvent>,
    ) {
        skid::knock(&mut self.state, body, impulse, rng, tick, events);
    }

    // ========== Fast pass ==========

    /// One tick; returns whether the pose changed.
    pub fn update(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) -> bool {
        if body.dead || body.in_transport {
            return false;
        }
        let config = ctx.config;
        body.residual_impulse *= config.skid.residual_decay;

        if !self.state.is_skidding() && !body.falling && on_slope(body, ctx.terrain) {
            skid::start_slope_slide(&mut self.state, body, ctx.rng, ctx.tick, ctx.events);
        }

        if self.state.is_skidding() {
            skid::update_skid(&mut self.state, body, ctx);
        } else if body.falling {
            skid::update_controlled_drop(body, ctx);
        } else {
            let start = body.pos;
            if body.stunned || body.being_built {
                self.state.current_speed = 0.0;
                self.state.wanted_speed = 0.0;
                self.state.delta_speed = 0.0;
            } else {
                self.follow_path(body, ctx);
            }
            self.update_owner_pos(body, ctx);
            body.velocity = body.pos - start;
        }
        body.active_move = self.state.progress == ProgressState::Active;

        let moved = body.pos != self.state.old_pos;
        self.state.old_pos = body.pos;
        ctx.spatial.unit_moved(body.id, body.pos, body.radius());
        moved
    }

    fn follow_path(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        let config = ctx.config;
        let tick = ctx.tick;

        if self.state.progress != ProgressState::Active || self.state.path.is_none() {
            let pointing = self.set_main_heading(body);
            if !pointing && self.state.progress == ProgressState::Active && self.state.at_goal {
                self.arrived(body, ctx);
            }
            self.brake();
            return;
        }

        // ETA bookkeeping
        if tick > self.state.eta.waypoint_deadline {
            self.state.eta.failures += ETA_MISS_PENALTY;
            self.state.eta.waypoint_deadline = u64::MAX;
        }
        if tick > self.state.eta.clog_deadline {
            let goal_dist = flat_dist(body.pos, self.state.goal_pos);
            if goal_dist < config.failure.goal_near_distance && !self.goal_is_feasible(body, ctx) {
                self.fail(body, ctx, FailureReason::GoalClogged);
                self.brake();
                return;
            }
            self.state.eta.clog_deadline = tick + ETA2_EXTENSION_TICKS;
        }
        if self.state.want_repath && tick >= self.state.restart_delay {
            self.repath(body, ctx);
            if self.state.progress != ProgressState::Active || self.state.path.is_none() {
                self.brake();
                return;
            }
        }

        if flat_dist(body.pos, self.state.goal_pos) <= self.state.goal_radius {
            self.state.at_goal = true;
        }
        let mut wp_dist = flat_dist(body.pos, self.state.waypoint);
        let arrival_radius = self.state.goal_radius.max(MIN_WAYPOINT_DISTANCE);
        if self.state.at_goal || (self.state.have_final_waypoint && wp_dist <= arrival_radius) {
            self.arrived(body, ctx);
            self.brake();
            return;
        }

        let mut waypoint_dir = flat_dir(self.state.waypoint - body.pos);
        if self.can_get_next_waypoint(body, wp_dist, waypoint_dir) {
            self.get_next_waypoint(body, ctx);
            if self.state.progress != ProgressState::Active {
                self.brake();
                return;
            }
            self.state.idle.ticks = 0;
            wp_dist = flat_dist(body.pos, self.state.waypoint);
            waypoint_dir = flat_dir(self.state.waypoint - body.pos);
        }
        self.state.current_waypoint_distance = wp_dist;

        // idling: waypoint distance not shrinking fast enough
        let progress = self.state.idle.last_waypoint_distance - wp_dist;
        if progress < IDLE_PROGRESS_FRACTION * self.state.max_speed {
            self.state.idle.ticks += 1;
        } else {
            self.state.idle.ticks = self.state.idle.ticks.saturating_sub(1);
            if self.state.idle.ticks == 0 {
                // real progress again: the next idle spell gets its own repath
                self.state.idle.repathed = false;
            }
        }
        self.state.idle.last_waypoint_distance = wp_dist;

        // forward or reverse; switching direction needs a standstill first
        let want_reverse = self.strategy.supports_reverse()
            && config.steering.allow_reverse
            && wp_dist <= config.steering.reverse_max_distance
            && reverse_is_faster(&self.state, body.heading, waypoint_dir, wp_dist);
        let mut switching = want_reverse != self.state.reversing;
        if switching && self.state.current_speed < MINIMUM_SPEED {
            self.state.reversing = want_reverse;
            switching = false;
        }

        let steered = avoidance::steer(&mut self.state, self.strategy, body, waypoint_dir, ctx);
        let facing = if self.state.reversing { -steered } else { steered };
        if facing != Vec3::zeros() {
            let wanted_heading = heading_from_vector(facing.x, facing.z);
            self.change_heading(body, wanted_heading);
        }
        let turn_delta = if facing != Vec3::zeros() {
            heading_delta(body.heading, heading_from_vector(facing.x, facing.z)) as i32
        } else {
            0
        };

        let inputs = SpeedInputs {
            ground_mod: ctx.terrain.speed_modifier(&body.profile.capability, body.pos),
            alignment: body.front().dot(&facing),
            turn_delta,
            waypoint_dist: wp_dist,
            have_final_waypoint: self.state.have_final_waypoint,
        };
        self.state.wanted_speed = if switching {
            0.0
        } else {
            wanted_speed(&self.state, inputs)
        };
        self.apply_speed_step();
    }

    fn change_heading(&mut self, body: &mut UnitBody, wanted: i16) {
        body.heading = step_heading(body.heading, wanted, max_heading_step(self.state.turn_rate));
    }

    fn brake(&mut self) {
        self.state.wanted_speed = 0.0;
        self.apply_speed_step();
    }

    fn apply_speed_step(&mut self) {
        let s = &mut self.state;
        let (next, delta) =
            step_speed(s.current_speed, s.wanted_speed, s.acc_rate, s.dec_rate, s.direction_cap());
        s.current_speed = next;
        s.delta_speed = delta;
    }

    /// Turn toward an aggressive pointing target while not path-following.
    /// Returns whether a target was handled.
    fn set_main_heading(&mut self, body: &mut UnitBody) -> bool {
        let Some(heading) = self.state.main_heading else {
            return false;
        };
        if !heading.aggressive {
            return false;
        }
        let to = flat(heading.target - body.pos);
        let dist = flat_len(to);
        if dist < MIN_SEPARATION || (heading.distance > 0.0 && dist > heading.distance) {
            return false;
        }
        let wanted = heading_from_vector(to.x, to.z);
        let facing = body.heading == wanted;
        if self.state.progress == ProgressState::Active {
            if facing {
                self.state.progress = ProgressState::Done;
            } else {
                self.change_heading(body, wanted);
            }
        } else if !facing {
            self.state.progress = ProgressState::Active;
            self.change_heading(body, wanted);
        }
        true
    }

    fn aggressive_pointing(&self) -> bool {
        self.state.main_heading.map(|h| h.aggressive).unwrap_or(false)
    }

    fn can_get_next_waypoint(&self, body: &UnitBody, wp_dist: f32, waypoint_dir: Vec3) -> bool {
        if self.state.have_final_waypoint {
            return false;
        }
        let front = if self.state.reversing { -body.front() } else { body.front() };
        let aligned = front.dot(&waypoint_dir) >= WAYPOINT_ALIGNMENT;
        (wp_dist <= MIN_WAYPOINT_DISTANCE && aligned)
            || wp_dist <= 2.0 * turn_radius(self.state.current_speed, self.state.turn_rate)
    }

    /// Integrate the speed along the facing, then settle onto the terrain.
    fn update_owner_pos(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        let speed = self.state.current_speed;
        if speed > 0.0 {
            let sign = if self.state.reversing { -1.0 } else { 1.0 };
            let old_pos = body.pos;
            let mut new_pos = old_pos + body.front() * (speed * sign);
            new_pos.y = ctx.terrain.height(new_pos.x, new_pos.z);

            let capability = &body.profile.capability;
            let dest_passable =
                ctx.terrain.speed_modifier(capability, new_pos) > MIN_PASSABLE_SPEED_MOD;
            let here_passable =
                ctx.terrain.speed_modifier(capability, old_pos) > MIN_PASSABLE_SPEED_MOD;
            let commit = if dest_passable || !here_passable {
                true
            } else if self.strategy.allows_tunneling() {
                ctx.emit(body.id, MoveEventKind::RejectedMove);
                true
            } else {
                self.state.current_speed = 0.0;
                self.state.delta_speed = 0.0;
                false
            };

            if commit {
                body.pos = new_pos;
                self.test_new_terrain_square(body, ctx);
                let outcome =
                    resolve_collisions(&mut self.state, self.strategy, body, old_pos, ctx);
                if outcome.repath {
                    self.repath(body, ctx);
                }
            }
        }

        body.pos.y = ctx.terrain.height(body.pos.x, body.pos.z);
        body.up = if body.profile.upright {
            up()
        } else {
            ctx.terrain.normal(body.pos.x, body.pos.z)
        };
    }

    /// Move-square change: no diagonal corner cuts, fresh terrain speed and
    /// ETAs, and a short skip-ahead over waypoints with a clear line.
    fn test_new_terrain_square(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        let new_cell = move_square_of(body.pos);
        if new_cell == self.state.move_square {
            return;
        }
        let front = body.front();
        let cell = clamp_diagonal(
            &body.profile.capability,
            ctx.terrain,
            &mut body.pos,
            front,
            self.state.move_square,
            new_cell,
        );
        self.state.move_square = cell;
        self.state.terrain_speed = ctx.terrain.cell_speed(&body.profile.capability, cell.0, cell.1);
        if self.state.path.is_none() {
            return;
        }
        self.set_waypoint_etas(ctx.tick);

        for _ in 0..LOOKAHEAD_MAX_SKIPS {
            if self.state.have_final_waypoint || self.state.progress != ProgressState::Active {
                break;
            }
            let target = move_square_of(self.state.next_waypoint);
            let (dx, dz) = (target.0 - cell.0, target.1 - cell.1);
            if dx * dx + dz * dz > LOOKAHEAD_SQUARES_SQ {
                break;
            }
            let capability = &body.profile.capability;
            if cell_blocked(capability, ctx.terrain, &*ctx.spatial, &*ctx.obstacles, target)
                || line_blocked(
                    capability,
                    ctx.terrain,
                    &*ctx.spatial,
                    &*ctx.obstacles,
                    cell,
                    target,
                )
            {
                break;
            }
            self.get_next_waypoint(body, ctx);
        }
    }

    // ========== Engine ==========

    /// Braking point straight ahead.
    fn here(&self, body: &UnitBody) -> Vec3 {
        let sign = if self.state.reversing { -1.0 } else { 1.0 };
        let stop = braking_distance(self.state.current_speed, self.state.dec_rate);
        body.pos + body.front() * (stop * sign)
    }

    fn start_engine(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        if self.state.path.is_none() && !self.state.at_goal {
            if self.get_new_path(body, ctx) {
                if controller_debug_enabled() {
                    debug!("{}: engine started, waypoint {:?}", body.id, self.state.waypoint);
                }
                ctx.emit(body.id, MoveEventKind::StartedMoving);
            } else if self.state.progress != ProgressState::Failed {
                self.fail(body, ctx, FailureReason::PathNotFound);
            }
        }
        self.state.next_avoidance_update = ctx.tick;
    }

    fn stop_engine(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        if let Some(path) = self.state.path.take() {
            ctx.paths.delete_path(path);
            if !self.state.at_goal {
                self.state.waypoint = self.here(body);
            }
            if controller_debug_enabled() {
                debug!("{}: engine stopped at {:?}", body.id, body.pos);
            }
            ctx.emit(body.id, MoveEventKind::StoppedMoving);
        }
        self.state.wanted_speed = 0.0;
    }

    fn get_new_path(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) -> bool {
        let failure = &ctx.config.failure;
        if flat_dist(body.pos, self.state.last_path_request_pos) <= failure.non_moving_radius {
            self.state.non_moving_failures += 1;
            if self.state.non_moving_failures > failure.max_non_moving_failures {
                self.fail(body, ctx, FailureReason::NonMoving);
                return false;
            }
        } else {
            self.state.last_path_request_pos = body.pos;
            self.state.non_moving_failures = 0;
        }

        if let Some(old) = self.state.path.take() {
            ctx.paths.delete_path(old);
        }
        self.state.path = ctx.paths.request_path(
            &body.profile.capability,
            ctx.terrain,
            body.pos,
            self.state.goal_pos,
            self.state.goal_radius,
            body.id,
        );
        self.state.restart_delay = ctx.tick + MAX_REPATH_FREQUENCY;
        if self.state.path.is_none() {
            return false;
        }

        self.state.eta.failures = 0;
        self.state.have_final_waypoint = false;
        self.state.next_waypoint = body.pos;
        self.get_next_waypoint(body, ctx);
        self.get_next_waypoint(body, ctx);
        self.state.path.is_some()
    }

    fn get_next_waypoint(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        let Some(path) = self.state.path else {
            return;
        };
        self.state.waypoint = self.state.next_waypoint;
        match ctx.paths.next_waypoint(path, body.pos, WAYPOINT_LOOKAHEAD) {
            Some(next) => self.state.next_waypoint = next,
            None => {
                self.fail(body, ctx, FailureReason::PathLost);
                return;
            }
        }
        if flat_dist(self.state.waypoint, self.state.goal_pos) <= PATH_RESOLUTION {
            self.state.waypoint = self.state.goal_pos;
            self.state.have_final_waypoint = true;
        }
        self.set_waypoint_etas(ctx.tick);
        self.state.idle.last_waypoint_distance = flat_dist(body.pos, self.state.waypoint);
    }

    fn set_waypoint_etas(&mut self, tick: u64) {
        let speed = (self.state.requested_speed * self.state.terrain_speed).max(0.01);
        self.state.eta.waypoint_deadline =
            tick + (ETA_BASE_DISTANCE / speed) as u64 + ETA_SLACK_TICKS;
        self.state.eta.clog_deadline =
            tick + (ETA2_BASE_DISTANCE / speed) as u64 + ETA2_SLACK_TICKS;
    }

    fn arrived(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        if self.state.progress != ProgressState::Active {
            return;
        }
        self.state.at_goal = true;
        self.stop_engine(body, ctx);
        self.state.progress = ProgressState::Done;
        if controller_debug_enabled() {
            debug!("{}: arrived at {:?}", body.id, body.pos);
        }
        ctx.emit(body.id, MoveEventKind::Arrived);
    }

    fn fail(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>, reason: FailureReason) {
        self.stop_engine(body, ctx);
        self.state.progress = ProgressState::Failed;
        self.state.want_repath = false;
        info!("{}: move failed ({:?}) at {:?}", body.id, reason, body.pos);
        ctx.emit(body.id, MoveEventKind::MoveFailed { reason });
    }

    /// Full repath, deferred while the request throttle is running.
    fn repath(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        if ctx.tick < self.state.restart_delay {
            self.state.want_repath = true;
            return;
        }
        self.state.want_repath = false;
        self.stop_engine(body, ctx);
        self.start_engine(body, ctx);
        if self.state.path.is_some() {
            if controller_debug_enabled() {
                debug!("{}: repathed from {:?}", body.id, body.pos);
            }
            ctx.emit(body.id, MoveEventKind::Repathed);
        }
    }

    fn goal_is_feasible(&self, body: &UnitBody, ctx: &MoveContext<'_>) -> bool {
        goal_feasible(
            &body.profile.capability,
            ctx.terrain,
            &*ctx.spatial,
            &*ctx.units,
            &*ctx.obstacles,
            body.id,
            body.pos,
            self.state.goal_pos,
            ctx.config.failure.goal_clog_fraction,
        )
    }

    // ========== Slow pass ==========

    pub fn slow_update(&mut self, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
        if body.dead {
            return;
        }
        if body.in_transport {
            if self.state.progress == ProgressState::Active {
                self.stop_engine(body, ctx);
            }
            return;
        }
        let config = ctx.config;

        if !self.state.is_skidding()
            && !body.falling
            && self.state.progress == ProgressState::Active
        {
            if self.state.eta.failures > config.failure.max_eta_failures {
                let goal_dist = flat_dist(body.pos, self.state.goal_pos);
                if goal_dist > config.failure.goal_near_distance
                    || self.goal_is_feasible(body, ctx)
                {
                    self.repath(body, ctx);
                } else {
                    self.fail(body, ctx, FailureReason::GoalClogged);
                }
            }

            if self.state.progress == ProgressState::Active
                && self.state.idle.ticks > self.idle_threshold(config)
            {
                if self.state.idle.repathed {
                    self.fail(body, ctx, FailureReason::Stuck);
                } else {
                    self.state.idle.repathed = true;
                    self.state.idle.ticks = 0;
                    self.repath(body, ctx);
                }
            }

            if self.state.progress == ProgressState::Active
                && self.state.path.is_none()
                && ctx.tick > self.state.restart_delay
                && !self.aggressive_pointing()
            {
                self.start_engine(body, ctx);
            }
        }

        if !self.state.is_flying() {
            let clamped = ctx.terrain.clamp_in_bounds(body.pos);
            body.pos.x = clamped.x;
            body.pos.z = clamped.z;
            if !body.falling {
                body.pos.y = ctx.terrain.height(body.pos.x, body.pos.z);
            }
        }
        if let Some(path) = self.state.path {
            ctx.paths.update_path(path, ctx.terrain);
        }
        ctx.spatial.unit_moved(body.id, body.pos, body.radius());
    }

    /// Idle ticks tolerated: a half turn at the turn rate, at least a
    /// second, plus the configured slack.
    fn idle_threshold(&self, config: &LocoConfig) -> u32 {
        let half_turn = (HEADING_HALF_CIRCLE as f32 / self.state.turn_rate.max(1.0)) as u32;
        half_turn.max(TICKS_PER_SECOND as u32) + config.failure.idle_slack_ticks
    }
}

/// Standing on a slope too steep for the unit's slide tolerance.
fn on_slope(body: &UnitBody, terrain: &dyn TerrainSampler) -> bool {
    let p = &body.profile;
    p.slide_tolerance >= 1.0
        && terrain.slope(body.pos.x, body.pos.z) > p.capability.max_slope * p.slide_tolerance
}
