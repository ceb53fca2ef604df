//! Grunt: a close-range skirmisher
//!
//! Idle until it sees the player, then pursues over the nav mesh and strafes
//! sideways while shooting once the player is in range.
//!
//! ```text
//!   Idle --sees player--> Pursuing --in range--> Strafing
//!    ^                     |  ^                    |
//!    +--reached last seen--+  +--lost / too far----+
//! ```

use std::sync::Arc;

use glam::Vec3;
use rand::Rng;

use super::controller::{
    AiController, BulletHit, Controller, ControllerBase, ControllerEvent, ControllerKind,
    HitOutcome, initialize_machine, switch_state, tick_machine,
};
use super::fsm::{FsmError, State, StateMachine, Transition};
use super::sensing::{EYE_HEIGHT, Perception};
use super::steering::{apply_drag, move_towards, turn_toward};
use crate::core::{GruntConfig, Time, Timer};
use crate::navigation::{NavAgent, NavMesh};
use crate::weapons::{AutoLauncher, Muzzle, Weapon};

/// Squared speed below which a body counts as stopped on arrival
const ARRIVAL_SPEED_SQ: f32 = 0.5;

/// Squared desired speed below which the agent is not followed
const MIN_DESIRED_SPEED_SQ: f32 = 0.1;

/// States of the grunt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GruntState {
    Idle,
    Pursuing,
    Strafing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    /// Drag the body to a halt
    Brake,
    /// Follow the navigation agent
    Navigate,
    /// Slide sideways along the strafe direction
    Strafe,
}

/// Everything grunt states act on.
#[derive(Debug)]
pub struct GruntBody {
    base: ControllerBase,
    config: GruntConfig,
    agent: NavAgent,
    weapon: AutoLauncher,
    motion: Motion,
    strafe_direction: Vec3,
}

impl GruntBody {
    pub fn new(
        name: impl Into<String>,
        config: &GruntConfig,
        position: Vec3,
        mesh: Arc<dyn NavMesh>,
        seed: u64,
    ) -> Self {
        let mut agent = NavAgent::new(mesh, config.move_speed, config.stopping_distance);
        agent.set_position(position);

        Self {
            base: ControllerBase::new(name, &config.controller, position, seed),
            config: config.clone(),
            agent,
            weapon: AutoLauncher::new(&config.weapon, config.controller.fire_rate),
            motion: Motion::Brake,
            strafe_direction: Vec3::ZERO,
        }
    }

    pub fn config(&self) -> &GruntConfig {
        &self.config
    }

    pub fn agent(&self) -> &NavAgent {
        &self.agent
    }

    pub fn weapon(&self) -> &AutoLauncher {
        &self.weapon
    }

    pub fn is_braking(&self) -> bool {
        self.motion == Motion::Brake
    }

    pub fn strafe_direction(&self) -> Vec3 {
        self.strafe_direction
    }

    /// Stop the agent and drag the body to a halt
    pub fn brake(&mut self) {
        self.motion = Motion::Brake;
        self.agent.stop();
    }

    /// Follow the navigation agent again
    pub fn start_moving(&mut self) {
        self.motion = Motion::Navigate;
        self.agent.resume();
    }

    /// Slide along the strafe direction instead of following the agent
    pub fn start_strafing(&mut self) {
        self.motion = Motion::Strafe;
    }

    pub fn set_destination(&mut self, target: Vec3) {
        self.agent.set_destination(target);
    }

    /// Pick left or right of the current facing at random
    pub fn choose_strafe_direction(&mut self) {
        let side = if self.base.rng().gen_bool(0.5) { 1.0 } else { -1.0 };
        self.strafe_direction = self.base.right() * side;
    }

    /// Random seconds until the next strafe decision
    pub fn roll_strafe_interval(&mut self) -> f32 {
        let [min, max] = self.config.strafe_duration;
        if max > min {
            self.base.rng().gen_range(min..max)
        } else {
            min
        }
    }

    /// Within the reach threshold of the last known position
    pub fn near_last_known_position(&self) -> bool {
        self.base
            .last_known_position()
            .is_some_and(|lkp| self.base.position().distance(lkp) <= self.config.target_reached_threshold)
    }

    /// The agent has finished its path and the body has come to rest
    pub fn destination_reached(&self) -> bool {
        !self.agent.path_pending()
            && self.agent.remaining_distance() <= self.agent.stopping_distance()
            && (!self.agent.has_path() || self.base.velocity().length_squared() < ARRIVAL_SPEED_SQ)
    }

    fn muzzle(&self) -> Muzzle {
        let forward = self.base.forward();
        Muzzle::new(
            self.base.position() + Vec3::Y * EYE_HEIGHT + forward * 0.5,
            forward,
        )
    }

    /// Blend the body's velocity toward what the current motion wants
    fn actuate(&mut self, dt: f32) -> Vec3 {
        if let Some(shot) = self.weapon.update(dt, self.muzzle()) {
            self.base.emit(ControllerEvent::Shot(shot));
        }

        let velocity = self.base.velocity();
        let max_delta = self.config.acceleration * dt;

        let velocity = match self.motion {
            Motion::Brake => apply_drag(velocity, self.config.braking_drag, dt),
            Motion::Navigate => {
                let desired = self.agent.desired_velocity();
                if self.agent.has_path() && desired.length_squared() >= MIN_DESIRED_SPEED_SQ {
                    let max_degrees = self.base.config().turn_speed * dt;
                    let position = self.base.position();
                    let rotation = turn_toward(self.base.rotation(), position, position + desired, max_degrees);
                    self.base.set_rotation(rotation);
                    move_towards(velocity, desired, max_delta)
                } else {
                    move_towards(velocity, Vec3::ZERO, max_delta)
                }
            }
            Motion::Strafe => {
                let mut target = self.strafe_direction * self.config.strafe_speed;
                target.y = velocity.y;
                move_towards(velocity, target, max_delta)
            }
        };

        self.base.set_velocity(velocity);
        velocity
    }
}

impl AiController for GruntBody {
    fn base(&self) -> &ControllerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ControllerBase {
        &mut self.base
    }

    fn start_shooting(&mut self) {
        self.weapon.set_fire_rate(self.config.controller.fire_rate);
        self.weapon.set_trigger(true);
    }

    fn stop_shooting(&mut self) {
        self.weapon.set_trigger(false);
    }

    fn die(&mut self) {
        if self.base.is_alive() {
            self.brake();
            self.stop_shooting();
            self.agent.reset_path();
            self.base.mark_dead();
        }
    }
}

// ============================================================================
// States
// ============================================================================

#[derive(Debug, Default)]
struct Idle;

impl State<GruntState, GruntBody> for Idle {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn enter(&mut self, ctrl: &mut GruntBody) {
        ctrl.brake();
    }

    fn execute(&mut self, ctrl: &mut GruntBody) -> Transition<GruntState> {
        ctrl.idle_look();
        if ctrl.is_target_in_view() {
            ctrl.base_mut().remember_target();
            return Transition::To(GruntState::Pursuing);
        }
        Transition::None
    }
}

#[derive(Debug, Default)]
struct Pursuing;

impl State<GruntState, GruntBody> for Pursuing {
    fn name(&self) -> &'static str {
        "Pursuing"
    }

    fn enter(&mut self, ctrl: &mut GruntBody) {
        ctrl.start_moving();
        let target = if ctrl.is_target_in_view() {
            ctrl.base_mut().remember_target()
        } else {
            ctrl.base().last_known_position()
        };
        if let Some(target) = target {
            ctrl.set_destination(target);
        }
    }

    fn execute(&mut self, ctrl: &mut GruntBody) -> Transition<GruntState> {
        if ctrl.is_target_in_view()
            && let Some(target) = ctrl.base_mut().remember_target()
        {
            if ctrl.is_target_in_range() {
                return Transition::To(GruntState::Strafing);
            }
            ctrl.set_destination(target);
            return Transition::None;
        }

        let Some(last_known) = ctrl.base().last_known_position() else {
            return Transition::To(GruntState::Idle);
        };

        // Raw distance and agent status both count; either means we are there
        if ctrl.near_last_known_position() || ctrl.destination_reached() {
            return Transition::To(GruntState::Idle);
        }

        ctrl.set_destination(last_known);
        Transition::None
    }
}

#[derive(Debug)]
struct Strafing {
    redecide: Timer,
}

impl Default for Strafing {
    fn default() -> Self {
        Self {
            redecide: Timer::finished(0.0),
        }
    }
}

impl State<GruntState, GruntBody> for Strafing {
    fn name(&self) -> &'static str {
        "Strafing"
    }

    fn enter(&mut self, ctrl: &mut GruntBody) {
        ctrl.start_strafing();
        ctrl.choose_strafe_direction();
        let interval = ctrl.roll_strafe_interval();
        self.redecide.restart(interval);
        ctrl.start_shooting();
    }

    fn execute(&mut self, ctrl: &mut GruntBody) -> Transition<GruntState> {
        if let Some(last_known) = ctrl.base().last_known_position() {
            ctrl.turn_toward(last_known);
        }

        if !ctrl.is_target_in_view() || !ctrl.is_target_in_range() {
            return Transition::To(GruntState::Pursuing);
        }

        ctrl.base_mut().remember_target();

        let dt = ctrl.base().delta_seconds();
        if self.redecide.tick(dt) {
            ctrl.choose_strafe_direction();
            let interval = ctrl.roll_strafe_interval();
            self.redecide.restart(interval);
        }
        Transition::None
    }

    fn exit(&mut self, ctrl: &mut GruntBody) {
        ctrl.stop_shooting();
    }
}

// ============================================================================
// Controller
// ============================================================================

/// A grunt: body plus its state machine
#[derive(Debug)]
pub struct Grunt {
    body: GruntBody,
    fsm: StateMachine<GruntState, GruntBody>,
}

impl Grunt {
    pub fn new(
        name: impl Into<String>,
        config: &GruntConfig,
        position: Vec3,
        mesh: Arc<dyn NavMesh>,
        seed: u64,
    ) -> Self {
        let name = name.into();
        let fsm = StateMachine::new(name.clone())
            .with_state(GruntState::Idle, Idle)
            .with_state(GruntState::Pursuing, Pursuing)
            .with_state(GruntState::Strafing, Strafing::default());

        Self {
            body: GruntBody::new(name, config, position, mesh, seed),
            fsm,
        }
    }

    /// Face along `yaw` radians before the first tick
    #[must_use]
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.body.base.set_rotation(glam::Quat::from_rotation_y(yaw));
        self
    }

    pub fn body(&self) -> &GruntBody {
        &self.body
    }

    pub fn state(&self) -> Option<GruntState> {
        self.fsm.current()
    }

    /// Escalate an idle grunt that survived a hit
    fn react_to_damage(&mut self, outcome: HitOutcome) {
        if matches!(outcome, HitOutcome::Damaged { .. }) && self.fsm.is_in_state(GruntState::Idle) {
            switch_state(&mut self.fsm, &mut self.body, GruntState::Pursuing);
        }
    }
}

impl Controller for Grunt {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Grunt
    }

    fn base(&self) -> &ControllerBase {
        &self.body.base
    }

    fn base_mut(&mut self) -> &mut ControllerBase {
        &mut self.body.base
    }

    fn state_name(&self) -> Option<&'static str> {
        self.fsm.current_state_name()
    }

    fn initialize(&mut self) -> Result<(), FsmError> {
        initialize_machine(&mut self.fsm, &mut self.body, GruntState::Idle)
    }

    fn sense(&mut self, position: Vec3, velocity: Vec3, perception: Perception, time: &Time) {
        self.body.base.sync(position, velocity, perception, time);
        self.body.agent.set_position(position);
        self.body.agent.set_velocity(velocity);
    }

    fn tick(&mut self) -> Result<(), FsmError> {
        tick_machine(&mut self.fsm, &mut self.body)
    }

    fn actuate(&mut self, dt: f32) -> Vec3 {
        if !self.body.base.is_alive() {
            return Vec3::ZERO;
        }
        self.body.agent.update_path();
        self.body.actuate(dt)
    }

    fn bullet_hit(&mut self, hit: BulletHit) -> HitOutcome {
        if !self.body.base.is_alive() {
            return HitOutcome::Ignored;
        }
        self.body.base.set_last_known_position(hit.origin);
        let outcome = self.body.suffer(hit.damage, Some(hit.origin));
        self.react_to_damage(outcome);
        outcome
    }

    fn take_damage(&mut self, amount: f32) -> HitOutcome {
        let outcome = self.body.suffer(amount, None);
        self.react_to_damage(outcome);
        outcome
    }

    fn teardown(&mut self) {
        self.body.stop_shooting();
        self.body.agent.reset_path();
    }
}
