//! Turret: a stationary lobber
//!
//! Scans with its head until the player is in view and in range, then lobs
//! charged shots along a ballistic arc. After losing sight it keeps covering
//! the last known position for a while before going back to scanning.

use glam::{Quat, Vec3};

use super::controller::{
    AiController, BulletHit, Controller, ControllerBase, ControllerEvent, ControllerKind,
    HitOutcome, initialize_machine, switch_state, tick_machine,
};
use super::fsm::{FsmError, State, StateMachine, Transition};
use super::sensing::EYE_HEIGHT;
use super::steering::{flatten, turn_toward};
use crate::core::{Cooldown, TurretConfig};
use crate::weapons::{ChargedLauncher, Muzzle, Weapon};

/// Horizontal distance below which the head does not re-aim
const MIN_AIM_DISTANCE_SQ: f32 = 0.01;

/// Launch speed that lands a 45° shot `distance` away under `gravity`.
#[inline]
#[must_use]
pub fn ballistic_launch_speed(distance: f32, gravity: f32) -> f32 {
    (distance.max(0.0) * gravity.max(0.0)).sqrt()
}

/// States of the turret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurretState {
    Idle,
    Attacking,
}

/// Everything turret states act on.
#[derive(Debug)]
pub struct TurretBody {
    base: ControllerBase,
    config: TurretConfig,
    weapon: ChargedLauncher,
    cooldown: Cooldown,
    engagement_time: f32,
    /// Independent head rotation, if the turret has one
    head: Option<Quat>,
}

impl TurretBody {
    pub fn new(name: impl Into<String>, config: &TurretConfig, position: Vec3, seed: u64) -> Self {
        Self {
            base: ControllerBase::new(name, &config.controller, position, seed),
            config: config.clone(),
            weapon: ChargedLauncher::new(&config.weapon),
            cooldown: Cooldown::new(),
            engagement_time: 0.0,
            head: config.has_head.then_some(Quat::IDENTITY),
        }
    }

    pub fn config(&self) -> &TurretConfig {
        &self.config
    }

    pub fn weapon(&self) -> &ChargedLauncher {
        &self.weapon
    }

    /// Seconds spent covering the last known position without sight
    pub fn engagement_time(&self) -> f32 {
        self.engagement_time
    }

    /// Whether the cooldown after the last shot has elapsed
    pub fn is_cooled_down(&self) -> bool {
        self.cooldown.is_ready()
    }

    /// Rotation of the part that aims: the head, or the whole body
    pub fn aim_rotation(&self) -> Quat {
        self.head.unwrap_or_else(|| self.base.rotation())
    }

    fn set_aim_rotation(&mut self, rotation: Quat) {
        match self.head.as_mut() {
            Some(head) => *head = rotation,
            None => self.base.set_rotation(rotation),
        }
    }

    /// Direction the head (or body) faces
    pub fn aim_forward(&self) -> Vec3 {
        self.aim_rotation() * Vec3::NEG_Z
    }

    /// Set the launch speed for the last known position
    pub fn calculate_firing_solution(&mut self) {
        let Some(target) = self.base.last_known_position() else {
            return;
        };
        let distance = flatten(target - self.base.position()).length();
        let speed = ballistic_launch_speed(distance, self.config.effective_gravity);
        self.weapon.set_launch_speed(speed);
    }

    fn muzzle(&self) -> Muzzle {
        let forward = self.aim_forward();
        // 45° elevation for the ballistic solution
        Muzzle::new(
            self.base.position() + Vec3::Y * EYE_HEIGHT + forward,
            forward + Vec3::Y,
        )
    }

    fn actuate(&mut self, dt: f32) {
        if self.cooldown.poll(dt) {
            log::trace!("[{}] cooled down", self.base.name());
        }
        let muzzle = self.muzzle();
        self.weapon.update(dt, muzzle);
    }
}

impl AiController for TurretBody {
    fn base(&self) -> &ControllerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ControllerBase {
        &mut self.base
    }

    fn turn_toward(&mut self, point: Vec3) {
        let position = self.base.position();
        if flatten(point - position).length_squared() <= MIN_AIM_DISTANCE_SQ {
            return;
        }
        let max_degrees = self.base.config().turn_speed * self.base.delta_seconds();
        let rotation = turn_toward(self.aim_rotation(), position, point, max_degrees);
        self.set_aim_rotation(rotation);
    }

    fn idle_look(&mut self) {
        let rotation = self.aim_rotation();
        let rotation = self.base.idle_look_rotation(rotation);
        self.set_aim_rotation(rotation);
    }

    /// Fire a charged shot, or start charging once the cooldown allows
    fn start_shooting(&mut self) {
        if self.weapon.ready_to_fire() {
            let muzzle = self.muzzle();
            if let Some(shot) = self.weapon.fire(muzzle) {
                log::debug!(
                    "[{}] lobbing shot at {:.1} m/s",
                    self.base.name(),
                    shot.speed
                );
                self.base.emit(ControllerEvent::Shot(shot));
            }
            self.cooldown.start(self.config.cooldown);
        } else if self.cooldown.is_ready() {
            self.weapon.charge_up();
        }
    }

    fn stop_shooting(&mut self) {
        self.weapon.cancel();
        self.cooldown.cancel();
    }
}

// ============================================================================
// States
// ============================================================================

#[derive(Debug)]
struct Idle;

impl State<TurretState, TurretBody> for Idle {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn execute(&mut self, ctrl: &mut TurretBody) -> Transition<TurretState> {
        ctrl.idle_look();

        if ctrl.is_target_in_view() && ctrl.is_target_in_range() {
            Transition::To(TurretState::Attacking)
        } else {
            Transition::None
        }
    }
}

#[derive(Debug)]
struct Attacking;

impl State<TurretState, TurretBody> for Attacking {
    fn name(&self) -> &'static str {
        "Attacking"
    }

    fn enter(&mut self, ctrl: &mut TurretBody) {
        if ctrl.is_target_in_view() {
            ctrl.base.remember_target();
        }
    }

    fn execute(&mut self, ctrl: &mut TurretBody) -> Transition<TurretState> {
        ctrl.calculate_firing_solution();
        ctrl.start_shooting();

        if ctrl.is_target_in_view() {
            ctrl.base.remember_target();
            ctrl.engagement_time = 0.0;
        } else if ctrl.engagement_time < ctrl.config.engagement_timeout {
            ctrl.engagement_time += ctrl.base.delta_seconds();
        } else {
            log::debug!(
                "[{}] lost the player for {:.1}s, standing down",
                ctrl.base.name(),
                ctrl.engagement_time
            );
            return Transition::To(TurretState::Idle);
        }

        if let Some(last_known) = ctrl.base.last_known_position() {
            ctrl.turn_toward(last_known);
        }
        Transition::None
    }

    fn exit(&mut self, ctrl: &mut TurretBody) {
        ctrl.stop_shooting();
        ctrl.engagement_time = 0.0;
    }
}

// ============================================================================
// Controller
// ============================================================================

/// A turret: body plus its state machine
#[derive(Debug)]
pub struct Turret {
    body: TurretBody,
    fsm: StateMachine<TurretState, TurretBody>,
}

impl Turret {
    pub fn new(name: impl Into<String>, config: &TurretConfig, position: Vec3, seed: u64) -> Self {
        let name = name.into();
        let fsm = StateMachine::new(name.clone())
            .with_state(TurretState::Idle, Idle)
            .with_state(TurretState::Attacking, Attacking);

        Self {
            body: TurretBody::new(name, config, position, seed),
            fsm,
        }
    }

    /// Face base and head along `yaw` radians before the first tick
    #[must_use]
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        let rotation = Quat::from_rotation_y(yaw);
        self.body.base.set_rotation(rotation);
        self.body.set_aim_rotation(rotation);
        self
    }

    pub fn body(&self) -> &TurretBody {
        &self.body
    }

    pub fn state(&self) -> Option<TurretState> {
        self.fsm.current()
    }
}

impl Controller for Turret {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Turret
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
        initialize_machine(&mut self.fsm, &mut self.body, TurretState::Idle)
    }

    fn tick(&mut self) -> Result<(), FsmError> {
        tick_machine(&mut self.fsm, &mut self.body)
    }

    fn actuate(&mut self, dt: f32) -> Vec3 {
        if self.body.base.is_alive() {
            self.body.actuate(dt);
        }
        Vec3::ZERO
    }

    /// Any hit reveals the shooter: cover its origin and engage
    fn bullet_hit(&mut self, hit: BulletHit) -> HitOutcome {
        if !self.body.base.is_alive() {
            return HitOutcome::Ignored;
        }
        self.body.base.set_last_known_position(hit.origin);
        self.body.engagement_time = 0.0;
        if !self.fsm.is_in_state(TurretState::Attacking) {
            switch_state(&mut self.fsm, &mut self.body, TurretState::Attacking);
        }
        self.body.suffer(hit.damage, Some(hit.origin))
    }

    fn take_damage(&mut self, amount: f32) -> HitOutcome {
        self.body.suffer(amount, None)
    }

    fn teardown(&mut self) {
        self.body.stop_shooting();
    }

    fn view_facing(&self) -> Vec3 {
        self.body.aim_forward()
    }
}
