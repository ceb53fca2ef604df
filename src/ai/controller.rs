//! Controller contract shared by every enemy type
//!
//! An enemy is split in two halves:
//!
//! - a body (e.g. `GruntBody`) implementing [`AiController`]: the sensing
//!   snapshot, actuators and per-type data that states operate on, and
//! - a [`StateMachine`] over that body.
//!
//! The pair is wrapped in a type implementing [`Controller`], which is what
//! the simulation drives once per tick.

use std::f32::consts::TAU;
use std::fmt;
use std::hash::Hash;

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::fsm::{ChangeOutcome, FsmError, StateMachine};
use super::sensing::Perception;
use super::steering::{rotate_towards, turn_toward};
use crate::core::{ControllerConfig, SensorConfig, Time, Timer};
use crate::ecs::Transform;
use crate::weapons::Shot;

/// The three enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Grunt,
    Tank,
    Turret,
}

impl ControllerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grunt => "grunt",
            Self::Tank => "tank",
            Self::Turret => "turret",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A projectile impact reported to a controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletHit {
    /// Where the projectile was fired from
    pub origin: Vec3,
    /// Damage it carries
    pub damage: f32,
}

/// What a hit did to the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    /// The controller was already dead
    Ignored,
    /// Damage applied, still alive
    Damaged { health: f32 },
    /// This hit killed the controller
    Killed,
}

/// Something a controller wants the outside world to know about.
///
/// The simulation drains these every tick and republishes them as
/// `AiEvent`s tagged with the entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged {
        from: Option<&'static str>,
        to: &'static str,
    },
    Damaged {
        amount: f32,
        origin: Option<Vec3>,
        health: f32,
    },
    Died {
        position: Vec3,
    },
    Shot(Shot),
    Disabled {
        reason: String,
    },
}

/// Periodic random heading for idle scanning
#[derive(Debug, Clone)]
struct IdleLook {
    timer: Timer,
    heading: Quat,
}

/// Data every controller has, whatever its type.
#[derive(Debug)]
pub struct ControllerBase {
    name: String,
    config: ControllerConfig,
    health: f32,
    alive: bool,
    enabled: bool,
    pose: Transform,
    velocity: Vec3,
    last_known_position: Option<Vec3>,
    perception: Perception,
    dt: f32,
    elapsed: f32,
    rng: ChaCha8Rng,
    idle_look: IdleLook,
    outbox: Vec<ControllerEvent>,
}

impl ControllerBase {
    /// Create the shared data for a controller spawned at `position`.
    pub fn new(name: impl Into<String>, config: &ControllerConfig, position: Vec3, seed: u64) -> Self {
        Self {
            name: name.into(),
            config: config.clone(),
            health: config.health,
            alive: true,
            enabled: true,
            pose: Transform::from_position(position),
            velocity: Vec3::ZERO,
            last_known_position: None,
            perception: Perception::default(),
            dt: 0.0,
            elapsed: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            idle_look: IdleLook {
                timer: Timer::finished(config.idle_look_time),
                heading: Quat::IDENTITY,
            },
            outbox: Vec::new(),
        }
    }

    /// Set the initial facing as a yaw angle in radians
    #[must_use]
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.pose.rotation = Quat::from_rotation_y(yaw);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn sensors(&self) -> &SensorConfig {
        &self.config.sensors
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        self.config.health
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop running this controller after a fatal setup error
    pub fn disable(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("[{}] disabled: {reason}", self.name);
        self.enabled = false;
        self.outbox.push(ControllerEvent::Disabled { reason });
    }

    pub fn pose(&self) -> &Transform {
        &self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.pose.position = position;
    }

    pub fn rotation(&self) -> Quat {
        self.pose.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.pose.rotation = rotation;
    }

    /// Facing direction of the body
    pub fn forward(&self) -> Vec3 {
        self.pose.forward()
    }

    pub fn right(&self) -> Vec3 {
        self.pose.right()
    }

    /// Velocity of the body as integrated by physics
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Where the player was last sensed. `None` before first contact.
    pub fn last_known_position(&self) -> Option<Vec3> {
        self.last_known_position
    }

    pub fn set_last_known_position(&mut self, position: Vec3) {
        self.last_known_position = Some(position);
    }

    /// Record the current player position as last known, if sensed
    pub fn remember_target(&mut self) -> Option<Vec3> {
        let target = self.perception.target?;
        self.last_known_position = Some(target);
        Some(target)
    }

    pub fn perception(&self) -> &Perception {
        &self.perception
    }

    pub fn delta_seconds(&self) -> f32 {
        self.dt
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }

    /// Controller-local random stream
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Copy the tick's inputs into the controller
    pub fn sync(&mut self, position: Vec3, velocity: Vec3, perception: Perception, time: &Time) {
        self.pose.position = position;
        self.velocity = velocity;
        self.perception = perception;
        self.dt = time.delta_seconds();
        self.elapsed = time.elapsed_seconds();
    }

    /// Queue an event for the simulation
    pub fn emit(&mut self, event: ControllerEvent) {
        self.outbox.push(event);
    }

    /// Take every queued event
    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Publish a state change reported by the machine
    pub fn record_transition(&mut self, outcome: ChangeOutcome) {
        if let ChangeOutcome::Changed { from, to } = outcome {
            self.outbox.push(ControllerEvent::StateChanged { from, to });
        }
    }

    /// Rotate the body toward `point` at the configured turn speed
    pub fn turn_toward(&mut self, point: Vec3) {
        let max_degrees = self.config.turn_speed * self.dt;
        self.pose.rotation = turn_toward(self.pose.rotation, self.pose.position, point, max_degrees);
    }

    /// Advance the idle scan and return `rotation` slewed toward the current
    /// idle heading.
    pub fn idle_look_rotation(&mut self, rotation: Quat) -> Quat {
        if self.idle_look.timer.tick(self.dt) {
            let yaw = self.rng.gen_range(0.0..TAU);
            self.idle_look.heading = Quat::from_rotation_y(yaw);
            self.idle_look.timer.restart(self.config.idle_look_time);
        }

        rotate_towards(
            rotation,
            self.idle_look.heading,
            self.config.idle_rotation_speed * self.dt,
        )
    }

    /// Idle scan with the whole body
    pub fn idle_look(&mut self) {
        self.pose.rotation = self.idle_look_rotation(self.pose.rotation);
    }

    /// Subtract damage. Reports `Killed` when health reaches zero; the caller
    /// is responsible for running death.
    pub fn apply_damage(&mut self, amount: f32, origin: Option<Vec3>) -> HitOutcome {
        if !self.alive {
            log::debug!("[{}] ignoring damage after death", self.name);
            return HitOutcome::Ignored;
        }

        self.health -= amount;
        self.outbox.push(ControllerEvent::Damaged {
            amount,
            origin,
            health: self.health,
        });

        if self.health <= 0.0 {
            HitOutcome::Killed
        } else {
            HitOutcome::Damaged {
                health: self.health,
            }
        }
    }

    /// Mark the controller dead and publish the death position. Returns
    /// false if it was already dead.
    pub fn mark_dead(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        self.velocity = Vec3::ZERO;
        log::info!("[{}] died at {}", self.name, self.pose.position);
        self.outbox.push(ControllerEvent::Died {
            position: self.pose.position,
        });
        true
    }
}

/// Capabilities states use to sense and act through their controller.
pub trait AiController {
    fn base(&self) -> &ControllerBase;

    fn base_mut(&mut self) -> &mut ControllerBase;

    /// Player within `range` this tick
    fn is_target_in_range(&self) -> bool {
        self.base().perception().in_range
    }

    /// Player within the view cone and unobstructed this tick
    fn is_target_in_view(&self) -> bool {
        self.base().perception().in_view
    }

    /// Player position this tick, if there is a player
    fn target_position(&self) -> Option<Vec3> {
        self.base().perception().target
    }

    /// Rotate toward `point` at bounded angular speed
    fn turn_toward(&mut self, point: Vec3) {
        self.base_mut().turn_toward(point);
    }

    /// Slowly scan around while idle
    fn idle_look(&mut self) {
        self.base_mut().idle_look();
    }

    fn start_shooting(&mut self) {}

    fn stop_shooting(&mut self) {}

    /// Apply damage from an unknown source
    fn take_damage(&mut self, amount: f32) -> HitOutcome {
        self.suffer(amount, None)
    }

    /// Apply damage and run death if it was lethal
    fn suffer(&mut self, amount: f32, origin: Option<Vec3>) -> HitOutcome {
        let outcome = self.base_mut().apply_damage(amount, origin);
        if outcome == HitOutcome::Killed {
            self.die();
        }
        outcome
    }

    /// Stop acting and publish the death. Runs once.
    fn die(&mut self) {
        if self.base().is_alive() {
            self.stop_shooting();
            self.base_mut().mark_dead();
        }
    }
}

/// An enemy as seen by the simulation.
pub trait Controller: Send + Sync + fmt::Debug {
    fn kind(&self) -> ControllerKind;

    fn base(&self) -> &ControllerBase;

    fn base_mut(&mut self) -> &mut ControllerBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Name of the active state, `None` before initialization
    fn state_name(&self) -> Option<&'static str>;

    /// Enter the start state.
    ///
    /// # Errors
    ///
    /// Fails if the start state is missing; the controller disables itself.
    fn initialize(&mut self) -> Result<(), FsmError>;

    /// Take in this tick's position, velocity and perception
    fn sense(&mut self, position: Vec3, velocity: Vec3, perception: Perception, time: &Time) {
        self.base_mut().sync(position, velocity, perception, time);
    }

    /// Run the state machine once.
    ///
    /// # Errors
    ///
    /// Fails if the machine was never initialized or requests an unknown state.
    fn tick(&mut self) -> Result<(), FsmError>;

    /// Turn decisions into motion. Returns the velocity for the physics step;
    /// fired shots are queued as events.
    fn actuate(&mut self, dt: f32) -> Vec3;

    /// A projectile hit this controller
    fn bullet_hit(&mut self, hit: BulletHit) -> HitOutcome;

    /// Damage without a known source (explosions)
    fn take_damage(&mut self, amount: f32) -> HitOutcome;

    /// Release timers and weapons before removal
    fn teardown(&mut self) {}

    /// Direction the view cone is centred on
    fn view_facing(&self) -> Vec3 {
        self.base().forward()
    }

    fn drain_events(&mut self) -> Vec<ControllerEvent> {
        self.base_mut().drain_events()
    }

    fn is_alive(&self) -> bool {
        self.base().is_alive()
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }
}

/// Enter `start`, disabling the body if it is missing
pub(crate) fn initialize_machine<K, B>(
    fsm: &mut StateMachine<K, B>,
    body: &mut B,
    start: K,
) -> Result<(), FsmError>
where
    K: Copy + Eq + Hash + fmt::Debug,
    B: AiController,
{
    match fsm.initialize(body, start) {
        Ok(outcome) => {
            body.base_mut().record_transition(outcome);
            Ok(())
        }
        Err(err) => {
            body.base_mut().disable(err.to_string());
            Err(err)
        }
    }
}

/// Run one state machine step for a live, enabled body
pub(crate) fn tick_machine<K, B>(fsm: &mut StateMachine<K, B>, body: &mut B) -> Result<(), FsmError>
where
    K: Copy + Eq + Hash + fmt::Debug,
    B: AiController,
{
    if !body.base().is_alive() || !body.base().is_enabled() {
        return Ok(());
    }
    let outcome = fsm.tick(body)?;
    body.base_mut().record_transition(outcome);
    Ok(())
}

/// Switch state from outside the machine (hit reactions)
pub(crate) fn switch_state<K, B>(fsm: &mut StateMachine<K, B>, body: &mut B, next: K)
where
    K: Copy + Eq + Hash + fmt::Debug,
    B: AiController,
{
    // Unknown states are already logged by the machine
    if let Ok(outcome) = fsm.change_state(body, next) {
        body.base_mut().record_transition(outcome);
    }
}
