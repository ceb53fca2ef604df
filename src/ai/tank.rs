//! Tank: a long-range artillery unit
//!
//! Patrols random points while idle, keeps the player at arm's length while
//! shooting, and searches the last known position when it loses sight.
//!
//! ```text
//!   Idle --sees player--> Distancing --loses sight--> Searching
//!    ^                        ^                           |
//!    |                        +------sees player----------+
//!    +-----------------reached last known position--------+
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
use super::steering::{angle_to, flee_direction, turn_toward};
use crate::core::{Cooldown, TankConfig, TankFirePolicy, Time, Timer};
use crate::navigation::{NavAgent, NavMesh};
use crate::weapons::{AutoLauncher, ChargedLauncher, Muzzle, Weapon};

/// Squared agent speed below which the tank counts as stopped
const STOPPED_SPEED_SQ: f32 = 0.1;

/// States of the tank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TankState {
    Idle,
    Distancing,
    Searching,
}

/// Pick a point to back off to, directly away from `player`.
///
/// Tries the point that restores `range`, then a fixed `fallback_distance`
/// step, both snapped with `sample`. A sample that would bring the tank
/// closer to the player is rejected. Returns `position` if nothing works.
pub fn retreat_point(
    position: Vec3,
    player: Vec3,
    range: f32,
    sample_radius: f32,
    fallback_distance: f32,
    sample: impl Fn(Vec3, f32) -> Option<Vec3>,
) -> Vec3 {
    let current_distance = position.distance(player);
    let away = flee_direction(position, player);
    if away == Vec3::ZERO {
        return position;
    }

    let keeps_distance = |point: &Vec3| point.distance(player) >= current_distance;

    let ideal = position + away * (range - current_distance);
    if let Some(point) = sample(ideal, sample_radius).filter(keeps_distance) {
        return point;
    }
    log::debug!("retreat sample near {ideal} failed, trying fallback");

    let fallback = position + away * fallback_distance;
    if let Some(point) = sample(fallback, sample_radius).filter(keeps_distance) {
        return point;
    }

    log::warn!("no navigable retreat point from {position}, holding position");
    position
}

/// Everything tank states act on.
#[derive(Debug)]
pub struct TankBody {
    base: ControllerBase,
    config: TankConfig,
    agent: NavAgent,
    weapon: Box<dyn Weapon>,
    shooting: bool,
    cooldown: Cooldown,
    patrol_target: Option<Vec3>,
}

impl TankBody {
    pub fn new(
        name: impl Into<String>,
        config: &TankConfig,
        position: Vec3,
        mesh: Arc<dyn NavMesh>,
        seed: u64,
    ) -> Self {
        let mut agent = NavAgent::new(mesh, config.move_speed, config.stopping_distance);
        agent.set_position(position);

        let weapon: Box<dyn Weapon> = match config.fire_policy {
            TankFirePolicy::Direct => Box::new(AutoLauncher::new(
                &config.weapon,
                config.controller.fire_rate,
            )),
            TankFirePolicy::Charged { .. } => Box::new(ChargedLauncher::new(&config.weapon)),
        };

        Self {
            base: ControllerBase::new(name, &config.controller, position, seed),
            config: config.clone(),
            agent,
            weapon,
            shooting: false,
            cooldown: Cooldown::new(),
            patrol_target: None,
        }
    }

    pub fn config(&self) -> &TankConfig {
        &self.config
    }

    pub fn agent(&self) -> &NavAgent {
        &self.agent
    }

    pub fn is_shooting(&self) -> bool {
        self.shooting
    }

    pub fn patrol_target(&self) -> Option<Vec3> {
        self.patrol_target
    }

    /// Resume the agent and path to `target`
    pub fn set_agent_destination(&mut self, target: Vec3) {
        self.agent.resume();
        self.agent.set_destination(target);
    }

    pub fn stop_movement(&mut self) {
        self.agent.stop();
    }

    /// Choose a random navigable point within `range`. Returns false (and
    /// forgets the patrol target) if sampling fails.
    pub fn pick_patrol_point(&mut self) -> bool {
        let radius = self.base.sensors().range;
        let offset = random_in_unit_sphere(self.base.rng()) * radius;
        let candidate = self.base.position() + offset;

        match self.agent.sample_position(candidate, radius) {
            Some(point) => {
                self.patrol_target = Some(point);
                true
            }
            None => {
                log::warn!(
                    "[{}] no navigable patrol point within {radius}",
                    self.base.name()
                );
                self.patrol_target = None;
                false
            }
        }
    }

    /// Where to back off to from the player sensed this tick
    pub fn retreat_point(&self) -> Vec3 {
        let position = self.base.position();
        let Some(player) = self.base.perception().target else {
            log::warn!("[{}] retreat without a player, holding position", self.base.name());
            return position;
        };

        retreat_point(
            position,
            player,
            self.base.sensors().range,
            self.config.retreat_sample_radius,
            self.config.retreat_fallback_distance,
            |point, radius| self.agent.sample_position(point, radius),
        )
    }

    /// Path finished and the agent has stopped, within `threshold`
    pub fn reached_destination(&self, threshold: f32) -> bool {
        !self.agent.path_pending()
            && self.agent.remaining_distance() <= threshold
            && !self.agent.has_path()
            && self.agent.velocity().length_squared() < STOPPED_SPEED_SQ
    }

    fn muzzle(&self) -> Muzzle {
        let forward = self.base.forward();
        Muzzle::new(
            self.base.position() + Vec3::Y * EYE_HEIGHT + forward,
            forward,
        )
    }

    /// Where the gun should point
    fn aim_point(&self) -> Option<Vec3> {
        if self.base.perception().in_view {
            self.base.perception().target
        } else {
            self.base.last_known_position()
        }
    }

    fn operate_weapon(&mut self, dt: f32) -> Option<crate::weapons::Shot> {
        let muzzle = self.muzzle();
        let shot = self.weapon.update(dt, muzzle);
        if !self.shooting {
            return shot;
        }

        match self.config.fire_policy {
            TankFirePolicy::Direct => shot,
            TankFirePolicy::Charged {
                cooldown,
                aim_window,
            } => {
                self.cooldown.poll(dt);

                if self.weapon.ready_to_fire() {
                    let aim_error = self.aim_point().map_or(0.0, |target| {
                        angle_to(self.base.forward(), self.base.position(), target)
                    });
                    if aim_error <= aim_window {
                        let shot = self.weapon.fire(muzzle);
                        self.cooldown.start(cooldown);
                        return shot;
                    }
                } else if self.cooldown.is_ready() {
                    self.weapon.charge_up();
                }
                None
            }
        }
    }

    fn actuate(&mut self, dt: f32) -> Vec3 {
        if let Some(shot) = self.operate_weapon(dt) {
            self.base.emit(ControllerEvent::Shot(shot));
        }

        let velocity = self.agent.desired_velocity();

        // While shooting the turret faces the player, otherwise face travel
        if !self.shooting && velocity.length_squared() > STOPPED_SPEED_SQ {
            let position = self.base.position();
            let max_degrees = self.base.config().turn_speed * dt;
            let rotation = turn_toward(self.base.rotation(), position, position + velocity, max_degrees);
            self.base.set_rotation(rotation);
        }

        self.base.set_velocity(velocity);
        velocity
    }
}

impl AiController for TankBody {
    fn base(&self) -> &ControllerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ControllerBase {
        &mut self.base
    }

    fn start_shooting(&mut self) {
        self.shooting = true;
        self.weapon.set_trigger(true);
    }

    fn stop_shooting(&mut self) {
        self.shooting = false;
        self.weapon.set_trigger(false);
        self.weapon.cancel();
        self.cooldown.cancel();
    }

    fn die(&mut self) {
        if self.base.is_alive() {
            self.stop_shooting();
            self.agent.reset_path();
            self.base.mark_dead();
        }
    }
}

fn random_in_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let point = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if point.length_squared() <= 1.0 {
            return point;
        }
    }
}

// ============================================================================
// States
// ============================================================================

#[derive(Debug, Default)]
struct Idle;

impl State<TankState, TankBody> for Idle {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn enter(&mut self, ctrl: &mut TankBody) {
        let speed = ctrl.config.move_speed;
        ctrl.agent.set_speed(speed);
        ctrl.stop_movement();
        if ctrl.pick_patrol_point()
            && let Some(target) = ctrl.patrol_target()
        {
            ctrl.set_agent_destination(target);
        }
    }

    fn execute(&mut self, ctrl: &mut TankBody) -> Transition<TankState> {
        if ctrl.is_target_in_view() {
            return Transition::To(TankState::Distancing);
        }

        let threshold = ctrl.config.patrol_point_reach_threshold;
        if ctrl.patrol_target().is_none() || ctrl.reached_destination(threshold) {
            let next = if ctrl.pick_patrol_point() {
                ctrl.patrol_target()
            } else {
                None
            };
            match next {
                Some(target) => ctrl.set_agent_destination(target),
                None => ctrl.stop_movement(),
            }
        }
        Transition::None
    }

    fn exit(&mut self, ctrl: &mut TankBody) {
        ctrl.stop_movement();
    }
}

#[derive(Debug)]
struct Distancing {
    recalculate: Timer,
}

impl Distancing {
    fn new(interval: f32) -> Self {
        Self {
            recalculate: Timer::finished(interval),
        }
    }
}

impl State<TankState, TankBody> for Distancing {
    fn name(&self) -> &'static str {
        "Distancing"
    }

    fn enter(&mut self, ctrl: &mut TankBody) {
        let speed = ctrl.config.move_speed;
        ctrl.agent.set_speed(speed);
        ctrl.start_shooting();
        self.recalculate.finish();
    }

    fn execute(&mut self, ctrl: &mut TankBody) -> Transition<TankState> {
        if !ctrl.is_target_in_view() {
            return Transition::To(TankState::Searching);
        }

        if let Some(target) = ctrl.target_position() {
            ctrl.turn_toward(target);
        }

        let dt = ctrl.base().delta_seconds();
        if !self.recalculate.tick(dt) {
            return Transition::None;
        }
        self.recalculate.reset();

        let distance = ctrl.base().perception().distance;
        let standoff = ctrl.base().sensors().range - ctrl.config.standoff_buffer;
        if distance < standoff {
            let point = ctrl.retreat_point();
            if point.distance(ctrl.base().position()) > ctrl.agent.stopping_distance() {
                log::debug!("[{}] too close ({distance:.1}), retreating to {point}", ctrl.base().name());
                ctrl.set_agent_destination(point);
            } else {
                ctrl.stop_movement();
            }
        } else {
            ctrl.stop_movement();
        }
        Transition::None
    }

    fn exit(&mut self, ctrl: &mut TankBody) {
        ctrl.stop_movement();
    }
}

#[derive(Debug, Default)]
struct Searching;

impl State<TankState, TankBody> for Searching {
    fn name(&self) -> &'static str {
        "Searching"
    }

    fn enter(&mut self, ctrl: &mut TankBody) {
        ctrl.stop_shooting();
        let speed = ctrl.config.move_speed;
        ctrl.agent.set_speed(speed);
        if let Some(last_known) = ctrl.base().last_known_position() {
            ctrl.set_agent_destination(last_known);
        }
    }

    fn execute(&mut self, ctrl: &mut TankBody) -> Transition<TankState> {
        if ctrl.base().last_known_position().is_none() {
            return Transition::To(TankState::Idle);
        }
        if ctrl.is_target_in_view() {
            return Transition::To(TankState::Distancing);
        }
        if ctrl.reached_destination(ctrl.agent.stopping_distance()) {
            return Transition::To(TankState::Idle);
        }
        Transition::None
    }

    fn exit(&mut self, ctrl: &mut TankBody) {
        ctrl.stop_movement();
    }
}

// ============================================================================
// Controller
// ============================================================================

/// A tank: body plus its state machine
#[derive(Debug)]
pub struct Tank {
    body: TankBody,
    fsm: StateMachine<TankState, TankBody>,
}

impl Tank {
    pub fn new(
        name: impl Into<String>,
        config: &TankConfig,
        position: Vec3,
        mesh: Arc<dyn NavMesh>,
        seed: u64,
    ) -> Self {
        let name = name.into();
        let fsm = StateMachine::new(name.clone())
            .with_state(TankState::Idle, Idle)
            .with_state(TankState::Distancing, Distancing::new(config.recalculate_interval))
            .with_state(TankState::Searching, Searching);

        Self {
            body: TankBody::new(name, config, position, mesh, seed),
            fsm,
        }
    }

    /// Face along `yaw` radians before the first tick
    #[must_use]
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.body.base.set_rotation(glam::Quat::from_rotation_y(yaw));
        self
    }

    pub fn body(&self) -> &TankBody {
        &self.body
    }

    pub fn state(&self) -> Option<TankState> {
        self.fsm.current()
    }

    /// Hits reveal the player: engage if visible, otherwise go looking
    fn react_to_damage(&mut self, outcome: HitOutcome) {
        if !matches!(outcome, HitOutcome::Damaged { .. }) {
            return;
        }
        let next = if self.body.is_target_in_view() {
            TankState::Distancing
        } else {
            TankState::Searching
        };
        if !self.fsm.is_in_state(next) {
            switch_state(&mut self.fsm, &mut self.body, next);
        }
    }
}

impl Controller for Tank {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Tank
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
        initialize_machine(&mut self.fsm, &mut self.body, TankState::Idle)
    }

    fn sense(&mut self, position: Vec3, velocity: Vec3, perception: Perception, time: &Time) {
        self.body.base.sync(position, velocity, perception, time);
        self.body.agent.set_position(position);
        self.body.agent.set_velocity(velocity);
    }

    fn tick(&mut self) -> Result<(), FsmError> {
        if self.body.is_target_in_view() {
            self.body.base.remember_target();
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Grid;

    fn open_mesh() -> Arc<dyn NavMesh> {
        Arc::new(Grid::centered(200, 200, 1.0))
    }

    fn tank() -> Tank {
        let mut tank = Tank::new("tank", &TankConfig::default(), Vec3::ZERO, open_mesh(), 3);
        tank.initialize().unwrap();
        tank
    }

    fn step(time: &mut Time) -> &Time {
        time.advance_secs(1.0 / 60.0);
        time
    }

    fn seen(target: Vec3) -> Perception {
        Perception {
            target: Some(target),
            distance: target.length(),
            in_range: target.length() <= 20.0,
            in_view: true,
        }
    }

    fn unseen(target: Vec3) -> Perception {
        Perception {
            target: Some(target),
            distance: target.length(),
            in_range: false,
            in_view: false,
        }
    }

    #[test]
    fn test_retreat_point_moves_away() {
        let position = Vec3::ZERO;
        let player = Vec3::new(0.0, 0.0, -8.0);
        let point = retreat_point(position, player, 20.0, 4.0, 5.0, |p, _| Some(p));

        // Straight back to full range
        assert!((point - Vec3::new(0.0, 0.0, 12.0)).length() < 0.001);
        assert!(point.distance(player) >= position.distance(player));
    }

    #[test]
    fn test_retreat_point_uses_fallback() {
        let position = Vec3::ZERO;
        let player = Vec3::new(0.0, 0.0, -8.0);
        let point = retreat_point(position, player, 20.0, 4.0, 5.0, |p, _| {
            // Only the fallback distance is navigable
            (p.z < 6.0).then_some(p)
        });

        assert!((point - Vec3::new(0.0, 0.0, 5.0)).length() < 0.001);
    }

    #[test]
    fn test_retreat_point_rejects_samples_toward_player() {
        let position = Vec3::ZERO;
        let player = Vec3::new(0.0, 0.0, -8.0);
        // Every sample snaps in front of the tank
        let point = retreat_point(position, player, 20.0, 4.0, 5.0, |_, _| {
            Some(Vec3::new(0.0, 0.0, -2.0))
        });

        assert_eq!(point, position);
    }

    #[test]
    fn test_retreat_point_holds_when_nothing_navigable() {
        let position = Vec3::new(3.0, 0.0, 3.0);
        let point = retreat_point(position, Vec3::ZERO, 20.0, 4.0, 5.0, |_, _| None);

        assert_eq!(point, position);
    }

    #[test]
    fn test_retreat_point_on_walled_mesh() {
        // Everything behind the tank is blocked
        let mut grid = Grid::centered(60, 60, 1.0);
        grid.block_area(Vec3::new(-30.0, 0.0, 0.5), Vec3::new(30.0, 0.0, 30.0));
        let position = Vec3::new(0.5, 0.0, -0.5);
        let player = Vec3::new(0.5, 0.0, -6.5);

        let point = retreat_point(position, player, 20.0, 4.0, 5.0, |p, r| grid.sample_position(p, r));

        assert_eq!(point, position);
    }

    #[test]
    fn test_tank_idle_patrols() {
        let tank = tank();

        assert_eq!(tank.state(), Some(TankState::Idle));
        let target = tank.body().patrol_target().expect("open mesh always has a patrol point");
        assert!(target.distance(Vec3::ZERO) <= 20.0 * 2.0);
        assert!(tank.body().agent().path_pending());
    }

    #[test]
    fn test_tank_sight_then_search_then_idle() {
        let mut tank = tank();
        let mut time = Time::new();
        let player = Vec3::new(0.0, 0.0, -8.0);

        tank.sense(Vec3::ZERO, Vec3::ZERO, seen(player), step(&mut time));
        tank.tick().unwrap();
        assert_eq!(tank.state(), Some(TankState::Distancing));
        assert_eq!(tank.base().last_known_position(), Some(player));
        assert!(tank.body().is_shooting());

        // First distancing tick recalculates at once: too close, back off
        tank.tick().unwrap();
        assert!(tank.body().agent().path_pending());
        tank.actuate(1.0 / 60.0);
        let destination = tank.body().agent().destination().unwrap();
        assert!(destination.z > 0.0);

        tank.sense(Vec3::ZERO, Vec3::ZERO, unseen(Vec3::new(0.0, 0.0, 40.0)), step(&mut time));
        tank.tick().unwrap();
        assert_eq!(tank.state(), Some(TankState::Searching));
        assert!(!tank.body().is_shooting());

        // Arrive at the last known position
        tank.actuate(1.0 / 60.0);
        tank.sense(player, Vec3::ZERO, unseen(Vec3::new(0.0, 0.0, 40.0)), step(&mut time));
        tank.tick().unwrap();
        assert_eq!(tank.state(), Some(TankState::Idle));
    }

    #[test]
    fn test_tank_holds_position_at_range() {
        let mut tank = tank();
        let mut time = Time::new();
        let player = Vec3::new(0.0, 0.0, -25.0);

        tank.sense(Vec3::ZERO, Vec3::ZERO, seen(player), step(&mut time));
        tank.tick().unwrap();
        tank.tick().unwrap();

        assert_eq!(tank.state(), Some(TankState::Distancing));
        assert!(tank.body().agent().is_stopped());
    }

    #[test]
    fn test_tank_hit_branches_on_visibility() {
        let mut tank = tank();
        let hit = BulletHit {
            origin: Vec3::new(10.0, 0.0, 10.0),
            damage: 10.0,
        };

        tank.bullet_hit(hit);
        assert_eq!(tank.state(), Some(TankState::Searching));
        assert_eq!(tank.base().last_known_position(), Some(hit.origin));

        let mut time = Time::new();
        tank.sense(Vec3::ZERO, Vec3::ZERO, seen(Vec3::new(0.0, 0.0, -5.0)), step(&mut time));
        tank.bullet_hit(hit);
        assert_eq!(tank.state(), Some(TankState::Distancing));

        // Already distancing: no self-transition
        tank.drain_events();
        tank.bullet_hit(hit);
        let changes = tank
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, ControllerEvent::StateChanged { .. }))
            .count();
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_tank_charged_fire_cycle() {
        let mut tank = tank();
        let mut time = Time::new();
        let player = Vec3::new(0.0, 0.0, -25.0);

        tank.sense(Vec3::ZERO, Vec3::ZERO, seen(player), step(&mut time));
        tank.tick().unwrap();
        assert_eq!(tank.state(), Some(TankState::Distancing));

        // Default policy: 1.5s charge, then fire while aimed, then 2s cooldown
        let mut shots = 0;
        for _ in 0..(60 * 4) {
            tank.actuate(1.0 / 60.0);
            shots += tank
                .drain_events()
                .into_iter()
                .filter(|e| matches!(e, ControllerEvent::Shot(_)))
                .count();
        }
        assert_eq!(shots, 1);
    }

    #[test]
    fn test_tank_gives_up_search_across_wall() {
        let mut grid = Grid::centered(40, 40, 1.0);
        grid.block_area(Vec3::new(-20.0, 0.0, 4.0), Vec3::new(20.0, 0.0, 6.0));
        let start = Vec3::new(0.5, 0.0, 0.5);
        let mut tank = Tank::new("tank", &TankConfig::default(), start, Arc::new(grid), 3);
        tank.initialize().unwrap();
        let mut time = Time::new();

        tank.bullet_hit(BulletHit {
            origin: Vec3::new(0.5, 0.0, 15.5),
            damage: 10.0,
        });
        assert_eq!(tank.state(), Some(TankState::Searching));

        let away = unseen(Vec3::new(0.5, 0.0, 15.5));
        tank.sense(start, Vec3::ZERO, away, step(&mut time));
        tank.actuate(1.0 / 60.0);
        let wall_side = Vec3::new(0.5, 0.0, 3.5);
        assert_eq!(tank.body().agent().destination(), Some(wall_side));

        tank.sense(start, Vec3::ZERO, away, step(&mut time));
        tank.tick().unwrap();
        assert_eq!(tank.state(), Some(TankState::Searching));

        tank.sense(wall_side, Vec3::ZERO, away, step(&mut time));
        tank.tick().unwrap();
        assert_eq!(tank.state(), Some(TankState::Idle));
    }

    #[test]
    fn test_tank_searching_without_last_known_goes_idle() {
        let mut tank = tank();
        switch_state(&mut tank.fsm, &mut tank.body, TankState::Searching);
        assert_eq!(tank.state(), Some(TankState::Searching));

        tank.tick().unwrap();
        assert_eq!(tank.state(), Some(TankState::Idle));
    }
}
