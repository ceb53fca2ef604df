//! Fixed-step simulation driver
//!
//! Owns the world, the physics and navigation services, and every enemy
//! controller. Each [`Simulation::tick`] runs one pass of the pipeline:
//!
//! 1. **sense**: build each enemy's perception of the player
//! 2. **decide**: run each controller's state machine once
//! 3. **actuate**: turn decisions into velocities and shots
//! 4. **integrate**: step physics and write poses back to the world
//! 5. **cleanup**: publish controller events, despawn the dead

use std::sync::Arc;

use glam::Vec3;
use hecs::Entity;
use thiserror::Error;

use super::config::{ConfigError, SimConfig};
use super::events::{AiEvent, EventQueue};
use super::time::Time;
use crate::ai::{
    BulletHit, Controller, ControllerEvent, FsmError, Grunt, HitOutcome, Tank, Turret, perceive,
};
use crate::ecs::{Name, Player, Transform, Velocity, World};
use crate::navigation::NavMesh;
use crate::physics::{Physics, RigidBodyHandle};

/// Collision radius of enemy bodies
const ACTOR_RADIUS: f32 = 0.5;

/// Errors from driving the simulation
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("controller failed to start: {0}")]
    Fsm(#[from] FsmError),

    #[error("no such entity: {0:?}")]
    NoSuchEntity(Entity),

    #[error("entity {0:?} is not an enemy")]
    NotAnEnemy(Entity),

    #[error("no player in the world")]
    NoPlayer,
}

/// Component tying an entity to its controller and physics body
#[derive(Debug)]
pub struct Enemy {
    pub controller: Box<dyn Controller>,
    pub body: RigidBodyHandle,
}

/// The simulation: world, services, enemies and the event stream.
pub struct Simulation {
    config: SimConfig,
    world: World,
    physics: Physics,
    mesh: Arc<dyn NavMesh>,
    time: Time,
    events: EventQueue,
    player: Option<Entity>,
    spawned: u64,
}

impl Simulation {
    /// Create an empty simulation over `mesh`.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn new(config: SimConfig, mesh: Arc<dyn NavMesh>) -> Result<Self, SimError> {
        config.validate()?;
        log::info!(
            "simulation: dt={}s seed={:#x}",
            config.fixed_dt,
            config.seed
        );

        Ok(Self {
            config,
            world: World::new(),
            physics: Physics::new(),
            mesh,
            time: Time::new(),
            events: EventQueue::new(),
            player: None,
            spawned: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    /// Events published by the last finished tick
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    /// Add a static box that blocks enemy vision
    pub fn add_obstruction(&mut self, center: Vec3, half_extents: Vec3) {
        self.physics.add_obstruction(center, half_extents);
    }

    /// Spawn the player, replacing any previous one
    pub fn spawn_player(&mut self, position: Vec3) -> Entity {
        if let Some(old) = self.player.take() {
            let _ = self.world.despawn(old);
        }
        let entity = self.world.spawn((
            Name::new("player"),
            Transform::from_position(position),
            Player,
        ));
        self.player = Some(entity);
        entity
    }

    /// Move the player.
    ///
    /// # Errors
    ///
    /// Fails if no player was spawned.
    pub fn set_player_position(&mut self, position: Vec3) -> Result<(), SimError> {
        let player = self.player.ok_or(SimError::NoPlayer)?;
        let mut transform = self
            .world
            .get_mut::<Transform>(player)
            .map_err(|_| SimError::NoPlayer)?;
        transform.position = position;
        Ok(())
    }

    pub fn player_position(&self) -> Option<Vec3> {
        let player = self.player?;
        self.world
            .get::<Transform>(player)
            .ok()
            .map(|transform| transform.position)
    }

    /// Remove the player; enemies lose their target
    pub fn despawn_player(&mut self) {
        if let Some(player) = self.player.take() {
            let _ = self.world.despawn(player);
        }
    }

    /// Spawn a grunt facing along `yaw` radians.
    ///
    /// # Errors
    ///
    /// Fails if its state machine cannot start.
    pub fn spawn_grunt(&mut self, position: Vec3, yaw: f32) -> Result<Entity, SimError> {
        let (name, seed) = self.next_identity("grunt");
        let grunt = Grunt::new(
            name.clone(),
            &self.config.grunt,
            position,
            Arc::clone(&self.mesh),
            seed,
        )
        .with_yaw(yaw);
        self.spawn_enemy(Box::new(grunt), name, position, yaw)
    }

    /// Spawn a tank facing along `yaw` radians.
    ///
    /// # Errors
    ///
    /// Fails if its state machine cannot start.
    pub fn spawn_tank(&mut self, position: Vec3, yaw: f32) -> Result<Entity, SimError> {
        let (name, seed) = self.next_identity("tank");
        let tank = Tank::new(
            name.clone(),
            &self.config.tank,
            position,
            Arc::clone(&self.mesh),
            seed,
        )
        .with_yaw(yaw);
        self.spawn_enemy(Box::new(tank), name, position, yaw)
    }

    /// Spawn a turret facing along `yaw` radians.
    ///
    /// # Errors
    ///
    /// Fails if its state machine cannot start.
    pub fn spawn_turret(&mut self, position: Vec3, yaw: f32) -> Result<Entity, SimError> {
        let (name, seed) = self.next_identity("turret");
        let turret = Turret::new(name.clone(), &self.config.turret, position, seed).with_yaw(yaw);
        self.spawn_enemy(Box::new(turret), name, position, yaw)
    }

    /// Spawn any controller. It is initialized here; its first state's
    /// events are published with the next tick.
    ///
    /// # Errors
    ///
    /// Fails if the controller's state machine cannot start.
    pub fn spawn_enemy(
        &mut self,
        mut controller: Box<dyn Controller>,
        name: String,
        position: Vec3,
        yaw: f32,
    ) -> Result<Entity, SimError> {
        controller.initialize()?;

        let body = self.physics.create_actor_body(position, ACTOR_RADIUS);
        let entity = self.world.spawn((
            Name::new(name),
            Transform::from_position_yaw(position, yaw),
            Velocity::default(),
            Enemy { controller, body },
        ));
        log::debug!("spawned {entity:?} at {position}");
        Ok(entity)
    }

    fn next_identity(&mut self, kind: &str) -> (String, u64) {
        self.spawned += 1;
        (
            format!("{kind}-{}", self.spawned),
            self.config.seed ^ self.spawned,
        )
    }

    /// Active state name of an enemy
    pub fn state_name(&self, entity: Entity) -> Option<&'static str> {
        let enemy = self.world.get::<Enemy>(entity).ok()?;
        enemy.controller.state_name()
    }

    /// Run `f` against an enemy's controller.
    ///
    /// # Errors
    ///
    /// Fails if the entity is gone or is not an enemy.
    pub fn with_controller<R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut dyn Controller) -> R,
    ) -> Result<R, SimError> {
        let mut enemy = self
            .world
            .get_mut::<Enemy>(entity)
            .map_err(|err| match err {
                hecs::ComponentError::NoSuchEntity => SimError::NoSuchEntity(entity),
                _ => SimError::NotAnEnemy(entity),
            })?;
        Ok(f(enemy.controller.as_mut()))
    }

    /// Report a projectile impact on an enemy.
    ///
    /// # Errors
    ///
    /// Fails if the entity is gone or is not an enemy.
    pub fn bullet_hit(&mut self, entity: Entity, hit: BulletHit) -> Result<HitOutcome, SimError> {
        self.with_controller(entity, |controller| controller.bullet_hit(hit))
    }

    /// Damage every enemy within `radius` of `center`, falling off linearly
    /// from `max_damage` at the centre to zero at the edge.
    pub fn explode(&mut self, center: Vec3, radius: f32, max_damage: f32) -> Vec<(Entity, HitOutcome)> {
        let mut outcomes = Vec::new();
        for (entity, (enemy, transform)) in self.world.query_mut::<(&mut Enemy, &Transform)>() {
            let distance = transform.position.distance(center);
            if distance > radius {
                continue;
            }
            let falloff = if radius > 0.0 {
                (distance / radius).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let damage = max_damage * (1.0 - falloff);
            outcomes.push((entity, enemy.controller.take_damage(damage)));
        }
        log::debug!(
            "explosion at {center} r={radius} hit {} enemies",
            outcomes.len()
        );
        outcomes
    }

    /// Number of live enemies
    pub fn enemy_count(&self) -> usize {
        self.world.query::<&Enemy>().iter().count()
    }

    /// Advance one fixed step.
    pub fn tick(&mut self) {
        let dt = self.config.fixed_dt;
        self.time.advance_secs(dt);
        let player = self.player_position();

        // Sense, decide, actuate
        for (_, (enemy, transform, velocity)) in self
            .world
            .query_mut::<(&mut Enemy, &mut Transform, &Velocity)>()
        {
            let controller = enemy.controller.as_mut();
            if !controller.is_alive() || !controller.is_enabled() {
                self.physics.set_linear_velocity(enemy.body, Vec3::ZERO);
                continue;
            }

            let perception = perceive(
                controller.base().sensors(),
                controller.view_facing(),
                transform.position,
                player,
                &self.physics,
            );
            controller.sense(transform.position, velocity.linear, perception, &self.time);

            if let Err(err) = controller.tick() {
                controller.base_mut().disable(err.to_string());
            }

            let linear = controller.actuate(dt);
            self.physics.set_linear_velocity(enemy.body, linear);
            transform.rotation = controller.base().rotation();
        }

        // Integrate
        self.physics.step(dt);
        for (_, (enemy, transform, velocity)) in self
            .world
            .query_mut::<(&Enemy, &mut Transform, &mut Velocity)>()
        {
            if let Some(position) = self.physics.get_position(enemy.body) {
                transform.position = position;
            }
            if let Some(linear) = self.physics.get_linear_velocity(enemy.body) {
                velocity.linear = linear;
            }
        }

        self.cleanup();
        self.events.swap();
    }

    /// Publish controller events and remove dead enemies
    fn cleanup(&mut self) {
        let mut dead = Vec::new();
        for (entity, enemy) in self.world.query_mut::<&mut Enemy>() {
            for event in enemy.controller.drain_events() {
                self.events.push(publish(entity, event));
            }
            if !enemy.controller.is_alive() {
                enemy.controller.teardown();
                dead.push((entity, enemy.body));
            }
        }

        for (entity, body) in dead {
            self.physics.remove_body(body);
            if self.world.despawn(entity).is_ok() {
                log::debug!("despawned {entity:?}");
            }
        }
    }
}

fn publish(entity: Entity, event: ControllerEvent) -> AiEvent {
    match event {
        ControllerEvent::StateChanged { from, to } => AiEvent::StateChanged { entity, from, to },
        ControllerEvent::Damaged {
            amount,
            origin,
            health,
        } => AiEvent::Damaged {
            entity,
            amount,
            origin,
            health,
        },
        ControllerEvent::Died { position } => AiEvent::Died { entity, position },
        ControllerEvent::Shot(shot) => AiEvent::ShotFired { entity, shot },
        ControllerEvent::Disabled { reason } => AiEvent::ControllerDisabled { entity, reason },
    }
}
