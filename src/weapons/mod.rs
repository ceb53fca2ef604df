//! Weapon collaborators
//!
//! Controllers never spawn projectiles themselves. They drive a [`Weapon`]
//! (trigger, charge, fire) and publish whatever [`Shot`]s come out of it.

mod launcher;

pub use launcher::{AutoLauncher, ChargedLauncher};

use std::fmt;

use glam::Vec3;

/// Where and in which direction a weapon's barrel points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Muzzle {
    /// Barrel tip in world space
    pub position: Vec3,
    /// Unit launch direction
    pub direction: Vec3,
}

impl Muzzle {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
        }
    }
}

/// Launch parameters of a fired projectile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    /// Spawn position (also the origin reported when the shot hits)
    pub origin: Vec3,
    /// Unit launch direction
    pub direction: Vec3,
    /// Launch speed
    pub speed: f32,
    /// Damage dealt on hit
    pub damage: f32,
}

impl Shot {
    /// Initial velocity of the projectile
    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        self.direction * self.speed
    }
}

/// A gun an enemy can operate.
pub trait Weapon: fmt::Debug + Send + Sync {
    /// Begin charging. Weapons without a charge cycle ignore this.
    fn charge_up(&mut self) {}

    /// Try to fire once. Returns the shot if one left the barrel.
    fn fire(&mut self, muzzle: Muzzle) -> Option<Shot>;

    /// Drop any charge in progress without firing
    fn cancel(&mut self) {}

    /// Whether the next `fire` will produce a shot
    fn ready_to_fire(&self) -> bool;

    /// Advance internal timers. Automatic weapons fire from here.
    fn update(&mut self, dt: f32, muzzle: Muzzle) -> Option<Shot>;

    /// Hold or release the trigger of an automatic weapon
    fn set_trigger(&mut self, _held: bool) {}

    /// Override the projectile launch speed (ballistic solutions)
    fn set_launch_speed(&mut self, speed: f32);

    /// Current projectile launch speed
    fn launch_speed(&self) -> f32;
}
