//! Projectile launchers

use super::{Muzzle, Shot, Weapon};
use crate::core::WeaponConfig;

/// Automatic launcher: fires every `fire_rate` seconds while the trigger is held.
#[derive(Debug, Clone)]
pub struct AutoLauncher {
    speed: f32,
    damage: f32,
    fire_rate: f32,
    trigger: bool,
    /// Seconds until the next automatic shot
    cooldown: f32,
}

impl AutoLauncher {
    pub fn new(config: &WeaponConfig, fire_rate: f32) -> Self {
        Self {
            speed: config.shot_speed,
            damage: config.damage,
            fire_rate,
            trigger: false,
            cooldown: 0.0,
        }
    }

    /// Seconds between automatic shots
    pub fn fire_rate(&self) -> f32 {
        self.fire_rate
    }

    pub fn set_fire_rate(&mut self, fire_rate: f32) {
        self.fire_rate = fire_rate;
    }

    pub fn is_trigger_held(&self) -> bool {
        self.trigger
    }

    fn shot(&self, muzzle: Muzzle) -> Shot {
        Shot {
            origin: muzzle.position,
            direction: muzzle.direction,
            speed: self.speed,
            damage: self.damage,
        }
    }
}

impl Weapon for AutoLauncher {
    fn fire(&mut self, muzzle: Muzzle) -> Option<Shot> {
        self.cooldown = self.fire_rate;
        Some(self.shot(muzzle))
    }

    fn ready_to_fire(&self) -> bool {
        self.cooldown <= 0.0
    }

    fn update(&mut self, dt: f32, muzzle: Muzzle) -> Option<Shot> {
        if self.cooldown > 0.0 {
            self.cooldown -= dt;
        }
        if !self.trigger || self.cooldown > 0.0 {
            return None;
        }
        self.cooldown += self.fire_rate;
        Some(self.shot(muzzle))
    }

    fn set_trigger(&mut self, held: bool) {
        if held && !self.trigger {
            log::trace!("trigger pulled, fire rate {}s", self.fire_rate);
        }
        self.trigger = held;
    }

    fn set_launch_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    fn launch_speed(&self) -> f32 {
        self.speed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Charge {
    Idle,
    Charging { remaining: f32 },
    Charged,
}

/// Charge-then-fire launcher.
///
/// `charge_up` starts a charge of `charge_time` seconds; once charged the next
/// `fire` releases a shot. Firing before the charge completes cancels it.
#[derive(Debug, Clone)]
pub struct ChargedLauncher {
    speed: f32,
    damage: f32,
    charge_time: f32,
    charge: Charge,
}

impl ChargedLauncher {
    pub fn new(config: &WeaponConfig) -> Self {
        Self {
            speed: config.shot_speed,
            damage: config.damage,
            charge_time: config.charge_time,
            charge: Charge::Idle,
        }
    }

    /// Whether a charge is in progress
    pub fn is_charging(&self) -> bool {
        matches!(self.charge, Charge::Charging { .. })
    }
}

impl Weapon for ChargedLauncher {
    fn charge_up(&mut self) {
        if self.charge == Charge::Idle {
            self.charge = Charge::Charging {
                remaining: self.charge_time,
            };
        }
    }

    fn fire(&mut self, muzzle: Muzzle) -> Option<Shot> {
        match self.charge {
            Charge::Charged => {
                self.charge = Charge::Idle;
                Some(Shot {
                    origin: muzzle.position,
                    direction: muzzle.direction,
                    speed: self.speed,
                    damage: self.damage,
                })
            }
            Charge::Charging { .. } => {
                log::trace!("charge cancelled by early fire");
                self.charge = Charge::Idle;
                None
            }
            Charge::Idle => None,
        }
    }

    fn cancel(&mut self) {
        self.charge = Charge::Idle;
    }

    fn ready_to_fire(&self) -> bool {
        self.charge == Charge::Charged
    }

    fn update(&mut self, dt: f32, _muzzle: Muzzle) -> Option<Shot> {
        if let Charge::Charging { remaining } = &mut self.charge {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.charge = Charge::Charged;
            }
        }
        None
    }

    fn set_launch_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    fn launch_speed(&self) -> f32 {
        self.speed
    }
}
