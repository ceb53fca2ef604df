//! Core simulation module
//!
//! Contains the simulation loop, its clock, timers, events and configuration

mod config;
mod events;
mod simulation;
mod time;
mod timer;

pub use config::{
    ConfigError, ControllerConfig, GruntConfig, SensorConfig, SimConfig, TankConfig,
    TankFirePolicy, TurretConfig, WeaponConfig,
};
pub use events::{AiEvent, EventQueue};
pub use simulation::{Enemy, SimError, Simulation};
pub use time::Time;
pub use timer::{Cooldown, Timer};
