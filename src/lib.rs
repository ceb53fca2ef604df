//! Enemy AI for a third-person shooter arena
//!
//! This crate provides:
//! - A generic finite state machine for enemy behaviour
//! - Grunt, Tank and Turret controllers built on it
//! - Fixed-step simulation over an hecs world
//! - Line-of-sight and kinematic bodies with rapier3d
//! - Grid navigation mesh with A* pathfinding

pub mod ai;
pub mod core;
pub mod ecs;
pub mod navigation;
pub mod physics;
pub mod weapons;

// Re-exports for convenience
pub use glam;
pub use hecs;
pub use rapier3d;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{
        BulletHit, Controller, ControllerEvent, ControllerKind, Grunt, GruntState, HitOutcome,
        Tank, TankState, Turret, TurretState,
    };
    pub use crate::core::{AiEvent, SimConfig, SimError, Simulation, Time};
    pub use crate::ecs::{Name, Player, Transform, Velocity, World};
    pub use crate::navigation::{Grid, NavAgent, NavMesh};
    pub use crate::physics::{Physics, RigidBodyHandle};
    pub use crate::weapons::{Shot, Weapon};
    pub use glam::{Quat, Vec3};
}
