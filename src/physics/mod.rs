//! Physics module
//!
//! Built on top of rapier3d. Provides the line-of-sight raycasts the sensors
//! need and integrates enemy bodies from the velocities their controllers ask for.

mod world;

pub use world::{ACTOR_GROUP, OBSTRUCTION_GROUP, Physics, RaycastHit, RigidBodyHandle};
