//! Entity Component System module
//!
//! Built on top of the hecs ECS library. Enemies, the player and static
//! obstructions all live in one [`World`].

mod components;
mod world;

pub use components::{Name, Player, Transform, Velocity};
pub use world::World;
