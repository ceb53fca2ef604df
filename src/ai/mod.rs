//! Enemy AI
//!
//! A generic finite state machine, the controller contract every enemy
//! implements, sensing and steering helpers, and the three enemy types.

mod controller;
mod fsm;
mod grunt;
mod sensing;
mod steering;
mod tank;
mod turret;

pub use controller::{
    AiController, BulletHit, Controller, ControllerBase, ControllerEvent, ControllerKind,
    HitOutcome,
};
pub use fsm::{ChangeOutcome, FsmError, State, StateMachine, Transition};
pub use grunt::{Grunt, GruntBody, GruntState};
pub use sensing::{
    ClearSight, EYE_HEIGHT, LineOfSight, Perception, in_field_of_view, in_range, in_view,
    perceive,
};
pub use steering::{
    angle_to, apply_drag, arrive_speed, flatten, flee_direction, look_rotation, move_towards,
    rotate_towards, turn_toward,
};
pub use tank::{Tank, TankBody, TankState, retreat_point};
pub use turret::{Turret, TurretBody, TurretState, ballistic_launch_speed};
