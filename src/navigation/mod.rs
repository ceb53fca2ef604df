//! Navigation service
//!
//! Controllers move through the level via a [`NavAgent`], which asks a shared
//! [`NavMesh`] for paths and nearest-walkable samples.

mod agent;
mod grid;

pub use agent::NavAgent;
pub use grid::{Grid, PathResult, find_partial_path, find_path};

use glam::Vec3;

/// A walkable surface that can answer path and sampling queries.
pub trait NavMesh: Send + Sync {
    /// Nearest walkable point within `max_distance` of `point`.
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3>;

    /// Waypoints from `from` to `to`, ending at `to`. `None` when unreachable.
    fn find_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>>;

    /// Waypoints toward `to`, ending at the closest reachable point when `to`
    /// can't be reached. `None` only when `from` is off the surface.
    fn find_partial_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>>;

    /// Whether `point` lies on the walkable surface.
    fn contains(&self, point: Vec3) -> bool;
}
