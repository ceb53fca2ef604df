//! Per-controller navigation agent
//!
//! The agent owns its path; the mesh it queries is shared. Paths requested
//! with [`NavAgent::set_destination`] stay pending until the simulation's
//! actuate phase calls [`NavAgent::update_path`], the way a navigation
//! service computes paths between frames.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use super::NavMesh;
use crate::ai::arrive_speed;

/// Distance at which an intermediate waypoint counts as passed
const WAYPOINT_TOLERANCE: f32 = 0.6;

/// Radius used to snap an off-mesh destination onto the mesh
const DESTINATION_SNAP_RADIUS: f32 = 2.0;

/// Distance over which the agent slows down before its destination
const SLOW_RADIUS: f32 = 1.0;

/// Steers one body along paths on a shared [`NavMesh`].
pub struct NavAgent {
    mesh: Arc<dyn NavMesh>,
    position: Vec3,
    /// Destination as requested by the owner
    requested: Option<Vec3>,
    /// Destination actually pathed to (after snapping onto the mesh)
    destination: Option<Vec3>,
    /// Remaining waypoints, the last one being the destination
    path: Vec<Vec3>,
    path_pending: bool,
    /// The last path was followed to its end
    arrived: bool,
    stopped: bool,
    speed: f32,
    stopping_distance: f32,
    velocity: Vec3,
}

impl NavAgent {
    /// Create an agent on `mesh`
    pub fn new(mesh: Arc<dyn NavMesh>, speed: f32, stopping_distance: f32) -> Self {
        Self {
            mesh,
            position: Vec3::ZERO,
            requested: None,
            destination: None,
            path: Vec::new(),
            path_pending: false,
            arrived: false,
            stopped: false,
            speed,
            stopping_distance,
            velocity: Vec3::ZERO,
        }
    }

    /// Sync the agent with its body's position, consuming passed waypoints
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;

        while self.path.len() > 1 {
            let next = self.path[0];
            let after = self.path[1];
            let offset = flat(position - next);
            let passed = offset.dot(flat(after - next)) > 0.0;
            if offset.length() < WAYPOINT_TOLERANCE || passed {
                self.path.remove(0);
            } else {
                break;
            }
        }

        if self.path.len() == 1 && flat(self.path[0] - position).length() <= self.stopping_distance
        {
            self.path.clear();
            self.arrived = true;
        }
    }

    /// Current position as last synced
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Request a path to `target`. The path is computed on the next
    /// [`NavAgent::update_path`]. Repeating the current request while it is
    /// pending, being followed, or already arrived at does nothing, so an
    /// unreachable target is only searched for once.
    pub fn set_destination(&mut self, target: Vec3) {
        let settled = self.path_pending || !self.path.is_empty() || self.at_destination();
        if self.requested == Some(target) && settled {
            return;
        }
        self.requested = Some(target);
        self.destination = None;
        self.arrived = false;
        self.path_pending = true;
    }

    /// Destination of the current path
    pub fn destination(&self) -> Option<Vec3> {
        self.destination.or(self.requested)
    }

    /// Arrived at the resolved destination and still close to it
    fn at_destination(&self) -> bool {
        self.arrived
            && self.destination.is_some_and(|destination| {
                flat(destination - self.position).length() <= self.stopping_distance + SLOW_RADIUS
            })
    }

    /// Compute a pending path request
    pub fn update_path(&mut self) {
        if !self.path_pending {
            return;
        }
        self.path_pending = false;

        let Some(target) = self.requested else {
            return;
        };

        let start = self
            .mesh
            .sample_position(self.position, DESTINATION_SNAP_RADIUS)
            .unwrap_or(self.position);

        let resolved = match self.mesh.find_path(start, target) {
            Some(path) => Some((target, path)),
            None => self
                .mesh
                .sample_position(target, DESTINATION_SNAP_RADIUS)
                .and_then(|snapped| self.mesh.find_path(start, snapped).map(|p| (snapped, p))),
        };

        // Unreachable: get as close as the mesh allows
        let resolved = resolved.or_else(|| {
            let path = self.mesh.find_partial_path(start, target)?;
            let end = *path.last()?;
            log::debug!("{target} unreachable from {start}, stopping at {end}");
            Some((end, path))
        });

        match resolved {
            Some((destination, path)) => {
                self.destination = Some(destination);
                self.path = path;
                self.arrived = false;
            }
            None => {
                log::warn!("no path from {start} to {target}, holding position");
                self.destination = Some(self.position);
                self.path.clear();
                self.arrived = true;
            }
        }
    }

    /// Drop the current path and destination
    pub fn reset_path(&mut self) {
        self.requested = None;
        self.destination = None;
        self.path.clear();
        self.path_pending = false;
        self.arrived = false;
    }

    /// Halt movement along the path
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Resume movement along the path
    pub fn resume(&mut self) {
        self.stopped = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether a path request is waiting to be computed
    pub fn path_pending(&self) -> bool {
        self.path_pending
    }

    /// Whether the agent has waypoints left to follow
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    /// Distance left along the path. Infinite while a path is pending and
    /// zero once the path has been followed to its end.
    pub fn remaining_distance(&self) -> f32 {
        if self.path_pending {
            return f32::INFINITY;
        }
        if self.arrived {
            return 0.0;
        }

        if self.path.is_empty() {
            return self
                .destination
                .map_or(0.0, |destination| flat(destination - self.position).length());
        }

        let mut length = 0.0;
        let mut previous = self.position;
        for &waypoint in &self.path {
            length += flat(waypoint - previous).length();
            previous = waypoint;
        }
        length
    }

    /// Velocity that follows the path at `speed`, slowing on arrival
    pub fn desired_velocity(&self) -> Vec3 {
        if self.stopped || self.path_pending {
            return Vec3::ZERO;
        }
        let Some(&next) = self.path.first() else {
            return Vec3::ZERO;
        };

        let direction = flat(next - self.position).normalize_or_zero();
        let speed = arrive_speed(
            self.remaining_distance(),
            self.speed,
            SLOW_RADIUS + self.stopping_distance,
            self.stopping_distance,
        );
        direction * speed
    }

    /// Velocity the body actually moved with
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Record the velocity the body actually moved with
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn stopping_distance(&self) -> f32 {
        self.stopping_distance
    }

    /// Nearest walkable point within `max_distance` of `point`
    pub fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        self.mesh.sample_position(point, max_distance)
    }

    /// Whether the agent stands on the walkable surface
    pub fn is_on_mesh(&self) -> bool {
        self.mesh.contains(self.position)
    }
}

impl fmt::Debug for NavAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavAgent")
            .field("position", &self.position)
            .field("destination", &self.destination())
            .field("waypoints", &self.path.len())
            .field("path_pending", &self.path_pending)
            .field("arrived", &self.arrived)
            .field("stopped", &self.stopped)
            .finish()
    }
}

fn flat(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Grid;

    fn open_agent() -> NavAgent {
        let grid = Grid::centered(40, 40, 1.0);
        NavAgent::new(Arc::new(grid), 4.0, 0.5)
    }

    #[test]
    fn test_destination_is_pending_until_update() {
        let mut agent = open_agent();
        agent.set_position(Vec3::new(0.5, 0.0, 0.5));
        agent.set_destination(Vec3::new(0.5, 0.0, -9.5));

        assert!(agent.path_pending());
        assert_eq!(agent.remaining_distance(), f32::INFINITY);
        assert_eq!(agent.desired_velocity(), Vec3::ZERO);

        agent.update_path();

        assert!(!agent.path_pending());
        assert!(agent.has_path());
        assert!((agent.remaining_distance() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_desired_velocity_points_along_path() {
        let mut agent = open_agent();
        agent.set_position(Vec3::new(0.5, 0.0, 0.5));
        agent.set_destination(Vec3::new(0.5, 0.0, -9.5));
        agent.update_path();

        let velocity = agent.desired_velocity();
        assert!((velocity - Vec3::new(0.0, 0.0, -4.0)).length() < 0.01);

        agent.stop();
        assert_eq!(agent.desired_velocity(), Vec3::ZERO);
        agent.resume();
        assert!(agent.desired_velocity().length() > 0.0);
    }

    #[test]
    fn test_arrival_clears_path() {
        let mut agent = open_agent();
        agent.set_position(Vec3::new(0.5, 0.0, 0.5));
        agent.set_destination(Vec3::new(0.5, 0.0, -2.5));
        agent.update_path();

        agent.set_position(Vec3::new(0.5, 0.0, -2.2));

        assert!(!agent.has_path());
        assert!(agent.remaining_distance() <= agent.stopping_distance());

        // Coasting past the end still counts as arrived
        agent.set_position(Vec3::new(0.5, 0.0, -3.5));
        assert_eq!(agent.remaining_distance(), 0.0);
    }

    #[test]
    fn test_unreachable_destination_snaps_to_mesh() {
        let mut grid = Grid::centered(20, 20, 1.0);
        grid.block_area(Vec3::new(4.0, 0.0, 4.0), Vec3::new(6.0, 0.0, 6.0));
        let mut agent = NavAgent::new(Arc::new(grid), 4.0, 0.5);

        agent.set_position(Vec3::new(0.5, 0.0, 0.5));
        agent.set_destination(Vec3::new(5.0, 0.0, 5.0));
        agent.update_path();

        assert!(agent.has_path());
        let destination = agent.destination().unwrap();
        assert!(destination.distance(Vec3::new(5.0, 0.0, 5.0)) <= DESTINATION_SNAP_RADIUS);
    }

    #[test]
    fn test_unreachable_destination_gets_partial_path() {
        let mut grid = Grid::centered(40, 40, 1.0);
        grid.block_area(Vec3::new(-20.0, 0.0, 4.0), Vec3::new(20.0, 0.0, 6.0));
        let mut agent = NavAgent::new(Arc::new(grid), 4.0, 0.5);

        agent.set_position(Vec3::new(0.5, 0.0, 0.5));
        agent.set_destination(Vec3::new(0.5, 0.0, 15.5));
        agent.update_path();

        // Stops at the last row before the wall
        assert!(agent.has_path());
        assert_eq!(agent.destination(), Some(Vec3::new(0.5, 0.0, 3.5)));
        assert!((agent.remaining_distance() - 3.0).abs() < 0.01);

        agent.set_position(Vec3::new(0.5, 0.0, 3.5));
        assert!(!agent.has_path());
        assert_eq!(agent.remaining_distance(), 0.0);
    }

    #[test]
    fn test_resolved_request_is_not_repeated() {
        let mut grid = Grid::centered(40, 40, 1.0);
        grid.block_area(Vec3::new(-20.0, 0.0, 4.0), Vec3::new(20.0, 0.0, 6.0));
        let mut agent = NavAgent::new(Arc::new(grid), 4.0, 0.5);
        let target = Vec3::new(0.5, 0.0, 15.5);

        agent.set_position(Vec3::new(0.5, 0.0, 0.5));
        agent.set_destination(target);
        agent.update_path();
        agent.set_position(Vec3::new(0.5, 0.0, 3.5));

        agent.set_destination(target);
        assert!(!agent.path_pending());

        // A new target is pathed again
        agent.set_destination(Vec3::new(0.5, 0.0, -5.5));
        assert!(agent.path_pending());
    }

    #[test]
    fn test_off_mesh_destination_stops_at_edge() {
        let mut agent = open_agent();
        agent.set_position(Vec3::new(0.5, 0.0, 0.5));
        agent.set_destination(Vec3::new(500.0, 0.0, 0.5));
        agent.update_path();

        assert!(agent.has_path());
        assert_eq!(agent.destination(), Some(Vec3::new(19.5, 0.0, 0.5)));

        agent.reset_path();
        assert_eq!(agent.remaining_distance(), 0.0);
    }

    #[test]
    fn test_off_mesh_agent_holds_position() {
        let mut agent = open_agent();
        agent.set_position(Vec3::new(100.0, 0.0, 0.0));
        agent.set_destination(Vec3::new(0.5, 0.0, 0.5));
        agent.update_path();

        assert!(!agent.has_path());
        assert_eq!(agent.remaining_distance(), 0.0);
        assert_eq!(agent.desired_velocity(), Vec3::ZERO);
    }
}
