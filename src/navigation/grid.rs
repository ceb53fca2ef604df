//! A* pathfinding on a 2D grid
//!
//! Grid-based navigation mesh on the XZ plane. Cells are either walkable or
//! blocked; paths run through cell centres with 4-directional moves.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::NavMesh;

/// A walkable grid laid over the XZ plane
#[derive(Debug, Clone)]
pub struct Grid {
    /// Width in cells (along X)
    pub width: usize,
    /// Depth in cells (along Z)
    pub depth: usize,
    /// Cell size in world units
    pub cell_size: f32,
    /// Walkable cells (true = walkable)
    cells: Vec<bool>,
    /// World position of the grid's minimum corner (X, Z)
    pub origin: Vec2,
    /// Height of the walkable surface
    pub height: f32,
}

impl Grid {
    /// Create a new grid (all cells walkable by default)
    #[must_use]
    pub fn new(width: usize, depth: usize, cell_size: f32) -> Self {
        Self {
            width,
            depth,
            cell_size,
            cells: vec![true; width * depth],
            origin: Vec2::ZERO,
            height: 0.0,
        }
    }

    /// Create a grid centred on the world origin
    #[must_use]
    pub fn centered(width: usize, depth: usize, cell_size: f32) -> Self {
        let mut grid = Self::new(width, depth, cell_size);
        grid.origin = Vec2::new(
            -(width as f32) * cell_size * 0.5,
            -(depth as f32) * cell_size * 0.5,
        );
        grid
    }

    /// Set a cell's walkability
    pub fn set_walkable(&mut self, x: usize, z: usize, walkable: bool) {
        if x < self.width && z < self.depth {
            self.cells[z * self.width + x] = walkable;
        }
    }

    /// Block every cell whose centre lies inside the given world-space box
    pub fn block_area(&mut self, min: Vec3, max: Vec3) {
        for z in 0..self.depth {
            for x in 0..self.width {
                let center = self.grid_to_world(x, z);
                if center.x >= min.x && center.x <= max.x && center.y >= min.z && center.y <= max.z
                {
                    self.set_walkable(x, z, false);
                }
            }
        }
    }

    /// Check if a cell is walkable
    #[must_use]
    pub fn is_walkable(&self, x: usize, z: usize) -> bool {
        if x >= self.width || z >= self.depth {
            return false;
        }
        self.cells[z * self.width + x]
    }

    /// Convert world position to grid coordinates
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec3) -> (i32, i32) {
        let local = Vec2::new(pos.x, pos.z) - self.origin;
        (
            (local.x / self.cell_size).floor() as i32,
            (local.y / self.cell_size).floor() as i32,
        )
    }

    /// Convert grid coordinates to world position (center of cell, as X/Z)
    #[must_use]
    pub fn grid_to_world(&self, x: usize, z: usize) -> Vec2 {
        self.origin
            + Vec2::new(
                (x as f32 + 0.5) * self.cell_size,
                (z as f32 + 0.5) * self.cell_size,
            )
    }

    /// Walkable cell containing `pos`, if any
    fn walkable_cell(&self, pos: Vec3) -> Option<(usize, usize)> {
        let (x, z) = self.world_to_grid(pos);
        if x < 0 || z < 0 {
            return None;
        }
        let (x, z) = (x as usize, z as usize);
        self.is_walkable(x, z).then_some((x, z))
    }

    /// Get neighbors of a cell (4-directional)
    fn neighbors(&self, x: usize, z: usize) -> SmallVec<[(usize, usize); 4]> {
        let mut result = SmallVec::new();

        if x > 0 && self.is_walkable(x - 1, z) {
            result.push((x - 1, z));
        }
        if x + 1 < self.width && self.is_walkable(x + 1, z) {
            result.push((x + 1, z));
        }
        if z > 0 && self.is_walkable(x, z - 1) {
            result.push((x, z - 1));
        }
        if z + 1 < self.depth && self.is_walkable(x, z + 1) {
            result.push((x, z + 1));
        }

        result
    }

    fn cell_center(&self, x: usize, z: usize) -> Vec3 {
        let c = self.grid_to_world(x, z);
        Vec3::new(c.x, self.height, c.y)
    }
}

impl NavMesh for Grid {
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        if self.walkable_cell(point).is_some() {
            let on_surface = Vec3::new(point.x, self.height, point.z);
            return (point.distance(on_surface) <= max_distance).then_some(on_surface);
        }

        // Search the cells overlapping the sample sphere for the nearest walkable centre
        let reach = (max_distance / self.cell_size).ceil() as i32 + 1;
        let (cx, cz) = self.world_to_grid(point);
        let mut best: Option<(f32, Vec3)> = None;

        for z in (cz - reach)..=(cz + reach) {
            for x in (cx - reach)..=(cx + reach) {
                if x < 0 || z < 0 || !self.is_walkable(x as usize, z as usize) {
                    continue;
                }
                let center = self.cell_center(x as usize, z as usize);
                let distance = point.distance(center);
                if distance <= max_distance && best.is_none_or(|(d, _)| distance < d) {
                    best = Some((distance, center));
                }
            }
        }

        best.map(|(_, center)| center)
    }

    fn find_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
        let path = find_path(self, from, to);
        (!path.is_empty()).then_some(path.waypoints)
    }

    fn find_partial_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
        let path = find_partial_path(self, from, to);
        (!path.is_empty()).then_some(path.waypoints)
    }

    fn contains(&self, point: Vec3) -> bool {
        self.walkable_cell(point).is_some()
    }
}

/// Result of pathfinding
#[derive(Debug, Clone, Default)]
pub struct PathResult {
    /// Waypoints in world coordinates, ending at the goal
    pub waypoints: Vec<Vec3>,
    /// Total path length
    pub length: f32,
    /// The goal was unreachable and the path stops short of it
    pub partial: bool,
}

impl PathResult {
    /// Check if path was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// A* node for priority queue
#[derive(Debug, Clone)]
struct Node {
    x: usize,
    z: usize,
    f_cost: f32, // g_cost + heuristic
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.z == other.z
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a path using A*.
///
/// The first waypoint is the cell after the start cell; the last waypoint is
/// the goal itself, projected onto the grid surface.
#[must_use]
pub fn find_path(grid: &Grid, start: Vec3, goal: Vec3) -> PathResult {
    search(grid, start, goal, false)
}

/// Find a path toward `goal`, stopping at the closest reachable cell when
/// the goal itself can't be reached.
///
/// Partial results end at that cell's centre and have `partial` set. The
/// result is empty only when `start` is not on a walkable cell.
#[must_use]
pub fn find_partial_path(grid: &Grid, start: Vec3, goal: Vec3) -> PathResult {
    search(grid, start, goal, true)
}

fn search(grid: &Grid, start: Vec3, goal: Vec3, allow_partial: bool) -> PathResult {
    let Some((start_x, start_z)) = grid.walkable_cell(start) else {
        return PathResult::default();
    };
    let goal_cell = grid.walkable_cell(goal);
    if goal_cell.is_none() && !allow_partial {
        return PathResult::default();
    }

    // Off-grid or blocked goals still steer the heuristic
    let (goal_x, goal_z) = grid.world_to_grid(goal);
    let goal_point = Vec3::new(goal.x, grid.height, goal.z);

    let mut open_set = BinaryHeap::new();
    let mut came_from: FxHashMap<(usize, usize), (usize, usize)> = FxHashMap::default();
    let mut g_score: FxHashMap<(usize, usize), f32> = FxHashMap::default();

    let heuristic = |x: usize, z: usize| -> f32 {
        let dx = (x as f32 - goal_x as f32).abs();
        let dz = (z as f32 - goal_z as f32).abs();
        dx + dz // Manhattan distance
    };

    // Closest cell to the goal seen so far: (heuristic, g, cell)
    let mut closest = (heuristic(start_x, start_z), 0.0, (start_x, start_z));

    g_score.insert((start_x, start_z), 0.0);
    open_set.push(Node {
        x: start_x,
        z: start_z,
        f_cost: heuristic(start_x, start_z),
    });

    while let Some(current) = open_set.pop() {
        if goal_cell == Some((current.x, current.z)) {
            let mut waypoints = trace_back(grid, &came_from, (current.x, current.z));
            waypoints.pop();
            waypoints.push(goal_point);

            let length = calculate_path_length(start, &waypoints);
            return PathResult {
                waypoints,
                length,
                partial: false,
            };
        }

        let current_g = g_score
            .get(&(current.x, current.z))
            .copied()
            .unwrap_or(f32::MAX);

        let h = heuristic(current.x, current.z);
        if h < closest.0 || (h == closest.0 && current_g < closest.1) {
            closest = (h, current_g, (current.x, current.z));
        }

        for (nx, nz) in grid.neighbors(current.x, current.z) {
            let tentative_g = current_g + 1.0;

            if tentative_g < g_score.get(&(nx, nz)).copied().unwrap_or(f32::MAX) {
                came_from.insert((nx, nz), (current.x, current.z));
                g_score.insert((nx, nz), tentative_g);

                open_set.push(Node {
                    x: nx,
                    z: nz,
                    f_cost: tentative_g + heuristic(nx, nz),
                });
            }
        }
    }

    if !allow_partial {
        return PathResult::default();
    }

    let (_, _, (x, z)) = closest;
    let mut waypoints = trace_back(grid, &came_from, (x, z));
    if waypoints.is_empty() {
        // Already in the closest cell: settle on its centre
        waypoints.push(grid.cell_center(x, z));
    }
    let length = calculate_path_length(start, &waypoints);

    PathResult {
        waypoints,
        length,
        partial: true,
    }
}

/// Cell centres from the cell after the start up to `end`
fn trace_back(
    grid: &Grid,
    came_from: &FxHashMap<(usize, usize), (usize, usize)>,
    end: (usize, usize),
) -> Vec<Vec3> {
    let mut cells = vec![end];
    let mut curr = end;

    while let Some(&prev) = came_from.get(&curr) {
        cells.push(prev);
        curr = prev;
    }

    cells.reverse();

    // Skip the start cell; the agent is already in it
    cells
        .iter()
        .skip(1)
        .map(|&(x, z)| grid.cell_center(x, z))
        .collect()
}

/// Calculate total path length starting from `start`
fn calculate_path_length(start: Vec3, waypoints: &[Vec3]) -> f32 {
    let mut length = 0.0;
    let mut previous = start;
    for &waypoint in waypoints {
        length += waypoint.distance(previous);
        previous = waypoint;
    }
    length
}
