//! Grid-based pathfinding using A* over 8-connected neighbors.
//!
//! Costs come from the terrain grid; diagonal steps are multiplied by √2.
//! Tiles at or above [`IMPASSABLE_COST`](crate::terrain::IMPASSABLE_COST)
//! never enter the search, whatever their `passable` flag says.
//!
//! The heuristic is plain Manhattan distance, which is *not* admissible
//! for the √2-weighted diagonal cost model and can produce connected but
//! suboptimal routes. This matches the long-observed behavior of the
//! movement code and is kept deliberately; see DESIGN.md before changing
//! it.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::math::{Fixed, Vec2Fixed, SQRT_2};
use crate::terrain::TerrainGrid;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    /// Tile coordinates.
    x: u32,
    y: u32,
    /// f_score = g_score + heuristic.
    f_score: Fixed,
    /// Insertion sequence number. Ties on `f_score` go to the node pushed
    /// first, so equal-cost frontiers expand in a stable order.
    seq: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Manhattan distance heuristic in tile units.
#[inline]
fn manhattan_heuristic(x1: u32, y1: u32, x2: u32, y2: u32) -> Fixed {
    Fixed::from_num(x1.abs_diff(x2)) + Fixed::from_num(y1.abs_diff(y2))
}

/// Check that a diagonal move does not cut a blocked corner.
#[inline]
fn is_diagonal_valid(grid: &TerrainGrid, x: u32, y: u32, dx: i32, dy: i32) -> bool {
    if dx != 0 && dy != 0 {
        let nx = (x as i32 + dx) as u32;
        let ny = (y as i32 + dy) as u32;
        grid.is_walkable(nx, y) && grid.is_walkable(x, ny)
    } else {
        true
    }
}

/// Find a path between two world positions.
///
/// Returns tile-center waypoints from the start tile to the goal tile
/// inclusive. Returns an empty vector when no route exists or either
/// endpoint is out of bounds or blocked; callers treat that as "no
/// route", never as an error.
#[must_use]
pub fn find_path(grid: &TerrainGrid, start: Vec2Fixed, goal: Vec2Fixed) -> Vec<Vec2Fixed> {
    let Some((start_x, start_y)) = grid.world_to_grid(start) else {
        return Vec::new();
    };
    let Some((goal_x, goal_y)) = grid.world_to_grid(goal) else {
        return Vec::new();
    };

    if !grid.is_walkable(start_x, start_y) || !grid.is_walkable(goal_x, goal_y) {
        return Vec::new();
    }

    if start_x == goal_x && start_y == goal_y {
        return vec![grid.grid_to_world(start_x, start_y)];
    }

    find_path_tiles(grid, start_x, start_y, goal_x, goal_y)
        .into_iter()
        .map(|(x, y)| grid.grid_to_world(x, y))
        .collect()
}

/// A* over tile coordinates. Returns tile coordinates start..=goal, or
/// an empty vector when the open set exhausts without reaching the goal.
#[must_use]
pub fn find_path_tiles(
    grid: &TerrainGrid,
    start_x: u32,
    start_y: u32,
    goal_x: u32,
    goal_y: u32,
) -> Vec<(u32, u32)> {
    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
    let mut g_score: HashMap<(u32, u32), Fixed> = HashMap::new();
    let mut seq: u64 = 0;

    let start_h = manhattan_heuristic(start_x, start_y, goal_x, goal_y);
    g_score.insert((start_x, start_y), Fixed::ZERO);
    open_set.push(AStarNode {
        x: start_x,
        y: start_y,
        f_score: start_h,
        seq,
    });

    while let Some(current) = open_set.pop() {
        if current.x == goal_x && current.y == goal_y {
            return reconstruct_path(&came_from, goal_x, goal_y);
        }

        let current_g = g_score
            .get(&(current.x, current.y))
            .copied()
            .unwrap_or(Fixed::MAX);

        for &(dx, dy) in &DIRECTIONS {
            let nx = current.x as i32 + dx;
            let ny = current.y as i32 + dy;

            if nx < 0 || ny < 0 {
                continue;
            }

            let nx = nx as u32;
            let ny = ny as u32;

            if !grid.in_bounds(nx, ny) {
                continue;
            }

            // None covers both blocked tiles and the high-cost tier.
            let Some(tile_cost) = grid.movement_cost(nx, ny) else {
                continue;
            };

            if !is_diagonal_valid(grid, current.x, current.y, dx, dy) {
                continue;
            }

            let move_cost = if dx != 0 && dy != 0 {
                tile_cost * SQRT_2
            } else {
                tile_cost
            };

            let tentative_g = current_g + move_cost;
            let neighbor_g = g_score.get(&(nx, ny)).copied().unwrap_or(Fixed::MAX);

            if tentative_g < neighbor_g {
                came_from.insert((nx, ny), (current.x, current.y));
                g_score.insert((nx, ny), tentative_g);

                let h = manhattan_heuristic(nx, ny, goal_x, goal_y);
                seq += 1;
                open_set.push(AStarNode {
                    x: nx,
                    y: ny,
                    f_score: tentative_g + h,
                    seq,
                });
            }
        }
    }

    tracing::debug!(
        start = ?(start_x, start_y),
        goal = ?(goal_x, goal_y),
        "no route found"
    );
    Vec::new()
}

/// Walk the `came_from` map from goal back to start, then reverse.
fn reconstruct_path(
    came_from: &HashMap<(u32, u32), (u32, u32)>,
    goal_x: u32,
    goal_y: u32,
) -> Vec<(u32, u32)> {
    let mut path = vec![(goal_x, goal_y)];
    let mut current = (goal_x, goal_y);

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}
