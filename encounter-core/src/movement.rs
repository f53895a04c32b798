//! Terrain-weighted shortest-path search.
//!
//! Eight-directional Dijkstra over a [`TerrainGrid`]. An orthogonal step
//! costs 1 and a diagonal step costs √2. Either is multiplied by the terrain
//! multiplier of the tile being entered. Impassable tiles are never entered.

use crate::creature::Position;
use crate::terrain::TerrainGrid;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use thiserror::Error;

/// Slack for comparing accumulated √2 steps against a budget.
const COST_EPSILON: f64 = 1e-9;

const NEIGHBORS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum MovementError {
    #[error("No valid path to destination")]
    NoPath,
    #[error("Path costs {cost:.1} but only {budget:.1} movement is available")]
    OutOfRange { cost: f64, budget: f64 },
    #[error("Destination {0} is off the map")]
    OutOfBounds(Position),
}

/// A successful path-cost check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathCost {
    pub from: Position,
    pub to: Position,
    pub cost: f64,
}

/// Frontier entry. Lower cost first, then earlier discovery.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    seq: u64,
    index: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // Reversed so the max-heap pops the cheapest, oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Single-source costs to every tile, stopping early once `goal` is settled.
///
/// Unreached tiles hold `f64::INFINITY`.
fn search(grid: &TerrainGrid, start: Position, goal: Option<Position>) -> Vec<f64> {
    let width = grid.width() as usize;
    let mut dist = vec![f64::INFINITY; width * grid.height() as usize];
    if !grid.contains(start) {
        return dist;
    }

    let index_of = |p: Position| p.y as usize * width + p.x as usize;
    let position_of = |i: usize| Position::new((i % width) as i32, (i / width) as i32);

    let mut settled = vec![false; dist.len()];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist[index_of(start)] = 0.0;
    heap.push(Frontier {
        cost: 0.0,
        seq,
        index: index_of(start),
    });

    while let Some(Frontier { cost, index, .. }) = heap.pop() {
        if settled[index] {
            continue;
        }
        settled[index] = true;

        let current = position_of(index);
        if goal == Some(current) {
            break;
        }

        for (dx, dy) in NEIGHBORS {
            let next = Position::new(current.x + dx, current.y + dy);
            let Some(multiplier) = grid.terrain(next).and_then(|t| t.multiplier()) else {
                continue;
            };
            let step = if dx != 0 && dy != 0 {
                std::f64::consts::SQRT_2
            } else {
                1.0
            };
            let candidate = cost + step * multiplier;
            let next_index = index_of(next);
            if candidate < dist[next_index] {
                dist[next_index] = candidate;
                seq += 1;
                heap.push(Frontier {
                    cost: candidate,
                    seq,
                    index: next_index,
                });
            }
        }
    }

    dist
}

/// Minimum path cost from `from` to `to`; infinite when unreachable.
pub fn path_cost(grid: &TerrainGrid, from: Position, to: Position) -> f64 {
    if !grid.contains(to) || !grid.is_passable(to) {
        return f64::INFINITY;
    }
    let dist = search(grid, from, Some(to));
    dist[to.y as usize * grid.width() as usize + to.x as usize]
}

/// Check a move against the budget without touching any state.
pub fn resolve_move(
    grid: &TerrainGrid,
    from: Position,
    to: Position,
    budget: f64,
) -> Result<PathCost, MovementError> {
    if !grid.contains(to) {
        return Err(MovementError::OutOfBounds(to));
    }
    let cost = path_cost(grid, from, to);
    if cost.is_infinite() {
        return Err(MovementError::NoPath);
    }
    if cost > budget + COST_EPSILON {
        return Err(MovementError::OutOfRange { cost, budget });
    }
    Ok(PathCost { from, to, cost })
}

/// Every tile reachable from `from` within `budget`, with its cost.
pub fn reachable(grid: &TerrainGrid, from: Position, budget: f64) -> Vec<(Position, f64)> {
    let dist = search(grid, from, None);
    grid.positions()
        .zip(dist)
        .filter(|(_, cost)| *cost <= budget + COST_EPSILON)
        .collect()
}
