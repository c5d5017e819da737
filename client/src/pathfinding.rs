//! Grid-constrained A* path planning
//!
//! Four-connected moves, unit step cost, Manhattan heuristic. The open set is a
//! plain vector scanned for the lowest f on every extraction. At 32x32 that is
//! well under the cost of a frame; grids much larger than a few thousand tiles
//! would want a binary-heap frontier instead.

use shared::{GridBounds, Tile};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
struct Node {
    tile: Tile,
    g: i32,
    h: i32,
    f: i32,
}

impl Node {
    fn new(tile: Tile, g: i32, goal: Tile) -> Self {
        let h = tile.manhattan(goal);
        Self { tile, g, h, f: g + h }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PathPlanner {
    bounds: GridBounds,
}

impl PathPlanner {
    pub fn new(bounds: GridBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Shortest path from `start` to `goal`, both ends included.
    ///
    /// Returns `[goal]` when already there and an empty path when the goal
    /// cannot be reached.
    pub fn find_path(&self, start: Tile, goal: Tile) -> Vec<Tile> {
        self.find_path_with(start, goal, |_| true)
    }

    /// Like `find_path`, but only steps onto in-bounds tiles accepted by `passable`
    pub fn find_path_with<F>(&self, start: Tile, goal: Tile, passable: F) -> Vec<Tile>
    where
        F: Fn(Tile) -> bool,
    {
        let is_valid = |tile: Tile| self.bounds.contains(tile) && passable(tile);

        if !is_valid(goal) {
            return Vec::new();
        }
        if start == goal {
            return vec![goal];
        }

        let mut open = vec![Node::new(start, 0, goal)];
        let mut closed: HashSet<Tile> = HashSet::new();
        let mut came_from: HashMap<Tile, Tile> = HashMap::new();

        while !open.is_empty() {
            let mut best = 0;
            for (i, node) in open.iter().enumerate().skip(1) {
                if node.f < open[best].f {
                    best = i;
                }
            }

            let current = open.remove(best);
            closed.insert(current.tile);

            if current.tile == goal {
                return reconstruct_path(&came_from, goal);
            }

            for neighbour in current.tile.neighbours() {
                if !is_valid(neighbour) || closed.contains(&neighbour) {
                    continue;
                }

                let tentative_g = current.g + 1;
                match open.iter_mut().find(|n| n.tile == neighbour) {
                    Some(existing) => {
                        if tentative_g < existing.g {
                            existing.g = tentative_g;
                            existing.f = existing.g + existing.h;
                            came_from.insert(neighbour, current.tile);
                        }
                    }
                    None => {
                        open.push(Node::new(neighbour, tentative_g, goal));
                        came_from.insert(neighbour, current.tile);
                    }
                }
            }
        }

        Vec::new()
    }
}

fn reconstruct_path(came_from: &HashMap<Tile, Tile>, goal: Tile) -> Vec<Tile> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&previous) = came_from.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}
