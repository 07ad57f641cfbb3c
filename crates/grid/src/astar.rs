use core::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use courier_core::{Direction, Position};

use crate::map::WorldMap;
use crate::tile::Layer;

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    cell: Position,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u64) {
        (self.f, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        // Equal f-scores pop in insertion order.
        other.key().cmp(&self.key())
    }
}

/// A* over the grid with unit moves and a Manhattan heuristic.
///
/// Returns `Some(vec![])` when `start == goal`, `None` when the goal is not
/// walkable on `layer` or cannot be reached. The start cell itself is never
/// checked for walkability.
pub fn find_path(
    map: &WorldMap,
    start: Position,
    goal: Position,
    layer: Layer,
) -> Option<Vec<Direction>> {
    if start == goal {
        return Some(Vec::new());
    }
    if !map.is_walkable(goal, layer) {
        return None;
    }

    let mut open = BinaryHeap::new();
    let mut tie: u64 = 0;
    let mut g_score: HashMap<Position, u32> = HashMap::from([(start, 0)]);
    let mut came_from: HashMap<Position, (Position, Direction)> = HashMap::new();

    open.push(OpenNode {
        f: start.manhattan(&goal),
        g: 0,
        cell: start,
        tie,
    });

    while let Some(node) = open.pop() {
        if node.cell == goal {
            return Some(reconstruct(&came_from, start, goal));
        }
        if g_score.get(&node.cell).is_some_and(|g| node.g > *g) {
            // Stale heap entry.
            continue;
        }

        for direction in Direction::ALL {
            let next = node.cell.step(direction);
            if !map.is_walkable(next, layer) {
                continue;
            }

            let tentative_g = node.g + 1;
            if g_score.get(&next).is_some_and(|g| tentative_g >= *g) {
                continue;
            }

            came_from.insert(next, (node.cell, direction));
            g_score.insert(next, tentative_g);
            tie += 1;
            open.push(OpenNode {
                f: tentative_g + next.manhattan(&goal),
                g: tentative_g,
                cell: next,
                tie,
            });
        }
    }

    None
}

fn reconstruct(
    came_from: &HashMap<Position, (Position, Direction)>,
    start: Position,
    goal: Position,
) -> Vec<Direction> {
    let mut actions = Vec::new();
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some((prev, direction)) => {
                actions.push(*direction);
                current = *prev;
            }
            None => break,
        }
    }
    actions.reverse();
    actions
}

/// Replay an action sequence into the cells it visits, excluding `start`.
pub fn path_to_positions(start: Position, actions: &[Direction]) -> Vec<Position> {
    actions
        .iter()
        .scan(start, |current, direction| {
            *current = current.step(*direction);
            Some(*current)
        })
        .collect()
}
