use std::fmt::{self, Write};

use courier_core::{Direction, Position};

use crate::map::WorldMap;
use crate::tile::Layer;

/// Grid movement domain handed to the external planner alongside every
/// generated problem.
pub const DOMAIN: &str = r#"(define (domain courier-grid)
  (:requirements :strips :typing)
  (:types tile)
  (:predicates
    (at ?t - tile)
    (right ?from ?to - tile)
    (left ?from ?to - tile)
    (up ?from ?to - tile)
    (down ?from ?to - tile))
  (:action move_right
    :parameters (?from ?to - tile)
    :precondition (and (at ?from) (right ?from ?to))
    :effect (and (at ?to) (not (at ?from))))
  (:action move_left
    :parameters (?from ?to - tile)
    :precondition (and (at ?from) (left ?from ?to))
    :effect (and (at ?to) (not (at ?from))))
  (:action move_up
    :parameters (?from ?to - tile)
    :precondition (and (at ?from) (up ?from ?to))
    :effect (and (at ?to) (not (at ?from))))
  (:action move_down
    :parameters (?from ?to - tile)
    :precondition (and (at ?from) (down ?from ?to))
    :effect (and (at ?to) (not (at ?from)))))
"#;

fn tile_name(pos: Position) -> String {
    format!("t_{}_{}", pos.x, pos.y)
}

/// A single-agent movement problem over the walkable cells of a map.
#[derive(Debug, Clone)]
pub struct PddlProblem {
    objects: Vec<Position>,
    edges: Vec<(Direction, Position, Position)>,
    start: Position,
    goal: Position,
}

impl PddlProblem {
    pub fn new(map: &WorldMap, start: Position, goal: Position, layer: Layer) -> Self {
        let objects: Vec<Position> = map
            .walkable_cells()
            .filter(|p| *p == start || map.is_walkable(*p, layer))
            .collect();

        let mut edges = Vec::new();
        for from in &objects {
            for direction in Direction::ALL {
                let to = from.step(direction);
                if map.is_walkable(to, layer) {
                    edges.push((direction, *from, to));
                }
            }
        }

        Self {
            objects,
            edges,
            start,
            goal,
        }
    }

    pub fn fact_count(&self) -> usize {
        self.edges.len() + 1
    }
}

impl fmt::Display for PddlProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(define (problem courier-move)")?;
        writeln!(f, "  (:domain courier-grid)")?;

        let mut objects = String::new();
        for pos in &self.objects {
            write!(objects, " {}", tile_name(*pos))?;
        }
        writeln!(f, "  (:objects{} - tile)", objects)?;

        writeln!(f, "  (:init")?;
        writeln!(f, "    (at {})", tile_name(self.start))?;
        for (direction, from, to) in &self.edges {
            writeln!(
                f,
                "    ({} {} {})",
                direction.as_str(),
                tile_name(*from),
                tile_name(*to)
            )?;
        }
        writeln!(f, "  )")?;
        writeln!(f, "  (:goal (at {})))", tile_name(self.goal))
    }
}

/// Turn planner steps such as `MOVE_RIGHT T_0_0 T_1_0` into directions.
/// Returns `None` if any step is not a known move.
pub fn parse_plan<S: AsRef<str>>(steps: &[S]) -> Option<Vec<Direction>> {
    steps
        .iter()
        .map(|step| {
            let action = step
                .as_ref()
                .trim()
                .trim_start_matches('(')
                .split_whitespace()
                .next()?
                .to_ascii_lowercase();
            Direction::parse(action.strip_prefix("move_").unwrap_or(action.as_str()))
        })
        .collect()
}
