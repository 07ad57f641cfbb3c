use std::collections::{HashSet, VecDeque};

use courier_core::{Position, Timestamp};

use crate::map::WorldMap;
use crate::tile::{Layer, TileKind};

/// Whether spawn tiles make up a large share of the walkable area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnDensity {
    High,
    #[default]
    Low,
}

/// A spawn tile with its static desirability as an idle destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnTile {
    pub position: Position,
    pub score: f64,
}

const DELIVERY_BONUS: f64 = 3.0;

impl WorldMap {
    /// Recompute every spawn tile's neighborhood score.
    pub fn compute_spawn_scores(&mut self) {
        let spawns: Vec<Position> = self
            .walkable_cells()
            .filter(|p| self.tile(*p) == Some(TileKind::Spawn))
            .collect();

        self.spawn_tiles = spawns
            .into_iter()
            .map(|position| SpawnTile {
                position,
                score: self.spawn_score(position),
            })
            .collect();
    }

    pub fn set_observation_distance(&mut self, distance: u32) {
        if distance != self.observation_distance {
            self.observation_distance = distance;
            self.compute_spawn_scores();
        }
    }

    /// Bounded BFS out to the observation distance. Each spawn tile found
    /// adds one; on dense maps, delivery tiles within half the radius of a
    /// found spawn tile add a bonus that shrinks with distance.
    fn spawn_score(&self, origin: Position) -> f64 {
        let radius = self.observation_distance;
        let delivery_radius = (radius / 2) as i32;
        let dense = self.density == SpawnDensity::High;

        let mut score = 0.0;
        let mut visited = HashSet::from([origin]);
        let mut queue = VecDeque::from([(origin, 0u32)]);

        while let Some((current, distance)) = queue.pop_front() {
            if self.tile(current) == Some(TileKind::Spawn) {
                score += 1.0;

                if dense {
                    for dx in -delivery_radius..=delivery_radius {
                        for dy in -delivery_radius..=delivery_radius {
                            let dist = dx.abs() + dy.abs();
                            if dist > delivery_radius {
                                continue;
                            }
                            let cell = Position::new(current.x + dx, current.y + dy);
                            if self.tile(cell) == Some(TileKind::Delivery) {
                                score += f64::from(delivery_radius - dist + 1) * DELIVERY_BONUS;
                            }
                        }
                    }
                }
            }

            if distance >= radius {
                continue;
            }
            for next in current.neighbors() {
                if visited.contains(&next) || !self.is_walkable(next, Layer::Static) {
                    continue;
                }
                visited.insert(next);
                queue.push_back((next, distance + 1));
            }
        }

        score
    }

    pub fn mark_visited(&mut self, pos: Position, now: Timestamp) {
        if self.tile(pos) == Some(TileKind::Spawn) {
            self.visits.insert(pos, now);
        }
    }

    pub fn last_visited(&self, pos: Position) -> Option<Timestamp> {
        self.visits.get(&pos).copied()
    }

    /// Linear bonus in `[0, 1]` for spawn tiles not visited lately,
    /// normalized by the spread of visit times across all spawn tiles.
    pub fn staleness_bonus(&self, pos: Position) -> f64 {
        let stamp = |p: Position| self.visits.get(&p).map(|t| t.as_millis()).unwrap_or(0);

        let mut newest = 0u64;
        let mut oldest = u64::MAX;
        for tile in &self.spawn_tiles {
            let t = stamp(tile.position);
            newest = newest.max(t);
            oldest = oldest.min(t);
        }

        if self.spawn_tiles.is_empty() || newest == oldest {
            return 0.0;
        }
        (newest - stamp(pos)) as f64 / (newest - oldest) as f64
    }

    /// Best idle destinations reachable from `from`, strongest first.
    ///
    /// Weight grows with the spawn score and staleness bonus and shrinks
    /// with distance. The agent's own cell is never a candidate.
    pub fn idle_candidates(
        &self,
        from: Position,
        staleness_weight: f64,
        top_n: usize,
    ) -> Vec<(Position, f64)> {
        let reachable: HashSet<Position> = self
            .reachable_from(from, Layer::Live)
            .spawn_tiles
            .into_iter()
            .collect();

        let mut candidates: Vec<(Position, f64)> = self
            .spawn_tiles
            .iter()
            .filter(|t| t.position != from && reachable.contains(&t.position))
            .map(|t| {
                let value = t.score + staleness_weight * self.staleness_bonus(t.position);
                let weight = value / (1.0 + f64::from(from.manhattan(&t.position)));
                (t.position, weight)
            })
            .collect();

        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(top_n);
        candidates
    }
}
