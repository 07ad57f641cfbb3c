use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use courier_core::{Position, Timestamp};

use crate::error::{GridError, Result};
use crate::spawn::{SpawnDensity, SpawnTile};
use crate::tile::{Layer, Occupancy, Tile, TileKind};

/// Spawn and delivery tiles a flood fill reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachable {
    pub spawn_tiles: Vec<Position>,
    pub delivery_tiles: Vec<Position>,
}

/// The agent's picture of the grid.
///
/// Holds the static tile classification plus a mutable occupancy overlay.
/// The overlay only affects [`Layer::Live`] queries; [`Layer::Static`]
/// always answers from the tiles alone.
#[derive(Debug, Clone, Default)]
pub struct WorldMap {
    width: i32,
    height: i32,
    tiles: Vec<TileKind>,
    overlay: Vec<Occupancy>,
    pub(crate) spawn_tiles: Vec<SpawnTile>,
    delivery_tiles: Vec<Position>,
    pub(crate) density: SpawnDensity,
    pub(crate) observation_distance: u32,
    pub(crate) visits: HashMap<Position, Timestamp>,
}

impl WorldMap {
    /// Build a map from the server's tile list. Cells absent from the list
    /// are walls.
    pub fn from_tiles(
        width: i32,
        height: i32,
        tiles: &[Tile],
        observation_distance: u32,
        high_density_threshold: f64,
    ) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(GridError::InvalidDimensions { width, height });
        }

        let len = width
            .checked_mul(height)
            .ok_or(GridError::InvalidDimensions { width, height })? as usize;
        let mut map = Self {
            width,
            height,
            tiles: vec![TileKind::Wall; len],
            overlay: vec![Occupancy::Free; len],
            spawn_tiles: Vec::new(),
            delivery_tiles: Vec::new(),
            density: SpawnDensity::Low,
            observation_distance,
            visits: HashMap::new(),
        };

        for tile in tiles {
            let idx = map
                .idx(Position::new(tile.x, tile.y))
                .ok_or(GridError::TileOutOfBounds { x: tile.x, y: tile.y })?;
            map.tiles[idx] = tile.kind;
        }

        map.classify_density(high_density_threshold);
        map.delivery_tiles = map.positions_of(TileKind::Delivery);
        map.compute_spawn_scores();

        debug!(
            width,
            height,
            spawns = map.spawn_tiles.len(),
            deliveries = map.delivery_tiles.len(),
            density = ?map.density,
            "World map loaded"
        );

        Ok(map)
    }

    /// Build a map from rows of symbols (`#` wall, `S` spawn, `D` delivery,
    /// `.` walkable). The first row is the top of the map, so `Up` moves
    /// towards it.
    pub fn from_ascii(rows: &str, observation_distance: u32) -> Result<Self> {
        let lines: Vec<&str> = rows
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let height = lines.len() as i32;
        let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;

        let mut tiles = Vec::new();
        for (row, line) in lines.iter().enumerate() {
            let y = height - 1 - row as i32;
            for (x, symbol) in line.chars().enumerate() {
                let kind = TileKind::from_symbol(symbol)
                    .ok_or_else(|| GridError::UnknownTile(symbol.to_string()))?;
                tiles.push(Tile::new(x as i32, y, kind));
            }
        }

        Self::from_tiles(width, height, &tiles, observation_distance, 0.4)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_loaded(&self) -> bool {
        !self.tiles.is_empty()
    }

    pub fn is_in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub(crate) fn idx(&self, pos: Position) -> Option<usize> {
        if !self.is_in_bounds(pos) {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: Position) -> Option<TileKind> {
        self.idx(pos).map(|idx| self.tiles[idx])
    }

    pub fn occupancy(&self, pos: Position) -> Occupancy {
        self.idx(pos)
            .map(|idx| self.overlay[idx])
            .unwrap_or_default()
    }

    pub fn is_walkable(&self, pos: Position, layer: Layer) -> bool {
        let Some(idx) = self.idx(pos) else {
            return false;
        };
        if !self.tiles[idx].is_walkable() {
            return false;
        }
        match layer {
            Layer::Static => true,
            Layer::Live => self.overlay[idx] == Occupancy::Free,
        }
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.fill(Occupancy::Free);
    }

    /// Tag a cell on the overlay. Out-of-bounds cells are ignored.
    pub fn mark_occupied(&mut self, pos: Position, tag: Occupancy) {
        if let Some(idx) = self.idx(pos) {
            self.overlay[idx] = tag;
        }
    }

    pub fn reserve_path(&mut self, cells: &[Position]) {
        for cell in cells {
            self.mark_occupied(*cell, Occupancy::ReservedPath);
        }
    }

    pub fn delivery_tiles(&self) -> &[Position] {
        &self.delivery_tiles
    }

    pub fn spawn_tiles(&self) -> &[SpawnTile] {
        &self.spawn_tiles
    }

    pub fn density(&self) -> SpawnDensity {
        self.density
    }

    pub fn observation_distance(&self) -> u32 {
        self.observation_distance
    }

    /// Every walkable cell on the static layer, in row-major order.
    pub fn walkable_cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width)
                .map(move |x| Position::new(x, y))
                .filter(move |p| self.is_walkable(*p, Layer::Static))
        })
    }

    fn positions_of(&self, kind: TileKind) -> Vec<Position> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Position::new(x, y)))
            .filter(|p| self.tile(*p) == Some(kind))
            .collect()
    }

    fn classify_density(&mut self, threshold: f64) {
        let walkable = self.tiles.iter().filter(|t| t.is_walkable()).count();
        let spawns = self
            .tiles
            .iter()
            .filter(|t| **t == TileKind::Spawn)
            .count();
        self.density = if walkable > 0 && spawns as f64 / walkable as f64 > threshold {
            SpawnDensity::High
        } else {
            SpawnDensity::Low
        };
    }

    /// Flood fill from `start` over `layer`, collecting the spawn and
    /// delivery tiles found.
    ///
    /// The start cell is always expanded, even when the overlay marks it:
    /// it is where the searching agent stands.
    pub fn reachable_from(&self, start: Position, layer: Layer) -> Reachable {
        let mut reachable = Reachable::default();
        if !self.is_walkable(start, Layer::Static) {
            return reachable;
        }

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            match self.tile(current) {
                Some(TileKind::Spawn) => reachable.spawn_tiles.push(current),
                Some(TileKind::Delivery) => reachable.delivery_tiles.push(current),
                _ => {}
            }

            for next in current.neighbors() {
                if visited.contains(&next) || !self.is_walkable(next, layer) {
                    continue;
                }
                visited.insert(next);
                queue.push_back(next);
            }
        }

        reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORRIDOR: &str = "
        S..#
        ##.#
        ...D
    ";

    #[test]
    fn test_ascii_orientation() {
        let map = WorldMap::from_ascii(CORRIDOR, 3).unwrap();
        assert_eq!(map.width(), 4);
        assert_eq!(map.height(), 3);
        assert_eq!(map.tile(Position::new(0, 2)), Some(TileKind::Spawn));
        assert_eq!(map.tile(Position::new(3, 0)), Some(TileKind::Delivery));
        assert_eq!(map.delivery_tiles(), &[Position::new(3, 0)]);
    }

    #[test]
    fn test_overlay_only_blocks_live_layer() {
        let mut map = WorldMap::from_ascii(CORRIDOR, 3).unwrap();
        let cell = Position::new(2, 1);
        map.mark_occupied(cell, Occupancy::Agent);
        assert!(!map.is_walkable(cell, Layer::Live));
        assert!(map.is_walkable(cell, Layer::Static));

        map.clear_overlay();
        assert!(map.is_walkable(cell, Layer::Live));
    }

    #[test]
    fn test_out_of_bounds_is_never_walkable() {
        let map = WorldMap::from_ascii(CORRIDOR, 3).unwrap();
        assert!(!map.is_walkable(Position::new(-1, 0), Layer::Static));
        assert!(!map.is_walkable(Position::new(4, 0), Layer::Static));
    }

    #[test]
    fn test_reachability_respects_occupancy() {
        let mut map = WorldMap::from_ascii(CORRIDOR, 3).unwrap();
        let start = Position::new(0, 2);

        let all = map.reachable_from(start, Layer::Static);
        assert_eq!(all.spawn_tiles, vec![Position::new(0, 2)]);
        assert_eq!(all.delivery_tiles, vec![Position::new(3, 0)]);

        map.mark_occupied(Position::new(2, 1), Occupancy::Agent);
        let live = map.reachable_from(start, Layer::Live);
        assert_eq!(live.spawn_tiles, vec![Position::new(0, 2)]);
        assert!(live.delivery_tiles.is_empty());
    }

    #[test]
    fn test_tile_outside_dimensions_is_rejected() {
        let tiles = [Tile::new(5, 0, TileKind::Walkable)];
        assert!(WorldMap::from_tiles(2, 2, &tiles, 3, 0.4).is_err());
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let result = WorldMap::from_tiles(i32::MAX, 2, &[], 3, 0.4);
        assert!(matches!(
            result,
            Err(GridError::InvalidDimensions {
                width: i32::MAX,
                height: 2
            })
        ));
    }
}
