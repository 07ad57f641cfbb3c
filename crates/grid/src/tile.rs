use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GridError;

/// Static classification of a cell, fixed for the lifetime of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TileCode")]
pub enum TileKind {
    Wall,
    Spawn,
    Delivery,
    Walkable,
}

impl TileKind {
    pub fn is_walkable(&self) -> bool {
        !matches!(self, TileKind::Wall)
    }

    pub fn code(&self) -> u8 {
        match self {
            TileKind::Wall => 0,
            TileKind::Spawn => 1,
            TileKind::Delivery => 2,
            TileKind::Walkable => 3,
        }
    }

    pub fn from_symbol(symbol: char) -> Option<TileKind> {
        match symbol {
            '#' | '0' => Some(TileKind::Wall),
            'S' | '1' => Some(TileKind::Spawn),
            'D' | '2' => Some(TileKind::Delivery),
            '.' | '3' => Some(TileKind::Walkable),
            _ => None,
        }
    }
}

impl TryFrom<u8> for TileKind {
    type Error = GridError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TileKind::Wall),
            1 => Ok(TileKind::Spawn),
            2 => Ok(TileKind::Delivery),
            3 => Ok(TileKind::Walkable),
            other => Err(GridError::UnknownTile(other.to_string())),
        }
    }
}

/// Tile codes arrive either as numbers or as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum TileCode {
    Number(u8),
    Text(String),
}

impl TryFrom<TileCode> for TileKind {
    type Error = GridError;

    fn try_from(code: TileCode) -> Result<Self, Self::Error> {
        match code {
            TileCode::Number(n) => TileKind::try_from(n),
            TileCode::Text(text) => text
                .trim()
                .parse::<u8>()
                .map_err(|_| GridError::UnknownTile(text.clone()))
                .and_then(TileKind::try_from),
        }
    }
}

/// One entry of the map event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: TileKind,
}

impl Tile {
    pub fn new(x: i32, y: i32, kind: TileKind) -> Self {
        Self { x, y, kind }
    }
}

/// Transient per-cell tag layered on top of the static tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Occupancy {
    #[default]
    Free,
    Agent,
    ReservedPath,
}

/// Which view of the map a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layer {
    /// Static tiles with the occupancy overlay applied.
    #[default]
    Live,
    /// Static tiles only.
    Static,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Live => f.write_str("live"),
            Layer::Static => f.write_str("static"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_deserializes_numeric_and_string_codes() {
        let a: Tile = serde_json::from_str(r#"{"x":1,"y":2,"type":2}"#).unwrap();
        let b: Tile = serde_json::from_str(r#"{"x":0,"y":0,"type":"1"}"#).unwrap();
        assert_eq!(a.kind, TileKind::Delivery);
        assert_eq!(b.kind, TileKind::Spawn);
        assert!(serde_json::from_str::<Tile>(r#"{"x":0,"y":0,"type":9}"#).is_err());
    }
}
