pub mod astar;
pub mod error;
pub mod map;
pub mod pddl;
pub mod spawn;
pub mod tile;

pub use astar::{find_path, path_to_positions};
pub use error::{GridError, Result};
pub use map::{Reachable, WorldMap};
pub use pddl::{parse_plan, PddlProblem, DOMAIN};
pub use spawn::{SpawnDensity, SpawnTile};
pub use tile::{Layer, Occupancy, Tile, TileKind};
