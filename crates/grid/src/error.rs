use thiserror::Error;

/// Errors raised while building or querying the world map.
#[derive(Error, Debug)]
pub enum GridError {
    /// Map dimensions must both be positive
    #[error("invalid map dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    /// A tile lies outside the declared dimensions
    #[error("tile out of bounds: ({x}, {y})")]
    TileOutOfBounds { x: i32, y: i32 },

    /// The server sent a tile code we do not know
    #[error("unknown tile code: {0}")]
    UnknownTile(String),
}

/// Convenience Result type for grid operations
pub type Result<T> = std::result::Result<T, GridError>;
