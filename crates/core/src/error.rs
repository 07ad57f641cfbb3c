use thiserror::Error;

/// Errors raised by the shared courier primitives.
///
/// These cover configuration ingestion and the wire envelope used between
/// teammates.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A configuration value could not be interpreted
    #[error("Invalid config value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    /// A payload field could not be (de)serialized
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// A payload field the receiver depends on is absent
    #[error("Missing payload field: {0}")]
    MissingField(String),
}

/// Convenience Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
