use thiserror::Error;

use courier_agent::{AgentError, ClientError};
use courier_core::CoreError;

#[derive(Debug, Error)]
pub enum TeamError {
    /// A team operation was attempted before the handshake completed
    #[error("not paired with a teammate")]
    NotPaired,

    /// A teammate payload could not be read or written
    #[error("payload error: {0}")]
    Payload(#[from] CoreError),

    /// The environment client failed
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

impl From<TeamError> for AgentError {
    fn from(e: TeamError) -> Self {
        match e {
            TeamError::Payload(inner) => AgentError::Payload(inner),
            TeamError::Client(inner) => AgentError::Client(inner),
            other => AgentError::Deliberation(other.to_string()),
        }
    }
}

/// Convenience Result type for team operations
pub type Result<T> = std::result::Result<T, TeamError>;
