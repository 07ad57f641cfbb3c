use thiserror::Error;

use courier_core::Position;

use crate::options::PredicateKind;

/// Errors from the environment client capability set.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The game session is gone
    #[error("client disconnected")]
    Disconnected,

    /// The transport failed to deliver a request
    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a plan or intention did not complete.
///
/// `Stopped` is cooperative cancellation and is not a failure; everything
/// else is recovered at the scheduler boundary.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// The intention was stopped at a checkpoint
    #[error("intention stopped")]
    Stopped,

    /// No plan in the library applied or succeeded
    #[error("no plan satisfied {0:?} intention")]
    NoPlanSatisfied(PredicateKind),

    /// The predicate lacks the target the plan needs
    #[error("predicate has no target")]
    MissingTarget,

    /// Search could not reach the target
    #[error("path to {0} is blocked")]
    PathBlocked(Position),

    /// The environment kept rejecting an action
    #[error("action rejected: {0}")]
    ActionRejected(String),

    /// A cell on a pre-agreed path is no longer free
    #[error("agreed path broken at {0}")]
    AgreedPathBroken(Position),

    /// No spawn tile is available to wander to
    #[error("no idle target available")]
    NoIdleTarget,

    /// The teammate did not carry out a hand-off step
    #[error("hand-off rejected: {0}")]
    HandoffRejected(String),

    /// A wire payload could not be built or read
    #[error("payload error: {0}")]
    Payload(String),

    /// The external planner failed or returned garbage
    #[error("solver error: {0}")]
    Solver(String),

    /// The environment client failed
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

impl PlanError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PlanError::Stopped)
    }
}

impl From<courier_core::CoreError> for PlanError {
    fn from(e: courier_core::CoreError) -> Self {
        PlanError::Payload(e.to_string())
    }
}

/// Errors raised by the agent runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The game map could not be loaded
    #[error("map error: {0}")]
    Map(#[from] courier_grid::GridError),

    /// A wire payload was malformed
    #[error("payload error: {0}")]
    Payload(#[from] courier_core::CoreError),

    /// The environment client failed
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Deliberation failed
    #[error("deliberation failed: {0}")]
    Deliberation(String),

    /// The runtime did not shut down cleanly
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),

    /// An internal channel closed unexpectedly
    #[error("channel closed")]
    ChannelClosed,
}

/// Convenience Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
