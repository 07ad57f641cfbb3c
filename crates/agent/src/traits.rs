use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::oneshot;

use courier_core::{AgentId, Direction, Envelope, ParcelId, Position};

use crate::error::{AgentError, ClientError};
use crate::lifecycle::Trigger;

/// Outcome of a request that expects an answer.
#[derive(Debug, Clone)]
pub enum AskReply {
    Reply(Envelope),
    Timeout,
}

/// The game environment as seen by one agent.
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Attempt one step. `None` means the server refused the move.
    async fn move_dir(&self, direction: Direction) -> Result<Option<Position>, ClientError>;

    /// Pick up everything on the current cell; returns what was picked.
    async fn pickup(&self) -> Result<Vec<ParcelId>, ClientError>;

    /// Put down everything carried; returns what was dropped.
    async fn putdown(&self) -> Result<Vec<ParcelId>, ClientError>;

    async fn say(&self, to: &AgentId, envelope: Envelope) -> Result<(), ClientError>;

    async fn ask(
        &self,
        to: &AgentId,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<AskReply, ClientError>;

    async fn shout(&self, envelope: Envelope) -> Result<(), ClientError>;
}

/// A message from another agent. `reply` is set when the sender is
/// waiting for an answer.
#[derive(Debug)]
pub struct IncomingMessage {
    pub from: AgentId,
    pub name: String,
    pub envelope: Envelope,
    pub reply: Option<oneshot::Sender<Envelope>>,
}

impl IncomingMessage {
    pub fn new(from: AgentId, name: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            from,
            name: name.into(),
            envelope,
            reply: None,
        }
    }

    pub fn with_reply(mut self, reply: oneshot::Sender<Envelope>) -> Self {
        self.reply = Some(reply);
        self
    }
}

/// Decides what to push onto the intention queue after beliefs change.
#[async_trait]
pub trait Deliberator: Send + Sync {
    async fn deliberate(&self, trigger: Trigger) -> Result<(), AgentError>;

    async fn on_message(&self, message: IncomingMessage) -> Result<(), AgentError> {
        tracing::debug!(from = %message.from, msg = %message.envelope.msg, "Ignoring message");
        Ok(())
    }
}
