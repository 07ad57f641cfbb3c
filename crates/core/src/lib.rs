pub mod cipher;
pub mod config;
pub mod error;
pub mod id;
pub mod position;
pub mod wire;

pub use cipher::ShiftCipher;
pub use config::{AgentSettings, GameConfig, TeamMode};
pub use error::{CoreError, Result};
pub use id::{AgentId, IntentionId, ParcelId, Timestamp};
pub use position::{Direction, Position};
pub use wire::{Envelope, Template};
