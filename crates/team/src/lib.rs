//! Two-agent cooperation: pairing, goal negotiation and corridor hand-offs.

pub mod alleyway;
pub mod deliberator;
pub mod error;
pub mod handshake;
pub mod negotiation;

pub use alleyway::{AlleywayRole, CorridorView};
pub use deliberator::{runtime_for, team_runtime, TeamDeliberator};
pub use error::{Result, TeamError};
pub use handshake::{Handshake, HandshakeStep, PairingState};
pub use negotiation::{
    assign_role, compare_best_options, create_agreed_path, Negotiator, Resolution, Role,
};
