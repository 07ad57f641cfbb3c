use tracing::{debug, info};

use courier_agent::Teammate;
use courier_core::{AgentId, Envelope, ShiftCipher, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Unpaired,
    Handshaking,
    Paired,
}

/// What the caller must do after feeding a message to the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeStep {
    /// Not a handshake message, or one that no longer matters.
    Ignored,
    /// Paired with `teammate`; send `reply` to it if present.
    Paired {
        teammate: Teammate,
        reply: Option<Envelope>,
    },
}

/// Pairing of two agents over the shared broadcast channel.
///
/// Each side shouts a sealed `HANDSHAKE start`. Whoever hears a start first
/// answers with a clear-text `HANDSHAKE acknowledge`; hearing either
/// message pairs the listener with its sender.
#[derive(Debug)]
pub struct Handshake {
    state: PairingState,
    cipher: ShiftCipher,
    local: AgentId,
    teammate: Option<Teammate>,
}

impl Handshake {
    pub fn new(local: AgentId, cipher: ShiftCipher) -> Self {
        Self {
            state: PairingState::Unpaired,
            cipher,
            local,
            teammate: None,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn is_paired(&self) -> bool {
        self.state == PairingState::Paired
    }

    pub fn teammate(&self) -> Option<&Teammate> {
        self.teammate.as_ref()
    }

    /// Our id is only known after the first self report.
    pub fn set_local(&mut self, local: AgentId) {
        self.local = local;
    }

    /// The broadcast that opens the handshake.
    pub fn start(&mut self) -> Envelope {
        if self.state == PairingState::Unpaired {
            self.state = PairingState::Handshaking;
            debug!(agent = %self.local, "Handshake started");
        }
        Envelope::new(Template::HandshakeStart).sealed(&self.cipher)
    }

    /// Feed one incoming message.
    pub fn receive(&mut self, from: &AgentId, name: &str, envelope: &Envelope) -> HandshakeStep {
        if self.is_paired() || *from == self.local {
            return HandshakeStep::Ignored;
        }

        let envelope = envelope.clone().opened(&self.cipher);
        let reply = match envelope.template() {
            Some(Template::HandshakeStart) => Some(Envelope::new(Template::HandshakeAck)),
            Some(Template::HandshakeAck) => None,
            _ => return HandshakeStep::Ignored,
        };

        let teammate = Teammate {
            id: from.clone(),
            name: name.to_string(),
        };
        info!(agent = %self.local, teammate = %teammate.id, "Paired with teammate");
        self.state = PairingState::Paired;
        self.teammate = Some(teammate.clone());
        HandshakeStep::Paired { teammate, reply }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Handshake, Handshake) {
        (
            Handshake::new(AgentId::new("a"), ShiftCipher::default()),
            Handshake::new(AgentId::new("b"), ShiftCipher::default()),
        )
    }

    #[test]
    fn test_start_is_sealed() {
        let (mut a, _) = pair();
        let start = a.start();
        assert!(!start.safe);
        assert_ne!(start.msg, "HANDSHAKE start");
        assert_eq!(a.state(), PairingState::Handshaking);
    }

    #[test]
    fn test_start_then_acknowledge_pairs_both_sides() {
        let (mut a, mut b) = pair();
        let start = a.start();

        let step = b.receive(&AgentId::new("a"), "alice", &start);
        let HandshakeStep::Paired { teammate, reply } = step else {
            panic!("b should pair on start");
        };
        assert_eq!(teammate.id, AgentId::new("a"));
        let ack = reply.unwrap();
        assert!(ack.safe);
        assert!(ack.is(Template::HandshakeAck));

        let step = a.receive(&AgentId::new("b"), "bob", &ack);
        assert!(matches!(step, HandshakeStep::Paired { reply: None, .. }));
        assert_eq!(a.teammate().unwrap().name, "bob");
    }

    #[test]
    fn test_second_start_after_pairing_is_ignored() {
        let (mut a, mut b) = pair();
        let start_a = a.start();
        let start_b = b.start();

        b.receive(&AgentId::new("a"), "alice", &start_a);
        assert_eq!(
            b.receive(&AgentId::new("a"), "alice", &start_a),
            HandshakeStep::Ignored
        );
        assert!(matches!(
            a.receive(&AgentId::new("b"), "bob", &start_b),
            HandshakeStep::Paired { reply: Some(_), .. }
        ));
    }

    #[test]
    fn test_own_and_foreign_messages_are_ignored() {
        let (mut a, _) = pair();
        let own = a.start();
        assert_eq!(a.receive(&AgentId::new("a"), "alice", &own), HandshakeStep::Ignored);

        let chatter = Envelope::new(Template::InformState);
        assert_eq!(a.receive(&AgentId::new("c"), "carol", &chatter), HandshakeStep::Ignored);
        assert_eq!(a.state(), PairingState::Handshaking);
    }

    #[test]
    fn test_wrong_key_does_not_pair() {
        let mut a = Handshake::new(AgentId::new("a"), ShiftCipher::new(5));
        let mut eve = Handshake::new(AgentId::new("e"), ShiftCipher::new(7));
        let start = a.start();
        assert_eq!(eve.receive(&AgentId::new("a"), "alice", &start), HandshakeStep::Ignored);
    }
}
