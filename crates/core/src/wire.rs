use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cipher::ShiftCipher;
use crate::error::{CoreError, Result};

/// Literal message heads exchanged between teammates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    HandshakeStart,
    HandshakeAck,
    InformState,
    InformIntent,
    InformOk,
    InformChange,
    StopIntention,
    AlleywayAct,
    AlleywayOk,
}

impl Template {
    pub const ALL: [Template; 9] = [
        Template::HandshakeStart,
        Template::HandshakeAck,
        Template::InformState,
        Template::InformIntent,
        Template::InformOk,
        Template::InformChange,
        Template::StopIntention,
        Template::AlleywayAct,
        Template::AlleywayOk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Template::HandshakeStart => "HANDSHAKE start",
            Template::HandshakeAck => "HANDSHAKE acknowledge",
            Template::InformState => "INFORM state",
            Template::InformIntent => "INFORM intent",
            Template::InformOk => "INFORM ok",
            Template::InformChange => "INFORM change",
            Template::StopIntention => "STOP intention",
            Template::AlleywayAct => "ALLEYWAY act",
            Template::AlleywayOk => "ALLEYWAY ok",
        }
    }

    /// Token-wise comparison: same token count, every token equal.
    pub fn matches(&self, text: &str) -> bool {
        let received = text.split(' ');
        let expected = self.as_str().split(' ');
        received.clone().count() == expected.clone().count()
            && received.zip(expected).all(|(r, e)| r == e)
    }

    pub fn classify(text: &str) -> Option<Template> {
        Template::ALL.into_iter().find(|t| t.matches(text))
    }
}

/// A message as carried by the game's say/ask/shout channel.
///
/// `msg` holds the template text; any other field rides alongside it and is
/// ignored by template matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub msg: String,
    /// Set when `msg` travels in clear text.
    #[serde(default)]
    pub safe: bool,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    pub fn new(template: Template) -> Self {
        Self {
            msg: template.as_str().to_string(),
            safe: true,
            payload: Map::new(),
        }
    }

    /// Attach a payload field.
    pub fn with<T: Serialize>(mut self, key: &str, value: &T) -> Result<Self> {
        self.payload
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .payload
            .get(key)
            .ok_or_else(|| CoreError::MissingField(key.to_string()))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Like [`Envelope::field`] but treats an absent or null field as `None`.
    pub fn optional_field<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.payload.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    pub fn is(&self, template: Template) -> bool {
        template.matches(&self.msg)
    }

    pub fn template(&self) -> Option<Template> {
        Template::classify(&self.msg)
    }

    /// Obscure the template text for a broadcast.
    pub fn sealed(mut self, cipher: &ShiftCipher) -> Self {
        if self.safe {
            self.msg = cipher.encode(&self.msg);
            self.safe = false;
        }
        self
    }

    /// Undo [`Envelope::sealed`]; clear-text envelopes pass through.
    pub fn opened(mut self, cipher: &ShiftCipher) -> Self {
        if !self.safe {
            self.msg = cipher.decode(&self.msg);
            self.safe = true;
        }
        self
    }
}
