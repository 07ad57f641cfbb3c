use serde::{Deserialize, Serialize};

use courier_core::{AgentId, ParcelId, Position, Timestamp};

/// The server's report about this agent.
///
/// Coordinates are fractional while a move is in flight and may be missing
/// altogether in malformed reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelfReport {
    pub id: AgentId,
    pub name: String,
    pub team_id: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub score: f64,
    pub penalty: f64,
}

/// A parcel as sensed this instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelSighting {
    pub id: ParcelId,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub carried_by: Option<AgentId>,
    pub reward: f64,
}

impl ParcelSighting {
    pub fn new(id: impl Into<String>, x: f64, y: f64, reward: f64) -> Self {
        Self {
            id: ParcelId::new(id),
            x: Some(x),
            y: Some(y),
            carried_by: None,
            reward,
        }
    }

    pub fn carried_by(mut self, agent: AgentId) -> Self {
        self.carried_by = Some(agent);
        self
    }
}

/// Another agent as sensed this instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSighting {
    pub id: AgentId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub score: f64,
}

impl AgentSighting {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: AgentId::new(id),
            x: Some(x),
            y: Some(y),
            score: 0.0,
        }
    }
}

/// A remembered parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: ParcelId,
    pub position: Position,
    /// Reward as last observed or as decayed since.
    pub reward: f64,
    /// Reward at the moment of the last sighting.
    pub sighted_reward: f64,
    pub carried_by: Option<AgentId>,
    pub last_seen: Timestamp,
}

impl Parcel {
    pub fn is_carried(&self) -> bool {
        self.carried_by.is_some()
    }

    pub fn is_carried_by(&self, agent: &AgentId) -> bool {
        self.carried_by.as_ref() == Some(agent)
    }
}

/// A remembered agent other than this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RivalAgent {
    pub id: AgentId,
    pub name: String,
    /// Raw coordinates; fractional while the agent is mid-step.
    pub x: f64,
    pub y: f64,
    pub score: f64,
    pub last_seen: Timestamp,
}

impl RivalAgent {
    pub fn position(&self) -> Position {
        Position::rounded(self.x, self.y)
    }

    /// Cells this agent may currently occupy.
    pub fn cells(&self) -> Vec<Position> {
        Position::spanned(self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfAgent {
    pub id: AgentId,
    pub name: String,
    pub team_id: Option<String>,
    pub position: Position,
    pub score: f64,
    pub penalty: f64,
}

/// The partner agent once the handshake has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teammate {
    pub id: AgentId,
    pub name: String,
}

/// Serializable copy of the belief state exchanged with a teammate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeliefSnapshot {
    pub me: SelfAgent,
    pub time: Timestamp,
    pub parcels: Vec<Parcel>,
    pub agents: Vec<RivalAgent>,
}
