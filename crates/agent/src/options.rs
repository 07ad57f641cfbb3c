use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use courier_core::{Direction, ParcelId, Position};
use courier_grid::{find_path, Layer};

use crate::belief::BeliefStore;
use crate::types::Parcel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    PickUp,
    Deliver,
    Idle,
    MoveTo,
    Alleyway,
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredicateKind::PickUp => "go_pick_up",
            PredicateKind::Deliver => "go_deliver",
            PredicateKind::Idle => "idle",
            PredicateKind::MoveTo => "go_to",
            PredicateKind::Alleyway => "alleyway",
        };
        f.write_str(name)
    }
}

/// One step the deliverer performs on request during a hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "act", content = "direction")]
pub enum HandoffAction {
    Move(Direction),
    PickUp,
    PutDown,
}

/// Role-specific payload of an alleyway predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlleywayTask {
    /// Carry the parcel at `parcel` toward `delivery` and hand it over
    /// midway.
    Collect { parcel: Position, delivery: Position },
    /// Carry out one step for the collector.
    Act(HandoffAction),
}

/// A goal the agent can commit to.
///
/// Two predicates denote the same goal when their [`key`](Predicate::key)
/// matches; priority and route are not part of the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub kind: PredicateKind,
    pub target: Option<Position>,
    #[serde(with = "priority_serde")]
    pub priority: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parcel: Option<ParcelId>,
    /// Pre-agreed route; when present it must be followed as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Direction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alleyway: Option<AlleywayTask>,
}

impl Predicate {
    fn new(kind: PredicateKind, target: Option<Position>, priority: f64) -> Self {
        Self {
            kind,
            target,
            priority,
            parcel: None,
            path: None,
            alleyway: None,
        }
    }

    pub fn pick_up(parcel: ParcelId, target: Position, priority: f64) -> Self {
        Self {
            parcel: Some(parcel),
            ..Self::new(PredicateKind::PickUp, Some(target), priority)
        }
    }

    /// Pick up whatever lies at `target`.
    pub fn pick_up_at(target: Position) -> Self {
        Self::new(PredicateKind::PickUp, Some(target), 0.0)
    }

    pub fn deliver(target: Position, priority: f64) -> Self {
        Self::new(PredicateKind::Deliver, Some(target), priority)
    }

    pub fn idle() -> Self {
        Self::new(PredicateKind::Idle, None, f64::NEG_INFINITY)
    }

    pub fn move_to(target: Position) -> Self {
        Self::new(PredicateKind::MoveTo, Some(target), 0.0)
    }

    pub fn collect(parcel: Position, delivery: Position, priority: f64) -> Self {
        Self {
            alleyway: Some(AlleywayTask::Collect { parcel, delivery }),
            ..Self::new(PredicateKind::Alleyway, Some(parcel), priority)
        }
    }

    pub fn handoff(action: HandoffAction, priority: f64) -> Self {
        Self {
            alleyway: Some(AlleywayTask::Act(action)),
            ..Self::new(PredicateKind::Alleyway, None, priority)
        }
    }

    pub fn with_path(mut self, path: Option<Vec<Direction>>) -> Self {
        self.path = path;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Identity used for queue deduplication. All idle predicates share
    /// one key.
    pub fn key(&self) -> (PredicateKind, Option<Position>) {
        match self.kind {
            PredicateKind::Idle => (PredicateKind::Idle, None),
            kind => (kind, self.target),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{} {}", self.kind, target),
            None => write!(f, "{}", self.kind),
        }
    }
}

// JSON has no infinities; the idle priority travels as null.
mod priority_serde {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// Priority of picking up `parcel`, or `None` when no live path reaches it.
///
/// The expected reward loss on the way grows with the number of parcels
/// already carried, since all of them decay while walking. The priority is
/// halved once if any known agent is closer on the static layer.
pub fn pickup_priority(beliefs: &BeliefStore, parcel: &Parcel) -> Option<f64> {
    let map = beliefs.map();
    let here = beliefs.me().position;
    let path = find_path(map, here, parcel.position, Layer::Live)?;
    let distance = path.len();

    let config = beliefs.config();
    let carried = beliefs.carried_by_me().count();
    let travel_ms = (distance as u64 * config.movement_duration) as f64;
    let loss = config.decay_over(travel_ms) * (1 + carried) as f64;
    let mut priority = parcel.reward - loss;

    let rival_closer = beliefs.agents().any(|agent| {
        find_path(map, agent.position(), parcel.position, Layer::Static)
            .is_some_and(|rival_path| rival_path.len() < distance)
    });
    if rival_closer {
        priority /= 2.0;
    }

    Some(priority)
}

/// Priority of delivering everything we carry to `tile`, measured along
/// the static layer.
pub fn delivery_priority(beliefs: &BeliefStore, tile: Position) -> Option<f64> {
    let path = find_path(beliefs.map(), beliefs.me().position, tile, Layer::Static)?;
    let config = beliefs.config();
    let travel_ms = (path.len() as u64 * config.movement_duration) as f64;
    Some(beliefs.carried_reward() - config.decay_over(travel_ms))
}

/// Enumerate every goal worth considering right now.
///
/// Always ends with the idle fallback, so the result is never empty.
pub fn generate_options(beliefs: &BeliefStore) -> Vec<Predicate> {
    let mut options = Vec::new();

    for parcel in beliefs.free_parcels() {
        if let Some(priority) = pickup_priority(beliefs, parcel) {
            options.push(Predicate::pick_up(
                parcel.id.clone(),
                parcel.position,
                priority,
            ));
        }
    }

    if beliefs.carried_by_me().next().is_some() {
        let reachable = beliefs
            .map()
            .reachable_from(beliefs.me().position, Layer::Live);
        for tile in reachable.delivery_tiles {
            if let Some(priority) = delivery_priority(beliefs, tile) {
                options.push(Predicate::deliver(tile, priority));
            }
        }
    }

    options.push(Predicate::idle());
    options
}

/// The highest-priority option; the first one wins ties.
pub fn filter_options(options: &[Predicate]) -> Option<&Predicate> {
    options.iter().fold(None, |best: Option<&Predicate>, option| match best {
        Some(current) if current.priority >= option.priority => Some(current),
        _ => Some(option),
    })
}
