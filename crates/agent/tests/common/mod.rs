#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use courier_agent::{AskReply, ClientError, GameClient};
use courier_core::{AgentId, Direction, Envelope, ParcelId, Position};
use courier_grid::{Layer, TileKind, WorldMap};

/// In-memory stand-in for the game server, tracking one agent.
pub struct FakeWorld {
    map: WorldMap,
    state: Mutex<WorldState>,
}

#[derive(Default)]
pub struct WorldState {
    pub position: Position,
    /// Parcel location, or `None` while carried.
    pub parcels: BTreeMap<ParcelId, Option<Position>>,
    pub delivered: Vec<ParcelId>,
    pub moves: Vec<Direction>,
    pub blocked: HashSet<Position>,
    pub said: Vec<(AgentId, Envelope)>,
    pub asked: Vec<(AgentId, Envelope)>,
    pub shouted: Vec<Envelope>,
    pub replies: VecDeque<AskReply>,
}

impl FakeWorld {
    pub fn new(map: WorldMap, start: Position) -> Arc<Self> {
        Arc::new(Self {
            map,
            state: Mutex::new(WorldState {
                position: start,
                ..WorldState::default()
            }),
        })
    }

    pub fn drop_parcel(&self, id: &str, at: Position) {
        self.state.lock().parcels.insert(ParcelId::new(id), Some(at));
    }

    /// Put a parcel straight into the agent's hands.
    pub fn carry(&self, id: &str) {
        self.state.lock().parcels.insert(ParcelId::new(id), None);
    }

    pub fn block(&self, at: Position) {
        self.state.lock().blocked.insert(at);
    }

    pub fn queue_reply(&self, reply: AskReply) {
        self.state.lock().replies.push_back(reply);
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&WorldState) -> T) -> T {
        f(&self.state.lock())
    }

    pub fn position(&self) -> Position {
        self.state.lock().position
    }

    pub fn moves(&self) -> Vec<Direction> {
        self.state.lock().moves.clone()
    }
}

#[async_trait]
impl GameClient for FakeWorld {
    async fn move_dir(&self, direction: Direction) -> Result<Option<Position>, ClientError> {
        let mut state = self.state.lock();
        let next = state.position.step(direction);
        if !self.map.is_walkable(next, Layer::Static) || state.blocked.contains(&next) {
            return Ok(None);
        }
        state.position = next;
        state.moves.push(direction);
        Ok(Some(next))
    }

    async fn pickup(&self) -> Result<Vec<ParcelId>, ClientError> {
        let mut state = self.state.lock();
        let here = state.position;
        let mut picked = Vec::new();
        for (id, location) in state.parcels.iter_mut() {
            if *location == Some(here) {
                *location = None;
                picked.push(id.clone());
            }
        }
        Ok(picked)
    }

    async fn putdown(&self) -> Result<Vec<ParcelId>, ClientError> {
        let mut state = self.state.lock();
        let here = state.position;
        let on_delivery = self.map.tile(here) == Some(TileKind::Delivery);
        let carried: Vec<ParcelId> = state
            .parcels
            .iter()
            .filter(|(_, location)| location.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &carried {
            if on_delivery {
                state.parcels.remove(id);
                state.delivered.push(id.clone());
            } else {
                state.parcels.insert(id.clone(), Some(here));
            }
        }
        Ok(carried)
    }

    async fn say(&self, to: &AgentId, envelope: Envelope) -> Result<(), ClientError> {
        self.state.lock().said.push((to.clone(), envelope));
        Ok(())
    }

    async fn ask(
        &self,
        to: &AgentId,
        envelope: Envelope,
        _timeout: Duration,
    ) -> Result<AskReply, ClientError> {
        let mut state = self.state.lock();
        state.asked.push((to.clone(), envelope));
        Ok(state.replies.pop_front().unwrap_or(AskReply::Timeout))
    }

    async fn shout(&self, envelope: Envelope) -> Result<(), ClientError> {
        self.state.lock().shouted.push(envelope);
        Ok(())
    }
}
