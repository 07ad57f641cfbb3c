#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use courier_agent::{AgentContext, AskReply, BeliefStore, ClientError, GameClient, SelfReport};
use courier_core::{AgentId, AgentSettings, Direction, Envelope, GameConfig, ParcelId, Position, Timestamp};
use courier_grid::{Layer, WorldMap};

/// Game server stand-in for one agent, recording everything it sends.
pub struct FakeWorld {
    map: WorldMap,
    state: Mutex<WorldState>,
}

#[derive(Default)]
pub struct WorldState {
    pub position: Position,
    pub parcels: BTreeMap<ParcelId, Option<Position>>,
    pub said: Vec<(AgentId, Envelope)>,
    pub asked: Vec<(AgentId, Envelope)>,
    pub shouted: Vec<Envelope>,
    pub replies: VecDeque<AskReply>,
    pub shout_fails: bool,
}

impl FakeWorld {
    pub fn queue_reply(&self, reply: AskReply) {
        self.state.lock().replies.push_back(reply);
    }

    pub fn drop_parcel(&self, id: &str, at: Position) {
        self.state.lock().parcels.insert(ParcelId::new(id), Some(at));
    }

    pub fn fail_shouts(&self, fail: bool) {
        self.state.lock().shout_fails = fail;
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&WorldState) -> T) -> T {
        f(&self.state.lock())
    }

    pub fn position(&self) -> Position {
        self.state.lock().position
    }
}

#[async_trait]
impl GameClient for FakeWorld {
    async fn move_dir(&self, direction: Direction) -> Result<Option<Position>, ClientError> {
        let mut state = self.state.lock();
        let next = state.position.step(direction);
        if !self.map.is_walkable(next, Layer::Static) {
            return Ok(None);
        }
        state.position = next;
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
        let carried: Vec<ParcelId> = state
            .parcels
            .iter()
            .filter(|(_, location)| location.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &carried {
            state.parcels.insert(id.clone(), Some(here));
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
        let mut state = self.state.lock();
        if state.shout_fails {
            return Err(ClientError::Transport("shout dropped".into()));
        }
        state.shouted.push(envelope);
        Ok(())
    }
}

/// An agent named `name` (also its id) standing on `start`. Parcels never
/// decay so priorities equal rewards.
pub fn agent(name: &str, rows: &str, start: Position) -> (Arc<FakeWorld>, AgentContext) {
    let map = WorldMap::from_ascii(rows, 5).unwrap();
    let world = Arc::new(FakeWorld {
        map: map.clone(),
        state: Mutex::new(WorldState {
            position: start,
            ..WorldState::default()
        }),
    });

    let mut beliefs = BeliefStore::new(AgentSettings::default());
    beliefs.update_config(GameConfig {
        parcel_decading_interval: f64::INFINITY,
        movement_duration: 10,
        ..GameConfig::default()
    });
    beliefs.set_map(map);
    beliefs.update_self(
        SelfReport {
            id: AgentId::new(name),
            name: name.into(),
            x: Some(f64::from(start.x)),
            y: Some(f64::from(start.y)),
            ..SelfReport::default()
        },
        Timestamp::from_millis(0),
    );

    let ctx = AgentContext::with_beliefs(world.clone(), AgentSettings::default(), beliefs)
        .with_seed(11);
    (world, ctx)
}
