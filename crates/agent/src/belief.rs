use std::collections::BTreeMap;

use tracing::{debug, warn};

use courier_core::{AgentId, AgentSettings, GameConfig, ParcelId, Position, Timestamp};
use courier_grid::{GridError, Occupancy, Tile, WorldMap};

use crate::types::{
    AgentSighting, BeliefSnapshot, Parcel, ParcelSighting, RivalAgent, SelfAgent, SelfReport,
};

/// What the agent currently believes about the game.
///
/// Entries are keyed by id in ordered maps so that option generation walks
/// them in a stable order.
#[derive(Debug, Clone, Default)]
pub struct BeliefStore {
    config: GameConfig,
    settings: AgentSettings,
    me: SelfAgent,
    map: WorldMap,
    parcels: BTreeMap<ParcelId, Parcel>,
    agents: BTreeMap<AgentId, RivalAgent>,
    now: Timestamp,
}

impl BeliefStore {
    pub fn new(settings: AgentSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn me(&self) -> &SelfAgent {
        &self.me
    }

    pub fn map(&self) -> &WorldMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut WorldMap {
        &mut self.map
    }

    /// Time of the latest sensing update.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn update_config(&mut self, config: GameConfig) {
        self.map
            .set_observation_distance(config.parcels_observation_distance);
        self.config = config;
    }

    pub fn load_map(&mut self, width: i32, height: i32, tiles: &[Tile]) -> Result<(), GridError> {
        let map = WorldMap::from_tiles(
            width,
            height,
            tiles,
            self.config.parcels_observation_distance,
            self.settings.high_density_threshold,
        )?;
        self.map = map;
        self.rebuild_overlay();
        Ok(())
    }

    pub fn set_map(&mut self, map: WorldMap) {
        self.map = map;
        self.rebuild_overlay();
    }

    /// Record our own status. A report without coordinates keeps the last
    /// known position.
    pub fn update_self(&mut self, report: SelfReport, now: Timestamp) {
        self.now = self.now.max(now);
        self.me.id = report.id;
        self.me.name = report.name;
        self.me.team_id = report.team_id;
        self.me.score = report.score;
        self.me.penalty = report.penalty;
        match (report.x, report.y) {
            (Some(x), Some(y)) => self.me.position = Position::rounded(x, y),
            _ => debug!(agent = %self.me.id, "Self report without coordinates"),
        }
    }

    /// Position confirmed by a successful move.
    pub fn set_position(&mut self, pos: Position) {
        self.me.position = pos;
    }

    /// Merge a batch of parcel sightings.
    ///
    /// Sighted parcels are replaced wholesale. A parcel missing from the
    /// batch is kept with a decayed reward only while it is worth keeping,
    /// recently seen and not last seen in someone's hands.
    pub fn update_parcels(&mut self, sightings: Vec<ParcelSighting>, now: Timestamp) {
        self.now = self.now.max(now);
        let mut next = BTreeMap::new();

        for sighting in sightings {
            let (Some(x), Some(y)) = (sighting.x, sighting.y) else {
                debug!(parcel = %sighting.id, "Dropping parcel sighting without coordinates");
                continue;
            };
            let parcel = Parcel {
                id: sighting.id.clone(),
                position: Position::rounded(x, y),
                reward: sighting.reward,
                sighted_reward: sighting.reward,
                carried_by: sighting.carried_by,
                last_seen: now,
            };
            next.insert(sighting.id, parcel);
        }

        let grace = self.settings.parcel_grace_ms;
        let floor = self.settings.min_retained_reward;
        for (id, mut parcel) in std::mem::take(&mut self.parcels) {
            if next.contains_key(&id) {
                continue;
            }
            let elapsed = now.since(parcel.last_seen);
            let reward = parcel.sighted_reward - self.config.decay_over(elapsed as f64);
            if reward > floor && elapsed < grace && !parcel.is_carried() {
                parcel.reward = reward;
                next.insert(id, parcel);
            } else {
                debug!(parcel = %id, reward, elapsed, "Forgetting parcel");
            }
        }

        self.parcels = next;
    }

    /// Merge a batch of agent sightings and refresh the occupancy overlay.
    pub fn update_agents(&mut self, sightings: Vec<AgentSighting>, now: Timestamp) {
        self.now = self.now.max(now);

        for sighting in sightings {
            if sighting.id == self.me.id {
                continue;
            }
            let (Some(x), Some(y)) = (sighting.x, sighting.y) else {
                debug!(agent = %sighting.id, "Dropping agent sighting without coordinates");
                continue;
            };
            self.agents.insert(
                sighting.id.clone(),
                RivalAgent {
                    id: sighting.id,
                    name: sighting.name,
                    x,
                    y,
                    score: sighting.score,
                    last_seen: now,
                },
            );
        }

        self.forget_stale_agents(now);
        self.rebuild_overlay();
    }

    fn forget_stale_agents(&mut self, now: Timestamp) {
        let memory = self.config.movement_duration * u64::from(self.settings.agent_memory_moves);
        self.agents.retain(|id, agent| {
            let keep = now.since(agent.last_seen) <= memory;
            if !keep {
                debug!(agent = %id, "Forgetting agent");
            }
            keep
        });
    }

    /// Fold a teammate's snapshot into our beliefs. An entry only replaces
    /// ours when it was observed more recently.
    pub fn merge(&mut self, snapshot: BeliefSnapshot, now: Timestamp) {
        self.now = self.now.max(now);

        if snapshot.me.id != self.me.id {
            let sender = RivalAgent {
                id: snapshot.me.id.clone(),
                name: snapshot.me.name.clone(),
                x: f64::from(snapshot.me.position.x),
                y: f64::from(snapshot.me.position.y),
                score: snapshot.me.score,
                last_seen: snapshot.time,
            };
            self.upsert_agent(sender);
        }

        for parcel in snapshot.parcels {
            let fresher = self
                .parcels
                .get(&parcel.id)
                .map_or(true, |local| parcel.last_seen > local.last_seen);
            if fresher {
                self.parcels.insert(parcel.id.clone(), parcel);
            }
        }

        for agent in snapshot.agents {
            if agent.id == self.me.id {
                continue;
            }
            self.upsert_agent(agent);
        }

        self.rebuild_overlay();
    }

    fn upsert_agent(&mut self, agent: RivalAgent) {
        let fresher = self
            .agents
            .get(&agent.id)
            .map_or(true, |local| agent.last_seen > local.last_seen);
        if fresher {
            self.agents.insert(agent.id.clone(), agent);
        }
    }

    /// Clear the overlay and mark every cell a known agent may occupy.
    pub fn rebuild_overlay(&mut self) {
        if !self.map.is_loaded() {
            return;
        }
        self.map.clear_overlay();
        for agent in self.agents.values() {
            for cell in agent.cells() {
                self.map.mark_occupied(cell, Occupancy::Agent);
            }
        }
    }

    pub fn parcel(&self, id: &ParcelId) -> Option<&Parcel> {
        self.parcels.get(id)
    }

    pub fn parcels(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.values()
    }

    pub fn agent(&self, id: &AgentId) -> Option<&RivalAgent> {
        self.agents.get(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &RivalAgent> {
        self.agents.values()
    }

    /// Parcels nobody is holding.
    pub fn free_parcels(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.values().filter(|p| !p.is_carried())
    }

    pub fn carried_by_me(&self) -> impl Iterator<Item = &Parcel> {
        let me = &self.me.id;
        self.parcels.values().filter(move |p| p.is_carried_by(me))
    }

    pub fn carried_reward(&self) -> f64 {
        self.carried_by_me().map(|p| p.reward).sum()
    }

    /// Mark parcels as picked up by us.
    pub fn mark_picked(&mut self, ids: &[ParcelId]) {
        let me = self.me.id.clone();
        let position = self.me.position;
        for id in ids {
            match self.parcels.get_mut(id) {
                Some(parcel) => {
                    parcel.carried_by = Some(me.clone());
                    parcel.position = position;
                }
                None => warn!(parcel = %id, "Picked up a parcel we did not know about"),
            }
        }
    }

    /// Parcels put down on a delivery tile are gone for good.
    pub fn mark_delivered(&mut self, ids: &[ParcelId]) {
        for id in ids {
            self.parcels.remove(id);
        }
    }

    /// Parcels put down off a delivery tile stay where we stand.
    pub fn mark_dropped(&mut self, ids: &[ParcelId]) {
        let position = self.me.position;
        for id in ids {
            if let Some(parcel) = self.parcels.get_mut(id) {
                parcel.carried_by = None;
                parcel.position = position;
            }
        }
    }

    pub fn snapshot(&self) -> BeliefSnapshot {
        BeliefSnapshot {
            me: self.me.clone(),
            time: self.now,
            parcels: self.parcels.values().cloned().collect(),
            agents: self.agents.values().cloned().collect(),
        }
    }
}
