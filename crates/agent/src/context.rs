use parking_lot::Mutex;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use courier_core::{AgentSettings, Direction, Position};

use crate::belief::BeliefStore;
use crate::error::PlanError;
use crate::traits::GameClient;
use crate::types::Teammate;

/// Shared handles every plan and deliberator works through.
#[derive(Clone)]
pub struct AgentContext {
    beliefs: Arc<RwLock<BeliefStore>>,
    client: Arc<dyn GameClient>,
    settings: Arc<AgentSettings>,
    teammate: Arc<parking_lot::RwLock<Option<Teammate>>>,
    rng: Arc<Mutex<StdRng>>,
}

impl AgentContext {
    pub fn new(client: Arc<dyn GameClient>, settings: AgentSettings) -> Self {
        let beliefs = BeliefStore::new(settings.clone());
        Self::with_beliefs(client, settings, beliefs)
    }

    pub fn with_beliefs(
        client: Arc<dyn GameClient>,
        settings: AgentSettings,
        beliefs: BeliefStore,
    ) -> Self {
        Self {
            beliefs: Arc::new(RwLock::new(beliefs)),
            client,
            settings: Arc::new(settings),
            teammate: Arc::new(parking_lot::RwLock::new(None)),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Fix the random source, for reproducible idle and random-walk choices.
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn beliefs(&self) -> &Arc<RwLock<BeliefStore>> {
        &self.beliefs
    }

    pub fn client(&self) -> &Arc<dyn GameClient> {
        &self.client
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn teammate(&self) -> Option<Teammate> {
        self.teammate.read().clone()
    }

    pub fn set_teammate(&self, teammate: Option<Teammate>) {
        *self.teammate.write() = teammate;
    }

    /// Run `f` against the shared random source.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        f(&mut self.rng.lock())
    }

    /// Weighted random pick among the best idle candidates, skipping
    /// `avoid`.
    pub fn pick_idle_target(
        &self,
        beliefs: &BeliefStore,
        avoid: Option<Position>,
    ) -> Option<Position> {
        let candidates: Vec<(Position, f64)> = beliefs
            .map()
            .idle_candidates(
                beliefs.me().position,
                self.settings.staleness_weight,
                self.settings.idle_top_n,
            )
            .into_iter()
            .filter(|(pos, _)| Some(*pos) != avoid)
            .collect();
        let (first, _) = *candidates.first()?;

        let weights = candidates.iter().map(|(_, weight)| weight.max(0.0));
        match WeightedIndex::new(weights) {
            Ok(dist) => Some(candidates[self.with_rng(|rng| dist.sample(rng))].0),
            Err(_) => Some(first),
        }
    }

    pub async fn position(&self) -> Position {
        self.beliefs.read().await.me().position
    }

    /// One move through the client. A confirmed move updates our position
    /// right away instead of waiting for the next self report.
    pub async fn step(&self, direction: Direction) -> Result<Position, PlanError> {
        match self.client.move_dir(direction).await? {
            Some(position) => {
                self.beliefs.write().await.set_position(position);
                Ok(position)
            }
            None => {
                debug!(direction = %direction, "Move rejected");
                Err(PlanError::ActionRejected(format!("move {direction}")))
            }
        }
    }
}
