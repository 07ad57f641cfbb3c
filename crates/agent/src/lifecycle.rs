use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use courier_core::{GameConfig, Timestamp};
use courier_grid::Tile;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::options::{filter_options, generate_options};
use crate::plan::{PlanLibrary, PlanSolver};
use crate::scheduler::IntentionScheduler;
use crate::stop::StopToken;
use crate::traits::{Deliberator, IncomingMessage};
use crate::types::{AgentSighting, ParcelSighting, SelfReport};

/// Something the environment told us.
#[derive(Debug)]
pub enum SensingEvent {
    Config(GameConfig),
    Map {
        width: i32,
        height: i32,
        tiles: Vec<Tile>,
    },
    You(SelfReport),
    Parcels(Vec<ParcelSighting>),
    Agents(Vec<AgentSighting>),
    Message(IncomingMessage),
}

/// Which belief update prompted a deliberation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    SelfUpdated,
    ParcelsSensed,
    AgentsSensed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

pub struct AgentHandle {
    state: Arc<RwLock<AgentState>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    scheduler: Arc<IntentionScheduler>,
}

impl AgentHandle {
    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    pub async fn is_running(&self) -> bool {
        *self.state.read().await == AgentState::Running
    }

    pub fn scheduler(&self) -> &Arc<IntentionScheduler> {
        &self.scheduler
    }

    /// Stop sensing, stop the running intention and wait for both loops.
    pub async fn stop(mut self) -> Result<(), AgentError> {
        info!("Stopping agent");
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(Duration::from_secs(5), self.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AgentError::ShutdownFailed(e.to_string())),
            Err(_) => {
                warn!("Agent stop timed out");
                Err(AgentError::ShutdownFailed("Timeout".to_string()))
            }
        }
    }
}

/// Wires sensing into beliefs, beliefs into deliberation and the
/// intention queue into plan execution.
pub struct AgentRuntime {
    ctx: AgentContext,
    scheduler: Arc<IntentionScheduler>,
    deliberator: Arc<dyn Deliberator>,
}

impl AgentRuntime {
    pub fn new(scheduler: Arc<IntentionScheduler>, deliberator: Arc<dyn Deliberator>) -> Self {
        Self {
            ctx: scheduler.ctx().clone(),
            scheduler,
            deliberator,
        }
    }

    /// A single agent that always chases its own best option.
    pub fn solo(ctx: AgentContext, solver: Option<Arc<dyn PlanSolver>>) -> Self {
        let solver = solver.filter(|_| ctx.settings().use_pddl);
        let library = Arc::new(PlanLibrary::standard(solver));
        let scheduler = Arc::new(IntentionScheduler::new(ctx, library));
        let deliberator = Arc::new(SoloDeliberator::new(Arc::clone(&scheduler)));
        Self::new(scheduler, deliberator)
    }

    pub fn ctx(&self) -> &AgentContext {
        &self.ctx
    }

    pub fn scheduler(&self) -> &Arc<IntentionScheduler> {
        &self.scheduler
    }

    /// Fold one event into beliefs. Returns the trigger to deliberate on,
    /// if any.
    pub async fn apply(&self, event: SensingEvent) -> Result<Option<Trigger>, AgentError> {
        let now = Timestamp::now();
        match event {
            SensingEvent::Config(config) => {
                debug!(?config, "Game config received");
                self.ctx.beliefs().write().await.update_config(config);
                Ok(None)
            }
            SensingEvent::Map {
                width,
                height,
                tiles,
            } => {
                self.ctx
                    .beliefs()
                    .write()
                    .await
                    .load_map(width, height, &tiles)?;
                info!(width, height, "Map loaded");
                Ok(None)
            }
            SensingEvent::You(report) => {
                self.ctx.beliefs().write().await.update_self(report, now);
                Ok(Some(Trigger::SelfUpdated))
            }
            SensingEvent::Parcels(sightings) => {
                self.ctx
                    .beliefs()
                    .write()
                    .await
                    .update_parcels(sightings, now);
                Ok(Some(Trigger::ParcelsSensed))
            }
            SensingEvent::Agents(sightings) => {
                self.ctx
                    .beliefs()
                    .write()
                    .await
                    .update_agents(sightings, now);
                Ok(Some(Trigger::AgentsSensed))
            }
            SensingEvent::Message(message) => {
                self.deliberator.on_message(message).await?;
                Ok(None)
            }
        }
    }

    pub async fn handle(&self, event: SensingEvent) {
        match self.apply(event).await {
            Ok(Some(trigger)) => {
                if let Err(e) = self.deliberator.deliberate(trigger).await {
                    warn!(?trigger, error = %e, "Deliberation error");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Sensing event error"),
        }
    }

    pub fn start(self, events: mpsc::Receiver<SensingEvent>) -> AgentHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let state = Arc::new(RwLock::new(AgentState::Starting));
        let scheduler = Arc::clone(&self.scheduler);

        let loop_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            let result = run_agent_loop(self, events, stop_rx, Arc::clone(&loop_state)).await;
            if let Err(e) = result {
                error!(error = %e, "Agent failed");
                *loop_state.write().await = AgentState::Failed;
            } else {
                *loop_state.write().await = AgentState::Stopped;
            }
        });

        AgentHandle {
            state,
            stop_tx: Some(stop_tx),
            task,
            scheduler,
        }
    }
}

async fn run_agent_loop(
    runtime: AgentRuntime,
    mut events: mpsc::Receiver<SensingEvent>,
    mut stop_rx: oneshot::Receiver<()>,
    state: Arc<RwLock<AgentState>>,
) -> Result<(), AgentError> {
    let shutdown = StopToken::new();
    let intention_loop = {
        let scheduler = Arc::clone(&runtime.scheduler);
        let token = shutdown.clone();
        tokio::spawn(async move { scheduler.run(token).await })
    };

    *state.write().await = AgentState::Running;
    debug!("Agent running");

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                *state.write().await = AgentState::Stopping;
                break;
            }

            event = events.recv() => match event {
                Some(event) => runtime.handle(event).await,
                None => {
                    debug!("Sensing channel closed");
                    *state.write().await = AgentState::Stopping;
                    break;
                }
            }
        }
    }

    shutdown.stop();
    runtime.scheduler.stop_all();
    intention_loop
        .await
        .map_err(|e| AgentError::ShutdownFailed(e.to_string()))
}

/// Pushes the single best option after every belief update.
pub struct SoloDeliberator {
    scheduler: Arc<IntentionScheduler>,
}

impl SoloDeliberator {
    pub fn new(scheduler: Arc<IntentionScheduler>) -> Self {
        Self { scheduler }
    }

    /// Generate options, pick the best and queue it.
    pub async fn push_best(&self) {
        let best = {
            let beliefs = self.scheduler.ctx().beliefs().read().await;
            if !beliefs.map().is_loaded() {
                return;
            }
            let options = generate_options(&beliefs);
            filter_options(&options).cloned()
        };
        if let Some(best) = best {
            self.scheduler.push(best);
        }
    }
}

#[async_trait]
impl Deliberator for SoloDeliberator {
    async fn deliberate(&self, _trigger: Trigger) -> Result<(), AgentError> {
        self.push_best().await;
        Ok(())
    }
}
