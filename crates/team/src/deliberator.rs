use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use courier_agent::{
    AgentContext, AgentError, AgentRuntime, BeliefSnapshot, Deliberator, HandoffAction,
    IncomingMessage, IntentionScheduler, PlanLibrary, PlanSolver, Predicate, SoloDeliberator,
    Teammate, Trigger,
};
use courier_core::{Envelope, ShiftCipher, Template, TeamMode};

use crate::error::TeamError;
use crate::handshake::{Handshake, HandshakeStep};
use crate::negotiation::Negotiator;

/// Deliberation for an agent working with a partner.
///
/// Until the handshake completes the agent acts alone. Once paired, every
/// self update is broadcast to the teammate and goals are settled through
/// the [`Negotiator`].
pub struct TeamDeliberator {
    ctx: AgentContext,
    solo: SoloDeliberator,
    negotiator: Negotiator,
    handshake: Mutex<Handshake>,
    announced: AtomicBool,
}

impl TeamDeliberator {
    pub fn new(scheduler: Arc<IntentionScheduler>) -> Self {
        let ctx = scheduler.ctx().clone();
        let cipher = ShiftCipher::new(ctx.settings().secret_key);
        Self {
            handshake: Mutex::new(Handshake::new(Default::default(), cipher)),
            solo: SoloDeliberator::new(Arc::clone(&scheduler)),
            negotiator: Negotiator::new(scheduler),
            announced: AtomicBool::new(false),
            ctx,
        }
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    pub fn is_paired(&self) -> bool {
        self.handshake.lock().is_paired()
    }

    async fn sync_local_id(&self) {
        let id = self.ctx.beliefs().read().await.me().id.clone();
        self.handshake.lock().set_local(id);
    }

    async fn announce(&self) -> Result<(), TeamError> {
        if self.announced.load(Ordering::SeqCst) {
            return Ok(());
        }
        let start = self.handshake.lock().start();
        self.ctx.client().shout(start).await?;
        // only a delivered broadcast counts; a failed one is retried next round
        self.announced.store(true, Ordering::SeqCst);
        debug!("Handshake broadcast");
        Ok(())
    }

    async fn broadcast_state(&self, teammate: &Teammate) -> Result<(), TeamError> {
        let snapshot = self.ctx.beliefs().read().await.snapshot();
        let inform = Envelope::new(Template::InformState).with("state", &snapshot)?;
        self.ctx.client().say(&teammate.id, inform).await?;
        Ok(())
    }

    async fn on_teammate_message(
        &self,
        teammate: &Teammate,
        message: IncomingMessage,
    ) -> Result<(), TeamError> {
        let IncomingMessage {
            envelope, reply, ..
        } = message;

        match envelope.template() {
            Some(Template::InformState) => {
                let snapshot: BeliefSnapshot = envelope.field("state")?;
                self.negotiator.on_inform_state(teammate, snapshot).await
            }
            Some(Template::InformIntent) => {
                let intent: Predicate = envelope.field("intent")?;
                let answer = self.negotiator.evaluator_respond(intent).await?;
                match reply {
                    Some(reply) => {
                        if reply.send(answer).is_err() {
                            debug!(teammate = %teammate.id, "Proposer stopped waiting");
                        }
                    }
                    None => self.ctx.client().say(&teammate.id, answer).await?,
                }
                Ok(())
            }
            Some(Template::StopIntention) => {
                info!(teammate = %teammate.id, "Teammate broke the agreed plan");
                self.negotiator.on_stop_intention();
                Ok(())
            }
            Some(Template::AlleywayAct) => {
                let action: HandoffAction = envelope.field("action")?;
                match reply {
                    Some(reply) => self.negotiator.deliverer_acts(action, reply),
                    None => warn!(?action, "Hand-off request without a reply channel"),
                }
                Ok(())
            }
            _ => {
                debug!(msg = %envelope.msg, "Unhandled teammate message");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Deliberator for TeamDeliberator {
    async fn deliberate(&self, trigger: Trigger) -> Result<(), AgentError> {
        self.sync_local_id().await;

        match self.ctx.teammate() {
            None => {
                if let Err(e) = self.announce().await {
                    warn!(error = %e, "Handshake broadcast failed");
                }
                self.solo.push_best().await;
            }
            Some(teammate) => {
                if trigger == Trigger::SelfUpdated {
                    self.broadcast_state(&teammate).await?;
                }
            }
        }
        Ok(())
    }

    async fn on_message(&self, message: IncomingMessage) -> Result<(), AgentError> {
        self.sync_local_id().await;

        let Some(teammate) = self.ctx.teammate() else {
            let step = self
                .handshake
                .lock()
                .receive(&message.from, &message.name, &message.envelope);
            if let HandshakeStep::Paired { teammate, reply } = step {
                self.ctx.set_teammate(Some(teammate.clone()));
                if let Some(reply) = reply {
                    self.ctx
                        .client()
                        .say(&teammate.id, reply)
                        .await
                        .map_err(TeamError::from)?;
                }
            }
            return Ok(());
        };

        if message.from != teammate.id {
            debug!(from = %message.from, msg = %message.envelope.msg, "Ignoring non-teammate message");
            return Ok(());
        }
        self.on_teammate_message(&teammate, message).await?;
        Ok(())
    }
}

/// A paired agent. Plans match [`AgentRuntime::solo`].
pub fn team_runtime(ctx: AgentContext, solver: Option<Arc<dyn PlanSolver>>) -> AgentRuntime {
    let solver = solver.filter(|_| ctx.settings().use_pddl);
    let library = Arc::new(PlanLibrary::standard(solver));
    let scheduler = Arc::new(IntentionScheduler::new(ctx, library));
    let deliberator = Arc::new(TeamDeliberator::new(Arc::clone(&scheduler)));
    AgentRuntime::new(scheduler, deliberator)
}

/// Solo or team runtime according to the configured mode.
pub fn runtime_for(ctx: AgentContext, solver: Option<Arc<dyn PlanSolver>>) -> AgentRuntime {
    match ctx.settings().mode {
        TeamMode::Solo => AgentRuntime::solo(ctx, solver),
        TeamMode::Team => team_runtime(ctx, solver),
    }
}
