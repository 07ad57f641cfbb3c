use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

use courier_core::{IntentionId, Position, Timestamp};

use crate::context::AgentContext;
use crate::error::PlanError;
use crate::options::{Predicate, PredicateKind};
use crate::plan::{PlanLibrary, PlanScope};
use crate::stop::StopToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentionStatus {
    Pending,
    Running,
    Succeeded,
    Failed { reason: String },
    Stopped,
}

impl IntentionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentionStatus::Succeeded | IntentionStatus::Failed { .. } | IntentionStatus::Stopped
        )
    }
}

/// A committed goal plus the machinery to pursue it.
///
/// The predicate's priority may be raised or lowered while queued; the
/// rest of the predicate is fixed at creation.
#[derive(Debug)]
pub struct Intention {
    id: IntentionId,
    predicate: RwLock<Predicate>,
    token: StopToken,
    started: AtomicBool,
    status: watch::Sender<IntentionStatus>,
    created_at: Timestamp,
}

impl Intention {
    pub fn new(predicate: Predicate) -> Self {
        Self::with_token(predicate, StopToken::new())
    }

    /// An intention cancelled together with `token`'s owner.
    pub fn with_token(predicate: Predicate, token: StopToken) -> Self {
        let (status, _) = watch::channel(IntentionStatus::Pending);
        Self {
            id: IntentionId::new(),
            predicate: RwLock::new(predicate),
            token,
            started: AtomicBool::new(false),
            status,
            created_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> IntentionId {
        self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate.read().clone()
    }

    pub fn kind(&self) -> PredicateKind {
        self.predicate.read().kind
    }

    pub fn key(&self) -> (PredicateKind, Option<Position>) {
        self.predicate.read().key()
    }

    pub fn priority(&self) -> f64 {
        self.predicate.read().priority
    }

    pub fn set_priority(&self, priority: f64) {
        self.predicate.write().priority = priority;
    }

    pub fn status(&self) -> IntentionStatus {
        self.status.borrow().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_stopped()
    }

    /// Stopped or settled; either way it will not run again.
    pub fn is_done(&self) -> bool {
        self.is_stopped() || self.status.borrow().is_terminal()
    }

    pub fn token(&self) -> &StopToken {
        &self.token
    }

    /// Request cancellation; the running plan notices at its next
    /// checkpoint.
    pub fn stop(&self) {
        if !self.token.is_stopped() {
            debug!(intention = %self.id, predicate = %self.predicate.read(), "Stopping intention");
        }
        self.token.stop();
    }

    /// Wait until the intention reaches a terminal status, or is stopped
    /// before it ever started, in which case it stays `Pending`.
    pub async fn finished(&self) -> IntentionStatus {
        let mut rx = self.status.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            let changed = if current == IntentionStatus::Pending {
                if self.is_stopped() {
                    return current;
                }
                tokio::select! {
                    changed = rx.changed() => changed,
                    _ = self.token.stopped() => Ok(()),
                }
            } else {
                rx.changed().await
            };
            if changed.is_err() {
                return self.status();
            }
        }
    }

    /// Pursue the goal by trying the library's plans for its kind in order.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    pub async fn achieve(
        &self,
        ctx: &AgentContext,
        library: &PlanLibrary,
    ) -> Result<(), PlanError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // dropped before it ever ran
        if self.token.is_stopped() {
            return Err(PlanError::Stopped);
        }
        self.status.send_replace(IntentionStatus::Running);

        let predicate = self.predicate();
        let outcome = self.run_plans(&predicate, ctx, library).await;

        let status = match &outcome {
            Ok(()) => IntentionStatus::Succeeded,
            Err(e) if e.is_cancellation() => IntentionStatus::Stopped,
            Err(e) => IntentionStatus::Failed {
                reason: e.to_string(),
            },
        };
        info!(intention = %self.id, predicate = %predicate, status = ?status, "Intention finished");
        self.status.send_replace(status);
        outcome
    }

    async fn run_plans(
        &self,
        predicate: &Predicate,
        ctx: &AgentContext,
        library: &PlanLibrary,
    ) -> Result<(), PlanError> {
        for plan in library.plans_for(predicate.kind) {
            self.token.check()?;
            if !plan.is_applicable(predicate) {
                continue;
            }

            let scope = PlanScope::new(ctx, library, &self.token);
            match plan.execute(predicate, &scope).await {
                Ok(()) => {
                    debug!(intention = %self.id, plan = plan.name(), "Plan succeeded");
                    return Ok(());
                }
                Err(e) if e.is_cancellation() || self.token.is_stopped() => {
                    return Err(PlanError::Stopped);
                }
                Err(e) => {
                    debug!(
                        intention = %self.id,
                        plan = plan.name(),
                        error = %e,
                        "Plan failed, trying next"
                    );
                }
            }
        }

        self.token.check()?;
        Err(PlanError::NoPlanSatisfied(predicate.kind))
    }
}
