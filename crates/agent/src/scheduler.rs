use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use courier_core::IntentionId;

use crate::context::AgentContext;
use crate::intention::Intention;
use crate::options::{Predicate, PredicateKind};
use crate::plan::PlanLibrary;
use crate::stop::StopToken;

/// Priority queue of intentions executed one at a time, head first.
///
/// The queue lock is never held across an await, so `push` can be called
/// from deliberation while the head is running.
pub struct IntentionScheduler {
    queue: Mutex<Vec<Arc<Intention>>>,
    wake: Notify,
    ctx: AgentContext,
    library: Arc<PlanLibrary>,
}

impl IntentionScheduler {
    pub fn new(ctx: AgentContext, library: Arc<PlanLibrary>) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            wake: Notify::new(),
            ctx,
            library,
        }
    }

    pub fn ctx(&self) -> &AgentContext {
        &self.ctx
    }

    pub fn library(&self) -> &Arc<PlanLibrary> {
        &self.library
    }

    /// Queue `predicate`, or refresh the priority of the queued intention
    /// with the same key.
    ///
    /// The queue is kept sorted by descending priority; equal priorities
    /// keep their insertion order. If the head changes, a running old head
    /// is stopped and the loop picks up the new one once it unwinds. An old
    /// head that never started is dropped from the queue still Pending.
    pub fn push(&self, predicate: Predicate) -> Arc<Intention> {
        let mut queue = self.queue.lock();
        let previous_head = queue.first().cloned();
        let key = predicate.key();

        // an entry on its way out cannot absorb a new goal
        queue.retain(|i| !(i.is_done() && i.key() == key));

        let handle = match queue.iter().find(|i| i.key() == key) {
            Some(existing) => {
                existing.set_priority(predicate.priority);
                Arc::clone(existing)
            }
            None => {
                let intention = Arc::new(Intention::new(predicate));
                queue.push(Arc::clone(&intention));
                intention
            }
        };

        queue.sort_by(|a, b| b.priority().total_cmp(&a.priority()));

        if let Some(previous) = previous_head {
            let head_changed = queue.first().map_or(true, |head| head.key() != previous.key());
            if head_changed {
                if previous.is_started() {
                    info!(
                        previous = %previous.predicate(),
                        "Preempting intention"
                    );
                } else {
                    debug!(previous = %previous.predicate(), "Dropping unstarted intention");
                    queue.retain(|i| i.id() != previous.id());
                }
                previous.stop();
            }
        }
        drop(queue);

        self.wake.notify_one();
        handle
    }

    /// Whether the head is still worth pursuing given current beliefs.
    pub async fn is_valid(&self, intention: &Intention) -> bool {
        let predicate = intention.predicate();
        let beliefs = self.ctx.beliefs().read().await;
        match predicate.kind {
            PredicateKind::PickUp => match &predicate.parcel {
                Some(id) => beliefs.parcel(id).is_some_and(|p| !p.is_carried()),
                None => true,
            },
            PredicateKind::Deliver => beliefs.carried_by_me().next().is_some(),
            _ => true,
        }
    }

    /// Execute intentions until `shutdown` is stopped.
    pub async fn run(&self, shutdown: StopToken) {
        info!("Intention loop started");
        loop {
            if shutdown.is_stopped() {
                break;
            }

            let head = self.queue.lock().first().cloned();
            let Some(intention) = head else {
                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = shutdown.stopped() => break,
                }
                continue;
            };

            if intention.is_stopped() {
                self.remove(intention.id());
                continue;
            }

            if !self.is_valid(&intention).await {
                debug!(predicate = %intention.predicate(), "Discarding stale intention");
                intention.stop();
                self.remove(intention.id());
                continue;
            }

            match intention.achieve(&self.ctx, &self.library).await {
                Ok(()) => debug!(predicate = %intention.predicate(), "Intention achieved"),
                Err(e) if e.is_cancellation() => {
                    debug!(predicate = %intention.predicate(), "Intention stopped")
                }
                Err(e) => warn!(predicate = %intention.predicate(), error = %e, "Intention failed"),
            }
            self.remove(intention.id());

            tokio::task::yield_now().await;
        }
        self.stop_all();
        info!("Intention loop stopped");
    }

    fn remove(&self, id: IntentionId) {
        self.queue.lock().retain(|i| i.id() != id);
    }

    pub fn head(&self) -> Option<Arc<Intention>> {
        self.queue.lock().first().cloned()
    }

    /// Stop whatever is at the head without queueing anything else.
    pub fn stop_head(&self) {
        if let Some(head) = self.head() {
            head.stop();
        }
    }

    /// Stop and drop every queued intention.
    pub fn stop_all(&self) {
        let drained: Vec<_> = std::mem::take(&mut *self.queue.lock());
        for intention in drained {
            intention.stop();
        }
    }

    /// Stop and drop every queued intention whose kind is not in `keep`.
    pub fn stop_except(&self, keep: &[PredicateKind]) {
        let mut dropped = Vec::new();
        self.queue.lock().retain(|i| {
            let keep = keep.contains(&i.kind());
            if !keep {
                dropped.push(Arc::clone(i));
            }
            keep
        });
        for intention in dropped {
            intention.stop();
        }
    }

    /// Whether an intention of `kind` is queued and not yet done.
    pub fn has_live(&self, kind: PredicateKind) -> bool {
        self.queue.lock().iter().any(|i| i.kind() == kind && !i.is_done())
    }

    /// Queued predicates in execution order.
    pub fn snapshot(&self) -> Vec<Predicate> {
        self.queue.lock().iter().map(|i| i.predicate()).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
