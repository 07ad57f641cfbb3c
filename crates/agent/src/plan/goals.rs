use async_trait::async_trait;
use tracing::{debug, info};

use courier_core::Position;

use super::{Plan, PlanScope};
use crate::error::PlanError;
use crate::options::{Predicate, PredicateKind};

fn walk_to(predicate: &Predicate, target: Position) -> Predicate {
    Predicate::move_to(target).with_path(predicate.path.clone())
}

pub struct PickUpPlan;

#[async_trait]
impl Plan for PickUpPlan {
    fn name(&self) -> &'static str {
        "pick_up"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        predicate.kind == PredicateKind::PickUp && predicate.target.is_some()
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let target = predicate.target.ok_or(PlanError::MissingTarget)?;
        scope.check()?;
        scope.sub_intention(walk_to(predicate, target)).await?;
        scope.check()?;

        let picked = scope.ctx().client().pickup().await?;
        if picked.is_empty() {
            return Err(PlanError::ActionRejected(format!("nothing to pick up at {target}")));
        }
        info!(at = %target, count = picked.len(), "Picked up parcels");
        scope.ctx().beliefs().write().await.mark_picked(&picked);
        scope.check()
    }
}

pub struct DeliverPlan;

#[async_trait]
impl Plan for DeliverPlan {
    fn name(&self) -> &'static str {
        "deliver"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        predicate.kind == PredicateKind::Deliver && predicate.target.is_some()
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let target = predicate.target.ok_or(PlanError::MissingTarget)?;
        scope.check()?;
        scope.sub_intention(walk_to(predicate, target)).await?;
        scope.check()?;

        let delivered = scope.ctx().client().putdown().await?;
        if delivered.is_empty() {
            return Err(PlanError::ActionRejected(format!("nothing delivered at {target}")));
        }
        info!(at = %target, count = delivered.len(), "Delivered parcels");
        scope.ctx().beliefs().write().await.mark_delivered(&delivered);
        scope.check()
    }
}

/// Wander to a promising spawn tile while there is nothing better to do.
pub struct IdlePlan;

#[async_trait]
impl Plan for IdlePlan {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        predicate.kind == PredicateKind::Idle
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        scope.check()?;
        let target = match predicate.target {
            Some(target) => Some(target),
            None => {
                let beliefs = scope.ctx().beliefs().read().await;
                scope.ctx().pick_idle_target(&beliefs, None)
            }
        };
        let Some(target) = target else {
            debug!("No spawn tile to idle towards");
            scope.token().sleep(scope.ctx().settings().idle_backoff()).await?;
            return Err(PlanError::NoIdleTarget);
        };

        debug!(to = %target, "Idling");
        scope.sub_intention(walk_to(predicate, target)).await?;

        let mut beliefs = scope.ctx().beliefs().write().await;
        let now = beliefs.now();
        beliefs.map_mut().mark_visited(target, now);
        Ok(())
    }
}
