use async_trait::async_trait;
use tracing::{debug, info};

use courier_core::{Envelope, Position, Template};
use courier_grid::{find_path, path_to_positions, Layer};

use super::{Plan, PlanScope};
use crate::error::PlanError;
use crate::options::{AlleywayTask, HandoffAction, Predicate, PredicateKind};
use crate::traits::AskReply;
use crate::types::Teammate;

/// Where the collector drops the parcel and where it steps aside to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Handoff {
    teammate: Position,
    drop: Position,
    retreat: Position,
}

/// Collector side of a corridor hand-off.
///
/// Picks the parcel up, carries it to the cell just before the teammate on
/// the way to the delivery tile, drops it, steps back and then asks the
/// teammate to step forward and take it.
pub struct CollectorPlan;

impl CollectorPlan {
    async fn plan_handoff(
        &self,
        scope: &PlanScope<'_>,
        teammate: &Teammate,
        delivery: Position,
    ) -> Result<Handoff, PlanError> {
        let beliefs = scope.ctx().beliefs().read().await;
        let here = beliefs.me().position;
        let friend = beliefs
            .agent(&teammate.id)
            .map(|agent| agent.position())
            .ok_or_else(|| PlanError::HandoffRejected("teammate position unknown".into()))?;

        let route = find_path(beliefs.map(), here, delivery, Layer::Static)
            .ok_or(PlanError::PathBlocked(delivery))?;
        let mut cells = vec![here];
        cells.extend(path_to_positions(here, &route));

        let at = cells
            .iter()
            .position(|cell| *cell == friend)
            .filter(|at| *at > 0)
            .ok_or_else(|| PlanError::HandoffRejected("teammate is not on the corridor".into()))?;
        let drop = cells[at - 1];

        let retreat = if at >= 2 {
            cells[at - 2]
        } else {
            drop.neighbors()
                .into_iter()
                .find(|cell| *cell != friend && beliefs.map().is_walkable(*cell, Layer::Live))
                .ok_or_else(|| PlanError::HandoffRejected("no room to step aside".into()))?
        };

        Ok(Handoff {
            teammate: friend,
            drop,
            retreat,
        })
    }

    async fn request(
        &self,
        scope: &PlanScope<'_>,
        teammate: &Teammate,
        action: HandoffAction,
    ) -> Result<(), PlanError> {
        scope.check()?;
        let ctx = scope.ctx();
        let envelope = Envelope::new(Template::AlleywayAct).with("action", &action)?;
        let reply = ctx
            .client()
            .ask(&teammate.id, envelope, ctx.settings().ask_timeout())
            .await?;

        match reply {
            AskReply::Reply(answer) if answer.is(Template::AlleywayOk) => {
                if answer.optional_field::<bool>("done")?.unwrap_or(true) {
                    Ok(())
                } else {
                    Err(PlanError::HandoffRejected(format!("{action:?} failed")))
                }
            }
            AskReply::Reply(answer) => Err(PlanError::HandoffRejected(format!(
                "unexpected reply {}",
                answer.msg
            ))),
            AskReply::Timeout => Err(PlanError::HandoffRejected(format!("{action:?} timed out"))),
        }
    }
}

#[async_trait]
impl Plan for CollectorPlan {
    fn name(&self) -> &'static str {
        "alleyway_collector"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        predicate.kind == PredicateKind::Alleyway
            && matches!(predicate.alleyway, Some(AlleywayTask::Collect { .. }))
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let Some(AlleywayTask::Collect { parcel, delivery }) = predicate.alleyway else {
            return Err(PlanError::MissingTarget);
        };
        let teammate = scope
            .ctx()
            .teammate()
            .ok_or_else(|| PlanError::HandoffRejected("no teammate".into()))?;

        let carrying = scope.ctx().beliefs().read().await.carried_by_me().next().is_some();
        if !carrying {
            scope.sub_intention(Predicate::pick_up_at(parcel)).await?;
        }

        let handoff = self.plan_handoff(scope, &teammate, delivery).await?;
        debug!(?handoff, "Planned corridor hand-off");

        scope.sub_intention(Predicate::move_to(handoff.drop)).await?;
        scope.check()?;
        let dropped = scope.ctx().client().putdown().await?;
        if dropped.is_empty() {
            return Err(PlanError::ActionRejected("nothing to hand over".into()));
        }
        scope.ctx().beliefs().write().await.mark_dropped(&dropped);

        scope.sub_intention(Predicate::move_to(handoff.retreat)).await?;

        let toward = handoff
            .teammate
            .direction_to(&handoff.drop)
            .ok_or_else(|| PlanError::HandoffRejected("teammate not adjacent to drop".into()))?;
        self.request(scope, &teammate, HandoffAction::Move(toward)).await?;
        self.request(scope, &teammate, HandoffAction::PickUp).await?;

        info!(teammate = %teammate.id, at = %handoff.drop, "Hand-off complete");
        Ok(())
    }
}

/// Deliverer side of a corridor hand-off: one requested step at a time.
pub struct DelivererPlan;

#[async_trait]
impl Plan for DelivererPlan {
    fn name(&self) -> &'static str {
        "alleyway_deliverer"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        predicate.kind == PredicateKind::Alleyway
            && matches!(predicate.alleyway, Some(AlleywayTask::Act(_)))
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let Some(AlleywayTask::Act(action)) = predicate.alleyway else {
            return Err(PlanError::MissingTarget);
        };
        scope.check()?;
        let ctx = scope.ctx();

        match action {
            HandoffAction::Move(direction) => {
                ctx.step(direction).await?;
            }
            HandoffAction::PickUp => {
                let picked = ctx.client().pickup().await?;
                if picked.is_empty() {
                    return Err(PlanError::ActionRejected("nothing to take over".into()));
                }
                ctx.beliefs().write().await.mark_picked(&picked);
            }
            HandoffAction::PutDown => {
                let dropped = ctx.client().putdown().await?;
                ctx.beliefs().write().await.mark_dropped(&dropped);
            }
        }
        Ok(())
    }
}
