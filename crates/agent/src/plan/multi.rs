use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::{Envelope, Position, Template};
use courier_grid::Layer;

use super::{Plan, PlanScope};
use crate::error::PlanError;
use crate::options::{Predicate, PredicateKind};

/// Follow a route agreed with the teammate, step for step.
///
/// The route is never re-planned. If a cell on it is taken, the plan fails
/// and the teammate is told to drop its own intention so both sides can
/// renegotiate.
pub struct MultiMove;

impl MultiMove {
    async fn abandon(&self, scope: &PlanScope<'_>, at: Position) -> PlanError {
        if let Some(teammate) = scope.ctx().teammate() {
            let stop = Envelope::new(Template::StopIntention);
            if let Err(e) = scope.ctx().client().say(&teammate.id, stop).await {
                warn!(teammate = %teammate.id, error = %e, "Failed to notify teammate");
            }
        }
        PlanError::AgreedPathBroken(at)
    }
}

#[async_trait]
impl Plan for MultiMove {
    fn name(&self) -> &'static str {
        "multi_move"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        predicate.kind == PredicateKind::MoveTo && predicate.path.is_some()
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let route = predicate.path.as_deref().unwrap_or_default();

        for &direction in route {
            scope.check()?;
            let (next, free) = {
                let beliefs = scope.ctx().beliefs().read().await;
                let next = beliefs.me().position.step(direction);
                (next, beliefs.map().is_walkable(next, Layer::Live))
            };
            if !free {
                debug!(cell = %next, "Agreed path blocked");
                return Err(self.abandon(scope, next).await);
            }
            match scope.ctx().step(direction).await {
                Ok(_) => {}
                Err(PlanError::ActionRejected(_)) => return Err(self.abandon(scope, next).await),
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
