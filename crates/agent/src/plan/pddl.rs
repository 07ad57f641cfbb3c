use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use courier_grid::{parse_plan, Layer, PddlProblem, DOMAIN};

use super::{Plan, PlanScope};
use crate::error::PlanError;
use crate::options::{Predicate, PredicateKind};

/// An external classical planner.
#[async_trait]
pub trait PlanSolver: Send + Sync {
    /// Solve `problem` against `domain`. `Ok(None)` means no plan exists;
    /// otherwise each entry is one action such as `(move_right t_0_0 t_1_0)`.
    async fn solve(&self, domain: &str, problem: &str) -> Result<Option<Vec<String>>, PlanError>;
}

/// Ask the solver for a route over the static map and walk it, waiting
/// out agents that step into the way.
pub struct PddlMove {
    solver: Arc<dyn PlanSolver>,
}

impl PddlMove {
    pub fn new(solver: Arc<dyn PlanSolver>) -> Self {
        Self { solver }
    }
}

#[async_trait]
impl Plan for PddlMove {
    fn name(&self) -> &'static str {
        "pddl_move"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        predicate.kind == PredicateKind::MoveTo
            && predicate.path.is_none()
            && predicate.target.is_some()
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let target = predicate.target.ok_or(PlanError::MissingTarget)?;
        let (here, problem, pause) = {
            let beliefs = scope.ctx().beliefs().read().await;
            let here = beliefs.me().position;
            let problem = PddlProblem::new(beliefs.map(), here, target, Layer::Static);
            (here, problem.to_string(), beliefs.config().movement())
        };
        if here == target {
            return Ok(());
        }

        let steps = self
            .solver
            .solve(DOMAIN, &problem)
            .await?
            .ok_or(PlanError::PathBlocked(target))?;
        let route = parse_plan(&steps)
            .ok_or_else(|| PlanError::Solver(format!("unreadable plan: {steps:?}")))?;
        debug!(from = %here, to = %target, steps = route.len(), "Solver plan");

        let threshold = scope.ctx().settings().failure_threshold;
        for direction in route {
            let mut waited = 0;
            loop {
                scope.check()?;
                let blocked = {
                    let beliefs = scope.ctx().beliefs().read().await;
                    let next = beliefs.me().position.step(direction);
                    !beliefs.map().is_walkable(next, Layer::Live)
                };
                if !blocked {
                    break;
                }
                waited += 1;
                if waited > threshold {
                    return Err(PlanError::PathBlocked(target));
                }
                scope.token().sleep(pause).await?;
            }
            scope.ctx().step(direction).await?;
        }

        if scope.ctx().position().await == target {
            Ok(())
        } else {
            Err(PlanError::PathBlocked(target))
        }
    }
}
