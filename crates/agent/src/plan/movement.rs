use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::debug;

use courier_core::{Direction, Position};
use courier_grid::{find_path, Layer};

use super::{Plan, PlanScope};
use crate::error::PlanError;
use crate::options::{Predicate, PredicateKind};

fn free_move_target(predicate: &Predicate) -> bool {
    predicate.kind == PredicateKind::MoveTo && predicate.path.is_none() && predicate.target.is_some()
}

/// Counts consecutive failures and waits one move between retries.
struct Retry {
    failures: u32,
    threshold: u32,
}

impl Retry {
    fn new(scope: &PlanScope<'_>) -> Self {
        Self {
            failures: 0,
            threshold: scope.ctx().settings().failure_threshold.max(1),
        }
    }

    fn succeeded(&mut self) {
        self.failures = 0;
    }

    /// Record a failure; gives up with `error` once the threshold is hit.
    async fn failed(&mut self, scope: &PlanScope<'_>, error: PlanError) -> Result<(), PlanError> {
        self.failures += 1;
        if self.failures >= self.threshold {
            return Err(error);
        }
        let pause = scope.ctx().beliefs().read().await.config().movement();
        scope.token().sleep(pause).await
    }
}

/// Re-plan with A* on the live layer before every step.
pub struct AStarMove;

#[async_trait]
impl Plan for AStarMove {
    fn name(&self) -> &'static str {
        "astar_move"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        free_move_target(predicate)
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let target = predicate.target.ok_or(PlanError::MissingTarget)?;
        let mut retry = Retry::new(scope);

        loop {
            scope.check()?;
            let (here, path) = {
                let beliefs = scope.ctx().beliefs().read().await;
                let here = beliefs.me().position;
                (here, find_path(beliefs.map(), here, target, Layer::Live))
            };
            if here == target {
                return Ok(());
            }

            let Some(&direction) = path.as_ref().and_then(|p| p.first()) else {
                debug!(from = %here, to = %target, "No live path");
                retry.failed(scope, PlanError::PathBlocked(target)).await?;
                continue;
            };

            match scope.ctx().step(direction).await {
                Ok(_) => retry.succeeded(),
                Err(e @ PlanError::ActionRejected(_)) => retry.failed(scope, e).await?,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Step to whichever free neighbour is closest to the target, never
/// straight back where we came from.
pub struct GreedyMove;

#[async_trait]
impl Plan for GreedyMove {
    fn name(&self) -> &'static str {
        "greedy_move"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        free_move_target(predicate)
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let target = predicate.target.ok_or(PlanError::MissingTarget)?;
        let mut retry = Retry::new(scope);
        let mut previous: Option<Position> = None;

        let start = scope.ctx().position().await;
        let mut budget = start.manhattan(&target) * 2 + retry.threshold;

        loop {
            scope.check()?;
            let here = scope.ctx().position().await;
            if here == target {
                return Ok(());
            }
            if budget == 0 {
                return Err(PlanError::PathBlocked(target));
            }
            budget -= 1;

            let mut candidates: Vec<(u32, Direction)> = {
                let beliefs = scope.ctx().beliefs().read().await;
                Direction::ALL
                    .into_iter()
                    .map(|d| (here.step(d), d))
                    .filter(|(next, _)| {
                        beliefs.map().is_walkable(*next, Layer::Live) && Some(*next) != previous
                    })
                    .map(|(next, d)| (next.manhattan(&target), d))
                    .collect()
            };
            // stable: equal distances keep direction order
            candidates.sort_by_key(|(distance, _)| *distance);

            let Some(&(_, direction)) = candidates.first() else {
                retry.failed(scope, PlanError::PathBlocked(target)).await?;
                continue;
            };

            match scope.ctx().step(direction).await {
                Ok(_) => {
                    retry.succeeded();
                    previous = Some(here);
                }
                Err(e @ PlanError::ActionRejected(_)) => retry.failed(scope, e).await?,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wander randomly for a few steps hoping to shake loose a path, then
/// follow A* as soon as one appears.
pub struct RandomWalkMove;

#[async_trait]
impl Plan for RandomWalkMove {
    fn name(&self) -> &'static str {
        "random_walk_move"
    }

    fn is_applicable(&self, predicate: &Predicate) -> bool {
        free_move_target(predicate)
    }

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError> {
        let target = predicate.target.ok_or(PlanError::MissingTarget)?;
        let mut steps = scope.ctx().settings().random_walk_steps;

        loop {
            scope.check()?;
            let (here, path, open) = {
                let beliefs = scope.ctx().beliefs().read().await;
                let here = beliefs.me().position;
                let open: Vec<Direction> = Direction::ALL
                    .into_iter()
                    .filter(|d| beliefs.map().is_walkable(here.step(*d), Layer::Live))
                    .collect();
                (here, find_path(beliefs.map(), here, target, Layer::Live), open)
            };
            if here == target {
                return Ok(());
            }

            let direction = match path.as_ref().and_then(|p| p.first()) {
                Some(&direction) => direction,
                None => {
                    if steps == 0 {
                        return Err(PlanError::PathBlocked(target));
                    }
                    steps -= 1;
                    match scope.ctx().with_rng(|rng| open.choose(rng).copied()) {
                        Some(direction) => direction,
                        None => {
                            let pause = scope.ctx().beliefs().read().await.config().movement();
                            scope.token().sleep(pause).await?;
                            continue;
                        }
                    }
                }
            };

            match scope.ctx().step(direction).await {
                Ok(_) => {}
                Err(PlanError::ActionRejected(_)) if steps > 0 => steps -= 1,
                Err(e) => return Err(e),
            }
        }
    }
}
