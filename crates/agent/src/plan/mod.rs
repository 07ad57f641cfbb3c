//! Plans are the recipes an intention tries, in registration order, until
//! one of them succeeds.

mod alleyway;
mod goals;
mod movement;
mod multi;
mod pddl;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::AgentContext;
use crate::error::PlanError;
use crate::intention::Intention;
use crate::options::{Predicate, PredicateKind};
use crate::stop::StopToken;

pub use alleyway::{CollectorPlan, DelivererPlan};
pub use goals::{DeliverPlan, IdlePlan, PickUpPlan};
pub use movement::{AStarMove, GreedyMove, RandomWalkMove};
pub use multi::MultiMove;
pub use pddl::{PddlMove, PlanSolver};

#[async_trait]
pub trait Plan: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_applicable(&self, predicate: &Predicate) -> bool;

    async fn execute(&self, predicate: &Predicate, scope: &PlanScope<'_>) -> Result<(), PlanError>;
}

/// What a running plan can reach: the agent context, the library for
/// sub-goals and the owning intention's stop token.
pub struct PlanScope<'a> {
    ctx: &'a AgentContext,
    library: &'a PlanLibrary,
    token: &'a StopToken,
}

impl<'a> PlanScope<'a> {
    pub fn new(ctx: &'a AgentContext, library: &'a PlanLibrary, token: &'a StopToken) -> Self {
        Self {
            ctx,
            library,
            token,
        }
    }

    pub fn ctx(&self) -> &AgentContext {
        self.ctx
    }

    pub fn token(&self) -> &StopToken {
        self.token
    }

    pub fn check(&self) -> Result<(), PlanError> {
        self.token.check()
    }

    /// Achieve `predicate` as a child of the current intention. Stopping
    /// the parent stops the child.
    pub async fn sub_intention(&self, predicate: Predicate) -> Result<(), PlanError> {
        let child = Intention::with_token(predicate, self.token.child());
        Box::pin(child.achieve(self.ctx, self.library)).await
    }
}

/// Ordered fallback lists of plans per predicate kind.
#[derive(Default)]
pub struct PlanLibrary {
    plans: HashMap<PredicateKind, Vec<Arc<dyn Plan>>>,
}

impl PlanLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock library. The PDDL move is only registered when a solver
    /// is supplied.
    pub fn standard(solver: Option<Arc<dyn PlanSolver>>) -> Self {
        let mut library = Self::new();

        library.register(PredicateKind::MoveTo, Arc::new(MultiMove));
        if let Some(solver) = solver {
            library.register(PredicateKind::MoveTo, Arc::new(PddlMove::new(solver)));
        }
        library.register(PredicateKind::MoveTo, Arc::new(AStarMove));
        library.register(PredicateKind::MoveTo, Arc::new(GreedyMove));
        library.register(PredicateKind::MoveTo, Arc::new(RandomWalkMove));

        library.register(PredicateKind::PickUp, Arc::new(PickUpPlan));
        library.register(PredicateKind::Deliver, Arc::new(DeliverPlan));
        library.register(PredicateKind::Idle, Arc::new(IdlePlan));
        library.register(PredicateKind::Alleyway, Arc::new(CollectorPlan));
        library.register(PredicateKind::Alleyway, Arc::new(DelivererPlan));

        library
    }

    /// Append `plan` to the fallback list for `kind`.
    pub fn register(&mut self, kind: PredicateKind, plan: Arc<dyn Plan>) {
        self.plans.entry(kind).or_default().push(plan);
    }

    pub fn plans_for(&self, kind: PredicateKind) -> &[Arc<dyn Plan>] {
        self.plans.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}
