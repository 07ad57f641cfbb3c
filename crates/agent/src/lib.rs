pub mod belief;
pub mod context;
pub mod error;
pub mod intention;
pub mod lifecycle;
pub mod options;
pub mod plan;
pub mod scheduler;
pub mod stop;
pub mod traits;
pub mod types;

pub use belief::BeliefStore;
pub use context::AgentContext;
pub use error::{AgentError, ClientError, PlanError};
pub use intention::{Intention, IntentionStatus};
pub use lifecycle::{AgentHandle, AgentRuntime, AgentState, SensingEvent, SoloDeliberator, Trigger};
pub use options::{
    delivery_priority, filter_options, generate_options, pickup_priority, AlleywayTask,
    HandoffAction, Predicate, PredicateKind,
};
pub use plan::{Plan, PlanLibrary, PlanScope, PlanSolver};
pub use scheduler::IntentionScheduler;
pub use stop::StopToken;
pub use traits::{AskReply, Deliberator, GameClient, IncomingMessage};
pub use types::{
    AgentSighting, BeliefSnapshot, Parcel, ParcelSighting, RivalAgent, SelfAgent, SelfReport,
    Teammate,
};

pub mod prelude {
    pub use crate::context::AgentContext;
    pub use crate::error::{AgentError, PlanError};
    pub use crate::intention::{Intention, IntentionStatus};
    pub use crate::lifecycle::{AgentHandle, AgentRuntime, SensingEvent};
    pub use crate::options::{Predicate, PredicateKind};
    pub use crate::plan::{Plan, PlanLibrary, PlanScope};
    pub use crate::scheduler::IntentionScheduler;
    pub use crate::traits::{Deliberator, GameClient};
    pub use async_trait::async_trait;
}
