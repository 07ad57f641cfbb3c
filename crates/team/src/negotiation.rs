use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use courier_agent::{
    filter_options, generate_options, AgentContext, AskReply, BeliefSnapshot, BeliefStore,
    HandoffAction, IntentionScheduler, IntentionStatus, Predicate, PredicateKind, Teammate,
};
use courier_core::{Direction, Envelope, Position, Template, Timestamp};
use courier_grid::{find_path, path_to_positions, Layer, Occupancy};

use crate::alleyway::{AlleywayRole, CorridorView};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Proposer,
    Evaluator,
}

/// The agent whose name sorts first proposes; ids break a name tie.
pub fn assign_role(me: &Teammate, friend: &Teammate) -> Role {
    if (&me.name, &me.id) > (&friend.name, &friend.id) {
        Role::Evaluator
    } else {
        Role::Proposer
    }
}

/// Who has to give up their goal after comparing best options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    pub proposer_changes: bool,
    pub evaluator_changes: bool,
}

/// Compare the proposer's and the evaluator's best options.
///
/// Only options aiming at the same cell conflict. The lower priority side
/// changes; on equal priority the evaluator does.
pub fn compare_best_options(proposed: &Predicate, own: &Predicate) -> Resolution {
    let mut resolution = Resolution::default();
    if proposed.target.is_none() || proposed.target != own.target {
        return resolution;
    }
    if proposed.priority < own.priority {
        resolution.proposer_changes = true;
    } else {
        resolution.evaluator_changes = true;
    }
    resolution
}

/// A route to `target` that stays off the other agent's cell and every cell
/// of its announced route. Empty when no such route exists.
pub fn create_agreed_path(
    beliefs: &BeliefStore,
    my_start: Position,
    other_start: Position,
    other_path: &[Direction],
    target: Position,
) -> Vec<Direction> {
    let mut map = beliefs.map().clone();
    map.mark_occupied(other_start, Occupancy::ReservedPath);
    map.reserve_path(&path_to_positions(other_start, other_path));
    find_path(&map, my_start, target, Layer::Live).unwrap_or_default()
}

/// Options generated for one negotiation exchange.
#[derive(Debug)]
struct Round {
    options: Vec<Predicate>,
    best: Predicate,
}

/// Turns teammate messages into intentions.
pub struct Negotiator {
    ctx: AgentContext,
    scheduler: Arc<IntentionScheduler>,
}

impl Negotiator {
    pub fn new(scheduler: Arc<IntentionScheduler>) -> Self {
        Self {
            ctx: scheduler.ctx().clone(),
            scheduler,
        }
    }

    pub fn ctx(&self) -> &AgentContext {
        &self.ctx
    }

    /// Regenerate options with concrete idle targets, so both sides can
    /// agree on routes for idling too.
    async fn new_round(&self) -> Round {
        let beliefs = self.ctx.beliefs().read().await;
        let mut options = generate_options(&beliefs);
        for option in options.iter_mut().filter(|o| o.kind == PredicateKind::Idle) {
            option.target = self.ctx.pick_idle_target(&beliefs, None);
        }
        let best = filter_options(&options)
            .cloned()
            .unwrap_or_else(Predicate::idle);
        Round { options, best }
    }

    /// Fold a teammate's state into ours and react to it.
    pub async fn on_inform_state(&self, teammate: &Teammate, snapshot: BeliefSnapshot) -> Result<()> {
        let friend = snapshot.me.position;
        let view = {
            let mut beliefs = self.ctx.beliefs().write().await;
            beliefs.merge(snapshot, Timestamp::now());
            let me = beliefs.me().position;
            CorridorView::new(&beliefs, me, friend)
        };

        if view.is_alleyway() {
            self.solve_alleyway(&view).await;
            Ok(())
        } else {
            self.multi_option_handling(teammate).await
        }
    }

    /// Agree with the teammate on who goes where, then queue our part.
    pub async fn multi_option_handling(&self, teammate: &Teammate) -> Result<()> {
        let me = {
            let beliefs = self.ctx.beliefs().read().await;
            Teammate {
                id: beliefs.me().id.clone(),
                name: beliefs.me().name.clone(),
            }
        };
        if assign_role(&me, teammate) != Role::Proposer || !self.scheduler.is_empty() {
            return Ok(());
        }
        let round = self.new_round().await;

        let ask = Envelope::new(Template::InformIntent).with("intent", &round.best)?;
        let reply = self
            .ctx
            .client()
            .ask(&teammate.id, ask, self.ctx.settings().ask_timeout())
            .await?;

        let answer = match reply {
            AskReply::Reply(answer) => answer,
            AskReply::Timeout => {
                debug!(teammate = %teammate.id, "Evaluator silent, acting alone");
                self.scheduler.push(round.best);
                return Ok(());
            }
        };

        let mut chosen = round.best.clone();
        if answer.is(Template::InformChange) && round.options.len() > 1 {
            let rest: Vec<Predicate> = round
                .options
                .iter()
                .filter(|o| o.key() != round.best.key())
                .cloned()
                .collect();
            if let Some(next) = filter_options(&rest) {
                debug!(from = %chosen, to = %next, "Changing intent on request");
                chosen = next.clone();
            }
        }

        let other_path: Vec<Direction> = answer
            .optional_field::<Vec<Direction>>("path")?
            .unwrap_or_default();
        let other_start: Option<Position> = answer.optional_field("start")?;

        let chosen = {
            let beliefs = self.ctx.beliefs().read().await;
            let here = beliefs.me().position;
            let target = chosen.target;
            match target {
                Some(target) if target != here => {
                    let agreed = match other_start {
                        Some(start) => {
                            create_agreed_path(&beliefs, here, start, &other_path, target)
                        }
                        None => find_path(beliefs.map(), here, target, Layer::Live)
                            .unwrap_or_default(),
                    };
                    if agreed.is_empty() {
                        debug!(target = %target, "No route clear of teammate, staying put");
                        Predicate::move_to(here)
                            .with_priority(chosen.priority)
                            .with_path(Some(Vec::new()))
                    } else {
                        chosen.with_path(Some(agreed))
                    }
                }
                _ => chosen,
            }
        };

        info!(intent = %chosen, "Agreed intent");
        self.scheduler.push(chosen);
        Ok(())
    }

    /// Answer a proposer's intent and queue our own, adjusted if needed.
    pub async fn evaluator_respond(&self, proposed: Predicate) -> Result<Envelope> {
        self.scheduler.stop_head();

        let round = self.new_round().await;
        let resolution = compare_best_options(&proposed, &round.best);

        let mut own = round.best.clone();
        if resolution.evaluator_changes {
            if own.kind == PredicateKind::Idle {
                let beliefs = self.ctx.beliefs().read().await;
                own.target = self.ctx.pick_idle_target(&beliefs, proposed.target);
            } else {
                let rest: Vec<Predicate> = round
                    .options
                    .iter()
                    .filter(|o| o.key() != own.key())
                    .cloned()
                    .collect();
                if let Some(next) = filter_options(&rest) {
                    own = next.clone();
                }
            }
            debug!(intent = %own, "Yielding target to proposer");
        }

        let (here, path) = {
            let beliefs = self.ctx.beliefs().read().await;
            let here = beliefs.me().position;
            let path = own
                .target
                .and_then(|target| find_path(beliefs.map(), here, target, Layer::Live));
            (here, path)
        };

        let template = if resolution.proposer_changes {
            Template::InformChange
        } else {
            Template::InformOk
        };
        let reply = Envelope::new(template)
            .with("path", &path)?
            .with("start", &here)?;

        // without an announced route our own plans find one
        own.path = path;
        self.scheduler.push(own);
        Ok(reply)
    }

    /// Queue this side's part of a corridor hand-off.
    pub async fn solve_alleyway(&self, view: &CorridorView) {
        let Some(delivery) = view.delivery() else {
            return;
        };
        // one hand-off at a time; a live collect already covers new sightings
        if view.role() == AlleywayRole::Collector && self.scheduler.has_live(PredicateKind::Alleyway) {
            return;
        }

        let predicate = {
            let beliefs = self.ctx.beliefs().read().await;
            let here = beliefs.me().position;
            let carrying = beliefs.carried_by_me().next().is_some();

            match view.role() {
                AlleywayRole::Collector => {
                    let reachable = beliefs
                        .free_parcels()
                        .find(|p| find_path(beliefs.map(), here, p.position, Layer::Live).is_some())
                        .map(|p| p.position);
                    match (carrying, reachable) {
                        (true, _) => Some(Predicate::collect(here, delivery, 1.0)),
                        (false, Some(parcel)) => Some(Predicate::collect(parcel, delivery, 1.0)),
                        (false, None) => {
                            let target = self.ctx.pick_idle_target(&beliefs, None);
                            let path = target
                                .and_then(|t| find_path(beliefs.map(), here, t, Layer::Live));
                            let mut idle = Predicate::idle();
                            idle.target = target;
                            Some(idle.with_path(path))
                        }
                    }
                }
                // the deliverer waits for requests, except to deliver what it took over
                AlleywayRole::Deliverer if carrying => {
                    filter_options(&generate_options(&beliefs)).cloned()
                }
                AlleywayRole::Deliverer => None,
            }
        };

        // ordinary goals make no sense until the corridor is resolved
        let mut keep = vec![PredicateKind::Alleyway];
        keep.extend(predicate.as_ref().map(|p| p.kind));
        self.scheduler.stop_except(&keep);
        if let Some(predicate) = predicate {
            debug!(role = ?view.role(), intent = %predicate, "Alleyway intent");
            self.scheduler.push(predicate);
        }
    }

    /// Carry out one hand-off step and answer once it has settled.
    pub fn deliverer_acts(&self, action: HandoffAction, reply: oneshot::Sender<Envelope>) {
        let intention = self.scheduler.push(Predicate::handoff(action, 1.0));
        tokio::spawn(async move {
            let done = intention.finished().await == IntentionStatus::Succeeded;
            let answer = Envelope::new(Template::AlleywayOk).with("done", &done);
            match answer {
                Ok(answer) => {
                    if reply.send(answer).is_err() {
                        warn!(?action, "Collector stopped waiting for hand-off reply");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to build hand-off reply"),
            }
        });
    }

    /// The teammate abandoned the agreed plan; drop ours too.
    pub fn on_stop_intention(&self) {
        self.scheduler.stop_head();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_agent::SelfReport;
    use courier_core::{AgentId, AgentSettings};
    use courier_grid::WorldMap;

    fn mate(name: &str, id: &str) -> Teammate {
        Teammate {
            id: AgentId::new(id),
            name: name.into(),
        }
    }

    #[test]
    fn test_roles_are_complementary() {
        let alice = mate("alice", "1");
        let bob = mate("bob", "2");
        assert_eq!(assign_role(&alice, &bob), Role::Proposer);
        assert_eq!(assign_role(&bob, &alice), Role::Evaluator);

        let twin_a = mate("twin", "a");
        let twin_b = mate("twin", "b");
        assert_ne!(assign_role(&twin_a, &twin_b), assign_role(&twin_b, &twin_a));
    }

    #[test]
    fn test_distinct_targets_do_not_conflict() {
        let a = Predicate::deliver(Position::new(0, 0), 5.0);
        let b = Predicate::deliver(Position::new(0, 1), 5.0);
        assert_eq!(compare_best_options(&a, &b), Resolution::default());
    }

    #[test]
    fn test_lower_priority_side_changes() {
        let target = Position::new(2, 3);
        let weak = Predicate::deliver(target, 1.0);
        let strong = Predicate::deliver(target, 9.0);
        assert!(compare_best_options(&weak, &strong).proposer_changes);
        assert!(compare_best_options(&strong, &weak).evaluator_changes);
    }

    #[test]
    fn test_equal_priority_resolution_is_deterministic() {
        let target = Position::new(2, 3);
        let a = Predicate::deliver(target, 4.0);
        let b = Predicate::deliver(target, 4.0);
        for _ in 0..10 {
            let resolution = compare_best_options(&a, &b);
            assert!(resolution.evaluator_changes);
            assert!(!resolution.proposer_changes);
        }
    }

    #[test]
    fn test_agreed_path_avoids_reserved_cells() {
        let mut beliefs = BeliefStore::new(AgentSettings::default());
        beliefs.set_map(WorldMap::from_ascii("...\n...\n...", 5).unwrap());
        beliefs.update_self(
            SelfReport {
                id: AgentId::new("me"),
                x: Some(0.0),
                y: Some(0.0),
                ..SelfReport::default()
            },
            Timestamp::from_millis(0),
        );

        // the other agent stands on the middle column and walks up it
        let other = [Direction::Up, Direction::Up];
        let agreed = create_agreed_path(
            &beliefs,
            Position::new(0, 0),
            Position::new(1, 0),
            &other,
            Position::new(2, 0),
        );
        assert!(agreed.is_empty(), "middle column is fully reserved");

        let agreed = create_agreed_path(
            &beliefs,
            Position::new(0, 0),
            Position::new(2, 0),
            &[Direction::Up],
            Position::new(0, 2),
        );
        assert_eq!(agreed, vec![Direction::Up, Direction::Up]);

        // reservations never leak into the shared map
        assert!(beliefs.map().is_walkable(Position::new(1, 1), Layer::Live));
    }
}
