mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeWorld;
use courier_agent::{
    filter_options, generate_options, AgentContext, AgentRuntime, AgentSighting, AskReply,
    BeliefStore, HandoffAction, IntentionScheduler, IntentionStatus, ParcelSighting, PlanError,
    PlanLibrary, Predicate, PredicateKind, SelfReport, SensingEvent, StopToken, Teammate,
};
use courier_core::{
    AgentId, AgentSettings, Direction, Envelope, GameConfig, ParcelId, Position, Template,
    Timestamp,
};
use courier_grid::{Tile, TileKind, WorldMap};
use tokio::sync::mpsc;

fn setup(rows: &str, start: Position, decay_ms: f64, movement_ms: u64) -> (Arc<FakeWorld>, AgentContext) {
    let map = WorldMap::from_ascii(rows, 5).unwrap();
    let world = FakeWorld::new(map.clone(), start);

    let mut beliefs = BeliefStore::new(AgentSettings::default());
    beliefs.update_config(GameConfig {
        parcel_decading_interval: decay_ms,
        movement_duration: movement_ms,
        ..GameConfig::default()
    });
    beliefs.set_map(map);
    beliefs.update_self(
        SelfReport {
            id: AgentId::new("me"),
            name: "me".into(),
            x: Some(f64::from(start.x)),
            y: Some(f64::from(start.y)),
            ..SelfReport::default()
        },
        Timestamp::from_millis(0),
    );

    let ctx = AgentContext::with_beliefs(world.clone(), AgentSettings::default(), beliefs).with_seed(7);
    (world, ctx)
}

fn start_loop(ctx: &AgentContext) -> (Arc<IntentionScheduler>, StopToken, tokio::task::JoinHandle<()>) {
    let scheduler = Arc::new(IntentionScheduler::new(
        ctx.clone(),
        Arc::new(PlanLibrary::standard(None)),
    ));
    let shutdown = StopToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let token = shutdown.clone();
        tokio::spawn(async move { scheduler.run(token).await })
    };
    (scheduler, shutdown, runner)
}

async fn wait(intention: &courier_agent::Intention) -> IntentionStatus {
    tokio::time::timeout(Duration::from_secs(5), intention.finished())
        .await
        .expect("intention did not finish")
}

#[tokio::test]
async fn test_pickup_walks_straight_to_parcel() {
    let (world, ctx) = setup(".....\n.....\n.....\n.....\n.....", Position::new(0, 0), f64::INFINITY, 10);
    world.drop_parcel("p1", Position::new(2, 0));
    ctx.beliefs().write().await.update_parcels(
        vec![ParcelSighting::new("p1", 2.0, 0.0, 10.0)],
        Timestamp::from_millis(0),
    );

    let best = {
        let beliefs = ctx.beliefs().read().await;
        filter_options(&generate_options(&beliefs)).cloned().unwrap()
    };
    assert_eq!(best.kind, PredicateKind::PickUp);
    assert_eq!(best.target, Some(Position::new(2, 0)));
    assert!((best.priority - 10.0).abs() < 1e-9);

    let (scheduler, shutdown, runner) = start_loop(&ctx);
    let intention = scheduler.push(best);
    assert_eq!(wait(&intention).await, IntentionStatus::Succeeded);

    assert_eq!(world.moves(), vec![Direction::Right, Direction::Right]);
    assert_eq!(ctx.beliefs().read().await.carried_by_me().count(), 1);

    shutdown.stop();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_delivers_to_nearer_tile() {
    let (world, ctx) = setup("D.......D", Position::new(3, 0), 1_000.0, 10);
    world.carry("p1");
    ctx.beliefs().write().await.update_parcels(
        vec![ParcelSighting::new("p1", 3.0, 0.0, 20.0).carried_by(AgentId::new("me"))],
        Timestamp::from_millis(0),
    );

    let best = {
        let beliefs = ctx.beliefs().read().await;
        filter_options(&generate_options(&beliefs)).cloned().unwrap()
    };
    assert_eq!(best.kind, PredicateKind::Deliver);
    assert_eq!(best.target, Some(Position::new(0, 0)));

    let (scheduler, shutdown, runner) = start_loop(&ctx);
    let intention = scheduler.push(best);
    assert_eq!(wait(&intention).await, IntentionStatus::Succeeded);

    assert_eq!(world.moves(), vec![Direction::Left; 3]);
    assert_eq!(
        world.with_state(|s| s.delivered.clone()),
        vec![ParcelId::new("p1")]
    );
    assert_eq!(ctx.beliefs().read().await.parcels().count(), 0);

    shutdown.stop();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_higher_priority_push_stops_running_intention() {
    // (4,0) is walled off, so the first move keeps retrying
    let (world, ctx) = setup("...#.", Position::new(0, 0), f64::INFINITY, 200);
    let (scheduler, shutdown, runner) = start_loop(&ctx);

    let stuck = scheduler.push(Predicate::move_to(Position::new(4, 0)).with_priority(1.0));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let urgent = scheduler.push(Predicate::move_to(Position::new(1, 0)).with_priority(5.0));

    assert_eq!(wait(&stuck).await, IntentionStatus::Stopped);
    assert_eq!(wait(&urgent).await, IntentionStatus::Succeeded);
    assert_eq!(world.position(), Position::new(1, 0));

    shutdown.stop();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_target_exhausts_fallbacks() {
    let (_world, ctx) = setup("...#.", Position::new(0, 0), f64::INFINITY, 1);
    let library = PlanLibrary::standard(None);
    let intention = courier_agent::Intention::new(Predicate::move_to(Position::new(4, 0)));

    let outcome = intention.achieve(&ctx, &library).await;
    assert!(matches!(
        outcome,
        Err(PlanError::NoPlanSatisfied(PredicateKind::MoveTo))
    ));
    assert!(matches!(intention.status(), IntentionStatus::Failed { .. }));

    // a second call is a no-op
    assert!(intention.achieve(&ctx, &library).await.is_ok());
}

#[tokio::test]
async fn test_agreed_path_is_followed_verbatim() {
    let (world, ctx) = setup("...\n...\n...", Position::new(0, 0), f64::INFINITY, 10);
    let library = PlanLibrary::standard(None);
    let predicate = Predicate::move_to(Position::new(1, 1))
        .with_path(Some(vec![Direction::Up, Direction::Right]));

    courier_agent::Intention::new(predicate)
        .achieve(&ctx, &library)
        .await
        .unwrap();
    assert_eq!(world.moves(), vec![Direction::Up, Direction::Right]);
}

#[tokio::test]
async fn test_broken_agreed_path_notifies_teammate() {
    let (world, ctx) = setup("...\n...\n...", Position::new(0, 0), f64::INFINITY, 10);
    ctx.set_teammate(Some(Teammate {
        id: AgentId::new("friend"),
        name: "friend".into(),
    }));
    ctx.beliefs().write().await.update_agents(
        vec![AgentSighting::new("rival", 1.0, 0.0)],
        Timestamp::from_millis(0),
    );

    let library = PlanLibrary::standard(None);
    let predicate = Predicate::move_to(Position::new(2, 0))
        .with_path(Some(vec![Direction::Right, Direction::Right]));
    let outcome = courier_agent::Intention::new(predicate)
        .achieve(&ctx, &library)
        .await;

    assert!(outcome.is_err());
    assert!(world.moves().is_empty());
    let said = world.with_state(|s| s.said.clone());
    assert_eq!(said.len(), 1);
    assert_eq!(said[0].0, AgentId::new("friend"));
    assert!(said[0].1.is(Template::StopIntention));
}

#[tokio::test]
async fn test_idle_walks_to_a_spawn_tile() {
    let (world, ctx) = setup("S...S", Position::new(2, 0), f64::INFINITY, 10);
    let library = PlanLibrary::standard(None);

    courier_agent::Intention::new(Predicate::idle())
        .achieve(&ctx, &library)
        .await
        .unwrap();

    let end = world.position();
    assert!(end == Position::new(0, 0) || end == Position::new(4, 0));
    assert!(ctx.beliefs().read().await.map().last_visited(end).is_some());
}

#[tokio::test]
async fn test_runtime_picks_up_sensed_parcel() {
    let map = WorldMap::from_ascii("...", 5).unwrap();
    let world = FakeWorld::new(map, Position::new(0, 0));
    world.drop_parcel("p1", Position::new(2, 0));
    let ctx = AgentContext::new(world.clone(), AgentSettings::default());

    let runtime = AgentRuntime::solo(ctx.clone(), None);
    let (tx, rx) = mpsc::channel(16);
    let handle = runtime.start(rx);

    let tiles: Vec<Tile> = (0..3).map(|x| Tile::new(x, 0, TileKind::Walkable)).collect();
    tx.send(SensingEvent::Config(GameConfig::default())).await.unwrap();
    tx.send(SensingEvent::Map { width: 3, height: 1, tiles }).await.unwrap();
    tx.send(SensingEvent::You(SelfReport {
        id: AgentId::new("me"),
        name: "me".into(),
        x: Some(0.0),
        y: Some(0.0),
        ..SelfReport::default()
    }))
    .await
    .unwrap();
    tx.send(SensingEvent::Parcels(vec![ParcelSighting::new("p1", 2.0, 0.0, 30.0)]))
        .await
        .unwrap();

    let picked = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if ctx.beliefs().read().await.carried_by_me().count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(picked.is_ok());
    assert_eq!(world.position(), Position::new(2, 0));

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_intention_stopped_before_start_never_runs() {
    let (world, ctx) = setup("...", Position::new(0, 0), f64::INFINITY, 10);
    let library = PlanLibrary::standard(None);
    let intention = courier_agent::Intention::new(Predicate::move_to(Position::new(2, 0)));

    intention.stop();
    let outcome = intention.achieve(&ctx, &library).await;

    assert!(matches!(outcome, Err(PlanError::Stopped)));
    assert_eq!(intention.status(), IntentionStatus::Pending);
    assert_eq!(wait(&intention).await, IntentionStatus::Pending);
    assert!(world.moves().is_empty());
}

/// Collector at (1,0) with the parcel on the spawn tile behind it and the
/// teammate at (4,0) blocking the way to the delivery tile.
async fn corridor() -> (Arc<FakeWorld>, AgentContext) {
    let (world, ctx) = setup("S.....D", Position::new(1, 0), f64::INFINITY, 10);
    world.drop_parcel("p1", Position::new(0, 0));
    {
        let mut beliefs = ctx.beliefs().write().await;
        beliefs.update_parcels(
            vec![ParcelSighting::new("p1", 0.0, 0.0, 10.0)],
            Timestamp::from_millis(0),
        );
        beliefs.update_agents(
            vec![AgentSighting::new("bob", 4.0, 0.0)],
            Timestamp::from_millis(0),
        );
    }
    ctx.set_teammate(Some(Teammate {
        id: AgentId::new("bob"),
        name: "bob".into(),
    }));
    (world, ctx)
}

fn handoff_ok(done: bool) -> AskReply {
    AskReply::Reply(Envelope::new(Template::AlleywayOk).with("done", &done).unwrap())
}

fn requested_actions(world: &FakeWorld) -> Vec<HandoffAction> {
    world.with_state(|s| {
        s.asked
            .iter()
            .map(|(to, envelope)| {
                assert_eq!(to, &AgentId::new("bob"));
                assert!(envelope.is(Template::AlleywayAct));
                envelope.field("action").unwrap()
            })
            .collect()
    })
}

#[tokio::test]
async fn test_collector_hands_parcel_over_in_corridor() {
    let (world, ctx) = corridor().await;
    world.queue_reply(handoff_ok(true));
    world.queue_reply(handoff_ok(true));
    let library = PlanLibrary::standard(None);

    let intention = courier_agent::Intention::new(Predicate::collect(
        Position::new(0, 0),
        Position::new(6, 0),
        1.0,
    ));
    intention.achieve(&ctx, &library).await.unwrap();

    // fetch, carry to the cell before bob, drop, step back
    assert_eq!(
        world.moves(),
        vec![
            Direction::Left,
            Direction::Right,
            Direction::Right,
            Direction::Right,
            Direction::Left
        ]
    );
    assert_eq!(world.position(), Position::new(2, 0));
    assert_eq!(
        world.with_state(|s| s.parcels.get(&ParcelId::new("p1")).copied()),
        Some(Some(Position::new(3, 0)))
    );
    assert_eq!(
        requested_actions(&world),
        vec![HandoffAction::Move(Direction::Left), HandoffAction::PickUp]
    );

    let beliefs = ctx.beliefs().read().await;
    let parcel = beliefs.parcel(&ParcelId::new("p1")).unwrap();
    assert!(!parcel.is_carried());
    assert_eq!(parcel.position, Position::new(3, 0));
}

#[tokio::test]
async fn test_collector_fails_when_teammate_cannot_act() {
    let (world, ctx) = corridor().await;
    world.queue_reply(handoff_ok(false));
    let library = PlanLibrary::standard(None);

    let intention = courier_agent::Intention::new(Predicate::collect(
        Position::new(0, 0),
        Position::new(6, 0),
        1.0,
    ));
    let outcome = intention.achieve(&ctx, &library).await;

    assert!(outcome.is_err());
    assert!(matches!(intention.status(), IntentionStatus::Failed { .. }));
    assert_eq!(
        requested_actions(&world),
        vec![HandoffAction::Move(Direction::Left)]
    );
}

#[tokio::test]
async fn test_collector_fails_when_teammate_is_silent() {
    let (world, ctx) = corridor().await;
    let library = PlanLibrary::standard(None);

    let intention = courier_agent::Intention::new(Predicate::collect(
        Position::new(0, 0),
        Position::new(6, 0),
        1.0,
    ));
    let outcome = intention.achieve(&ctx, &library).await;

    assert!(outcome.is_err());
    assert!(matches!(intention.status(), IntentionStatus::Failed { .. }));
    assert_eq!(requested_actions(&world).len(), 1);
    // the parcel was still left where bob can reach it
    assert_eq!(world.position(), Position::new(2, 0));
}

