//! Poll scheduler: snapshot handling, link capture and the outer loop.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

mod common;

use std::time::Duration;

use adept_core::engine::ReconciliationEngine;
use adept_core::gateway::RawResponse;
use adept_core::scheduler::{FatalError, PollScheduler, SchedulerConfig, SkipReason, TickOutcome};
use adept_types::{FollowerId, MissionId, ProgressId};
use common::{
    Call, ScriptedGateway, follower, game_error, login_page, mission, snapshot_reply, state,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};

fn scheduler(snapshot_auth_retries: u32) -> PollScheduler<StdRng> {
    PollScheduler::new(
        SchedulerConfig {
            interval_minutes: 6,
            snapshot_auth_retries,
        },
        ReconciliationEngine::default(),
        StdRng::seed_from_u64(42),
    )
}

fn spec_with_mission() -> Value {
    state(
        vec![],
        vec![mission(1, "Mining", 60, 1, &[], 0)],
        vec![follower(10, 1.0, 1, false)],
        json!({}),
    )
}

fn without_links(mut spec: Value) -> Value {
    if let Some(object) = spec.as_object_mut() {
        object.remove("finishProgressOperationLink");
        object.remove("fuseOperationLink");
    }
    spec
}

#[tokio::test]
async fn first_snapshot_without_links_is_fatal() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new().snapshot(snapshot_reply(without_links(spec_with_mission())));

    let result = scheduler.tick(&mut gateway).await;

    assert!(matches!(result, Err(FatalError::MissingActionLinks)));
    assert!(gateway.started().is_empty());
}

#[tokio::test]
async fn later_snapshot_without_links_keeps_the_captured_ones() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new()
        .snapshot(snapshot_reply(spec_with_mission()))
        .snapshot(snapshot_reply(without_links(spec_with_mission())))
        .start(game_error("Busy"))
        .start(game_error("Busy"));

    let first = scheduler.tick(&mut gateway).await.unwrap();
    let second = scheduler.tick(&mut gateway).await.unwrap();

    assert!(matches!(first, TickOutcome::Reconciled(_)));
    assert!(matches!(second, TickOutcome::Reconciled(_)));
    assert!(scheduler.links().is_some());
    assert_eq!(gateway.started().len(), 2);
    assert!(gateway.started().iter().all(|(m, _)| *m == MissionId::new(1)));
}

#[tokio::test]
async fn tick_replaces_the_store_and_pings_health() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new()
        .snapshot(snapshot_reply(spec_with_mission()))
        .start(game_error("Busy"));

    let outcome = scheduler.tick(&mut gateway).await.unwrap();

    let TickOutcome::Reconciled(summary) = outcome else {
        panic!("expected a reconciled tick");
    };
    assert!(summary.converged);
    assert_eq!(scheduler.store().missions().len(), 1);
    assert_eq!(scheduler.store().followers().len(), 1);
    assert_eq!(gateway.calls.first(), Some(&Call::Snapshot));
    assert_eq!(gateway.calls.last(), Some(&Call::Ping));
}

#[tokio::test]
async fn expired_session_is_restored_before_reconciling() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new()
        .snapshot(login_page())
        .snapshot(snapshot_reply(spec_with_mission()))
        .start(game_error("Busy"));

    let outcome = scheduler.tick(&mut gateway).await.unwrap();

    assert!(matches!(outcome, TickOutcome::Reconciled(_)));
    assert_eq!(
        gateway.calls[..3],
        [Call::Snapshot, Call::Reauth, Call::Snapshot]
    );
}

#[tokio::test]
async fn exhausted_auth_retries_skip_the_tick() {
    let mut scheduler = scheduler(2);
    let mut gateway = ScriptedGateway::new()
        .snapshot(login_page())
        .snapshot(login_page())
        .snapshot(login_page());

    let outcome = scheduler.tick(&mut gateway).await.unwrap();

    assert_eq!(outcome, TickOutcome::Skipped(SkipReason::AuthExpired));
    assert_eq!(gateway.count(&Call::Reauth), 2);
    assert_eq!(gateway.count(&Call::Snapshot), 3);
    assert_eq!(gateway.count(&Call::Ping), 0);
}

#[tokio::test]
async fn malformed_snapshot_leaves_previous_state() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new()
        .snapshot(snapshot_reply(spec_with_mission()))
        .snapshot(RawResponse::json(&json!({"unexpected": true})))
        .start(game_error("Busy"));

    scheduler.tick(&mut gateway).await.unwrap();
    let before = scheduler.store().clone();
    let outcome = scheduler.tick(&mut gateway).await.unwrap();

    assert_eq!(outcome, TickOutcome::Skipped(SkipReason::Malformed));
    assert_eq!(scheduler.store(), &before);
}

#[tokio::test]
async fn inverted_progress_window_does_not_skip_the_tick() {
    let mut scheduler = scheduler(3);
    let inverted = json!({
        "id": 100,
        "finished": true,
        "startTime": 2_000,
        "endTime": 1_000,
        "fuseData": {"missionId": 50}
    });
    let spec = state(
        vec![inverted],
        vec![mission(1, "Mining", 60, 1, &[], 0)],
        vec![follower(10, 1.0, 1, false)],
        json!({}),
    );
    let mut gateway = ScriptedGateway::new()
        .snapshot(snapshot_reply(spec))
        .finish(game_error("NotReady"))
        .start(game_error("Busy"));

    let outcome = scheduler.tick(&mut gateway).await.unwrap();

    assert!(matches!(outcome, TickOutcome::Reconciled(_)));
    assert!(scheduler.links().is_some());
    assert_eq!(scheduler.store().progresses().len(), 1);
    assert_eq!(
        gateway.calls,
        vec![
            Call::Snapshot,
            Call::Finish(ProgressId::new(100)),
            Call::Start(MissionId::new(1), vec![FollowerId::new(10)]),
            Call::Ping,
        ]
    );
}

#[tokio::test]
async fn transport_failure_skips_the_tick() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new();

    let outcome = scheduler.tick(&mut gateway).await.unwrap();

    assert_eq!(outcome, TickOutcome::Skipped(SkipReason::Transport));
    assert_eq!(gateway.calls, vec![Call::Snapshot]);
}

#[tokio::test(start_paused = true)]
async fn run_stops_on_a_fatal_first_snapshot() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new().snapshot(snapshot_reply(without_links(json!({}))));

    let result = scheduler.run(&mut gateway).await;

    assert!(matches!(result, Err(FatalError::MissingActionLinks)));
}

#[tokio::test(start_paused = true)]
async fn run_keeps_polling_at_jittered_intervals() {
    let mut scheduler = scheduler(3);
    let mut gateway = ScriptedGateway::new();

    let timed_out = tokio::time::timeout(Duration::from_secs(3_600), scheduler.run(&mut gateway))
        .await
        .is_err();

    assert!(timed_out);
    // One poll at start, then one every 270..=450 seconds.
    let polls = gateway.count(&Call::Snapshot);
    assert!((8..=14).contains(&polls), "{polls} polls in an hour");
}
