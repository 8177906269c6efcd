//! Start/stop behaviour: nothing of a stopped run may reach the published
//! state afterwards.

use lib_feed::{ConnectionState, CycleOutcome, FeedConfig, FeedError};
use project_tests::{scheduler, ScriptedSource};
use std::time::Duration;
use tokio::time::sleep;

const ONE_COIN: u64 = 100_000_000;

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_in_flight_fetch() {
    let source = ScriptedSource::slow(ONE_COIN, Duration::from_secs(2));
    let config = FeedConfig { fetch_timeout_ms: 10_000, ..FeedConfig::default() };
    let mut feed = scheduler(config, source.clone());
    feed.start().unwrap();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(source.completed(), 0);

    feed.stop().await;
    assert!(!feed.is_running());
    let snap = feed.snapshot();
    assert_eq!(snap.connection, ConnectionState::Disconnected);
    assert!(snap.event.is_none());
    assert_eq!(snap.total_events_shown, 0);

    let rx = feed.subscribe();
    sleep(Duration::from_secs(60)).await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(source.calls(), 1);
    assert_eq!(source.completed(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_dwell_cancels_countdown() {
    let config = FeedConfig { flag_probability: 1.0, ..FeedConfig::default() };
    let source = ScriptedSource::unique(15 * ONE_COIN);
    let mut feed = scheduler(config, source.clone());
    feed.start().unwrap();

    sleep(Duration::from_secs(2)).await;
    assert!(feed.snapshot().event.unwrap().flagged);

    feed.stop().await;
    let rx = feed.subscribe();
    sleep(Duration::from_secs(30)).await;

    assert!(!rx.has_changed().unwrap());
    assert_eq!(source.calls(), 1);
    let snap = feed.snapshot();
    assert_eq!(snap.connection, ConnectionState::Disconnected);
    assert_eq!(snap.total_events_shown, 1);
    assert_eq!(snap.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let mut feed = scheduler(FeedConfig::default(), ScriptedSource::unique(ONE_COIN));
    feed.stop().await;
    assert_eq!(feed.snapshot().connection, ConnectionState::Disconnected);

    feed.start().unwrap();
    feed.stop().await;
    feed.stop().await;
    assert_eq!(feed.snapshot().connection, ConnectionState::Disconnected);
    assert_eq!(feed.refresh().await, CycleOutcome::NotRunning);
}

#[tokio::test(start_paused = true)]
async fn test_restart_resumes_pool_from_start_and_keeps_rate_window() {
    let source = ScriptedSource::unique(ONE_COIN);
    let mut feed = scheduler(FeedConfig::default(), source.clone());

    feed.start().unwrap();
    sleep(Duration::from_millis(10)).await;
    feed.stop().await;
    assert_eq!(source.calls(), 1);

    // Restarting 1 s later: the live source is still inside its window.
    sleep(Duration::from_secs(1)).await;
    feed.start().unwrap();
    assert!(matches!(feed.start(), Err(FeedError::AlreadyRunning)));
    sleep(Duration::from_millis(10)).await;

    let snap = feed.snapshot();
    assert_eq!(source.calls(), 1);
    assert_eq!(snap.connection, ConnectionState::Fallback);
    assert_eq!(snap.total_events_shown, 1);
    assert_eq!(snap.event.unwrap().id, "sim-0");

    feed.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropping_scheduler_stops_the_loop() {
    let source = ScriptedSource::unique(ONE_COIN);
    let mut feed = scheduler(FeedConfig::default(), source.clone());
    feed.start().unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(source.calls(), 1);

    drop(feed);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), 1);
}
