//! Tests for graceful shutdown handling

use super::health::{LifecycleState, RunOutcome};
use super::shutdown::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Test that shutdown channel works correctly
#[tokio::test]
async fn test_shutdown_channel_initially_not_shutdown() {
    let (_controller, signal) = shutdown_channel();

    // Initially not shutdown
    assert!(!signal.is_shutdown());
}

/// Test that shutdown can be triggered
#[tokio::test]
async fn test_shutdown_channel_triggers_shutdown() {
    let (controller, signal) = shutdown_channel();

    assert!(!signal.is_shutdown());

    controller.shutdown();

    assert!(signal.is_shutdown());
}

/// Test that triggering twice is the same as triggering once
#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (controller, mut signal) = shutdown_channel();

    controller.shutdown();
    controller.shutdown();

    assert!(signal.is_shutdown());
    let result = tokio::time::timeout(Duration::from_secs(1), signal.wait()).await;
    assert!(result.is_ok(), "wait() should complete after repeated shutdown");
}

/// Test that wait completes when shutdown is triggered
#[tokio::test]
async fn test_shutdown_wait_completes_on_signal() {
    let (controller, mut signal) = shutdown_channel();

    // Spawn task that triggers shutdown after delay
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.shutdown();
    });

    // This should complete when shutdown is triggered
    let result = tokio::time::timeout(Duration::from_secs(1), signal.wait()).await;

    assert!(
        result.is_ok(),
        "wait() should complete when shutdown triggered"
    );
    assert!(signal.is_shutdown());
}

/// Test that a dropped controller counts as shutdown
#[tokio::test]
async fn test_dropped_controller_releases_waiters() {
    let (controller, mut signal) = shutdown_channel();
    drop(controller);

    let result = tokio::time::timeout(Duration::from_secs(1), signal.wait()).await;
    assert!(result.is_ok(), "wait() should complete when controller dropped");
}

/// Test that cloned and subscribed signals all receive shutdown
#[tokio::test]
async fn test_shutdown_signal_clones_share_state() {
    let (controller, signal) = shutdown_channel();
    let signal2 = signal.clone();
    let signal3 = controller.signal();

    assert!(!signal.is_shutdown());
    assert!(!signal2.is_shutdown());
    assert!(!signal3.is_shutdown());

    controller.shutdown();

    assert!(signal.is_shutdown());
    assert!(signal2.is_shutdown());
    assert!(signal3.is_shutdown());
}

/// Accept loop that stops as soon as it is asked to
fn cooperative_loop(stop: oneshot::Receiver<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let _ = stop.await;
    })
}

/// Accept loop that ignores stop requests
fn stuck_loop() -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    })
}

#[tokio::test]
async fn test_supervise_stops_cooperative_loop_within_deadline() {
    let (controller, signal) = shutdown_channel();
    let state = Arc::new(LifecycleState::new(None));
    let (stop_tx, stop_rx) = oneshot::channel();
    let accept = cooperative_loop(stop_rx);

    let watcher = tokio::spawn(supervise_accept_loop(
        signal,
        accept,
        stop_tx,
        Duration::from_secs(5),
        state.clone(),
    ));

    controller.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .expect("watcher should finish well before the deadline")
        .expect("watcher panicked");
    assert!(result.is_ok());
    // Nothing forced, so the watcher records no outcome of its own
    assert!(state.outcome().is_none());
}

#[tokio::test]
async fn test_supervise_reports_incomplete_and_aborts_stuck_loop() {
    let (controller, signal) = shutdown_channel();
    let state = Arc::new(LifecycleState::new(None));
    let (stop_tx, _stop_rx) = oneshot::channel();
    let accept = stuck_loop();

    let watcher = tokio::spawn(supervise_accept_loop(
        signal,
        accept,
        stop_tx,
        Duration::from_millis(100),
        state.clone(),
    ));

    controller.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(2), watcher)
        .await
        .expect("watcher should give up at the deadline")
        .expect("watcher panicked");
    match result {
        Err(ShutdownError::Incomplete(timeout)) => {
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("expected Incomplete, got {:?}", other),
    }
    assert_eq!(state.outcome(), Some(&RunOutcome::Stopped));
}

#[tokio::test]
async fn test_supervise_exits_when_loop_ends_on_its_own() {
    let (_controller, signal) = shutdown_channel();
    let state = Arc::new(LifecycleState::new(None));
    let (stop_tx, _stop_rx) = oneshot::channel();
    let accept = tokio::spawn(async {});

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        supervise_accept_loop(signal, accept, stop_tx, Duration::from_secs(5), state),
    )
    .await
    .expect("watcher should not wait for a signal once the loop is gone");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_supervise_records_panicked_loop_as_failure() {
    let (_controller, signal) = shutdown_channel();
    let state = Arc::new(LifecycleState::new(None));
    let (stop_tx, _stop_rx) = oneshot::channel();
    let accept = tokio::spawn(async { panic!("accept loop exploded") });

    let result =
        supervise_accept_loop(signal, accept, stop_tx, Duration::from_secs(5), state.clone()).await;

    assert!(matches!(result, Err(ShutdownError::TaskFailed(_))));
    assert!(matches!(state.outcome(), Some(RunOutcome::Failed(_))));
}
