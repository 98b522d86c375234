//! Graceful shutdown handling for greetd
//!
//! Turns a cancellation signal into a bounded-time stop of the listener:
//! - Stops accepting new connections
//! - Lets in-flight requests drain until the deadline
//! - Force-closes whatever is left at the deadline
//!
//! The deadline starts when the signal fires, not when the server starts.

use super::health::{LifecycleState, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("graceful shutdown did not finish within {0:?}; remaining connections were closed")]
    Incomplete(Duration),

    #[error("server task failed: {0}")]
    TaskFailed(String),
}

/// Receiving side of the cancellation signal
///
/// Cloned and handed to every component that must react to shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for shutdown signal
    ///
    /// Returns immediately if shutdown was already requested. A dropped
    /// controller counts as a shutdown request.
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                break;
            }
        }
    }

    /// Check if shutdown was signaled (non-blocking)
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Sending side of the cancellation signal
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    /// Trigger shutdown
    ///
    /// Idempotent: only the first call has an effect.
    pub fn shutdown(&self) {
        if self.sender.send_replace(true) {
            debug!("Shutdown already requested, ignoring");
        } else {
            info!("Shutdown signal sent");
        }
    }

    /// Subscribe a new signal receiver
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Create a new shutdown signal pair
///
/// Returns (controller, signal) where:
/// - controller: Used to trigger shutdown
/// - signal: Cloned and passed to components that need to listen
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// Watch the accept loop and stop it when the signal fires
///
/// Ends when either the accept loop exits on its own (nothing to stop) or a
/// shutdown has run to completion. Only the first signal matters; the
/// watcher exits after handling it.
pub(crate) async fn supervise_accept_loop(
    mut signal: ShutdownSignal,
    mut accept: JoinHandle<()>,
    stop: oneshot::Sender<()>,
    timeout: Duration,
    state: Arc<LifecycleState>,
) -> Result<(), ShutdownError> {
    tokio::select! {
        joined = &mut accept => {
            debug!("Accept loop exited before any shutdown request");
            return check_join(joined, &state);
        }
        _ = signal.wait() => {}
    }

    info!(timeout = ?timeout, "Initiating graceful shutdown");
    // The accept loop may already be gone, in which case nobody listens.
    let _ = stop.send(());

    match tokio::time::timeout(timeout, &mut accept).await {
        Ok(joined) => {
            check_join(joined, &state)?;
            info!("Server shut down gracefully");
            Ok(())
        }
        Err(_) => {
            accept.abort();
            // Cancellation is the expected result here.
            let _ = accept.await;
            state.record_outcome(RunOutcome::Stopped);
            let err = ShutdownError::Incomplete(timeout);
            warn!(error = %err, "Shutdown incomplete");
            Err(err)
        }
    }
}

fn check_join(joined: Result<(), JoinError>, state: &LifecycleState) -> Result<(), ShutdownError> {
    joined.map_err(|e| {
        error!(error = %e, "Accept loop task failed");
        state.record_outcome(RunOutcome::Failed(format!("accept loop task failed: {}", e)));
        ShutdownError::TaskFailed(e.to_string())
    })
}

/// Wait for SIGTERM or SIGINT signal
///
/// This function blocks until a termination signal is received.
/// Returns the signal name that was received.
///
/// # Panics
/// Panics if signal handlers cannot be registered (OS resource exhaustion).
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to register SIGTERM handler");
            panic!("Cannot register SIGTERM handler: {}", e);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to register SIGINT handler");
            panic!("Cannot register SIGINT handler: {}", e);
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
            "SIGTERM"
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
            "SIGINT"
        }
    }
}

/// Wait for Ctrl+C signal (Windows)
///
/// # Panics
/// Panics if Ctrl+C handler cannot be registered.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to wait for Ctrl+C");
        panic!("Cannot wait for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C");
    "CTRL_C"
}
