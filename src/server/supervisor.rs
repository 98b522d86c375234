//! Lifecycle supervisor for the HTTP service
//!
//! Owns the listener and the request dispatcher, starts serving in the
//! background, exposes aggregated health, and stops the server within a
//! bounded deadline when the shutdown signal fires.
//!
//! ## Lifecycle
//! ```text
//! new() ──▶ run() ──▶ [bind] ──▶ ready ──▶ accept loop ─┐
//!                        │                               │ signal
//!                        └─ bind error: RunFailure       ▼
//!                                              drain until deadline
//!                                                        │
//!                                               force-close the rest
//! ```
//!
//! `ready` is set only after the bind outcome is known. A `health_check`
//! issued after `run` returns therefore never reports success for a
//! listener that failed to bind.

use super::dispatcher::build_router;
use super::health::{health_routes, HealthError, LifecycleState, RunOutcome};
use super::listener::{self, Acceptor};
use super::shutdown::{supervise_accept_loop, ShutdownError, ShutdownSignal};
use crate::config::ServerConfig;
use crate::service::{HealthCheck, Service};
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("supervisor has already been started")]
    AlreadyStarted,
}

pub struct Supervisor {
    config: ServerConfig,
    /// Taken by the first `run`; `None` afterwards
    dispatcher: Mutex<Option<Router>>,
    state: Arc<LifecycleState>,
    local_addr: OnceLock<SocketAddr>,
}

impl Supervisor {
    /// Create a supervisor around a dispatcher and a health dependency
    ///
    /// `/healthz` and `/readyz` are answered by the supervisor; every other
    /// request falls through to the dispatcher, which is never replaced
    /// afterwards. Health paths the dispatcher also defines are shadowed.
    pub fn new(
        config: ServerConfig,
        dispatcher: Router,
        dependency: Option<Arc<dyn HealthCheck>>,
    ) -> Self {
        let state = Arc::new(LifecycleState::new(dependency));
        let dispatcher = health_routes(state.clone()).fallback_service(dispatcher);

        Self {
            config,
            dispatcher: Mutex::new(Some(dispatcher)),
            state,
            local_addr: OnceLock::new(),
        }
    }

    /// Create a supervisor serving the greeting API of `service`
    ///
    /// The same service is the health dependency.
    pub fn for_service<S>(config: ServerConfig, service: Arc<S>) -> Self
    where
        S: Service + 'static,
    {
        let dispatcher = build_router(service.clone());
        Self::new(config, dispatcher, Some(service))
    }

    /// Bind the listener and start serving in the background
    ///
    /// Returns once the bind outcome is recorded and readiness is set; the
    /// accept loop keeps running on its own task. A bind failure is not
    /// returned here: it shows up as `HealthError::RunFailure`.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<SupervisorHandle, SupervisorError> {
        let dispatcher = self.take_dispatcher()?;
        let addr = self.config.socket_addr();

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %addr, error = %e, "Failed to bind listener");
                self.state
                    .record_outcome(RunOutcome::Failed(format!("failed to bind {}: {}", addr, e)));
                self.state.set_ready();
                return Ok(SupervisorHandle { watcher: None });
            }
        };

        let local_addr = listener.local_addr().unwrap_or(addr);
        let _ = self.local_addr.set(local_addr);
        info!(addr = %local_addr, "Server listening (HTTP)");

        Ok(self.start(listener, dispatcher, shutdown))
    }

    /// Spawn the accept loop and its shutdown watcher, then mark ready
    ///
    /// An accept error after this point ends the loop and is recorded as
    /// `RunOutcome::Failed`.
    pub(super) fn start<A: Acceptor>(
        &self,
        acceptor: A,
        dispatcher: Router,
        shutdown: ShutdownSignal,
    ) -> SupervisorHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let accept_state = self.state.clone();
        let accept = tokio::spawn(async move {
            let outcome = match listener::serve(acceptor, dispatcher, stop_rx).await {
                Ok(()) => RunOutcome::Stopped,
                Err(e) => {
                    error!(error = %e, "Accept loop failed");
                    RunOutcome::Failed(e.to_string())
                }
            };
            info!(outcome = ?outcome, "Accept loop ended");
            accept_state.record_outcome(outcome);
        });

        let watcher = tokio::spawn(supervise_accept_loop(
            shutdown,
            accept,
            stop_tx,
            self.config.shutdown_timeout,
            self.state.clone(),
        ));

        self.state.set_ready();
        info!("Server ready");

        SupervisorHandle {
            watcher: Some(watcher),
        }
    }

    /// Aggregated health: readiness, then accept-loop outcome, then dependency
    pub fn health_check(&self) -> Result<(), HealthError> {
        self.state.check()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// How the accept loop ended, if it has
    pub fn run_outcome(&self) -> Option<RunOutcome> {
        self.state.outcome().cloned()
    }

    /// Address actually bound (resolves port 0); `None` before a successful bind
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    fn take_dispatcher(&self) -> Result<Router, SupervisorError> {
        self.dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SupervisorError::AlreadyStarted)
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Handle for waiting until the server has fully terminated
///
/// Owns the shutdown watcher, which in turn owns the accept loop.
#[derive(Debug)]
pub struct SupervisorHandle {
    watcher: Option<JoinHandle<Result<(), ShutdownError>>>,
}

impl SupervisorHandle {
    /// Wait for the accept loop to end and any shutdown to finish
    ///
    /// Returns `ShutdownError::Incomplete` when the drain hit the deadline
    /// and connections were force-closed. Returns immediately if the
    /// listener never bound.
    pub async fn wait(self) -> Result<(), ShutdownError> {
        match self.watcher {
            None => Ok(()),
            Some(watcher) => watcher
                .await
                .map_err(|e| ShutdownError::TaskFailed(e.to_string()))?,
        }
    }

    /// Whether the server tasks have finished
    pub fn is_finished(&self) -> bool {
        self.watcher.as_ref().map_or(true, JoinHandle::is_finished)
    }
}
