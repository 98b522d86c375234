//! Lifecycle state and health aggregation
//!
//! - `/healthz` - Liveness: Is the process alive?
//! - `/readyz` - Readiness: Started, accept loop healthy, dependency healthy?
//!
//! Health folds three independent signals, checked in this order so the
//! first actionable cause is reported:
//! 1. readiness (`NotReady`)
//! 2. accept-loop outcome (`RunFailure`)
//! 3. dependency health (`DependencyUnhealthy`)

use crate::service::HealthCheck;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HealthError {
    #[error("server is not ready yet")]
    NotReady,

    #[error("server run failure: {0}")]
    RunFailure(String),

    #[error("dependency unhealthy: {0}")]
    DependencyUnhealthy(String),
}

/// How the accept loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped on request (graceful or forced shutdown)
    Stopped,
    /// Terminated abnormally: bind failure or transport error
    Failed(String),
}

/// Shared lifecycle state of one supervisor
///
/// `ready` goes false -> true once and never back; it means "start sequence
/// completed", not "currently accepting". `outcome` is written at most once.
/// Both are single-writer, multi-reader.
pub struct LifecycleState {
    ready: AtomicBool,
    outcome: OnceLock<RunOutcome>,
    dependency: Option<Arc<dyn HealthCheck>>,
}

impl LifecycleState {
    /// Create a new lifecycle state (initially not ready, no outcome)
    pub fn new(dependency: Option<Arc<dyn HealthCheck>>) -> Self {
        Self {
            ready: AtomicBool::new(false),
            outcome: OnceLock::new(),
            dependency,
        }
    }

    /// Mark the start sequence as complete
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Record how the accept loop ended
    ///
    /// Returns false if an outcome was already recorded; the first one wins.
    pub fn record_outcome(&self, outcome: RunOutcome) -> bool {
        self.outcome.set(outcome).is_ok()
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.get()
    }

    /// Aggregate health; the dependency is asked on every call
    pub fn check(&self) -> Result<(), HealthError> {
        evaluate(self.is_ready(), self.outcome(), self.dependency.as_deref())
    }
}

impl std::fmt::Debug for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleState")
            .field("ready", &self.is_ready())
            .field("outcome", &self.outcome())
            .field("has_dependency", &self.dependency.is_some())
            .finish()
    }
}

/// Pure health aggregation over the three lifecycle signals
pub fn evaluate(
    ready: bool,
    outcome: Option<&RunOutcome>,
    dependency: Option<&dyn HealthCheck>,
) -> Result<(), HealthError> {
    if !ready {
        return Err(HealthError::NotReady);
    }

    if let Some(RunOutcome::Failed(reason)) = outcome {
        return Err(HealthError::RunFailure(reason.clone()));
    }

    match dependency {
        None => Err(HealthError::DependencyUnhealthy(
            "no dependency configured".to_string(),
        )),
        Some(dep) => dep
            .health_check()
            .map_err(|e| HealthError::DependencyUnhealthy(e.to_string())),
    }
}

/// Liveness probe handler
///
/// Always returns 200 OK - if this responds, the process is alive.
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler
///
/// Returns 200 OK if healthy, 503 Service Unavailable with the cause if not.
async fn readyz(State(state): State<Arc<LifecycleState>>) -> (StatusCode, String) {
    match state.check() {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Health routes the supervisor puts in front of the dispatcher
pub fn health_routes(state: Arc<LifecycleState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}
