//! HTTP server and its lifecycle supervisor
//!
//! Serves the greeting API plus health probes:
//! - `/api/hello/{name}`, `/api/hello?name=` - Greeting endpoints
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (started, serving, dependency healthy)
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod dispatcher;
mod health;
mod listener;
pub mod shutdown;
mod supervisor;

pub use dispatcher::{build_router, say_hello};
pub use health::{evaluate, HealthError, LifecycleState, RunOutcome};
pub use shutdown::{
    shutdown_channel, wait_for_signal, ShutdownController, ShutdownError, ShutdownSignal,
};
pub use supervisor::{Supervisor, SupervisorError, SupervisorHandle};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;

#[cfg(test)]
#[path = "supervisor_test.rs"]
mod supervisor_tests;
