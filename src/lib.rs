//! greetd: a greeting HTTP service with a supervised lifecycle
//!
//! The business endpoint is deliberately small; the interesting part is
//! `server::Supervisor`, which starts the listener, tracks readiness,
//! aggregates health from the injected service, and shuts down within a
//! bounded deadline.

pub mod api;
pub mod config;
pub mod server;
pub mod service;
