//! Business service injected into the lifecycle supervisor
//!
//! The supervisor only needs `HealthCheck`; the request dispatcher needs the
//! full `Service`. Both are traits so tests can swap in `MockService`
//! (toggleable health) the same way `GreetingService` is used in production.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can report its own health
///
/// Any `Err` counts as unhealthy; there are no partial states.
pub trait HealthCheck: Send + Sync {
    fn health_check(&self) -> Result<(), ServiceError>;
}

/// Greeting business logic
pub trait Service: HealthCheck {
    fn hello(&self, name: &str) -> Result<HelloMessage, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloMessage {
    pub message: String,
}

/// In-process greeting service
///
/// Holds no external resources, so it always reports healthy.
#[derive(Debug, Clone)]
pub struct GreetingService {
    greeting: String,
}

impl GreetingService {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
        }
    }
}

impl Default for GreetingService {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_GREETING)
    }
}

impl HealthCheck for GreetingService {
    fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

impl Service for GreetingService {
    fn hello(&self, name: &str) -> Result<HelloMessage, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::EmptyName);
        }

        Ok(HelloMessage {
            message: format!("{}, {}!", self.greeting, name),
        })
    }
}

/// Mock service for testing with controllable health
#[cfg(test)]
pub struct MockService {
    healthy: std::sync::atomic::AtomicBool,
    health_calls: std::sync::atomic::AtomicUsize,
    inner: GreetingService,
}

#[cfg(test)]
impl MockService {
    pub fn healthy() -> Self {
        Self::with_health(true)
    }

    pub fn unhealthy() -> Self {
        Self::with_health(false)
    }

    fn with_health(healthy: bool) -> Self {
        Self {
            healthy: std::sync::atomic::AtomicBool::new(healthy),
            health_calls: std::sync::atomic::AtomicUsize::new(0),
            inner: GreetingService::default(),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy
            .store(healthy, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of times `health_check` has been called
    pub fn health_calls(&self) -> usize {
        self.health_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl HealthCheck for MockService {
    fn health_check(&self) -> Result<(), ServiceError> {
        self.health_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ServiceError::Unavailable("storage issue".to_string()))
        }
    }
}

#[cfg(test)]
impl Service for MockService {
    fn hello(&self, name: &str) -> Result<HelloMessage, ServiceError> {
        self.health_check()?;
        self.inner.hello(name)
    }
}
