//! Runtime configuration for greetd
//!
//! All settings come from environment variables and fall back to defaults
//! when unset:
//! - `GREETD_BIND_ADDRESS` - address to listen on (default: 0.0.0.0)
//! - `GREETD_PORT` - port to listen on (default: 8080)
//! - `GREETD_SHUTDOWN_TIMEOUT_SECS` - upper bound on graceful drain before
//!   remaining connections are force-closed (default: 5)
//! - `GREETD_GREETING` - greeting prefix used by the hello endpoint (default: Hello)
//!
//! A variable that is set but cannot be parsed is an error rather than a
//! silent fallback.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Default port for the HTTP listener
pub const DEFAULT_PORT: u16 = 8080;

/// Default upper bound on graceful shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default greeting prefix
pub const DEFAULT_GREETING: &str = "Hello";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Listener and shutdown settings for the lifecycle supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `GREETD_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_address =
            parse_var(&lookup, "GREETD_BIND_ADDRESS")?.unwrap_or(defaults.bind_address);
        let port = parse_var(&lookup, "GREETD_PORT")?.unwrap_or(defaults.port);
        let shutdown_timeout = parse_var::<u64, _>(&lookup, "GREETD_SHUTDOWN_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.shutdown_timeout);

        Ok(Self {
            bind_address,
            port,
            shutdown_timeout,
        })
    }

    pub fn with_bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Socket address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Greeting prefix for `GreetingService`, from `GREETD_GREETING`
pub fn greeting_from_env() -> String {
    greeting_from_lookup(|name| std::env::var(name).ok())
}

fn greeting_from_lookup<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("GREETD_GREETING")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_GREETING.to_string())
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        })
}
