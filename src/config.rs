//! Configuration Module
//!
//! Handles loading the store connection settings from environment variables.

use std::env;
use std::str::FromStr;

/// Loopback address used when `REDIS_HOST` is unset
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Standard Redis port used when `REDIS_PORT` is unset
pub const DEFAULT_PORT: u16 = 6379;

// == Backend ==
/// Which store implementation the facade talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Single Redis server over TCP
    Redis,
    /// In-process store, no server needed
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Backend::Redis),
            "memory" => Ok(Backend::Memory),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Connection configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis server host
    pub host: String,
    /// Redis server port
    pub port: u16,
    /// Store backend to connect to
    pub backend: Backend,
    /// Expiry sweep interval in seconds (memory backend only)
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_HOST` - Server host (default: 127.0.0.1)
    /// - `REDIS_PORT` - Server port (default: 6379)
    /// - `STORE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `CLEANUP_INTERVAL` - Memory sweep frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        Self {
            host: env::var("REDIS_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("REDIS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            backend: env::var("STORE_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Backend::Redis),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }

    /// Single-server address in `redis://host:port` form.
    pub fn address(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backend: Backend::Redis,
            cleanup_interval: 1,
        }
    }
}
