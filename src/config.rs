//! Relay server configuration
//!
//! Read from the environment with sensible defaults; every knob can also be
//! set directly when embedding the relay in another process.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the relay server binary.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// TCP port to bind (`PORT`)
    pub port: u16,

    /// Interval between `heartbeat` broadcasts (`PULSE_HEARTBEAT_MS`)
    pub heartbeat_interval: Duration,

    /// Interval between batcher flushes (`PULSE_FLUSH_MS`)
    pub flush_interval: Duration,

    /// Buffer size that forces an early flush (`PULSE_MAX_BATCH`)
    pub max_batch_size: usize,

    /// Broadcast channel capacity; slow clients past this lose messages
    pub broadcast_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            heartbeat_interval: Duration::from_secs(30),
            flush_interval: Duration::from_secs(15),
            max_batch_size: 100,
            broadcast_capacity: 1024,
        }
    }
}

impl RelayConfig {
    /// Build a config from the process environment, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_or("PORT", defaults.port),
            heartbeat_interval: Duration::from_millis(env_or(
                "PULSE_HEARTBEAT_MS",
                defaults.heartbeat_interval.as_millis() as u64,
            )),
            flush_interval: Duration::from_millis(env_or(
                "PULSE_FLUSH_MS",
                defaults.flush_interval.as_millis() as u64,
            )),
            max_batch_size: env_or("PULSE_MAX_BATCH", defaults.max_batch_size),
            broadcast_capacity: defaults.broadcast_capacity,
        }
    }
}

/// Parse an environment variable, falling back to `default` when the
/// variable is absent or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}
