//! Peer timing configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// Bounds applied to every read, every write, and the liveness period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerConfig {
    /// How long the dispatch loop waits for the next frame before the peer
    /// is considered dead.
    pub read_timeout: Duration,
    /// How long a single write may hold the write lock.
    pub write_timeout: Duration,
    /// Period of the liveness task.
    pub heartbeat_interval: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
        }
    }
}

impl PeerConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `PEER_READ_TIMEOUT_MS`: default 20000
    /// - `PEER_WRITE_TIMEOUT_MS`: default 20000
    /// - `PEER_HEARTBEAT_INTERVAL_MS`: default 1000
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unparseable or zero
    /// values fall back to the defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: u64| {
            let value = lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default);
            Duration::from_millis(value)
        };

        Self {
            read_timeout: millis("PEER_READ_TIMEOUT_MS", DEFAULT_READ_TIMEOUT_MS),
            write_timeout: millis("PEER_WRITE_TIMEOUT_MS", DEFAULT_WRITE_TIMEOUT_MS),
            heartbeat_interval: millis("PEER_HEARTBEAT_INTERVAL_MS", DEFAULT_HEARTBEAT_INTERVAL_MS),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
