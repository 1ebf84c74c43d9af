//! Runtime configuration from environment variables.
//!
//! Only the node endpoint is required; everything else falls back to a
//! default with a warning when missing or unparseable.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::warn;

/// Monitor runtime configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Primary JSON-RPC endpoint.
    pub node_endpoint: String,
    /// Optional fallback endpoint for failover.
    pub fallback_node_endpoint: Option<String>,
    /// Chain id served by the endpoints; `eth_chainId` is answered
    /// locally with this value.
    pub chain_id: u64,
    /// RPC attempts per endpoint before failover.
    pub retry_attempts: u32,
    /// Delay between RPC attempts.
    pub retry_delay: Duration,
    /// Blocks per transfer-log scan window.
    pub transfer_events_batch: u64,
    /// Concurrent per-holder reads in a fetch phase.
    pub fetch_concurrency: usize,
    /// Sleep between successful sweeps.
    pub parse_interval: Duration,
    /// Sleep after a failed sweep.
    pub error_cooldown: Duration,
    /// Optional REST price feed for oracle cross-checking.
    pub price_feed_endpoint: Option<String>,
    /// Maximum accepted feed point age relative to the pinned block.
    pub price_feed_max_age: Duration,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        let node_endpoint = match env::var("NODE_ENDPOINT") {
            Ok(url) => url,
            Err(_) => bail!("NODE_ENDPOINT environment variable is required"),
        };
        if node_endpoint.starts_with("wss://") || node_endpoint.starts_with("ws://") {
            bail!("only http[s] node endpoints are supported");
        }

        Ok(Self {
            node_endpoint,
            fallback_node_endpoint: env::var("FALLBACK_NODE_ENDPOINT").ok(),
            chain_id: getenv("CHAIN_ID", 1),
            // Zero attempts or a zero-block window make no sense; both
            // knobs are clamped to at least one.
            retry_attempts: getenv("HTTP_REQUESTS_RETRY", 3).max(1),
            retry_delay: Duration::from_secs(getenv("HTTP_REQUESTS_DELAY", 1)),
            transfer_events_batch: getenv("TRANSFER_EVENTS_BATCH", 100_000).max(1),
            fetch_concurrency: getenv("FETCH_CONCURRENCY", 16),
            parse_interval: Duration::from_secs(getenv("PARSE_INTERVAL", 900)),
            error_cooldown: Duration::from_secs(getenv("MAIN_ERROR_COOLDOWN", 60)),
            price_feed_endpoint: env::var("PRICE_FEED_ENDPOINT").ok(),
            price_feed_max_age: Duration::from_secs(getenv("PRICE_FEED_MAX_AGE", 86_400)),
        })
    }
}

/// Read an env var, falling back to `default` with a warning when the
/// value is present but unparseable.
fn getenv<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(name) {
        Err(_) => default,
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(name, value = %raw, %default, "Failed to parse environment variable, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_values_fall_back() {
        env::set_var("TEST_GETENV_BAD", "not-a-number");
        assert_eq!(getenv::<u64>("TEST_GETENV_BAD", 42), 42);
        env::remove_var("TEST_GETENV_BAD");
    }

    #[test]
    fn zero_knobs_are_clamped_to_one() {
        env::set_var("NODE_ENDPOINT", "http://localhost:8545");
        env::set_var("HTTP_REQUESTS_RETRY", "0");
        env::set_var("TRANSFER_EVENTS_BATCH", "0");

        let config = MonitorConfig::from_env().unwrap();
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.transfer_events_batch, 1);

        env::remove_var("NODE_ENDPOINT");
        env::remove_var("HTTP_REQUESTS_RETRY");
        env::remove_var("TRANSFER_EVENTS_BATCH");
    }

    #[test]
    fn present_values_win() {
        env::set_var("TEST_GETENV_OK", "7");
        assert_eq!(getenv::<u64>("TEST_GETENV_OK", 42), 7);
        env::remove_var("TEST_GETENV_OK");
    }
}
