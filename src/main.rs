//! AAVE Collateral Risk Monitor
//!
//! Samples on-chain lending state at pinned blocks and classifies
//! collateral positions into risk zones. Features:
//! - Holder discovery from aToken Transfer logs
//! - Pinned-block fan-out fetching over a failover JSON-RPC transport
//! - Health-factor risk zones across behavioral bins
//! - Optional external price feed cross-checking

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use monitor_api::PriceFeed;
use monitor_chain::{
    HttpEndpoint, ResilientTransport, RetryConfig, RpcEndpoint, RpcMetrics,
};
use monitor_core::{positions, Monitor, MonitorConfig, Reporter, RiskLabel, ZoneStat};

/// Log-based sink for both RPC metrics and cycle results.
struct TraceMetrics;

impl RpcMetrics for TraceMetrics {
    fn rpc_call(&self, domain: &str, method: &str, code: i64, elapsed: Duration) {
        tracing::debug!(
            domain,
            method,
            code,
            elapsed_ms = elapsed.as_millis() as u64,
            "RPC call"
        );
    }
}

impl Reporter for TraceMetrics {
    fn zone(&self, position: &str, bin: usize, label: RiskLabel, stat: &ZoneStat) {
        info!(
            position,
            bin,
            zone = %label,
            count = stat.count,
            amount = stat.amount,
            value = stat.value,
            percent = stat.percent,
            "Zone distribution"
        );
    }

    fn fetch_duration(&self, position: &str, elapsed: Duration) {
        info!(
            position,
            elapsed_secs = elapsed.as_secs_f64(),
            "Fetch finished"
        );
    }

    fn cycle_completed(&self, position: &str) {
        info!(position, "Cycle completed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,monitor_core=debug,monitor_chain=debug")),
        )
        .init();

    let config = MonitorConfig::from_env().context("load configuration")?;

    let primary: Arc<dyn RpcEndpoint> = Arc::new(HttpEndpoint::new(&config.node_endpoint));
    let fallback: Option<Arc<dyn RpcEndpoint>> = config
        .fallback_node_endpoint
        .as_deref()
        .map(|url| Arc::new(HttpEndpoint::new(url)) as Arc<dyn RpcEndpoint>);

    let sink = Arc::new(TraceMetrics);
    let transport = Arc::new(
        ResilientTransport::new(
            primary,
            fallback,
            RetryConfig {
                attempts: config.retry_attempts,
                delay: config.retry_delay,
            },
            config.chain_id,
        )
        .with_metrics(sink.clone()),
    );

    // Connectivity check before entering the loop.
    let head = transport
        .block_number()
        .await
        .context("reach the node endpoint")?;
    info!(
        chain_id = config.chain_id,
        block = head,
        "Connected to the node"
    );

    let feed = config.price_feed_endpoint.as_deref().map(PriceFeed::new);
    let workers = positions::workers(&transport);
    info!(workers = workers.len(), "Starting the monitor");

    let mut monitor = Monitor::new(transport, workers, sink, feed, &config);
    monitor.run().await
}
