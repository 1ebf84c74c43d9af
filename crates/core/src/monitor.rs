//! Cycle orchestration.
//!
//! Drives one poll cycle per configured position: pin a block, extend
//! the holder set, fetch the per-user table, classify per bin, report,
//! and only then advance the scan cursor. Positions are processed
//! sequentially (smallest holder set first) so that a single transport
//! instance sees no cross-position concurrency; a failing position
//! leaves its cursor untouched and never affects its siblings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use monitor_api::PriceFeed;
use monitor_chain::ResilientTransport;
use tracing::{error, info, warn};

use crate::bins::{partition, Bin};
use crate::config::MonitorConfig;
use crate::fetcher::{fetch, FetchOptions, UserRecord};
use crate::holders::ScanContext;
use crate::market::Position;
use crate::risk::{distribution, prepare, RiskLabel, ZoneStat};

/// One-way sink for cycle results. Exposition format is the caller's
/// business; the monitor only invokes the hooks.
pub trait Reporter: Send + Sync {
    fn zone(&self, _position: &str, _bin: usize, _label: RiskLabel, _stat: &ZoneStat) {}
    fn fetch_duration(&self, _position: &str, _elapsed: Duration) {}
    fn cycle_completed(&self, _position: &str) {}
}

/// Reporter that drops everything.
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// A position together with its mutable per-process state.
pub struct Worker {
    pub position: Position,
    pub ctx: ScanContext,
    pub bins: Vec<Bin>,
}

/// Sequential cycle driver over all configured workers.
pub struct Monitor {
    transport: Arc<ResilientTransport>,
    workers: Vec<Worker>,
    reporter: Arc<dyn Reporter>,
    feed: Option<PriceFeed>,
    opts: FetchOptions,
    parse_interval: Duration,
    error_cooldown: Duration,
    price_max_age: Duration,
}

impl Monitor {
    pub fn new(
        transport: Arc<ResilientTransport>,
        workers: Vec<Worker>,
        reporter: Arc<dyn Reporter>,
        feed: Option<PriceFeed>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            transport,
            workers,
            reporter,
            feed,
            opts: FetchOptions {
                batch_size: config.transfer_events_batch,
                concurrency: config.fetch_concurrency,
            },
            parse_interval: config.parse_interval,
            error_cooldown: config.error_cooldown,
            price_max_age: config.price_feed_max_age,
        }
    }

    /// Main loop: sweep, sleep, repeat. Never returns under normal
    /// operation.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if self.sweep().await {
                info!(
                    seconds = self.parse_interval.as_secs(),
                    "Waiting for the next fetch"
                );
                tokio::time::sleep(self.parse_interval).await;
            } else {
                warn!(
                    seconds = self.error_cooldown.as_secs(),
                    "Waiting before the next try"
                );
                tokio::time::sleep(self.error_cooldown).await;
            }
        }
    }

    /// Run one cycle for every worker on the connected chain. Returns
    /// whether all cycles succeeded.
    pub async fn sweep(&mut self) -> bool {
        let chain_id = self.transport.chain_id();

        // Smaller holder sets first to bound RPC load under partial
        // failure.
        let mut order: Vec<usize> = (0..self.workers.len())
            .filter(|&i| self.workers[i].position.chain_id.id() == chain_id)
            .collect();
        order.sort_by_key(|&i| self.workers[i].ctx.holders.len());

        let mut all_ok = true;
        for index in order {
            let worker = &mut self.workers[index];
            let result = run_cycle(
                &self.transport,
                worker,
                &self.opts,
                self.reporter.as_ref(),
                self.feed.as_ref(),
                self.price_max_age,
            )
            .await;
            if let Err(err) = result {
                error!(error = ?err, "Position cycle failed");
                all_ok = false;
            }
        }
        all_ok
    }
}

/// One position's cycle: fetch, classify, report, advance.
async fn run_cycle(
    transport: &Arc<ResilientTransport>,
    worker: &mut Worker,
    opts: &FetchOptions,
    reporter: &dyn Reporter,
    feed: Option<&PriceFeed>,
    price_max_age: Duration,
) -> Result<()> {
    let name = worker.position.name().await.context("resolve position name")?;
    info!(position = %name, init_block = worker.ctx.init_block, "Starting cycle");

    let started = Instant::now();
    let records = fetch(transport, &worker.position, &mut worker.ctx, opts).await?;
    reporter.fetch_duration(&name, started.elapsed());

    if let Some(records) = records {
        if let Some(feed) = feed {
            cross_check_price(transport, feed, &records, worker.ctx.curr_block, price_max_age)
                .await
                .context("price feed cross-check")?;
        }

        let supply_price = records.first().map(|r| r.supply_price).unwrap_or_default();
        let prepared = prepare(&records);
        let parts = partition(&prepared, &worker.bins);

        for (index, (bin, rows)) in worker.bins.iter().zip(&parts).enumerate() {
            let dist = distribution(rows, &bin.thresholds, supply_price);
            for (label, stat) in dist.iter() {
                reporter.zone(&name, index + 1, label, stat);
            }
            info!(
                position = %name,
                bin = index + 1,
                positions = dist.total_count(),
                amount = dist.total_amount(),
                "Bin distribution computed"
            );
        }
    }

    worker.ctx.advance();
    reporter.cycle_completed(&name);
    Ok(())
}

/// Compare the oracle supply price against the independent feed at the
/// pinned block's timestamp. Staleness fails the cycle; divergence
/// only warns — the oracle stays authoritative.
async fn cross_check_price(
    transport: &Arc<ResilientTransport>,
    feed: &PriceFeed,
    records: &[UserRecord],
    block: u64,
    max_age: Duration,
) -> Result<()> {
    let Some(oracle_price) = records.first().map(|r| r.supply_price) else {
        return Ok(());
    };

    let timestamp = transport.block_timestamp(block).await?;
    let spot = feed.price_at(timestamp, max_age).await?;

    if spot > 0.0 {
        let divergence = (oracle_price - spot).abs() / spot;
        if divergence > 0.05 {
            warn!(
                oracle_price,
                spot, divergence, "Oracle price diverges from the external feed"
            );
        }
    }
    Ok(())
}
