//! Pinned-block position fetching.
//!
//! One fetch pins the latest block, extends the holder set from
//! Transfer logs, then fans out independent per-holder reads (aToken
//! balance, pool account data, debt instruments, extra collateral) all
//! against that same block, and left-joins the sub-tables into one
//! record per holder. Any failed read aborts the whole fetch; the scan
//! cursor is only advanced by the orchestrator after full success.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context as _, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use monitor_chain::{BlockRef, ResilientTransport, TransportError};
use tracing::{debug, info};

use crate::holders::{scan_transfers, HolderSet, ScanContext};
use crate::market::{Position, UserInfo};

/// Tuning knobs for one fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Blocks per `eth_getLogs` window.
    pub batch_size: u64,
    /// Concurrent in-flight reads per fan-out phase.
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            batch_size: 100_000,
            concurrency: 16,
        }
    }
}

/// One row of the per-user table. Missing sub-results are zeros; only
/// the e-mode flag keeps "undetermined" as a distinct state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecord {
    pub user: Address,
    /// aToken balance of the supply token.
    pub amount: f64,
    /// Pool-reported collateral, oracle base units.
    pub collateral: f64,
    /// Pool-reported debt, oracle base units.
    pub debt: f64,
    pub available_borrow: f64,
    pub liquidation_threshold: u64,
    pub ltv: u64,
    pub health_factor: f64,
    pub emode: Option<bool>,
    /// Debt-token amount actually borrowed (stable + variable).
    pub borrowed: f64,
    /// Value of extra collateral tokens, supply-price units.
    pub extra_amount: f64,
    pub supply_price: f64,
    pub debt_price: f64,
}

/// Fetch the per-user table for `position` at the chain head.
///
/// Returns `Ok(None)` when there is nothing to do: no new block since
/// the last processed one, or no holder above the balance threshold.
pub async fn fetch(
    transport: &Arc<ResilientTransport>,
    position: &Position,
    ctx: &mut ScanContext,
    opts: &FetchOptions,
) -> Result<Option<Vec<UserRecord>>> {
    let latest = transport.block_number().await.context("pin block")?;
    // A head at or behind the cursor (a lagging node after failover)
    // must never walk the cursor backwards.
    if latest <= ctx.init_block {
        info!(block = latest, "Block has been already read");
        return Ok(None);
    }
    ctx.curr_block = latest;
    let block = BlockRef::Number(latest);

    scan_transfers(
        transport,
        position.supply_token.a_token.address,
        ctx.init_block,
        latest,
        opts.batch_size,
        &mut ctx.holders,
    )
    .await
    .context("scan holders")?;

    let balances = holder_balances(position, &ctx.holders.to_vec(), block, opts.concurrency)
        .await
        .context("fetch holder balances")?;
    let survivors = evict_below_threshold(&mut ctx.holders, balances, position.balance_threshold);

    if survivors.is_empty() {
        info!("No holders found");
        return Ok(None);
    }
    info!(holders = survivors.len(), block = latest, "Holders found");

    let users: Vec<Address> = survivors.iter().map(|(user, _)| *user).collect();
    let (stats, debts, extras, supply_price, debt_price) = tokio::try_join!(
        user_info_table(position, &users, block, opts.concurrency),
        debt_table(position, &users, block, opts.concurrency),
        extra_table(position, &users, block, opts.concurrency),
        position.supply_price(block),
        position.debt_price(block),
    )
    .context("fetch user tables")?;

    Ok(Some(join_records(
        &survivors,
        &stats,
        &debts,
        &extras,
        supply_price,
        debt_price,
    )))
}

/// aToken balances for the whole holder set.
async fn holder_balances(
    position: &Position,
    holders: &[Address],
    block: BlockRef,
    concurrency: usize,
) -> Result<Vec<(Address, f64)>, TransportError> {
    stream::iter(holders.to_vec())
        .map(|user| async move {
            let balance = position
                .supply_token
                .a_token
                .balance_of(user, block)
                .await?;
            Ok((user, balance))
        })
        .buffer_unordered(concurrency)
        .try_collect()
        .await
}

/// Drop holders at or below the balance threshold from the set; they
/// re-enter only through a future transfer event. Returns survivors.
fn evict_below_threshold(
    holders: &mut HolderSet,
    balances: Vec<(Address, f64)>,
    threshold: f64,
) -> Vec<(Address, f64)> {
    let mut survivors = Vec::with_capacity(balances.len());
    for (user, amount) in balances {
        if amount <= threshold {
            holders.remove(&user);
            debug!(user = %user, amount, "Holder evicted below threshold");
        } else {
            survivors.push((user, amount));
        }
    }
    survivors
}

/// Pool account data (plus e-mode) per user.
async fn user_info_table(
    position: &Position,
    users: &[Address],
    block: BlockRef,
    concurrency: usize,
) -> Result<HashMap<Address, UserInfo>, TransportError> {
    stream::iter(users.to_vec())
        .map(|user| async move {
            let info = position.market.user_info(user, block).await?;
            Ok((user, info))
        })
        .buffer_unordered(concurrency)
        .try_collect()
        .await
}

/// Borrowed debt-token amount per user.
async fn debt_table(
    position: &Position,
    users: &[Address],
    block: BlockRef,
    concurrency: usize,
) -> Result<HashMap<Address, f64>, TransportError> {
    stream::iter(users.to_vec())
        .map(|user| async move {
            let borrowed = position.total_debt(user, block).await?;
            Ok((user, borrowed))
        })
        .buffer_unordered(concurrency)
        .try_collect()
        .await
}

/// Extra-collateral value per user. Prices are fetched once per token,
/// not per holder.
async fn extra_table(
    position: &Position,
    users: &[Address],
    block: BlockRef,
    concurrency: usize,
) -> Result<HashMap<Address, f64>, TransportError> {
    if position.extra_tokens.is_empty() {
        return Ok(HashMap::new());
    }

    let mut prices = Vec::with_capacity(position.extra_tokens.len());
    for token in &position.extra_tokens {
        prices.push(
            position
                .market
                .asset_price(token.token.address, block)
                .await?,
        );
    }

    let prices = &prices;
    stream::iter(users.to_vec())
        .map(|user| async move {
            let mut total = 0.0;
            for (token, price) in position.extra_tokens.iter().zip(prices) {
                total += token.a_token.balance_of(user, block).await? * price;
            }
            Ok((user, total))
        })
        .buffer_unordered(concurrency)
        .try_collect()
        .await
}

/// Left join of the fan-out sub-tables on holder address. A holder
/// missing from a sub-table contributes defaults, never loses its row.
fn join_records(
    balances: &[(Address, f64)],
    stats: &HashMap<Address, UserInfo>,
    debts: &HashMap<Address, f64>,
    extras: &HashMap<Address, f64>,
    supply_price: f64,
    debt_price: f64,
) -> Vec<UserRecord> {
    balances
        .iter()
        .map(|&(user, amount)| {
            let info = stats.get(&user).copied().unwrap_or(UserInfo {
                collateral: 0.0,
                debt: 0.0,
                available_borrow: 0.0,
                liquidation_threshold: 0,
                ltv: 0,
                health_factor: 0.0,
                emode: None,
            });
            UserRecord {
                user,
                amount,
                collateral: info.collateral,
                debt: info.debt,
                available_borrow: info.available_borrow,
                liquidation_threshold: info.liquidation_threshold,
                ltv: info.ltv,
                health_factor: info.health_factor,
                emode: info.emode,
                borrowed: debts.get(&user).copied().unwrap_or(0.0),
                extra_amount: extras.get(&user).copied().unwrap_or(0.0),
                supply_price,
                debt_price,
            }
        })
        .collect()
}
