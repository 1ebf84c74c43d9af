//! Holder discovery via Transfer log scanning.
//!
//! The registry walks a block range in fixed-size windows, pulls the
//! supply aToken's Transfer events and records both counterparties.
//! The scan is a set union, so re-scanning an already-processed range
//! is harmless; the zero address (mint/burn sentinel) never enters the
//! set.

use std::collections::HashSet;

use alloy::primitives::Address;
use alloy::rpc::types::Filter;
use monitor_chain::{ResilientTransport, TransportError, ERC20_TRANSFER};
use tracing::{debug, info};

/// Deduplicated set of position holders.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HolderSet {
    inner: HashSet<Address>,
}

impl HolderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a holder. The zero address is silently dropped.
    pub fn insert(&mut self, address: Address) {
        if address.is_zero() {
            return;
        }
        self.inner.insert(address);
    }

    pub fn remove(&mut self, address: &Address) {
        self.inner.remove(address);
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.inner.contains(address)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.inner.iter()
    }

    /// Snapshot of the current holders.
    pub fn to_vec(&self) -> Vec<Address> {
        self.inner.iter().copied().collect()
    }
}

/// Per-position scan state, owned by the orchestrator and mutated only
/// between cycle steps.
///
/// `init_block` is the last block fully processed (inclusive lower
/// bound of the next scan); `curr_block` is the block pinned for the
/// in-flight cycle. `init_block <= curr_block` always holds, and the
/// cursor advances only after a cycle completes without error.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub init_block: u64,
    pub curr_block: u64,
    pub holders: HolderSet,
}

impl ScanContext {
    pub fn new(init_block: u64) -> Self {
        Self {
            init_block,
            curr_block: init_block,
            holders: HolderSet::new(),
        }
    }

    /// Mark the pinned block as fully processed.
    pub fn advance(&mut self) {
        debug_assert!(self.init_block <= self.curr_block);
        self.init_block = self.curr_block;
    }
}

/// Partition `[from, to]` (inclusive) into contiguous windows of at
/// most `batch` blocks.
pub fn block_windows(from: u64, to: u64, batch: u64) -> Vec<(u64, u64)> {
    debug_assert!(batch > 0);
    let mut windows = Vec::new();
    let mut start = from;
    while start <= to {
        let end = to.min(start.saturating_add(batch - 1));
        windows.push((start, end));
        start = end.saturating_add(1);
    }
    windows
}

/// Scan Transfer events of `token` over `[from, to]` and record both
/// counterparties into `holders`. Returns the number of logs seen.
pub async fn scan_transfers(
    transport: &ResilientTransport,
    token: Address,
    from: u64,
    to: u64,
    batch: u64,
    holders: &mut HolderSet,
) -> Result<usize, TransportError> {
    info!(token = %token, from, to, "Scanning transfer logs for holders");

    let mut seen = 0usize;
    for (start, end) in block_windows(from, to, batch) {
        let filter = Filter::new()
            .address(token)
            .event_signature(ERC20_TRANSFER)
            .from_block(start)
            .to_block(end);

        let logs = transport.get_logs(&filter).await?;
        seen += logs.len();
        for log in &logs {
            let topics = log.topics();
            if topics.len() < 3 {
                continue;
            }
            holders.insert(Address::from_slice(&topics[1][12..]));
            holders.insert(Address::from_slice(&topics[2][12..]));
        }
        debug!(start, end, logs = logs.len(), "Window scanned");
    }

    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, B256};
    use async_trait::async_trait;
    use monitor_chain::{RetryConfig, RpcEndpoint};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    const HOLDER_A: Address = address!("00000000000000000000000000000000000000aa");
    const HOLDER_B: Address = address!("00000000000000000000000000000000000000bb");
    const HOLDER_C: Address = address!("00000000000000000000000000000000000000cc");
    const TOKEN: Address = address!("00000000000000000000000000000000000000ee");

    #[test]
    fn zero_address_never_enters_the_set() {
        let mut holders = HolderSet::new();
        holders.insert(Address::ZERO);
        holders.insert(HOLDER_A);
        holders.insert(Address::ZERO);

        assert_eq!(holders.len(), 1);
        assert!(holders.contains(&HOLDER_A));
        assert!(!holders.contains(&Address::ZERO));
    }

    #[test]
    fn insert_is_idempotent() {
        let mut holders = HolderSet::new();
        holders.insert(HOLDER_A);
        holders.insert(HOLDER_A);
        assert_eq!(holders.len(), 1);
    }

    #[test]
    fn windows_cover_the_range_exactly() {
        assert_eq!(block_windows(0, 9, 5), vec![(0, 4), (5, 9)]);
        assert_eq!(block_windows(10, 10, 100), vec![(10, 10)]);
        assert_eq!(block_windows(0, 10, 4), vec![(0, 3), (4, 7), (8, 10)]);
        assert!(block_windows(5, 4, 10).is_empty());
    }

    /// Endpoint serving a fixed ledger of transfer events, honoring
    /// the filter's block range.
    struct LogServer {
        // (block, from, to)
        transfers: Vec<(u64, Address, Address)>,
    }

    fn hex_block(value: &Value) -> u64 {
        let s = value.as_str().unwrap();
        u64::from_str_radix(s.trim_start_matches("0x"), 16).unwrap()
    }

    #[async_trait]
    impl RpcEndpoint for LogServer {
        fn domain(&self) -> &str {
            "logserver"
        }

        async fn send(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
            assert_eq!(method, "eth_getLogs");
            let filter = &params[0];
            let from = hex_block(&filter["fromBlock"]);
            let to = hex_block(&filter["toBlock"]);

            let logs: Vec<Value> = self
                .transfers
                .iter()
                .filter(|(block, _, _)| *block >= from && *block <= to)
                .enumerate()
                .map(|(index, (block, src, dst))| {
                    json!({
                        "address": TOKEN,
                        "topics": [
                            ERC20_TRANSFER,
                            B256::from(src.into_word()),
                            B256::from(dst.into_word()),
                        ],
                        "data": "0x",
                        "blockNumber": format!("0x{block:x}"),
                        "blockHash": B256::ZERO,
                        "transactionHash": B256::ZERO,
                        "transactionIndex": "0x0",
                        "logIndex": format!("0x{index:x}"),
                        "removed": false,
                    })
                })
                .collect();
            Ok(Value::Array(logs))
        }
    }

    fn transport_over(transfers: Vec<(u64, Address, Address)>) -> ResilientTransport {
        ResilientTransport::new(
            Arc::new(LogServer { transfers }),
            None,
            RetryConfig {
                attempts: 1,
                delay: Duration::ZERO,
            },
            1,
        )
    }

    fn ledger() -> Vec<(u64, Address, Address)> {
        vec![
            (10, Address::ZERO, HOLDER_A), // mint
            (15, HOLDER_A, HOLDER_B),
            (25, HOLDER_B, HOLDER_C),
            (30, HOLDER_C, Address::ZERO), // burn
        ]
    }

    #[tokio::test]
    async fn incremental_scan_equals_full_scan() {
        let transport = transport_over(ledger());

        let mut full = HolderSet::new();
        scan_transfers(&transport, TOKEN, 10, 30, 7, &mut full)
            .await
            .unwrap();

        let mut incremental = HolderSet::new();
        scan_transfers(&transport, TOKEN, 10, 20, 7, &mut incremental)
            .await
            .unwrap();
        scan_transfers(&transport, TOKEN, 21, 30, 7, &mut incremental)
            .await
            .unwrap();

        assert_eq!(full, incremental);
        assert_eq!(full.len(), 3);
        assert!(!full.contains(&Address::ZERO));
    }

    #[tokio::test]
    async fn rescan_does_not_corrupt_the_set() {
        let transport = transport_over(ledger());

        let mut holders = HolderSet::new();
        scan_transfers(&transport, TOKEN, 10, 30, 100, &mut holders)
            .await
            .unwrap();
        let snapshot = holders.clone();

        scan_transfers(&transport, TOKEN, 10, 30, 100, &mut holders)
            .await
            .unwrap();
        assert_eq!(holders, snapshot);
    }
}
