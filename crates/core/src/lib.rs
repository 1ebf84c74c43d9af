//! Collateral risk monitoring core.
//!
//! This crate provides the monitoring pipeline:
//! - Holder discovery from aToken Transfer logs with a persistent
//!   scan cursor
//! - Pinned-block position fetching with concurrent per-holder reads
//! - Risk-zone classification against descending health-factor ladders
//! - Behavioral bins partitioning holders by how cleanly their token
//!   balances track their pool exposure
//! - A sequential cycle orchestrator with per-position error isolation
//!
//! Supports AAVE V2 and V3 pools across mainnet, Polygon and Arbitrum.

pub mod bins;
pub mod config;
pub mod fetcher;
pub mod holders;
pub mod market;
pub mod monitor;
pub mod positions;
pub mod risk;

pub use bins::{partition, steth_bins, wsteth_bins, Bin, BinFilter};
pub use config::MonitorConfig;
pub use fetcher::{fetch, FetchOptions, UserRecord};
pub use holders::{scan_transfers, HolderSet, ScanContext};
pub use market::{ChainId, DebtToken, Market, Position, SupplyToken, UserInfo};
pub use monitor::{Monitor, NoopReporter, Reporter, Worker};
pub use risk::{distribution, label_for, prepare, Distribution, RiskLabel, Thresholds, ZoneStat};
