//! Monitor chain interaction layer.
//!
//! This crate provides:
//! - A resilient JSON-RPC transport with retry, primary/fallback
//!   failover and a metrics hook
//! - Typed read-only accessors for ERC20 tokens, AAVE lending pools
//!   (V2/V3) and their price oracles
//! - The Transfer event topic used for holder discovery
//!
//! All reads accept an explicit block so that one monitoring cycle
//! observes a single consistent chain state.

pub mod contracts;
mod metrics;
mod num;
mod oracle;
mod pool;
mod token;
mod transport;

pub use contracts::ERC20_TRANSFER;
pub use metrics::{NoopMetrics, RpcMetrics};
pub use num::{scale_down, u256_to_f64};
pub use oracle::PriceOracle;
pub use pool::{LendingPool, PoolVersion, UserAccountData};
pub use token::Erc20;
pub use transport::{
    BlockRef, HttpEndpoint, ResilientTransport, RetryConfig, RpcEndpoint, TransportError,
};
