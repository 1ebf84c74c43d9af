//! Callback hooks for RPC observability.
//!
//! The monitor core does not own metric registration or exposition;
//! it only reports call outcomes through this trait. The binary wires
//! in whatever sink it wants (a tracing-backed one by default).

use std::time::Duration;

/// One-way sink for RPC call outcomes.
///
/// `code` is 0 on success, the JSON-RPC error code on node errors,
/// the HTTP status on transport errors, -1 otherwise.
pub trait RpcMetrics: Send + Sync {
    fn rpc_call(&self, _domain: &str, _method: &str, _code: i64, _elapsed: Duration) {}
}

/// Sink that drops everything.
pub struct NoopMetrics;

impl RpcMetrics for NoopMetrics {}
