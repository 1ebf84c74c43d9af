//! Resilient JSON-RPC transport.
//!
//! Every chain read in the monitor goes through [`ResilientTransport`]:
//! a thin JSON-RPC client that retries failed requests with a fixed
//! delay, fails over between a primary and an optional fallback
//! endpoint, and reports every attempt to an [`RpcMetrics`] hook.
//!
//! The failover pointer is sticky: once a call switches to the other
//! endpoint, subsequent calls keep using it until a failure switches
//! back. `eth_chainId` is answered locally — the chain id is fixed at
//! construction and never changes at runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, Bytes, U64};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::{NoopMetrics, RpcMetrics};

/// Errors produced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request itself failed (unreachable, timeout, non-2xx).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// The response could not be decoded into the expected shape.
    #[error("invalid rpc response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether this error is an EVM execution revert rather than a
    /// transport-level failure. Reverts are a valid answer for some
    /// queries (e-mode on pools that predate it, `BASE_CURRENCY_UNIT`
    /// on legacy oracles) and must not trigger failover bookkeeping
    /// by the caller.
    pub fn is_revert(&self) -> bool {
        match self {
            Self::Rpc { code, message } => {
                *code == 3
                    || message.contains("revert")
                    || message.contains("execution error")
            }
            _ => false,
        }
    }

    /// JSON-RPC error code, HTTP status, or -1 for everything else.
    /// Used as the `code` label on the metrics hook.
    fn metrics_code(&self) -> i64 {
        match self {
            Self::Rpc { code, .. } => *code,
            Self::Http(err) => err.status().map(|s| s.as_u16() as i64).unwrap_or(-1),
            Self::Decode(_) => -1,
        }
    }
}

/// Block parameter for state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Latest,
    Number(u64),
}

impl BlockRef {
    fn as_param(&self) -> Value {
        match self {
            Self::Latest => Value::String("latest".into()),
            Self::Number(n) => Value::String(format!("0x{n:x}")),
        }
    }
}

impl From<u64> for BlockRef {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

/// A single JSON-RPC endpoint. Public so tests and callers can supply
/// scripted implementations; production code uses [`HttpEndpoint`].
#[async_trait]
pub trait RpcEndpoint: Send + Sync {
    /// Host part of the endpoint URL, used as a metrics label.
    fn domain(&self) -> &str;

    /// Perform one JSON-RPC request, no retries.
    async fn send(&self, method: &str, params: &Value) -> Result<Value, TransportError>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// JSON-RPC over HTTP(S) via reqwest.
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: String,
    domain: String,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let domain = url
            .split("://")
            .last()
            .unwrap_or(&url)
            .split(['/', ':'])
            .next()
            .unwrap_or("unknown")
            .to_string();
        Self {
            client: reqwest::Client::new(),
            url,
            domain,
        }
    }
}

#[async_trait]
impl RpcEndpoint for HttpEndpoint {
    fn domain(&self) -> &str {
        &self.domain
    }

    async fn send(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

/// Retry policy for a single logical call against one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Attempts per endpoint before escalating.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// JSON-RPC transport with retry, endpoint failover and metrics.
pub struct ResilientTransport {
    endpoints: Vec<Arc<dyn RpcEndpoint>>,
    /// Index of the endpoint calls currently go to. Switching is
    /// serialized through this lock; the switch persists across calls.
    active: Mutex<usize>,
    retry: RetryConfig,
    chain_id: u64,
    metrics: Arc<dyn RpcMetrics>,
}

impl ResilientTransport {
    /// Build a transport over a primary and an optional fallback endpoint.
    pub fn new(
        primary: Arc<dyn RpcEndpoint>,
        fallback: Option<Arc<dyn RpcEndpoint>>,
        retry: RetryConfig,
        chain_id: u64,
    ) -> Self {
        let mut endpoints = vec![primary];
        endpoints.extend(fallback);
        Self {
            endpoints,
            active: Mutex::new(0),
            retry,
            chain_id,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Install a metrics hook.
    pub fn with_metrics(mut self, metrics: Arc<dyn RpcMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Chain id this transport was constructed for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Perform a JSON-RPC call.
    ///
    /// Retries the active endpoint up to the configured attempt count,
    /// then switches to the other endpoint (if any) and re-attempts
    /// once. The pointer stays on the endpoint it switched to.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        if method == "eth_chainId" {
            return Ok(Value::String(format!("0x{:x}", self.chain_id)));
        }

        let active = *self.active.lock();
        let err = match self.call_with_retries(active, method, &params).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        // Reverts are the node answering, not the node failing; they
        // must reach the caller without touching the failover pointer.
        if self.endpoints.len() < 2 || err.is_revert() {
            return Err(err);
        }

        let next = 1 - active;
        warn!(
            method,
            from = self.endpoints[active].domain(),
            to = self.endpoints[next].domain(),
            error = %err,
            "Endpoint failed, switching over"
        );
        *self.active.lock() = next;

        self.attempt(next, method, &params).await
    }

    async fn call_with_retries(
        &self,
        index: usize,
        method: &str,
        params: &Value,
    ) -> Result<Value, TransportError> {
        let attempts = self.retry.attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.attempt(index, method, params).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_revert() => return Err(err),
                Err(err) => {
                    debug!(
                        method,
                        attempt,
                        endpoint = self.endpoints[index].domain(),
                        error = %err,
                        "RPC attempt failed"
                    );
                    last_err = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt"))
    }

    async fn attempt(
        &self,
        index: usize,
        method: &str,
        params: &Value,
    ) -> Result<Value, TransportError> {
        let endpoint = &self.endpoints[index];
        let started = Instant::now();
        let result = endpoint.send(method, params).await;
        let code = match &result {
            Ok(_) => 0,
            Err(err) => err.metrics_code(),
        };
        self.metrics
            .rpc_call(endpoint.domain(), method, code, started.elapsed());
        result
    }

    /// Latest block number.
    pub async fn block_number(&self) -> Result<u64, TransportError> {
        let value = self.call("eth_blockNumber", json!([])).await?;
        let number: U64 =
            serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(number.to::<u64>())
    }

    /// Timestamp of the given block, unix seconds.
    pub async fn block_timestamp(&self, block: u64) -> Result<u64, TransportError> {
        #[derive(Deserialize)]
        struct BlockHeader {
            timestamp: U64,
        }

        let value = self
            .call(
                "eth_getBlockByNumber",
                json!([BlockRef::Number(block).as_param(), false]),
            )
            .await?;
        let header: BlockHeader =
            serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(header.timestamp.to::<u64>())
    }

    /// Typed `eth_call` against a view function at the given block.
    pub async fn eth_call<C: SolCall>(
        &self,
        to: Address,
        call: C,
        block: BlockRef,
    ) -> Result<C::Return, TransportError> {
        let data = Bytes::from(call.abi_encode());
        let params = json!([{ "to": to, "data": data }, block.as_param()]);
        let value = self.call("eth_call", params).await?;
        let raw: Bytes =
            serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))?;
        C::abi_decode_returns(&raw, true).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// `eth_getLogs` for the given filter.
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, TransportError> {
        let filter =
            serde_json::to_value(filter).map_err(|e| TransportError::Decode(e.to_string()))?;
        let value = self.call("eth_getLogs", json!([filter])).await?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Endpoint that fails a fixed number of times before succeeding.
    struct FlakyEndpoint {
        domain: String,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyEndpoint {
        fn new(domain: &str, failures: usize) -> Self {
            Self {
                domain: domain.to_string(),
                failures,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RpcEndpoint for FlakyEndpoint {
        fn domain(&self) -> &str {
            &self.domain
        }

        async fn send(&self, _method: &str, _params: &Value) -> Result<Value, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransportError::Rpc {
                    code: -32000,
                    message: "rate limited".into(),
                })
            } else {
                Ok(json!("0x2a"))
            }
        }
    }

    fn no_delay(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn retries_succeed_without_failover() {
        let primary = Arc::new(FlakyEndpoint::new("primary", 2));
        let fallback = Arc::new(FlakyEndpoint::new("fallback", 0));
        let transport = ResilientTransport::new(
            primary.clone(),
            Some(fallback.clone()),
            no_delay(3),
            1,
        );

        let value = transport.call("eth_blockNumber", json!([])).await.unwrap();
        assert_eq!(value, json!("0x2a"));
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn failover_switches_once_and_persists() {
        let primary = Arc::new(FlakyEndpoint::new("primary", usize::MAX));
        let fallback = Arc::new(FlakyEndpoint::new("fallback", 0));
        let transport = ResilientTransport::new(
            primary.clone(),
            Some(fallback.clone()),
            no_delay(2),
            1,
        );

        transport.call("eth_blockNumber", json!([])).await.unwrap();
        assert_eq!(primary.calls(), 2);
        assert_eq!(fallback.calls(), 1);

        // The switch is sticky: the next call goes straight to the fallback.
        transport.call("eth_blockNumber", json!([])).await.unwrap();
        assert_eq!(primary.calls(), 2);
        assert_eq!(fallback.calls(), 2);
    }

    #[tokio::test]
    async fn exhausting_both_endpoints_errors() {
        let primary = Arc::new(FlakyEndpoint::new("primary", usize::MAX));
        let fallback = Arc::new(FlakyEndpoint::new("fallback", usize::MAX));
        let transport =
            ResilientTransport::new(primary.clone(), Some(fallback), no_delay(2), 1);

        let err = transport.call("eth_blockNumber", json!([])).await;
        assert!(matches!(err, Err(TransportError::Rpc { .. })));
    }

    #[tokio::test]
    async fn single_endpoint_errors_after_retries() {
        let primary = Arc::new(FlakyEndpoint::new("primary", usize::MAX));
        let transport = ResilientTransport::new(primary.clone(), None, no_delay(3), 1);

        let err = transport.call("eth_blockNumber", json!([])).await;
        assert!(err.is_err());
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn chain_id_answered_without_round_trip() {
        let primary = Arc::new(FlakyEndpoint::new("primary", usize::MAX));
        let transport = ResilientTransport::new(primary.clone(), None, no_delay(1), 137);

        let value = transport.call("eth_chainId", json!([])).await.unwrap();
        assert_eq!(value, json!("0x89"));
        assert_eq!(primary.calls(), 0);
    }

    /// Endpoint whose calls always revert at the EVM level.
    struct RevertingEndpoint {
        domain: String,
        calls: AtomicUsize,
    }

    impl RevertingEndpoint {
        fn new(domain: &str) -> Self {
            Self {
                domain: domain.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RpcEndpoint for RevertingEndpoint {
        fn domain(&self) -> &str {
            &self.domain
        }

        async fn send(&self, _method: &str, _params: &Value) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Rpc {
                code: 3,
                message: "execution reverted".into(),
            })
        }
    }

    #[tokio::test]
    async fn reverts_bypass_retry_and_failover() {
        let primary = Arc::new(RevertingEndpoint::new("primary"));
        let fallback = Arc::new(FlakyEndpoint::new("fallback", 0));
        let transport = ResilientTransport::new(
            primary.clone(),
            Some(fallback.clone()),
            no_delay(3),
            1,
        );

        let err = transport.call("eth_call", json!([])).await.unwrap_err();
        assert!(err.is_revert());
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);

        // The pointer never moved: the next call still hits the primary.
        transport.call("eth_call", json!([])).await.unwrap_err();
        assert_eq!(primary.calls(), 2);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let primary = Arc::new(FlakyEndpoint::new("primary", 0));
        let transport = ResilientTransport::new(primary.clone(), None, no_delay(0), 1);

        let value = transport.call("eth_blockNumber", json!([])).await.unwrap();
        assert_eq!(value, json!("0x2a"));
        assert_eq!(primary.calls(), 1);
    }

    #[test]
    fn revert_detection() {
        let revert = TransportError::Rpc {
            code: 3,
            message: "execution reverted".into(),
        };
        assert!(revert.is_revert());

        let nethermind = TransportError::Rpc {
            code: -32015,
            message: "VM execution error".into(),
        };
        assert!(nethermind.is_revert());

        let rate_limited = TransportError::Rpc {
            code: -32005,
            message: "too many requests".into(),
        };
        assert!(!rate_limited.is_revert());
    }
}
