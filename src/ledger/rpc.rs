//! Ethereum JSON-RPC ledger client

use crate::crypto::Address;
use crate::errors::{Result, WalletError};
use crate::ledger::LedgerClient;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Failure of a single JSON-RPC call
enum CallError {
    /// Transport, HTTP status, or malformed response
    Transport(String),
    /// The node answered with a JSON-RPC error object
    Node(RpcError),
}

/// Client for an Ethereum JSON-RPC endpoint
pub struct JsonRpcClient {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a client whose every request is bounded by `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| WalletError::ConfigError(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> std::result::Result<T, CallError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("JSON-RPC {} (id {})", method, request.id);

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(CallError::Transport(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| CallError::Transport(format!("{} response unreadable: {}", method, e)))?;

        if let Some(err) = body.error {
            return Err(CallError::Node(err));
        }

        body.result
            .ok_or_else(|| CallError::Transport(format!("{} response has no result", method)))
    }

    /// Call a read-only method. Every failure is a network failure.
    async fn query<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.call(method, params).await.map_err(|e| {
            let msg = match e {
                CallError::Transport(msg) => msg,
                CallError::Node(err) => format!("{} failed ({}): {}", method, err.code, err.message),
            };
            warn!("Ledger query failed: {}", msg);
            WalletError::NetworkUnavailable(msg)
        })
    }

    async fn query_quantity(&self, method: &str, params: Value) -> Result<u128> {
        let raw: String = self.query(method, params).await?;
        parse_quantity(&raw)
            .map_err(|e| WalletError::NetworkUnavailable(format!("{} returned {}", method, e)))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcClient {
    async fn pending_nonce(&self, address: &Address) -> Result<u64> {
        let nonce = self
            .query_quantity(
                "eth_getTransactionCount",
                json!([format!("0x{}", hex::encode(address.as_bytes())), "pending"]),
            )
            .await?;
        u64::try_from(nonce)
            .map_err(|_| WalletError::NetworkUnavailable("nonce exceeds 64 bits".to_string()))
    }

    async fn suggested_gas_price(&self) -> Result<u128> {
        self.query_quantity("eth_gasPrice", json!([])).await
    }

    async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.query_quantity("eth_chainId", json!([])).await?;
        u64::try_from(chain_id)
            .map_err(|_| WalletError::NetworkUnavailable("chain id exceeds 64 bits".to_string()))
    }

    async fn broadcast(&self, raw_transaction: &[u8]) -> Result<String> {
        let raw = format!("0x{}", hex::encode(raw_transaction));
        match self.call::<String>("eth_sendRawTransaction", json!([raw])).await {
            Ok(hash) => Ok(hash),
            Err(CallError::Node(err)) => {
                error!("Node rejected transaction ({}): {}", err.code, err.message);
                Err(WalletError::TransactionRejected(err.message))
            }
            Err(CallError::Transport(msg)) => {
                warn!("Broadcast failed: {}", msg);
                Err(WalletError::NetworkUnavailable(msg))
            }
        }
    }
}

/// Parse a JSON-RPC hex quantity such as `0x1a`
pub fn parse_quantity(raw: &str) -> std::result::Result<u128, String> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| format!("quantity {:?} missing 0x prefix", raw))?;
    if digits.is_empty() {
        return Err(format!("quantity {:?} has no digits", raw));
    }
    u128::from_str_radix(digits, 16).map_err(|e| format!("quantity {:?} invalid: {}", raw, e))
}
