//! JSON-RPC 2.0 client for an Ethereum node.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stakeview_types::{Address, TxHash};

use crate::abi::{decode_hex_bytes, decode_revert_reason, encode_hex_bytes};
use crate::error::ChainError;

/// Default timeout for a single RPC round trip.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// EIP-1193 "user rejected request".
const USER_REJECTED_CODE: i64 = 4001;

/// Geth/EIP-1474 "execution reverted".
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Failure of a single RPC request, before it is classified for a read or a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcError {
    /// Connection, HTTP or malformed-JSON failure.
    Transport(String),
    /// Well-formed response whose `result` has the wrong shape.
    Shape(String),
    /// The node answered with a JSON-RPC error object.
    Node {
        code: i64,
        message: String,
        data: Option<Vec<u8>>,
    },
}

impl RpcError {
    /// Revert reason carried in the error data, falling back to the node's message.
    fn reason(&self) -> Option<String> {
        match self {
            RpcError::Node { message, data, .. } => data
                .as_deref()
                .and_then(decode_revert_reason)
                .or_else(|| Some(message.clone())),
            RpcError::Transport(_) | RpcError::Shape(_) => None,
        }
    }

    fn is_revert(&self) -> bool {
        match self {
            RpcError::Node { code, message, .. } => {
                *code == EXECUTION_REVERTED_CODE || message.to_lowercase().contains("revert")
            }
            RpcError::Transport(_) | RpcError::Shape(_) => false,
        }
    }

    /// Classify for a read-only call.
    pub fn into_read_error(self) -> ChainError {
        match self {
            RpcError::Transport(msg) => ChainError::Network(msg),
            RpcError::Shape(msg) => ChainError::ContractCall(msg),
            node => ChainError::ContractCall(node.reason().unwrap_or_default()),
        }
    }

    /// Classify for a transaction submission.
    pub fn into_write_error(self) -> ChainError {
        match &self {
            RpcError::Transport(msg) => ChainError::Network(msg.clone()),
            RpcError::Shape(msg) => ChainError::ContractCall(msg.clone()),
            RpcError::Node { code, message, .. } => {
                let lowered = message.to_lowercase();
                if *code == USER_REJECTED_CODE
                    || lowered.contains("user rejected")
                    || lowered.contains("user denied")
                {
                    ChainError::UserRejected
                } else if self.is_revert() {
                    ChainError::TransactionReverted {
                        tx_hash: None,
                        reason: self.reason(),
                    }
                } else {
                    ChainError::ContractCall(message.clone())
                }
            }
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl RpcErrorObject {
    /// Error data may be a bare hex string or nested as `{"data": "0x…"}`.
    fn data_bytes(&self) -> Option<Vec<u8>> {
        let value = self.data.as_ref()?;
        let hex = value
            .as_str()
            .or_else(|| value.get("data").and_then(|d| d.as_str()))?;
        decode_hex_bytes(hex).ok()
    }
}

/// A transaction receipt as returned by `eth_getTransactionReceipt`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: TxHash,
    pub block_number: String,
    #[serde(default)]
    pub gas_used: Option<String>,
    /// `0x1` on success, `0x0` on revert.
    #[serde(default)]
    pub status: Option<String>,
}

/// The subset of `eth_getTransactionByHash` needed to replay a reverted call.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub input: String,
    #[serde(default)]
    pub block_number: Option<String>,
}

/// A log entry as returned by `eth_getLogs`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<TxHash>,
    #[serde(default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

/// HTTP client for an Ethereum JSON-RPC endpoint.
///
/// Cheap to clone; clones share the connection pool and request-id counter.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a client targeting the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Result<Self, ChainError> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC request and deserialize its `result`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(method, id, "rpc request");

        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let response = self.http.post(&self.url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                RpcError::Transport(format!("request timed out: {e}"))
            } else if e.is_connect() {
                RpcError::Transport(format!("connection failed: {e}"))
            } else {
                RpcError::Transport(format!("request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "node returned HTTP {}",
                response.status()
            )));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Transport(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(err) = envelope.error {
            tracing::debug!(method, code = err.code, message = %err.message, "rpc error");
            return Err(RpcError::Node {
                code: err.code,
                data: err.data_bytes(),
                message: err.message,
            });
        }

        decode_result(method, envelope.result)
    }

    /// `eth_chainId`.
    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let hex: String = self
            .request("eth_chainId", serde_json::json!([]))
            .await
            .map_err(RpcError::into_read_error)?;
        parse_quantity(&hex)
    }

    /// `eth_blockNumber`.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let hex: String = self
            .request("eth_blockNumber", serde_json::json!([]))
            .await
            .map_err(RpcError::into_read_error)?;
        parse_quantity(&hex)
    }

    /// `eth_call` against `block` (a quantity or a tag such as `"latest"`).
    pub async fn call(
        &self,
        from: Option<&Address>,
        to: &Address,
        data: &[u8],
        block: &str,
    ) -> Result<Vec<u8>, RpcError> {
        let mut call = serde_json::json!({
            "to": to.to_string(),
            "data": encode_hex_bytes(data),
        });
        if let Some(from) = from {
            call["from"] = serde_json::json!(from.to_string());
        }
        let hex: String = self.request("eth_call", serde_json::json!([call, block])).await?;
        decode_hex_bytes(&hex).map_err(|e| RpcError::Shape(e.to_string()))
    }

    /// `eth_sendTransaction`; the node signs with an account it manages.
    pub async fn send_transaction(
        &self,
        from: &Address,
        to: &Address,
        data: &[u8],
    ) -> Result<TxHash, RpcError> {
        let tx = serde_json::json!({
            "from": from.to_string(),
            "to": to.to_string(),
            "data": encode_hex_bytes(data),
        });
        self.request("eth_sendTransaction", serde_json::json!([tx])).await
    }

    /// `eth_getTransactionReceipt`; `None` while the transaction is pending.
    pub async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<RawReceipt>, RpcError> {
        self.request(
            "eth_getTransactionReceipt",
            serde_json::json!([hash.to_string()]),
        )
        .await
    }

    /// `eth_getTransactionByHash`.
    pub async fn transaction_by_hash(
        &self,
        hash: &TxHash,
    ) -> Result<Option<RawTransaction>, RpcError> {
        self.request(
            "eth_getTransactionByHash",
            serde_json::json!([hash.to_string()]),
        )
        .await
    }

    /// `eth_getLogs` for one contract and topic-0 over an inclusive block window.
    pub async fn logs(
        &self,
        address: &Address,
        topic0: &[u8; 32],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RpcError> {
        let filter = serde_json::json!({
            "address": address.to_string(),
            "topics": [encode_hex_bytes(topic0)],
            "fromBlock": quantity(from_block),
            "toBlock": quantity(to_block),
        });
        self.request("eth_getLogs", serde_json::json!([filter])).await
    }
}

fn decode_result<T: DeserializeOwned>(method: &str, result: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(result)
        .map_err(|e| RpcError::Shape(format!("unexpected {method} result: {e}")))
}

/// Encode a number as a JSON-RPC quantity (`0x1a`).
pub fn quantity(value: u64) -> String {
    format!("{value:#x}")
}

/// Decode a JSON-RPC quantity.
pub fn parse_quantity(s: &str) -> Result<u64, ChainError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::ContractCall(format!("quantity {s:?} lacks 0x prefix")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::ContractCall(format!("invalid quantity {s:?}: {e}")))
}
