//! Minimal Ethereum JSON-RPC client.
//!
//! Only the three calls the indexer needs: head block height, ranged log
//! filtering and block timestamps.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::hex::{hex_u64, parse_hex_u64};

/// Errors surfaced by chain RPC calls.
#[derive(Debug, Error)]
pub enum RpcError {
    /// HTTP transport error
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Error object returned by the node
    #[error("rpc error {code}: {message}")]
    Node { code: i64, message: String },

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    Parse(String),
}

/// One entry of an `eth_getLogs` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(deserialize_with = "hex_u64")]
    pub block_number: u64,
    pub transaction_hash: B256,
    #[serde(deserialize_with = "hex_u64")]
    pub log_index: u64,
}

/// The slice of chain state the indexer consumes. Implemented over JSON-RPC
/// in production and by in-memory fakes in tests.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block height.
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// Logs emitted by `address` in the inclusive range `[from_block, to_block]`.
    async fn filter_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
    ) -> Result<Vec<RpcLog>, RpcError>;

    /// Unix timestamp of a block.
    async fn block_time(&self, block_number: u64) -> Result<u64, RpcError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    #[serde(deserialize_with = "hex_u64")]
    timestamp: u64,
}

/// [`ChainClient`] over HTTP JSON-RPC.
pub struct JsonRpcClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl JsonRpcClient {
    /// Default timeout for node calls; log scans over several blocks can be
    /// slow on public endpoints.
    const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client: reqwest::Client::builder()
                .timeout(Self::REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<T, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;
        let envelope: RpcResponse<T> = response.json().await?;
        if let Some(error) = envelope.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| RpcError::Parse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let head: String = self.call("eth_blockNumber", serde_json::json!([])).await?;
        parse_hex_u64(&head).map_err(|e| RpcError::Parse(format!("eth_blockNumber: {e}")))
    }

    async fn filter_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
    ) -> Result<Vec<RpcLog>, RpcError> {
        let filter = serde_json::json!([{
            "fromBlock": format!("0x{from_block:x}"),
            "toBlock": format!("0x{to_block:x}"),
            "address": address,
        }]);
        self.call("eth_getLogs", filter).await
    }

    async fn block_time(&self, block_number: u64) -> Result<u64, RpcError> {
        let header: Option<BlockHeader> = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!([format!("0x{block_number:x}"), false]),
            )
            .await?;
        header
            .map(|h| h.timestamp)
            .ok_or_else(|| RpcError::Parse(format!("block {block_number} not found")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn log_deserializes_from_rpc_shape() {
        let raw = r#"{
            "address": "0x90b6bd4a40bbf27b01df00c5c27e25e10de887e1",
            "topics": [
                "0xfc37f2ff950f95913eb7182357ba3c14df60ef354bc7d6ab1ba2815f249fffe6",
                "0x0000000000000000000000000000000000000000000000000000000000000000"
            ],
            "data": "0x01",
            "blockNumber": "0x62",
            "transactionHash": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "logIndex": "0x2",
            "removed": false
        }"#;
        let log: RpcLog = serde_json::from_str(raw).unwrap();
        assert_eq!(log.block_number, 98);
        assert_eq!(log.log_index, 2);
        assert_eq!(log.topics.len(), 2);
        assert_eq!(log.data.as_ref(), &[0x01]);
    }
}
