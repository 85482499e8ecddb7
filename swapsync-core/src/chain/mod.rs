//! Chain access: a JSON-RPC client for log scanning and the orderbook
//! contract ABI.

pub mod abi;
pub mod client;

pub use client::{ChainClient, JsonRpcClient, RpcError, RpcLog};
