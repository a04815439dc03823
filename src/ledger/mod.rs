//! Ledger network access
//!
//! The wallet never talks to the network directly; it goes through a
//! `LedgerClient`, which supplies the parameters a transaction needs and
//! broadcasts the signed result.

pub mod rpc;

use crate::crypto::Address;
use crate::errors::Result;
use async_trait::async_trait;

pub use rpc::JsonRpcClient;

/// Source of network parameters and sink for signed transactions
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Next nonce for `address`, counting pending transactions
    async fn pending_nonce(&self, address: &Address) -> Result<u64>;

    /// Suggested gas price in wei
    async fn suggested_gas_price(&self) -> Result<u128>;

    /// Chain identifier used for replay protection
    async fn chain_id(&self) -> Result<u64>;

    /// Submit a signed, RLP-encoded transaction. Returns the hash the node reports.
    async fn broadcast(&self, raw_transaction: &[u8]) -> Result<String>;
}
