//! Chain access
//!
//! Everything the compounder needs from the node sits behind `ChainClient`:
//! pinned multicall reads, single reads for retry checks, simulation,
//! signed submission and receipt polling.

mod rpc;
mod signer;

#[cfg(test)]
pub mod mock;

pub use rpc::RpcChain;
pub use signer::Wallet;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use eyre::Result;
use std::time::Duration;

use crate::contracts::IMulticall3;

// ============================================
// TYPES
// ============================================

/// Per-call result of a tolerant multicall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

impl CallOutcome {
    pub fn ok(return_data: impl Into<Bytes>) -> Self {
        Self { success: true, return_data: return_data.into() }
    }

    pub fn failed() -> Self {
        Self { success: false, return_data: Bytes::new() }
    }
}

/// A compound transaction addressed to the bounty helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Final state of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Reverted,
}

/// RPC request counters for one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RpcStats {
    pub multicall: u64,
    pub normal: u64,
}

impl RpcStats {
    pub fn total(&self) -> u64 {
        self.multicall + self.normal
    }
}

/// Coarse classification of a submission failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitErrorKind {
    /// Another transaction from the same account got there first
    NonceConflict,
    Other,
}

impl SubmitErrorKind {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("nonce")
            || lower.contains("already known")
            || lower.contains("replacement transaction underpriced")
        {
            SubmitErrorKind::NonceConflict
        } else {
            SubmitErrorKind::Other
        }
    }
}

// ============================================
// TRAIT
// ============================================

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account that signs compound transactions
    fn sender(&self) -> Address;

    async fn block_number(&self) -> Result<u64>;

    /// Multicall3 `aggregate3`, optionally pinned to `block`
    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call3>,
        block: Option<u64>,
    ) -> Result<Vec<CallOutcome>>;

    /// Live `earned()` of a bault
    async fn earned(&self, vault: Address) -> Result<U256>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    /// Dry `eth_call` of the compound; errors carry the revert reason
    async fn simulate(&self, call: &ClaimCall) -> Result<()>;

    /// Sign and broadcast; returns the transaction hash
    async fn submit(&self, call: &ClaimCall) -> Result<B256>;

    async fn wait_for_receipt(&self, hash: B256, timeout: Duration) -> Result<TxStatus>;

    /// Counters since the last call (reset on read)
    fn take_rpc_stats(&self) -> RpcStats {
        RpcStats::default()
    }
}

// ============================================
// TESTS
// ============================================
