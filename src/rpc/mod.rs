//! Ledger RPC access
//!
//! [`LedgerRpc`] is the seam to the chain: the solana-client backed
//! [`SolanaLedgerRpc`] in production, scripted mocks in tests. Components
//! never call it directly; they go through [`RetryableRpc`], which applies
//! the fixed-backoff policy to every call.

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};

use crate::errors::LaunchResult;

pub mod retryable;
pub mod solana;

pub use retryable::{RetryableRpc, BLOCKHASH_VALIDITY_MARGIN};
pub use solana::SolanaLedgerRpc;

/// Recent blockhash with the last block height at which it is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashInfo {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Ledger operations consumed by the launch pipeline
///
/// Every read and confirmation uses finalized commitment.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn get_balance(&self, pubkey: &Pubkey) -> LaunchResult<u64>;

    async fn get_latest_blockhash(&self) -> LaunchResult<BlockhashInfo>;

    async fn send_transaction(&self, tx: &VersionedTransaction) -> LaunchResult<Signature>;

    /// Wait until `signature` is finalized, failing once the blockhash expires
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &BlockhashInfo,
    ) -> LaunchResult<()>;

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LaunchResult<u64>;
}
