use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
use std::sync::Arc;

use super::{BlockhashInfo, LedgerRpc};
use crate::errors::LaunchResult;
use crate::metrics::{metrics, Timer};
use crate::retry::{retry_with_fixed_backoff, RetryPolicy};

/// Blocks added to the reported validity window of a fresh blockhash
pub const BLOCKHASH_VALIDITY_MARGIN: u64 = 150;

/// Ledger client applying the fixed-backoff policy to every call
///
/// After exhaustion the error of the last attempt is returned unchanged.
#[derive(Clone)]
pub struct RetryableRpc {
    inner: Arc<dyn LedgerRpc>,
    policy: RetryPolicy,
    blockhash_margin: u64,
}

impl RetryableRpc {
    pub fn new(inner: Arc<dyn LedgerRpc>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            blockhash_margin: BLOCKHASH_VALIDITY_MARGIN,
        }
    }

    pub fn with_blockhash_margin(mut self, margin: u64) -> Self {
        self.blockhash_margin = margin;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Same client with retries disabled, for callers retrying a larger unit
    pub fn single_attempt(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            policy: RetryPolicy::no_retry(),
            blockhash_margin: self.blockhash_margin,
        }
    }

    pub async fn get_balance(&self, pubkey: &Pubkey) -> LaunchResult<u64> {
        let timer = Timer::new();
        let result =
            retry_with_fixed_backoff("get_balance", &self.policy, || self.inner.get_balance(pubkey))
                .await;
        timer.observe_duration(&metrics().rpc_latency);
        result
    }

    /// Finalized blockhash with the validity window inflated by the margin
    pub async fn get_latest_blockhash(&self) -> LaunchResult<BlockhashInfo> {
        let info = retry_with_fixed_backoff("get_latest_blockhash", &self.policy, || {
            self.inner.get_latest_blockhash()
        })
        .await?;

        Ok(BlockhashInfo {
            blockhash: info.blockhash,
            last_valid_block_height: info
                .last_valid_block_height
                .saturating_add(self.blockhash_margin),
        })
    }

    pub async fn send_transaction(&self, tx: &VersionedTransaction) -> LaunchResult<Signature> {
        retry_with_fixed_backoff("send_transaction", &self.policy, || {
            self.inner.send_transaction(tx)
        })
        .await
    }

    pub async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &BlockhashInfo,
    ) -> LaunchResult<()> {
        retry_with_fixed_backoff("confirm_transaction", &self.policy, || {
            self.inner.confirm_transaction(signature, blockhash)
        })
        .await
    }

    pub async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> LaunchResult<u64> {
        retry_with_fixed_backoff(
            "get_minimum_balance_for_rent_exemption",
            &self.policy,
            || self.inner.get_minimum_balance_for_rent_exemption(data_len),
        )
        .await
    }

    /// Submit a signed transaction and wait for finalization, each step retried
    pub async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
        blockhash: &BlockhashInfo,
    ) -> LaunchResult<Signature> {
        let signature = self.send_transaction(tx).await?;
        self.confirm_transaction(&signature, blockhash).await?;
        Ok(signature)
    }
}
