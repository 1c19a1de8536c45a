use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::{BlockhashInfo, LedgerRpc};
use crate::config::RpcConfig;
use crate::errors::{LaunchError, LaunchResult};

/// [`LedgerRpc`] backed by the solana-client nonblocking RPC client
pub struct SolanaLedgerRpc {
    client: Arc<RpcClient>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl SolanaLedgerRpc {
    pub fn new(config: &RpcConfig) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(
            config.url.clone(),
            Duration::from_secs(config.confirm_timeout_secs),
            CommitmentConfig::finalized(),
        );
        Self {
            client: Arc::new(client),
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedgerRpc {
    async fn get_balance(&self, pubkey: &Pubkey) -> LaunchResult<u64> {
        self.client
            .get_balance_with_commitment(pubkey, CommitmentConfig::finalized())
            .await
            .map(|response| response.value)
            .map_err(|e| LaunchError::from_client_error(e, "get_balance"))
    }

    async fn get_latest_blockhash(&self) -> LaunchResult<BlockhashInfo> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(CommitmentConfig::finalized())
            .await
            .map_err(|e| LaunchError::from_client_error(e, "get_latest_blockhash"))?;

        Ok(BlockhashInfo {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> LaunchResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            ..RpcSendTransactionConfig::default()
        };

        self.client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| LaunchError::from_client_error(e, "send_transaction"))
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &BlockhashInfo,
    ) -> LaunchResult<()> {
        let deadline = Instant::now() + self.confirm_timeout;

        loop {
            let status = self
                .client
                .get_signature_status_with_commitment(signature, CommitmentConfig::finalized())
                .await
                .map_err(|e| LaunchError::from_client_error(e, "confirm_transaction"))?;

            match status {
                Some(Ok(())) => return Ok(()),
                Some(Err(e)) => {
                    return Err(LaunchError::Transaction {
                        signature: signature.to_string(),
                        message: e.to_string(),
                    })
                }
                None => {}
            }

            let block_height = self
                .client
                .get_block_height_with_commitment(CommitmentConfig::finalized())
                .await
                .map_err(|e| LaunchError::from_client_error(e, "get_block_height"))?;

            if block_height > blockhash.last_valid_block_height {
                return Err(LaunchError::Transaction {
                    signature: signature.to_string(),
                    message: format!(
                        "block height {} exceeded last valid height {}",
                        block_height, blockhash.last_valid_block_height
                    ),
                });
            }

            if Instant::now() >= deadline {
                return Err(LaunchError::connectivity(
                    "confirm_transaction",
                    format!(
                        "{} not finalized after {}s",
                        signature,
                        self.confirm_timeout.as_secs()
                    ),
                ));
            }

            debug!(%signature, block_height, "Waiting for finalization");
            sleep(self.poll_interval).await;
        }
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LaunchResult<u64> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| {
                LaunchError::from_client_error(e, "get_minimum_balance_for_rent_exemption")
            })
    }
}
