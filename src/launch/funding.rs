//! Batched funding of freshly generated wallets
//!
//! One legacy transaction carries a system transfer per wallet, so the batch
//! is funded entirely or not at all. The funder balance is checked before
//! anything is generated or submitted.

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    message::Message,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{Signature, Signer},
    system_instruction,
    transaction::{Transaction, VersionedTransaction},
};
use tracing::{info, instrument};

use crate::errors::{LaunchError, LaunchResult};
use crate::metrics::metrics;
use crate::rpc::RetryableRpc;
use crate::wallet::{FundingWallet, GeneratedWallet};

/// Public key plus signing capability of the funder
///
/// Implementations may sign locally or delegate to an external wallet; the
/// builder only ever asks for one signature per run.
#[async_trait]
pub trait FundingSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign_transaction(&self, tx: Transaction) -> LaunchResult<Transaction>;
}

#[async_trait]
impl FundingSigner for FundingWallet {
    fn pubkey(&self) -> Pubkey {
        FundingWallet::pubkey(self)
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> LaunchResult<Transaction> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[self.keypair()], blockhash)
            .map_err(|e| LaunchError::Build(format!("funding signature: {}", e)))?;
        Ok(tx)
    }
}

/// Wallets funded by one confirmed transaction
#[derive(Debug)]
pub struct FundedBatch {
    pub wallets: Vec<GeneratedWallet>,
    pub signature: Signature,
    pub total_lamports: u64,
}

/// Unsigned transaction moving `amount` lamports from `payer` to each destination
pub fn build_funding_transaction(
    payer: &Pubkey,
    destinations: &[Pubkey],
    amount: u64,
    blockhash: Hash,
) -> LaunchResult<Transaction> {
    let instructions: Vec<_> = destinations
        .iter()
        .map(|to| system_instruction::transfer(payer, to, amount))
        .collect();
    let message = Message::new_with_blockhash(&instructions, Some(payer), &blockhash);
    let tx = Transaction::new_unsigned(message);

    let size = bincode::serialized_size(&tx)
        .map_err(|e| LaunchError::Build(format!("funding transaction size: {}", e)))?;
    if size as usize > PACKET_DATA_SIZE {
        return Err(LaunchError::Build(format!(
            "funding transaction for {} wallets is {} bytes, limit is {}",
            destinations.len(),
            size,
            PACKET_DATA_SIZE
        )));
    }
    Ok(tx)
}

pub struct FundingBuilder {
    rpc: RetryableRpc,
    amount_per_wallet: u64,
}

impl FundingBuilder {
    pub fn new(rpc: RetryableRpc, amount_per_wallet: u64) -> Self {
        Self {
            rpc,
            amount_per_wallet,
        }
    }

    /// Lamports the funder needs for `count` wallets
    pub fn required_lamports(&self, count: usize) -> LaunchResult<u64> {
        (count as u64)
            .checked_mul(self.amount_per_wallet)
            .ok_or_else(|| {
                LaunchError::InvalidRequest(format!(
                    "{} wallets overflow the funding amount",
                    count
                ))
            })
    }

    /// Generate `count` wallets and fund them in a single transaction
    #[instrument(skip(self, signer), fields(funder = %signer.pubkey()))]
    pub async fn fund(
        &self,
        signer: &dyn FundingSigner,
        count: usize,
    ) -> LaunchResult<FundedBatch> {
        if count == 0 {
            return Err(LaunchError::InvalidRequest(
                "wallet count must be at least 1".to_string(),
            ));
        }

        let required = self.required_lamports(count)?;
        let available = self.rpc.get_balance(&signer.pubkey()).await?;
        if available < required {
            return Err(LaunchError::InsufficientFunds {
                required,
                available,
            });
        }

        let mut wallets: Vec<GeneratedWallet> = (0..count).map(GeneratedWallet::generate).collect();
        let destinations: Vec<Pubkey> = wallets.iter().map(GeneratedWallet::pubkey).collect();

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = build_funding_transaction(
            &signer.pubkey(),
            &destinations,
            self.amount_per_wallet,
            blockhash.blockhash,
        )?;
        let tx = signer.sign_transaction(tx).await?;

        let signature = self
            .rpc
            .send_and_confirm(&VersionedTransaction::from(tx), &blockhash)
            .await?;

        for wallet in &mut wallets {
            wallet.balance = self.amount_per_wallet;
        }
        metrics().wallets_funded.inc_by(count as u64);
        info!(%signature, wallets = count, lamports = required, "Funding transaction finalized");

        Ok(FundedBatch {
            wallets,
            signature,
            total_lamports: required,
        })
    }
}
