//! Sweep-back of leftover lamports to the treasury
//!
//! Each wallet keeps the rent-exemption minimum plus a fee buffer; anything
//! above is transferred back. Wallets are independent: one failure is
//! reported and the remaining wallets are still swept.

use serde::Serialize;
use solana_sdk::{
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    system_instruction,
    transaction::{Transaction, VersionedTransaction},
};
use tracing::{info, warn};

use super::progress::RunReporter;
use crate::errors::{LaunchError, LaunchResult};
use crate::metrics::metrics;
use crate::retry::retry_until;
use crate::rpc::RetryableRpc;
use crate::wallet::GeneratedWallet;

/// Lamports that can leave a wallet, `None` when nothing is left above the reserve
pub fn transferable_lamports(balance: u64, rent_minimum: u64, fee_buffer: u64) -> Option<u64> {
    balance
        .checked_sub(rent_minimum)
        .and_then(|rest| rest.checked_sub(fee_buffer))
        .filter(|amount| *amount > 0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SweepResult {
    Swept { lamports: u64, signature: String },
    Skipped { balance: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// One entry per wallet, in wallet order
    pub wallets: Vec<(String, SweepResult)>,
    pub total_lamports: u64,
}

impl SweepReport {
    pub fn failed(&self) -> usize {
        self.wallets
            .iter()
            .filter(|(_, r)| matches!(r, SweepResult::Failed { .. }))
            .count()
    }
}

pub struct Reclaimer {
    rpc: RetryableRpc,
    treasury: Pubkey,
    fee_buffer: u64,
}

impl Reclaimer {
    pub fn new(rpc: RetryableRpc, treasury: Pubkey, fee_buffer: u64) -> Self {
        Self {
            rpc,
            treasury,
            fee_buffer,
        }
    }

    pub fn treasury(&self) -> Pubkey {
        self.treasury
    }

    /// Sweep every wallet; only the rent lookup can fail the whole sweep
    pub async fn sweep(
        &self,
        wallets: &mut [GeneratedWallet],
        reporter: &RunReporter,
    ) -> LaunchResult<SweepReport> {
        let rent_minimum = self.rpc.get_minimum_balance_for_rent_exemption(0).await?;
        let mut report = SweepReport::default();

        for (index, wallet) in wallets.iter_mut().enumerate() {
            let result = match self.sweep_wallet(wallet, rent_minimum).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(wallet = %wallet.name, error = %e, "Sweep failed");
                    metrics().sweeps_failed.inc();
                    reporter.error(
                        Some(index + 1),
                        format!("Failed to reclaim funds from {}: {}", wallet.name, e),
                    );
                    SweepResult::Failed {
                        error: e.to_string(),
                    }
                }
            };

            if let SweepResult::Swept { lamports, .. } = &result {
                report.total_lamports = report.total_lamports.saturating_add(*lamports);
            }
            report.wallets.push((wallet.name.clone(), result));
        }

        info!(
            lamports = report.total_lamports,
            failed = report.failed(),
            "Sweep finished"
        );
        Ok(report)
    }

    async fn sweep_wallet(
        &self,
        wallet: &mut GeneratedWallet,
        rent_minimum: u64,
    ) -> LaunchResult<SweepResult> {
        let balance = self.rpc.get_balance(&wallet.pubkey()).await?;
        wallet.balance = balance;

        let Some(amount) = transferable_lamports(balance, rent_minimum, self.fee_buffer) else {
            return Ok(SweepResult::Skipped { balance });
        };

        // The whole build, submit and confirm unit is retried, each try with a fresh blockhash
        let single = self.rpc.single_attempt();
        let rpc = &single;
        let source: &GeneratedWallet = wallet;
        let signature = retry_until(
            "sweep_transfer",
            self.rpc.policy(),
            |e: &LaunchError| !e.is_retryable(),
            || self.transfer(rpc, source, amount),
        )
        .await?;

        wallet.balance = balance - amount;
        metrics().sweeps_total.inc();
        metrics().swept_lamports.inc_by(amount);
        info!(wallet = %wallet.name, %signature, lamports = amount, "Swept to treasury");

        Ok(SweepResult::Swept {
            lamports: amount,
            signature: signature.to_string(),
        })
    }

    async fn transfer(
        &self,
        rpc: &RetryableRpc,
        wallet: &GeneratedWallet,
        amount: u64,
    ) -> LaunchResult<Signature> {
        let blockhash = rpc.get_latest_blockhash().await?;
        let ix = system_instruction::transfer(&wallet.pubkey(), &self.treasury, amount);
        let message =
            Message::new_with_blockhash(&[ix], Some(&wallet.pubkey()), &blockhash.blockhash);
        let mut tx = Transaction::new_unsigned(message);
        tx.try_sign(&[wallet.signer()], blockhash.blockhash)
            .map_err(|e| LaunchError::Build(format!("sweep signature: {}", e)))?;

        rpc.send_and_confirm(&VersionedTransaction::from(tx), &blockhash)
            .await
    }
}
