//! Token launch orchestration
//!
//! A run moves through
//! `Initializing → FundingWallets → LaunchingToken(i) → StoringRecord →
//! SweepingBack → Done`, or ends in `Failed` on a fatal error. Wallets are
//! launched strictly one after another; a wallet whose retries are exhausted
//! is reported and skipped, it never fails the run.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn, Instrument};

use super::funding::{FundingBuilder, FundingSigner};
use super::launcher::{BuyParams, LaunchOutcome, TokenLaunchMetadata, TokenLauncher};
use super::metadata::{MetadataFields, MetadataPublisher, PublishedMetadata};
use super::progress::{ProgressState, RunReporter, RunState};
use super::sweep::{Reclaimer, SweepReport};
use super::LaunchRequest;
use crate::config::{LaunchConfig, MIN_LAUNCH_INTERVAL_SECS};
use crate::errors::{LaunchError, LaunchResult};
use crate::metrics::{metrics, Timer};
use crate::observability::{RunId, RunLogger};
use crate::retry::{retry_until, RetryPolicy};
use crate::rpc::RetryableRpc;
use crate::store::{StoreError, TokenBatchRecord, TokenStore};
use crate::wallet::GeneratedWallet;

/// Token created by one wallet
#[derive(Debug, Clone)]
pub struct LaunchedToken {
    pub token_url: String,
    pub metadata: PublishedMetadata,
    pub outcome: LaunchOutcome,
}

/// Per-wallet launch routine: balance check, metadata publish, create-and-buy
pub struct WalletLaunch {
    rpc: RetryableRpc,
    publisher: Arc<dyn MetadataPublisher>,
    launcher: Arc<dyn TokenLauncher>,
    config: LaunchConfig,
}

impl WalletLaunch {
    pub fn new(
        rpc: RetryableRpc,
        publisher: Arc<dyn MetadataPublisher>,
        launcher: Arc<dyn TokenLauncher>,
        config: LaunchConfig,
    ) -> Self {
        Self {
            rpc,
            publisher,
            launcher,
            config,
        }
    }

    /// Launch one token from `wallet`; publish and create are retried together
    pub async fn launch(
        &self,
        wallet: &mut GeneratedWallet,
        request: &LaunchRequest,
    ) -> LaunchResult<LaunchedToken> {
        let balance = self.rpc.get_balance(&wallet.pubkey()).await?;
        wallet.balance = balance;
        if balance < self.config.buy_in_lamports {
            return Err(LaunchError::InsufficientFunds {
                required: self.config.buy_in_lamports,
                available: balance,
            });
        }

        let description = self.config.full_description(&request.token_description);
        let params = BuyParams::from_config(&self.config);
        let abort_on_rejection = self.config.abort_on_rejection;
        let source: &GeneratedWallet = wallet;

        let launched = retry_until(
            "launch_token",
            &self.config.retry_policy(),
            |e: &LaunchError| !e.is_retryable() || (abort_on_rejection && e.is_permanent()),
            || self.attempt(source, request, &description, &params),
        )
        .await?;

        wallet.token_url = Some(launched.token_url.clone());
        Ok(launched)
    }

    async fn attempt(
        &self,
        wallet: &GeneratedWallet,
        request: &LaunchRequest,
        description: &str,
        params: &BuyParams,
    ) -> LaunchResult<LaunchedToken> {
        let fields = MetadataFields {
            name: &request.token_name,
            symbol: &request.token_symbol,
            description,
            social_links: &request.social_links,
        };
        let metadata = self.publisher.publish(&request.image, &fields).await?;

        sleep(self.config.pre_launch_delay()).await;

        let token = TokenLaunchMetadata {
            name: request.token_name.clone(),
            symbol: request.token_symbol.clone(),
            uri: metadata.metadata.url.clone(),
        };
        let outcome = self
            .launcher
            .create_and_buy(wallet.signer(), wallet.mint(), &token, params)
            .await?;

        if !outcome.success {
            return Err(LaunchError::external(
                "launcher",
                outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| "launch reported no success".to_string()),
            ));
        }

        Ok(LaunchedToken {
            token_url: self.config.token_url(&wallet.mint_pubkey()),
            metadata,
            outcome,
        })
    }
}

/// Caller-chosen parameters of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    pub wallet_count: usize,
    /// Wait after funding and between wallets
    pub launch_interval: Duration,
}

impl RunParams {
    /// Interval below the 5 second minimum is raised to it
    pub fn new(wallet_count: usize, launch_interval: Duration) -> Self {
        Self {
            wallet_count,
            launch_interval: launch_interval.max(Duration::from_secs(MIN_LAUNCH_INTERVAL_SECS)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletOutcome {
    pub name: String,
    pub public_key: String,
    pub mint: String,
    pub token_url: Option<String>,
    pub error: Option<String>,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    pub funding_signature: Option<String>,
    pub record_id: Option<String>,
    pub wallets: Vec<WalletOutcome>,
    pub sweep: Option<SweepReport>,
}

impl RunReport {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            state: RunState::Idle,
            funding_signature: None,
            record_id: None,
            wallets: Vec::new(),
            sweep: None,
        }
    }

    pub fn launched(&self) -> usize {
        self.wallets.iter().filter(|w| w.token_url.is_some()).count()
    }
}

pub struct Orchestrator {
    funding: FundingBuilder,
    wallet_launch: Arc<WalletLaunch>,
    store: Arc<dyn TokenStore>,
    reclaimer: Reclaimer,
    store_policy: RetryPolicy,
    max_wallets: usize,
}

impl Orchestrator {
    pub fn new(
        funding: FundingBuilder,
        wallet_launch: Arc<WalletLaunch>,
        store: Arc<dyn TokenStore>,
        reclaimer: Reclaimer,
        store_policy: RetryPolicy,
        max_wallets: usize,
    ) -> Self {
        Self {
            funding,
            wallet_launch,
            store,
            reclaimer,
            store_policy,
            max_wallets,
        }
    }

    /// Execute one run to completion; fatal errors end in `RunState::Failed`
    pub async fn run(
        &self,
        request: &LaunchRequest,
        signer: &dyn FundingSigner,
        params: RunParams,
        reporter: &RunReporter,
    ) -> RunReport {
        let logger = RunLogger::new(RunId::new());
        let mut report = RunReport::new(logger.run_id().clone());
        let span = tracing::info_span!("launch_run", run_id = %logger.run_id());

        metrics().runs_started.inc();
        metrics().active_runs.inc();

        let result = self
            .execute(request, signer, params, reporter, &logger, &mut report)
            .instrument(span)
            .await;

        metrics().active_runs.dec();
        match result {
            Ok(()) => {
                metrics().runs_completed.inc();
                logger.log_run_finished(report.launched(), params.wallet_count);
                reporter.set_state(RunState::Done);
            }
            Err(e) => {
                metrics().runs_failed.inc();
                logger.log_run_failed(&e.to_string());
                reporter.error(None, e.to_string());
                reporter.set_state(RunState::Failed {
                    error: e.to_string(),
                });
            }
        }
        report.state = reporter.state();
        report
    }

    async fn execute(
        &self,
        request: &LaunchRequest,
        signer: &dyn FundingSigner,
        params: RunParams,
        reporter: &RunReporter,
        logger: &RunLogger,
        report: &mut RunReport,
    ) -> LaunchResult<()> {
        reporter.set_state(RunState::Initializing);
        request.validate()?;
        if params.wallet_count == 0 || params.wallet_count > self.max_wallets {
            return Err(LaunchError::InvalidRequest(format!(
                "wallet count must be between 1 and {}",
                self.max_wallets
            )));
        }
        let total = params.wallet_count;
        logger.log_run_started(total, &request.token_symbol);

        reporter.set_state(RunState::FundingWallets);
        let batch = self.funding.fund(signer, total).await?;
        logger.log_funded(&batch.signature.to_string(), total, batch.total_lamports);
        report.funding_signature = Some(batch.signature.to_string());
        let mut wallets = batch.wallets;

        let mut image_url = None;
        for (i, wallet) in wallets.iter_mut().enumerate() {
            let index = i + 1;
            sleep(params.launch_interval).await;

            reporter.set_state(RunState::LaunchingToken { index, total });
            reporter.set_progress(ProgressState::new(
                index,
                total,
                format!("Processing wallet {}", index),
            ));

            metrics().launches_total.inc();
            let timer = Timer::new();
            let started = Instant::now();
            let result = self.wallet_launch.launch(wallet, request).await;
            timer.observe_duration(&metrics().launch_latency);
            let latency_ms = started.elapsed().as_millis() as u64;

            let error = match result {
                Ok(launched) => {
                    metrics().launches_success.inc();
                    logger.log_wallet_launched(index, &launched.token_url, latency_ms);
                    image_url.get_or_insert(launched.metadata.image.url);
                    reporter.success(Some(index), format!("Processed wallet {}", index));
                    None
                }
                Err(e) => {
                    metrics().launches_failed.inc();
                    logger.log_wallet_failed(index, &e.to_string(), latency_ms);
                    reporter.error(
                        Some(index),
                        format!("Failed to process wallet {}: {}", index, e),
                    );
                    Some(e.to_string())
                }
            };

            report.wallets.push(WalletOutcome {
                name: wallet.name.clone(),
                public_key: wallet.pubkey().to_string(),
                mint: wallet.mint_pubkey().to_string(),
                token_url: wallet.token_url.clone(),
                error,
            });
        }

        reporter.set_state(RunState::StoringRecord);
        let record = TokenBatchRecord {
            id: None,
            token_name: request.token_name.clone(),
            token_symbol: request.token_symbol.clone(),
            token_description: request.token_description.clone(),
            image_url,
            social_links: request.social_links.clone(),
            launch_interval: params.launch_interval.as_secs(),
            funding_wallet: signer.pubkey().to_string(),
            wallets: wallets.iter().map(GeneratedWallet::to_record).collect(),
            created_at: chrono::Utc::now(),
        };
        let stored = retry_until(
            "store_batch",
            &self.store_policy,
            |e: &StoreError| !e.is_retryable(),
            || self.store.insert(record.clone()),
        )
        .await
        .map_err(LaunchError::from);

        let stored = match stored {
            Ok(stored) => stored,
            Err(e) => {
                // Unrecorded wallets still hold funds; return them before failing
                error!(error = %e, "Batch could not be stored, sweeping before abort");
                reporter.set_state(RunState::SweepingBack);
                report.sweep = self.sweep(&mut wallets, reporter).await;
                return Err(e);
            }
        };
        report.record_id = stored.id.clone();
        if let Some(id) = &stored.id {
            logger.log_stored(id);
        }

        reporter.set_state(RunState::SweepingBack);
        report.sweep = self.sweep(&mut wallets, reporter).await;
        Ok(())
    }

    async fn sweep(
        &self,
        wallets: &mut [GeneratedWallet],
        reporter: &RunReporter,
    ) -> Option<SweepReport> {
        match self.reclaimer.sweep(wallets, reporter).await {
            Ok(sweep) => {
                info!(
                    treasury = %self.reclaimer.treasury(),
                    lamports = sweep.total_lamports,
                    "Funds reclaimed"
                );
                Some(sweep)
            }
            Err(e) => {
                warn!(error = %e, "Sweep could not start");
                reporter.error(None, format!("Failed to reclaim funds: {}", e));
                None
            }
        }
    }
}
