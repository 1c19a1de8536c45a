//! Shared fixtures for the run-level tests

use bytes::Bytes;
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LaunchConfig;
use crate::launch::{
    FundingBuilder, LaunchRequest, Orchestrator, Reclaimer, RunParams, SocialLinks, UploadFile,
    WalletLaunch,
};
use crate::retry::RetryPolicy;
use crate::rpc::RetryableRpc;
use crate::test_utils::{MemoryStore, MockLaunch, MockLauncher, MockLedger, MockPublisher};
use crate::wallet::FundingWallet;

pub const AMOUNT: u64 = 35_000_000;
pub const FEE_BUFFER: u64 = 5_000_000;
/// Lamports a successful launch consumes from its wallet
pub const LAUNCH_COST: u64 = 2_000_000;
pub const INTERVAL: Duration = Duration::from_secs(5);

pub struct Harness {
    pub ledger: Arc<MockLedger>,
    pub publisher: Arc<MockPublisher>,
    pub launcher: Arc<MockLauncher>,
    pub store: Arc<MemoryStore>,
    pub funder: FundingWallet,
    pub treasury: Pubkey,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(funder_balance: u64, script: Vec<MockLaunch>) -> Self {
        Self::with_config(funder_balance, script, LaunchConfig::default())
    }

    pub fn with_config(funder_balance: u64, script: Vec<MockLaunch>, config: LaunchConfig) -> Self {
        let ledger = Arc::new(MockLedger::new());
        let funder = FundingWallet::from_keypair(Keypair::new());
        ledger.set_balance(&funder.pubkey(), funder_balance);
        let treasury = Pubkey::new_unique();

        let publisher = Arc::new(MockPublisher::new());
        let launcher = Arc::new(
            MockLauncher::new()
                .with_latency(Duration::from_secs(2))
                .spending(ledger.clone(), LAUNCH_COST),
        );
        launcher.push(script);
        let store = Arc::new(MemoryStore::new());

        let rpc = RetryableRpc::new(
            ledger.clone(),
            RetryPolicy::new(3, Duration::from_millis(2000)),
        );
        let wallet_launch = Arc::new(WalletLaunch::new(
            rpc.clone(),
            publisher.clone(),
            launcher.clone(),
            config,
        ));
        let orchestrator = Orchestrator::new(
            FundingBuilder::new(rpc.clone(), AMOUNT),
            wallet_launch,
            store.clone(),
            Reclaimer::new(rpc, treasury, FEE_BUFFER),
            RetryPolicy::new(3, Duration::from_millis(3000)),
            20,
        );

        Self {
            ledger,
            publisher,
            launcher,
            store,
            funder,
            treasury,
            orchestrator,
        }
    }

    pub fn params(wallet_count: usize) -> RunParams {
        RunParams::new(wallet_count, INTERVAL)
    }
}

pub fn request() -> LaunchRequest {
    LaunchRequest {
        token_name: "Pump Boost".to_string(),
        token_symbol: "PBST".to_string(),
        token_description: "Community token".to_string(),
        image: UploadFile::new("logo.png", "image/png", Bytes::from_static(b"\x89PNG")),
        social_links: SocialLinks {
            twitter: Some("https://x.com/pumpboost".to_string()),
            website: None,
            telegram: None,
        },
    }
}
