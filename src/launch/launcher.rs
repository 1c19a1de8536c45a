//! Create-and-buy through the PumpPortal trade-local API
//!
//! The API builds an unsigned versioned transaction creating the token and
//! performing the initial buy. The wallet and mint keypairs sign it locally
//! and it is submitted through the retrying ledger client, so secret keys
//! never leave the process.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use solana_sdk::{
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{LaunchConfig, LAMPORTS_PER_SOL};
use crate::errors::{LaunchError, LaunchResult};
use crate::rpc::RetryableRpc;

const SERVICE: &str = "pumpportal";

/// Compute budget attached to the create transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_limit: u32,
    /// Micro-lamports per compute unit
    pub unit_price: u64,
}

impl ComputeBudget {
    /// Priority fee in lamports for the whole unit limit
    pub fn priority_fee_lamports(&self) -> u64 {
        (self.unit_limit as u64).saturating_mul(self.unit_price) / 1_000_000
    }
}

/// Initial buy performed together with the token creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyParams {
    pub buy_in_lamports: u64,
    pub slippage_bps: u16,
    pub compute_budget: ComputeBudget,
}

impl BuyParams {
    pub fn from_config(config: &LaunchConfig) -> Self {
        Self {
            buy_in_lamports: config.buy_in_lamports,
            slippage_bps: config.slippage_bps,
            compute_budget: ComputeBudget {
                unit_limit: config.compute_unit_limit,
                unit_price: config.compute_unit_price,
            },
        }
    }
}

/// On-chain metadata of the new token; `uri` points at the published JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLaunchMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// Result of one create-and-buy call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub success: bool,
    pub signature: Option<Signature>,
    pub message: Option<String>,
}

impl LaunchOutcome {
    pub fn succeeded(signature: Signature) -> Self {
        Self {
            success: true,
            signature: Some(signature),
            message: None,
        }
    }

    pub fn unsuccessful(signature: Option<Signature>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            signature,
            message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait TokenLauncher: Send + Sync {
    /// Create the token minted at `mint` and buy into it from `signer`
    async fn create_and_buy(
        &self,
        signer: &Keypair,
        mint: &Keypair,
        metadata: &TokenLaunchMetadata,
        params: &BuyParams,
    ) -> LaunchResult<LaunchOutcome>;
}

fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// [`TokenLauncher`] backed by PumpPortal
pub struct PumpPortalLauncher {
    http: Client,
    api_url: String,
    pool: String,
    rpc: RetryableRpc,
}

impl PumpPortalLauncher {
    pub fn new(config: &LaunchConfig, rpc: RetryableRpc) -> LaunchResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| LaunchError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            pool: config.pool.clone(),
            rpc,
        })
    }

    /// Ask the API for the unsigned create transaction
    async fn request_transaction(
        &self,
        signer: &Keypair,
        mint: &Keypair,
        metadata: &TokenLaunchMetadata,
        params: &BuyParams,
    ) -> LaunchResult<VersionedTransaction> {
        let body = json!({
            "publicKey": signer.pubkey().to_string(),
            "action": "create",
            "tokenMetadata": {
                "name": metadata.name,
                "symbol": metadata.symbol,
                "uri": metadata.uri,
            },
            "mint": mint.pubkey().to_string(),
            "denominatedInSol": "true",
            "amount": lamports_to_sol(params.buy_in_lamports),
            "slippage": params.slippage_bps as f64 / 100.0,
            "priorityFee": lamports_to_sol(params.compute_budget.priority_fee_lamports()),
            "pool": self.pool,
        });

        let response = self.http.post(&self.api_url).json(&body).send().await?;
        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let reason = response.text().await.unwrap_or_default();
            return Err(LaunchError::rejected(SERVICE, reason));
        }
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(LaunchError::external(
                SERVICE,
                format!("trade-local returned {}: {}", status, reason),
            ));
        }

        let bytes = response.bytes().await?;
        bincode::deserialize::<VersionedTransaction>(&bytes).map_err(|e| {
            LaunchError::external(SERVICE, format!("undecodable transaction: {}", e))
        })
    }
}

#[async_trait]
impl TokenLauncher for PumpPortalLauncher {
    async fn create_and_buy(
        &self,
        signer: &Keypair,
        mint: &Keypair,
        metadata: &TokenLaunchMetadata,
        params: &BuyParams,
    ) -> LaunchResult<LaunchOutcome> {
        let unsigned = self
            .request_transaction(signer, mint, metadata, params)
            .await?;
        debug!(mint = %mint.pubkey(), "Received create transaction");

        // Re-blockhash so expiry is tracked against the hash that was signed
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let mut message = unsigned.message;
        message.set_recent_blockhash(blockhash.blockhash);

        let tx = VersionedTransaction::try_new(message, &[mint, signer])
            .map_err(|e| LaunchError::Build(format!("signing create transaction: {}", e)))?;

        match self.rpc.send_and_confirm(&tx, &blockhash).await {
            Ok(signature) => {
                info!(%signature, mint = %mint.pubkey(), "Token created");
                Ok(LaunchOutcome::succeeded(signature))
            }
            Err(LaunchError::Transaction { signature, message }) => {
                warn!(%signature, error = %message, "Create transaction failed on-chain");
                Ok(LaunchOutcome::unsuccessful(signature.parse().ok(), message))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::rpc::BLOCKHASH_VALIDITY_MARGIN;
    use crate::test_utils::{LedgerCall, MockLedger};
    use mockito::Matcher;
    use solana_sdk::{
        message::{Message, VersionedMessage},
        system_instruction, system_program,
    };
    use std::sync::Arc;

    fn params() -> BuyParams {
        BuyParams::from_config(&LaunchConfig::default())
    }

    fn metadata() -> TokenLaunchMetadata {
        TokenLaunchMetadata {
            name: "Boost".to_string(),
            symbol: "PB".to_string(),
            uri: "https://gw/ipfs/QmMeta".to_string(),
        }
    }

    fn unsigned_create(signer: &Keypair, mint: &Keypair) -> Vec<u8> {
        let ix = system_instruction::create_account(
            &signer.pubkey(),
            &mint.pubkey(),
            1_461_600,
            82,
            &system_program::id(),
        );
        let message = Message::new(&[ix], Some(&signer.pubkey()));
        let tx = VersionedTransaction {
            signatures: vec![
                Signature::default();
                message.header.num_required_signatures as usize
            ],
            message: VersionedMessage::Legacy(message),
        };
        bincode::serialize(&tx).unwrap()
    }

    fn launcher(server: &mockito::ServerGuard, ledger: &Arc<MockLedger>) -> PumpPortalLauncher {
        let config = LaunchConfig {
            api_url: format!("{}/api/trade-local", server.url()),
            http_timeout_secs: 5,
            ..LaunchConfig::default()
        };
        let rpc = RetryableRpc::new(
            ledger.clone(),
            RetryPolicy::new(3, Duration::from_millis(10)),
        );
        PumpPortalLauncher::new(&config, rpc).unwrap()
    }

    #[test]
    fn test_priority_fee() {
        let budget = ComputeBudget {
            unit_limit: 250_000,
            unit_price: 250_000,
        };
        assert_eq!(budget.priority_fee_lamports(), 62_500);
    }

    #[tokio::test]
    async fn test_create_and_buy_signs_and_submits() {
        let signer = Keypair::new();
        let mint = Keypair::new();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/trade-local")
            .match_body(Matcher::PartialJson(json!({
                "publicKey": signer.pubkey().to_string(),
                "action": "create",
                "mint": mint.pubkey().to_string(),
                "slippage": 1.0,
                "pool": "pump",
                "tokenMetadata": { "symbol": "PB", "uri": "https://gw/ipfs/QmMeta" },
            })))
            .with_status(200)
            .with_body(unsigned_create(&signer, &mint))
            .create_async()
            .await;

        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(&signer.pubkey(), 10_000_000);
        let outcome = launcher(&server, &ledger)
            .create_and_buy(&signer, &mint, &metadata(), &params())
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(
            ledger.count(|c| matches!(c, LedgerCall::SendTransaction(_))),
            1
        );
        let submitted = ledger.submitted();
        assert!(submitted[0].verify_with_results().iter().all(|ok| *ok));
        assert_eq!(ledger.balance(&mint.pubkey()), 1_461_600);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_confirms_against_signed_blockhash() {
        let signer = Keypair::new();
        let mint = Keypair::new();
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/trade-local")
            .with_status(200)
            .with_body(unsigned_create(&signer, &mint))
            .create_async()
            .await;

        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(&signer.pubkey(), 10_000_000);
        ledger.set_block_height(1_000);
        launcher(&server, &ledger)
            .create_and_buy(&signer, &mint, &metadata(), &params())
            .await
            .unwrap();

        let submitted = ledger.submitted();
        let confirmed = ledger.confirmed_against();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(*submitted[0].message.recent_blockhash(), confirmed[0].blockhash);
        assert_eq!(
            confirmed[0].last_valid_block_height,
            1_000 + MockLedger::BLOCKHASH_WINDOW + BLOCKHASH_VALIDITY_MARGIN
        );
        assert!(submitted[0].verify_with_results().iter().all(|ok| *ok));
    }

    #[tokio::test]
    async fn test_bad_request_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/trade-local")
            .with_status(400)
            .with_body("invalid uri")
            .create_async()
            .await;

        let ledger = Arc::new(MockLedger::new());
        let err = launcher(&server, &ledger)
            .create_and_buy(&Keypair::new(), &Keypair::new(), &metadata(), &params())
            .await
            .unwrap_err();

        assert!(err.is_permanent());
        assert_eq!(ledger.count(|c| matches!(c, LedgerCall::SendTransaction(_))), 0);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/trade-local")
            .with_status(503)
            .create_async()
            .await;

        let ledger = Arc::new(MockLedger::new());
        let err = launcher(&server, &ledger)
            .create_and_buy(&Keypair::new(), &Keypair::new(), &metadata(), &params())
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::ExternalService { .. }));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_on_chain_failure_is_unsuccessful_outcome() {
        let signer = Keypair::new();
        let mint = Keypair::new();
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/trade-local")
            .with_status(200)
            .with_body(unsigned_create(&signer, &mint))
            .create_async()
            .await;

        let ledger = Arc::new(MockLedger::new());
        ledger.fail_transactions(true);

        let outcome = launcher(&server, &ledger)
            .create_and_buy(&signer, &mint, &metadata(), &params())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.message.is_some());
    }
}
