//! pumpboost - multi-wallet token launch orchestrator
//!
//! `serve` exposes the HTTP API; `launch` performs one full run from the
//! command line and prints its report as JSON.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use solana_sdk::signature::Signer;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pumpboost::api::{self, ApiState};
use pumpboost::config::Config;
use pumpboost::launch::{
    FundingBuilder, LaunchRequest, NotificationLevel, Orchestrator, PinataPublisher,
    PumpPortalLauncher, Reclaimer, RunParams, RunReporter, RunState, SocialLinks, UploadFile,
    WalletLaunch,
};
use pumpboost::rpc::{RetryableRpc, SolanaLedgerRpc};
use pumpboost::store::{SledTokenStore, TokenStore};
use pumpboost::wallet::FundingWallet;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Fund wallets and launch one token per wallet
    Launch(LaunchArgs),
}

#[derive(Args, Debug)]
struct LaunchArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    symbol: String,

    #[arg(long, default_value = "")]
    description: String,

    /// Token image file
    #[arg(long)]
    image: String,

    /// Number of wallets to fund and launch from
    #[arg(long, default_value_t = 1)]
    wallets: usize,

    /// Seconds between launches; defaults to the configured interval
    #[arg(long)]
    interval: Option<u64>,

    #[arg(long)]
    twitter: Option<String>,

    #[arg(long)]
    website: Option<String>,

    #[arg(long)]
    telegram: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    info!("Starting pumpboost v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from: {}", cli.config);
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Launch(args) => launch(&config, args).await,
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "pumpboost=debug,info"
    } else {
        "pumpboost=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }
    Ok(())
}

fn ledger_rpc(config: &Config) -> RetryableRpc {
    let ledger = SolanaLedgerRpc::new(&config.rpc);
    info!("Ledger RPC: {}", ledger.url());
    RetryableRpc::new(Arc::new(ledger), config.rpc.retry_policy())
    .with_blockhash_margin(config.rpc.blockhash_margin)
}

fn wallet_launch(config: &Config, rpc: RetryableRpc) -> Result<WalletLaunch> {
    let publisher =
        PinataPublisher::new(&config.storage).context("Failed to create metadata publisher")?;
    let launcher = PumpPortalLauncher::new(&config.launch, rpc.clone())
        .context("Failed to create launch client")?;
    Ok(WalletLaunch::new(
        rpc,
        Arc::new(publisher),
        Arc::new(launcher),
        config.launch.clone(),
    ))
}

fn open_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
    info!("Opening token store at {}", config.store.path);
    let store = SledTokenStore::open(&config.store.path)
        .with_context(|| format!("Failed to open token store at {}", config.store.path))?;
    Ok(Arc::new(store))
}

async fn serve(config: &Config) -> Result<()> {
    let rpc = ledger_rpc(config);
    let state = ApiState::new(open_store(config)?, Arc::new(wallet_launch(config, rpc)?));

    api::serve(state, &config.server.bind, shutdown_signal()).await?;
    info!("Shutting down gracefully...");
    Ok(())
}

async fn launch(config: &Config, args: LaunchArgs) -> Result<()> {
    let treasury = config.treasury_keypair()?;
    let funder = FundingWallet::from_file(&config.funding.keypair_path)
        .context("Failed to load funding wallet")?;
    info!("Funding wallet: {}", funder.pubkey());
    info!("Treasury: {}", treasury.pubkey());

    let request = read_request(&args).await?;
    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.funding.launch_interval());
    let params = RunParams::new(args.wallets, interval);

    let rpc = ledger_rpc(config);
    let orchestrator = Orchestrator::new(
        FundingBuilder::new(rpc.clone(), config.funding.amount_per_wallet_lamports),
        Arc::new(wallet_launch(config, rpc.clone())?),
        open_store(config)?,
        Reclaimer::new(rpc, treasury.pubkey(), config.sweep.fee_buffer_lamports),
        config.store.retry_policy(),
        config.funding.max_wallets,
    );

    let (reporter, mut observer) = RunReporter::channel();
    let notifier = tokio::spawn(async move {
        while let Some(n) = observer.notifications.recv().await {
            match n.level {
                NotificationLevel::Success => info!(wallet = ?n.wallet, "{}", n.message),
                NotificationLevel::Error => error!(wallet = ?n.wallet, "{}", n.message),
            }
        }
    });

    let report = run_to_completion(
        orchestrator.run(&request, &funder, params, &reporter),
        interrupt_signal(),
    )
    .await;
    drop(reporter);
    if let Err(e) = notifier.await {
        warn!("Notification task ended abnormally: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    if let RunState::Failed { error } = &report.state {
        anyhow::bail!("Launch run failed: {}", error);
    }
    Ok(())
}

async fn read_request(args: &LaunchArgs) -> Result<LaunchRequest> {
    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read image {}", args.image))?;
    let file_name = Path::new(&args.image)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();

    Ok(LaunchRequest {
        token_name: args.name.clone(),
        token_symbol: args.symbol.clone(),
        token_description: args.description.clone(),
        image: UploadFile::new(file_name, content_type(&args.image), Bytes::from(bytes)),
        social_links: SocialLinks {
            twitter: args.twitter.clone(),
            website: args.website.clone(),
            telegram: args.telegram.clone(),
        }
        .normalized(),
    })
}

fn content_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Drive `run` to the end even if `interrupt` fires first
///
/// Generated wallet keys only reach the store late in a run, so dropping
/// the run early would strand funded lamports.
async fn run_to_completion<F, I>(run: F, interrupt: I) -> F::Output
where
    F: Future,
    I: Future<Output = ()>,
{
    tokio::pin!(run);
    tokio::select! {
        output = &mut run => return output,
        _ = interrupt => {
            warn!("Interrupt received; finishing the run so funds are stored and swept");
        }
    }
    run.await
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for interrupt signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Received shutdown signal");
}
