//! Configuration module for the launch orchestrator
//!
//! Configuration is loaded once at startup from a TOML file, overlaid with
//! secrets from the environment (a `.env` file is honoured), validated, and
//! then passed by reference to every component. Nothing reads the
//! environment after startup.

use crate::errors::LaunchError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Lower bound for the user-configured launch interval
pub const MIN_LAUNCH_INTERVAL_SECS: u64 = 5;

/// Environment variable names for secrets and endpoints
pub const ENV_RPC_URL: &str = "SOLANA_RPC_URL";
pub const ENV_PINATA_JWT: &str = "PINATA_JWT";
pub const ENV_PINATA_GATEWAY: &str = "PINATA_GATEWAY";
pub const ENV_TREASURY_KEY: &str = "TREASURY_PRIVATE_KEY";
pub const ENV_PUMPPORTAL_URL: &str = "PUMPPORTAL_URL";
pub const ENV_FUNDING_KEYPAIR: &str = "FUNDING_KEYPAIR_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for LaunchError {
    fn from(err: ConfigError) -> Self {
        LaunchError::Configuration(err.to_string())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ledger RPC configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Funding transaction configuration
    #[serde(default)]
    pub funding: FundingConfig,

    /// Per-wallet launch configuration
    #[serde(default)]
    pub launch: LaunchConfig,

    /// Sweep-back configuration
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Content-addressed storage gateway
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API
    #[serde(default)]
    pub server: ServerConfig,

    /// Token batch store
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Ledger RPC endpoint (overridden by `SOLANA_RPC_URL`)
    #[serde(default)]
    pub url: String,

    /// Attempts per RPC call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between RPC attempts
    #[serde(default = "default_rpc_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Blocks added to the reported last-valid block height
    #[serde(default = "default_blockhash_margin")]
    pub blockhash_margin: u64,

    /// Upper bound for a single confirmation wait
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    /// Signature status polling interval while confirming
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Lamports transferred to every generated wallet
    #[serde(default = "default_amount_per_wallet")]
    pub amount_per_wallet_lamports: u64,

    /// Funding keypair file (overridden by `FUNDING_KEYPAIR_PATH`)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,

    /// Seconds to wait after funding and between wallets (minimum 5)
    #[serde(default = "default_launch_interval")]
    pub launch_interval_secs: u64,

    /// Upper bound on wallets per run
    #[serde(default = "default_max_wallets")]
    pub max_wallets: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// PumpPortal trade-local endpoint (overridden by `PUMPPORTAL_URL`)
    #[serde(default = "default_launch_api_url")]
    pub api_url: String,

    /// Prefix of the public token page
    #[serde(default = "default_token_url_base")]
    pub token_url_base: String,

    /// Launchpad pool name passed to the launch API
    #[serde(default = "default_pool")]
    pub pool: String,

    /// Maximum slippage tolerance (basis points)
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    /// Initial buy per token
    #[serde(default = "default_buy_in_lamports")]
    pub buy_in_lamports: u64,

    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,

    /// Micro-lamports per compute unit
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price: u64,

    /// Attempts per wallet launch
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_launch_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Delay before each create-and-buy call
    #[serde(default = "default_pre_launch_delay_ms")]
    pub pre_launch_delay_ms: u64,

    /// Appended to every token description
    #[serde(default = "default_description_suffix")]
    pub description_suffix: Option<String>,

    /// Skip remaining attempts when the launch API rejects a request outright
    #[serde(default)]
    pub abort_on_rejection: bool,

    /// HTTP timeout for launch API calls
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Lamports left behind on top of the rent-exemption minimum
    #[serde(default = "default_fee_buffer")]
    pub fee_buffer_lamports: u64,

    /// Base58 treasury secret key (overridden by `TREASURY_PRIVATE_KEY`)
    #[serde(default, skip_serializing)]
    pub treasury_private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Pinata API base URL
    #[serde(default = "default_pinata_api_url")]
    pub api_url: String,

    /// Pinata JWT (overridden by `PINATA_JWT`)
    #[serde(default, skip_serializing)]
    pub jwt: String,

    /// Gateway hostname (overridden by `PINATA_GATEWAY`)
    #[serde(default)]
    pub gateway: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the sled database
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Attempts per store write
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_launch_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

// Default value functions
fn default_max_retries() -> u32 { 3 }
fn default_rpc_retry_delay_ms() -> u64 { 2000 }
fn default_launch_retry_delay_ms() -> u64 { 3000 }
fn default_blockhash_margin() -> u64 { 150 }
fn default_confirm_timeout() -> u64 { 120 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_amount_per_wallet() -> u64 { 35_000_000 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_launch_interval() -> u64 { MIN_LAUNCH_INTERVAL_SECS }
fn default_max_wallets() -> usize { 20 }
fn default_launch_api_url() -> String { "https://pumpportal.fun/api/trade-local".to_string() }
fn default_token_url_base() -> String { "https://pump.fun".to_string() }
fn default_pool() -> String { "pump".to_string() }
fn default_slippage_bps() -> u16 { 100 }
fn default_buy_in_lamports() -> u64 { LAMPORTS_PER_SOL / 10_000 }
fn default_compute_unit_limit() -> u32 { 250_000 }
fn default_compute_unit_price() -> u64 { 250_000 }
fn default_pre_launch_delay_ms() -> u64 { 3000 }
fn default_description_suffix() -> Option<String> {
    Some("The token is created for advertisement purposes via pumpboost.fun #ad".to_string())
}
fn default_http_timeout() -> u64 { 60 }
fn default_fee_buffer() -> u64 { 5_000_000 }
fn default_pinata_api_url() -> String { "https://api.pinata.cloud".to_string() }
fn default_bind() -> String { "0.0.0.0:3000".to_string() }
fn default_store_path() -> String { "data/tokens".to_string() }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_rpc_retry_delay_ms(),
            blockhash_margin: default_blockhash_margin(),
            confirm_timeout_secs: default_confirm_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            amount_per_wallet_lamports: default_amount_per_wallet(),
            keypair_path: default_keypair_path(),
            launch_interval_secs: default_launch_interval(),
            max_wallets: default_max_wallets(),
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            api_url: default_launch_api_url(),
            token_url_base: default_token_url_base(),
            pool: default_pool(),
            slippage_bps: default_slippage_bps(),
            buy_in_lamports: default_buy_in_lamports(),
            compute_unit_limit: default_compute_unit_limit(),
            compute_unit_price: default_compute_unit_price(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_launch_retry_delay_ms(),
            pre_launch_delay_ms: default_pre_launch_delay_ms(),
            description_suffix: default_description_suffix(),
            abort_on_rejection: false,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            fee_buffer_lamports: default_fee_buffer(),
            treasury_private_key: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_url: default_pinata_api_url(),
            jwt: String::new(),
            gateway: String::new(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_launch_retry_delay_ms(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the file (or defaults when absent), overlay the environment and validate
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file '{}' not found, using defaults", path);
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay secrets and endpoints from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_RPC_URL) {
            self.rpc.url = url;
        }
        if let Some(jwt) = non_empty(ENV_PINATA_JWT) {
            self.storage.jwt = jwt;
        }
        if let Some(gateway) = non_empty(ENV_PINATA_GATEWAY) {
            self.storage.gateway = gateway;
        }
        if let Some(key) = non_empty(ENV_TREASURY_KEY) {
            self.sweep.treasury_private_key = Some(key);
        }
        if let Some(url) = non_empty(ENV_PUMPPORTAL_URL) {
            self.launch.api_url = url;
        }
        if let Some(path) = non_empty(ENV_FUNDING_KEYPAIR) {
            self.funding.keypair_path = path;
        }
    }

    /// Check every setting needed by both the API server and launch runs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.url.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_RPC_URL));
        }
        if self.storage.jwt.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_PINATA_JWT));
        }
        if self.storage.gateway.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_PINATA_GATEWAY));
        }
        if self.funding.amount_per_wallet_lamports == 0 {
            return Err(ConfigError::Invalid {
                field: "funding.amount_per_wallet_lamports",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.funding.max_wallets == 0 {
            return Err(ConfigError::Invalid {
                field: "funding.max_wallets",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.launch.slippage_bps > 10_000 {
            return Err(ConfigError::Invalid {
                field: "launch.slippage_bps",
                reason: format!("{} exceeds 10000", self.launch.slippage_bps),
            });
        }
        if self.launch.buy_in_lamports >= self.funding.amount_per_wallet_lamports {
            return Err(ConfigError::Invalid {
                field: "launch.buy_in_lamports",
                reason: "must be below funding.amount_per_wallet_lamports".to_string(),
            });
        }
        Ok(())
    }

    /// Decode the treasury keypair; required for launch runs only
    pub fn treasury_keypair(&self) -> Result<Keypair, ConfigError> {
        let encoded = self
            .sweep
            .treasury_private_key
            .as_deref()
            .ok_or(ConfigError::Missing(ENV_TREASURY_KEY))?;
        crate::wallet::keypair_from_base58(encoded).map_err(|e| ConfigError::Invalid {
            field: ENV_TREASURY_KEY,
            reason: e.to_string(),
        })
    }
}

impl RpcConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

impl FundingConfig {
    /// Launch interval clamped to the minimum
    pub fn launch_interval(&self) -> Duration {
        Duration::from_secs(self.launch_interval_secs.max(MIN_LAUNCH_INTERVAL_SECS))
    }
}

impl LaunchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn pre_launch_delay(&self) -> Duration {
        Duration::from_millis(self.pre_launch_delay_ms)
    }

    /// Public page of a launched token
    pub fn token_url(&self, mint: &solana_sdk::pubkey::Pubkey) -> String {
        format!("{}/{}", self.token_url_base.trim_end_matches('/'), mint)
    }

    /// User description with the configured suffix appended once
    pub fn full_description(&self, description: &str) -> String {
        let Some(suffix) = &self.description_suffix else {
            return description.to_string();
        };
        if description.trim().is_empty() {
            return suffix.clone();
        }
        if description.trim_end().ends_with(suffix.trim()) {
            return description.to_string();
        }
        format!("{}\n\n{}", description, suffix)
    }
}

impl StoreConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete_env() -> impl Fn(&str) -> Option<String> {
        env(&[
            (ENV_RPC_URL, "http://localhost:8899"),
            (ENV_PINATA_JWT, "jwt-token"),
            (ENV_PINATA_GATEWAY, "example.mypinata.cloud"),
        ])
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.funding.amount_per_wallet_lamports, 35_000_000);
        assert_eq!(config.launch.slippage_bps, 100);
        assert_eq!(config.launch.buy_in_lamports, 100_000);
        assert_eq!(config.sweep.fee_buffer_lamports, 5_000_000);
        assert_eq!(config.rpc.blockhash_margin, 150);
        assert_eq!(config.rpc.max_retries, 3);
    }

    #[test]
    fn test_missing_secrets_fail_validation() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing(ENV_RPC_URL))
        ));

        let mut config = Config::default();
        config.apply_env(env(&[(ENV_RPC_URL, "http://localhost:8899")]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing(ENV_PINATA_JWT))
        ));

        let mut config = Config::default();
        config.apply_env(env(&[
            (ENV_RPC_URL, "http://localhost:8899"),
            (ENV_PINATA_JWT, "jwt"),
            (ENV_PINATA_GATEWAY, "   "),
        ]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing(ENV_PINATA_GATEWAY))
        ));
    }

    #[test]
    fn test_env_overlay_validates() {
        let mut config = Config::default();
        config.apply_env(complete_env());
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.gateway, "example.mypinata.cloud");
    }

    #[test]
    fn test_toml_sections_and_defaults() {
        let config = Config::from_toml_str(
            r#"
            [rpc]
            url = "http://127.0.0.1:8899"
            retry_delay_ms = 10

            [funding]
            launch_interval_secs = 1

            [launch]
            abort_on_rejection = true
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.url, "http://127.0.0.1:8899");
        assert_eq!(config.rpc.retry_policy().delay, Duration::from_millis(10));
        assert_eq!(config.rpc.max_retries, 3);
        assert!(config.launch.abort_on_rejection);
        // Clamped to the 5s minimum
        assert_eq!(config.funding.launch_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_buy_in() {
        let mut config = Config::default();
        config.apply_env(complete_env());
        config.launch.buy_in_lamports = config.funding.amount_per_wallet_lamports;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "launch.buy_in_lamports", .. })
        ));
    }

    #[test]
    fn test_treasury_keypair() {
        let config = Config::default();
        assert!(matches!(
            config.treasury_keypair(),
            Err(ConfigError::Missing(ENV_TREASURY_KEY))
        ));

        let keypair = Keypair::new();
        let mut config = Config::default();
        config.sweep.treasury_private_key = Some(keypair.to_base58_string());
        let decoded = config.treasury_keypair().unwrap();
        assert_eq!(decoded.to_bytes(), keypair.to_bytes());

        config.sweep.treasury_private_key = Some("not-base58-!!".to_string());
        assert!(config.treasury_keypair().is_err());
    }

    #[test]
    fn test_full_description() {
        let launch = LaunchConfig::default();
        let suffix = default_description_suffix().unwrap();
        assert_eq!(launch.full_description(""), suffix);
        assert_eq!(
            launch.full_description("moon"),
            format!("moon\n\n{}", suffix)
        );

        let plain = LaunchConfig {
            description_suffix: None,
            ..LaunchConfig::default()
        };
        assert_eq!(plain.full_description("moon"), "moon");
    }

    #[test]
    fn test_description_suffix_not_duplicated() {
        let launch = LaunchConfig::default();
        let suffix = default_description_suffix().unwrap();
        let tagged = format!("moon\n\n{}", suffix);

        assert_eq!(launch.full_description(&tagged), tagged);
        assert_eq!(
            launch.full_description(&format!("{}\n", tagged)),
            format!("{}\n", tagged)
        );
        assert_eq!(launch.full_description(&suffix), suffix);
    }

    #[test]
    fn test_token_url() {
        let launch = LaunchConfig {
            token_url_base: "https://pump.fun/".to_string(),
            ..LaunchConfig::default()
        };
        let mint = solana_sdk::pubkey::Pubkey::new_unique();
        assert_eq!(launch.token_url(&mint), format!("https://pump.fun/{}", mint));
    }
}
