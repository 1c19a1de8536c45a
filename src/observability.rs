//! Run identifiers and structured run events

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier carried by every log line of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Structured logger for run events
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: RunId,
}

impl RunLogger {
    pub fn new(run_id: RunId) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn log_run_started(&self, wallets: usize, token_symbol: &str) {
        tracing::info!(
            run_id = %self.run_id,
            wallets,
            token_symbol = %token_symbol,
            "Launch run started"
        );
    }

    pub fn log_funded(&self, signature: &str, wallets: usize, lamports: u64) {
        tracing::info!(
            run_id = %self.run_id,
            signature = %signature,
            wallets,
            lamports,
            "Wallets funded"
        );
    }

    pub fn log_wallet_launched(&self, wallet: usize, token_url: &str, latency_ms: u64) {
        tracing::info!(
            run_id = %self.run_id,
            wallet,
            token_url = %token_url,
            latency_ms,
            "Token launched"
        );
    }

    pub fn log_wallet_failed(&self, wallet: usize, error: &str, latency_ms: u64) {
        tracing::warn!(
            run_id = %self.run_id,
            wallet,
            error = %error,
            latency_ms,
            "Token launch failed"
        );
    }

    pub fn log_stored(&self, record_id: &str) {
        tracing::info!(run_id = %self.run_id, record_id = %record_id, "Batch stored");
    }

    pub fn log_run_finished(&self, launched: usize, total: usize) {
        tracing::info!(
            run_id = %self.run_id,
            launched,
            total,
            "Launch run finished"
        );
    }

    pub fn log_run_failed(&self, error: &str) {
        tracing::error!(run_id = %self.run_id, error = %error, "Launch run failed");
    }
}
