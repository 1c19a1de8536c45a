//! Token batch persistence
//!
//! One JSON document per run in the `tokens` tree. Keys are the big-endian
//! creation time in microseconds followed by the record uuid, so reverse
//! iteration yields newest-first without a secondary index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::LaunchError;
use crate::launch::SocialLinks;
use crate::wallet::WalletRecord;

const TOKENS_TREE: &str = "tokens";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Token batch has no wallets")]
    EmptyWallets,

    #[error("Storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl StoreError {
    /// Invalid input is not worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Sled(_))
    }
}

impl From<StoreError> for LaunchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmptyWallets | StoreError::Pattern(_) => {
                LaunchError::InvalidRequest(err.to_string())
            }
            other => LaunchError::Persistence(other.to_string()),
        }
    }
}

/// Persisted outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBatchRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub token_name: String,
    pub token_symbol: String,
    #[serde(default)]
    pub token_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub social_links: SocialLinks,
    /// Seconds between wallet launches
    #[serde(default)]
    pub launch_interval: u64,
    #[serde(default)]
    pub funding_wallet: String,
    #[serde(default)]
    pub wallets: Vec<WalletRecord>,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TokenBatchRecord {
    /// Case-insensitive match on name or symbol
    fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.token_name) || pattern.is_match(&self.token_symbol)
    }
}

/// Case-insensitive search pattern; invalid regexes match literally
pub fn search_pattern(search: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(search)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(search))
                .case_insensitive(true)
                .build()
        })
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a batch, assigning its id and creation time
    async fn insert(&self, record: TokenBatchRecord) -> Result<TokenBatchRecord, StoreError>;

    /// Batches newest-first, optionally filtered by name or symbol
    async fn list(&self, search: Option<&str>) -> Result<Vec<TokenBatchRecord>, StoreError>;
}

/// Validate and stamp a record before it is written
pub fn prepare_insert(
    mut record: TokenBatchRecord,
) -> Result<(Uuid, TokenBatchRecord), StoreError> {
    if record.wallets.is_empty() {
        return Err(StoreError::EmptyWallets);
    }
    let id = Uuid::new_v4();
    record.id = Some(id.to_string());
    record.created_at = Utc::now();
    Ok((id, record))
}

/// Keep records matching `search`, preserving their order
pub fn select(
    records: impl Iterator<Item = TokenBatchRecord>,
    search: Option<&str>,
) -> Result<Vec<TokenBatchRecord>, StoreError> {
    let pattern = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(search_pattern(s)?),
        None => None,
    };
    Ok(records
        .filter(|r| pattern.as_ref().map_or(true, |p| r.matches(p)))
        .collect())
}

/// sled-backed [`TokenStore`]
#[derive(Clone)]
pub struct SledTokenStore {
    tree: sled::Tree,
}

impl SledTokenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::Config::default()
            .path(path)
            .mode(sled::Mode::LowSpace)
            .flush_every_ms(Some(1000))
            .open()?;
        let tree = db.open_tree(TOKENS_TREE)?;
        Ok(Self { tree })
    }

    fn key(record: &TokenBatchRecord, id: &Uuid) -> [u8; 24] {
        let micros = record.created_at.timestamp_micros().max(0) as u64;
        let mut key = [0u8; 24];
        key[..8].copy_from_slice(&micros.to_be_bytes());
        key[8..].copy_from_slice(id.as_bytes());
        key
    }
}

#[async_trait]
impl TokenStore for SledTokenStore {
    async fn insert(&self, record: TokenBatchRecord) -> Result<TokenBatchRecord, StoreError> {
        let (id, record) = prepare_insert(record)?;
        let value = serde_json::to_vec(&record)?;
        self.tree.insert(Self::key(&record, &id), value)?;
        self.tree.flush_async().await?;
        debug!(id = %id, wallets = record.wallets.len(), "Stored token batch");
        Ok(record)
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<TokenBatchRecord>, StoreError> {
        let records = self
            .tree
            .iter()
            .values()
            .rev()
            .map(|value| -> Result<TokenBatchRecord, StoreError> {
                Ok(serde_json::from_slice(&value?)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        select(records.into_iter(), search)
    }
}
