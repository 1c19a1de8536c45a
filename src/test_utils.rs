//! Test Utilities Module
//!
//! Deterministic in-memory stand-ins for the ledger, the metadata gateway,
//! the launch API and the batch store. The mock ledger applies system
//! transfers from submitted transactions atomically, so balance assertions
//! hold end to end without a validator.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction::SystemInstruction,
    system_program,
    transaction::VersionedTransaction,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::{LaunchError, LaunchResult};
use crate::launch::launcher::{BuyParams, LaunchOutcome, TokenLaunchMetadata, TokenLauncher};
use crate::launch::metadata::{MetadataPublisher, PublishedContent, UploadFile};
use crate::rpc::{BlockhashInfo, LedgerRpc};
use crate::store::{prepare_insert, select, StoreError, TokenBatchRecord, TokenStore};

/// Rent-exemption minimum of a zero-data account on mainnet
pub const DEFAULT_RENT_MINIMUM: u64 = 890_880;

/// Ledger call recorded by [`MockLedger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    GetBalance(Pubkey),
    GetLatestBlockhash,
    SendTransaction(Signature),
    ConfirmTransaction(Signature),
    GetRentExemption(usize),
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Pubkey, u64>,
    block_height: u64,
    rent_minimum: u64,
    failures: HashMap<String, u32>,
    calls: Vec<LedgerCall>,
    submitted: Vec<VersionedTransaction>,
    confirmed_against: Vec<BlockhashInfo>,
    fail_transactions: bool,
}

/// In-memory ledger
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Blocks a fresh blockhash stays valid for
    pub const BLOCKHASH_WINDOW: u64 = 150;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                rent_minimum: DEFAULT_RENT_MINIMUM,
                ..LedgerState::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }

    pub fn set_balance(&self, pubkey: &Pubkey, lamports: u64) {
        self.state().balances.insert(*pubkey, lamports);
    }

    pub fn balance(&self, pubkey: &Pubkey) -> u64 {
        self.state().balances.get(pubkey).copied().unwrap_or(0)
    }

    /// Remove lamports as an off-ledger program would
    pub fn debit(&self, pubkey: &Pubkey, lamports: u64) {
        let mut state = self.state();
        let balance = state.balances.entry(*pubkey).or_insert(0);
        *balance = balance.saturating_sub(lamports);
    }

    /// Accounts holding lamports, in no particular order
    pub fn funded_accounts(&self) -> Vec<Pubkey> {
        self.state()
            .balances
            .iter()
            .filter(|(_, lamports)| **lamports > 0)
            .map(|(pubkey, _)| *pubkey)
            .collect()
    }

    pub fn set_block_height(&self, height: u64) {
        self.state().block_height = height;
    }

    pub fn set_rent_minimum(&self, lamports: u64) {
        self.state().rent_minimum = lamports;
    }

    /// Make the next `times` calls of `operation` fail with a connectivity error
    pub fn fail_next(&self, operation: &str, times: u32) {
        self.state().failures.insert(operation.to_string(), times);
    }

    /// Accept submissions but report every transaction as failed on-chain
    pub fn fail_transactions(&self, fail: bool) {
        self.state().fail_transactions = fail;
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.state().calls.clone()
    }

    pub fn count<F: Fn(&LedgerCall) -> bool>(&self, predicate: F) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Transactions accepted by `send_transaction`
    pub fn submitted(&self) -> Vec<VersionedTransaction> {
        self.state().submitted.clone()
    }

    /// Blockhashes passed to `confirm_transaction`, in call order
    pub fn confirmed_against(&self) -> Vec<BlockhashInfo> {
        self.state().confirmed_against.clone()
    }

    fn record(&self, call: LedgerCall, operation: &str) -> LaunchResult<()> {
        let mut state = self.state();
        state.calls.push(call);
        match state.failures.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(LaunchError::connectivity(operation, "connection reset by peer"))
            }
            _ => Ok(()),
        }
    }

    /// Apply every system transfer of `tx`, or none of them
    fn apply(
        state: &mut LedgerState,
        tx: &VersionedTransaction,
        signature: &Signature,
    ) -> LaunchResult<()> {
        let keys = tx.message.static_account_keys();
        let mut balances = state.balances.clone();

        for ix in tx.message.instructions() {
            if keys[ix.program_id_index as usize] != system_program::id() {
                continue;
            }
            let lamports = match bincode::deserialize::<SystemInstruction>(&ix.data) {
                Ok(SystemInstruction::Transfer { lamports }) => lamports,
                Ok(SystemInstruction::CreateAccount { lamports, .. }) => lamports,
                _ => continue,
            };
            let from = keys[ix.accounts[0] as usize];
            let to = keys[ix.accounts[1] as usize];

            let source = balances.entry(from).or_insert(0);
            if *source < lamports {
                return Err(LaunchError::Transaction {
                    signature: signature.to_string(),
                    message: format!("insufficient lamports {}, need {}", source, lamports),
                });
            }
            *source -= lamports;
            *balances.entry(to).or_insert(0) += lamports;
        }

        state.balances = balances;
        Ok(())
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_balance(&self, pubkey: &Pubkey) -> LaunchResult<u64> {
        self.record(LedgerCall::GetBalance(*pubkey), "get_balance")?;
        Ok(self.balance(pubkey))
    }

    async fn get_latest_blockhash(&self) -> LaunchResult<BlockhashInfo> {
        self.record(LedgerCall::GetLatestBlockhash, "get_latest_blockhash")?;
        Ok(BlockhashInfo {
            blockhash: Hash::new_unique(),
            last_valid_block_height: self.state().block_height + Self::BLOCKHASH_WINDOW,
        })
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> LaunchResult<Signature> {
        let signature = tx.signatures.first().copied().unwrap_or_default();
        self.record(LedgerCall::SendTransaction(signature), "send_transaction")?;

        if !tx.verify_with_results().iter().all(|ok| *ok) {
            return Err(LaunchError::Transaction {
                signature: signature.to_string(),
                message: "signature verification failed".to_string(),
            });
        }

        let mut state = self.state();
        if !state.fail_transactions {
            Self::apply(&mut state, tx, &signature)?;
        }
        state.submitted.push(tx.clone());
        Ok(signature)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &BlockhashInfo,
    ) -> LaunchResult<()> {
        self.record(LedgerCall::ConfirmTransaction(*signature), "confirm_transaction")?;
        let mut state = self.state();
        state.confirmed_against.push(*blockhash);
        if state.fail_transactions {
            return Err(LaunchError::Transaction {
                signature: signature.to_string(),
                message: "custom program error: 0x1771".to_string(),
            });
        }
        Ok(())
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LaunchResult<u64> {
        self.record(
            LedgerCall::GetRentExemption(data_len),
            "get_minimum_balance_for_rent_exemption",
        )?;
        Ok(self.state().rent_minimum)
    }
}

/// Publisher keeping pinned objects in memory
#[derive(Default)]
pub struct MockPublisher {
    objects: Mutex<HashMap<String, Bytes>>,
    failures: Mutex<u32>,
    publish_count: Mutex<usize>,
}

impl MockPublisher {
    pub const GATEWAY: &'static str = "https://gateway.test";

    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` pin calls
    pub fn fail_next(&self, times: u32) {
        *self.failures.lock().unwrap() = times;
    }

    /// Number of successful pin calls
    pub fn publish_count(&self) -> usize {
        *self.publish_count.lock().unwrap()
    }

    fn pin(&self, bytes: Bytes) -> LaunchResult<PublishedContent> {
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(LaunchError::external("pinata", "502 Bad Gateway"));
        }
        drop(failures);

        let mut count = self.publish_count.lock().unwrap();
        *count += 1;
        let content_id = format!("QmMock{}", *count);
        self.objects
            .lock()
            .unwrap()
            .insert(content_id.clone(), bytes);
        Ok(PublishedContent {
            url: format!("{}/ipfs/{}", Self::GATEWAY, content_id),
            content_id,
        })
    }
}

#[async_trait]
impl MetadataPublisher for MockPublisher {
    async fn publish_file(&self, file: &UploadFile) -> LaunchResult<PublishedContent> {
        self.pin(file.bytes.clone())
    }

    async fn publish_json(&self, _name: &str, document: &Value) -> LaunchResult<PublishedContent> {
        let bytes = serde_json::to_vec(document)
            .map_err(|e| LaunchError::external("pinata", e.to_string()))?;
        self.pin(Bytes::from(bytes))
    }

    async fn fetch(&self, content_id: &str) -> LaunchResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(content_id)
            .cloned()
            .ok_or_else(|| LaunchError::external("pinata", format!("{} not found", content_id)))
    }
}

/// Scripted result of one [`MockLauncher`] call
#[derive(Debug, Clone)]
pub enum MockLaunch {
    Succeed,
    /// Call returns with `success == false`
    Unsuccessful,
    /// Call fails with a transient error
    Error,
    /// Call fails with a permanent rejection
    Reject,
    /// Returned transaction cannot be signed
    Unsignable,
}

/// Recorded create-and-buy call
#[derive(Debug, Clone)]
pub struct LaunchCall {
    pub signer: Pubkey,
    pub mint: Pubkey,
    pub uri: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Launcher replaying a script; once the script is empty every call succeeds
#[derive(Default)]
pub struct MockLauncher {
    script: Mutex<VecDeque<MockLaunch>>,
    calls: Mutex<Vec<LaunchCall>>,
    latency: Duration,
    spend: Option<(Arc<MockLedger>, u64)>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated duration of each call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Debit `lamports` from the signer on every successful launch
    pub fn spending(mut self, ledger: Arc<MockLedger>, lamports: u64) -> Self {
        self.spend = Some((ledger, lamports));
        self
    }

    pub fn push(&self, outcomes: impl IntoIterator<Item = MockLaunch>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    pub fn calls(&self) -> Vec<LaunchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenLauncher for MockLauncher {
    async fn create_and_buy(
        &self,
        signer: &Keypair,
        mint: &Keypair,
        metadata: &TokenLaunchMetadata,
        _params: &BuyParams,
    ) -> LaunchResult<LaunchOutcome> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.lock().unwrap().push(LaunchCall {
            signer: signer.pubkey(),
            mint: mint.pubkey(),
            uri: metadata.uri.clone(),
            started,
            finished: Instant::now(),
        });

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockLaunch::Succeed);
        match next {
            MockLaunch::Succeed => {
                if let Some((ledger, lamports)) = &self.spend {
                    ledger.debit(&signer.pubkey(), *lamports);
                }
                Ok(LaunchOutcome::succeeded(Signature::new_unique()))
            }
            MockLaunch::Unsuccessful => {
                Ok(LaunchOutcome::unsuccessful(None, "bonding curve busy"))
            }
            MockLaunch::Error => {
                Err(LaunchError::external("pumpportal", "503 Service Unavailable"))
            }
            MockLaunch::Reject => {
                Err(LaunchError::rejected("pumpportal", "invalid token metadata"))
            }
            MockLaunch::Unsignable => Err(LaunchError::Build(
                "signing create transaction: keypair-pubkey mismatch".to_string(),
            )),
        }
    }
}

/// Batch store kept in memory, newest first
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TokenBatchRecord>>,
    failures: Mutex<u32>,
    corrupt: Mutex<bool>,
    attempts: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` inserts with a storage error
    pub fn fail_next(&self, times: u32) {
        *self.failures.lock().unwrap() = times;
    }

    /// Fail every insert with a serialization error
    pub fn corrupt_writes(&self) {
        *self.corrupt.lock().unwrap() = true;
    }

    pub fn records(&self) -> Vec<TokenBatchRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Insert calls, failed ones included
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, record: TokenBatchRecord) -> Result<TokenBatchRecord, StoreError> {
        *self.attempts.lock().unwrap() += 1;
        let (_, record) = prepare_insert(record)?;
        if *self.corrupt.lock().unwrap() {
            let err = serde_json::from_str::<Value>("{").unwrap_err();
            return Err(StoreError::Serde(err));
        }

        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(StoreError::Sled(sled::Error::Unsupported(
                "disk unavailable".to_string(),
            )));
        }
        drop(failures);

        self.records.lock().unwrap().insert(0, record.clone());
        Ok(record)
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<TokenBatchRecord>, StoreError> {
        select(self.records().into_iter(), search)
    }
}
