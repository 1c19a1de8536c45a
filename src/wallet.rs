//! Wallet management module
//!
//! Key material stays inside `Keypair` values. The only place secret bytes
//! leave a `Keypair` is [`GeneratedWallet::to_record`], because the stored
//! batch layout carries them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::str::FromStr;
use std::sync::Arc;

/// Decode a 64-byte secret key, rejecting all-zero keys
pub fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 64 {
        anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}

/// Decode a base58 secret key as exported by wallets
pub fn keypair_from_base58(encoded: &str) -> Result<Keypair> {
    let bytes = zeroize::Zeroizing::new(
        bs58::decode(encoded.trim())
            .into_vec()
            .context("Secret key is not valid base58")?,
    );
    keypair_from_bytes(&bytes)
}

/// Funding wallet loaded from a local keypair file
pub struct FundingWallet {
    keypair: Arc<Keypair>,
}

impl FundingWallet {
    /// Load from a Solana CLI JSON keypair file or a raw 64-byte file
    pub fn from_file(path: &str) -> Result<Self> {
        let expanded = expand_home(path);
        let keypair_bytes = zeroize::Zeroizing::new(
            std::fs::read(&expanded)
                .with_context(|| format!("Failed to read keypair file: {}", expanded))?,
        );

        let keypair = if keypair_bytes.len() == 64 {
            keypair_from_bytes(&keypair_bytes)?
        } else {
            let json: zeroize::Zeroizing<Vec<u8>> = zeroize::Zeroizing::new(
                serde_json::from_slice(&keypair_bytes).context("Failed to parse keypair JSON")?,
            );
            keypair_from_bytes(&json).context("Invalid keypair from JSON")?
        };

        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl Clone for FundingWallet {
    fn clone(&self) -> Self {
        Self {
            keypair: Arc::clone(&self.keypair),
        }
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}

/// Stored wallet entry of a token batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub name: String,
    pub public_key: String,
    /// Last observed balance in lamports
    #[serde(default)]
    pub balance: u64,
    pub keypair: Vec<u8>,
    pub mint: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

impl WalletRecord {
    /// Public key recomputed from the stored secret key
    pub fn derived_pubkey(&self) -> Result<Pubkey> {
        Ok(keypair_from_bytes(&self.keypair)?.pubkey())
    }

    /// Whether `public_key` matches the stored secret key
    pub fn is_consistent(&self) -> bool {
        match (self.derived_pubkey(), Pubkey::from_str(&self.public_key)) {
            (Ok(derived), Ok(stored)) => derived == stored,
            _ => false,
        }
    }
}

/// Wallet generated for one run: a fee-paying signer plus the mint keypair
/// of the token it will launch
pub struct GeneratedWallet {
    pub name: String,
    signer: Keypair,
    mint: Keypair,
    /// Last observed balance in lamports
    pub balance: u64,
    pub token_url: Option<String>,
}

impl GeneratedWallet {
    /// Fresh signer and mint keypairs; `index` is zero-based
    pub fn generate(index: usize) -> Self {
        Self::from_keypairs(format!("Wallet {}", index + 1), Keypair::new(), Keypair::new())
    }

    pub fn from_keypairs(name: String, signer: Keypair, mint: Keypair) -> Self {
        Self {
            name,
            signer,
            mint,
            balance: 0,
            token_url: None,
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }

    pub fn mint_pubkey(&self) -> Pubkey {
        self.mint.pubkey()
    }

    pub fn signer(&self) -> &Keypair {
        &self.signer
    }

    pub fn mint(&self) -> &Keypair {
        &self.mint
    }

    pub fn is_launched(&self) -> bool {
        self.token_url.is_some()
    }

    pub fn to_record(&self) -> WalletRecord {
        WalletRecord {
            name: self.name.clone(),
            public_key: self.pubkey().to_string(),
            balance: self.balance,
            keypair: self.signer.to_bytes().to_vec(),
            mint: self.mint.to_bytes().to_vec(),
            token_url: self.token_url.clone(),
        }
    }
}

impl std::fmt::Debug for GeneratedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedWallet")
            .field("name", &self.name)
            .field("pubkey", &self.pubkey())
            .field("mint", &self.mint_pubkey())
            .field("balance", &self.balance)
            .field("token_url", &self.token_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rejects_zero_and_short_keys() {
        assert!(keypair_from_bytes(&[0u8; 64]).is_err());
        assert!(keypair_from_bytes(&[1u8; 32]).is_err());
    }

    #[test]
    fn test_base58_roundtrip() {
        let keypair = Keypair::new();
        let decoded = keypair_from_base58(&keypair.to_base58_string()).unwrap();
        assert_eq!(decoded.pubkey(), keypair.pubkey());
        assert!(keypair_from_base58("0OIl").is_err());
    }

    #[test]
    fn test_funding_wallet_from_json_file() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let wallet = FundingWallet::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_funding_wallet_from_raw_file() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&keypair.to_bytes()).unwrap();

        let wallet = FundingWallet::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_generated_wallet_record_is_consistent() {
        let mut wallet = GeneratedWallet::generate(0);
        wallet.balance = 35_000_000;
        wallet.token_url = Some(format!("https://pump.fun/{}", wallet.mint_pubkey()));

        let record = wallet.to_record();
        assert_eq!(record.name, "Wallet 1");
        assert_eq!(record.keypair.len(), 64);
        assert!(record.is_consistent());

        assert_eq!(record.derived_pubkey().unwrap(), wallet.pubkey());
        assert_eq!(
            keypair_from_bytes(&record.mint).unwrap().pubkey(),
            wallet.mint_pubkey()
        );
        assert_eq!(record.token_url, wallet.token_url);
    }

    #[test]
    fn test_record_json_layout() {
        let record = GeneratedWallet::generate(2).to_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Wallet 3");
        assert!(json.get("publicKey").is_some());
        assert!(json.get("tokenUrl").is_none());

        let mut tampered = record.clone();
        tampered.public_key = Pubkey::new_unique().to_string();
        assert!(!tampered.is_consistent());
    }
}
