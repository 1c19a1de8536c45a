//! Launch pipeline
//!
//! One run funds K generated wallets in a single transaction, launches one
//! token per wallet strictly in order, stores the batch and finally sweeps
//! leftover lamports back to the treasury.

use serde::{Deserialize, Serialize};

pub mod funding;
pub mod launcher;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod sweep;

pub use funding::{FundedBatch, FundingBuilder, FundingSigner};
pub use launcher::{BuyParams, ComputeBudget, LaunchOutcome, PumpPortalLauncher, TokenLauncher};
pub use metadata::{
    MetadataFields, MetadataPublisher, PinataPublisher, PublishedContent, PublishedMetadata,
    UploadFile,
};
pub use orchestrator::{
    LaunchedToken, Orchestrator, RunParams, RunReport, WalletLaunch, WalletOutcome,
};
pub use progress::{
    Notification, NotificationLevel, ProgressState, RunObserver, RunReporter, RunState,
};
pub use sweep::{Reclaimer, SweepReport, SweepResult};

use crate::errors::{LaunchError, LaunchResult};

/// Optional social links shown on the token page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(rename = "twitterLink", default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(rename = "websiteLink", default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(rename = "telegramLink", default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

impl SocialLinks {
    /// Drop blank entries
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            twitter: keep(self.twitter),
            website: keep(self.website),
            telegram: keep(self.telegram),
        }
    }
}

/// Token definition shared read-only by every wallet of a run
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub token_name: String,
    pub token_symbol: String,
    pub token_description: String,
    pub image: UploadFile,
    pub social_links: SocialLinks,
}

impl LaunchRequest {
    pub fn validate(&self) -> LaunchResult<()> {
        if self.token_name.trim().is_empty() || self.token_symbol.trim().is_empty() {
            return Err(LaunchError::InvalidRequest(
                "token name and symbol are required".to_string(),
            ));
        }
        if self.image.bytes.is_empty() {
            return Err(LaunchError::InvalidRequest("token image is empty".to_string()));
        }
        Ok(())
    }
}
