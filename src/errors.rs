//! Error taxonomy for funding, launching and sweeping
//!
//! Every fallible step of a launch run maps onto one of these variants. The
//! variant decides how far an error travels:
//! - `Connectivity` / `ExternalService` / `Persistence` are retried by the
//!   fixed-backoff policy and only surface once attempts are exhausted
//! - `InsufficientFunds`, `Configuration`, `Build` and `InvalidRequest` are
//!   never retried; during funding they fail the run, during a wallet's
//!   launch they only fail that wallet
//! - `Rejected` is a permanent launch API refusal that may skip remaining
//!   attempts when `launch.abort_on_rejection` is set

use solana_client::client_error::ClientError;
use thiserror::Error;

/// Errors produced by the launch pipeline
#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    /// Ledger RPC unreachable or returned a transport-level failure
    #[error("Connectivity error during {operation}: {message}")]
    Connectivity { operation: String, message: String },

    /// Funding signer cannot cover the batch
    #[error("Insufficient funds: required {required} lamports, available {available} lamports")]
    InsufficientFunds { required: u64, available: u64 },

    /// Missing or invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Metadata publisher or launch API failed, or reported `success == false`
    #[error("External service failure ({service}): {message}")]
    ExternalService { service: String, message: String },

    /// Launch API refused the request in a way retries cannot fix
    #[error("Launch rejected ({service}): {message}")]
    Rejected { service: String, message: String },

    /// A submitted transaction did not reach finalized commitment
    #[error("Transaction {signature} failed: {message}")]
    Transaction { signature: String, message: String },

    /// Batch record could not be stored
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Transaction could not be assembled or signed
    #[error("Transaction build error: {0}")]
    Build(String),

    /// Launch request is missing a required field
    #[error("Invalid launch request: {0}")]
    InvalidRequest(String),
}

/// Result alias used across the launch pipeline
pub type LaunchResult<T> = Result<T, LaunchError>;

impl LaunchError {
    pub fn connectivity(operation: &str, message: impl Into<String>) -> Self {
        LaunchError::Connectivity {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn external(service: &str, message: impl Into<String>) -> Self {
        LaunchError::ExternalService {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn rejected(service: &str, message: impl Into<String>) -> Self {
        LaunchError::Rejected {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Whether the fixed-backoff policy should try again after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            LaunchError::Connectivity { .. } => true,
            LaunchError::ExternalService { .. } => true,
            LaunchError::Transaction { .. } => true,
            LaunchError::Persistence(_) => true,
            // Only retried when the caller does not short-circuit rejections
            LaunchError::Rejected { .. } => true,

            LaunchError::InsufficientFunds { .. } => false,
            LaunchError::Configuration(_) => false,
            LaunchError::Build(_) => false,
            LaunchError::InvalidRequest(_) => false,
        }
    }

    /// Permanent outcomes: retrying yields the same answer
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            LaunchError::Rejected { .. }
                | LaunchError::InsufficientFunds { .. }
                | LaunchError::Configuration(_)
                | LaunchError::Build(_)
                | LaunchError::InvalidRequest(_)
        )
    }

    /// Classify a solana-client error by inspecting its message
    pub fn from_client_error(err: ClientError, operation: &str) -> Self {
        let err_str = err.to_string().to_lowercase();

        // Ledger-side refusals carry no signature yet; transport failures do not reach the ledger
        if err_str.contains("insufficient funds")
            || err_str.contains("insufficient lamports")
            || err_str.contains("blockhash not found")
            || err_str.contains("block height exceeded")
        {
            LaunchError::Transaction {
                signature: "unknown".to_string(),
                message: err.to_string(),
            }
        } else {
            LaunchError::connectivity(operation, err.to_string())
        }
    }
}

impl From<reqwest::Error> for LaunchError {
    fn from(err: reqwest::Error) -> Self {
        let service = err
            .url()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        LaunchError::ExternalService {
            service,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(LaunchError::connectivity("get_balance", "connection refused").is_retryable());
        assert!(LaunchError::external("pinata", "502").is_retryable());
        assert!(LaunchError::Persistence("io".to_string()).is_retryable());

        assert!(!LaunchError::InsufficientFunds {
            required: 10,
            available: 1,
        }
        .is_retryable());
        assert!(!LaunchError::Configuration("missing".to_string()).is_retryable());
    }

    #[test]
    fn test_error_is_permanent() {
        assert!(LaunchError::rejected("pumpportal", "bad metadata").is_permanent());
        assert!(!LaunchError::external("pumpportal", "timeout").is_permanent());
    }

    #[test]
    fn test_error_display() {
        let err = LaunchError::InsufficientFunds {
            required: 105_000_000,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 105000000 lamports, available 1 lamports"
        );
    }
}
