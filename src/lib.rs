//! pumpboost - multi-wallet token launch orchestrator
//!
//! Funds a batch of freshly generated wallets from one signer, launches one
//! pump.fun token per wallet in sequence, stores the batch and sweeps the
//! leftovers back to a treasury key. The same per-wallet launch routine backs
//! the HTTP API.

pub mod api;
pub mod config;
pub mod errors;
pub mod launch;
pub mod metrics;
pub mod observability;
pub mod retry;
pub mod rpc;
pub mod store;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::Config;
pub use errors::{LaunchError, LaunchResult};

#[cfg(test)]
mod tests {
    mod launch_run_tests;
    mod sequencing_tests;
    mod test_helpers;
}
