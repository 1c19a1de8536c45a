//! HTTP API: single-wallet launch and token batch storage

mod handlers;
mod responses;

pub use responses::{ApiResponse, CreateTokenResponse, HealthResponse};

use crate::launch::WalletLaunch;
use crate::store::TokenStore;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Upper bound on a request body, sized for token images
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn TokenStore>,
    pub wallet_launch: Arc<WalletLaunch>,
}

impl ApiState {
    pub fn new(store: Arc<dyn TokenStore>, wallet_launch: Arc<WalletLaunch>) -> Self {
        Self {
            store,
            wallet_launch,
        }
    }
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/create-sol", post(handlers::create_token))
        .route("/tokens", post(handlers::store_tokens).get(handlers::list_tokens))
        .route("/tokens/search", get(handlers::search_tokens))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_text))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(state: ApiState, bind: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind).await?;
    info!("API server listening on {}", bind);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
