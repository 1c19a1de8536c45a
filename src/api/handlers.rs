//! API request handlers

use super::{responses::*, ApiState};
use crate::errors::LaunchError;
use crate::launch::{LaunchRequest, SocialLinks, UploadFile};
use crate::metrics::metrics;
use crate::store::TokenBatchRecord;
use crate::wallet::{keypair_from_bytes, GeneratedWallet};
use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::Value;
use zeroize::Zeroizing;

/// Query parameters of the token list
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}

/// Query parameters of the token search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Secret keys of the wallet launching a single token
#[derive(Deserialize)]
struct WalletData {
    #[serde(default)]
    name: Option<String>,
    keypair: Vec<u8>,
    mint: Vec<u8>,
}

/// Form fields of a single-wallet launch
#[derive(Default)]
struct CreateTokenForm {
    file: Option<UploadFile>,
    token_name: String,
    token_symbol: String,
    token_description: String,
    wallet_data: Option<Zeroizing<String>>,
    social_links: SocialLinks,
}

impl CreateTokenForm {
    async fn parse(mut multipart: Multipart) -> Result<Self, LaunchError> {
        let mut form = Self::default();
        let invalid = |e: axum::extract::multipart::MultipartError| {
            LaunchError::InvalidRequest(format!("malformed form data: {}", e))
        };

        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().unwrap_or("image").to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(invalid)?;
                    form.file = Some(UploadFile::new(file_name, content_type, bytes));
                }
                "walletData" => {
                    form.wallet_data = Some(Zeroizing::new(field.text().await.map_err(invalid)?));
                }
                other => {
                    let value = field.text().await.map_err(invalid)?;
                    match other {
                        "tokenName" => form.token_name = value,
                        "tokenSymbol" => form.token_symbol = value,
                        "tokenDescription" => form.token_description = value,
                        "twitterLink" => form.social_links.twitter = Some(value),
                        "websiteLink" => form.social_links.website = Some(value),
                        "telegramLink" => form.social_links.telegram = Some(value),
                        _ => {}
                    }
                }
            }
        }
        Ok(form)
    }

    fn into_parts(self) -> Result<(LaunchRequest, GeneratedWallet), LaunchError> {
        let image = self
            .file
            .ok_or_else(|| LaunchError::InvalidRequest("No file provided".to_string()))?;
        let raw = self
            .wallet_data
            .ok_or_else(|| LaunchError::InvalidRequest("No wallet data provided".to_string()))?;

        let data: WalletData = serde_json::from_str(&raw)
            .map_err(|e| LaunchError::InvalidRequest(format!("invalid wallet data: {}", e)))?;
        let keypair_bytes = Zeroizing::new(data.keypair);
        let mint_bytes = Zeroizing::new(data.mint);
        let signer = keypair_from_bytes(&keypair_bytes)
            .map_err(|e| LaunchError::InvalidRequest(format!("wallet keypair: {}", e)))?;
        let mint = keypair_from_bytes(&mint_bytes)
            .map_err(|e| LaunchError::InvalidRequest(format!("mint keypair: {}", e)))?;
        let wallet = GeneratedWallet::from_keypairs(
            data.name.unwrap_or_else(|| "Wallet 1".to_string()),
            signer,
            mint,
        );

        let request = LaunchRequest {
            token_name: self.token_name,
            token_symbol: self.token_symbol,
            token_description: self.token_description,
            image,
            social_links: self.social_links.normalized(),
        };
        request.validate()?;
        Ok((request, wallet))
    }
}

/// Launch one token from a caller-supplied wallet
pub async fn create_token(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> (StatusCode, Json<CreateTokenResponse>) {
    // Raw secret keys cross the wire here; callers should prefer the CLI run
    tracing::warn!("Single-wallet launch received secret key material over HTTP");

    let parts = match CreateTokenForm::parse(multipart).await {
        Ok(form) => form.into_parts(),
        Err(e) => Err(e),
    };
    let (request, mut wallet) = match parts {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!(error = %e, "Rejected launch request");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CreateTokenResponse::failed(e.to_string())),
            );
        }
    };

    metrics().launches_total.inc();
    match state.wallet_launch.launch(&mut wallet, &request).await {
        Ok(launched) => {
            metrics().launches_success.inc();
            tracing::info!(token_url = %launched.token_url, "Token launched");
            (
                StatusCode::OK,
                Json(CreateTokenResponse::launched(launched.token_url)),
            )
        }
        Err(e) => {
            metrics().launches_failed.inc();
            tracing::error!(wallet = %wallet.pubkey(), error = %e, "Token launch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CreateTokenResponse::failed(e.to_string())),
            )
        }
    }
}

/// Store a token batch
pub async fn store_tokens(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<ApiResponse<TokenBatchRecord>>) {
    let has_wallets = body
        .get("wallets")
        .and_then(Value::as_array)
        .is_some_and(|w| !w.is_empty());
    if !has_wallets {
        tracing::error!("Invalid or empty wallets array");
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Invalid wallets data")),
        );
    }

    let record: TokenBatchRecord = match serde_json::from_value(body) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(error = %e, "Invalid token batch");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!("Invalid token data: {}", e))),
            );
        }
    };

    match state.store.insert(record).await {
        Ok(stored) => (StatusCode::OK, Json(ApiResponse::ok(stored))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to store token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to store token data")),
            )
        }
    }
}

/// List stored batches newest-first
pub async fn list_tokens(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<TokenBatchRecord>>>) {
    match state.store.list(query.search.as_deref()).await {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::ok(records))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch tokens");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to fetch tokens")),
            )
        }
    }
}

/// Search stored batches by name or symbol
pub async fn search_tokens(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<TokenBatchRecord>>>) {
    let Some(q) = query.q.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Search query is required")),
        );
    };

    match state.store.list(Some(&q)).await {
        Ok(records) => {
            let count = records.len();
            (StatusCode::OK, Json(ApiResponse::ok(records).with_count(count)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to search tokens");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to search tokens")),
            )
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        service: env!("CARGO_PKG_NAME").to_string(),
    })
}

/// Prometheus text exposition
pub async fn metrics_text() -> impl IntoResponse {
    match metrics().render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                String::new(),
            )
        }
    }
}
