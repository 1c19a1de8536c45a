//! HTTP API tests against a real sled store
//!
//! Ledger, gateway and launch API point at unreachable addresses; only
//! routes that never leave the process are exercised here.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pumpboost::api::{create_router, ApiState};
use pumpboost::config::{LaunchConfig, RpcConfig, StorageConfig};
use pumpboost::launch::{PinataPublisher, PumpPortalLauncher, WalletLaunch};
use pumpboost::rpc::{RetryableRpc, SolanaLedgerRpc};
use pumpboost::store::SledTokenStore;
use serde_json::{json, Value};
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn create_test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SledTokenStore::open(dir.path().join("tokens")).unwrap();

    let rpc_config = RpcConfig {
        url: UNREACHABLE.to_string(),
        ..RpcConfig::default()
    };
    let rpc = RetryableRpc::new(
        Arc::new(SolanaLedgerRpc::new(&rpc_config)),
        rpc_config.retry_policy(),
    );
    let storage = StorageConfig {
        api_url: UNREACHABLE.to_string(),
        jwt: "test-jwt".to_string(),
        gateway: "gateway.test".to_string(),
        ..StorageConfig::default()
    };
    let launch_config = LaunchConfig {
        api_url: format!("{}/api/trade-local", UNREACHABLE),
        ..LaunchConfig::default()
    };

    let wallet_launch = WalletLaunch::new(
        rpc.clone(),
        Arc::new(PinataPublisher::new(&storage).unwrap()),
        Arc::new(PumpPortalLauncher::new(&launch_config, rpc).unwrap()),
        launch_config,
    );
    let state = ApiState::new(Arc::new(store), Arc::new(wallet_launch));
    (create_router(state), dir)
}

fn batch(name: &str, symbol: &str) -> Value {
    let signer = Keypair::new();
    let mint = Keypair::new();
    json!({
        "tokenName": name,
        "tokenSymbol": symbol,
        "tokenDescription": "test batch",
        "twitterLink": "https://x.com/test",
        "launchInterval": 5,
        "fundingWallet": Keypair::new().pubkey().to_string(),
        "wallets": [{
            "name": "Wallet 1",
            "publicKey": signer.pubkey().to_string(),
            "balance": 35_000_000u64,
            "keypair": signer.to_bytes().to_vec(),
            "mint": mint.to_bytes().to_vec(),
            "tokenUrl": format!("https://pump.fun/{}", mint.pubkey()),
        }],
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _dir) = create_test_app();

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "pumpboost");
}

#[tokio::test]
async fn test_store_and_list_tokens() {
    let (app, _dir) = create_test_app();

    let (status, json) = send(&app, post_json("/tokens", &batch("First", "ONE"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["data"]["id"].is_string());
    assert_eq!(json["data"]["twitterLink"], "https://x.com/test");

    tokio::time::sleep(Duration::from_millis(5)).await;
    let (status, _) = send(&app, post_json("/tokens", &batch("Second", "TWO"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, get("/tokens")).await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["tokenName"], "Second");
    assert_eq!(data[1]["tokenName"], "First");
}

#[tokio::test]
async fn test_store_rejects_missing_wallets() {
    let (app, _dir) = create_test_app();

    let mut body = batch("Empty", "NIL");
    body["wallets"] = json!([]);
    let (status, json) = send(&app, post_json("/tokens", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Invalid wallets data");

    body.as_object_mut().unwrap().remove("wallets");
    let (status, _) = send(&app, post_json("/tokens", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(&app, get("/tokens")).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_filters_case_insensitively() {
    let (app, _dir) = create_test_app();
    send(&app, post_json("/tokens", &batch("Moon Dog", "MDOG"))).await;
    send(&app, post_json("/tokens", &batch("Sun Cat", "SCAT"))).await;

    let (status, json) = send(&app, get("/tokens?search=moon")).await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["tokenSymbol"], "MDOG");

    // Invalid regex falls back to a literal match
    let (status, json) = send(&app, get("/tokens?search=%5B")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_requires_query() {
    let (app, _dir) = create_test_app();

    let (status, json) = send(&app, get("/tokens/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Search query is required");
}

#[tokio::test]
async fn test_search_returns_count() {
    let (app, _dir) = create_test_app();
    send(&app, post_json("/tokens", &batch("Moon Dog", "MDOG"))).await;
    send(&app, post_json("/tokens", &batch("Moon Cat", "MCAT"))).await;
    send(&app, post_json("/tokens", &batch("Sun Cat", "SCAT"))).await;

    let (status, json) = send(&app, get("/tokens/search?q=cat")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_sol_without_file_is_rejected() {
    let (app, _dir) = create_test_app();
    let boundary = "api-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"tokenName\"\r\n\r\nBoost\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/create-sol")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("No file provided"));
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (app, _dir) = create_test_app();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("launches_total"));
}
