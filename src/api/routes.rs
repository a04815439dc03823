//! HTTP routes
//!
//! Thin adapters from JSON requests to `Wallet` operations. Error mapping to
//! status codes lives in `WalletError::into_response`.

use crate::api::auth::require_token;
use crate::api::AppState;
use crate::errors::{Result, WalletError};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::{middleware, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provisioned: bool,
    pub uptime_seconds: u64,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub private_key: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub address: String,
}

#[derive(Deserialize)]
pub struct SignRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct SignResponse {
    pub signature: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub message: String,
    pub signature: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub to: String,
    /// Wei, as a JSON integer or a decimal string
    pub value: Value,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub tx_hash: String,
}

/// Build the router. Every route except `/health` sits behind token auth.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/generate", post(generate))
        .route("/address", get(address))
        .route("/sign", post(sign))
        .route("/verify", post(verify))
        .route("/transaction", post(transaction))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provisioned: state.wallet.is_provisioned(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Provision a new identity. Replaces the existing one.
pub async fn generate(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<GenerateResponse>)> {
    let identity = state.wallet.generate_identity()?;
    info!("Identity generated via API: {}", identity.address);

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            private_key: identity.private_key.expose().to_string(),
            address: identity.address.to_string(),
        }),
    ))
}

pub async fn address(State(state): State<Arc<AppState>>) -> Result<Json<AddressResponse>> {
    let address = state.wallet.address()?;
    Ok(Json(AddressResponse {
        address: address.to_string(),
    }))
}

pub async fn sign(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SignRequest>, JsonRejection>,
) -> Result<Json<SignResponse>> {
    let Json(req) = payload?;
    let signature = state.wallet.sign_message(req.message.as_bytes())?;
    Ok(Json(SignResponse { signature }))
}

/// A malformed signature is reported as `valid: false`, not as an error
pub async fn verify(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>> {
    let Json(req) = payload?;
    let valid = match state.wallet.verify_message(
        req.message.as_bytes(),
        &req.signature,
        req.address.as_deref(),
    ) {
        Ok(valid) => valid,
        Err(WalletError::InvalidSignatureEncoding(_)) => false,
        Err(e) => return Err(e),
    };
    Ok(Json(VerifyResponse { valid }))
}

pub async fn transaction(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Json<TransactionResponse>> {
    let Json(req) = payload?;
    let value = amount_text(&req.value)?;
    let signed = state.wallet.send_transaction(&req.to, &value).await?;
    Ok(Json(TransactionResponse {
        tx_hash: signed.tx_hash_hex(),
    }))
}

/// JSON numbers above `u64::MAX` only survive as floats, so larger amounts
/// must be sent as decimal strings.
fn amount_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        Value::Number(n) => Err(WalletError::InvalidAmount(format!(
            "value {} is not an integer; amounts above {} must be sent as decimal strings",
            n,
            u64::MAX
        ))),
        other => Err(WalletError::InvalidAmount(format!(
            "value must be an integer or decimal string, got {}",
            other
        ))),
    }
}
