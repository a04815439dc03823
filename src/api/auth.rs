//! Bearer token authentication for the HTTP shell
//!
//! Tokens are kept as SHA-256 digests; the presented token is hashed and
//! compared against that set. With no tokens configured every request is let
//! through.

use crate::api::AppState;
use crate::errors::WalletError;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authentication service
#[derive(Debug, Default)]
pub struct AuthService {
    token_hashes: HashSet<[u8; 32]>,
}

impl AuthService {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            token_hashes: tokens.into_iter().map(|t| hash_token(t.as_ref())).collect(),
        }
    }

    /// Is auth required?
    pub fn is_auth_required(&self) -> bool {
        !self.token_hashes.is_empty()
    }

    /// Validate an `Authorization` header value
    pub fn validate(&self, header: Option<&str>) -> Result<(), WalletError> {
        if !self.is_auth_required() {
            return Ok(());
        }

        let token = match header {
            Some(h) => h.strip_prefix("Bearer ").unwrap_or(h).trim(),
            None => {
                return Err(WalletError::Unauthorized(
                    "missing authorization header".to_string(),
                ))
            }
        };

        if self.token_hashes.contains(&hash_token(token)) {
            debug!("Authenticated request");
            Ok(())
        } else {
            Err(WalletError::Unauthorized("invalid API token".to_string()))
        }
    }
}

fn hash_token(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Axum middleware rejecting requests without a valid token
pub async fn require_token(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.auth.validate(header) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
            e.into_response()
        }
    }
}
