//! HTTP transport for the wallet
//!
//! Provides:
//! - JSON routes for generate, address, sign, verify and transaction
//! - Bearer token authentication middleware

pub mod auth;
pub mod routes;

use crate::wallet::Wallet;
use std::time::Instant;

pub use auth::AuthService;
pub use routes::create_router;

/// Shared application state
pub struct AppState {
    pub wallet: Wallet,
    pub auth: AuthService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(wallet: Wallet, auth: AuthService) -> Self {
        Self {
            wallet,
            auth,
            start_time: Instant::now(),
        }
    }
}
