//! ledgerkey - key custody and signing for a single Ethereum-style identity
//!
//! - Generates a secp256k1 key pair and persists it as hex, owner-only, with
//!   atomic replacement
//! - Derives the EIP-55 account address
//! - Signs and verifies messages (EIP-191 or SHA-256 digests)
//! - Builds, signs (EIP-155) and broadcasts value transfers through a
//!   JSON-RPC ledger client
//! - Exposes the operations over a small HTTP API

pub mod api;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod keystore;
pub mod ledger;
pub mod security;
pub mod signer;
pub mod wallet;

pub use errors::{Result, WalletError};
pub use wallet::Wallet;
