//! Key storage for the active identity
//!
//! This module provides:
//! - The `KeyStore` trait the wallet depends on
//! - File-backed storage with atomic replacement and owner-only permissions
//! - An in-memory store for ephemeral deployments and tests

pub mod file;
pub mod memory;

use crate::crypto::{Address, KeyPair};
use crate::errors::Result;
use crate::security::SecureString;

pub use file::FileKeyStore;
pub use memory::MemoryKeyStore;

/// Result of provisioning a new identity
#[derive(Debug)]
pub struct GeneratedIdentity {
    /// Hex encoding of the new private scalar
    pub private_key: SecureString,
    pub address: Address,
}

/// Owner of the active identity
///
/// Implementations serialize `generate` and `load` against each other so a
/// load never observes a half-written key.
pub trait KeyStore: Send + Sync {
    /// Create and persist a fresh identity.
    ///
    /// The previous identity is replaced. Unless the store archives it first,
    /// it is lost for good.
    fn generate(&self) -> Result<GeneratedIdentity>;

    /// Decode the active identity.
    ///
    /// Fails with `NotProvisioned` when none exists and `CorruptKey` when the
    /// stored encoding cannot be decoded.
    fn load(&self) -> Result<KeyPair>;

    /// Whether an identity has been provisioned
    fn is_provisioned(&self) -> bool;
}
