//! Message signing and verification
//!
//! Messages are digested with a fixed, configured scheme before signing:
//!
//! - `eip191`: Keccak-256 over `"\x19Ethereum Signed Message:\n" || len || message`,
//!   the scheme used by `personal_sign`, so third-party tooling can verify.
//! - `sha256`: plain SHA-256 of the message.
//!
//! Neither digest can coincide with a transaction signing hash, which is the
//! Keccak-256 of an RLP list.

use crate::crypto::{Address, KeyPair, RecoverableSignature};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use tracing::debug;

/// Digest scheme for arbitrary messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDigest {
    #[default]
    Eip191,
    Sha256,
}

impl MessageDigest {
    pub fn digest(&self, message: &[u8]) -> [u8; 32] {
        match self {
            MessageDigest::Eip191 => hash_message(message),
            MessageDigest::Sha256 => Sha256::digest(message).into(),
        }
    }
}

/// Hash a message according to EIP-191 (personal sign)
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Signs and verifies messages under one digest scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageSigner {
    digest: MessageDigest,
}

impl MessageSigner {
    pub fn new(digest: MessageDigest) -> Self {
        Self { digest }
    }

    pub fn sign(&self, keypair: &KeyPair, message: &[u8]) -> Result<RecoverableSignature> {
        let hash = self.digest.digest(message);
        keypair.sign_hash(&hash)
    }

    /// Check that `signature` over `message` was produced by `expected`.
    ///
    /// The signer is recovered from the digest, r, s and the recovery byte and
    /// compared by address, so a signature with a mismatched recovery byte
    /// does not verify.
    pub fn verify(&self, expected: &Address, message: &[u8], signature: &RecoverableSignature) -> bool {
        let hash = self.digest.digest(message);
        match signature.recover_address(&hash) {
            Ok(signer) => signer == *expected,
            Err(e) => {
                debug!("Signature did not recover: {}", e);
                false
            }
        }
    }
}
