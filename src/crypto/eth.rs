//! secp256k1 key material and recoverable signatures
//!
//! Provides:
//! - Key generation and decoding
//! - Deterministic (RFC 6979) recoverable signing over 32-byte digests
//! - Public key recovery

use crate::crypto::address::Address;
use crate::errors::{Result, WalletError};
use crate::security::SecureString;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use std::fmt;
use zeroize::Zeroizing;

/// Length of an encoded private scalar in bytes
pub const PRIVATE_KEY_LEN: usize = 32;

/// Length of an encoded recoverable signature (r || s || v)
pub const SIGNATURE_LEN: usize = 65;

/// secp256k1 key pair
///
/// The public key is always computed from the private scalar, so the two
/// cannot disagree. The scalar is zeroized when the pair is dropped.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Create a new random key pair from the OS random source
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create from raw private key bytes (32 bytes, big endian)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(WalletError::CorruptKey(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_LEN,
                bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(bytes).map_err(|_| {
            WalletError::CorruptKey("scalar is zero or not below the curve order".to_string())
        })?;
        Ok(Self { signing_key })
    }

    /// Decode the persisted hex form, with or without a `0x` prefix
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let encoded = encoded.strip_prefix("0x").unwrap_or(encoded);

        if encoded.len() != PRIVATE_KEY_LEN * 2 {
            return Err(WalletError::CorruptKey(format!(
                "expected {} hex chars, got {}",
                PRIVATE_KEY_LEN * 2,
                encoded.len()
            )));
        }

        let bytes = Zeroizing::new(
            hex::decode(encoded)
                .map_err(|_| WalletError::CorruptKey("key is not valid hex".to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Hex encoding of the private scalar, lowercase, no prefix
    pub fn to_hex(&self) -> SecureString {
        let mut raw = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        raw.copy_from_slice(&self.signing_key.to_bytes());
        SecureString::new(hex::encode(raw.as_slice()))
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the account address of this key
    pub fn address(&self) -> Address {
        Address::derive(self.verifying_key())
    }

    /// Sign a 32-byte digest
    ///
    /// Nonces are derived per RFC 6979, so the same key and digest always
    /// produce the same signature. `s` is normalized to the lower half order.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<RecoverableSignature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| WalletError::SigningFailed(e.to_string()))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(RecoverableSignature {
            r,
            s,
            v: recovery_id.to_byte(),
        })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address().to_checksum())
            .finish_non_exhaustive()
    }
}

/// Signature with recovery id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id, 0 or 1
    pub v: u8,
}

impl RecoverableSignature {
    /// Decode `r || s || v`. `v` may be 0/1 or the legacy 27/28.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(WalletError::InvalidSignatureEncoding(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }

        let v = match bytes[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            other => {
                return Err(WalletError::InvalidSignatureEncoding(format!(
                    "recovery byte {} out of range",
                    other
                )))
            }
        };

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v })
    }

    /// Decode from hex, with or without a `0x` prefix
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let encoded = encoded.strip_prefix("0x").unwrap_or(encoded);
        let bytes = hex::decode(encoded).map_err(|e| {
            WalletError::InvalidSignatureEncoding(format!("hex decode error: {}", e))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Get the full signature bytes (65 bytes: r || s || v)
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut sig = [0u8; SIGNATURE_LEN];
        sig[0..32].copy_from_slice(&self.r);
        sig[32..64].copy_from_slice(&self.s);
        sig[64] = self.v;
        sig
    }

    /// Get v for EIP-155 transactions: `recid + 35 + 2 * chain_id`.
    ///
    /// Fails when the result does not fit in 64 bits.
    pub fn v_eip155(&self, chain_id: u64) -> Result<u64> {
        chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + self.v as u64))
            .ok_or_else(|| {
                WalletError::SigningFailed(format!("chain id {} too large for EIP-155", chain_id))
            })
    }

    /// Convert to hex string (no prefix)
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Recover the public key that produced this signature over `hash`
    pub fn recover(&self, hash: &[u8; 32]) -> Result<VerifyingKey> {
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.r);
        rs[32..].copy_from_slice(&self.s);

        let signature = Signature::from_slice(&rs).map_err(|_| {
            WalletError::InvalidSignatureEncoding("r or s is not a valid scalar".to_string())
        })?;
        let recovery_id = RecoveryId::from_byte(self.v).ok_or_else(|| {
            WalletError::InvalidSignatureEncoding(format!("recovery byte {} out of range", self.v))
        })?;

        VerifyingKey::recover_from_prehash(hash, &signature, recovery_id).map_err(|_| {
            WalletError::InvalidSignatureEncoding("public key not recoverable".to_string())
        })
    }

    /// Recover the signer's address
    pub fn recover_address(&self, hash: &[u8; 32]) -> Result<Address> {
        self.recover(hash).map(|key| Address::derive(&key))
    }
}

/// Compute keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_key_generation() {
        let keypair = KeyPair::generate();
        let addr = keypair.address();
        assert_eq!(addr.as_bytes().len(), 20);
    }

    #[test]
    fn test_hex_round_trip() {
        for _ in 0..16 {
            let keypair = KeyPair::generate();
            let encoded = keypair.to_hex();
            assert_eq!(encoded.expose().len(), 64);

            let decoded = KeyPair::from_hex(encoded.expose()).unwrap();
            assert_eq!(decoded.to_hex().expose(), encoded.expose());
            assert_eq!(decoded.address(), keypair.address());
        }
    }

    #[test]
    fn test_from_hex_accepts_prefix_and_whitespace() {
        let keypair = KeyPair::from_hex(&format!("0x{}\n", KNOWN_KEY)).unwrap();
        assert_eq!(keypair.to_hex().expose(), KNOWN_KEY);
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(matches!(
            KeyPair::from_hex("not hex at all"),
            Err(WalletError::CorruptKey(_))
        ));
        assert!(matches!(
            KeyPair::from_hex(&"zz".repeat(32)),
            Err(WalletError::CorruptKey(_))
        ));
        assert!(matches!(
            KeyPair::from_hex(&KNOWN_KEY[..62]),
            Err(WalletError::CorruptKey(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_invalid_scalars() {
        assert!(matches!(
            KeyPair::from_bytes(&[0u8; 32]),
            Err(WalletError::CorruptKey(_))
        ));
        assert!(matches!(
            KeyPair::from_bytes(&[0xffu8; 32]),
            Err(WalletError::CorruptKey(_))
        ));
    }

    #[test]
    fn test_sign_hash_is_deterministic_and_recoverable() {
        let keypair = KeyPair::from_hex(KNOWN_KEY).unwrap();
        let hash = keccak256(b"deterministic");

        let first = keypair.sign_hash(&hash).unwrap();
        let second = keypair.sign_hash(&hash).unwrap();
        assert_eq!(first, second);
        assert!(first.v <= 1);

        assert_eq!(first.recover_address(&hash).unwrap(), keypair.address());
    }

    #[test]
    fn test_signature_bytes_round_trip() {
        let keypair = KeyPair::generate();
        let sig = keypair.sign_hash(&keccak256(b"bytes")).unwrap();

        let decoded = RecoverableSignature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(decoded, sig);

        let mut legacy = sig.to_bytes();
        legacy[64] += 27;
        assert_eq!(RecoverableSignature::from_bytes(&legacy).unwrap(), sig);
    }

    #[test]
    fn test_signature_rejects_bad_encodings() {
        assert!(matches!(
            RecoverableSignature::from_bytes(&[0u8; 64]),
            Err(WalletError::InvalidSignatureEncoding(_))
        ));

        let mut bad_v = [1u8; 65];
        bad_v[64] = 4;
        assert!(matches!(
            RecoverableSignature::from_bytes(&bad_v),
            Err(WalletError::InvalidSignatureEncoding(_))
        ));

        assert!(matches!(
            RecoverableSignature::from_hex("0xnothex"),
            Err(WalletError::InvalidSignatureEncoding(_))
        ));
    }

    #[test]
    fn test_zero_signature_does_not_recover() {
        let sig = RecoverableSignature {
            r: [0u8; 32],
            s: [0u8; 32],
            v: 0,
        };
        assert!(matches!(
            sig.recover(&keccak256(b"anything")),
            Err(WalletError::InvalidSignatureEncoding(_))
        ));
    }

    #[test]
    fn test_debug_does_not_leak_scalar() {
        let keypair = KeyPair::from_hex(KNOWN_KEY).unwrap();
        let rendered = format!("{:?}", keypair);
        assert!(!rendered.contains(KNOWN_KEY));
        assert!(rendered.contains("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"));
    }

    #[test]
    fn test_v_eip155() {
        let mut sig = RecoverableSignature {
            r: [1u8; 32],
            s: [1u8; 32],
            v: 0,
        };
        assert_eq!(sig.v_eip155(1).unwrap(), 37);
        sig.v = 1;
        assert_eq!(sig.v_eip155(5).unwrap(), 46);

        assert!(matches!(sig.v_eip155(u64::MAX), Err(WalletError::SigningFailed(_))));
        assert!(matches!(
            sig.v_eip155(u64::MAX / 2),
            Err(WalletError::SigningFailed(_))
        ));
    }
}
