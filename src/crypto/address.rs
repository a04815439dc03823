//! Account addresses
//!
//! An address is the last 20 bytes of the Keccak-256 digest of the 64-byte
//! uncompressed public key, rendered with the EIP-55 mixed-case checksum.

use crate::crypto::eth::keccak256;
use crate::errors::{Result, WalletError};
use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;
use std::str::FromStr;

/// 20-byte account address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// Derive the address of a public key
    pub fn derive(public_key: &VerifyingKey) -> Self {
        let point = public_key.to_encoded_point(false);
        // Skip the 0x04 SEC1 tag and hash the 64 coordinate bytes
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Self(address)
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55 checksummed form, `0x` prefixed
    pub fn to_checksum(&self) -> String {
        checksum_address(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        parse_address(s)
    }
}

/// Convert an address to checksummed format (EIP-55)
pub fn checksum_address(address: &[u8; 20]) -> String {
    let addr_hex = hex::encode(address);
    let hash = hex::encode(keccak256(addr_hex.as_bytes()));

    let mut result = String::with_capacity(42);
    result.push_str("0x");

    for (c, h) in addr_hex.chars().zip(hash.chars()) {
        if c.is_ascii_alphabetic() && h >= '8' {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }

    result
}

/// Parse a `0x`-prefixed address string
///
/// All-lowercase and all-uppercase forms are accepted as is. Mixed case is
/// treated as an EIP-55 checksum and must match.
pub fn parse_address(addr: &str) -> Result<Address> {
    let body = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .ok_or_else(|| WalletError::InvalidAddress("address must start with 0x".to_string()))?;

    if body.len() != 40 {
        return Err(WalletError::InvalidAddress(format!(
            "address must be 40 hex chars, got {}",
            body.len()
        )));
    }

    let bytes = hex::decode(body)
        .map_err(|_| WalletError::InvalidAddress("address is not valid hex".to_string()))?;
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&bytes);
    let address = Address(raw);

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum()[2..] != *body {
        return Err(WalletError::InvalidAddress(
            "address checksum mismatch".to_string(),
        ));
    }

    Ok(address)
}
