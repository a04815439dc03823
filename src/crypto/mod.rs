//! Cryptographic primitives: secp256k1 keys, signatures and addresses

pub mod address;
pub mod eth;

pub use address::{checksum_address, parse_address, Address};
pub use eth::{keccak256, KeyPair, RecoverableSignature, PRIVATE_KEY_LEN, SIGNATURE_LEN};
