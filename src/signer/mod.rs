//! Signing services
//!
//! Message signatures and transaction signatures are separate domains with
//! separate digests; neither can be replayed as the other.

pub mod message;
pub mod transaction;

pub use message::{hash_message, MessageDigest, MessageSigner};
pub use transaction::{
    parse_amount, LegacyTransaction, SignedTransaction, TransactionSigner, TransferRequest,
};
