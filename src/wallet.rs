//! Wallet service
//!
//! Ties the key store to the signers. Every operation loads its own copy of
//! the key pair and drops it (zeroizing the scalar) before returning; no key
//! is cached between calls.

use crate::crypto::{parse_address, Address, RecoverableSignature};
use crate::errors::{Result, WalletError};
use crate::keystore::{GeneratedIdentity, KeyStore};
use crate::ledger::LedgerClient;
use crate::signer::{MessageSigner, SignedTransaction, TransactionSigner, TransferRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The operations exposed by the transport shell
pub struct Wallet {
    key_store: Arc<dyn KeyStore>,
    messages: MessageSigner,
    transactions: Option<TransactionSigner>,
}

impl Wallet {
    pub fn new(key_store: Arc<dyn KeyStore>, messages: MessageSigner) -> Self {
        Self {
            key_store,
            messages,
            transactions: None,
        }
    }

    /// Enable sending transactions through `ledger`
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerClient>, gas_limit: u64, timeout: Duration) -> Self {
        self.transactions = Some(TransactionSigner::new(ledger, gas_limit, timeout));
        self
    }

    pub fn is_provisioned(&self) -> bool {
        self.key_store.is_provisioned()
    }

    /// Provision a new identity, replacing the current one
    pub fn generate_identity(&self) -> Result<GeneratedIdentity> {
        self.key_store.generate()
    }

    /// Address of the active identity
    pub fn address(&self) -> Result<Address> {
        Ok(self.key_store.load()?.address())
    }

    /// Sign `message` with the active identity. Returns the hex signature.
    pub fn sign_message(&self, message: &[u8]) -> Result<String> {
        let keypair = self.key_store.load()?;
        let signature = self.messages.sign(&keypair, message)?;
        debug!("Signed {}-byte message as {}", message.len(), keypair.address());
        Ok(signature.to_hex())
    }

    /// Verify a hex signature over `message`.
    ///
    /// The signer is checked against `address` when given, otherwise against
    /// the active identity. The signature and address are decoded before the
    /// key store is touched.
    pub fn verify_message(&self, message: &[u8], signature_hex: &str, address: Option<&str>) -> Result<bool> {
        let signature = RecoverableSignature::from_hex(signature_hex)?;
        let expected = match address {
            Some(addr) => parse_address(addr)?,
            None => self.address()?,
        };
        Ok(self.messages.verify(&expected, message, &signature))
    }

    /// Build, sign and broadcast a transfer from the active identity
    pub async fn send_transaction(&self, to: &str, value: &str) -> Result<SignedTransaction> {
        let request = TransferRequest::parse(to, value)?;
        let signer = self.transactions.as_ref().ok_or_else(|| {
            WalletError::NetworkUnavailable("no ledger endpoint configured".to_string())
        })?;

        let keypair = self.key_store.load()?;
        let signed = signer.send(&keypair, &request).await?;
        drop(keypair);

        info!("Transaction {} submitted", signed.tx_hash_hex());
        Ok(signed)
    }
}
