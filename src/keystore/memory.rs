//! In-memory key store
//!
//! Holds the active identity for the life of the process only. Useful for
//! throwaway deployments and as a stand-in for the file store in tests.

use crate::crypto::KeyPair;
use crate::errors::{Result, WalletError};
use crate::keystore::{GeneratedIdentity, KeyStore};
use crate::security::SecureBytes;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// In-memory key store
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    slot: Mutex<Option<SecureBytes>>,
}

impl MemoryKeyStore {
    /// Create a new empty key store
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<MutexGuard<'_, Option<SecureBytes>>> {
        self.slot
            .lock()
            .map_err(|_| WalletError::InternalError("key store lock poisoned".to_string()))
    }
}

impl KeyStore for MemoryKeyStore {
    fn generate(&self) -> Result<GeneratedIdentity> {
        let mut slot = self.guard()?;

        let keypair = KeyPair::generate();
        let private_key = keypair.to_hex();
        let address = keypair.address();

        let bytes = hex::decode(private_key.expose())
            .map_err(|e| WalletError::InternalError(e.to_string()))?;
        *slot = Some(SecureBytes::from(bytes));

        info!("Generated new in-memory identity {}", address);
        Ok(GeneratedIdentity {
            private_key,
            address,
        })
    }

    fn load(&self) -> Result<KeyPair> {
        let slot = self.guard()?;
        let bytes = slot.as_ref().ok_or(WalletError::NotProvisioned)?;

        let keypair = KeyPair::from_bytes(bytes.expose())?;
        debug!("Loaded in-memory identity {}", keypair.address());
        Ok(keypair)
    }

    fn is_provisioned(&self) -> bool {
        self.guard().map(|slot| slot.is_some()).unwrap_or(false)
    }
}
