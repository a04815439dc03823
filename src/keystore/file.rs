//! File-backed key store
//!
//! The private scalar is stored as 64 lowercase hex characters in a single
//! file. Writes go to a temporary file in the same directory which is synced
//! and then renamed over the target, so readers see either the old key or
//! the new one and never a partial write.

use crate::crypto::KeyPair;
use crate::errors::{Result, WalletError};
use crate::keystore::{GeneratedIdentity, KeyStore};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Key store persisting the active identity to one file
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    archive_previous: bool,
    lock: Mutex<()>,
}

impl FileKeyStore {
    /// Create a store for the key file at `path`. Nothing is read or written yet.
    pub fn new(path: impl AsRef<Path>, archive_previous: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            archive_previous,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| WalletError::InternalError("key store lock poisoned".to_string()))
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Copy the current key file next to itself with a timestamp suffix
    fn archive_existing(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let mut archived = self.path.clone().into_os_string();
        archived.push(format!(".{}.bak", stamp));
        let archived = PathBuf::from(archived);

        fs::copy(&self.path, &archived)?;
        restrict_permissions(&archived)?;
        Ok(Some(archived))
    }

    /// Replace the key file with `contents` in one rename
    fn write_atomically(&self, contents: &[u8]) -> Result<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        restrict_permissions(tmp.path())?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path)
            .map_err(|e| WalletError::StorageFailure(e.error.to_string()))?;

        sync_dir(&dir);
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn generate(&self) -> Result<GeneratedIdentity> {
        let _guard = self.guard()?;

        let keypair = KeyPair::generate();
        let private_key = keypair.to_hex();
        let address = keypair.address();

        if self.archive_previous {
            if let Some(archived) = self.archive_existing()? {
                info!("Archived previous identity to {:?}", archived);
            }
        } else if self.path.exists() {
            warn!("Replacing identity at {:?} without archival", self.path);
        }

        self.write_atomically(private_key.expose().as_bytes())?;

        info!("Generated new identity {} at {:?}", address, self.path);
        Ok(GeneratedIdentity {
            private_key,
            address,
        })
    }

    fn load(&self) -> Result<KeyPair> {
        let _guard = self.guard()?;

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => Zeroizing::new(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(WalletError::NotProvisioned),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(WalletError::CorruptKey("key file is not valid UTF-8".to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let keypair = KeyPair::from_hex(&contents)?;
        debug!("Loaded identity {} from {:?}", keypair.address(), self.path);
        Ok(keypair)
    }

    fn is_provisioned(&self) -> bool {
        self.path.is_file()
    }
}

/// Restrict a file to owner read/write
fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Persist the rename itself; best effort
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
            debug!("Could not sync directory {:?}: {}", dir, e);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}
