//! Process-level protection for key material
//!
//! Disables core dumps so a crash cannot write a decoded private key to disk.

use crate::errors::{Result, WalletError};
use tracing::{debug, warn};

/// Disable core dumps for this process. Call this early in main().
pub fn setup_memory_protection(disable_core_dumps: bool) -> Result<()> {
    if !disable_core_dumps {
        warn!("Core dumps left enabled by configuration");
        return Ok(());
    }

    #[cfg(unix)]
    {
        use nix::sys::resource::{setrlimit, Resource};

        setrlimit(Resource::RLIMIT_CORE, 0, 0)
            .map_err(|e| WalletError::InternalError(format!("could not disable core dumps: {}", e)))?;
        debug!("Core dumps disabled");
    }

    #[cfg(not(unix))]
    {
        warn!("Core dump suppression not supported on this platform");
    }

    Ok(())
}

/// Current core dump limit; `None` where it cannot be read
pub fn core_dump_limit() -> Option<u64> {
    #[cfg(unix)]
    {
        use nix::sys::resource::{getrlimit, Resource};

        getrlimit(Resource::RLIMIT_CORE)
            .ok()
            .map(|(soft, _hard)| soft as u64)
    }

    #[cfg(not(unix))]
    {
        None
    }
}
