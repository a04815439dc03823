//! Configuration management for ledgerkey
//!
//! Supports loading configuration from:
//! - Built-in defaults
//! - Config file (config.toml, or the path given with `--config`)
//! - Environment variables (LEDGERKEY_*)

use crate::errors::{Result, WalletError};
use crate::signer::MessageDigest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Gas used by a plain value transfer with no payload
pub const TRANSFER_GAS: u64 = 21_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Key storage configuration
    pub storage: StorageConfig,

    /// Ledger client configuration
    pub ledger: LedgerConfig,

    /// Message signing configuration
    pub signing: SigningConfig,

    /// Process hardening configuration
    pub security: SecurityConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for TCP
    pub listen_addr: String,

    /// Port number
    pub port: u16,

    /// Accepted bearer tokens; empty disables authentication
    pub api_tokens: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            port: 8080,
            api_tokens: Vec::new(),
        }
    }
}

/// Key storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the hex-encoded private key file
    pub key_path: PathBuf,

    /// Copy the previous key aside before `generate` replaces it
    pub archive_previous: bool,

    /// Keep the identity in memory only (lost on restart)
    pub ephemeral: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from("./data/private_key.txt"),
            archive_previous: true,
            ephemeral: false,
        }
    }
}

/// Ledger (JSON-RPC) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint; transactions cannot be sent without one
    pub rpc_url: Option<String>,

    /// Upper bound for each ledger request, in seconds
    pub timeout_secs: u64,

    /// Gas limit for value transfers
    pub gas_limit: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            timeout_secs: 10,
            gas_limit: TRANSFER_GAS,
        }
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Message signing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Digest applied to messages before signing. Changing this after
    /// signatures have been handed out makes them unverifiable.
    pub message_digest: MessageDigest,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Disable core dumps
    pub disable_core_dumps: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            disable_core_dumps: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, file and environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        } else {
            builder = builder
                .add_source(config::File::with_name("config").required(false))
                .add_source(config::File::with_name("/etc/ledgerkey/config").required(false));
        }

        // LEDGERKEY_LEDGER__RPC_URL, LEDGERKEY_SERVER__PORT, ...
        builder = builder.add_source(
            config::Environment::with_prefix("LEDGERKEY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.api_tokens"),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ledger.timeout_secs == 0 {
            return Err(WalletError::ConfigError(
                "ledger.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.ledger.gas_limit < TRANSFER_GAS {
            return Err(WalletError::ConfigError(format!(
                "ledger.gas_limit must be at least {}",
                TRANSFER_GAS
            )));
        }

        if let Some(url) = &self.ledger.rpc_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(WalletError::ConfigError(format!(
                    "ledger.rpc_url must be an http(s) URL, got {}",
                    url
                )));
            }
        }

        if !self.storage.ephemeral {
            if self.storage.key_path.as_os_str().is_empty() {
                return Err(WalletError::ConfigError(
                    "storage.key_path must not be empty".to_string(),
                ));
            }
            if !self.storage.key_path.exists() {
                info!(
                    "No key file at {:?} yet, call generate to provision one",
                    self.storage.key_path
                );
            }
        }

        if self.server.api_tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(WalletError::ConfigError(
                "server.api_tokens must not contain empty tokens".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ledger.gas_limit, 21_000);
        assert!(config.storage.archive_previous);
        assert_eq!(config.signing.message_digest, MessageDigest::Eip191);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_addr() {
        let config = Config::default();
        assert_eq!(config.server_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_rejects_low_gas_limit() {
        let mut config = Config::default();
        config.ledger.gas_limit = 20_000;
        assert!(matches!(config.validate(), Err(WalletError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_non_http_rpc_url() {
        let mut config = Config::default();
        config.ledger.rpc_url = Some("ws://localhost:8546".to_string());
        assert!(config.validate().is_err());

        config.ledger.rpc_url = Some("https://rpc.example.org".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerkey.toml");
        std::fs::write(
            &path,
            "[ledger]\nrpc_url = \"http://127.0.0.1:8545\"\ntimeout_secs = 3\n\n[signing]\nmessage_digest = \"sha256\"\n",
        )
        .unwrap();

        let config = Config::load(path.to_str()).unwrap();
        assert_eq!(config.ledger.rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(config.ledger.timeout_secs, 3);
        assert_eq!(config.ledger.gas_limit, 21_000);
        assert_eq!(config.signing.message_digest, MessageDigest::Sha256);
    }

    #[test]
    fn test_load_builtin_defaults() {
        let config = Config::load(None).unwrap();
        assert!(config.server.api_tokens.is_empty());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.key_path, PathBuf::from("./data/private_key.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_empty_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load(path.to_str()).unwrap();
        assert!(config.server.api_tokens.is_empty());
        assert_eq!(config.ledger.timeout_secs, 10);
        assert!(config.security.disable_core_dumps);
        assert_eq!(config.logging.level, "info");
    }
}
