//! ledgerkey - single-identity signing service
//!
//! # Usage
//!
//! ```bash
//! # Start the server with defaults (key file at ./data/private_key.txt)
//! ledgerkey
//!
//! # With a config file and a ledger endpoint
//! LEDGERKEY_LEDGER__RPC_URL=https://rpc.example.org ledgerkey --config /etc/ledgerkey/config.toml
//! ```

use clap::Parser;
use ledgerkey::api::{create_router, AppState, AuthService};
use ledgerkey::config::Config;
use ledgerkey::keystore::{FileKeyStore, KeyStore, MemoryKeyStore};
use ledgerkey::ledger::JsonRpcClient;
use ledgerkey::security::{core_dump_limit, setup_memory_protection};
use ledgerkey::signer::MessageSigner;
use ledgerkey::Wallet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "ledgerkey", version, about = "Single-identity signing service")]
struct Cli {
    /// Path to a config file (toml, yaml or json)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config);

    info!("Starting ledgerkey v{}", VERSION);

    if let Err(e) = setup_memory_protection(config.security.disable_core_dumps) {
        warn!("Could not set up memory protection: {}", e);
    }
    match core_dump_limit() {
        Some(0) => info!("Core dumps disabled"),
        Some(limit) => warn!("Core dump limit is {} bytes", limit),
        None => debug!("Core dump limit unknown on this platform"),
    }

    config.validate()?;
    info!("Configuration loaded");

    let key_store: Arc<dyn KeyStore> = if config.storage.ephemeral {
        warn!("Ephemeral key store: the identity is lost on restart");
        Arc::new(MemoryKeyStore::new())
    } else {
        info!("Key file: {:?}", config.storage.key_path);
        Arc::new(FileKeyStore::new(
            &config.storage.key_path,
            config.storage.archive_previous,
        ))
    };

    if key_store.is_provisioned() {
        match key_store.load() {
            Ok(keypair) => info!("Active identity: {}", keypair.address()),
            Err(e) => warn!("Active identity unreadable: {}", e),
        }
    } else {
        info!("No identity provisioned yet");
    }

    let mut wallet = Wallet::new(
        key_store,
        MessageSigner::new(config.signing.message_digest),
    );
    info!("Message digest: {:?}", config.signing.message_digest);

    match &config.ledger.rpc_url {
        Some(url) => {
            let client = JsonRpcClient::new(url.clone(), config.ledger.timeout())?;
            wallet = wallet.with_ledger(
                Arc::new(client),
                config.ledger.gas_limit,
                config.ledger.timeout(),
            );
            info!("Ledger endpoint: {}", url);
        }
        None => warn!("No ledger.rpc_url set; transactions cannot be sent"),
    }

    let auth = AuthService::new(&config.server.api_tokens);
    if !auth.is_auth_required() {
        warn!("API authentication disabled (server.api_tokens is empty)");
    }

    let state = Arc::new(AppState::new(wallet, auth));
    let app = create_router(state);

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
