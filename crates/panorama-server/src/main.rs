mod cleanup;
mod config;

use std::sync::Arc;

use panorama_core::{AccessGate, FsBlobStore};
use panorama_db::Database;
use tracing::{info, warn};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "panorama_server=debug,panorama_core=debug,panorama_db=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and blob store
    let db = Arc::new(Database::open_with_readers(&config.db_path, config.readers)?);
    let blobs = Arc::new(FsBlobStore::new(config.static_dir.clone())?);
    let gate = AccessGate::from_stores(db, blobs);

    if gate.identities().is_empty()? {
        warn!("No accounts yet: the first registration will create a curator");
    } else {
        info!("{} accounts registered", gate.identities().count()?);
    }
    info!("{} story roots", gate.graph().list_roots()?.len());

    if config.sweep_secs > 0 {
        tokio::spawn(cleanup::run_sweep_loop(gate.graph().clone(), config.sweep_secs));
        info!("Orphan blob sweep every {} seconds", config.sweep_secs);
    }

    info!(
        "Panorama store ready: db {}, blobs {}",
        config.db_path.display(),
        config.static_dir.display()
    );

    shutdown_signal().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
