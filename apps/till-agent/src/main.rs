//! # Till Agent
//!
//! Headless runner for the Till sync engine.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          till-agent                                     │
//! │                                                                         │
//! │  SyncConfig::load ──► Database::new (WAL, migrations)                  │
//! │        │                      │                                         │
//! │        ▼                      ▼                                         │
//! │  HttpTransport ──────► SyncEngine::builder(...).build()                │
//! │                               │                                         │
//! │                               ▼                                         │
//! │                  engine.start(runtime context)                         │
//! │                               │                                         │
//! │                      Ctrl+C / SIGTERM                                  │
//! │                               │                                         │
//! │                               ▼                                         │
//! │            engine.stop() ──► failure export (if any) ──► exit          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod hooks;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use till_db::{Database, DbConfig};
use till_sync::{HttpTransport, SyncConfig, SyncEngine};

use crate::hooks::{LogApplier, LogEmitter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Till sync agent...");

    let config_path = std::env::var_os("TILL_CONFIG").map(PathBuf::from);
    let config = SyncConfig::load(config_path).context("loading sync config")?;
    info!(
        base_url = %config.server.base_url,
        batch = config.sync.push_batch_size,
        limit = config.sync.pull_limit,
        policy = %config.cursor_policy(),
        "Configuration loaded"
    );

    let db_path = config.storage.resolve_database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let db = Database::new(DbConfig::new(&db_path))
        .await
        .context("opening local store")?;
    if !db.health_check().await {
        anyhow::bail!("local store at {} is not answering queries", db_path.display());
    }
    info!(path = %db_path.display(), "Local store ready");

    let transport = Arc::new(HttpTransport::new(&config.server)?);
    let engine = SyncEngine::builder(config.sync.clone(), Arc::new(db.store()), transport)
        .applier(Arc::new(LogApplier))
        .emitter(Arc::new(LogEmitter))
        .build()
        .await?;

    let context = config.runtime_context();
    if !context.can_sync() {
        warn!(
            missing = ?context.missing_fields(),
            "Runtime context incomplete, sync stays closed until [device] is configured"
        );
    }
    engine.start(context).await?;

    shutdown_signal().await;

    engine.stop().await;
    write_failure_export(&engine, &db_path).await;
    db.close().await;

    info!("Agent shutdown complete");
    Ok(())
}

/// Writes the failure ledger next to the database if it has entries.
async fn write_failure_export(engine: &SyncEngine, db_path: &Path) {
    let export = match engine.export_failure_log().await {
        Ok(export) if export.count > 0 => export,
        Ok(_) => return,
        Err(e) => {
            warn!(error = %e, "Failed to export failure log");
            return;
        }
    };

    let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(export.file_name());
    let written = export
        .to_json_pretty()
        .map_err(anyhow::Error::from)
        .and_then(|json| std::fs::write(&path, json).map_err(anyhow::Error::from));

    match written {
        Ok(()) => info!(path = %path.display(), count = export.count, "Failure log exported"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write failure log"),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sync...");
}
