use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketdesk_core::{
    create_audit_system, load_config, validate_config, AuditEvent, AuditHandle, AuditStore,
    CommandRouter, Config, HttpThreadApi, LifecycleEngine, SqliteAuditStore, SqliteTicketStore,
    ThreadApi, ThreadSynchronizer, TicketCodec, TicketIndex, TicketStore,
};

use ticketdesk_server::api::create_router;
use ticketdesk_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

/// Used when `TICKETDESK_CONFIG` is unset
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_tracing();

    let config = load()?;
    info!(
        "Staff chat {} (threads: {}), database {:?}",
        config.staff.chat_id, config.staff.threads, config.database.path
    );

    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to open audit store")?,
    );
    let (audit, audit_writer) = create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);
    let writer_task = tokio::spawn(audit_writer.run());

    audit
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash(&config),
        })
        .await;

    let engine = build_engine(&config, audit.clone())?;
    let state = Arc::new(AppState::new(
        config.clone(),
        CommandRouter::new(Arc::new(engine)),
        audit_store,
    ));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down");
    audit
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The engine's handle went away with the router; ours is the last one.
    drop(audit);
    if let Err(e) = writer_task.await {
        error!("Audit writer task failed: {}", e);
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Read and validate the config named by `TICKETDESK_CONFIG`.
fn load() -> Result<Config> {
    let path = std::env::var_os("TICKETDESK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    info!("Loading configuration from {:?}", path);
    let config =
        load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Short hash identifying the running config in the audit trail.
fn config_hash(config: &Config) -> String {
    let json = serde_json::to_string(config).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(json.as_bytes()));
    digest[..16].to_string()
}

/// Wire store, index, thread synchronizer and codec into the engine.
fn build_engine(config: &Config, audit: AuditHandle) -> Result<LifecycleEngine> {
    let tickets: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to open ticket store")?,
    );

    let thread_api: Option<Arc<dyn ThreadApi>> = match &config.thread_api {
        Some(api) => {
            info!("Thread API at {}", api.url);
            Some(Arc::new(
                HttpThreadApi::new(api.clone()).context("Failed to create thread API client")?,
            ))
        }
        None => None,
    };
    let threads =
        ThreadSynchronizer::new(thread_api, config.staff.clone()).with_audit(audit.clone());
    if threads.enabled() {
        info!("Staff thread synchronization enabled");
    }

    let codec =
        TicketCodec::new(config.locale.ticket_marker.clone()).context("Invalid ticket marker")?;

    Ok(LifecycleEngine::new(
        tickets,
        Arc::new(TicketIndex::new()),
        Arc::new(threads),
        codec,
    )
    .with_audit(audit))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
