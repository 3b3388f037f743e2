//! # veil-server
//!
//! HTTP service exposing the Veil anonymous-to-identified messaging
//! engine.
//!
//! This binary provides:
//! - **REST API** (axum) for chats, messages, read markers, and reveal
//!   transitions
//! - **Per-sender send throttling** to protect recipients behind the
//!   pseudonym boundary
//! - **Event hand-off**: "new message" and "reveal state changed" facts
//!   drained toward the external notification pipeline
//! - **Background maintenance** for the per-chat lock table and throttle
//!   buckets

mod api;
mod config;
mod error;
mod throttle;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use veil_engine::dispatch::ChannelDispatcher;
use veil_engine::identity::StoreIdentityProvider;
use veil_engine::{ChatEngine, EngineConfig};
use veil_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::throttle::SendThrottle;

fn open_database(config: &ServerConfig) -> Result<Database, veil_store::StoreError> {
    match &config.db_path {
        Some(path) => Database::open_at(path),
        None => Database::new(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,veil_server=debug")),
        )
        .init();

    info!("Starting Veil messaging server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        reveal_threshold = engine_config.reveal_threshold,
        deleted_placeholder = engine_config.show_deleted_placeholder,
        "Engine policy"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Engine write connection plus a second read connection for the
    // identity cache (WAL mode keeps them independent).
    let db = open_database(&config)?;
    let identity = Arc::new(StoreIdentityProvider::new(open_database(&config)?));

    // Event hand-off channel toward the external notification pipeline.
    let (dispatcher, mut events) = ChannelDispatcher::new();

    let engine = Arc::new(ChatEngine::new(
        db,
        engine_config.clone(),
        identity,
        Arc::new(dispatcher),
    ));

    // Send throttle: sustained rate and burst from config.
    let throttle = SendThrottle::new(config.send_rate, config.send_burst);

    let app_state = AppState {
        engine: engine.clone(),
        throttle: throttle.clone(),
        config: Arc::new(config.clone()),
        reveal_threshold: engine_config.reveal_threshold,
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Drain engine events toward the dispatch channel. Delivery fan-out is
    // not this service's job; everything that leaves here is a fact the
    // external pipeline may push, mail, or drop.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(event = event.name(), "Handing event to dispatch channel");
        }
    });

    // Periodic lock-table cleanup (every 5 minutes, evict idle chat locks).
    let locks = engine.locks();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let evicted = locks.purge_stale().await;
            if evicted > 0 {
                tracing::debug!(evicted, "Purged idle chat locks");
            }
        }
    });

    // Periodic throttle cleanup (every 5 minutes, evict buckets idle >10 min).
    let th = throttle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            th.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
