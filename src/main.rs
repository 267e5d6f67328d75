//! replica-counter - replication-aware counter service
//!
//! Composition root: wires the store, the change monitor, the broadcaster
//! and the HTTP API together.

use anyhow::Context;
use replica_counter::adapters::inbound::{AppState, HttpServer};
use replica_counter::adapters::outbound::{
    NotifyChangeFeed, PollingChangeFeed, SqliteCounterStore,
};
use replica_counter::application::ChangeMonitor;
use replica_counter::domain::services::{Broadcaster, RegionRouter};
use replica_counter::infrastructure::{shutdown_signal, ShutdownController};
use replica_counter::load_config;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting replica-counter region={} primary={} listen={}",
        cfg.region,
        cfg.primary_region,
        cfg.listen_addr
    );

    // ===== COMPOSITION ROOT =====

    tracing::info!("opening database: {}", cfg.db_path);
    let store = Arc::new(SqliteCounterStore::open(&cfg.db_path)?);
    // Replicas receive the schema through replication.
    if cfg.is_primary() {
        store.bootstrap()?;
    }

    let broadcaster = Arc::new(Broadcaster::new());

    let monitor = ChangeMonitor::new(store.clone(), broadcaster.clone());
    let watched = store.watched_paths();
    let mut monitor = match cfg.poll_interval {
        Some(interval) => monitor.spawn(PollingChangeFeed::new(&watched, interval)),
        None => monitor.spawn(
            NotifyChangeFeed::watch(&watched).context("subscribe to database changes")?,
        ),
    };

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = HttpServer::new(
        cfg.listen_addr.clone(),
        AppState {
            store,
            broadcaster,
            router: Arc::new(RegionRouter::new(
                cfg.region.clone(),
                cfg.primary_region.clone(),
            )),
            regions: Arc::new(cfg.regions.clone()),
            shutdown: shutdown.clone(),
            keep_alive: Duration::from_secs(cfg.keep_alive_secs),
        },
    );

    let result = tokio::select! {
        res = server.run() => res,
        err = monitor.wait() => {
            tracing::error!("change monitor failed, exiting: {}", err);
            Err(err.into())
        }
    };

    shutdown.shutdown();
    shutdown
        .wait_for_drain(Duration::from_secs(cfg.drain_timeout_secs))
        .await;
    monitor.shutdown().await;

    result
}
