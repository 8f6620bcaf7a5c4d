//! berth placement engine
//!
//! Serves reservations over HTTP, runs the reservation dispatcher and keeps
//! compute pool membership in line with the elastic placement zones.

use std::sync::Arc;

use anyhow::Result;
use berth_placement::{
    api,
    cluster::{ClusterSizeReconciler, StoreLifecycle},
    config,
    placement::PlacementSelector,
    reservation::{LogCallback, ReservationService},
    seed::{self, Seed},
    state::AppState,
    store::{DocumentStore, MemoryStore},
    zones::ZoneAssignmentWorker,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to BERTH_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting berth placement engine");
    info!(listen_addr = %config.listen_addr, "Configuration loaded");

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let selector = Arc::new(
        PlacementSelector::new(Arc::clone(&store)).with_max_attempts(config.reservation_attempts),
    );

    if let Some(path) = &config.seed_file {
        let seed = match Seed::from_file(path).await {
            Ok(seed) => seed,
            Err(e) => {
                error!(error = %e, "Failed to load seed file");
                return Err(e.into());
            }
        };
        seed.apply(&selector).await?;
    }

    if config.default_placement {
        seed::ensure_default_placement(&selector).await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (reservations, dispatcher_handle) = ReservationService::spawn(
        Arc::clone(&selector),
        Arc::new(LogCallback),
        config.queue_depth,
        shutdown_rx.clone(),
    );

    let zone_worker = ZoneAssignmentWorker::new(Arc::clone(&store), config.zone_interval);
    let zone_trigger = zone_worker.trigger();
    let zone_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            zone_worker.run(shutdown_rx).await;
        }
    });

    let cluster = ClusterSizeReconciler::new(
        Arc::clone(&store),
        reservations.clone(),
        Arc::clone(&selector),
        Arc::new(StoreLifecycle::new(Arc::clone(&store))),
    );

    let state = AppState::new(store, selector, reservations, zone_trigger, cluster);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, dispatcher_handle).await {
        warn!(error = %e, "Reservation dispatcher did not shut down in time");
    }

    if let Err(e) = tokio::time::timeout(shutdown_timeout, zone_handle).await {
        warn!(error = %e, "Zone assignment worker did not shut down in time");
    }

    info!("Placement engine shutdown complete");
    Ok(())
}
