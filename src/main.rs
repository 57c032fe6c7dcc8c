//! Station Booking server
//!
//! REST API for time-window charging station reservations.
//! Reads configuration from TOML file (~/.config/station-booking/config.toml
//! or `$BOOKING_CONFIG`).

use std::sync::Arc;

use tracing::{error, info, warn};

use station_booking::application::{BookingService, ExpirationSweeper};
use station_booking::config::{AppConfig, LoggingConfig, StorageBackend};
use station_booking::domain::RepositoryProvider;
use station_booking::interfaces::http::modules::metrics::metrics_router;
use station_booking::shared::clock::{SharedClock, SystemClock};
use station_booking::shared::shutdown::ShutdownCoordinator;
use station_booking::{
    create_api_router, default_config_path, init_database, InMemoryRepositoryProvider,
    SeaOrmRepositoryProvider,
};

fn init_logging(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    if cfg.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = default_config_path();
    let (app_cfg, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_logging(&app_cfg.logging);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => error!("Failed to load config: {}. Using defaults.", e),
    }

    info!("Starting Station Booking...");

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    let prometheus_handle = if app_cfg.metrics.enabled {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
        info!("📊 Prometheus metrics recorder installed");
        Some(handle)
    } else {
        None
    };

    // ── Storage ────────────────────────────────────────────────
    let mut db = None;
    let repos: Arc<dyn RepositoryProvider> = match app_cfg.database.backend {
        StorageBackend::Sqlite => {
            let conn = match init_database(&app_cfg.database.connection()).await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to initialise database: {}", e);
                    return Err(e.into());
                }
            };
            db = Some(conn.clone());
            Arc::new(SeaOrmRepositoryProvider::new(conn))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; reservations are lost on restart");
            Arc::new(InMemoryRepositoryProvider::new())
        }
    };

    // ── Services ───────────────────────────────────────────────
    let clock: SharedClock = Arc::new(SystemClock);
    let service = Arc::new(BookingService::new(
        repos.clone(),
        clock.clone(),
        app_cfg.booking.settings(),
    ));

    let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    let sweeper = Arc::new(
        ExpirationSweeper::new(repos, service.lifecycle(), clock)
            .with_config(app_cfg.booking.sweeper()),
    );
    let sweeper_handle = sweeper.start(shutdown_signal.clone());

    // ── REST API ───────────────────────────────────────────────
    let mut api_router = create_api_router(service);
    if let Some(handle) = prometheus_handle {
        api_router = api_router.merge(metrics_router(handle));
    }

    let api_addr = app_cfg.listen_address();
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("REST API server listening on http://{}", api_addr);
    info!("Swagger UI available at http://{}/docs/", api_addr);

    let api_shutdown = shutdown_signal.clone();
    let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
        api_shutdown.wait().await;
        info!("🛑 REST API server received shutdown signal");
    });

    info!("🚀 Server started. Press Ctrl+C to shutdown gracefully.");
    let api_result = tokio::spawn(async move { api_server.await });

    match api_result.await {
        Ok(Ok(())) => info!("REST API server stopped"),
        Ok(Err(e)) => error!("REST API server error: {}", e),
        Err(e) => error!("REST API server task panicked: {}", e),
    }

    // ── Final cleanup ──────────────────────────────────────────
    info!("🧹 Performing final cleanup...");
    shutdown_signal.trigger();
    if tokio::time::timeout(shutdown.timeout(), sweeper_handle.stop())
        .await
        .is_err()
    {
        warn!("Expiration sweeper did not stop within the shutdown timeout");
    }

    if let Some(db) = db {
        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }
    }

    info!("👋 Station Booking shutdown complete");
    Ok(())
}
