use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use tokio::signal;
use vault_service::{
    build_router,
    config::VaultConfig,
    db::Database,
    services::{AccessGateway, AuditLedger, SecretCipher, SecretStore, TokenAuthority},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = VaultConfig::from_env()?;

    // Initialize tracing/logging using shared logic
    init_tracing(&config.service_name, &config.log_level);

    // Initialize metrics
    vault_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting vault service"
    );

    // Initialize database
    tracing::info!("Initializing database");
    let db = Database::connect(&config.database.url, config.database.max_connections)
        .await
        .map_err(service_core::error::AppError::from)?;
    tracing::info!("Database initialized successfully");

    // Build the cipher from the configured master key
    let cipher = Arc::new(SecretCipher::from_master_key(&config.encryption.master_key)?);
    tracing::info!("Encryption initialized");

    // Initialize rate limiters using shared logic
    let device_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.device_code_attempts,
        config.rate_limit.device_code_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Device Code and Global IP");

    // Initialize services
    let ledger = AuditLedger::new(db.clone(), config.audit.fail_open);
    let store = SecretStore::new(db.clone(), cipher);
    let gateway = AccessGateway::new(store, ledger.clone());
    let authority = Arc::new(TokenAuthority::new(db.clone(), ledger.clone()));

    // Periodic sweep of expired device codes
    let sweep_authority = authority.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match sweep_authority.cleanup_expired_device_codes().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "swept expired device codes"),
                Err(e) => tracing::warn!(error = %e, "device code sweep failed"),
            }
        }
    });

    // Create application state
    let state = AppState {
        config: config.clone(),
        db,
        gateway,
        authority,
        ledger,
        device_rate_limiter,
        ip_rate_limiter,
    };

    // Build application router
    let app = build_router(state).await?;

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
