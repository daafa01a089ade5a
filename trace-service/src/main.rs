use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use trace_core::observability::init_tracing;

use trace_service::config::TraceConfig;
use trace_service::services::backends::{
    HttpContentStore, HttpLexicalSearcher, HttpVectorSearcher,
};
use trace_service::services::cache::RedisService;
use trace_service::services::directory::PgDirectory;
use trace_service::services::store::PgCredentialStore;
use trace_service::{build_router, db, spawn_code_sweeper, AppState};

#[tokio::main]
async fn main() -> Result<(), trace_core::error::AppError> {
    // Load configuration, fail fast if invalid
    let config = TraceConfig::from_env()?;

    init_tracing(&config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting trace service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let redis = RedisService::connect(&config.redis.url).await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.search.backend_timeout_ms))
        .build()
        .map_err(|e| trace_core::error::AppError::ConfigError(anyhow::anyhow!(e)))?;

    let config = Arc::new(config);
    let state = AppState::new(
        config.clone(),
        Arc::new(PgCredentialStore::new(pool.clone())),
        Arc::new(redis),
        Arc::new(PgDirectory::new(pool)),
        Arc::new(HttpLexicalSearcher::new(
            http_client.clone(),
            config.search.lexical_url.clone(),
        )),
        Arc::new(HttpVectorSearcher::new(
            http_client.clone(),
            config.search.vector_url.clone(),
        )),
        Arc::new(HttpContentStore::new(
            http_client,
            config.storage.url.clone(),
        )),
    );

    let sweeper = spawn_code_sweeper(&state);

    let app = build_router(state);
    let addr = config.common.socket_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .unwrap_or_else(|e| tracing::error!(error = %e, "failed to install ctrl-c handler"));
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
