use iam_core::error::AppError;
use iam_core::middleware::rate_limit::create_ip_rate_limiter;
use iam_core::observability::{init_tracing, shutdown_tracing};
use iam_service::{
    build_router,
    config::IamConfig,
    db,
    services::{
        bootstrap, database::Database, metrics, AuthCore, CredentialStore, MemoryStore,
        PolicyEngine, PolicyRuleStore,
    },
    AppState,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = IamConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        single_use_grants = config.single_use_grants,
        refresh_response = ?config.refresh_response,
        "Starting IAM service"
    );

    let (store, rules): (Arc<dyn CredentialStore>, Arc<dyn PolicyRuleStore>) =
        match &config.database {
            Some(database) => {
                let pool = db::create_pool(database)
                    .await
                    .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
                db::run_migrations(&pool)
                    .await
                    .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
                let database = Arc::new(Database::new(pool));
                (database.clone(), database)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                let memory = Arc::new(MemoryStore::new());
                (memory.clone(), memory)
            }
        };

    bootstrap::ensure_built_ins(&store, &config.default_cert).await?;
    let seeded = bootstrap::seed_rules(rules.as_ref()).await?;
    tracing::info!(rules = seeded, "Seed policy rules written");

    let policy = PolicyEngine::load(rules.as_ref()).await?;
    let core = AuthCore::new(
        store,
        policy,
        &config.origin,
        &config.default_cert,
        config.issuer_options(),
    );

    let token_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.token_attempts,
        config.rate_limit.token_window_seconds,
    )?;

    let addr = config.common.listen_addr();
    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );

    let state = AppState {
        config: Arc::new(config),
        core,
        token_rate_limiter,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    service_span.in_scope(|| tracing::info!(address = %addr, "Listening"));

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .into_future()
    .instrument(service_span)
    .await?;

    shutdown_tracing();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
