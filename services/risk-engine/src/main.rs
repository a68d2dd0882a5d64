//! RiskMesh risk engine service entry point

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use riskmesh_common::constants::app;
use riskmesh_config::AppSettings;
use riskmesh_engine::analytics::RiskAnalytics;
use riskmesh_engine::api::{auth::ApiKeyRegistry, create_router, AppState};
use riskmesh_engine::cache::{MemoryRiskCache, RedisRiskCache, RiskCache};
use riskmesh_engine::metrics::Metrics;
use riskmesh_engine::risk::RiskEngine;
use riskmesh_engine::storage::{MemoryTransactionLog, PostgresTransactionLog, TransactionLog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("Starting {}: {}", app::NAME, app::DESCRIPTION);

    let settings = AppSettings::load()?;

    let metrics = Arc::new(Metrics::new()?);

    let log: Arc<dyn TransactionLog> = match &settings.database.url {
        Some(url) => {
            let max_connections = settings.database.max_connections.unwrap_or(10);
            match PostgresTransactionLog::connect(url, max_connections).await {
                Ok(postgres) => Arc::new(postgres),
                Err(e) => {
                    warn!(error = %e, "database unavailable, falling back to in-memory transaction log");
                    Arc::new(MemoryTransactionLog::new())
                }
            }
        }
        None => {
            info!("DATABASE_URL not set, using in-memory transaction log");
            Arc::new(MemoryTransactionLog::new())
        }
    };

    let cache: Option<Arc<dyn RiskCache>> = match &settings.redis.url {
        Some(url) => match RedisRiskCache::connect(url).await {
            Ok(redis) => Some(Arc::new(redis)),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-memory cache");
                Some(Arc::new(MemoryRiskCache::default()))
            }
        },
        None => {
            info!("REDIS_URL not set, using in-memory cache");
            Some(Arc::new(MemoryRiskCache::default()))
        }
    };

    let engine = Arc::new(RiskEngine::new(
        settings.engine.clone(),
        cache.clone(),
        log.clone(),
    ));
    let analytics = Arc::new(RiskAnalytics::new(log));
    let auth = Arc::new(ApiKeyRegistry::from_config(&settings.auth));

    let state = AppState {
        engine,
        analytics,
        cache,
        metrics,
        auth,
    };

    let app = create_router(state);

    let bind_address = settings.bind_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!("RiskMesh listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
