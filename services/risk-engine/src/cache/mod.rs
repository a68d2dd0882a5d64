//! Hot-user risk cache
//!
//! Collaborator contract for the per-user risk cache plus the two
//! implementations: Redis for shared deployments and a process-local Moka
//! cache for tests and Redis-less operation. Every method is safe to call in
//! parallel and safe to fail; the engine treats all cache errors as
//! degradations.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use riskmesh_common::constants::cache::keys::USER_RISK;
use riskmesh_errors::{Result, RiskMeshError};

/// Counters exposed at `GET /api/cache/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub backend: String,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub entries: Option<u64>,
}

/// Per-user risk cache collaborator.
#[async_trait]
pub trait RiskCache: Send + Sync {
    /// Cached risk for a user, if present and fresh.
    async fn get_user_risk(&self, user_id: &str) -> Result<Option<f64>>;

    /// Cache a user's risk with the given TTL.
    async fn set_user_risk(&self, user_id: &str, risk: f64, ttl: Duration) -> Result<()>;

    /// Drop a user's cached risk.
    async fn invalidate(&self, user_id: &str) -> Result<()>;

    /// Current cache counters.
    async fn stats(&self) -> CacheStats;
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }
}

fn user_risk_key(user_id: &str) -> String {
    format!("{USER_RISK}{user_id}")
}

// =============================================================================
// REDIS CACHE
// =============================================================================

/// Redis-backed risk cache shared across instances.
pub struct RedisRiskCache {
    pool: deadpool_redis::Pool,
    counters: Counters,
}

impl RedisRiskCache {
    /// Create the pool and verify the connection with a ping.
    pub async fn connect(url: &str) -> Result<Self> {
        let config = deadpool_redis::Config::from_url(url);
        let pool = config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))?;

        info!("Redis cache connected");
        Ok(Self {
            pool,
            counters: Counters::default(),
        })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))
    }
}

#[async_trait]
impl RiskCache for RedisRiskCache {
    async fn get_user_risk(&self, user_id: &str) -> Result<Option<f64>> {
        let key = user_risk_key(user_id);
        let mut conn = self.connection().await?;

        let value: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))?;

        match value {
            Some(raw) => {
                let risk = raw
                    .parse::<f64>()
                    .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))?;
                self.counters.hit();
                debug!(key = %key, risk, "cache hit");
                Ok(Some(risk))
            }
            None => {
                self.counters.miss();
                debug!(key = %key, "cache miss");
                Ok(None)
            }
        }
    }

    async fn set_user_risk(&self, user_id: &str, risk: f64, ttl: Duration) -> Result<()> {
        let key = user_risk_key(user_id);
        let mut conn = self.connection().await?;
        redis::cmd("SETEX")
            .arg(&key)
            .arg(ttl.as_secs())
            .arg(risk.to_string())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))?;
        self.counters.set();
        debug!(key = %key, risk, "cache set");
        Ok(())
    }

    async fn invalidate(&self, user_id: &str) -> Result<()> {
        let key = user_risk_key(user_id);
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(&key)
            .await
            .map_err(|e| RiskMeshError::collaborator("cache", e.to_string()))?;
        debug!(key = %key, "cache invalidated");
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: true,
            backend: "redis".to_string(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            entries: None,
        }
    }
}

// =============================================================================
// IN-MEMORY CACHE
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct CachedRisk {
    risk: f64,
    expires_at: std::time::Instant,
}

/// Process-local risk cache on Moka, used when Redis is not configured and
/// throughout the test suite.
pub struct MemoryRiskCache {
    cache: moka::future::Cache<String, CachedRisk>,
    counters: Counters,
}

impl MemoryRiskCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: moka::future::Cache::builder()
                .max_capacity(max_capacity)
                .build(),
            counters: Counters::default(),
        }
    }
}

impl Default for MemoryRiskCache {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl RiskCache for MemoryRiskCache {
    async fn get_user_risk(&self, user_id: &str) -> Result<Option<f64>> {
        let key = user_risk_key(user_id);
        match self.cache.get(&key).await {
            Some(entry) if entry.expires_at > std::time::Instant::now() => {
                self.counters.hit();
                Ok(Some(entry.risk))
            }
            Some(_) => {
                // Expired entries are dropped on first touch.
                self.cache.invalidate(&key).await;
                self.counters.miss();
                Ok(None)
            }
            None => {
                self.counters.miss();
                Ok(None)
            }
        }
    }

    async fn set_user_risk(&self, user_id: &str, risk: f64, ttl: Duration) -> Result<()> {
        let entry = CachedRisk {
            risk,
            expires_at: std::time::Instant::now() + ttl,
        };
        self.cache.insert(user_risk_key(user_id), entry).await;
        self.counters.set();
        Ok(())
    }

    async fn invalidate(&self, user_id: &str) -> Result<()> {
        self.cache.invalidate(&user_risk_key(user_id)).await;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: true,
            backend: "memory".to_string(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            entries: Some(self.cache.entry_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryRiskCache::default();
        assert_eq!(cache.get_user_risk("u1").await.unwrap(), None);

        cache
            .set_user_risk("u1", 0.75, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get_user_risk("u1").await.unwrap(), Some(0.75));
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryRiskCache::default();
        cache
            .set_user_risk("u1", 0.75, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get_user_risk("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_invalidate() {
        let cache = MemoryRiskCache::default();
        cache
            .set_user_risk("u1", 0.9, Duration::from_secs(60))
            .await
            .unwrap();
        cache.invalidate("u1").await.unwrap();
        assert_eq!(cache.get_user_risk("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_stats_count_hits_and_misses() {
        let cache = MemoryRiskCache::default();
        cache.get_user_risk("u1").await.unwrap();
        cache
            .set_user_risk("u1", 0.5, Duration::from_secs(60))
            .await
            .unwrap();
        cache.get_user_risk("u1").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
    }
}
