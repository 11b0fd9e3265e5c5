//! PostgreSQL connection pool and its health/lifecycle facade.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;
use tokio::time::timeout;

use crate::config::DatabaseSettings;
use crate::error::{DatabaseError, Result};
use crate::queries::Queries;

/// Budget for pool construction and the startup liveness probe.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for the liveness probe issued by `health()`.
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(1);

static INSTANCE: OnceCell<DatabaseService> = OnceCell::const_new();

/// Cumulative acquisition counters.
///
/// sqlx exposes a live pool snapshot (`size`, `num_idle`) but no
/// lifetime counters, so the facade keeps its own.
#[derive(Debug, Default)]
struct PoolCounters {
    acquires: AtomicU64,
    cancels: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct CounterSnapshot {
    acquire_count: u64,
    cancel_count: u64,
}

impl PoolCounters {
    fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cancelled(&self) {
        self.cancels.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            acquire_count: self.acquires.load(Ordering::Relaxed),
            cancel_count: self.cancels.load(Ordering::Relaxed),
        }
    }
}

/// Owner of the process-wide connection pool and the query-execution
/// handle bound to it.
#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: PgPool,
    queries: Queries,
    counters: Arc<PoolCounters>,
    database: String,
}

impl DatabaseService {
    /// Connect to the configured server and verify liveness.
    ///
    /// Pool construction and the startup probe are each bounded by
    /// 5 seconds.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let counters = Arc::new(PoolCounters::default());

        let acquire_counters = Arc::clone(&counters);
        let connect_counters = Arc::clone(&counters);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(CONNECT_TIMEOUT)
            .before_acquire(move |_conn, _meta| {
                acquire_counters.record_acquire();
                Box::pin(async { Ok(true) })
            })
            .after_connect(move |_conn, _meta| {
                // A fresh connection satisfies an acquire without
                // passing before_acquire.
                connect_counters.record_acquire();
                Box::pin(async { Ok(()) })
            })
            .connect_with(settings.connect_options())
            .await
            .map_err(DatabaseError::Connect)?;

        tracing::info!(
            url = %settings.masked_url(),
            max_connections = settings.max_connections,
            "PostgreSQL connection pool created"
        );

        let service = Self {
            queries: Queries::new(pool.clone()),
            pool,
            counters,
            database: settings.database.clone(),
        };

        service.ping(CONNECT_TIMEOUT).await?;

        Ok(service)
    }

    /// Process-wide instance, connected on first use from the
    /// environment.
    ///
    /// Concurrent first calls race safely: exactly one pool is built
    /// and every caller gets the same instance. A failed
    /// initialization leaves the cell empty so a later call may retry.
    pub async fn instance() -> Result<&'static DatabaseService> {
        INSTANCE
            .get_or_try_init(|| async {
                let settings = DatabaseSettings::from_env()?;
                DatabaseService::connect(&settings).await
            })
            .await
    }

    /// The query-execution handle bound to this pool.
    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Probe the database and report pool health as a flat string map.
    ///
    /// On success: `status`, `message`, and five counters (`acquired`,
    /// `idle`, `total`, `acquire_count`, `cancel_count`) stringified
    /// base-10. On failure: `status` and `error` only.
    pub async fn health(&self) -> HashMap<String, String> {
        let mut stats = HashMap::new();

        if let Err(err) = self.ping(HEALTH_PING_TIMEOUT).await {
            tracing::warn!(error = %err, "database liveness probe failed");
            stats.insert("status".to_string(), "down".to_string());
            stats.insert("error".to_string(), format!("db down: {err}"));
            return stats;
        }

        stats.insert("status".to_string(), "up".to_string());
        stats.insert("message".to_string(), "It's healthy".to_string());

        let total = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        let snapshot = self.counters.snapshot();

        stats.insert("acquired".to_string(), total.saturating_sub(idle).to_string());
        stats.insert("idle".to_string(), idle.to_string());
        stats.insert("total".to_string(), total.to_string());
        stats.insert(
            "acquire_count".to_string(),
            snapshot.acquire_count.to_string(),
        );
        stats.insert("cancel_count".to_string(), snapshot.cancel_count.to_string());

        stats
    }

    /// Close the pool, waiting for in-flight acquisitions to settle.
    ///
    /// Closing an already-closed pool is a no-op. The process-wide
    /// instance is not cleared; after a close its probes fail and
    /// `health()` reports `down`.
    pub async fn close(&self) {
        tracing::info!(database = %self.database, "disconnected from database");
        self.pool.close().await;
    }

    async fn ping(&self, limit: Duration) -> Result<()> {
        match timeout(limit, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => {
                if matches!(err, sqlx::Error::PoolTimedOut) {
                    self.counters.record_cancelled();
                }
                Err(DatabaseError::Ping(err))
            }
            Err(_) => {
                self.counters.record_cancelled();
                Err(DatabaseError::PingTimeout(limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_settings() -> DatabaseSettings {
        DatabaseSettings {
            database: "helios".to_string(),
            username: "helios".to_string(),
            password: "secret".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1, // nothing listens here
            schema: "public".to_string(),
            max_connections: 2,
        }
    }

    /// Build a service without connecting, so probe failures can be
    /// exercised without a server.
    fn lazy_service(settings: &DatabaseSettings) -> DatabaseService {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(settings.connect_options());

        DatabaseService {
            queries: Queries::new(pool.clone()),
            pool,
            counters: Arc::new(PoolCounters::default()),
            database: settings.database.clone(),
        }
    }

    #[tokio::test]
    async fn test_health_reports_down_when_unreachable() {
        let service = lazy_service(&unreachable_settings());

        let stats = service.health().await;

        assert_eq!(stats.get("status").map(String::as_str), Some("down"));
        assert!(!stats.get("error").expect("error message present").is_empty());

        // Counter keys are omitted on the down path
        for key in [
            "message",
            "acquired",
            "idle",
            "total",
            "acquire_count",
            "cancel_count",
        ] {
            assert!(!stats.contains_key(key), "{key} must be absent when down");
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let service = lazy_service(&unreachable_settings());

        service.close().await;
        assert!(service.pool.is_closed());

        // Second close is a no-op, not a double-close
        service.close().await;
        assert!(service.pool.is_closed());
    }

    #[tokio::test]
    async fn test_queries_share_the_pool() {
        let service = lazy_service(&unreachable_settings());

        assert!(!service.queries().pool().is_closed());
        service.close().await;
        assert!(service.queries().pool().is_closed());
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = PoolCounters::default();

        counters.record_acquire();
        counters.record_acquire();
        counters.record_cancelled();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.acquire_count, 2);
        assert_eq!(snapshot.cancel_count, 1);
    }
}
