//! PostgreSQL backend for the pool abstraction.
//!
//! Pools are `deadpool-postgres` pools of `tokio-postgres` clients. A
//! client pipelines every request that is polled concurrently, so the
//! configured depth is enforced per checked-out connection with a
//! semaphore: depth 1 serializes lookups, unbounded lets all of them hit
//! the wire before the first response is read.

use crate::config::PoolConfig;
use crate::error::{BenchError, BenchResult};
use crate::pool::{Connection, Pool, PoolSet, PoolSetConfig};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, RecyclingMethod, Runtime};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;
use tracing::{info, trace};

/// A PostgreSQL connection pool.
pub struct PgPool {
    config: PoolConfig,
    inner: deadpool_postgres::Pool,
}

impl PgPool {
    /// Build the pool. Connections are opened lazily on first acquire.
    pub fn create(config: PoolConfig) -> BenchResult<Self> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(&config.database);
        if let Some(password) = &config.password {
            pg.password(password);
        }

        let manager = Manager::from_config(
            pg,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let inner = deadpool_postgres::Pool::builder(manager)
            .max_size(config.max_size)
            .wait_timeout(config.acquire_timeout)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| BenchError::Config(e.to_string()))?;

        info!(
            "pool {}:{}/{} size={} pipelining={} cache_statements={}",
            config.host,
            config.port,
            config.database,
            config.max_size,
            config.pipelining,
            config.cache_statements
        );

        Ok(Self { config, inner })
    }

    /// Number of open connections, idle or checked out.
    pub fn size(&self) -> usize {
        self.inner.status().size
    }
}

/// Build the maintenance, no-pipelining and max-pipelining pools.
pub fn connect(config: PoolSetConfig) -> BenchResult<PoolSet<PgPool>> {
    PoolSet::build(config, PgPool::create)
}

/// A pooled client limited to the pool's pipelining depth.
pub struct PgConnection {
    client: Object,
    in_flight: Option<Semaphore>,
    cache_statements: bool,
}

impl PgConnection {
    async fn permit(&self) -> BenchResult<Option<SemaphorePermit<'_>>> {
        match &self.in_flight {
            Some(gate) => Ok(Some(gate.acquire().await.map_err(BenchError::query)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn execute(&self, sql: &str) -> BenchResult<u64> {
        let _permit = self.permit().await?;
        self.client.execute(sql, &[]).await.map_err(BenchError::query)
    }

    async fn execute_bulk(&self, sql: &str, values: &[i64]) -> BenchResult<u64> {
        let _permit = self.permit().await?;
        let array: &(dyn ToSql + Sync) = &values;
        self.client
            .execute(sql, &[array])
            .await
            .map_err(BenchError::query)
    }

    async fn prepare(&self, sql: &str) -> BenchResult<()> {
        // The client's cache doesn't merge concurrent misses for one query.
        if self.cache_statements {
            let _permit = self.permit().await?;
            self.client
                .prepare_cached(sql)
                .await
                .map_err(BenchError::query)?;
        }
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[i64]) -> BenchResult<Vec<i64>> {
        let _permit = self.permit().await?;
        let statement = if self.cache_statements {
            self.client.prepare_cached(sql).await
        } else {
            self.client.prepare(sql).await
        }
        .map_err(BenchError::query)?;

        let params: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client
            .query(&statement, &params)
            .await
            .map_err(BenchError::query)?;

        rows.iter()
            .map(|row| row.try_get::<_, i64>(0).map_err(BenchError::query))
            .collect()
    }
}

#[async_trait]
impl Pool for PgPool {
    type Conn = PgConnection;

    fn config(&self) -> &PoolConfig {
        &self.config
    }

    async fn acquire(&self) -> BenchResult<PgConnection> {
        let client = self
            .inner
            .get()
            .await
            .map_err(|e| BenchError::Acquisition(e.to_string()))?;
        Ok(PgConnection {
            client,
            in_flight: self.config.pipelining.limit().map(Semaphore::new),
            cache_statements: self.config.cache_statements,
        })
    }

    fn release(&self, conn: PgConnection) {
        // Dropping the deadpool object returns the client to its pool.
        drop(conn);
        trace!("connection released, {} open", self.size());
    }

    fn close(&self) {
        self.inner.close();
    }
}
