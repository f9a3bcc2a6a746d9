//! Connection pool abstraction and the three benchmark pools.
//!
//! The core only talks to a database through [`Pool`] and [`Connection`].
//! [`crate::pg`] implements them for PostgreSQL; tests use an in-memory
//! backend.

use crate::config::{PoolConfig, Pipelining, Settings};
use crate::error::BenchResult;
use async_trait::async_trait;

/// A connection checked out of a [`Pool`].
///
/// Methods take `&self` so several statements can be in flight on one
/// connection at once; the pool's pipelining depth decides how many
/// actually share the wire.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a parameterless statement, returning the affected row count.
    async fn execute(&self, sql: &str) -> BenchResult<u64>;

    /// Run a statement with every value bound as one array parameter.
    async fn execute_bulk(&self, sql: &str, values: &[i64]) -> BenchResult<u64>;

    /// Prepare `sql` ahead of a burst of [`Connection::query`] calls so the
    /// burst shares one statement. A no-op unless the connection caches
    /// statements.
    async fn prepare(&self, sql: &str) -> BenchResult<()>;

    /// Run a parameterized query and return the first column of each row.
    async fn query(&self, sql: &str, params: &[i64]) -> BenchResult<Vec<i64>>;
}

/// A pool of [`Connection`]s built from one immutable [`PoolConfig`].
#[async_trait]
pub trait Pool: Send + Sync {
    type Conn: Connection;

    fn config(&self) -> &PoolConfig;

    /// Wait for a connection. Failures are `BenchError::Acquisition`.
    async fn acquire(&self) -> BenchResult<Self::Conn>;

    /// Hand a connection back to the pool.
    fn release(&self, conn: Self::Conn);

    /// Stop handing out connections and drop idle ones.
    fn close(&self);
}

/// Configurations of the three pools derived from one [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSetConfig {
    pub maintenance: PoolConfig,
    pub no_pipelining: PoolConfig,
    pub max_pipelining: PoolConfig,
}

impl PoolSetConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let base = settings.pool_config();
        Self {
            maintenance: base.clone().pipelining(Pipelining::Unbounded).max_size(1),
            no_pipelining: base
                .clone()
                .pipelining(Pipelining::disabled())
                .max_size(settings.pool_size),
            max_pipelining: base
                .pipelining(Pipelining::Unbounded)
                .max_size(settings.pool_size),
        }
    }
}

/// The maintenance pool plus the two pools under test.
///
/// Pools are independent: closing one leaves the others usable.
pub struct PoolSet<P: Pool> {
    maintenance: P,
    no_pipelining: P,
    max_pipelining: P,
}

impl<P: Pool> PoolSet<P> {
    /// Build all three pools eagerly. No query is issued here.
    pub fn build<F>(config: PoolSetConfig, mut create: F) -> BenchResult<Self>
    where
        F: FnMut(PoolConfig) -> BenchResult<P>,
    {
        Ok(Self {
            maintenance: create(config.maintenance)?,
            no_pipelining: create(config.no_pipelining)?,
            max_pipelining: create(config.max_pipelining)?,
        })
    }

    /// Size 1, unbounded pipelining. Reserved for the dataset fixture.
    pub fn maintenance(&self) -> &P {
        &self.maintenance
    }

    /// Depth 1, size `N`.
    pub fn no_pipelining(&self) -> &P {
        &self.no_pipelining
    }

    /// Unbounded depth, size `N`.
    pub fn max_pipelining(&self) -> &P {
        &self.max_pipelining
    }

    pub fn close(&self) {
        self.maintenance.close();
        self.no_pipelining.close();
        self.max_pipelining.close();
    }
}
