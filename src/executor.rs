//! Batched point lookups over a single pooled connection.

use crate::config::Dataset;
use crate::error::{BenchError, BenchResult};
use crate::pool::{Connection, Pool};
use futures::TryStreamExt;
use futures::stream::FuturesUnordered;
use std::collections::BTreeSet;
use std::slice;

/// Keys to look up, in the order the caller asked for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBatch {
    keys: Vec<i64>,
}

impl QueryBatch {
    pub fn new(keys: Vec<i64>) -> Self {
        Self { keys }
    }

    /// Keys `1..=size`.
    pub fn first(size: usize) -> Self {
        Self::new((1..=size as i64).collect())
    }

    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check that `rows` holds every requested key exactly once.
    pub fn verify(&self, rows: &[i64], scenario: &'static str) -> BenchResult<()> {
        let mut returned = rows.to_vec();
        returned.sort_unstable();
        let mut requested = self.keys.clone();
        requested.sort_unstable();
        if returned == requested {
            return Ok(());
        }

        let found: BTreeSet<i64> = rows.iter().copied().collect();
        let missing = requested.iter().filter(|k| !found.contains(*k)).count();
        let matched = requested.len() - missing;
        Err(BenchError::KeyMismatch {
            scenario,
            missing,
            unexpected: rows.len().saturating_sub(matched),
        })
    }
}

/// Runs one point lookup per key, all on one connection.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    lookup_sql: String,
}

impl BatchExecutor {
    pub fn new(dataset: &Dataset) -> Self {
        Self {
            lookup_sql: dataset.lookup_sql(),
        }
    }

    /// Acquire a connection, look up every key, release the connection.
    ///
    /// The lookup statement is prepared once, then all lookups are issued
    /// at once; the connection's pipelining depth
    /// decides how many share the wire. Rows come back in completion
    /// order. The first failing lookup cancels the rest and no partial
    /// result is returned. The connection is released exactly once on
    /// every path that reached the acquire.
    pub async fn run<P: Pool>(&self, pool: &P, batch: &QueryBatch) -> BenchResult<Vec<i64>> {
        let conn = pool.acquire().await?;
        let result = self.lookup_all(&conn, batch.keys()).await;
        pool.release(conn);
        result
    }

    async fn lookup_all<C: Connection>(&self, conn: &C, keys: &[i64]) -> BenchResult<Vec<i64>> {
        conn.prepare(&self.lookup_sql).await?;
        let mut pending: FuturesUnordered<_> = keys
            .iter()
            .map(|key| conn.query(&self.lookup_sql, slice::from_ref(key)))
            .collect();

        let mut rows = Vec::with_capacity(keys.len());
        while let Some(found) = pending.try_next().await? {
            rows.extend(found);
        }
        Ok(rows)
    }
}
