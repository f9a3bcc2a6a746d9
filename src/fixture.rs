//! The benchmark table: creation, verification and removal.
//!
//! Every statement runs on the maintenance connection, never on a
//! benchmarking pool.

use crate::config::Dataset;
use crate::error::{BenchError, BenchResult};
use crate::pool::Connection;
use tracing::info;

pub struct DatasetFixture {
    dataset: Dataset,
}

impl DatasetFixture {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Drop, create, then fill the table with keys `1..=row_count` in one
    /// bulk statement. Any failure is a `BenchError::Setup`; no cleanup is
    /// attempted here.
    pub async fn setup<C: Connection>(&self, conn: &C) -> BenchResult<()> {
        info!("Setting up database");

        info!("Dropping table {}", self.dataset.table);
        conn.execute(&self.dataset.drop_sql())
            .await
            .map_err(BenchError::into_setup)?;

        info!("Creating table {}", self.dataset.table);
        conn.execute(&self.dataset.create_sql())
            .await
            .map_err(BenchError::into_setup)?;

        info!("Inserting {} rows", self.dataset.row_count);
        let inserted = conn
            .execute_bulk(&self.dataset.insert_sql(), &self.dataset.keys())
            .await
            .map_err(BenchError::into_setup)?;
        if inserted != self.dataset.row_count as u64 {
            return Err(BenchError::Setup(format!(
                "bulk insert wrote {} rows, expected {}",
                inserted, self.dataset.row_count
            )));
        }
        Ok(())
    }

    /// Count the rows with an independent query and compare.
    pub async fn verify_count<C: Connection>(&self, conn: &C, expected: i64) -> BenchResult<()> {
        info!("Counting rows in {}", self.dataset.table);
        let rows = conn.query(&self.dataset.count_sql(), &[]).await?;
        let actual = rows.first().copied().ok_or_else(|| {
            BenchError::Query(format!("count over {} returned no row", self.dataset.table))
        })?;
        if actual != expected {
            return Err(BenchError::CountMismatch { expected, actual });
        }
        info!("Row count is {}", actual);
        Ok(())
    }

    /// Drop the table if present.
    pub async fn teardown<C: Connection>(&self, conn: &C) -> BenchResult<()> {
        info!("Dropping table {}", self.dataset.table);
        conn.execute(&self.dataset.drop_sql())
            .await
            .map(|_| ())
            .map_err(|e| BenchError::Teardown(e.to_string()))
    }
}
