//! Top-level orchestration.
//!
//! setup -> count check -> unit comparison -> sequential repeat ->
//! concurrent repeat, then teardown whatever happened before it.

use crate::config::{BenchParams, Dataset};
use crate::error::BenchResult;
use crate::executor::BatchExecutor;
use crate::fixture::DatasetFixture;
use crate::pool::{Pool, PoolSet};
use crate::scenario::{BenchmarkResult, ScenarioRunner, UnitComparison};
use tracing::{info, warn};

/// Timings of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub unit: UnitComparison,
    pub sequential: BenchmarkResult,
    pub concurrent: BenchmarkResult,
}

/// Owns the pools and the dataset for one benchmark pass.
pub struct BenchmarkDriver<P: Pool> {
    pools: PoolSet<P>,
    fixture: DatasetFixture,
    params: BenchParams,
}

impl<P: Pool> BenchmarkDriver<P> {
    pub fn new(pools: PoolSet<P>, dataset: Dataset, params: BenchParams) -> Self {
        Self {
            pools,
            fixture: DatasetFixture::new(dataset),
            params,
        }
    }

    pub fn pools(&self) -> &PoolSet<P> {
        &self.pools
    }

    /// Run every stage once, in order, without retries.
    ///
    /// The maintenance connection is held for the whole pass. Once it is
    /// acquired, teardown runs exactly once whether the stages succeed or
    /// not; a teardown failure is logged and never replaces the stage
    /// outcome.
    pub async fn run(&self) -> BenchResult<Report> {
        let maintenance = self.pools.maintenance();
        let conn = maintenance.acquire().await?;

        let outcome = self.run_stages(&conn).await;

        if let Err(e) = self.fixture.teardown(&conn).await {
            warn!("{}", e);
        }
        maintenance.release(conn);
        outcome
    }

    async fn run_stages(&self, conn: &P::Conn) -> BenchResult<Report> {
        let dataset = self.fixture.dataset();
        self.fixture.setup(conn).await?;
        self.fixture.verify_count(conn, dataset.row_count).await?;

        let runner = ScenarioRunner::new(&self.pools, BatchExecutor::new(dataset), self.params);

        let unit = runner.unit_comparison().await?;

        let sequential = runner.sequential_repeat().await?;
        info!(
            "Avg. duration for sequential {:?} per run",
            sequential.wall_per_run()
        );

        let concurrent = runner.concurrent_repeat().await?;
        info!("Avg. duration for concurrent {:?}", concurrent.mean);

        Ok(Report {
            unit,
            sequential,
            concurrent,
        })
    }

    /// Close all three pools.
    pub fn close(&self) {
        self.pools.close();
    }
}
