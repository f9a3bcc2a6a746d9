//! The three measurement scenarios.
//!
//! 1. Unit comparison: one large batch through the max-pipelining pool,
//!    then the same batch through the no-pipelining pool.
//! 2. Sequential repeat: `R` small batches, each awaited before the next.
//! 3. Concurrent repeat: `R` small batches in flight together, fanned out
//!    from the calling task and joined at the end.
//!
//! Every run checks that the returned keys match the requested ones.

use crate::config::BenchParams;
use crate::error::BenchResult;
use crate::executor::{BatchExecutor, QueryBatch};
use crate::pool::{Pool, PoolSet};
use crate::stats;
use futures::TryStreamExt;
use futures::stream::FuturesUnordered;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Pipelined,
    Unpipelined,
    Sequential,
    Concurrent,
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pipelined => "unit comparison (pipelined)",
            Self::Unpipelined => "unit comparison (no pipelining)",
            Self::Sequential => "sequential repeat",
            Self::Concurrent => "concurrent repeat",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One timed batch execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub scenario: Scenario,
    pub run: usize,
    pub started: Instant,
    pub finished: Instant,
}

impl TimingSample {
    pub fn elapsed(&self) -> Duration {
        self.finished.duration_since(self.started)
    }
}

/// All runs of a repeat scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub scenario: Scenario,
    /// Ordered by run index.
    pub samples: Vec<TimingSample>,
    /// Mean of the individual run durations.
    pub mean: Duration,
    /// Wall time from the first start to the last finish.
    pub wall: Duration,
}

impl BenchmarkResult {
    fn from_samples(
        scenario: Scenario,
        mut samples: Vec<TimingSample>,
        wall: Duration,
    ) -> BenchResult<Self> {
        samples.sort_by_key(|s| s.run);
        let durations: Vec<Duration> = samples.iter().map(TimingSample::elapsed).collect();
        let mean = stats::mean(&durations)?;
        Ok(Self {
            scenario,
            samples,
            mean,
            wall,
        })
    }

    /// Wall time divided by the number of runs.
    pub fn wall_per_run(&self) -> Duration {
        self.wall / self.samples.len().max(1) as u32
    }
}

/// Timings of the same batch with and without pipelining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitComparison {
    pub batch_size: usize,
    pub pipelined: TimingSample,
    pub unpipelined: TimingSample,
}

/// Drives the scenarios against the benchmarking pools of a [`PoolSet`].
///
/// Never touches the maintenance pool.
pub struct ScenarioRunner<'a, P: Pool> {
    pools: &'a PoolSet<P>,
    executor: BatchExecutor,
    params: BenchParams,
}

impl<'a, P: Pool> ScenarioRunner<'a, P> {
    pub fn new(pools: &'a PoolSet<P>, executor: BatchExecutor, params: BenchParams) -> Self {
        Self {
            pools,
            executor,
            params,
        }
    }

    pub async fn unit_comparison(&self) -> BenchResult<UnitComparison> {
        let batch = QueryBatch::first(self.params.pipelining_sample);
        info!("Running {} SELECTs per pool", batch.len());

        let pipelined = self
            .timed(self.pools.max_pipelining(), &batch, Scenario::Pipelined, 0)
            .await?;
        info!("With pipelining, SELECTs took {:?}", pipelined.elapsed());

        let unpipelined = self
            .timed(self.pools.no_pipelining(), &batch, Scenario::Unpipelined, 0)
            .await?;
        info!("Without pipelining, SELECTs took {:?}", unpipelined.elapsed());

        Ok(UnitComparison {
            batch_size: batch.len(),
            pipelined,
            unpipelined,
        })
    }

    /// Runs strictly one after another on the max-pipelining pool.
    pub async fn sequential_repeat(&self) -> BenchResult<BenchmarkResult> {
        let batch = QueryBatch::first(self.params.repeat_sample);
        info!(
            "Running {} sequential batches of {} SELECTs",
            self.params.repeats,
            batch.len()
        );

        let start = Instant::now();
        let mut samples = Vec::with_capacity(self.params.repeats);
        for run in 0..self.params.repeats {
            let sample = self
                .timed(self.pools.max_pipelining(), &batch, Scenario::Sequential, run)
                .await?;
            samples.push(sample);
        }
        BenchmarkResult::from_samples(Scenario::Sequential, samples, start.elapsed())
    }

    /// All runs in flight at once on the max-pipelining pool; the pool
    /// queues whatever exceeds its size. The first failure cancels the
    /// runs still in flight.
    pub async fn concurrent_repeat(&self) -> BenchResult<BenchmarkResult> {
        let batch = QueryBatch::first(self.params.repeat_sample);
        info!(
            "Running {} concurrent batches of {} SELECTs",
            self.params.repeats,
            batch.len()
        );

        let start = Instant::now();
        let samples: Vec<TimingSample> = (0..self.params.repeats)
            .map(|run| {
                self.timed(self.pools.max_pipelining(), &batch, Scenario::Concurrent, run)
            })
            .collect::<FuturesUnordered<_>>()
            .try_collect()
            .await?;
        BenchmarkResult::from_samples(Scenario::Concurrent, samples, start.elapsed())
    }

    async fn timed(
        &self,
        pool: &P,
        batch: &QueryBatch,
        scenario: Scenario,
        run: usize,
    ) -> BenchResult<TimingSample> {
        let started = Instant::now();
        let rows = self.executor.run(pool, batch).await?;
        let finished = Instant::now();
        batch.verify(&rows, scenario.name())?;

        let sample = TimingSample {
            scenario,
            run,
            started,
            finished,
        };
        debug!("{} run {} took {:?}", scenario, run, sample.elapsed());
        Ok(sample)
    }
}
