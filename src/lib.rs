//! # pipebench
//!
//! Measures what wire-level query pipelining buys when many point lookups
//! share one PostgreSQL connection.
//!
//! A run fills a single table, then drives three scenarios through two
//! pools that differ only in pipelining depth:
//!
//! | Scenario          | Pool(s)                      | Reported                 |
//! |-------------------|------------------------------|--------------------------|
//! | Unit comparison   | max-pipelining, no-pipelining| elapsed time of each     |
//! | Sequential repeat | max-pipelining               | total time / runs        |
//! | Concurrent repeat | max-pipelining               | mean of run durations    |
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use pipebench::prelude::*;
//!
//! let settings = Settings::load()?;
//! let pools = pipebench::pg::connect(PoolSetConfig::from_settings(&settings))?;
//! let driver = BenchmarkDriver::new(pools, Dataset::default(), BenchParams::default());
//! let report = driver.run().await?;
//! pipebench::report::print(&report);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod fixture;
pub mod pg;
pub mod pool;
pub mod report;
pub mod scenario;
pub mod stats;

#[cfg(test)]
mod mock;

pub mod prelude {
    pub use crate::config::{BenchParams, Dataset, Pipelining, PoolConfig, Settings};
    pub use crate::driver::{BenchmarkDriver, Report};
    pub use crate::error::*;
    pub use crate::executor::{BatchExecutor, QueryBatch};
    pub use crate::fixture::DatasetFixture;
    pub use crate::pool::{Connection, Pool, PoolSet, PoolSetConfig};
    pub use crate::scenario::{BenchmarkResult, Scenario, ScenarioRunner, TimingSample};
}
