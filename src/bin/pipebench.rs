//! pipebench: PostgreSQL pipelining benchmark
//!
//! # Usage
//!
//! ```bash
//! # Against the default localhost:5432
//! pipebench
//!
//! # Elsewhere
//! PG_HOST=10.0.0.5 PG_PASSWORD=secret pipebench
//!
//! # More detail
//! RUST_LOG=pipebench=debug pipebench
//! ```
//!
//! Settings are read from `$PIPEBENCH_CONFIG`, `./pipebench.toml` or
//! `<config dir>/pipebench/config.toml`.

use anyhow::Context;
use colored::*;
use pipebench::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pipebench=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!("{:#}", e);
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    info!("Done");
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    info!(
        "🔌 {}:{}/{} as {}, pool size {}",
        settings.host, settings.port, settings.database, settings.user, settings.pool_size
    );

    let pools = pipebench::pg::connect(PoolSetConfig::from_settings(&settings))
        .context("building connection pools")?;
    let driver = BenchmarkDriver::new(pools, Dataset::default(), BenchParams::default());

    let outcome = driver.run().await;
    driver.close();

    let report = outcome.context("benchmark aborted")?;
    pipebench::report::print(&report);
    Ok(())
}
