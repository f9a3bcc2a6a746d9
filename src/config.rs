//! Benchmark configuration.
//!
//! Connection settings come from a TOML file plus `PG_*` environment
//! overrides. Dataset and sample sizes are compiled-in constants, gathered
//! in [`Dataset`] and [`BenchParams`] so tests can shrink them.

use crate::error::{BenchError, BenchResult};
use serde::Deserialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TABLE: &str = "huge";
pub const COLUMN: &str = "the_column";
pub const ROW_COUNT: i64 = 100_000;
pub const PIPELINING_SAMPLE: usize = 5_000;
pub const REPEAT_SAMPLE: usize = 100;
pub const REPEATS: usize = 100;

/// Env var naming an explicit settings file.
pub const CONFIG_ENV: &str = "PIPEBENCH_CONFIG";
const LOCAL_CONFIG: &str = "pipebench.toml";

/// How many requests one connection may have outstanding on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipelining {
    Depth(NonZeroUsize),
    Unbounded,
}

impl Pipelining {
    /// Depth 1: every lookup waits for the previous response.
    pub fn disabled() -> Self {
        Self::Depth(NonZeroUsize::MIN)
    }

    /// Maximum in-flight requests, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Depth(n) => Some(n.get()),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for Pipelining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Depth(n) => write!(f, "{}", n),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Connection and sizing parameters for one pool.
///
/// Owned by the pool built from it; pools only hand out shared references,
/// so depth and size are fixed once a pool exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub pipelining: Pipelining,
    pub cache_statements: bool,
    pub max_size: usize,
    pub acquire_timeout: Option<Duration>,
}

impl PoolConfig {
    /// Create a pool configuration with one connection and unbounded pipelining.
    pub fn new(host: &str, port: u16, user: &str, database: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: None,
            database: database.to_string(),
            pipelining: Pipelining::Unbounded,
            cache_statements: true,
            max_size: 1,
            acquire_timeout: None,
        }
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn pipelining(mut self, pipelining: Pipelining) -> Self {
        self.pipelining = pipelining;
        self
    }

    pub fn cache_statements(mut self, enabled: bool) -> Self {
        self.cache_statements = enabled;
        self
    }

    pub fn max_size(mut self, max: usize) -> Self {
        self.max_size = max;
        self
    }

    /// Bound the wait for a free connection. Unset means wait forever.
    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// The benchmark table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub table: String,
    pub column: String,
    pub row_count: i64,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            table: TABLE.to_string(),
            column: COLUMN.to_string(),
            row_count: ROW_COUNT,
        }
    }
}

impl Dataset {
    pub fn new(table: &str, column: &str, row_count: i64) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            row_count,
        }
    }

    /// Keys stored in the table: `1..=row_count`.
    pub fn keys(&self) -> Vec<i64> {
        (1..=self.row_count).collect()
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table)
    }

    pub fn create_sql(&self) -> String {
        format!("CREATE TABLE {} ({} BIGINT PRIMARY KEY)", self.table, self.column)
    }

    /// Bulk insert binding every key as a single `BIGINT[]` parameter.
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} ({}) SELECT * FROM UNNEST($1::BIGINT[])",
            self.table, self.column
        )
    }

    pub fn count_sql(&self) -> String {
        format!("SELECT count(*) FROM {}", self.table)
    }

    pub fn lookup_sql(&self) -> String {
        format!(
            "SELECT {col} FROM {table} WHERE {col} = $1",
            col = self.column,
            table = self.table
        )
    }
}

/// Sample sizes of the three scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchParams {
    /// Batch size of the unit comparison (`P`).
    pub pipelining_sample: usize,
    /// Batch size of both repeat scenarios (`C`).
    pub repeat_sample: usize,
    /// Runs per repeat scenario (`R`).
    pub repeats: usize,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            pipelining_sample: PIPELINING_SAMPLE,
            repeat_sample: REPEAT_SAMPLE,
            repeats: REPEATS,
        }
    }
}

/// Connection settings shared by the three pools.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    /// Size of the two benchmarking pools (`N`).
    pub pool_size: usize,
    pub cache_statements: bool,
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: Some("mysecretpassword".to_string()),
            database: "postgres".to_string(),
            pool_size: 10,
            cache_statements: true,
            acquire_timeout_ms: None,
        }
    }
}

impl Settings {
    /// Load settings from the first file found, then apply `PG_*` overrides.
    ///
    /// Lookup order: `$PIPEBENCH_CONFIG`, `./pipebench.toml`,
    /// `<config dir>/pipebench/config.toml`. No file means defaults.
    pub fn load() -> BenchResult<Self> {
        let mut settings = match Self::locate() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("pipebench").join("config.toml"))
            .filter(|path| path.exists())
    }

    pub fn from_file(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| BenchError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> BenchResult<Self> {
        toml::from_str(content).map_err(|e| BenchError::Config(e.to_string()))
    }

    /// Override fields from `PG_HOST`, `PG_PORT`, `PG_USER`, `PG_PASSWORD`, `PG_DATABASE`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> BenchResult<()> {
        if let Some(host) = lookup("PG_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PG_PORT") {
            self.port = port
                .parse()
                .map_err(|_| BenchError::Config(format!("PG_PORT is not a port: '{}'", port)))?;
        }
        if let Some(user) = lookup("PG_USER") {
            self.user = user;
        }
        if let Some(password) = lookup("PG_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(database) = lookup("PG_DATABASE") {
            self.database = database;
        }
        Ok(())
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.pool_size == 0 {
            return Err(BenchError::Config("pool_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Base pool configuration carrying the connection fields of these settings.
    pub fn pool_config(&self) -> PoolConfig {
        let config = PoolConfig::new(&self.host, self.port, &self.user, &self.database)
            .cache_statements(self.cache_statements)
            .acquire_timeout(self.acquire_timeout_ms.map(Duration::from_millis));
        match &self.password {
            Some(password) => config.password(password),
            None => config,
        }
    }
}
