//! In-memory backend for tests.
//!
//! Simulates the single benchmark table, records every statement, counts
//! acquire/release calls, prepares and how many lookups overlap. Pools hand
//! out at most `max_size` connections and queue the rest.

use crate::config::PoolConfig;
use crate::error::{BenchError, BenchResult};
use crate::pool::{Connection, Pool};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Default)]
struct State {
    table: Option<BTreeSet<i64>>,
    statements: Vec<String>,
    fail_on: Vec<String>,
    fail_key: Option<i64>,
    duplicate_key: Option<i64>,
    latency: Duration,
    in_flight: usize,
    max_in_flight: usize,
    lookups: usize,
    prepares: usize,
}

/// Shared database state behind every mock pool.
#[derive(Clone, Default)]
pub struct MockDb {
    state: Arc<Mutex<State>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `fragment`.
    pub fn fail_on(&self, fragment: &str) {
        self.lock().fail_on.push(fragment.to_string());
    }

    /// Fail the lookup of one key.
    pub fn fail_key(&self, key: i64) {
        self.lock().fail_key = Some(key);
    }

    /// Return the row for `key` twice.
    pub fn duplicate_key(&self, key: i64) {
        self.lock().duplicate_key = Some(key);
    }

    /// Delay every lookup by `latency`.
    pub fn latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Create the table directly, bypassing the statement log.
    pub fn seed(&self, row_count: i64) {
        self.lock().table = Some((1..=row_count).collect());
    }

    /// Remove a row directly, bypassing the statement log.
    pub fn remove(&self, key: i64) {
        if let Some(table) = self.lock().table.as_mut() {
            table.remove(&key);
        }
    }

    pub fn table_exists(&self) -> bool {
        self.lock().table.is_some()
    }

    /// Every statement except point lookups.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn lookups(&self) -> usize {
        self.lock().lookups
    }

    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Parse round trips sent for lookups, across all connections.
    pub fn prepares(&self) -> usize {
        self.lock().prepares
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn check(state: &State, sql: &str) -> BenchResult<()> {
        match state.fail_on.iter().find(|f| sql.contains(f.as_str())) {
            Some(f) => Err(BenchError::query(format!("injected failure on '{}'", f))),
            None => Ok(()),
        }
    }

    fn run_statement(&self, sql: &str, values: &[i64]) -> BenchResult<u64> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        Self::check(&state, sql)?;

        if sql.starts_with("DROP TABLE IF EXISTS") {
            state.table = None;
            Ok(0)
        } else if sql.starts_with("CREATE TABLE") {
            if state.table.is_some() {
                return Err(BenchError::query("relation already exists"));
            }
            state.table = Some(BTreeSet::new());
            Ok(0)
        } else if sql.starts_with("INSERT") {
            let table = state
                .table
                .as_mut()
                .ok_or_else(|| BenchError::query("relation does not exist"))?;
            for value in values {
                if !table.insert(*value) {
                    return Err(BenchError::query("duplicate key value"));
                }
            }
            Ok(values.len() as u64)
        } else {
            Err(BenchError::query(format!("unsupported statement: {}", sql)))
        }
    }

    fn count(&self, sql: &str) -> BenchResult<Vec<i64>> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        Self::check(&state, sql)?;
        let table = state
            .table
            .as_ref()
            .ok_or_else(|| BenchError::query("relation does not exist"))?;
        Ok(vec![table.len() as i64])
    }

    async fn lookup(&self, sql: &str, key: i64) -> BenchResult<Vec<i64>> {
        let latency = {
            let mut state = self.lock();
            Self::check(&state, sql)?;
            state.lookups += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.in_flight -= 1;
        if state.fail_key == Some(key) {
            return Err(BenchError::query(format!("injected failure on key {}", key)));
        }
        let table = state
            .table
            .as_ref()
            .ok_or_else(|| BenchError::query("relation does not exist"))?;
        let mut rows: Vec<i64> = table.get(&key).copied().into_iter().collect();
        if state.duplicate_key == Some(key) {
            rows.extend(rows.clone());
        }
        Ok(rows)
    }
}

/// A connection honouring its pool's pipelining depth.
pub struct MockConn {
    db: MockDb,
    gate: Option<Semaphore>,
    cache_statements: bool,
    cached: Mutex<HashSet<String>>,
    _slot: OwnedSemaphorePermit,
}

impl MockConn {
    /// Like the real client cache: a miss awaits the server before the
    /// statement is stored, so concurrent misses each send a Parse.
    async fn prepare_statement(&self, sql: &str) {
        if self.cache_statements && self.cached.lock().unwrap().contains(sql) {
            return;
        }
        self.db.lock().prepares += 1;
        tokio::task::yield_now().await;
        if self.cache_statements {
            self.cached.lock().unwrap().insert(sql.to_string());
        }
    }

    async fn permit(&self) -> BenchResult<Option<tokio::sync::SemaphorePermit<'_>>> {
        match &self.gate {
            Some(gate) => Ok(Some(gate.acquire().await.map_err(BenchError::query)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Connection for MockConn {
    async fn execute(&self, sql: &str) -> BenchResult<u64> {
        self.db.run_statement(sql, &[])
    }

    async fn execute_bulk(&self, sql: &str, values: &[i64]) -> BenchResult<u64> {
        self.db.run_statement(sql, values)
    }

    async fn prepare(&self, sql: &str) -> BenchResult<()> {
        if self.cache_statements {
            let _permit = self.permit().await?;
            self.prepare_statement(sql).await;
        }
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[i64]) -> BenchResult<Vec<i64>> {
        match params.first() {
            None => self.db.count(sql),
            Some(key) => {
                let _permit = self.permit().await?;
                self.prepare_statement(sql).await;
                self.db.lookup(sql, *key).await
            }
        }
    }
}

/// A pool that counts acquire and release calls.
pub struct MockPool {
    db: MockDb,
    config: PoolConfig,
    slots: Arc<Semaphore>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    checked_out: AtomicUsize,
    max_checked_out: AtomicUsize,
    closed: AtomicBool,
    fail_acquire: AtomicBool,
}

impl MockPool {
    pub fn new(db: MockDb, config: PoolConfig) -> Self {
        Self {
            db,
            slots: Arc::new(Semaphore::new(config.max_size)),
            config,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            checked_out: AtomicUsize::new(0),
            max_checked_out: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            fail_acquire: AtomicBool::new(false),
        }
    }

    pub fn fail_acquire(&self) {
        self.fail_acquire.store(true, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Most connections ever checked out at the same time.
    pub fn max_checked_out(&self) -> usize {
        self.max_checked_out.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pool for MockPool {
    type Conn = MockConn;

    fn config(&self) -> &PoolConfig {
        &self.config
    }

    async fn acquire(&self) -> BenchResult<MockConn> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BenchError::Acquisition("pool is closed".into()));
        }
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(BenchError::Acquisition("connection refused".into()));
        }
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BenchError::Acquisition(e.to_string()))?;

        self.acquired.fetch_add(1, Ordering::SeqCst);
        let out = self.checked_out.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_checked_out.fetch_max(out, Ordering::SeqCst);
        Ok(MockConn {
            db: self.db.clone(),
            gate: self.config.pipelining.limit().map(Semaphore::new),
            cache_statements: self.config.cache_statements,
            cached: Mutex::new(HashSet::new()),
            _slot: slot,
        })
    }

    fn release(&self, conn: MockConn) {
        // Dropping the slot permit wakes the next queued acquire.
        drop(conn);
        self.checked_out.fetch_sub(1, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
