//! Reduction of per-run durations.

use crate::error::{BenchError, BenchResult};
use std::time::Duration;

/// Arithmetic mean of `samples`. An empty slice is `BenchError::NoSamples`.
pub fn mean(samples: &[Duration]) -> BenchResult<Duration> {
    if samples.is_empty() {
        return Err(BenchError::NoSamples);
    }
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let avg = total / samples.len() as u128;
    Ok(Duration::from_nanos(avg as u64))
}
