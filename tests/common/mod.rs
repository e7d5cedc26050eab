#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clustertop::metrics::{BackendError, Metrics, MetricsError, Point, Result, Series};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Metrics double with a fixed answer, a per-call delay and call accounting
pub struct MockMetrics {
    delay: Duration,
    failing_batches: AtomicUsize,
    misshapen_batches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

/// Decrements the in-flight counter when a call finishes or is abandoned
struct CallGuard<'a>(&'a AtomicUsize);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockMetrics {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failing_batches: AtomicUsize::new(0),
            misshapen_batches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the total CPU query of the first `n` batches
    pub fn failing_first(self, n: usize) -> Self {
        self.failing_batches.store(n, Ordering::SeqCst);
        self
    }

    /// Answer the CPU rate of the first `n` batches with a two-row matrix
    pub fn misshapen_first(self, n: usize) -> Self {
        self.misshapen_batches.store(n, Ordering::SeqCst);
        self
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer<T>(&self, value: T) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = CallGuard(&self.in_flight);

        tokio::time::sleep(self.delay).await;
        Ok(value)
    }
}

/// Decrement `counter` unless it is already zero
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub fn series(end: DateTime<Utc>, values: &[i64]) -> Series {
    let points = values
        .iter()
        .enumerate()
        .map(|(i, v)| Point::new(end - chrono::Duration::seconds((values.len() - i) as i64), *v))
        .collect();
    Series::from_points(points).unwrap()
}

#[async_trait]
impl Metrics for MockMetrics {
    async fn total_cpu(&self) -> Result<i64> {
        if take_one(&self.failing_batches) {
            return Err(BackendError::Api {
                error_type: "execution".to_string(),
                message: "query timed out in expression evaluation".to_string(),
            }
            .into());
        }
        self.answer(8).await
    }

    async fn total_memory(&self) -> Result<i64> {
        self.answer(32_000_000_000).await
    }

    async fn cpu_rate(&self, _start: DateTime<Utc>, end: DateTime<Utc>, _step: Duration) -> Result<Series> {
        let series = self.answer(series(end, &[10, 20, 30])).await?;
        if take_one(&self.misshapen_batches) {
            return Err(MetricsError::shape(
                "expected single-element matrix, got 2 rows",
                "matrix",
                "{} => 10 @[0]\n{} => 11 @[0]",
            ));
        }
        Ok(series)
    }

    async fn memory_rate(&self, _start: DateTime<Utc>, end: DateTime<Utc>, _step: Duration) -> Result<Series> {
        self.answer(series(end, &[40, 50])).await
    }

    async fn current_cpu_rate(&self) -> Result<i64> {
        self.answer(30).await
    }

    async fn current_memory_rate(&self) -> Result<i64> {
        self.answer(50).await
    }

    async fn max_cpu_rate(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<i64> {
        self.answer(90).await
    }

    async fn max_memory_rate(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<i64> {
        self.answer(60).await
    }
}
