//! Cluster metrics model and the backend-agnostic query interface.

pub mod error;
pub mod snapshot;
pub mod timeseries;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub use error::{BackendError, MetricsError, Result};
pub use snapshot::Snapshot;
pub use timeseries::{Point, Series};

/// Recording rule holding the number of CPU cores in the cluster
pub const QUERY_TOTAL_CPU: &str = "cluster:cpu_total";
/// Recording rule holding the amount of RAM in the cluster, in bytes
pub const QUERY_TOTAL_MEMORY: &str = "cluster:memory_total_bytes";
/// Recording rule holding cluster CPU usage in percent
pub const QUERY_CPU_RATE: &str = "cluster:cpu_usage_rate";
/// Recording rule holding cluster RAM usage in percent
pub const QUERY_MEMORY_RATE: &str = "cluster:memory_usage_rate";

/// Cluster-wide resource metrics.
///
/// Any backend able to answer these eight queries can drive the poller.
/// Implementations hold no mutable state and are shared between the
/// concurrent queries of a poll tick. Dropping a returned future abandons the
/// request.
#[async_trait]
pub trait Metrics: Send + Sync {
    /// Total number of CPU cores in the cluster
    async fn total_cpu(&self) -> Result<i64>;

    /// Total amount of RAM in the cluster in bytes
    async fn total_memory(&self) -> Result<i64>;

    /// CPU usage rate sampled every `step` over `[start, end]`
    async fn cpu_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<Series>;

    /// RAM usage rate sampled every `step` over `[start, end]`
    async fn memory_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<Series>;

    /// Instantaneous CPU usage rate
    async fn current_cpu_rate(&self) -> Result<i64>;

    /// Instantaneous RAM usage rate
    async fn current_memory_rate(&self) -> Result<i64>;

    /// Highest CPU usage rate within `[start, end]`
    async fn max_cpu_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64>;

    /// Highest RAM usage rate within `[start, end]`
    async fn max_memory_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64>;
}

/// Check the arguments of a range query before anything goes on the wire
pub fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<()> {
    if start > end {
        return Err(MetricsError::BadParameter(format!(
            "range start {start} is after end {end}"
        )));
    }
    if step.is_zero() {
        return Err(MetricsError::BadParameter("step must be greater than zero".to_string()));
    }
    Ok(())
}

/// Check the window of a peak query. The window must span at least one
/// millisecond, the finest range a query selector can express.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(MetricsError::BadParameter(format!(
            "peak window [{start}, {end}] is empty"
        )));
    }
    if (end - start).num_milliseconds() < 1 {
        return Err(MetricsError::BadParameter(format!(
            "peak window [{start}, {end}] is shorter than 1ms"
        )));
    }
    Ok(())
}
