use chrono::{DateTime, Utc};
use serde::Serialize;

use super::timeseries::Series;

/// Everything collected during one poll tick.
///
/// Built only when all eight queries of the tick succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub total_cpu: i64,
    pub total_memory_bytes: i64,
    pub current_cpu_percent: i64,
    pub max_cpu_percent: i64,
    pub cpu_rate: Series,
    pub current_memory_percent: i64,
    pub max_memory_percent: i64,
    pub memory_rate: Series,
    pub observed_at: DateTime<Utc>,
}
