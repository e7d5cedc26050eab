use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use super::api::{PrometheusApi, QueryApi, QueryRange};
use super::decode::{decode_scalar, decode_series};
use crate::metrics::{
    validate_range, validate_window, Metrics, Result, Series, QUERY_CPU_RATE, QUERY_MEMORY_RATE,
    QUERY_TOTAL_CPU, QUERY_TOTAL_MEMORY,
};

/// Cluster metrics read from the recording rules of an in-cluster Prometheus
#[derive(Debug, Clone)]
pub struct PrometheusMetrics<A = PrometheusApi> {
    api: A,
}

impl PrometheusMetrics<PrometheusApi> {
    /// Creates a Prometheus-backed metrics client
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::with_api(PrometheusApi::new(address, timeout)?))
    }
}

impl<A: QueryApi> PrometheusMetrics<A> {
    pub fn with_api(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn instant(&self, query: &str, time: Option<DateTime<Utc>>) -> Result<i64> {
        debug!("Instant query: {}", query);
        let value = self.api.query(query, time).await?;
        decode_scalar(&value)
    }

    async fn range(&self, query: &str, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<Series> {
        validate_range(start, end, step)?;
        debug!("Range query: {} [{} .. {}] step {:?}", query, start, end, step);
        let value = self.api.query_range(query, &QueryRange { start, end, step }).await?;
        decode_series(&value)
    }

    async fn peak(&self, query: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        validate_window(start, end)?;
        self.instant(&max_over_time(query, end - start), Some(end)).await
    }
}

#[async_trait]
impl<A: QueryApi> Metrics for PrometheusMetrics<A> {
    async fn total_cpu(&self) -> Result<i64> {
        self.instant(QUERY_TOTAL_CPU, None).await
    }

    async fn total_memory(&self) -> Result<i64> {
        self.instant(QUERY_TOTAL_MEMORY, None).await
    }

    async fn cpu_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<Series> {
        self.range(QUERY_CPU_RATE, start, end, step).await
    }

    async fn memory_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<Series> {
        self.range(QUERY_MEMORY_RATE, start, end, step).await
    }

    async fn current_cpu_rate(&self) -> Result<i64> {
        self.instant(QUERY_CPU_RATE, None).await
    }

    async fn current_memory_rate(&self) -> Result<i64> {
        self.instant(QUERY_MEMORY_RATE, None).await
    }

    async fn max_cpu_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        self.peak(QUERY_CPU_RATE, start, end).await
    }

    async fn max_memory_rate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        self.peak(QUERY_MEMORY_RATE, start, end).await
    }
}

/// Wrap `query` so it yields its highest value over the trailing `window`
fn max_over_time(query: &str, window: chrono::Duration) -> String {
    let millis = window.num_milliseconds();
    let range = if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    };
    format!("max_over_time({query}[{range}])")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsError;
    use crate::prometheus::api::QueryValue;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every request and answers with a canned result
    struct RecordingApi {
        answer: QueryValue,
        calls: Mutex<Vec<(String, Option<DateTime<Utc>>, Option<QueryRange>)>>,
    }

    impl RecordingApi {
        fn new(answer: serde_json::Value) -> Self {
            Self {
                answer: serde_json::from_value(answer).unwrap(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Option<DateTime<Utc>>, Option<QueryRange>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryApi for RecordingApi {
        async fn query(&self, query: &str, time: Option<DateTime<Utc>>) -> Result<QueryValue> {
            self.calls.lock().unwrap().push((query.to_string(), time, None));
            Ok(self.answer.clone())
        }

        async fn query_range(&self, query: &str, range: &QueryRange) -> Result<QueryValue> {
            self.calls.lock().unwrap().push((query.to_string(), None, Some(*range)));
            Ok(self.answer.clone())
        }
    }

    fn single_vector(value: &str) -> serde_json::Value {
        json!({"resultType": "vector", "result": [{"metric": {}, "value": [1700000000, value]}]})
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_total_cpu_uses_instant_query() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("4")));

        assert_eq!(metrics.total_cpu().await.unwrap(), 4);
        let calls = metrics.api().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, QUERY_TOTAL_CPU);
        assert!(calls[0].1.is_none());
    }

    #[tokio::test]
    async fn test_total_memory_is_queried() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("17179869184")));

        assert_eq!(metrics.total_memory().await.unwrap(), 17_179_869_184);
        assert_eq!(metrics.api().calls()[0].0, QUERY_TOTAL_MEMORY);
    }

    #[tokio::test]
    async fn test_current_rates_query_rate_rules() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("37.8")));

        assert_eq!(metrics.current_cpu_rate().await.unwrap(), 37);
        assert_eq!(metrics.current_memory_rate().await.unwrap(), 37);
        let queries: Vec<String> = metrics.api().calls().into_iter().map(|c| c.0).collect();
        assert_eq!(queries, vec![QUERY_CPU_RATE, QUERY_MEMORY_RATE]);
    }

    #[tokio::test]
    async fn test_max_rate_evaluates_window_at_end() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("91.2")));

        assert_eq!(metrics.max_cpu_rate(at(0), at(3600)).await.unwrap(), 91);
        assert_eq!(metrics.max_memory_rate(at(0), at(90)).await.unwrap(), 91);

        let calls = metrics.api().calls();
        assert_eq!(calls[0].0, "max_over_time(cluster:cpu_usage_rate[3600s])");
        assert_eq!(calls[0].1, Some(at(3600)));
        assert_eq!(calls[1].0, "max_over_time(cluster:memory_usage_rate[90s])");
    }

    #[tokio::test]
    async fn test_max_rate_empty_window_never_reaches_backend() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("1")));

        let err = metrics.max_cpu_rate(at(10), at(10)).await.unwrap_err();
        assert!(matches!(err, MetricsError::BadParameter(_)));
        let err = metrics.max_memory_rate(at(10), at(0)).await.unwrap_err();
        assert!(matches!(err, MetricsError::BadParameter(_)));
        assert!(metrics.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_rate_series_uses_range_query() {
        let answer = json!({"resultType": "matrix", "result": [
            {"metric": {}, "values": [[1700000000, "12.7"], [1700000015, "13.2"]]}
        ]});
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(answer));
        let step = Duration::from_secs(15);

        let series = metrics.cpu_rate(at(0), at(15), step).await.unwrap();
        assert_eq!(series.iter().map(|p| p.value).collect::<Vec<_>>(), vec![12, 13]);

        let calls = metrics.api().calls();
        assert_eq!(calls[0].0, QUERY_CPU_RATE);
        assert_eq!(calls[0].2, Some(QueryRange { start: at(0), end: at(15), step }));
    }

    #[tokio::test]
    async fn test_rate_bad_parameters_never_reach_backend() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("1")));

        let err = metrics.memory_rate(at(60), at(0), Duration::from_secs(15)).await.unwrap_err();
        assert!(matches!(err, MetricsError::BadParameter(_)));
        let err = metrics.cpu_rate(at(0), at(60), Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, MetricsError::BadParameter(_)));
        assert!(metrics.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_rate_with_vector_answer_is_shape_error() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("1")));

        let err = metrics.cpu_rate(at(0), at(60), Duration::from_secs(15)).await.unwrap_err();
        assert!(matches!(err, MetricsError::Shape { .. }));
    }

    #[tokio::test]
    async fn test_max_rate_sub_millisecond_window_never_reaches_backend() {
        let metrics = PrometheusMetrics::with_api(RecordingApi::new(single_vector("1")));
        let end = at(0) + chrono::Duration::microseconds(300);

        let err = metrics.max_cpu_rate(at(0), end).await.unwrap_err();
        assert!(matches!(err, MetricsError::BadParameter(_)));
        assert!(metrics.api().calls().is_empty());
    }

    #[test]
    fn test_max_over_time_sub_second_window() {
        assert_eq!(
            max_over_time("up", chrono::Duration::milliseconds(1500)),
            "max_over_time(up[1500ms])"
        );
    }
}
