use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::metrics::{BackendError, MetricsError, Result};

/// Declared type of a query result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Scalar,
    String,
    Vector,
    Matrix,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Scalar => "scalar",
            ValueType::String => "string",
            ValueType::Vector => "vector",
            ValueType::Matrix => "matrix",
        };
        f.write_str(name)
    }
}

/// A `[timestamp, "value"]` pair as sent by the backend
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, String)")]
pub struct SamplePair {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TryFrom<(f64, String)> for SamplePair {
    type Error = String;

    fn try_from((timestamp, value): (f64, String)) -> std::result::Result<Self, Self::Error> {
        let timestamp = timestamp_from_unix(timestamp)
            .ok_or_else(|| format!("invalid sample timestamp {timestamp}"))?;
        // Accepts "NaN", "+Inf" and "-Inf" as well
        let value = value
            .parse::<f64>()
            .map_err(|e| format!("invalid sample value {value:?}: {e}"))?;
        Ok(Self { timestamp, value })
    }
}

/// A `[timestamp, "text"]` pair, the payload of a string result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StringSample(pub f64, pub String);

/// One element of an instant vector
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorSample {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub value: SamplePair,
}

/// One row of a range matrix
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub values: Vec<SamplePair>,
}

/// Raw result of a query, tagged with its declared type
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryValue {
    Scalar(SamplePair),
    String(StringSample),
    Vector(Vec<VectorSample>),
    Matrix(Vec<RangeSeries>),
}

impl QueryValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            QueryValue::Scalar(_) => ValueType::Scalar,
            QueryValue::String(_) => ValueType::String,
            QueryValue::Vector(_) => ValueType::Vector,
            QueryValue::Matrix(_) => ValueType::Matrix,
        }
    }
}

struct Labels<'a>(&'a BTreeMap<String, String>);

impl fmt::Display for Labels<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value:?}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for SamplePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @[{}]", self.value, self.timestamp.timestamp_millis())
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Scalar(sample) => write!(f, "scalar: {sample}"),
            QueryValue::String(StringSample(ts, text)) => write!(f, "string: {text:?} @[{ts}]"),
            QueryValue::Vector(samples) => {
                let lines: Vec<String> = samples
                    .iter()
                    .map(|s| format!("{} => {}", Labels(&s.metric), s.value))
                    .collect();
                write!(f, "[{}]", lines.join(", "))
            }
            QueryValue::Matrix(rows) => {
                let lines: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let values: Vec<String> = row.values.iter().map(ToString::to_string).collect();
                        format!("{} => [{}]", Labels(&row.metric), values.join(", "))
                    })
                    .collect();
                write!(f, "[{}]", lines.join(", "))
            }
        }
    }
}

/// Time range and resolution of a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

/// Query endpoints of a Prometheus-compatible backend
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Evaluate an instant query, at `time` or at the backend's current time
    async fn query(&self, query: &str, time: Option<DateTime<Utc>>) -> Result<QueryValue>;

    /// Evaluate a query over a range of time
    async fn query_range(&self, query: &str, range: &QueryRange) -> Result<QueryValue>;
}

/// Envelope wrapped around every API answer
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    data: Option<QueryValue>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// HTTP client for the Prometheus v1 query API
#[derive(Debug, Clone)]
pub struct PrometheusApi {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl PrometheusApi {
    /// Creates a client for the backend at `address` (`host:port` or URL)
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let base = parse_address(address)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Transport)?;
        debug!("Prometheus API client for {} (timeout {:?})", base, timeout);
        Ok(Self { http, base, timeout })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<QueryValue> {
        let url = self
            .base
            .join(path)
            .map_err(|e| MetricsError::BadParameter(format!("invalid endpoint {path}: {e}")))?;

        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        decode_response(status, &body)
    }

    fn transport_error(&self, err: reqwest::Error) -> MetricsError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout).into()
        } else {
            BackendError::Transport(err).into()
        }
    }
}

#[async_trait]
impl QueryApi for PrometheusApi {
    async fn query(&self, query: &str, time: Option<DateTime<Utc>>) -> Result<QueryValue> {
        let mut params = vec![("query", query.to_string())];
        if let Some(time) = time {
            params.push(("time", format_timestamp(time)));
        }
        self.get("api/v1/query", &params).await
    }

    async fn query_range(&self, query: &str, range: &QueryRange) -> Result<QueryValue> {
        let params = [
            ("query", query.to_string()),
            ("start", format_timestamp(range.start)),
            ("end", format_timestamp(range.end)),
            ("step", range.step.as_secs_f64().to_string()),
        ];
        self.get("api/v1/query_range", &params).await
    }
}

/// Unwrap the response envelope into the query result
pub(crate) fn decode_response(status: u16, body: &str) -> Result<QueryValue> {
    let envelope: ApiResponse = serde_json::from_str(body).map_err(|e| BackendError::Malformed {
        status,
        reason: e.to_string(),
    })?;

    for warning in &envelope.warnings {
        debug!("Metrics backend warning: {}", warning);
    }

    match envelope.status.as_str() {
        "success" => envelope.data.ok_or_else(|| {
            BackendError::Malformed {
                status,
                reason: "successful response carries no data".to_string(),
            }
            .into()
        }),
        "error" => Err(BackendError::Api {
            error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: envelope.error.unwrap_or_default(),
        }
        .into()),
        other => Err(BackendError::Malformed {
            status,
            reason: format!("unknown response status {other:?}"),
        }
        .into()),
    }
}

/// Normalise a backend address into a base URL ending with `/`
pub fn parse_address(address: &str) -> Result<Url> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(MetricsError::BadParameter("backend address is empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| MetricsError::BadParameter(format!("invalid backend address {address:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(MetricsError::BadParameter(format!(
            "unsupported scheme {:?} in backend address",
            url.scheme()
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn format_timestamp(time: DateTime<Utc>) -> String {
    format!("{:.3}", time.timestamp_millis() as f64 / 1000.0)
}

fn timestamp_from_unix(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((secs * 1000.0).round() as i64).single()
}
