//! Prometheus implementation of the metrics interface.

pub mod api;
pub mod client;
pub mod decode;

pub use api::{PrometheusApi, QueryApi, QueryRange, QueryValue, ValueType};
pub use client::PrometheusMetrics;
pub use decode::{decode_scalar, decode_series};
