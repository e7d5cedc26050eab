//! Turns raw query results into integers and series.
//!
//! Decoding is strict: an instant query must yield exactly one vector element
//! and a range query exactly one matrix row. Anything else is a shape error;
//! there is no averaging, picking or interpolation across multiple results.

use super::api::{QueryValue, ValueType};
use crate::metrics::{MetricsError, Point, Result, Series};

/// Decode the single value of an instant query
pub fn decode_scalar(value: &QueryValue) -> Result<i64> {
    let QueryValue::Vector(samples) = value else {
        return Err(MetricsError::shape(
            format!("expected {}", ValueType::Vector),
            value.value_type().to_string(),
            value.to_string(),
        ));
    };

    match samples.as_slice() {
        [sample] => Ok(truncate(sample.value.value)),
        _ => Err(MetricsError::shape(
            format!("expected single-element vector, got {} elements", samples.len()),
            ValueType::Vector.to_string(),
            value.to_string(),
        )),
    }
}

/// Decode the single row of a range query, keeping the backend's sample order
pub fn decode_series(value: &QueryValue) -> Result<Series> {
    let QueryValue::Matrix(rows) = value else {
        return Err(MetricsError::shape(
            format!("expected {}", ValueType::Matrix),
            value.value_type().to_string(),
            value.to_string(),
        ));
    };

    match rows.as_slice() {
        [row] => Ok(Series::from_backend_order(
            row.values
                .iter()
                .map(|sample| Point::new(sample.timestamp, truncate(sample.value)))
                .collect(),
        )),
        _ => Err(MetricsError::shape(
            format!("expected single-element matrix, got {} rows", rows.len()),
            ValueType::Matrix.to_string(),
            value.to_string(),
        )),
    }
}

/// Drop the fractional part of a sample value.
///
/// Truncates toward zero, never rounds. Out of range values saturate and
/// NaN becomes zero.
pub fn truncate(value: f64) -> i64 {
    value.trunc() as i64
}
