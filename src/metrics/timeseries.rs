use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::MetricsError;

/// A single data point in a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub value: i64,
}

impl Point {
    pub fn new(time: DateTime<Utc>, value: i64) -> Self {
        Self { time, value }
    }
}

/// An ordered run of samples, oldest first.
///
/// A series is never modified once built. Consumers that only want part of it
/// take a copy with [`Series::tail`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Series {
    points: Vec<Point>,
}

impl Series {
    /// Create an empty series
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from points, rejecting out-of-order or duplicate timestamps
    pub fn from_points(points: Vec<Point>) -> Result<Self, MetricsError> {
        if let Some(pair) = points.windows(2).find(|pair| pair[0].time >= pair[1].time) {
            return Err(MetricsError::BadParameter(format!(
                "series points must have strictly ascending timestamps: {} is followed by {}",
                pair[0].time, pair[1].time
            )));
        }
        Ok(Self { points })
    }

    /// Build a series in the order the backend returned the samples
    pub(crate) fn from_backend_order(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get the earliest data point
    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    /// Get the latest data point
    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Highest value in the series
    pub fn max_value(&self) -> Option<i64> {
        self.points.iter().map(|p| p.value).max()
    }

    /// Copy the newest `n` points into a new series
    pub fn tail(&self, n: usize) -> Series {
        let start = self.points.len().saturating_sub(n);
        Series {
            points: self.points[start..].to_vec(),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
