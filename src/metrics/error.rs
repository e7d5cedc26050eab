use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetricsError>;

/// Errors returned by metrics queries.
///
/// `Backend` failures are worth retrying on the next poll. `Shape` failures
/// mean the query answered with something this client cannot interpret, and
/// asking again will most likely produce the same answer.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("bad parameter: {0}")]
    BadParameter(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{reason}: {found} {raw}")]
    Shape {
        reason: String,
        found: String,
        raw: String,
    },

    #[error("{0} is not supported by this metrics backend")]
    Unsupported(&'static str),
}

impl MetricsError {
    pub fn shape(reason: impl Into<String>, found: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Shape {
            reason: reason.into(),
            found: found.into(),
            raw: raw.into(),
        }
    }

    /// Whether the same request might succeed on a later tick
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Failures talking to the metrics backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to metrics backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metrics backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("metrics backend returned {error_type} error: {message}")]
    Api { error_type: String, message: String },

    #[error("malformed response from metrics backend (HTTP {status}): {reason}")]
    Malformed { status: u16, reason: String },
}
