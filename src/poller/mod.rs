//! Periodic refresh loop feeding snapshots to the display.
//!
//! Each tick issues the eight metric queries concurrently and publishes a
//! [`Snapshot`] only when all of them succeed. Ticks never overlap: the next
//! batch starts only after the previous one finished, failed or was abandoned.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{BackendError, Metrics, MetricsError, Result, Snapshot};

/// Where the poller is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Cancelled,
}

/// Timing of the refresh loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between two ticks
    pub interval: Duration,
    /// Width of the history window shown for rates and peaks
    pub range: Duration,
    /// Resolution of the rate series
    pub step: Duration,
    /// Upper bound for one batch of queries
    pub timeout: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            range: Duration::from_secs(3600),
            step: Duration::from_secs(15),
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Counters reported when the poller stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub published: u64,
    pub dropped: u64,
}

pub struct Poller<M: ?Sized> {
    metrics: Arc<M>,
    config: PollerConfig,
    state: PollerState,
    last_observed: Option<DateTime<Utc>>,
    stats: PollStats,
}

impl<M: Metrics + ?Sized> Poller<M> {
    pub fn new(metrics: Arc<M>, config: PollerConfig) -> Self {
        Self {
            metrics,
            config,
            state: PollerState::Idle,
            last_observed: None,
            stats: PollStats::default(),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run one batch of queries ending at `observed_at`
    pub async fn poll_once(&self, observed_at: DateTime<Utc>) -> Result<Snapshot> {
        let range = chrono::Duration::from_std(self.config.range)
            .map_err(|e| MetricsError::BadParameter(format!("query range too large: {e}")))?;
        let end = observed_at;
        let start = end.checked_sub_signed(range).ok_or_else(|| {
            MetricsError::BadParameter(format!(
                "query range {:?} reaches before the earliest representable time",
                self.config.range
            ))
        })?;
        let step = self.config.step;
        let metrics = &*self.metrics;

        let batch = async {
            let (
                total_cpu,
                total_memory_bytes,
                current_cpu_percent,
                max_cpu_percent,
                cpu_rate,
                current_memory_percent,
                max_memory_percent,
                memory_rate,
            ) = tokio::try_join!(
                metrics.total_cpu(),
                metrics.total_memory(),
                metrics.current_cpu_rate(),
                metrics.max_cpu_rate(start, end),
                metrics.cpu_rate(start, end, step),
                metrics.current_memory_rate(),
                metrics.max_memory_rate(start, end),
                metrics.memory_rate(start, end, step),
            )?;

            Ok::<_, MetricsError>(Snapshot {
                total_cpu,
                total_memory_bytes,
                current_cpu_percent,
                max_cpu_percent,
                cpu_rate,
                current_memory_percent,
                max_memory_percent,
                memory_rate,
                observed_at,
            })
        };

        match self.config.timeout {
            Some(limit) => time::timeout(limit, batch)
                .await
                .map_err(|_| BackendError::Timeout(limit))?,
            None => batch.await,
        }
    }

    /// Poll until `cancel` fires or the sink is closed.
    ///
    /// Failed ticks are logged and skipped. On cancellation an outstanding
    /// batch is dropped, which abandons its backend requests.
    pub async fn run(&mut self, sink: mpsc::Sender<Snapshot>, cancel: CancellationToken) -> PollStats {
        let mut ticker = time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting poller: interval {:?}, range {:?}, step {:?}",
            self.config.interval, self.config.range, self.config.step
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.stats.ticks += 1;
            let observed_at = self.next_observed_at(Utc::now());
            self.state = PollerState::Polling;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Abandoning outstanding poll batch");
                    break;
                }
                outcome = self.poll_once(observed_at) => outcome,
            };

            match outcome {
                Ok(snapshot) => {
                    self.last_observed = Some(snapshot.observed_at);
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = sink.send(snapshot) => sent,
                    };
                    if sent.is_err() {
                        info!("Display closed, stopping poller");
                        break;
                    }
                    self.stats.published += 1;
                }
                Err(e) => {
                    self.stats.dropped += 1;
                    warn!("Dropping poll tick {}: {}", self.stats.ticks, e);
                }
            }

            self.state = PollerState::Idle;
        }

        self.state = PollerState::Cancelled;
        info!(
            "Poller stopped after {} ticks ({} published, {} dropped)",
            self.stats.ticks, self.stats.published, self.stats.dropped
        );
        self.stats
    }

    /// Wall clock time, clamped so published snapshots never go back in time
    fn next_observed_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_observed {
            Some(last) if last > now => last,
            _ => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Series;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FixedMetrics;

    #[async_trait]
    impl Metrics for FixedMetrics {
        async fn total_cpu(&self) -> Result<i64> {
            Ok(8)
        }
        async fn total_memory(&self) -> Result<i64> {
            Ok(1 << 34)
        }
        async fn cpu_rate(&self, _: DateTime<Utc>, _: DateTime<Utc>, _: Duration) -> Result<Series> {
            Ok(Series::new())
        }
        async fn memory_rate(&self, _: DateTime<Utc>, _: DateTime<Utc>, _: Duration) -> Result<Series> {
            Ok(Series::new())
        }
        async fn current_cpu_rate(&self) -> Result<i64> {
            Ok(12)
        }
        async fn current_memory_rate(&self) -> Result<i64> {
            Ok(40)
        }
        async fn max_cpu_rate(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<i64> {
            Ok(77)
        }
        async fn max_memory_rate(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<i64> {
            Err(MetricsError::Unsupported("peak memory"))
        }
    }

    #[tokio::test]
    async fn test_unsupported_metric_fails_the_batch() {
        let poller = Poller::new(Arc::new(FixedMetrics), PollerConfig::default());
        let err = poller.poll_once(Utc::now()).await.unwrap_err();
        assert!(matches!(err, MetricsError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_oversized_range_is_bad_parameter() {
        let config = PollerConfig {
            range: Duration::from_secs(100_000_000 * 86_400),
            ..PollerConfig::default()
        };
        let poller = Poller::new(Arc::new(FixedMetrics), config);

        let err = poller.poll_once(Utc::now()).await.unwrap_err();
        assert!(matches!(err, MetricsError::BadParameter(_)), "{err:?}");
    }

    #[test]
    fn test_observed_at_never_goes_backwards() {
        let mut poller = Poller::new(Arc::new(FixedMetrics), PollerConfig::default());
        let later = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let earlier = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert_eq!(poller.next_observed_at(earlier), earlier);
        poller.last_observed = Some(later);
        assert_eq!(poller.next_observed_at(earlier), later);
        let newest = later + chrono::Duration::seconds(2);
        assert_eq!(poller.next_observed_at(newest), newest);
    }

    #[test]
    fn test_new_poller_is_idle() {
        let poller = Poller::new(Arc::new(FixedMetrics), PollerConfig::default());
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.stats(), PollStats::default());
    }
}
