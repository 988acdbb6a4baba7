//! Minimum-interval pacing for one source adapter.
//!
//! Every adapter owns a [`RequestPacer`]. Pacing is per adapter, so a slow
//! provider never delays requests to a different one.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Smallest accepted interval between two requests to the same source.
pub const MIN_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Largest accepted interval between two requests to the same source.
pub const MAX_MIN_INTERVAL: Duration = Duration::from_secs(3);

/// Enforces a minimum interval between consecutive requests.
///
/// The first request proceeds immediately. Callers that race for the pacer
/// are serialized on the inner mutex, so concurrent record searches hitting
/// the same source still respect the interval.
#[derive(Debug)]
pub struct RequestPacer {
    source_name: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Creates a pacer, clamping `min_interval` into
    /// [`MIN_MIN_INTERVAL`]..=[`MAX_MIN_INTERVAL`].
    #[must_use]
    pub fn new(source_name: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            source_name: source_name.into(),
            min_interval: min_interval.clamp(MIN_MIN_INTERVAL, MAX_MIN_INTERVAL),
            last_request: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a request is allowed, then marks the request time.
    pub async fn wait(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let delay = self.min_interval.saturating_sub(elapsed);
                debug!(
                    source = %self.source_name,
                    delay_ms = delay.as_millis(),
                    "pacing source request"
                );
                tokio::time::sleep(delay).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_clamps_interval() {
        assert_eq!(
            RequestPacer::new("a", Duration::ZERO).min_interval(),
            MIN_MIN_INTERVAL
        );
        assert_eq!(
            RequestPacer::new("a", Duration::from_secs(30)).min_interval(),
            MAX_MIN_INTERVAL
        );
        assert_eq!(
            RequestPacer::new("a", Duration::from_secs(1)).min_interval(),
            Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_first_request_is_immediate() {
        let pacer = RequestPacer::new("arxiv", Duration::from_secs(3));
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_delays_second_request() {
        let pacer = RequestPacer::new("arxiv", Duration::from_secs(3));
        pacer.wait().await;
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn test_pacer_separate_instances_do_not_share_state() {
        let arxiv = RequestPacer::new("arxiv", Duration::from_secs(3));
        let zenodo = RequestPacer::new("zenodo", Duration::from_millis(200));
        tokio_test::block_on(arxiv.wait());
        let start = std::time::Instant::now();
        tokio_test::block_on(zenodo.wait());
        assert!(start.elapsed() < Duration::from_millis(150));
        tokio_test::block_on(zenodo.wait());
        assert!(start.elapsed() >= Duration::from_millis(190));
    }
}
