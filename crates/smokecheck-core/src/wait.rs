//! Bounded waits shared by every browser driver.
//!
//! Drivers supply cheap checks (one protocol round-trip each); the loops here
//! own the timing. Two waits are built on top:
//!
//! - **network idle**: the document is ready, no request is in flight and
//!   the number of loaded resources has not changed for a quiet window
//!   (500 ms by default), the same heuristic as a "networkidle" navigation
//!   wait;
//! - **element visibility**: the locator resolves to an element with a
//!   non-empty box that is not `visibility: hidden`.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::SmokeError;
use crate::models::NavigationWait;

/// One observation of the page's network activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct NetworkSample {
    /// `document.readyState === "complete"`
    pub ready: bool,
    /// Number of resource timing entries seen so far.
    pub resources: u64,
    /// Requests started but not yet finished or failed. Backends that
    /// cannot observe them report 0.
    #[serde(default)]
    pub pending: u64,
}

/// Request ids seen on the wire that have not completed yet.
///
/// Fed from protocol events (request sent, finished, failed) by backends
/// that can observe them.
#[derive(Debug, Default)]
pub struct InflightRequests {
    ids: Mutex<HashSet<String>>,
}

impl InflightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// A redirect reuses its request id, so a repeated start is not double-counted.
    pub fn started(&self, id: impl Into<String>) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.insert(id.into());
        }
    }

    pub fn finished(&self, id: &str) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.remove(id);
        }
    }

    pub fn count(&self) -> u64 {
        self.ids.lock().map(|ids| ids.len() as u64).unwrap_or(0)
    }
}

/// Decides when a stream of [`NetworkSample`]s has gone quiet.
#[derive(Debug, Clone)]
pub struct QuiescenceTracker {
    window: Duration,
    last_count: Option<u64>,
    stable_since: Option<Instant>,
}

impl QuiescenceTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_count: None,
            stable_since: None,
        }
    }

    /// Feed one sample. Returns true once the page has been ready, with no
    /// request in flight and an unchanged resource count, for at least the
    /// quiet window.
    pub fn observe(&mut self, sample: NetworkSample, now: Instant) -> bool {
        if !sample.ready || sample.pending > 0 {
            self.last_count = None;
            self.stable_since = None;
            return false;
        }

        if self.last_count != Some(sample.resources) {
            self.last_count = Some(sample.resources);
            self.stable_since = Some(now);
        }

        self.stable_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.window)
    }
}

/// Poll `check` every `interval` until it yields a value or `timeout` elapses.
///
/// Returns `Ok(None)` on timeout. Check errors end the wait immediately.
/// A check that never returns is also cut off at the deadline.
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<Option<T>, SmokeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, SmokeError>>,
{
    let polling = async {
        loop {
            if let Some(value) = check().await? {
                return Ok(value);
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, polling).await {
        Ok(result) => result.map(Some),
        Err(_) => Ok(None),
    }
}

/// Sample the page until it has been quiet for `window`. Unbounded; callers
/// wrap it in a deadline.
pub async fn wait_for_network_idle<F, Fut>(
    window: Duration,
    interval: Duration,
    mut sample: F,
) -> Result<(), SmokeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<NetworkSample, SmokeError>>,
{
    let mut tracker = QuiescenceTracker::new(window);
    loop {
        let observed = sample().await?;
        if tracker.observe(observed, Instant::now()) {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}

/// Run a driver's `goto` followed by the network-idle wait, all within
/// `wait.timeout`. Exceeding it yields [`SmokeError::NavigationTimeout`].
pub async fn settle_navigation<G, F, Fut>(
    url: &str,
    wait: &NavigationWait,
    goto: G,
    sample: F,
) -> Result<(), SmokeError>
where
    G: Future<Output = Result<(), SmokeError>>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<NetworkSample, SmokeError>>,
{
    let settle = async {
        goto.await?;
        tracing::debug!(%url, "Load finished, waiting for network idle");
        wait_for_network_idle(wait.quiet_window, wait.poll_interval, sample).await
    };

    match tokio::time::timeout(wait.timeout, settle).await {
        Ok(result) => result,
        Err(_) => Err(SmokeError::NavigationTimeout {
            url: url.to_string(),
            timeout: wait.timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    fn ready(resources: u64) -> NetworkSample {
        NetworkSample {
            ready: true,
            resources,
            pending: 0,
        }
    }

    #[test]
    fn tracker_needs_full_window() {
        let window = Duration::from_millis(500);
        let mut tracker = QuiescenceTracker::new(window);
        let t0 = Instant::now();

        assert!(!tracker.observe(ready(3), t0));
        assert!(!tracker.observe(ready(3), t0 + Duration::from_millis(499)));
        assert!(tracker.observe(ready(3), t0 + Duration::from_millis(500)));
    }

    #[test]
    fn tracker_resets_on_new_resources() {
        let mut tracker = QuiescenceTracker::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(!tracker.observe(ready(3), t0));
        assert!(!tracker.observe(ready(4), t0 + Duration::from_millis(400)));
        assert!(!tracker.observe(ready(4), t0 + Duration::from_millis(800)));
        assert!(tracker.observe(ready(4), t0 + Duration::from_millis(900)));
    }

    #[test]
    fn tracker_ignores_loading_document() {
        let mut tracker = QuiescenceTracker::new(Duration::from_millis(100));
        let t0 = Instant::now();
        let loading = NetworkSample {
            ready: false,
            resources: 0,
            pending: 0,
        };

        assert!(!tracker.observe(loading, t0));
        assert!(!tracker.observe(loading, t0 + Duration::from_secs(5)));
        assert!(!tracker.observe(ready(0), t0 + Duration::from_secs(5)));
        assert!(tracker.observe(ready(0), t0 + Duration::from_millis(5100)));
    }

    #[test]
    fn tracker_waits_for_inflight_requests() {
        let mut tracker = QuiescenceTracker::new(Duration::from_millis(500));
        let t0 = Instant::now();
        let busy = NetworkSample {
            ready: true,
            resources: 5,
            pending: 1,
        };

        // A slow XHR outlasting the window must not look idle.
        assert!(!tracker.observe(busy, t0));
        assert!(!tracker.observe(busy, t0 + Duration::from_secs(2)));
        assert!(!tracker.observe(ready(5), t0 + Duration::from_millis(2100)));
        assert!(!tracker.observe(ready(5), t0 + Duration::from_millis(2500)));
        assert!(tracker.observe(ready(5), t0 + Duration::from_millis(2600)));
    }

    #[test]
    fn sample_without_pending_field_deserializes() {
        let sample: NetworkSample =
            serde_json::from_value(serde_json::json!({"ready": true, "resources": 3})).unwrap();
        assert_eq!(sample, ready(3));
    }

    #[test]
    fn inflight_requests_track_ids() {
        let inflight = InflightRequests::new();
        inflight.started("1");
        inflight.started("2");
        inflight.started("2");
        assert_eq!(inflight.count(), 2);

        inflight.finished("1");
        inflight.finished("unknown");
        assert_eq!(inflight.count(), 1);
        inflight.finished("2");
        assert_eq!(inflight.count(), 0);
    }

    #[test]
    fn tracker_zero_window_idle_immediately() {
        let mut tracker = QuiescenceTracker::new(Duration::ZERO);
        assert!(tracker.observe(ready(1), Instant::now()));
    }

    #[tokio::test]
    async fn poll_until_returns_first_value() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let found = poll_until(Duration::from_secs(1), Duration::from_millis(5), || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(if n >= 2 { Some(n) } else { None }) }
        })
        .await
        .unwrap();

        assert_eq!(found, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_until_times_out_with_none() {
        let start = std::time::Instant::now();
        let found: Option<()> = poll_until(Duration::from_millis(50), Duration::from_millis(5), || async {
            Ok(None)
        })
        .await
        .unwrap();

        assert!(found.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn poll_until_propagates_check_error() {
        let err = poll_until::<(), _, _>(Duration::from_secs(1), Duration::from_millis(5), || async {
            Err(SmokeError::Driver("session gone".into()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SmokeError::Driver(_)));
    }

    #[tokio::test]
    async fn poll_until_cuts_off_hanging_check() {
        let found: Option<()> = poll_until(Duration::from_millis(30), Duration::from_millis(5), || async {
            std::future::pending::<()>().await;
            Ok(None)
        })
        .await
        .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn settle_navigation_succeeds_on_stable_page() {
        let wait = NavigationWait {
            timeout: Duration::from_secs(2),
            quiet_window: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
        };

        settle_navigation("https://example.com", &wait, async { Ok(()) }, || async {
            Ok(ready(7))
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn settle_navigation_times_out_on_busy_network() {
        let wait = NavigationWait {
            timeout: Duration::from_millis(100),
            quiet_window: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
        };
        let counter = Arc::new(AtomicU64::new(0));

        let err = settle_navigation("https://example.com", &wait, async { Ok(()) }, || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(ready(n)) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SmokeError::NavigationTimeout { .. }));
    }

    #[tokio::test]
    async fn settle_navigation_propagates_goto_error() {
        let wait = NavigationWait::default();
        let err = settle_navigation(
            "https://example.com",
            &wait,
            async { Err(SmokeError::Navigation("net::ERR_NAME_NOT_RESOLVED".into())) },
            || async { Ok(ready(0)) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SmokeError::Navigation(_)));
    }
}
