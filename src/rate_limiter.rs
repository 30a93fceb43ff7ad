//! Outbound request rate limiting for the pricing API
//!
//! The pricing API allows a fixed number of requests per minute. Every call
//! site records its requests on one shared [`RateLimiter`] and checks
//! [`RateLimiter::is_limited`] before issuing the next one. The window rolls
//! over lazily on each check, and [`spawn_window_ticker`] also resets it on a
//! fixed period for the lifetime of the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Requests allowed per window before the limiter reports "limited"
pub const DEFAULT_MAX_REQUESTS: u32 = 60;

/// Length of one rate window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Shortest window accepted; shorter ones are raised to it
pub const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Fixed-window request counter
#[derive(Debug)]
pub struct RateLimiter {
    /// Requests tolerated per window; limited once the count exceeds it
    max_requests: u32,
    window: Duration,
    requests: AtomicU32,
    /// Start of the current window, in milliseconds since `origin`
    window_start_ms: AtomicU64,
    origin: Instant,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    /// Create a new rate limiter. A `window` below [`MIN_WINDOW`] is raised
    /// to it.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window: window.max(MIN_WINDOW),
            requests: AtomicU32::new(0),
            window_start_ms: AtomicU64::new(0),
            origin: Instant::now(),
        }
    }

    /// Count one outbound request in the current window
    pub fn record_request(&self) {
        self.roll_window();
        let previous = self.requests.fetch_add(1, Ordering::AcqRel);
        if previous == self.max_requests {
            info!(
                "Request quota of {} per {}s exceeded",
                self.max_requests,
                self.window.as_secs()
            );
        }
    }

    /// Whether more than `max_requests` were recorded in the current window
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.roll_window();
        self.requests.load(Ordering::Acquire) > self.max_requests
    }

    /// Requests recorded in the current window
    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.roll_window();
        self.requests.load(Ordering::Acquire)
    }

    /// Start a new window now, dropping the current count
    pub fn reset(&self) {
        self.window_start_ms
            .store(self.elapsed_ms(), Ordering::Release);
        self.requests.store(0, Ordering::Release);
        debug!("Rate window reset");
    }

    /// Time left until the current window ends
    #[must_use]
    pub fn time_until_reset(&self) -> Duration {
        let elapsed = self
            .elapsed_ms()
            .saturating_sub(self.window_start_ms.load(Ordering::Acquire));
        self.window
            .saturating_sub(Duration::from_millis(elapsed))
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Start a fresh window if the current one has run out. Partial windows
    /// are never carried over.
    fn roll_window(&self) {
        let now = self.elapsed_ms();
        let start = self.window_start_ms.load(Ordering::Acquire);
        let window_ms = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);

        if now.saturating_sub(start) >= window_ms
            && self
                .window_start_ms
                .compare_exchange(start, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.requests.store(0, Ordering::Release);
            debug!("Rate window elapsed, counter cleared");
        }
    }
}

/// Reset `limiter` once per window until `cancel` fires
pub fn spawn_window_ticker(
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = limiter.window();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Rate window ticker stopped");
                    break;
                }
                _ = ticker.tick() => limiter.reset(),
            }
        }
    })
}
