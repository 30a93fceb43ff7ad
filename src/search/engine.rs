//! Poll-and-retry engine
//!
//! Resolves one traveler's cheapest round trip to one destination by driving
//! a pricing session through create → poll until it is priced or the retry
//! budget runs out. The loop is a small state machine:
//!
//! ```text
//! Idle ──create──▶ SessionCreated ──quota ok──▶ Polling ──priced──▶ Resolved
//!  ▲                                              │
//!  └──────── transient failure (after pause) ◀────┘──permanent──▶ Abandoned
//! ```
//!
//! Every transition is checked against a [`RetryBudget`] and the shared
//! [`RateLimiter`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::RngExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SearchConfig;
use crate::models::{Location, PricingOption, SearchDates, Traveler};
use crate::pricing::{PollError, PricingSessionClient, Route, SessionHandle};
use crate::rate_limiter::RateLimiter;

/// Retry limits and pauses applied to every search
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Session creations allowed per search
    pub max_attempts: u32,
    /// "No pricing found" responses allowed per search
    pub max_no_pricing: u32,
    /// Pause before the next attempt
    pub retry_delay: Duration,
    /// Pause while the rate limiter reports limited
    pub rate_limited_delay: Duration,
    /// Random spread applied to `retry_delay`
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for RetryPolicy {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_no_pricing: config.max_no_pricing,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            rate_limited_delay: Duration::from_millis(config.rate_limited_delay_ms),
            jitter_factor: config.jitter_factor,
        }
    }
}

impl RetryPolicy {
    /// `retry_delay` spread by up to `jitter_factor`, which is capped at 1.0
    fn jittered_retry_delay(&self) -> Duration {
        if self.jitter_factor <= 0.0 || self.retry_delay.is_zero() {
            return self.retry_delay;
        }
        let spread = self.jitter_factor.min(1.0);
        let factor: f64 = rand::rng().random_range((1.0 - spread)..(1.0 + spread));
        self.retry_delay.mul_f64(factor)
    }
}

/// Attempt and no-pricing allowance of a single search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    max_no_pricing: u32,
    attempts: u32,
    no_pricing: u32,
}

impl RetryBudget {
    #[must_use]
    pub fn new(max_attempts: u32, max_no_pricing: u32) -> Self {
        Self {
            max_attempts,
            max_no_pricing,
            attempts: 0,
            no_pricing: 0,
        }
    }

    /// Consume one attempt. Returns `false` once every attempt is used.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempts_exhausted() {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Count one "no pricing found" response. Returns `false` once the
    /// allowance is used up.
    pub fn record_no_pricing(&mut self) -> bool {
        self.no_pricing += 1;
        self.no_pricing < self.max_no_pricing
    }

    #[must_use]
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn no_pricing(&self) -> u32 {
        self.no_pricing
    }
}

impl From<&RetryPolicy> for RetryBudget {
    fn from(policy: &RetryPolicy) -> Self {
        Self::new(policy.max_attempts, policy.max_no_pricing)
    }
}

/// Why a search gave up
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AbandonReason {
    #[error("exceeded {0} attempts")]
    AttemptsExhausted(u32),

    #[error("no pricing found {0} times")]
    NoPricingExhausted(u32),

    #[error("poll failed: {0}")]
    PollFailed(String),

    #[error("cancelled")]
    Cancelled,
}

/// A search that ended without a price
#[derive(Error, Debug, Clone, PartialEq)]
#[error("search {origin} -> {destination} abandoned after {attempts} attempts: {reason}")]
pub struct SearchAbandoned {
    pub origin: String,
    pub destination: String,
    pub attempts: u32,
    pub reason: AbandonReason,
}

/// State of one (traveler, destination) search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    /// No session; the next step creates one
    Idle,
    /// A session exists and waits for quota to be polled
    SessionCreated(SessionHandle),
    /// The session is polled on the next step
    Polling(SessionHandle),
    Resolved(PricingOption),
    Abandoned(AbandonReason),
}

/// Counters shared by every search of one engine
#[derive(Debug, Default)]
struct SearchStats {
    sessions_created: AtomicU64,
    session_failures: AtomicU64,
    polls: AtomicU64,
    rate_limit_waits: AtomicU64,
    resolved: AtomicU64,
    abandoned: AtomicU64,
}

impl SearchStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SearchStatsSnapshot {
        SearchStatsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            session_failures: self.session_failures.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            rate_limit_waits: self.rate_limit_waits.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStatsSnapshot {
    pub sessions_created: u64,
    pub session_failures: u64,
    pub polls: u64,
    pub rate_limit_waits: u64,
    pub resolved: u64,
    pub abandoned: u64,
}

/// Drives pricing sessions to a best price for one traveler at a time
pub struct PriceSearchEngine<C> {
    client: C,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    stats: SearchStats,
}

impl<C: PricingSessionClient> PriceSearchEngine<C> {
    pub fn new(client: C, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            policy,
            cancel: CancellationToken::new(),
            stats: SearchStats::default(),
        }
    }

    /// Abort in-progress and future searches when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn stats(&self) -> SearchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Find `traveler`'s cheapest round trip to `destination`.
    ///
    /// A traveler who lives at the destination gets a zero-cost option
    /// without any API call.
    #[instrument(
        skip_all,
        fields(traveler = %traveler.name, origin = %traveler.home, destination = %destination.place_id)
    )]
    pub async fn find_best_price(
        &self,
        traveler: &Traveler,
        destination: &Location,
        dates: &SearchDates,
    ) -> Result<PricingOption, SearchAbandoned> {
        if traveler.lives_at(&destination.place_id) {
            info!("{} already lives at {}", traveler.name, destination.label());
            return Ok(PricingOption::already_home(
                &destination.place_id,
                destination.label(),
            ));
        }

        info!("Searching flights for {} to {}", traveler.name, destination.label());
        let route = Route::new(&traveler.home, &destination.place_id, destination.label());
        let mut budget = RetryBudget::from(&self.policy);
        let mut state = SearchState::Idle;

        loop {
            state = match state {
                SearchState::Resolved(option) => {
                    SearchStats::bump(&self.stats.resolved);
                    info!("Best price: {:.2} to {}", option.price, option.deeplink);
                    return Ok(option);
                }
                SearchState::Abandoned(reason) => {
                    SearchStats::bump(&self.stats.abandoned);
                    warn!("Skipping {} for {}: {}", route, traveler.name, reason);
                    return Err(SearchAbandoned {
                        origin: route.origin,
                        destination: route.destination,
                        attempts: budget.attempts(),
                        reason,
                    });
                }
                state => self.step(state, &route, dates, &mut budget).await,
            };
        }
    }

    /// Advance a non-terminal search by one transition
    async fn step(
        &self,
        state: SearchState,
        route: &Route,
        dates: &SearchDates,
        budget: &mut RetryBudget,
    ) -> SearchState {
        if self.cancel.is_cancelled() {
            return SearchState::Abandoned(AbandonReason::Cancelled);
        }

        match state {
            SearchState::Idle => {
                if self.limiter.is_limited() {
                    return self.wait_for_quota(SearchState::Idle).await;
                }
                if !budget.begin_attempt() {
                    return SearchState::Abandoned(AbandonReason::AttemptsExhausted(
                        budget.attempts(),
                    ));
                }

                debug!(
                    "Creating session (attempt {}/{})",
                    budget.attempts(),
                    self.policy.max_attempts
                );
                let created = self
                    .client
                    .create_session(dates, &route.origin, &route.destination)
                    .await;
                self.limiter.record_request();

                match created {
                    Ok(handle) => {
                        SearchStats::bump(&self.stats.sessions_created);
                        SearchState::SessionCreated(handle)
                    }
                    Err(e) => {
                        SearchStats::bump(&self.stats.session_failures);
                        warn!("Error initiating session: {}", e);
                        self.retry_or_abandon(budget).await
                    }
                }
            }
            SearchState::SessionCreated(handle) => {
                if self.limiter.is_limited() {
                    return self.wait_for_quota(SearchState::SessionCreated(handle)).await;
                }
                SearchState::Polling(handle)
            }
            SearchState::Polling(handle) => {
                let polled = self.client.poll_session(&handle, route).await;
                self.limiter.record_request();
                SearchStats::bump(&self.stats.polls);

                match polled {
                    Ok(option) => SearchState::Resolved(option),
                    Err(PollError::RateLimited) => {
                        warn!("Pricing API reported its rate limit, retrying");
                        self.retry_or_abandon(budget).await
                    }
                    Err(PollError::NoPricingFound) => {
                        if budget.record_no_pricing() {
                            info!(
                                "No legs found, trying again ({}/{})",
                                budget.no_pricing(),
                                self.policy.max_no_pricing
                            );
                            self.retry_or_abandon(budget).await
                        } else {
                            SearchState::Abandoned(AbandonReason::NoPricingExhausted(
                                budget.no_pricing(),
                            ))
                        }
                    }
                    Err(PollError::Failed(message)) => {
                        error!("Error polling session {}: {}", handle, message);
                        SearchState::Abandoned(AbandonReason::PollFailed(message))
                    }
                }
            }
            terminal => terminal,
        }
    }

    /// Pause before a fresh attempt, unless none are left
    async fn retry_or_abandon(&self, budget: &RetryBudget) -> SearchState {
        if budget.attempts_exhausted() {
            return SearchState::Abandoned(AbandonReason::AttemptsExhausted(budget.attempts()));
        }
        if self.pause(self.policy.jittered_retry_delay()).await {
            SearchState::Idle
        } else {
            SearchState::Abandoned(AbandonReason::Cancelled)
        }
    }

    /// Sleep while over quota, then resume in `resume`. Does not consume an
    /// attempt.
    async fn wait_for_quota(&self, resume: SearchState) -> SearchState {
        SearchStats::bump(&self.stats.rate_limit_waits);
        info!(
            "Rate limit exceeded, sleeping {:.1}s",
            self.policy.rate_limited_delay.as_secs_f64()
        );
        if self.pause(self.policy.rate_limited_delay).await {
            resume
        } else {
            SearchState::Abandoned(AbandonReason::Cancelled)
        }
    }

    /// Returns `false` if cancelled while sleeping
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::SessionError;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Client answering from scripted queues; an empty queue means success
    #[derive(Default)]
    struct ScriptedClient {
        creates: Mutex<VecDeque<Result<(), SessionError>>>,
        polls: Mutex<VecDeque<Result<f64, PollError>>>,
        create_calls: AtomicU64,
        poll_calls: AtomicU64,
    }

    impl ScriptedClient {
        fn with_polls(polls: Vec<Result<f64, PollError>>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                ..Self::default()
            }
        }

        fn creates(&self) -> u64 {
            self.create_calls.load(Ordering::SeqCst)
        }

        fn polls(&self) -> u64 {
            self.poll_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PricingSessionClient for ScriptedClient {
        async fn create_session(
            &self,
            _dates: &SearchDates,
            origin: &str,
            destination: &str,
        ) -> Result<SessionHandle, SessionError> {
            let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
            match self.creates.lock().unwrap().pop_front() {
                Some(Err(e)) => Err(e),
                _ => Ok(SessionHandle::new(format!("{origin}-{destination}-{n}"))),
            }
        }

        async fn poll_session(
            &self,
            _session: &SessionHandle,
            route: &Route,
        ) -> Result<PricingOption, PollError> {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            let price = self.polls.lock().unwrap().pop_front().unwrap_or(Ok(100.0))?;
            Ok(PricingOption {
                price,
                deeplink: format!("https://book.example/{}", route.destination),
                destination_name: route.destination_name.clone(),
                origin: route.origin.clone(),
                destination: route.destination.clone(),
            })
        }
    }

    fn engine(client: ScriptedClient) -> PriceSearchEngine<ScriptedClient> {
        PriceSearchEngine::new(client, Arc::new(RateLimiter::default()), RetryPolicy::default())
    }

    fn dates() -> SearchDates {
        SearchDates::parse("2020-01-01", "2020-01-05").unwrap()
    }

    #[test]
    fn test_retry_budget_attempts() {
        let mut budget = RetryBudget::new(3, 2);
        assert!(budget.begin_attempt());
        assert!(budget.begin_attempt());
        assert!(budget.begin_attempt());
        assert!(budget.attempts_exhausted());
        assert!(!budget.begin_attempt());
        assert_eq!(budget.attempts(), 3);
    }

    #[test]
    fn test_retry_budget_no_pricing() {
        let mut budget = RetryBudget::new(10, 5);
        for _ in 0..4 {
            assert!(budget.record_no_pricing());
        }
        assert!(!budget.record_no_pricing());
        assert_eq!(budget.no_pricing(), 5);
    }

    #[test]
    fn test_jitter_stays_within_factor() {
        let policy = RetryPolicy {
            jitter_factor: 0.1,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.jittered_retry_delay();
            assert!(delay >= Duration::from_millis(900));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[test]
    fn test_oversized_jitter_is_capped() {
        let policy = RetryPolicy {
            jitter_factor: 3.0,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            assert!(policy.jittered_retry_delay() <= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_traveler_at_home_needs_no_session() {
        let engine = engine(ScriptedClient::default());
        let traveler = Traveler::new("kris", "JFK-sky");

        let option = engine
            .find_best_price(&traveler, &Location::new("JFK-sky", "New York JFK"), &dates())
            .await
            .unwrap();

        assert_eq!(option.price, 0.0);
        assert!(option.is_already_home());
        assert_eq!(engine.client().creates(), 0);
        assert_eq!(engine.limiter().request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_after_no_pricing_responses() {
        let engine = engine(ScriptedClient::with_polls(vec![
            Err(PollError::NoPricingFound),
            Err(PollError::NoPricingFound),
            Err(PollError::NoPricingFound),
            Ok(120.0),
        ]));
        let traveler = Traveler::new("a", "DEN-sky");

        let option = engine
            .find_best_price(&traveler, &Location::new("ORD-sky", "Chicago"), &dates())
            .await
            .unwrap();

        assert_eq!(option.price, 120.0);
        assert_eq!(option.origin, "DEN-sky");
        assert_eq!(engine.client().creates(), 4);
        // one create and one poll per attempt
        assert_eq!(engine.limiter().request_count(), 8);
        assert_eq!(engine.stats().resolved, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandons_after_max_attempts() {
        let client = ScriptedClient::default();
        *client.creates.lock().unwrap() = (0..11)
            .map(|_| Err(SessionError::MissingSessionKey))
            .collect();
        let engine = engine(client);

        let err = engine
            .find_best_price(
                &Traveler::new("a", "DEN-sky"),
                &Location::new("LAX-sky", "Los Angeles"),
                &dates(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.reason, AbandonReason::AttemptsExhausted(10));
        assert_eq!(err.attempts, 10);
        assert_eq!(engine.client().creates(), 10);
        assert_eq!(engine.client().polls(), 0);
        assert_eq!(engine.stats().session_failures, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandons_after_max_no_pricing() {
        let engine = engine(ScriptedClient::with_polls(
            (0..8).map(|_| Err(PollError::NoPricingFound)).collect(),
        ));

        let err = engine
            .find_best_price(
                &Traveler::new("a", "DEN-sky"),
                &Location::new("ORD-sky", "Chicago"),
                &dates(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.reason, AbandonReason::NoPricingExhausted(5));
        assert_eq!(engine.client().polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_rate_limit_does_not_count_as_no_pricing() {
        let mut polls: Vec<Result<f64, PollError>> =
            (0..4).map(|_| Err(PollError::NoPricingFound)).collect();
        polls.extend((0..3).map(|_| Err(PollError::RateLimited)));
        polls.push(Ok(75.0));
        let engine = engine(ScriptedClient::with_polls(polls));

        let option = engine
            .find_best_price(
                &Traveler::new("a", "DEN-sky"),
                &Location::new("ORD-sky", "Chicago"),
                &dates(),
            )
            .await
            .unwrap();

        assert_eq!(option.price, 75.0);
        assert_eq!(engine.client().creates(), 8);
    }

    #[rstest]
    #[case::validation(PollError::Failed("validation".to_string()))]
    #[case::malformed(PollError::Failed("error unmarshaling poll response".to_string()))]
    #[tokio::test(start_paused = true)]
    async fn test_permanent_poll_error_abandons_immediately(#[case] failure: PollError) {
        let engine = engine(ScriptedClient::with_polls(vec![Err(failure), Ok(10.0)]));

        let err = engine
            .find_best_price(
                &Traveler::new("a", "DEN-sky"),
                &Location::new("ORD-sky", "Chicago"),
                &dates(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err.reason, AbandonReason::PollFailed(_)));
        assert_eq!(engine.client().creates(), 1);
        assert_eq!(engine.client().polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_quota_without_consuming_attempts() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(60)));
        for _ in 0..3 {
            limiter.record_request();
        }
        let engine = PriceSearchEngine::new(
            ScriptedClient::default(),
            limiter.clone(),
            RetryPolicy::default(),
        );

        let start = tokio::time::Instant::now();
        let option = engine
            .find_best_price(
                &Traveler::new("a", "DEN-sky"),
                &Location::new("ORD-sky", "Chicago"),
                &dates(),
            )
            .await
            .unwrap();

        assert_eq!(option.price, 100.0);
        assert_eq!(engine.client().creates(), 1);
        assert!(engine.stats().rate_limit_waits >= 1);
        // Only the window rollover lets the search proceed
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_quota_between_create_and_poll() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        limiter.record_request();
        let engine = PriceSearchEngine::new(
            ScriptedClient::default(),
            limiter.clone(),
            RetryPolicy::default(),
        );

        let start = tokio::time::Instant::now();
        let option = engine
            .find_best_price(
                &Traveler::new("a", "DEN-sky"),
                &Location::new("ORD-sky", "Chicago"),
                &dates(),
            )
            .await
            .unwrap();

        // The session creation pushes the limiter over quota; the same
        // session is polled once the window rolls over
        assert_eq!(option.price, 100.0);
        assert_eq!(engine.client().creates(), 1);
        assert_eq!(engine.client().polls(), 1);
        assert!(engine.stats().rate_limit_waits > 0);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_search() {
        let cancel = CancellationToken::new();
        let engine = engine(ScriptedClient::with_polls(
            (0..8).map(|_| Err(PollError::RateLimited)).collect(),
        ))
        .with_cancellation(cancel.clone());

        let canceller = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                cancel.cancel();
            }
        });

        let err = engine
            .find_best_price(
                &Traveler::new("a", "DEN-sky"),
                &Location::new("ORD-sky", "Chicago"),
                &dates(),
            )
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err.reason, AbandonReason::Cancelled);
        assert!(engine.client().creates() < 8);
    }
}
