//! Shared fixtures for the integration tests

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flight_finder::pricing::{PollError, PricingSessionClient, Route, SessionError, SessionHandle};
use flight_finder::search::{RankingPolicy, RetryPolicy};
use flight_finder::{
    DestinationRanker, Location, PriceSearchEngine, PricingOption, RateLimiter, SearchDates,
    TripAggregator,
};

#[derive(Default)]
struct RouteScript {
    create_failures: u32,
    polls: VecDeque<Result<f64, PollError>>,
    /// Answer once `polls` is drained; `None` means no pricing
    settled_price: Option<f64>,
    creates: u32,
}

/// In-memory pricing API answering per (origin, destination) scripts
#[derive(Default)]
pub struct ScriptedPricing {
    routes: Mutex<HashMap<(String, String), RouteScript>>,
    total_creates: AtomicUsize,
}

impl ScriptedPricing {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, origin: &str, destination: &str, f: impl FnOnce(&mut RouteScript)) {
        let mut routes = self.routes.lock().unwrap();
        f(routes
            .entry((origin.to_string(), destination.to_string()))
            .or_default());
    }

    /// Every poll for the route returns `price`
    pub fn price(self, origin: &str, destination: &str, price: f64) -> Self {
        self.script(origin, destination, |s| s.settled_price = Some(price));
        self
    }

    /// Poll outcomes returned in order before the settled price
    pub fn polls(
        self,
        origin: &str,
        destination: &str,
        polls: Vec<Result<f64, PollError>>,
    ) -> Self {
        self.script(origin, destination, |s| s.polls.extend(polls));
        self
    }

    /// The first `times` session creations for the route fail
    pub fn fail_creates(self, origin: &str, destination: &str, times: u32) -> Self {
        self.script(origin, destination, |s| s.create_failures = times);
        self
    }

    pub fn creates_for(&self, origin: &str, destination: &str) -> u32 {
        self.routes
            .lock()
            .unwrap()
            .get(&(origin.to_string(), destination.to_string()))
            .map_or(0, |s| s.creates)
    }

    pub fn total_creates(&self) -> usize {
        self.total_creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PricingSessionClient for ScriptedPricing {
    async fn create_session(
        &self,
        _dates: &SearchDates,
        origin: &str,
        destination: &str,
    ) -> Result<SessionHandle, SessionError> {
        self.total_creates.fetch_add(1, Ordering::SeqCst);
        let mut routes = self.routes.lock().unwrap();
        let script = routes
            .entry((origin.to_string(), destination.to_string()))
            .or_default();
        script.creates += 1;

        if script.create_failures > 0 {
            script.create_failures -= 1;
            return Err(SessionError::Status {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(SessionHandle::new(format!(
            "{origin}:{destination}:{}",
            script.creates
        )))
    }

    async fn poll_session(
        &self,
        _session: &SessionHandle,
        route: &Route,
    ) -> Result<PricingOption, PollError> {
        let mut routes = self.routes.lock().unwrap();
        let script = routes
            .entry((route.origin.clone(), route.destination.clone()))
            .or_default();

        let price = match script.polls.pop_front() {
            Some(outcome) => outcome?,
            None => script.settled_price.ok_or(PollError::NoPricingFound)?,
        };

        Ok(PricingOption {
            price,
            deeplink: format!("https://book.example/{}/{}", route.origin, route.destination),
            destination_name: route.destination_name.clone(),
            origin: route.origin.clone(),
            destination: route.destination.clone(),
        })
    }
}

pub fn dates() -> SearchDates {
    SearchDates::parse("2020-01-01", "2020-01-05").unwrap()
}

pub fn location(code: &str, name: &str) -> Location {
    Location::with_country(code, name, "United States")
}

pub fn engine(client: Arc<ScriptedPricing>) -> PriceSearchEngine<Arc<ScriptedPricing>> {
    PriceSearchEngine::new(client, Arc::new(RateLimiter::default()), RetryPolicy::default())
}

pub fn ranker(
    client: Arc<ScriptedPricing>,
    policy: RankingPolicy,
) -> DestinationRanker<Arc<ScriptedPricing>> {
    DestinationRanker::new(TripAggregator::new(engine(client)), policy)
}
