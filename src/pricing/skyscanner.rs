//! Skyscanner pricing API client (RapidAPI)
//!
//! Implements [`PricingSessionClient`] over HTTP. Transport failures and
//! 5xx responses are retried by `reqwest-retry` before they reach the search
//! engine; everything protocol-level is classified into [`SessionError`] and
//! [`PollError`] and left to the engine's retry policy.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::{debug, info, instrument, warn};

use super::{PollError, PollResponse, PricingSessionClient, Route, SessionError, SessionHandle};
use crate::FlightFinderError;
use crate::config::ApiConfig;
use crate::locations::{PlaceList, PlaceSuggester};
use crate::models::{Location, PricingOption, SearchDates};

const PRICING_PATH: &str = "apiservices/pricing/v1.0";
const POLL_PATH: &str = "apiservices/pricing/uk2/v1.0";
const AUTOSUGGEST_PATH: &str = "apiservices/autosuggest/v1.0";

/// Pricing API client
pub struct SkyscannerClient {
    client: ClientWithMiddleware,
    config: ApiConfig,
    api_key: String,
}

impl SkyscannerClient {
    /// Create a new client; the configuration must carry an API key
    pub fn new(config: &ApiConfig) -> crate::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| FlightFinderError::config("Pricing API key is not configured"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("flight-finder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FlightFinderError::api(format!("Failed to create HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn poll_url(&self, session: &SessionHandle) -> String {
        self.url(&format!("{POLL_PATH}/{}", urlencoding::encode(session.as_str())))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-rapidapi-host", self.config.host.as_str())
            .header("x-rapidapi-key", self.api_key.as_str())
    }

    /// Form body of a session creation request
    fn session_form(&self, dates: &SearchDates, origin: &str, destination: &str) -> String {
        let outbound = dates.outbound_param();
        let inbound = dates.inbound_param();
        let fields = [
            ("inboundDate", inbound.as_str()),
            ("cabinClass", "economy"),
            ("children", "0"),
            ("infants", "0"),
            ("country", self.config.country.as_str()),
            ("currency", self.config.currency.as_str()),
            ("locale", self.config.locale.as_str()),
            ("originPlace", origin),
            ("destinationPlace", destination),
            ("outboundDate", outbound.as_str()),
            ("adults", "1"),
        ];

        fields
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Look up places matching a free-text query such as "Denver"
    #[instrument(skip(self))]
    pub async fn suggest_places(&self, query: &str) -> crate::Result<Vec<Location>> {
        let url = format!(
            "{}/?query={}",
            self.url(&format!(
                "{AUTOSUGGEST_PATH}/{}/{}/{}",
                self.config.country, self.config.currency, self.config.locale
            )),
            urlencoding::encode(query)
        );
        debug!("Place suggestion request URL: {}", url);

        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| FlightFinderError::api(format!("Place suggestion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlightFinderError::api(format!(
                "Place suggestion failed with status {status}: {body}"
            )));
        }

        let places: PlaceList = response.json().await.map_err(|e| {
            FlightFinderError::api(format!("Failed to parse place suggestions: {e}"))
        })?;

        info!("Found {} places for '{}'", places.places.len(), query);
        Ok(places.places)
    }
}

#[async_trait]
impl PlaceSuggester for SkyscannerClient {
    async fn suggest_places(&self, query: &str) -> crate::Result<Vec<Location>> {
        SkyscannerClient::suggest_places(self, query).await
    }
}

/// Session key is the last path segment of the `Location` header
fn session_key_from_location(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next()?.trim_end_matches('/');
    let key = path.rsplit('/').next()?.trim();
    (!key.is_empty() && !path.is_empty()).then(|| key.to_string())
}

#[async_trait]
impl PricingSessionClient for SkyscannerClient {
    #[instrument(skip(self, dates))]
    async fn create_session(
        &self,
        dates: &SearchDates,
        origin: &str,
        destination: &str,
    ) -> Result<SessionHandle, SessionError> {
        let start_time = Instant::now();

        let response = self
            .authed(self.client.post(self.url(PRICING_PATH)))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.session_form(dates, origin, destination))
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Session creation returned {}: {}", status, message);
            return Err(SessionError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let key = session_key_from_location(location).ok_or(SessionError::MissingSessionKey)?;

        debug!(
            "Created session {} in {:.3}s",
            key,
            start_time.elapsed().as_secs_f64()
        );
        Ok(SessionHandle::new(key))
    }

    #[instrument(skip(self), fields(route = %route))]
    async fn poll_session(
        &self,
        session: &SessionHandle,
        route: &Route,
    ) -> Result<PricingOption, PollError> {
        let start_time = Instant::now();

        let response = self
            .authed(self.client.get(self.poll_url(session)))
            .send()
            .await
            .map_err(|e| PollError::Failed(format!("poll request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Pricing API rate limit hit (HTTP 429)");
            return Err(PollError::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| PollError::Failed(format!("failed to read poll response: {e}")))?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<PollResponse>(&body).ok();
            if parsed.as_ref().is_some_and(PollResponse::is_rate_limited) {
                return Err(PollError::RateLimited);
            }
            let detail = parsed
                .and_then(|p| p.validation_message().or(p.message))
                .unwrap_or(body);
            return Err(PollError::Failed(format!("status {status}: {detail}")));
        }

        let parsed: PollResponse = serde_json::from_str(&body)
            .map_err(|e| PollError::Failed(format!("error unmarshaling poll response: {e}")))?;

        debug!(
            "Polled session {} in {:.3}s (status: {})",
            session,
            start_time.elapsed().as_secs_f64(),
            parsed.status.as_deref().unwrap_or("unknown")
        );

        parsed.into_pricing_option(route)
    }
}
