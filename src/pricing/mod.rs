//! Pricing session protocol
//!
//! The pricing API is asynchronous: a search is opened as a server-side
//! session for one origin/destination/date combination and then polled for
//! results. [`PricingSessionClient`] is the seam between the search engine
//! and the transport; [`SkyscannerClient`] implements it over HTTP.

pub mod response;
pub mod skyscanner;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{PricingOption, SearchDates};

pub use response::PollResponse;
pub use skyscanner::SkyscannerClient;

/// Opaque key of one in-flight pricing session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The origin/destination pair a session prices, with the destination's
/// display name copied onto the resulting [`PricingOption`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub origin: String,
    pub destination: String,
    pub destination_name: String,
}

impl Route {
    #[must_use]
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        destination_name: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            destination_name: destination_name.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}

/// Session creation failures. All of them are retried by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Pricing API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("No session key was returned")]
    MissingSessionKey,
}

/// Poll failures, classified by how the engine reacts to them
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    /// The API itself reported its rate limit; retry
    #[error("Rate limit has been exceeded")]
    RateLimited,

    /// The session finished without any pricing option for this leg
    #[error("No pricing option was found for this leg")]
    NoPricingFound,

    /// Anything else; the search for this leg is abandoned
    #[error("Poll failed: {0}")]
    Failed(String),
}

/// Client for the asynchronous pricing session protocol
#[async_trait]
pub trait PricingSessionClient: Send + Sync {
    /// Open a pricing session for a round trip from `origin` to `destination`
    async fn create_session(
        &self,
        dates: &SearchDates,
        origin: &str,
        destination: &str,
    ) -> Result<SessionHandle, SessionError>;

    /// Poll a session once and return its cheapest pricing option
    async fn poll_session(
        &self,
        session: &SessionHandle,
        route: &Route,
    ) -> Result<PricingOption, PollError>;
}

#[async_trait]
impl<C: PricingSessionClient + ?Sized> PricingSessionClient for std::sync::Arc<C> {
    async fn create_session(
        &self,
        dates: &SearchDates,
        origin: &str,
        destination: &str,
    ) -> Result<SessionHandle, SessionError> {
        (**self).create_session(dates, origin, destination).await
    }

    async fn poll_session(
        &self,
        session: &SessionHandle,
        route: &Route,
    ) -> Result<PricingOption, PollError> {
        (**self).poll_session(session, route).await
    }
}
