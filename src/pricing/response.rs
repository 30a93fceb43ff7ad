//! Poll response body of the pricing API
//!
//! Every part of the body is optional on the wire. Each field is modelled as
//! an explicit `Option` so that "absent" is a distinguishable state, and
//! [`PollResponse::into_pricing_option`] turns the combination into exactly
//! one poll outcome.

use serde::Deserialize;

use super::{PollError, Route};
use crate::models::PricingOption;

/// Body returned when polling a pricing session
#[derive(Debug, Default, Deserialize)]
pub struct PollResponse {
    /// Gateway-level message, e.g. quota errors
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
    /// Session progress, `UpdatesPending` or `UpdatesComplete`
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "ValidationErrors", default)]
    pub validation_errors: Option<Vec<ValidationError>>,
    /// Itineraries, cheapest first
    #[serde(rename = "Itineraries", default)]
    pub itineraries: Option<Vec<Itinerary>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidationError {
    #[serde(rename = "ParameterName", default)]
    pub parameter_name: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Itinerary {
    /// Pricing options, cheapest first
    #[serde(rename = "PricingOptions", default)]
    pub pricing_options: Option<Vec<RawPricingOption>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawPricingOption {
    #[serde(rename = "Price", default)]
    pub price: Option<f64>,
    #[serde(rename = "DeeplinkUrl", default)]
    pub deeplink_url: Option<String>,
}

impl PollResponse {
    /// Whether the body reports that the API's own rate limit was hit
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.message
            .as_deref()
            .is_some_and(|message| message.to_lowercase().contains("rate limit"))
    }

    /// Validation messages joined for logging, if there are any
    #[must_use]
    pub fn validation_message(&self) -> Option<String> {
        let errors = self.validation_errors.as_ref()?;
        let messages: Vec<String> = errors
            .iter()
            .map(|error| match (&error.parameter_name, &error.message) {
                (Some(param), Some(message)) => format!("{param}: {message}"),
                (None, Some(message)) => message.clone(),
                (Some(param), None) => format!("{param}: invalid"),
                (None, None) => "unspecified validation error".to_string(),
            })
            .collect();

        (!messages.is_empty()).then(|| messages.join("; "))
    }

    /// Classify the body into the cheapest pricing option for `route` or the
    /// matching [`PollError`].
    ///
    /// The API sorts itineraries and their options by ascending price, so the
    /// first option of the first itinerary is the cheapest one.
    pub fn into_pricing_option(self, route: &Route) -> Result<PricingOption, PollError> {
        if self.is_rate_limited() {
            return Err(PollError::RateLimited);
        }

        if let Some(message) = self.validation_message() {
            return Err(PollError::Failed(format!(
                "poll response saw validation error: {message}"
            )));
        }

        let cheapest = self
            .itineraries
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|itinerary| itinerary.pricing_options)
            .and_then(|options| options.into_iter().next());

        let Some(raw) = cheapest else {
            return Err(PollError::NoPricingFound);
        };

        let price = match raw.price {
            Some(price) if price.is_finite() && price >= 0.0 => price,
            Some(price) => {
                return Err(PollError::Failed(format!("invalid price {price}")));
            }
            None => return Err(PollError::Failed("pricing option without price".to_string())),
        };

        Ok(PricingOption {
            price,
            deeplink: raw.deeplink_url.unwrap_or_default(),
            destination_name: route.destination_name.clone(),
            origin: route.origin.clone(),
            destination: route.destination.clone(),
        })
    }
}
