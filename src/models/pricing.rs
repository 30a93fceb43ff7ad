//! Priced legs and search dates

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::FlightFinderError;

/// Deep link used for travelers who are already at the destination
pub const ALREADY_HOME_DEEPLINK: &str = "This person already lives here";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One priced round trip for one traveler to one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingOption {
    /// Price in the configured currency, never negative
    #[serde(rename = "Price")]
    pub price: f64,
    /// Booking link for this fare
    #[serde(rename = "DeeplinkUrl")]
    pub deeplink: String,
    /// Destination display name
    #[serde(rename = "Location", default)]
    pub destination_name: String,
    #[serde(rename = "SrcAirport", default)]
    pub origin: String,
    #[serde(rename = "DstAirport", default)]
    pub destination: String,
}

impl PricingOption {
    /// Zero-cost option for a traveler whose home is the destination
    #[must_use]
    pub fn already_home(location_code: &str, destination_name: &str) -> Self {
        Self {
            price: 0.0,
            deeplink: ALREADY_HOME_DEEPLINK.to_string(),
            destination_name: destination_name.to_string(),
            origin: location_code.to_string(),
            destination: location_code.to_string(),
        }
    }

    /// Whether this is the zero-cost "already home" placeholder
    #[must_use]
    pub fn is_already_home(&self) -> bool {
        self.price == 0.0 && self.deeplink == ALREADY_HOME_DEEPLINK
    }
}

/// Outbound and inbound dates of the round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDates {
    pub outbound: NaiveDate,
    pub inbound: NaiveDate,
}

impl SearchDates {
    /// Create search dates; the inbound flight cannot precede the outbound one
    pub fn new(outbound: NaiveDate, inbound: NaiveDate) -> crate::Result<Self> {
        if inbound < outbound {
            return Err(FlightFinderError::validation(format!(
                "Inbound date {inbound} is before outbound date {outbound}"
            )));
        }
        Ok(Self { outbound, inbound })
    }

    /// Parse both dates from `YYYY-MM-DD`
    pub fn parse(outbound: &str, inbound: &str) -> crate::Result<Self> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
                FlightFinderError::validation(format!(
                    "Invalid date '{value}', expected YYYY-MM-DD: {e}"
                ))
            })
        };
        Self::new(parse(outbound)?, parse(inbound)?)
    }

    /// Outbound date as sent to the pricing API
    #[must_use]
    pub fn outbound_param(&self) -> String {
        self.outbound.format(DATE_FORMAT).to_string()
    }

    /// Inbound date as sent to the pricing API
    #[must_use]
    pub fn inbound_param(&self) -> String {
        self.inbound.format(DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_home_option() {
        let option = PricingOption::already_home("JFK-sky", "New York JFK");
        assert_eq!(option.price, 0.0);
        assert!(option.is_already_home());
        assert_eq!(option.origin, "JFK-sky");
        assert_eq!(option.destination, "JFK-sky");
    }

    #[test]
    fn test_pricing_option_serializes_result_file_format() {
        let option = PricingOption {
            price: 120.5,
            deeplink: "https://book.example/abc".to_string(),
            destination_name: "Chicago O'Hare".to_string(),
            origin: "DEN-sky".to_string(),
            destination: "ORD-sky".to_string(),
        };

        let value = serde_json::to_value(&option).unwrap();
        assert_eq!(value["Price"], 120.5);
        assert_eq!(value["DeeplinkUrl"], "https://book.example/abc");
        assert_eq!(value["Location"], "Chicago O'Hare");
        assert_eq!(value["SrcAirport"], "DEN-sky");
        assert_eq!(value["DstAirport"], "ORD-sky");
    }

    #[test]
    fn test_search_dates_parse() {
        let dates = SearchDates::parse("2020-01-01", "2020-01-05").unwrap();
        assert_eq!(dates.outbound_param(), "2020-01-01");
        assert_eq!(dates.inbound_param(), "2020-01-05");
    }

    #[test]
    fn test_search_dates_same_day_trip_allowed() {
        assert!(SearchDates::parse("2020-01-01", "2020-01-01").is_ok());
    }

    #[test]
    fn test_search_dates_rejects_inverted_and_malformed() {
        let inverted = SearchDates::parse("2020-01-05", "2020-01-01");
        assert!(matches!(inverted, Err(FlightFinderError::Validation { .. })));

        let malformed = SearchDates::parse("01/01/2020", "2020-01-05");
        assert!(malformed.unwrap_err().to_string().contains("YYYY-MM-DD"));
    }
}
