//! Location model for candidate destination airports

use serde::{Deserialize, Serialize};

/// A place known to the pricing API, usually an airport.
///
/// Field names follow the pricing API's place format so catalog files and
/// place-suggestion responses deserialize directly.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// Location code used in searches, e.g. `PHL-sky`
    #[serde(rename = "PlaceId")]
    pub place_id: String,
    /// Display name (airport or city)
    #[serde(rename = "PlaceName", default)]
    pub place_name: String,
    #[serde(rename = "CountryId", default)]
    pub country_id: String,
    #[serde(rename = "RegionId", default)]
    pub region_id: String,
    #[serde(rename = "CityId", default)]
    pub city_id: String,
    #[serde(rename = "CountryName", default)]
    pub country_name: String,
}

impl Location {
    /// Create a location with only a code and display name
    #[must_use]
    pub fn new(place_id: impl Into<String>, place_name: impl Into<String>) -> Self {
        Self {
            place_id: place_id.into(),
            place_name: place_name.into(),
            ..Self::default()
        }
    }

    /// Create a location with its country
    #[must_use]
    pub fn with_country(
        place_id: impl Into<String>,
        place_name: impl Into<String>,
        country_name: impl Into<String>,
    ) -> Self {
        Self {
            place_id: place_id.into(),
            place_name: place_name.into(),
            country_name: country_name.into(),
            ..Self::default()
        }
    }

    /// Label used in logs and results: the display name, or the code when
    /// the catalog entry has no name
    #[must_use]
    pub fn label(&self) -> &str {
        if self.place_name.is_empty() {
            &self.place_id
        } else {
            &self.place_name
        }
    }

    /// One-line description including the hierarchical metadata
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "[ {} ] ID [ {} ] CountryID [ {} ] RegionID [ {} ] CityID [ {} ] CountryName [ {} ]",
            self.place_name,
            self.place_id,
            self.country_id,
            self.region_id,
            self.city_id,
            self.country_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_deserializes_api_place_format() {
        let json = r#"{
            "PlaceId": "DEN-sky",
            "PlaceName": "Denver International",
            "CountryId": "US-sky",
            "RegionId": "CO-sky",
            "CityId": "DENA-sky",
            "CountryName": "United States"
        }"#;

        let location: Location = serde_json::from_str(json).unwrap();
        assert_eq!(location.place_id, "DEN-sky");
        assert_eq!(location.place_name, "Denver International");
        assert_eq!(location.region_id, "CO-sky");
        assert_eq!(location.country_name, "United States");
    }

    #[test]
    fn test_location_missing_metadata_defaults_to_empty() {
        let location: Location = serde_json::from_str(r#"{"PlaceId": "ORD-sky"}"#).unwrap();
        assert_eq!(location.place_id, "ORD-sky");
        assert!(location.country_name.is_empty());
        assert_eq!(location.label(), "ORD-sky");
    }

    #[test]
    fn test_location_describe() {
        let location = Location::with_country("LAX-sky", "Los Angeles", "United States");
        let line = location.describe();
        assert!(line.contains("[ Los Angeles ]"));
        assert!(line.contains("ID [ LAX-sky ]"));
        assert!(line.contains("CountryName [ United States ]"));
    }
}
