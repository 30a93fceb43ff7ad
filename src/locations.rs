//! Location Catalog Module
//!
//! This module handles loading the candidate destination list from disk,
//! filtering it, and building it from place-suggestion lookups.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::FlightFinderError;
use crate::models::Location;

/// On-disk and wire format of a list of places
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceList {
    #[serde(rename = "Places", default)]
    pub places: Vec<Location>,
}

/// Source of place suggestions for free-text queries
#[async_trait]
pub trait PlaceSuggester: Send + Sync {
    async fn suggest_places(&self, query: &str) -> crate::Result<Vec<Location>>;
}

/// Fixed, ordered list of candidate destinations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationCatalog {
    locations: Vec<Location>,
}

impl LocationCatalog {
    #[must_use]
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    /// Load the catalog from a `{"Places": [...]}` JSON file
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        debug!("Loading locations from {}", path.display());

        let raw = std::fs::read_to_string(path).map_err(|e| {
            FlightFinderError::location(format!("Failed to read {}: {e}", path.display()))
        })?;

        let list: PlaceList = serde_json::from_str(&raw).map_err(|e| {
            FlightFinderError::location(format!("Failed to parse {}: {e}", path.display()))
        })?;

        info!(
            "Loaded {} candidate locations from {}",
            list.places.len(),
            path.display()
        );
        Ok(Self::new(list.places))
    }

    /// Write the catalog as a `{"Places": [...]}` JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let list = PlaceList {
            places: self.locations.clone(),
        };
        let json = serde_json::to_string_pretty(&list).map_err(|e| {
            FlightFinderError::location(format!("Failed to serialize locations: {e}"))
        })?;
        std::fs::write(path, json)?;

        info!("Saved {} locations to {}", self.locations.len(), path.display());
        Ok(())
    }

    /// Keep only locations in one of `countries`; no filter keeps everything
    #[must_use]
    pub fn filter_by_country(&self, countries: &[String]) -> Self {
        if countries.is_empty() {
            return self.clone();
        }

        let locations: Vec<Location> = self
            .locations
            .iter()
            .filter(|location| {
                countries
                    .iter()
                    .any(|country| location.country_name.eq_ignore_ascii_case(country))
            })
            .cloned()
            .collect();

        debug!(
            "Country filter {:?} kept {} of {} locations",
            countries,
            locations.len(),
            self.locations.len()
        );
        Self::new(locations)
    }

    #[must_use]
    pub fn list(&self) -> &[Location] {
        &self.locations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// One line per location
    #[must_use]
    pub fn describe(&self) -> String {
        self.locations
            .iter()
            .map(Location::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build a catalog by looking up every non-empty query line.
    ///
    /// Failed lookups are skipped. Requests are spaced by `delay`; when
    /// `cancel` fires, the locations found so far are returned.
    pub async fn discover<S: PlaceSuggester + ?Sized>(
        suggester: &S,
        queries: &str,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Self {
        let mut locations: Vec<Location> = Vec::new();

        for query in queries.lines().map(str::trim).filter(|q| !q.is_empty()) {
            if cancel.is_cancelled() {
                warn!("Discovery cancelled, keeping {} locations", locations.len());
                break;
            }

            match suggester.suggest_places(query).await {
                Ok(found) => {
                    debug!("'{}' matched {} places", query, found.len());
                    for location in found {
                        if !locations.iter().any(|l| l.place_id == location.place_id) {
                            locations.push(location);
                        }
                    }
                }
                Err(e) => {
                    warn!("Could not find location '{}': {}", query, e);
                    continue;
                }
            }

            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!("Discovered {} locations", locations.len());
        Self::new(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample() -> LocationCatalog {
        LocationCatalog::new(vec![
            Location::with_country("DEN-sky", "Denver", "United States"),
            Location::with_country("CDG-sky", "Paris Charles de Gaulle", "France"),
            Location::with_country("ORD-sky", "Chicago O'Hare", "United States"),
        ])
    }

    struct FakeSuggester {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PlaceSuggester for FakeSuggester {
        async fn suggest_places(&self, query: &str) -> crate::Result<Vec<Location>> {
            self.queries.lock().unwrap().push(query.to_string());
            match query {
                "Denver" => Ok(vec![Location::new("DEN-sky", "Denver")]),
                "Chicago" => Ok(vec![
                    Location::new("ORD-sky", "Chicago O'Hare"),
                    Location::new("MDW-sky", "Chicago Midway"),
                ]),
                "Colorado" => Ok(vec![Location::new("DEN-sky", "Denver")]),
                _ => Err(FlightFinderError::api("no match")),
            }
        }
    }

    #[test]
    fn test_filter_by_country() {
        let catalog = sample();
        let us = catalog.filter_by_country(&["united states".to_string()]);
        let codes: Vec<&str> = us.list().iter().map(|l| l.place_id.as_str()).collect();
        assert_eq!(codes, vec!["DEN-sky", "ORD-sky"]);

        assert_eq!(catalog.filter_by_country(&[]).len(), 3);
        assert!(catalog.filter_by_country(&["Peru".to_string()]).is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airports.json");

        sample().save(&path).unwrap();
        let loaded = LocationCatalog::load(&path).unwrap();

        assert_eq!(loaded, sample());
        assert_eq!(loaded.list()[1].country_name, "France");
    }

    #[test]
    fn test_load_missing_file_is_location_error() {
        let result = LocationCatalog::load("/nonexistent/airports.json");
        assert!(matches!(result, Err(FlightFinderError::Location { .. })));
    }

    #[test]
    fn test_load_malformed_file_is_location_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airports.json");
        std::fs::write(&path, "not json").unwrap();

        let result = LocationCatalog::load(&path);
        assert!(matches!(result, Err(FlightFinderError::Location { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_skips_failures_and_duplicates() {
        let suggester = FakeSuggester {
            queries: Mutex::new(Vec::new()),
        };
        let queries = "Denver\n\nAtlantis\nChicago\nColorado\n";

        let catalog = LocationCatalog::discover(
            &suggester,
            queries,
            Duration::from_millis(1250),
            &CancellationToken::new(),
        )
        .await;

        let codes: Vec<&str> = catalog.list().iter().map(|l| l.place_id.as_str()).collect();
        assert_eq!(codes, vec!["DEN-sky", "ORD-sky", "MDW-sky"]);
        assert_eq!(suggester.queries.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_discover_stops_when_cancelled() {
        let suggester = FakeSuggester {
            queries: Mutex::new(Vec::new()),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let catalog =
            LocationCatalog::discover(&suggester, "Denver\nChicago", Duration::ZERO, &cancel)
                .await;

        assert!(catalog.is_empty());
        assert!(suggester.queries.lock().unwrap().is_empty());
    }
}
