//! Result persistence
//!
//! A run's trips are written to two JSON files, one for viable trips and one
//! for partial ones. Each file holds an array of trips, each trip an array of
//! its pricing options, cheapest trip first.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::FlightFinderError;
use crate::config::ResultsConfig;
use crate::models::{Itineraries, PricingOption};

/// Pricing options of one destination, as stored on disk
pub type SavedTrip = Vec<PricingOption>;

/// Result files of a run, read back from disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedResults {
    pub viable: Vec<SavedTrip>,
    pub non_viable: Vec<SavedTrip>,
}

fn trip_total(trip: &[PricingOption]) -> f64 {
    trip.iter().map(|option| option.price).sum()
}

/// Reads and writes the viable and non-viable result files
#[derive(Debug, Clone)]
pub struct ResultsStore {
    viable_path: PathBuf,
    non_viable_path: PathBuf,
}

impl ResultsStore {
    #[must_use]
    pub fn new(viable_path: impl Into<PathBuf>, non_viable_path: impl Into<PathBuf>) -> Self {
        Self {
            viable_path: viable_path.into(),
            non_viable_path: non_viable_path.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ResultsConfig) -> Self {
        Self::new(&config.viable_path, &config.non_viable_path)
    }

    #[must_use]
    pub fn viable_path(&self) -> &Path {
        &self.viable_path
    }

    #[must_use]
    pub fn non_viable_path(&self) -> &Path {
        &self.non_viable_path
    }

    /// Split `itineraries` by viability and write both files.
    ///
    /// A trip is viable when it has one option per traveler. Trips without
    /// any option are left out.
    #[instrument(skip_all, fields(trips = itineraries.len()))]
    pub fn write(
        &self,
        itineraries: &Itineraries,
        traveler_count: usize,
    ) -> crate::Result<SavedResults> {
        let mut results = SavedResults::default();

        for trip in itineraries.iter().filter(|trip| !trip.is_empty()) {
            let options = trip.options().to_vec();
            if options.len() == traveler_count {
                results.viable.push(options);
            } else {
                results.non_viable.push(options);
            }
        }

        results
            .viable
            .sort_by(|a, b| trip_total(a).total_cmp(&trip_total(b)));
        results
            .non_viable
            .sort_by(|a, b| trip_total(a).total_cmp(&trip_total(b)));

        write_json(&self.viable_path, &results.viable)?;
        write_json(&self.non_viable_path, &results.non_viable)?;

        info!(
            "Wrote {} viable and {} non-viable trips",
            results.viable.len(),
            results.non_viable.len()
        );
        Ok(results)
    }

    /// Read both result files back
    pub fn load(&self) -> crate::Result<SavedResults> {
        Ok(SavedResults {
            viable: read_json(&self.viable_path)?,
            non_viable: read_json(&self.non_viable_path)?,
        })
    }
}

fn write_json(path: &Path, trips: &[SavedTrip]) -> crate::Result<()> {
    let json = serde_json::to_string_pretty(trips).map_err(|e| {
        FlightFinderError::results(format!("Failed to serialize {}: {e}", path.display()))
    })?;
    std::fs::write(path, json).map_err(|e| {
        FlightFinderError::results(format!("Failed to write {}: {e}", path.display()))
    })?;
    debug!("Wrote {} trips to {}", trips.len(), path.display());
    Ok(())
}

fn read_json(path: &Path) -> crate::Result<Vec<SavedTrip>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        FlightFinderError::results(format!("Failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        FlightFinderError::results(format!("Failed to parse {}: {e}", path.display()))
    })
}

impl SavedResults {
    /// Human-readable listing of both sections
    #[must_use]
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        render_section(&mut out, "VIABLE TRIPS", &self.viable);
        render_section(&mut out, "NON VIABLE TRIPS", &self.non_viable);
        out
    }
}

fn render_section(out: &mut String, title: &str, trips: &[SavedTrip]) {
    let rule = "====================================";
    let _ = write!(out, "\n\n{rule}\n===== {title}\n{rule}\n\n");

    for trip in trips {
        let location = trip
            .first()
            .map_or("unknown", |option| option.destination_name.as_str());
        let _ = write!(
            out,
            "\nLOCATION: {location}\nTOTAL PRICE: ${:.2}\n\n",
            trip_total(trip)
        );
    }
}
