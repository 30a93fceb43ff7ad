//! Per-destination itineraries and their aggregate cost

use serde::{Deserialize, Serialize};

use super::{Location, PricingOption};

/// All priced legs found for one candidate destination.
///
/// Legs are appended in traveler order and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub destination: String,
    pub destination_name: String,
    /// Size of the traveler group this trip was evaluated for
    pub traveler_count: usize,
    options: Vec<PricingOption>,
}

impl Trip {
    #[must_use]
    pub fn new(destination: &Location, traveler_count: usize) -> Self {
        Self {
            destination: destination.place_id.clone(),
            destination_name: destination.label().to_string(),
            traveler_count,
            options: Vec::with_capacity(traveler_count),
        }
    }

    pub fn push(&mut self, option: PricingOption) {
        self.options.push(option);
    }

    #[must_use]
    pub fn options(&self) -> &[PricingOption] {
        &self.options
    }

    #[must_use]
    pub fn into_options(self) -> Vec<PricingOption> {
        self.options
    }

    /// Sum of every recorded leg, whether or not the trip is viable
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.options.iter().map(|option| option.price).sum()
    }

    /// Aggregate cost, only defined once every traveler has a leg
    #[must_use]
    pub fn aggregate_cost(&self) -> Option<f64> {
        self.is_viable().then(|| self.total_cost())
    }

    /// Every traveler in the group has a recorded leg
    #[must_use]
    pub fn is_viable(&self) -> bool {
        self.options.len() == self.traveler_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Number of travelers that actually need to fly (excludes the
    /// "already home" placeholders)
    #[must_use]
    pub fn flying_travelers(&self) -> usize {
        self.options
            .iter()
            .filter(|option| !option.is_already_home())
            .count()
    }
}

/// Trips for every evaluated destination, in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itineraries {
    trips: Vec<Trip>,
}

impl Itineraries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a destination's trip
    pub fn insert(&mut self, trip: Trip) {
        self.trips.push(trip);
    }

    #[must_use]
    pub fn get(&self, destination: &str) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.destination == destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trip> {
        self.trips.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trips.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

impl IntoIterator for Itineraries {
    type Item = Trip;
    type IntoIter = std::vec::IntoIter<Trip>;

    fn into_iter(self) -> Self::IntoIter {
        self.trips.into_iter()
    }
}
