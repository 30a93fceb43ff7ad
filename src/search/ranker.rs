//! Destination ranking
//!
//! Evaluates candidate destinations in catalog order and keeps the cheapest
//! eligible one. Which trips are eligible is decided by a [`ViabilityPolicy`]:
//! by default only trips where the whole group found a flight may win, and a
//! zero total (everybody already lives there) never wins.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::aggregator::TripAggregator;
use crate::config::{SearchConfig, ViabilityPolicy};
use crate::models::{Itineraries, Location, SearchDates, Traveler, Trip};
use crate::pricing::PricingSessionClient;

/// How the ranker selects and reports winners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingPolicy {
    pub viability: ViabilityPolicy,
    /// Length of the cheapest-destinations list
    pub top_k: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for RankingPolicy {
    fn from(config: &SearchConfig) -> Self {
        Self {
            viability: config.viability,
            top_k: config.top_k,
        }
    }
}

/// Whether `trip` may compete for cheapest destination under `viability`
#[must_use]
pub fn is_eligible(trip: &Trip, viability: ViabilityPolicy) -> bool {
    let covered = match viability {
        ViabilityPolicy::FullCoverage => trip.is_viable(),
        ViabilityPolicy::AnyPricedLeg => !trip.is_empty(),
    };
    covered && trip.total_cost() > 0.0
}

/// One destination in the ranking output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTrip {
    pub destination: String,
    pub destination_name: String,
    pub cost: f64,
    pub viable: bool,
}

impl From<&Trip> for RankedTrip {
    fn from(trip: &Trip) -> Self {
        Self {
            destination: trip.destination.clone(),
            destination_name: trip.destination_name.clone(),
            cost: trip.total_cost(),
            viable: trip.is_viable(),
        }
    }
}

/// Outcome of a ranking run
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Cheapest eligible destination, if any destination was eligible
    pub cheapest: Option<RankedTrip>,
    /// Eligible destinations, cheapest first, at most `top_k` of them
    pub top: Vec<RankedTrip>,
    /// Every evaluated destination's trip, in evaluation order
    pub itineraries: Itineraries,
    /// The run stopped early on cancellation
    pub cancelled: bool,
}

impl Ranking {
    #[must_use]
    pub fn cheapest_destination(&self) -> Option<&str> {
        self.cheapest.as_ref().map(|c| c.destination.as_str())
    }

    #[must_use]
    pub fn cheapest_cost(&self) -> Option<f64> {
        self.cheapest.as_ref().map(|c| c.cost)
    }

    /// Itinerary of the cheapest destination
    #[must_use]
    pub fn cheapest_trip(&self) -> Option<&Trip> {
        self.itineraries.get(self.cheapest_destination()?)
    }
}

/// Finds the cheapest destination for a traveler group
pub struct DestinationRanker<C> {
    aggregator: TripAggregator<C>,
    policy: RankingPolicy,
}

impl<C: PricingSessionClient> DestinationRanker<C> {
    pub fn new(aggregator: TripAggregator<C>, policy: RankingPolicy) -> Self {
        Self { aggregator, policy }
    }

    pub fn aggregator(&self) -> &TripAggregator<C> {
        &self.aggregator
    }

    pub fn policy(&self) -> RankingPolicy {
        self.policy
    }

    /// Evaluate every destination and select the cheapest eligible one.
    ///
    /// Strictly cheaper trips replace the current best, so ties go to the
    /// destination evaluated first. On cancellation the trips computed so
    /// far are kept and the run ends early.
    #[instrument(skip_all, fields(destinations = destinations.len(), travelers = travelers.len()))]
    pub async fn rank(
        &self,
        destinations: &[Location],
        travelers: &[Traveler],
        dates: &SearchDates,
    ) -> Ranking {
        let cancel = self.aggregator.engine().cancellation();
        let mut ranking = Ranking::default();
        let mut eligible: Vec<RankedTrip> = Vec::new();

        for (index, destination) in destinations.iter().enumerate() {
            if cancel.is_cancelled() {
                ranking.cancelled = true;
                break;
            }

            info!(
                "Initiating sessions for {} ({}/{})",
                destination.label(),
                index + 1,
                destinations.len()
            );
            let trip = self
                .aggregator
                .evaluate_destination(destination, travelers, dates)
                .await;

            // A trip interrupted by cancellation is recorded but never ranked
            if cancel.is_cancelled() {
                warn!("Search cancelled while evaluating {}", destination.label());
                ranking.itineraries.insert(trip);
                ranking.cancelled = true;
                break;
            }

            if is_eligible(&trip, self.policy.viability) {
                let candidate = RankedTrip::from(&trip);
                debug!(
                    "Comparing {:.2} against {:?}",
                    candidate.cost,
                    ranking.cheapest_cost()
                );

                if ranking
                    .cheapest
                    .as_ref()
                    .is_none_or(|best| candidate.cost < best.cost)
                {
                    info!(
                        "New cheapest destination: {} at {:.2}",
                        candidate.destination_name, candidate.cost
                    );
                    ranking.cheapest = Some(candidate.clone());
                }
                eligible.push(candidate);
            } else {
                debug!(
                    "{} is not eligible ({}/{} travelers priced, total {:.2})",
                    destination.label(),
                    trip.options().len(),
                    travelers.len(),
                    trip.total_cost()
                );
            }

            ranking.itineraries.insert(trip);
        }

        // Stable sort keeps evaluation order among equal costs
        eligible.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        eligible.truncate(self.policy.top_k);
        ranking.top = eligible;

        match &ranking.cheapest {
            Some(best) => info!(
                "Cheapest destination is {} at {:.2}",
                best.destination_name, best.cost
            ),
            None => warn!("No destination had an eligible trip"),
        }
        ranking
    }
}
