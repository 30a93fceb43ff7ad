//! Trip aggregation for one destination

use tracing::{info, instrument, warn};

use super::engine::PriceSearchEngine;
use crate::models::{Location, SearchDates, Traveler, Trip};
use crate::pricing::PricingSessionClient;

/// Prices every traveler's leg to a destination and sums the result
pub struct TripAggregator<C> {
    engine: PriceSearchEngine<C>,
}

impl<C: PricingSessionClient> TripAggregator<C> {
    pub fn new(engine: PriceSearchEngine<C>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &PriceSearchEngine<C> {
        &self.engine
    }

    /// Evaluate `destination` for the whole group, one traveler at a time.
    ///
    /// Travelers whose search is abandoned contribute nothing; the returned
    /// trip is then not viable. Never fails.
    #[instrument(skip_all, fields(destination = %destination.place_id))]
    pub async fn evaluate_destination(
        &self,
        destination: &Location,
        travelers: &[Traveler],
        dates: &SearchDates,
    ) -> Trip {
        let mut trip = Trip::new(destination, travelers.len());

        for traveler in travelers {
            match self.engine.find_best_price(traveler, destination, dates).await {
                Ok(option) => trip.push(option),
                Err(abandoned) => {
                    warn!(
                        "No flight for {} to {}: {}",
                        traveler.name,
                        destination.label(),
                        abandoned.reason
                    );
                }
            }

            if self.engine.cancellation().is_cancelled() {
                break;
            }
        }

        info!(
            "{}: total {:.2} with {}/{} travelers priced ({} flying)",
            destination.label(),
            trip.total_cost(),
            trip.options().len(),
            travelers.len(),
            trip.flying_travelers()
        );
        trip
    }
}
