//! `FlightFinder` - cheapest common destination for a group of travelers
//!
//! This library prices round trips for every traveler of a group to a list of
//! candidate destinations and ranks the destinations by total group cost.

pub mod config;
pub mod error;
pub mod locations;
pub mod models;
pub mod pricing;
pub mod rate_limiter;
pub mod results;
pub mod search;
pub mod telemetry;

// Re-export core types for public API
pub use config::{FlightFinderConfig, ViabilityPolicy};
pub use error::FlightFinderError;
pub use locations::{LocationCatalog, PlaceSuggester};
pub use models::{Itineraries, Location, PricingOption, SearchDates, Traveler, Trip};
pub use pricing::{PricingSessionClient, SkyscannerClient};
pub use rate_limiter::RateLimiter;
pub use results::{ResultsStore, SavedResults};
pub use search::{DestinationRanker, PriceSearchEngine, Ranking, TripAggregator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, FlightFinderError>;
