//! Group destination search
//!
//! - [`engine`]: resolves one traveler's best price to one destination
//! - [`aggregator`]: combines the group's prices into a per-destination trip
//! - [`ranker`]: evaluates all destinations and picks the cheapest

pub mod aggregator;
pub mod engine;
pub mod ranker;

pub use aggregator::TripAggregator;
pub use engine::{
    AbandonReason, PriceSearchEngine, RetryBudget, RetryPolicy, SearchAbandoned, SearchState,
    SearchStatsSnapshot,
};
pub use ranker::{DestinationRanker, RankedTrip, Ranking, RankingPolicy, is_eligible};
