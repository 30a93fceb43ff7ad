//! Data models for the flight-finder application
//!
//! This module contains the core domain models organized by concern:
//! - Location: candidate destination airports and their display metadata
//! - Traveler: group members and their home airports
//! - Pricing: priced legs returned by the pricing API and the search dates
//! - Trip: per-destination itineraries and their aggregate cost

pub mod location;
pub mod pricing;
pub mod traveler;
pub mod trip;

// Re-export all public types for convenient access
pub use location::Location;
pub use pricing::{PricingOption, SearchDates};
pub use traveler::{Traveler, validate_group};
pub use trip::{Itineraries, Trip};
