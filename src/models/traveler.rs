//! Traveler model: one member of the group and their home airport

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FlightFinderError;

/// A group member flying from `home`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traveler {
    pub name: String,
    /// Home location code, e.g. `PHL-sky`
    #[serde(alias = "location_code")]
    pub home: String,
}

impl Traveler {
    #[must_use]
    pub fn new(name: impl Into<String>, home: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            home: home.into(),
        }
    }

    /// Whether this traveler already lives at `location_code`
    #[must_use]
    pub fn lives_at(&self, location_code: &str) -> bool {
        self.home == location_code
    }
}

impl fmt::Display for Traveler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.home)
    }
}

/// Parses `name=CODE`
impl FromStr for Traveler {
    type Err = FlightFinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, home) = s.split_once('=').ok_or_else(|| {
            FlightFinderError::validation(format!(
                "Traveler '{s}' must be in format 'name=LOCATION_CODE'"
            ))
        })?;

        let name = name.trim();
        let home = home.trim();
        if name.is_empty() || home.is_empty() {
            return Err(FlightFinderError::validation(format!(
                "Traveler '{s}' needs both a name and a location code"
            )));
        }

        Ok(Self::new(name, home))
    }
}

/// Check that a traveler group is usable for a search: non-empty, no blank
/// fields and unique names.
pub fn validate_group(travelers: &[Traveler]) -> crate::Result<()> {
    if travelers.is_empty() {
        return Err(FlightFinderError::validation(
            "At least one traveler is required",
        ));
    }

    let mut seen = HashSet::new();
    for traveler in travelers {
        if traveler.name.trim().is_empty() || traveler.home.trim().is_empty() {
            return Err(FlightFinderError::validation(format!(
                "Traveler '{traveler}' needs both a name and a location code"
            )));
        }
        if !seen.insert(traveler.name.as_str()) {
            return Err(FlightFinderError::validation(format!(
                "Duplicate traveler name '{}'",
                traveler.name
            )));
        }
    }

    Ok(())
}
