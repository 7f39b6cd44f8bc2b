//! The two fixed locations the overlay reports on

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unknown location id error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown location: {0}")]
pub struct UnknownLocation(pub String);

/// A known location. Ordering is the overlay order: the first location is
/// drawn on the left, the second on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Alicante,
    Bratislava,
}

impl Location {
    /// Every known location, in overlay order
    pub const ALL: [Location; 2] = [Location::Alicante, Location::Bratislava];

    /// Stable identifier, also used as the cache key
    pub fn id(&self) -> &'static str {
        match self {
            Location::Alicante => "alicante",
            Location::Bratislava => "bratislava",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Location::Alicante => "Alicante",
            Location::Bratislava => "Bratislava",
        }
    }

    /// Three-letter code used by the difference indicator
    pub fn short_code(&self) -> &'static str {
        match self {
            Location::Alicante => "ALI",
            Location::Bratislava => "BRA",
        }
    }

    pub fn latitude(&self) -> f64 {
        match self {
            Location::Alicante => 38.3452,
            Location::Bratislava => 48.1486,
        }
    }

    pub fn longitude(&self) -> f64 {
        match self {
            Location::Alicante => -0.4815,
            Location::Bratislava => 17.1077,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::ALL
            .into_iter()
            .find(|loc| loc.id() == s)
            .ok_or_else(|| UnknownLocation(s.to_string()))
    }
}
