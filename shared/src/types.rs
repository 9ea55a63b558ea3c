//! Common types used across the scraper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

use crate::validation::validate_coordinates;

/// A geographic point identified by latitude and longitude in degrees.
///
/// The canonical string form `"{latitude},{longitude}"` is what the provider
/// expects as its `location` parameter, and it is also the equality key:
/// two locations are equal exactly when their canonical strings are equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Canonical `"latitude,longitude"` form
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.to_canonical_string() == other.to_canonical_string()
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_canonical_string().hash(state);
    }
}

/// Errors produced when parsing a canonical location string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationParseError {
    #[error("expected \"latitude,longitude\", got {0:?}")]
    Format(String),

    #[error("invalid coordinate {value:?}: {reason}")]
    Number { value: String, reason: String },

    #[error("{0}")]
    OutOfRange(&'static str),
}

impl FromStr for Location {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| LocationParseError::Format(s.to_string()))?;

        let parse = |value: &str| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|e| LocationParseError::Number {
                    value: value.to_string(),
                    reason: e.to_string(),
                })
        };

        let latitude = parse(lat)?;
        let longitude = parse(lon)?;
        validate_coordinates(latitude, longitude).map_err(LocationParseError::OutOfRange)?;

        Ok(Self::new(latitude, longitude))
    }
}
