//! Error types.
//!
//! Data errors are scoped to a single location and never abort a report run:
//! the timeline builder collects them alongside whatever it could build.
//! Route errors are returned from route search when an endpoint cannot be
//! resolved or no path exists.

use thiserror::Error;

use crate::LocationId;

/// A problem with upstream data for one location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// The event log references a location with no static metadata.
    #[error("no static metadata for location {location}")]
    MissingMetadata { location: LocationId },

    /// A takeover timestamp could not be parsed; the location is skipped.
    #[error("malformed timestamp {value:?} for location {location}")]
    MalformedTimestamp { location: LocationId, value: String },
}

impl DataError {
    /// The location this error applies to.
    pub fn location(&self) -> LocationId {
        match self {
            DataError::MissingMetadata { location } => *location,
            DataError::MalformedTimestamp { location, .. } => *location,
        }
    }
}

/// Why a route search could not produce any candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No location matches the given name or identifier.
    #[error("unknown location: {0}")]
    UnknownLocation(String),

    /// The location exists but no journeys touch it, so it has no travel times.
    #[error("location {0} has no recorded connections")]
    NotInGraph(String),

    /// Both endpoints are in the graph but no path joins them.
    #[error("no path from {from} to {to}")]
    Unreachable { from: String, to: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_location() {
        let err = DataError::MalformedTimestamp {
            location: LocationId(7),
            value: "yesterday".to_string(),
        };
        assert_eq!(err.location(), LocationId(7));
        assert_eq!(
            err.to_string(),
            "malformed timestamp \"yesterday\" for location 7"
        );
    }

    #[test]
    fn test_route_error_message() {
        let err = RouteError::Unreachable {
            from: "Slottet".to_string(),
            to: "Hamnen".to_string(),
        };
        assert_eq!(err.to_string(), "no path from Slottet to Hamnen");
    }
}
