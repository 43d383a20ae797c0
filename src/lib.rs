//! # Turf Routes
//!
//! Ownership timelines, expected zone values and value-per-time route search
//! built from a raw Turf takeover log.
//!
//! This library provides:
//! - Reconstruction of who held each zone and for how long
//! - An expected capture value per zone, carried across periods
//! - Journey inference and robust travel times between zones
//! - All-pairs shortest travel times and a pivot-based route search that
//!   maximizes points per second under a time budget
//!
//! ## Features
//!
//! - **`parallel`** - Run the all-pairs shortest path search with rayon
//! - **`serde`** - Serialize inputs and reports
//! - **`cli`** - Build the `turf-report` command-line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use turf_routes::{
//!     nominal_cutoff, ActorId, Analysis, AnalysisConfig, LocationId, Period,
//!     RawEvent, StaticLocation,
//! };
//!
//! let mut catalog = BTreeMap::new();
//! catalog.insert(LocationId(1), StaticLocation::new("Slottet", 100, 10, 57.70, 11.97));
//!
//! let mut log = BTreeMap::new();
//! log.insert(LocationId(1), vec![
//!     RawEvent::new("2014-06-01T08:00:00+0000", ActorId(1)),
//!     RawEvent::new("2014-06-01T13:00:00+0000", ActorId(2)),
//! ]);
//!
//! let cutoff = nominal_cutoff(chrono::NaiveDate::from_ymd_opt(2014, 6, 2).unwrap());
//! let config = AnalysisConfig::new(Period::Finished { cutoff });
//! let analysis = Analysis::run(&catalog, &log, &BTreeMap::new(), config);
//!
//! // One complete 5h interval (150) and one complete 23h interval (330)
//! assert_eq!(analysis.expected_values()[&LocationId(1)], Some(240));
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{DataError, RouteError};

pub mod geo_utils;
pub use geo_utils::{Direction, HomeConfig, LocalityIndex};

pub mod registry;
pub use registry::{Actor, ActorRegistry, Location, LocationHandle, LocationRegistry};

// Ownership intervals
pub mod timeline;
pub use timeline::{
    build_timelines, parse_timestamp, Period, PossessionInterval, TimelineBuild, TimelineConfig,
};

// Expected value per location
pub mod estimator;
pub use estimator::{estimate_all, expected_value, EstimatorConfig, Perspective};

// Journeys and connections
pub mod journeys;
pub use journeys::{
    aggregate_connections, infer_journeys, robust_average, Connection, ConnectionSet, Journey,
    JourneyConfig,
};

// Travel-time graph
pub mod graph;
pub use graph::TravelGraph;

// Route search
pub mod route;
pub use route::{Refinement, RouteConfig, RouteOptimizer, RoutePath, RouteSearch, RouteStop};

pub mod analysis;
pub use analysis::{Analysis, AnalysisConfig, RouteQuery};

pub mod report;

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of a zone, as used by the game service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct LocationId(pub u64);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A WGS84 coordinate.
///
/// # Example
/// ```
/// use turf_routes::GeoPoint;
/// let point = GeoPoint::new(57.7089, 11.9746); // Gothenburg
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Static metadata for one zone, as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StaticLocation {
    pub name: String,
    /// Points awarded on takeover
    pub base_value: i64,
    /// Points accrued per hour held
    pub hourly_rate: i64,
    pub longitude: f64,
    pub latitude: f64,
}

impl StaticLocation {
    pub fn new(name: &str, base_value: i64, hourly_rate: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            base_value,
            hourly_rate,
            longitude,
            latitude,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// One takeover as recorded in the ownership log: when, and who took it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawEvent {
    /// ISO-8601-like timestamp, e.g. `2014-06-01T12:00:00+0000`
    pub timestamp: String,
    pub holder: ActorId,
}

impl RawEvent {
    pub fn new(timestamp: &str, holder: ActorId) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            holder,
        }
    }
}

/// Static metadata keyed by zone.
pub type StaticCatalog = BTreeMap<LocationId, StaticLocation>;

/// Chronological takeovers keyed by zone.
pub type OwnershipLog = BTreeMap<LocationId, Vec<RawEvent>>;

/// Expected values carried over from an earlier run. `None` marks a zone
/// whose value was unknown and is read back as no prior.
pub type PriorValues = BTreeMap<LocationId, Option<i64>>;

// ============================================================================
// Helper Functions
// ============================================================================

/// The nominal end of a finished period: noon (UTC) on the given date.
///
/// ```
/// use turf_routes::nominal_cutoff;
/// let date = chrono::NaiveDate::from_ymd_opt(2014, 7, 1).unwrap();
/// assert_eq!(nominal_cutoff(date).to_rfc3339(), "2014-07-01T12:00:00+00:00");
/// ```
pub fn nominal_cutoff(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN + chrono::Duration::hours(12))
        .and_utc()
}

/// Format a duration in seconds as `M:SS`, or `H:MM:SS` past an hour.
pub fn format_secs(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let rem = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, rem)
    } else {
        format!("{}:{:02}", mins, rem)
    }
}

// ============================================================================
// Tests
// ============================================================================
