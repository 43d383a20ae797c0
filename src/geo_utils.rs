//! # Geographic Utilities
//!
//! Distances between zones and direction filtering relative to a home point.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`Direction`] | Compass/locality filter relative to home |
//! | [`HomeConfig`] | Home coordinates and the extent of "local" |
//! | [`LocalityIndex`] | R-tree over zone coordinates for locality queries |
//! | [`allowed_locations`] | Zones of a catalog that pass a direction filter |
//!
//! ## Example
//!
//! ```rust
//! use turf_routes::{Direction, GeoPoint, HomeConfig};
//!
//! let home = HomeConfig::new(57.70, 11.97);
//! assert!(Direction::North.matches(GeoPoint::new(57.75, 11.97), &home));
//! assert!(!Direction::West.matches(GeoPoint::new(57.70, 12.10), &home));
//! ```
//!
//! ## Locality
//!
//! "Local" is a box around home rather than a radius: the longitude
//! difference must be under `local_radius_deg` and the latitude difference,
//! scaled by `latitude_scale` to roughly compensate for meridian convergence
//! at Nordic latitudes, must be too.

use geo::{Distance, Haversine, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::{GeoPoint, LocationId, StaticCatalog};

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two points in meters.
///
/// ```rust
/// use turf_routes::{GeoPoint, geo_utils};
///
/// let gothenburg = GeoPoint::new(57.7089, 11.9746);
/// let stockholm = GeoPoint::new(59.3293, 18.0686);
/// let dist = geo_utils::haversine_distance(gothenburg, stockholm);
/// assert!((dist - 398_000.0).abs() < 5_000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: GeoPoint, p2: GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

// =============================================================================
// Home & Direction
// =============================================================================

/// Home coordinates used by direction filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HomeConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Half-width of the "local" box in degrees. Default: 0.01
    pub local_radius_deg: f64,
    /// Multiplier applied to latitude differences. Default: 1.2
    pub latitude_scale: f64,
}

impl HomeConfig {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            local_radius_deg: 0.01,
            latitude_scale: 1.2,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Strict locality test used after the envelope pre-filter.
    fn is_local(&self, point: GeoPoint) -> bool {
        let long_measure = (point.longitude - self.longitude).abs();
        let lat_measure = (point.latitude - self.latitude).abs() * self.latitude_scale;
        long_measure < self.local_radius_deg && lat_measure < self.local_radius_deg
    }
}

/// Which zones to keep, relative to home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    North,
    South,
    East,
    West,
    Local,
}

impl Direction {
    /// Check whether a point lies in this direction from home.
    pub fn matches(&self, point: GeoPoint, home: &HomeConfig) -> bool {
        match self {
            Direction::North => point.latitude > home.latitude,
            Direction::South => point.latitude < home.latitude,
            Direction::East => point.longitude > home.longitude,
            Direction::West => point.longitude < home.longitude,
            Direction::Local => home.is_local(point),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Local => "local",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "north" => Ok(Direction::North),
            "south" => Ok(Direction::South),
            "east" => Ok(Direction::East),
            "west" => Ok(Direction::West),
            "local" => Ok(Direction::Local),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

// =============================================================================
// Spatial Index
// =============================================================================

/// A zone position stored in the R-tree.
#[derive(Debug, Clone, Copy)]
struct IndexedLocation {
    id: LocationId,
    point: GeoPoint,
}

impl RTreeObject for IndexedLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.longitude, self.point.latitude])
    }
}

/// R-tree over zone coordinates.
pub struct LocalityIndex {
    tree: RTree<IndexedLocation>,
}

impl LocalityIndex {
    /// Index every zone in the catalog with valid coordinates.
    pub fn build(catalog: &StaticCatalog) -> Self {
        let entries: Vec<IndexedLocation> = catalog
            .iter()
            .map(|(id, loc)| IndexedLocation {
                id: *id,
                point: loc.point(),
            })
            .filter(|e| e.point.is_valid())
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Zones inside the local box around home.
    pub fn local_to(&self, home: &HomeConfig) -> HashSet<LocationId> {
        let half_lng = home.local_radius_deg;
        let half_lat = home.local_radius_deg / home.latitude_scale.max(f64::EPSILON);
        let envelope = AABB::from_corners(
            [home.longitude - half_lng, home.latitude - half_lat],
            [home.longitude + half_lng, home.latitude + half_lat],
        );

        self.tree
            .locate_in_envelope(&envelope)
            .filter(|e| home.is_local(e.point))
            .map(|e| e.id)
            .collect()
    }
}

/// Zones of the catalog that pass the direction filter.
///
/// `Local` goes through the R-tree; the compass directions are plain
/// coordinate comparisons.
pub fn allowed_locations(
    catalog: &StaticCatalog,
    direction: Direction,
    home: &HomeConfig,
) -> HashSet<LocationId> {
    match direction {
        Direction::Local => LocalityIndex::build(catalog).local_to(home),
        _ => catalog
            .iter()
            .filter(|(_, loc)| direction.matches(loc.point(), home))
            .map(|(id, _)| *id)
            .collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
