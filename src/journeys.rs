//! Journey inference and connection aggregation.
//!
//! A journey is inferred when the same player takes two zones in quick
//! succession: travel is measured takeover to takeover, so the gap is
//! between the two interval *starts*. Gaps above `max_gap_secs` are
//! unrelated activity, not travel.
//!
//! Journeys between the same ordered pair of zones form a [`Connection`].
//! Its travel time is a robust mean: journeys slower than
//! `outlier_factor` times the current mean (walking instead of cycling,
//! a coffee stop) are dropped and the mean recomputed until nothing more
//! is dropped.

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::BTreeMap;

use crate::{ActorId, LocationHandle, PossessionInterval};

/// Configuration for journey inference and aggregation.
#[derive(Debug, Clone)]
pub struct JourneyConfig {
    /// Largest takeover-to-takeover gap counted as travel, in seconds.
    /// Default: 1200 (20 minutes, inclusive)
    pub max_gap_secs: i64,
    /// Journeys longer than this multiple of the mean are outliers.
    /// Default: 2.0
    pub outlier_factor: f64,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            max_gap_secs: 20 * 60,
            outlier_factor: 2.0,
        }
    }
}

/// Inferred travel by one player between two zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journey {
    pub actor: ActorId,
    pub from: LocationHandle,
    pub to: LocationHandle,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Journey {
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Infer journeys from possession intervals.
///
/// Intervals are grouped per holder and ordered by start time, so the input
/// may mix players, periods and zones freely.
pub fn infer_journeys(intervals: &[PossessionInterval], config: &JourneyConfig) -> Vec<Journey> {
    let mut by_actor: BTreeMap<ActorId, Vec<&PossessionInterval>> = BTreeMap::new();
    for interval in intervals {
        by_actor.entry(interval.holder).or_default().push(interval);
    }

    let mut journeys = Vec::new();
    for (actor, mut held) in by_actor {
        held.sort_by(|a, b| a.start.cmp(&b.start).then(a.location.cmp(&b.location)));

        for pair in held.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            let gap = (second.start - first.start).num_seconds();
            if gap > config.max_gap_secs {
                continue;
            }
            // Retaking the same zone is not travel
            if first.location == second.location {
                continue;
            }
            journeys.push(Journey {
                actor,
                from: first.location,
                to: second.location,
                start: first.start,
                end: second.start,
            });
        }
    }

    journeys.sort_by(|a, b| a.start.cmp(&b.start).then(a.actor.cmp(&b.actor)));
    debug!("[Journeys] Inferred {} journeys from {} intervals", journeys.len(), intervals.len());
    journeys
}

/// Mean duration with slow outliers removed, iterated to a fixed point.
///
/// Returns the mean and the indices of the durations that survived, or
/// `None` for an empty input.
///
/// ```
/// use turf_routes::robust_average;
///
/// // 900 is more than twice the mean of all four (375), so it goes
/// let (mean, kept) = robust_average(&[200, 200, 200, 900], 2.0).unwrap();
/// assert_eq!(mean, 200.0);
/// assert_eq!(kept, vec![0, 1, 2]);
/// ```
pub fn robust_average(durations: &[i64], outlier_factor: f64) -> Option<(f64, Vec<usize>)> {
    if durations.is_empty() {
        return None;
    }

    let mut kept: Vec<usize> = (0..durations.len()).collect();
    loop {
        let mean = kept.iter().map(|&i| durations[i] as f64).sum::<f64>() / kept.len() as f64;
        let limit = mean * outlier_factor;
        let survivors: Vec<usize> = kept
            .iter()
            .copied()
            .filter(|&i| durations[i] as f64 <= limit)
            .collect();

        if survivors.len() == kept.len() || survivors.is_empty() {
            return Some((mean, kept));
        }
        kept = survivors;
    }
}

/// All journeys from one zone to another, with a robust travel time.
#[derive(Debug, Clone)]
pub struct Connection {
    pub from: LocationHandle,
    pub to: LocationHandle,
    /// Every journey observed
    pub journeys: Vec<Journey>,
    /// Journeys that survived outlier removal
    pub retained: Vec<Journey>,
    /// Robust mean travel time in seconds
    pub average_secs: f64,
}

impl Connection {
    /// Build a connection from its journeys; `None` when there are none.
    pub fn from_journeys(
        from: LocationHandle,
        to: LocationHandle,
        journeys: Vec<Journey>,
        config: &JourneyConfig,
    ) -> Option<Self> {
        let durations: Vec<i64> = journeys.iter().map(Journey::duration_secs).collect();
        let (average_secs, kept) = robust_average(&durations, config.outlier_factor)?;
        let retained = kept.iter().map(|&i| journeys[i].clone()).collect();
        Some(Self {
            from,
            to,
            journeys,
            retained,
            average_secs,
        })
    }

    /// Average rounded to whole seconds, used as the graph edge weight.
    pub fn edge_secs(&self) -> u64 {
        self.average_secs.round().max(0.0) as u64
    }

    pub fn outliers(&self) -> usize {
        self.journeys.len() - self.retained.len()
    }
}

/// Directed connections keyed by (from, to).
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    connections: BTreeMap<(LocationHandle, LocationHandle), Connection>,
}

impl ConnectionSet {
    pub fn get(&self, from: LocationHandle, to: LocationHandle) -> Option<&Connection> {
        self.connections.get(&(from, to))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Connections leaving `location`.
    pub fn outbound(&self, location: LocationHandle) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.from == location)
    }

    /// Connections arriving at `location`.
    pub fn inbound(&self, location: LocationHandle) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.to == location)
    }

    /// Zones with at least one connection, in handle order.
    pub fn locations(&self) -> Vec<LocationHandle> {
        let mut handles: Vec<LocationHandle> = self
            .connections
            .keys()
            .flat_map(|(a, b)| [*a, *b])
            .collect();
        handles.sort();
        handles.dedup();
        handles
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Group journeys into directed connections.
pub fn aggregate_connections(journeys: &[Journey], config: &JourneyConfig) -> ConnectionSet {
    let mut grouped: BTreeMap<(LocationHandle, LocationHandle), Vec<Journey>> = BTreeMap::new();
    for journey in journeys {
        grouped
            .entry((journey.from, journey.to))
            .or_default()
            .push(journey.clone());
    }

    let connections: BTreeMap<_, _> = grouped
        .into_iter()
        .filter_map(|((from, to), list)| {
            Connection::from_journeys(from, to, list, config).map(|c| ((from, to), c))
        })
        .collect();

    let outliers: usize = connections.values().map(Connection::outliers).sum();
    info!(
        "[Journeys] {} journeys -> {} connections ({} outliers dropped)",
        journeys.len(),
        connections.len(),
        outliers
    );

    ConnectionSet { connections }
}
