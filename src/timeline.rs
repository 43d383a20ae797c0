//! Ownership timeline reconstruction.
//!
//! Turns each zone's takeover log into ordered, non-overlapping possession
//! intervals. A takeover by the player who already holds the zone is a
//! no-op and does not split the interval. The last interval of a zone runs
//! until "now": wall-clock time for a live period, or the nominal cutoff for
//! a finished one, where it also counts as complete.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};

use crate::{
    ActorId, ActorRegistry, DataError, LocationHandle, LocationId, LocationRegistry, OwnershipLog,
    PriorValues, StaticCatalog,
};

/// One player's hold on one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossessionInterval {
    pub location: LocationHandle,
    pub holder: ActorId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// False while the interval is still open at "now"
    pub complete: bool,
}

impl PossessionInterval {
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Hours held, with fractions.
    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn is_open(&self) -> bool {
        !self.complete
    }
}

/// Whether the analysed period is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Ongoing period; open intervals end at `now` and stay incomplete.
    Live { now: DateTime<Utc> },
    /// Historical period; open intervals end at `cutoff` and count as complete.
    Finished { cutoff: DateTime<Utc> },
}

impl Period {
    /// A live period ending at the current wall-clock time.
    pub fn live() -> Self {
        Period::Live { now: Utc::now() }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Period::Live { now } => *now,
            Period::Finished { cutoff } => *cutoff,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Period::Finished { .. })
    }
}

/// Configuration for timeline reconstruction.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    pub period: Period,
    /// Actor whose intervals are collected into the flattened list.
    /// `None` collects every interval.
    pub focus: Option<ActorId>,
}

impl TimelineConfig {
    pub fn new(period: Period) -> Self {
        Self { period, focus: None }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self::new(Period::live())
    }
}

/// Result of reconstructing every timeline in a log.
#[derive(Debug, Default)]
pub struct TimelineBuild {
    /// Intervals per zone, in chronological order. Zones that were never
    /// taken have an empty list.
    pub by_location: BTreeMap<LocationHandle, Vec<PossessionInterval>>,
    /// Intervals of the focus actor (or all), sorted by start time
    pub actor_intervals: Vec<PossessionInterval>,
    /// Zones skipped because of bad data
    pub errors: Vec<DataError>,
}

impl TimelineBuild {
    pub fn interval_count(&self) -> usize {
        self.by_location.values().map(Vec::len).sum()
    }
}

/// Parse a takeover timestamp.
///
/// Accepts `2014-06-01T12:00:00+0000`, RFC 3339, and a bare
/// `2014-06-01T12:00:00` which is taken as UTC.
///
/// ```
/// use turf_routes::parse_timestamp;
/// let a = parse_timestamp("2014-06-01T12:00:00+0000").unwrap();
/// let b = parse_timestamp("2014-06-01T14:00:00+02:00").unwrap();
/// assert_eq!(a, b);
/// assert!(parse_timestamp("not a time").is_none());
/// ```
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Reconstruct possession intervals for every zone in the log.
///
/// Zones without static metadata or with an unparseable timestamp are
/// reported in [`TimelineBuild::errors`] and skipped; everything else is
/// still built. Zones outside `allowed` (when given) are skipped silently.
/// New zones and players are added to the registries as they are met.
pub fn build_timelines(
    log: &OwnershipLog,
    catalog: &StaticCatalog,
    priors: &PriorValues,
    locations: &mut LocationRegistry,
    actors: &mut ActorRegistry,
    config: &TimelineConfig,
    allowed: Option<&HashSet<LocationId>>,
) -> TimelineBuild {
    let mut build = TimelineBuild::default();

    for (id, events) in log {
        let Some(data) = catalog.get(id) else {
            warn!("[Timeline] Skipping zone {}: no static metadata", id);
            build.errors.push(DataError::MissingMetadata { location: *id });
            continue;
        };

        if allowed.is_some_and(|set| !set.contains(id)) {
            debug!("[Timeline] Zone {} ({}) filtered out", id, data.name);
            continue;
        }

        let mut takeovers = match parse_events(*id, events) {
            Ok(t) => t,
            Err(err) => {
                warn!("[Timeline] Skipping zone {} ({}): {}", id, data.name, err);
                build.errors.push(err);
                continue;
            }
        };
        takeovers.sort_by_key(|(at, _)| *at);

        let handle = locations.intern(*id, data, priors.get(id).copied().flatten());
        let intervals = reconstruct(handle, &takeovers, &config.period, actors);

        for interval in &intervals {
            if config.focus.map_or(true, |actor| actor == interval.holder) {
                build.actor_intervals.push(interval.clone());
            }
        }
        build.by_location.insert(handle, intervals);
    }

    build
        .actor_intervals
        .sort_by(|a, b| a.start.cmp(&b.start).then(a.location.cmp(&b.location)));

    info!(
        "[Timeline] Built {} zone timelines with {} intervals ({} skipped)",
        build.by_location.len(),
        build.interval_count(),
        build.errors.len()
    );

    build
}

fn parse_events(
    location: LocationId,
    events: &[crate::RawEvent],
) -> Result<Vec<(DateTime<Utc>, ActorId)>, DataError> {
    events
        .iter()
        .map(|event| {
            parse_timestamp(&event.timestamp)
                .map(|at| (at, event.holder))
                .ok_or_else(|| DataError::MalformedTimestamp {
                    location,
                    value: event.timestamp.clone(),
                })
        })
        .collect()
}

/// Walk sorted takeovers, closing the running interval whenever the holder
/// changes.
fn reconstruct(
    location: LocationHandle,
    takeovers: &[(DateTime<Utc>, ActorId)],
    period: &Period,
    actors: &mut ActorRegistry,
) -> Vec<PossessionInterval> {
    let mut intervals = Vec::new();
    let mut current: Option<(DateTime<Utc>, ActorId)> = None;

    for &(at, holder) in takeovers {
        actors.intern(holder);
        match current {
            Some((_, prev)) if prev == holder => continue,
            Some((since, prev)) => intervals.push(PossessionInterval {
                location,
                holder: prev,
                start: since,
                end: at,
                complete: true,
            }),
            None => {}
        }
        current = Some((at, holder));
    }

    if let Some((since, holder)) = current {
        intervals.push(PossessionInterval {
            location,
            holder,
            start: since,
            // A cutoff before the last takeover would give a negative span
            end: period.now().max(since),
            complete: period.is_finished(),
        });
    }

    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawEvent, StaticLocation};

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn catalog() -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        catalog.insert(LocationId(1), StaticLocation::new("Slottet", 100, 10, 57.70, 11.97));
        catalog.insert(LocationId(2), StaticLocation::new("Hamnen", 65, 1, 57.71, 11.96));
        catalog
    }

    fn finished() -> TimelineConfig {
        TimelineConfig::new(Period::Finished {
            cutoff: at("2014-06-02T12:00:00+0000"),
        })
    }

    fn build(log: &OwnershipLog, config: &TimelineConfig) -> (TimelineBuild, LocationRegistry) {
        let mut locations = LocationRegistry::new();
        let mut actors = ActorRegistry::new();
        let b = build_timelines(log, &catalog(), &PriorValues::new(), &mut locations, &mut actors, config, None);
        (b, locations)
    }

    fn events(list: &[(&str, u64)]) -> Vec<RawEvent> {
        list.iter().map(|(t, a)| RawEvent::new(t, ActorId(*a))).collect()
    }

    fn assert_invariants(intervals: &[PossessionInterval]) {
        for w in intervals.windows(2) {
            assert!(w[0].start <= w[0].end);
            assert!(w[0].end <= w[1].start, "intervals overlap");
            assert_ne!(w[0].holder, w[1].holder, "adjacent intervals share a holder");
        }
    }

    #[test]
    fn test_basic_timeline() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[
            ("2014-06-01T08:00:00+0000", 1),
            ("2014-06-01T13:00:00+0000", 2),
        ]));

        let (b, locations) = build(&log, &finished());
        let handle = locations.handle_of(LocationId(1)).unwrap();
        let intervals = &b.by_location[&handle];

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].holder, ActorId(1));
        assert_eq!(intervals[0].hours(), 5.0);
        assert!(intervals[0].complete);
        assert_eq!(intervals[1].end, at("2014-06-02T12:00:00+0000"));
        assert!(intervals[1].complete);
        assert_invariants(intervals);
    }

    #[test]
    fn test_same_holder_takeovers_coalesce() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[
            ("2014-06-01T08:00:00+0000", 1),
            ("2014-06-01T09:00:00+0000", 1),
            ("2014-06-01T10:00:00+0000", 2),
            ("2014-06-01T11:00:00+0000", 2),
            ("2014-06-01T12:00:00+0000", 1),
        ]));

        let (b, _) = build(&log, &finished());
        let intervals = b.by_location.values().next().unwrap();
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].end, at("2014-06-01T10:00:00+0000"));
        assert_invariants(intervals);
    }

    #[test]
    fn test_out_of_order_takeovers_are_sorted() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[
            ("2014-06-01T15:00:00+0000", 3),
            ("2014-06-01T08:00:00+0000", 1),
            ("2014-06-01T11:30:00+0000", 2),
            ("2014-06-01T09:00:00+0000", 2),
        ]));
        log.insert(LocationId(2), events(&[
            ("2014-06-01T20:00:00+0000", 1),
            ("2014-06-01T07:00:00+0000", 2),
            ("2014-06-01T13:00:00+0000", 1),
        ]));

        let (b, locations) = build(&log, &finished());
        for intervals in b.by_location.values() {
            assert_invariants(intervals);
        }

        let slottet = &b.by_location[&locations.handle_of(LocationId(1)).unwrap()];
        let holders: Vec<u64> = slottet.iter().map(|i| i.holder.0).collect();
        assert_eq!(holders, vec![1, 2, 3]);
        assert_eq!(slottet[0].end, at("2014-06-01T09:00:00+0000"));
        assert_eq!(slottet[1].end, at("2014-06-01T15:00:00+0000"));

        // 1 at 13:00 and again at 20:00 coalesce into one hold
        let hamnen = &b.by_location[&locations.handle_of(LocationId(2)).unwrap()];
        assert_eq!(hamnen.len(), 2);
        assert_eq!(hamnen[1].start, at("2014-06-01T13:00:00+0000"));
    }

    #[test]
    fn test_duplicated_events_are_idempotent() {
        let base = [
            ("2014-06-01T08:00:00+0000", 1),
            ("2014-06-01T09:30:00+0000", 2),
            ("2014-06-01T11:00:00+0000", 3),
            ("2014-06-01T11:20:00+0000", 1),
        ];
        let doubled: Vec<(&str, u64)> = base.iter().flat_map(|e| [*e, *e]).collect();

        let mut single_log = OwnershipLog::new();
        single_log.insert(LocationId(1), events(&base));
        let mut doubled_log = OwnershipLog::new();
        doubled_log.insert(LocationId(1), events(&doubled));

        let (single, _) = build(&single_log, &finished());
        let (twice, _) = build(&doubled_log, &finished());
        assert_eq!(single.interval_count(), twice.interval_count());
        assert_eq!(single.interval_count(), 4);
    }

    #[test]
    fn test_zone_without_events_has_empty_timeline() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(2), vec![]);

        let (b, locations) = build(&log, &finished());
        let handle = locations.handle_of(LocationId(2)).unwrap();
        assert!(b.by_location[&handle].is_empty());
    }

    #[test]
    fn test_live_period_leaves_last_interval_open() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[("2014-06-01T08:00:00+0000", 1)]));
        let config = TimelineConfig::new(Period::Live {
            now: at("2014-06-01T10:00:00+0000"),
        });

        let (b, _) = build(&log, &config);
        let intervals = b.by_location.values().next().unwrap();
        assert_eq!(intervals.len(), 1);
        assert!(intervals[0].is_open());
        assert_eq!(intervals[0].duration_secs(), 7200);
    }

    #[test]
    fn test_missing_metadata_skips_only_that_zone() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[("2014-06-01T08:00:00+0000", 1)]));
        log.insert(LocationId(99), events(&[("2014-06-01T08:00:00+0000", 1)]));

        let (b, locations) = build(&log, &finished());
        assert_eq!(b.by_location.len(), 1);
        assert_eq!(b.errors, vec![DataError::MissingMetadata { location: LocationId(99) }]);
        assert!(locations.handle_of(LocationId(99)).is_none());
    }

    #[test]
    fn test_malformed_timestamp_skips_zone() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[
            ("2014-06-01T08:00:00+0000", 1),
            ("yesterday", 2),
        ]));
        log.insert(LocationId(2), events(&[("2014-06-01T08:00:00+0000", 1)]));

        let (b, _) = build(&log, &finished());
        assert_eq!(b.by_location.len(), 1);
        assert_eq!(b.errors.len(), 1);
        assert_eq!(b.errors[0].location(), LocationId(1));
    }

    #[test]
    fn test_focus_filters_flattened_list_only() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[
            ("2014-06-01T08:00:00+0000", 1),
            ("2014-06-01T09:00:00+0000", 2),
        ]));
        log.insert(LocationId(2), events(&[
            ("2014-06-01T07:00:00+0000", 2),
            ("2014-06-01T08:30:00+0000", 1),
        ]));
        let mut config = finished();
        config.focus = Some(ActorId(1));

        let (b, _) = build(&log, &config);
        assert_eq!(b.interval_count(), 4);
        assert_eq!(b.actor_intervals.len(), 2);
        assert!(b.actor_intervals.iter().all(|i| i.holder == ActorId(1)));
        assert!(b.actor_intervals[0].start < b.actor_intervals[1].start);
    }

    #[test]
    fn test_allowed_filter_skips_zone() {
        let mut log = OwnershipLog::new();
        log.insert(LocationId(1), events(&[("2014-06-01T08:00:00+0000", 1)]));
        log.insert(LocationId(2), events(&[("2014-06-01T08:00:00+0000", 1)]));
        let allowed: HashSet<LocationId> = [LocationId(2)].into_iter().collect();

        let mut locations = LocationRegistry::new();
        let mut actors = ActorRegistry::new();
        let b = build_timelines(&log, &catalog(), &PriorValues::new(), &mut locations, &mut actors, &finished(), Some(&allowed));
        assert_eq!(b.by_location.len(), 1);
        assert!(locations.handle_of(LocationId(1)).is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = at("2014-06-01T12:00:00+0000");
        assert_eq!(parse_timestamp("2014-06-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2014-06-01T12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2014-06-01 12:00"), None);
    }
}
