//! Text and structured reports.
//!
//! Text reports are fixed-width listings meant for a terminal. Times are
//! shown in the offset from [`ReportConfig`], UTC unless set.
//!
//! The summary structs carry the same information in a form that can be
//! serialized (feature `serde`).

use chrono::{DateTime, FixedOffset, Offset, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::estimator::realized_points;
use crate::geo_utils::haversine_distance;
use crate::{
    format_secs, ActorId, Analysis, Connection, ConnectionSet, Location, LocationHandle, LocationId,
    LocationRegistry, PossessionInterval, RoutePath, RouteSearch,
};

/// Presentation settings.
#[derive(Debug, Clone, Copy)]
pub struct ReportConfig {
    /// Offset applied to every displayed time. Default: UTC
    pub offset: FixedOffset,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl ReportConfig {
    /// Offset of whole hours east of UTC; `None` if out of range.
    pub fn with_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(|offset| Self { offset })
    }

    fn time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%Y-%m-%d %H:%M").to_string()
    }
}

// ============================================================================
// Line formats
// ============================================================================

/// `Name            (base/+rate)`
pub fn location_line(location: &Location) -> String {
    format!(
        "{:<15} ({:>3}/+{})",
        location.name, location.base_value, location.hourly_rate
    )
}

/// Held time as `H:MM`, hours padded to two.
pub fn held_time(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:>2}:{:02}", secs / 3600, (secs % 3600) / 60)
}

/// Start, end (complete holds only), held time and points. Open holds are
/// marked with `+` since both numbers are still growing.
pub fn interval_line(location: &Location, interval: &PossessionInterval, config: &ReportConfig) -> String {
    let suffix = if interval.complete { "" } else { "+" };
    let end = if interval.complete {
        config.time(interval.end)
    } else {
        String::new()
    };
    let held = format!("{:>6}{}", held_time(interval.duration_secs()), suffix);
    format!(
        "{:<20}{:<20}{:<10}{:>4}{}",
        config.time(interval.start),
        end,
        held,
        realized_points(location, interval),
        suffix
    )
}

/// `Expected = N (prior)`. A zero or unknown value is left out; the prior
/// is shown whenever there is one.
pub fn expected_output(location: &Location) -> String {
    let mut parts = Vec::new();
    if let Some(expected) = location.expected.filter(|e| *e != 0) {
        parts.push(format!("Expected = {}", expected));
    }
    if let Some(prior) = location.prior {
        parts.push(format!("({})", prior));
    }
    parts.join(" ")
}

fn join_line(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string()
}

// ============================================================================
// Text reports
// ============================================================================

/// Every hold by one player across all zones, oldest first.
pub fn actor_timeline(analysis: &Analysis, actor: ActorId, config: &ReportConfig) -> String {
    let mut held: Vec<&PossessionInterval> = analysis
        .timelines()
        .values()
        .flatten()
        .filter(|i| i.holder == actor)
        .collect();
    held.sort_by(|a, b| a.start.cmp(&b.start).then(a.location.cmp(&b.location)));

    held.iter()
        .map(|interval| {
            let location = analysis.locations().get(interval.location);
            join_line(&[
                location_line(location),
                interval_line(location, interval, config),
                expected_output(location),
            ])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Zone handles sorted by expected value, highest first, unknown last.
fn by_expected_value(analysis: &Analysis) -> Vec<LocationHandle> {
    let mut handles: Vec<LocationHandle> = analysis.timelines().keys().copied().collect();
    handles.sort_by(|a, b| {
        let ea = analysis.locations().get(*a).expected;
        let eb = analysis.locations().get(*b).expected;
        eb.cmp(&ea)
    });
    handles
}

/// Every zone with its holds, most valuable first.
pub fn location_report(analysis: &Analysis, config: &ReportConfig) -> String {
    let mut lines = Vec::new();
    for handle in by_expected_value(analysis) {
        let location = analysis.locations().get(handle);
        lines.push(join_line(&[location_line(location), expected_output(location)]));
        for interval in analysis.intervals_of(handle) {
            let holder = format!("{:<20}", analysis.actors().label(interval.holder));
            lines.push(format!("   {} {}", holder, interval_line(location, interval, config)).trim_end().to_string());
        }
    }
    lines.join("\n")
}

fn connection_line(prefix: &str, other: &str, connection: &Connection, registry: &LocationRegistry) -> String {
    let summary = ConnectionSummary::new(connection, registry);
    let speed = summary
        .speed_kmh()
        .map_or_else(|| "-".to_string(), |s| format!("{:.1} km/h", s));
    format!(
        "  {} {:<15} {:>3} journeys {:>3} kept  avg {:>6}  {:>6.0} m  {}",
        prefix,
        other,
        summary.journeys,
        summary.retained,
        format_secs(connection.edge_secs()),
        summary.distance_m,
        speed
    )
}

/// Outbound (`->`) and inbound (`<-`) connections of every connected zone.
pub fn connection_report(connections: &ConnectionSet, registry: &LocationRegistry) -> String {
    let mut lines = Vec::new();
    for handle in connections.locations() {
        lines.push(location_line(registry.get(handle)));
        for c in connections.outbound(handle) {
            lines.push(connection_line("->", registry.name(c.to), c, registry));
        }
        for c in connections.inbound(handle) {
            lines.push(connection_line("<-", registry.name(c.from), c, registry));
        }
    }
    lines.join("\n")
}

fn path_lines(label: &str, path: &RoutePath, registry: &LocationRegistry, lines: &mut Vec<String>) {
    lines.push(format!(
        "{}: {} points in {} ({:.4} points/s)",
        label,
        path.total_points,
        format_secs(path.total_secs),
        path.points_per_second()
    ));
    for stop in &path.stops {
        lines.push(format!(
            "  {:<15} {:>4} {:>8}",
            registry.name(stop.location),
            stop.points,
            format_secs(stop.arrival_secs)
        ));
    }
}

/// Best route of every search stage.
pub fn route_report(search: &RouteSearch, registry: &LocationRegistry) -> String {
    let mut lines = Vec::new();
    path_lines("Direct", &search.direct, registry, &mut lines);
    path_lines("Best", search.best(), registry, &mut lines);
    if let Some(first) = search.best_first_leg() {
        path_lines("Best first leg", first, registry, &mut lines);
    }
    if let Some(second) = search.best_second_leg() {
        path_lines("Best second leg", second, registry, &mut lines);
    }
    if let Some(combined) = search.best_combined() {
        path_lines("Best combined", combined, registry, &mut lines);
    }
    lines.join("\n")
}

/// Zones a player holds right now, longest held first.
pub fn holdings_report(analysis: &Analysis, actor: ActorId, config: &ReportConfig) -> String {
    let held = analysis.current_holdings(actor);
    let mut lines = vec![format!("{} holds {} zones", analysis.actors().label(actor), held.len())];
    for interval in held {
        lines.push(format!(
            "{} : {}",
            config.time(interval.start),
            analysis.locations().name(interval.location)
        ));
    }
    lines.join("\n")
}

// ============================================================================
// Structured summaries
// ============================================================================

/// One zone and its estimate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationSummary {
    pub id: LocationId,
    pub name: String,
    pub base_value: i64,
    pub hourly_rate: i64,
    pub prior: Option<i64>,
    pub expected: Option<i64>,
    /// Number of holds this period
    pub holds: usize,
}

/// Every zone of the run, most valuable first.
pub fn location_summaries(analysis: &Analysis) -> Vec<LocationSummary> {
    by_expected_value(analysis)
        .into_iter()
        .map(|handle| {
            let location = analysis.locations().get(handle);
            LocationSummary {
                id: location.id,
                name: location.name.clone(),
                base_value: location.base_value,
                hourly_rate: location.hourly_rate,
                prior: location.prior,
                expected: location.expected,
                holds: analysis.intervals_of(handle).len(),
            }
        })
        .collect()
}

/// One directed connection with its straight-line distance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionSummary {
    pub from: LocationId,
    pub to: LocationId,
    pub journeys: usize,
    pub retained: usize,
    pub average_secs: f64,
    /// Haversine distance in meters
    pub distance_m: f64,
}

impl ConnectionSummary {
    pub fn new(connection: &Connection, registry: &LocationRegistry) -> Self {
        let from = registry.get(connection.from);
        let to = registry.get(connection.to);
        Self {
            from: from.id,
            to: to.id,
            journeys: connection.journeys.len(),
            retained: connection.retained.len(),
            average_secs: connection.average_secs,
            distance_m: haversine_distance(from.point, to.point),
        }
    }

    /// Implied average speed; `None` for a zero travel time.
    pub fn speed_kmh(&self) -> Option<f64> {
        (self.average_secs > 0.0).then(|| self.distance_m / self.average_secs * 3.6)
    }
}

pub fn connection_summaries(connections: &ConnectionSet, registry: &LocationRegistry) -> Vec<ConnectionSummary> {
    connections
        .iter()
        .map(|c| ConnectionSummary::new(c, registry))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StopSummary {
    pub id: LocationId,
    pub name: String,
    pub points: i64,
    pub arrival_secs: u64,
}

/// One route of one search stage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteSummary {
    /// `direct`, `best`, `first_leg`, `second_leg` or `combined`
    pub stage: String,
    pub pivot: Option<String>,
    pub stops: Vec<StopSummary>,
    pub total_secs: u64,
    pub total_points: i64,
    pub points_per_second: f64,
}

impl RouteSummary {
    pub fn new(stage: &str, path: &RoutePath, registry: &LocationRegistry) -> Self {
        Self {
            stage: stage.to_string(),
            pivot: path.pivot.map(|p| registry.name(p).to_string()),
            stops: path
                .stops
                .iter()
                .map(|s| StopSummary {
                    id: registry.get(s.location).id,
                    name: registry.name(s.location).to_string(),
                    points: s.points,
                    arrival_secs: s.arrival_secs,
                })
                .collect(),
            total_secs: path.total_secs,
            total_points: path.total_points,
            points_per_second: path.points_per_second(),
        }
    }
}

/// The best route of every stage that ran.
pub fn route_summaries(search: &RouteSearch, registry: &LocationRegistry) -> Vec<RouteSummary> {
    let stages = [
        ("direct", Some(&search.direct)),
        ("best", Some(search.best())),
        ("first_leg", search.best_first_leg()),
        ("second_leg", search.best_second_leg()),
        ("combined", search.best_combined()),
    ];
    stages
        .into_iter()
        .filter_map(|(stage, path)| path.map(|p| RouteSummary::new(stage, p, registry)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        nominal_cutoff, parse_timestamp, AnalysisConfig, OwnershipLog, Period, PriorValues, RawEvent,
        RouteConfig, RouteOptimizer, StaticCatalog, StaticLocation, TravelGraph,
    };
    use chrono::NaiveDate;

    fn zone(prior: Option<i64>, expected: Option<i64>) -> (LocationRegistry, LocationHandle) {
        let mut registry = LocationRegistry::new();
        let handle = registry.intern(LocationId(1), &StaticLocation::new("Slottet", 100, 10, 57.7, 11.97), prior);
        registry.get_mut(handle).expected = expected;
        (registry, handle)
    }

    fn interval(location: LocationHandle, start: &str, end: &str, complete: bool) -> PossessionInterval {
        PossessionInterval {
            location,
            holder: ActorId(1),
            start: parse_timestamp(start).unwrap(),
            end: parse_timestamp(end).unwrap(),
            complete,
        }
    }

    #[test]
    fn test_location_line() {
        let (registry, h) = zone(None, None);
        let line = location_line(registry.get(h));
        assert!(line.starts_with("Slottet  "));
        assert!(line.ends_with(" (100/+10)"));
        assert_eq!(line.len(), 25);
    }

    #[test]
    fn test_held_time() {
        assert_eq!(held_time(5 * 3600), " 5:00");
        assert_eq!(held_time(26 * 3600 + 7 * 60 + 59), "26:07");
    }

    #[test]
    fn test_complete_interval_line() {
        let (registry, h) = zone(None, None);
        let i = interval(h, "2014-06-01T08:00:00+0000", "2014-06-01T13:00:00+0000", true);
        assert_eq!(
            interval_line(registry.get(h), &i, &ReportConfig::default()),
            "2014-06-01 08:00    2014-06-01 13:00      5:00     150"
        );
    }

    #[test]
    fn test_open_interval_line() {
        let (registry, h) = zone(None, None);
        let i = interval(h, "2014-06-01T13:00:00+0000", "2014-06-01T14:30:00+0000", false);
        let line = interval_line(registry.get(h), &i, &ReportConfig::default());
        assert!(line.ends_with("1:30+    115+"));
        assert_eq!(line.matches("2014").count(), 1);
    }

    #[test]
    fn test_interval_line_uses_offset() {
        let (registry, h) = zone(None, None);
        let i = interval(h, "2014-06-01T08:00:00+0000", "2014-06-01T13:00:00+0000", true);
        let config = ReportConfig::with_offset_hours(2).unwrap();
        assert!(interval_line(registry.get(h), &i, &config).starts_with("2014-06-01 10:00"));
    }

    #[test]
    fn test_expected_output() {
        let (registry, h) = zone(None, Some(240));
        assert_eq!(expected_output(registry.get(h)), "Expected = 240");

        let (registry, h) = zone(Some(80), Some(113));
        assert_eq!(expected_output(registry.get(h)), "Expected = 113 (80)");

        let (registry, h) = zone(Some(80), Some(0));
        assert_eq!(expected_output(registry.get(h)), "(80)");

        let (registry, h) = zone(None, None);
        assert_eq!(expected_output(registry.get(h)), "");
    }

    fn sample_analysis() -> Analysis {
        let mut catalog = StaticCatalog::new();
        catalog.insert(LocationId(1), StaticLocation::new("Slottet", 100, 10, 57.700, 11.970));
        catalog.insert(LocationId(2), StaticLocation::new("Parken", 50, 1, 57.710, 11.970));
        catalog.insert(LocationId(3), StaticLocation::new("Tomma", 50, 1, 57.720, 11.970));

        let mut log = OwnershipLog::new();
        log.insert(
            LocationId(1),
            vec![
                RawEvent::new("2014-06-01T08:00:00+0000", ActorId(1)),
                RawEvent::new("2014-06-01T13:00:00+0000", ActorId(2)),
            ],
        );
        log.insert(LocationId(2), vec![RawEvent::new("2014-06-01T08:10:00+0000", ActorId(1))]);
        log.insert(LocationId(3), vec![]);

        let cutoff = nominal_cutoff(NaiveDate::from_ymd_opt(2014, 6, 2).unwrap());
        let mut analysis = Analysis::run(
            &catalog,
            &log,
            &PriorValues::new(),
            AnalysisConfig::new(Period::Finished { cutoff }),
        );
        analysis.actors_mut().set_info(ActorId(1), "cyklisten", Some(12));
        analysis
    }

    #[test]
    fn test_location_report_orders_by_value() {
        let analysis = sample_analysis();
        let report = location_report(&analysis, &ReportConfig::default());
        let lines: Vec<&str> = report.lines().collect();

        // Slottet 240 first, Parken 77 (50 + 27h50m), Tomma unknown last
        assert!(lines[0].starts_with("Slottet") && lines[0].ends_with("Expected = 240"));
        assert!(lines[1].contains("cyklisten(12)"));
        assert!(lines[2].contains("2(?)"));
        assert!(lines[3].starts_with("Parken") && lines[3].ends_with("Expected = 77"));
        assert!(lines[5].starts_with("Tomma"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_actor_timeline_and_holdings() {
        let analysis = sample_analysis();
        let config = ReportConfig::default();

        let timeline = actor_timeline(&analysis, ActorId(1), &config);
        let lines: Vec<&str> = timeline.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Slottet"));
        assert!(lines[1].starts_with("Parken"));

        let holdings = holdings_report(&analysis, ActorId(1), &config);
        assert_eq!(holdings, "cyklisten(12) holds 1 zones\n2014-06-01 08:10 : Parken");
    }

    #[test]
    fn test_location_summaries() {
        let summaries = location_summaries(&sample_analysis());
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].name, "Slottet");
        assert_eq!(summaries[0].expected, Some(240));
        assert_eq!(summaries[0].holds, 2);
        assert_eq!(summaries[2].expected, None);
        assert_eq!(summaries[2].holds, 0);
    }

    #[test]
    fn test_connection_summary_distance_and_speed() {
        let analysis = sample_analysis();
        let connections = analysis.connections(None);
        assert_eq!(connections.len(), 1);

        let summaries = connection_summaries(&connections, analysis.locations());
        let s = &summaries[0];
        assert_eq!((s.from, s.to), (LocationId(1), LocationId(2)));
        assert_eq!(s.average_secs, 600.0);
        // 0.01 degrees of latitude is about 1112 m
        assert!((s.distance_m - 1112.0).abs() < 5.0);
        let speed = s.speed_kmh().unwrap();
        assert!((speed - 6.67).abs() < 0.05);

        let report = connection_report(&connections, analysis.locations());
        assert!(report.contains("-> Parken"));
        assert!(report.contains("<- Slottet"));
        assert!(report.contains("10:00"));
    }

    #[test]
    fn test_route_report_and_summaries() {
        let mut registry = LocationRegistry::new();
        let zone = |name: &str| StaticLocation::new(name, 100, 1, 57.7, 11.97);
        let s = registry.intern(LocationId(1), &zone("S"), None);
        let e = registry.intern(LocationId(2), &zone("E"), None);
        let p = registry.intern(LocationId(3), &zone("P"), None);
        registry.get_mut(p).expected = Some(400);

        let graph = TravelGraph::from_edges(&[(s, e, 100), (s, p, 200), (p, e, 200)]);
        let optimizer = RouteOptimizer::new(&graph, &registry, RouteConfig::default());
        let search = optimizer.search(s, e, 600).unwrap();

        let report = route_report(&search, &registry);
        assert!(report.starts_with("Direct: 0 points in 1:40"));
        assert!(report.contains("Best: 400 points in 6:40 (1.0000 points/s)"));
        assert!(report.contains("Best combined"));

        let summaries = route_summaries(&search, &registry);
        let stages: Vec<&str> = summaries.iter().map(|r| r.stage.as_str()).collect();
        assert_eq!(stages, vec!["direct", "best", "first_leg", "second_leg", "combined"]);
        assert_eq!(summaries[1].pivot.as_deref(), Some("P"));
        assert_eq!(summaries[1].stops.len(), 3);
        assert_eq!(summaries[1].stops[1].points, 400);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_location_summary_serializes() {
        let summaries = location_summaries(&sample_analysis());
        let json = serde_json::to_value(&summaries[0]).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["name"], "Slottet");
        assert_eq!(json["expected"], 240);
        assert!(json["prior"].is_null());
    }
}
