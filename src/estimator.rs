//! Expected capture value per zone.
//!
//! The expected value of a zone is the rounded mean of the points realized
//! by every completed hold, plus the value carried over from the previous
//! period. A hold still in progress only counts once it has already beaten
//! that mean: whoever holds the zone then is assumed to keep holding it, so
//! the estimate is revised upward and never downward.
//!
//! Rules, first match wins:
//!
//! 1. The asking player holds the zone right now: worth nothing, unless the
//!    hold has passed `renewal_after_hours`, after which a takeover renews
//!    it for `renewal_fraction` of the base value.
//! 2. Fewer than two holds and no prior: unknown, except that a single
//!    complete hold yields its own realized value.
//! 3. No holds but a prior: the prior.
//! 4. Otherwise: the averaged value described above.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::BTreeMap;

use crate::{ActorId, Location, LocationHandle, LocationRegistry, PossessionInterval};

/// Configuration for the estimator.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Hours after which a zone held by the asking player can be renewed.
    /// Default: 23.0
    pub renewal_after_hours: f64,
    /// Fraction of the base value a renewal is worth. Default: 0.5
    pub renewal_fraction: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            renewal_after_hours: 23.0,
            renewal_fraction: 0.5,
        }
    }
}

/// Who is asking, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perspective {
    pub actor: ActorId,
    pub now: DateTime<Utc>,
}

/// Points realized by one hold.
pub fn realized_points(location: &Location, interval: &PossessionInterval) -> i64 {
    location.points_for_hours(interval.hours())
}

/// Rounded arithmetic mean; `None` for an empty slice.
pub fn rounded_mean(points: &[i64]) -> Option<i64> {
    if points.is_empty() {
        return None;
    }
    let sum: i64 = points.iter().sum();
    Some((sum as f64 / points.len() as f64).round() as i64)
}

/// Expected value of a zone given its holds (chronological).
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use turf_routes::{
///     expected_value, ActorRegistry, EstimatorConfig, LocationId, LocationRegistry,
///     RawEvent, ActorId, StaticLocation, Period, TimelineConfig, build_timelines, parse_timestamp,
/// };
///
/// let mut catalog = BTreeMap::new();
/// catalog.insert(LocationId(1), StaticLocation::new("Slottet", 100, 10, 57.7, 11.97));
/// let mut log = BTreeMap::new();
/// log.insert(LocationId(1), vec![
///     RawEvent::new("2014-06-01T08:00:00+0000", ActorId(1)),
///     RawEvent::new("2014-06-01T13:00:00+0000", ActorId(2)),
/// ]);
///
/// let mut locations = LocationRegistry::new();
/// let mut actors = ActorRegistry::new();
/// let config = TimelineConfig::new(Period::Live {
///     now: parse_timestamp("2014-06-01T14:00:00+0000").unwrap(),
/// });
/// let build = build_timelines(&log, &catalog, &BTreeMap::new(), &mut locations, &mut actors, &config, None);
///
/// let handle = locations.handle_of(LocationId(1)).unwrap();
/// let value = expected_value(locations.get(handle), &build.by_location[&handle], None, &EstimatorConfig::default());
/// // The open hold (110 so far) has not beaten the completed one (150)
/// assert_eq!(value, Some(150));
/// ```
pub fn expected_value(
    location: &Location,
    intervals: &[PossessionInterval],
    perspective: Option<&Perspective>,
    config: &EstimatorConfig,
) -> Option<i64> {
    if let (Some(p), Some(last)) = (perspective, intervals.last()) {
        if last.is_open() && last.holder == p.actor {
            let held_hours = (p.now - last.start).num_milliseconds() as f64 / 3_600_000.0;
            return if held_hours > config.renewal_after_hours {
                Some((location.base_value as f64 * config.renewal_fraction).floor() as i64)
            } else {
                Some(0)
            };
        }
    }

    if intervals.len() < 2 && location.prior.is_none() {
        return match intervals.first() {
            Some(only) if only.complete => Some(realized_points(location, only)),
            _ => None,
        };
    }

    let Some(last) = intervals.last() else {
        return location.prior;
    };

    let mut points: Vec<i64> = intervals
        .iter()
        .filter(|i| i.complete)
        .map(|i| realized_points(location, i))
        .collect();
    points.extend(location.prior);

    let mut expected = rounded_mean(&points);

    if last.is_open() {
        let so_far = realized_points(location, last);
        if expected.map_or(true, |e| so_far > e) {
            points.push(so_far);
            expected = rounded_mean(&points);
        }
    }

    expected
}

/// Estimate every zone and store the result on the location.
pub fn estimate_all(
    locations: &mut LocationRegistry,
    timelines: &BTreeMap<LocationHandle, Vec<PossessionInterval>>,
    perspective: Option<&Perspective>,
    config: &EstimatorConfig,
) {
    for (handle, intervals) in timelines {
        let value = expected_value(locations.get(*handle), intervals, perspective, config);
        let location = locations.get_mut(*handle);
        debug!(
            "[Estimator] {} -> {:?} from {} holds (prior {:?})",
            location.name,
            value,
            intervals.len(),
            location.prior
        );
        location.expected = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocationId, StaticLocation};
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        crate::parse_timestamp("2014-06-01T00:00:00+0000").unwrap()
    }

    fn setup(prior: Option<i64>) -> (LocationRegistry, LocationHandle) {
        let mut registry = LocationRegistry::new();
        let handle = registry.intern(
            LocationId(1),
            &StaticLocation::new("Slottet", 100, 10, 57.7, 11.97),
            prior,
        );
        (registry, handle)
    }

    /// Consecutive holds of the given lengths (hours), alternating holders.
    fn holds(location: LocationHandle, hours: &[i64], last_open: bool) -> Vec<PossessionInterval> {
        let mut start = t0();
        hours
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let end = start + Duration::hours(*h);
                let interval = PossessionInterval {
                    location,
                    holder: ActorId(i as u64 % 2 + 1),
                    start,
                    end,
                    complete: !(last_open && i == hours.len() - 1),
                };
                start = end;
                interval
            })
            .collect()
    }

    #[test]
    fn test_single_complete_hold_no_prior() {
        let (registry, h) = setup(None);
        let intervals = holds(h, &[5], false);
        let value = expected_value(registry.get(h), &intervals, None, &EstimatorConfig::default());
        assert_eq!(value, Some(150));
    }

    #[test]
    fn test_single_open_hold_no_prior_is_unknown() {
        let (registry, h) = setup(None);
        let intervals = holds(h, &[5], true);
        assert_eq!(expected_value(registry.get(h), &intervals, None, &EstimatorConfig::default()), None);
    }

    #[test]
    fn test_no_holds() {
        let (registry, h) = setup(None);
        assert_eq!(expected_value(registry.get(h), &[], None, &EstimatorConfig::default()), None);

        let (registry, h) = setup(Some(77));
        assert_eq!(expected_value(registry.get(h), &[], None, &EstimatorConfig::default()), Some(77));
    }

    #[test]
    fn test_mean_with_prior() {
        // 2h -> 120, 4h -> 140, prior 80: round(340 / 3) = 113
        let (registry, h) = setup(Some(80));
        let intervals = holds(h, &[2, 4], false);
        let value = expected_value(registry.get(h), &intervals, None, &EstimatorConfig::default());
        assert_eq!(value, Some(113));
    }

    #[test]
    fn test_single_complete_hold_with_prior() {
        let (registry, h) = setup(Some(80));
        let intervals = holds(h, &[5], false);
        let value = expected_value(registry.get(h), &intervals, None, &EstimatorConfig::default());
        assert_eq!(value, Some(115));
    }

    #[test]
    fn test_open_hold_only_raises_estimate() {
        let (registry, h) = setup(None);
        let config = EstimatorConfig::default();

        // Completed 120 and 140 average 130; open hold at 110 is ignored
        let below = holds(h, &[2, 4, 1], true);
        assert_eq!(expected_value(registry.get(h), &below, None, &config), Some(130));

        // Open hold at 190 beats 130 and is folded in: round(450 / 3) = 150
        let above = holds(h, &[2, 4, 9], true);
        assert_eq!(expected_value(registry.get(h), &above, None, &config), Some(150));
    }

    #[test]
    fn test_own_zone_is_worthless_until_renewal() {
        let (registry, h) = setup(Some(80));
        let config = EstimatorConfig::default();
        let intervals = holds(h, &[2, 4], true);
        let holder = intervals[1].holder;

        let early = Perspective { actor: holder, now: intervals[1].start + Duration::hours(4) };
        assert_eq!(expected_value(registry.get(h), &intervals, Some(&early), &config), Some(0));

        let late = Perspective { actor: holder, now: intervals[1].start + Duration::hours(24) };
        assert_eq!(expected_value(registry.get(h), &intervals, Some(&late), &config), Some(50));

        // Someone else asking gets the regular estimate: 120 and the prior
        // average 100, the open hold at 140 beats that, round(340 / 3) = 113
        let other = Perspective { actor: ActorId(99), now: early.now };
        assert_eq!(expected_value(registry.get(h), &intervals, Some(&other), &config), Some(113));
    }

    #[test]
    fn test_renewal_threshold_is_configurable() {
        let (registry, h) = setup(None);
        let intervals = holds(h, &[2, 4], true);
        let config = EstimatorConfig { renewal_after_hours: 3.0, renewal_fraction: 0.25 };
        let p = Perspective { actor: intervals[1].holder, now: intervals[1].start + Duration::hours(4) };
        assert_eq!(expected_value(registry.get(h), &intervals, Some(&p), &config), Some(25));
    }

    #[test]
    fn test_estimate_all_stores_values() {
        let (mut registry, h) = setup(None);
        let mut timelines = BTreeMap::new();
        timelines.insert(h, holds(h, &[5], false));
        estimate_all(&mut registry, &timelines, None, &EstimatorConfig::default());
        assert_eq!(registry.get(h).expected, Some(150));
    }
}
