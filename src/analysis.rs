//! One report run over a takeover log.
//!
//! [`Analysis::run`] owns the registries for the run and drives the pipeline:
//! direction filter, timeline reconstruction, then expected values. Journeys,
//! connections and the travel graph are derived on demand because they
//! depend on whose travel is being looked at.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

use crate::geo_utils::allowed_locations;
use crate::{
    aggregate_connections, build_timelines, estimate_all, infer_journeys, ActorId, ActorRegistry,
    ConnectionSet, DataError, Direction, EstimatorConfig, HomeConfig, Journey, JourneyConfig,
    LocationHandle, LocationId, LocationRegistry, OwnershipLog, Period, Perspective,
    PossessionInterval, PriorValues, RouteConfig, RouteError, RouteOptimizer, RouteSearch,
    StaticCatalog, TimelineConfig, TravelGraph,
};

/// Everything a report run needs to know.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Live or finished, and so where open intervals end
    pub period: Period,
    /// Player whose view is requested: their own zones are valued by the
    /// renewal rule and the flattened interval list holds only theirs.
    pub perspective: Option<ActorId>,
    /// Keep only zones in this direction from `home`
    pub direction: Option<Direction>,
    pub home: Option<HomeConfig>,
    pub estimator: EstimatorConfig,
    pub journeys: JourneyConfig,
    pub route: RouteConfig,
}

impl AnalysisConfig {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            perspective: None,
            direction: None,
            home: None,
            estimator: EstimatorConfig::default(),
            journeys: JourneyConfig::default(),
            route: RouteConfig::default(),
        }
    }

    fn timeline(&self) -> TimelineConfig {
        TimelineConfig {
            period: self.period,
            focus: self.perspective,
        }
    }

    fn allowed(&self, catalog: &StaticCatalog) -> Option<HashSet<LocationId>> {
        let direction = self.direction?;
        let Some(home) = &self.home else {
            warn!("[Analysis] Direction '{}' given without home coordinates, ignoring", direction);
            return None;
        };
        Some(allowed_locations(catalog, direction, home))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new(Period::live())
    }
}

/// Route request by zone name or identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery {
    pub start: String,
    pub end: String,
    pub budget_minutes: u64,
}

impl RouteQuery {
    pub fn new(start: &str, end: &str, budget_minutes: u64) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            budget_minutes,
        }
    }

    pub fn budget_secs(&self) -> u64 {
        self.budget_minutes.saturating_mul(60)
    }
}

/// The result of one report run.
pub struct Analysis {
    locations: LocationRegistry,
    actors: ActorRegistry,
    timelines: BTreeMap<LocationHandle, Vec<PossessionInterval>>,
    actor_intervals: Vec<PossessionInterval>,
    history: Vec<PossessionInterval>,
    priors: PriorValues,
    errors: Vec<DataError>,
    allowed: Option<HashSet<LocationId>>,
    config: AnalysisConfig,
}

impl Analysis {
    /// Build timelines and expected values for every zone in the log.
    ///
    /// Bad data for one zone is collected in [`errors`](Self::errors); the
    /// run itself always completes.
    pub fn run(
        catalog: &StaticCatalog,
        log: &OwnershipLog,
        priors: &PriorValues,
        config: AnalysisConfig,
    ) -> Self {
        let start = std::time::Instant::now();

        let allowed = config.allowed(catalog);
        let mut locations = LocationRegistry::new();
        let mut actors = ActorRegistry::new();

        let build = build_timelines(
            log,
            catalog,
            priors,
            &mut locations,
            &mut actors,
            &config.timeline(),
            allowed.as_ref(),
        );

        let perspective = config.perspective.map(|actor| Perspective {
            actor,
            now: config.period.now(),
        });
        estimate_all(&mut locations, &build.by_location, perspective.as_ref(), &config.estimator);

        info!(
            "[Analysis] {} zones, {} players, {} intervals in {:?}",
            build.by_location.len(),
            actors.len(),
            build.interval_count(),
            start.elapsed()
        );

        Self {
            locations,
            actors,
            timelines: build.by_location,
            actor_intervals: build.actor_intervals,
            history: Vec::new(),
            priors: priors.clone(),
            errors: build.errors,
            allowed,
            config,
        }
    }

    /// Add a finished earlier period whose intervals feed journey inference.
    ///
    /// Expected values of zones in this run are not touched. A zone first
    /// met in history gets this run's prior as its value, so it still
    /// counts as a route stop. Returns the number of intervals added.
    pub fn with_history(
        &mut self,
        log: &OwnershipLog,
        catalog: &StaticCatalog,
        cutoff: DateTime<Utc>,
    ) -> usize {
        let config = TimelineConfig::new(Period::Finished { cutoff });
        let build = build_timelines(
            log,
            catalog,
            &self.priors,
            &mut self.locations,
            &mut self.actors,
            &config,
            self.allowed.as_ref(),
        );
        for handle in build.by_location.keys() {
            if !self.timelines.contains_key(handle) {
                let location = self.locations.get_mut(*handle);
                location.expected = location.expected.or(location.prior);
            }
        }

        let added = build.actor_intervals.len();
        self.history.extend(build.actor_intervals);
        self.errors.extend(build.errors);

        info!("[Analysis] Loaded {} history intervals (cutoff {})", added, cutoff);
        added
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn locations(&self) -> &LocationRegistry {
        &self.locations
    }

    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// Mutable player registry, for attaching names and places.
    pub fn actors_mut(&mut self) -> &mut ActorRegistry {
        &mut self.actors
    }

    pub fn timelines(&self) -> &BTreeMap<LocationHandle, Vec<PossessionInterval>> {
        &self.timelines
    }

    /// Intervals of one zone; empty for a zone outside this run.
    pub fn intervals_of(&self, location: LocationHandle) -> &[PossessionInterval] {
        self.timelines
            .get(&location)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Flattened intervals, restricted to the perspective player if set.
    pub fn actor_intervals(&self) -> &[PossessionInterval] {
        &self.actor_intervals
    }

    pub fn history(&self) -> &[PossessionInterval] {
        &self.history
    }

    pub fn errors(&self) -> &[DataError] {
        &self.errors
    }

    /// Expected value of every zone in this run, keyed for reuse as the
    /// next run's priors.
    pub fn expected_values(&self) -> PriorValues {
        self.timelines
            .keys()
            .map(|h| {
                let location = self.locations.get(*h);
                (location.id, location.expected)
            })
            .collect()
    }

    /// Zones whose latest hold belongs to `actor`, longest held first.
    pub fn current_holdings(&self, actor: ActorId) -> Vec<&PossessionInterval> {
        let mut held: Vec<&PossessionInterval> = self
            .timelines
            .values()
            .filter_map(|intervals| intervals.last())
            .filter(|last| last.holder == actor)
            .collect();
        held.sort_by(|a, b| a.start.cmp(&b.start).then(a.location.cmp(&b.location)));
        held
    }

    // ========================================================================
    // Travel
    // ========================================================================

    /// Journeys from this period and any loaded history, optionally for one
    /// player only.
    pub fn journeys(&self, actor: Option<ActorId>) -> Vec<Journey> {
        let intervals: Vec<PossessionInterval> = self
            .timelines
            .values()
            .flatten()
            .chain(self.history.iter())
            .filter(|i| actor.map_or(true, |a| a == i.holder))
            .cloned()
            .collect();
        infer_journeys(&intervals, &self.config.journeys)
    }

    pub fn connections(&self, actor: Option<ActorId>) -> ConnectionSet {
        aggregate_connections(&self.journeys(actor), &self.config.journeys)
    }

    pub fn travel_graph(&self, actor: Option<ActorId>) -> TravelGraph {
        TravelGraph::from_connections(&self.connections(actor))
    }

    /// Search for the best route, using the perspective player's travel
    /// times (everyone's when no perspective is set).
    pub fn find_route(&self, query: &RouteQuery) -> Result<RouteSearch, RouteError> {
        let start = self.resolve(&query.start)?;
        let end = self.resolve(&query.end)?;
        let graph = self.travel_graph(self.config.perspective);
        let optimizer = RouteOptimizer::new(&graph, &self.locations, self.config.route.clone());
        optimizer.search(start, end, query.budget_secs())
    }

    fn resolve(&self, query: &str) -> Result<LocationHandle, RouteError> {
        self.locations
            .find(query)
            .ok_or_else(|| RouteError::UnknownLocation(query.to_string()))
    }
}
