//! Value-per-time route search between two zones.
//!
//! A heuristic for the prize-collecting orienteering problem: every zone has
//! a reward (its expected value) and travel between zones costs the
//! shortest time from the [`TravelGraph`]. The search looks for the route
//! from start to end with the most points per second within a time budget.
//!
//! ## Algorithm
//! 1. The direct shortest path is always a candidate.
//! 2. Every zone with a nonzero reward that fits in the budget as a detour
//!    ("pivot") gives a candidate `start -> pivot -> end`.
//! 3. Candidates are ranked by points per second, ties by pivot name.
//! 4. If the best candidate has a pivot, each half (`start -> pivot`,
//!    `pivot -> end`) is searched again with the budget left over by the
//!    other half, which can surface a second pivot on either leg.
//! 5. Every refined first half is paired with every refined second half
//!    that fits the original budget; these two-pivot routes are ranked the
//!    same way.
//!
//! Step 4 recurses at most `refine_depth` levels.
//!
//! A zone's reward is counted the first time a route reaches it and never
//! again; the start zone is never counted.

use log::{debug, info};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::{LocationHandle, LocationRegistry, RouteError, TravelGraph};

/// Configuration for route search.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// How many levels of leg refinement to run. Default: 1
    pub refine_depth: u32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { refine_depth: 1 }
    }
}

/// One zone along a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStop {
    pub location: LocationHandle,
    /// Points collected here; zero on a revisit
    pub points: i64,
    /// Seconds from the start of the route
    pub arrival_secs: u64,
}

/// A route with its time and value.
#[derive(Debug, Clone)]
pub struct RoutePath {
    pub stops: Vec<RouteStop>,
    pub total_secs: u64,
    pub total_points: i64,
    /// Detour zone this route was assembled around
    pub pivot: Option<LocationHandle>,
    /// The two halves either side of the pivot
    pub legs: Option<Box<(RoutePath, RoutePath)>>,
}

impl RoutePath {
    /// Points per second; zero for a route that takes no time.
    pub fn points_per_second(&self) -> f64 {
        if self.total_secs == 0 {
            0.0
        } else {
            self.total_points as f64 / self.total_secs as f64
        }
    }

    pub fn locations(&self) -> Vec<LocationHandle> {
        self.stops.iter().map(|s| s.location).collect()
    }
}

/// Result of a route search, keeping every tier for reporting.
#[derive(Debug, Clone)]
pub struct RouteSearch {
    pub start: LocationHandle,
    pub end: LocationHandle,
    pub budget_secs: u64,
    /// The shortest path from start to end
    pub direct: RoutePath,
    /// Direct and single-pivot candidates, best first
    pub candidates: Vec<RoutePath>,
    pub refinement: Option<Box<Refinement>>,
}

/// Second pass around the best single-pivot route.
#[derive(Debug, Clone)]
pub struct Refinement {
    pub pivot: LocationHandle,
    /// Search from start to the pivot
    pub first_leg: RouteSearch,
    /// Search from the pivot to the end
    pub second_leg: RouteSearch,
    /// Two-leg combinations within the budget, best first
    pub combined: Vec<RoutePath>,
}

impl RouteSearch {
    /// Best direct or single-pivot route.
    pub fn best(&self) -> &RoutePath {
        self.candidates.first().unwrap_or(&self.direct)
    }

    pub fn best_first_leg(&self) -> Option<&RoutePath> {
        self.refinement.as_ref().map(|r| r.first_leg.best())
    }

    pub fn best_second_leg(&self) -> Option<&RoutePath> {
        self.refinement.as_ref().map(|r| r.second_leg.best())
    }

    pub fn best_combined(&self) -> Option<&RoutePath> {
        self.refinement.as_ref().and_then(|r| r.combined.first())
    }

    /// The better of [`best`](Self::best) and [`best_combined`](Self::best_combined).
    pub fn overall_best(&self) -> &RoutePath {
        let best = self.best();
        match self.best_combined() {
            Some(combined) if combined.points_per_second() > best.points_per_second() => combined,
            _ => best,
        }
    }

    /// Single-stage candidates followed by refined combinations.
    pub fn all_candidates(&self) -> impl Iterator<Item = &RoutePath> {
        let combined = self.refinement.iter().flat_map(|r| r.combined.iter());
        self.candidates.iter().chain(combined)
    }
}

/// Route search over a travel graph with zone rewards from the registry.
pub struct RouteOptimizer<'a> {
    graph: &'a TravelGraph,
    locations: &'a LocationRegistry,
    config: RouteConfig,
}

impl<'a> RouteOptimizer<'a> {
    pub fn new(graph: &'a TravelGraph, locations: &'a LocationRegistry, config: RouteConfig) -> Self {
        Self {
            graph,
            locations,
            config,
        }
    }

    fn reward(&self, location: LocationHandle) -> i64 {
        self.locations.get(location).reward()
    }

    fn name(&self, location: LocationHandle) -> String {
        self.locations.name(location).to_string()
    }

    /// Price a zone sequence. Consecutive zones are joined by their
    /// shortest time; `None` if any hop is unreachable.
    pub fn build_path(&self, sequence: &[LocationHandle]) -> Option<RoutePath> {
        let mut counted: HashSet<LocationHandle> = HashSet::new();
        let mut stops = Vec::with_capacity(sequence.len());
        let mut elapsed = 0u64;

        for (i, &location) in sequence.iter().enumerate() {
            if i > 0 {
                elapsed += self.graph.shortest_secs(sequence[i - 1], location)?;
            }
            let first_visit = counted.insert(location);
            let points = if i > 0 && first_visit { self.reward(location) } else { 0 };
            stops.push(RouteStop {
                location,
                points,
                arrival_secs: elapsed,
            });
        }

        let total_points = stops.iter().map(|s| s.points).sum();
        Some(RoutePath {
            stops,
            total_secs: elapsed,
            total_points,
            pivot: None,
            legs: None,
        })
    }

    fn shortest_path(&self, from: LocationHandle, to: LocationHandle) -> Result<RoutePath, RouteError> {
        if from != to {
            for endpoint in [from, to] {
                if !self.graph.contains(endpoint) {
                    return Err(RouteError::NotInGraph(self.name(endpoint)));
                }
            }
        }
        self.graph
            .path(from, to)
            .and_then(|seq| self.build_path(&seq))
            .ok_or_else(|| RouteError::Unreachable {
                from: self.name(from),
                to: self.name(to),
            })
    }

    /// Join two halves meeting at `pivot` into one route.
    fn compose(&self, first: &RoutePath, second: &RoutePath, pivot: LocationHandle) -> Option<RoutePath> {
        let mut sequence = first.locations();
        sequence.extend(second.locations().into_iter().skip(1));
        let mut path = self.build_path(&sequence)?;
        path.pivot = Some(pivot);
        path.legs = Some(Box::new((first.clone(), second.clone())));
        Some(path)
    }

    /// Direct path plus every single-pivot detour that fits the budget,
    /// best first. The direct path is returned separately too.
    pub fn single_pivot(
        &self,
        start: LocationHandle,
        end: LocationHandle,
        budget_secs: u64,
    ) -> Result<(RoutePath, Vec<RoutePath>), RouteError> {
        let direct = self.shortest_path(start, end)?;
        let mut candidates = vec![direct.clone()];

        for &pivot in self.graph.nodes() {
            if pivot == start || pivot == end || self.reward(pivot) == 0 {
                continue;
            }
            let (Some(to_pivot), Some(from_pivot)) = (
                self.graph.shortest_secs(start, pivot),
                self.graph.shortest_secs(pivot, end),
            ) else {
                continue;
            };
            if to_pivot + from_pivot > budget_secs {
                continue;
            }
            let (Ok(first), Ok(second)) = (self.shortest_path(start, pivot), self.shortest_path(pivot, end)) else {
                continue;
            };
            if let Some(path) = self.compose(&first, &second, pivot) {
                candidates.push(path);
            }
        }

        self.rank(&mut candidates);
        debug!(
            "[Route] {} -> {}: {} candidates within {}s",
            self.name(start),
            self.name(end),
            candidates.len(),
            budget_secs
        );
        Ok((direct, candidates))
    }

    /// Full search with leg refinement.
    pub fn search(
        &self,
        start: LocationHandle,
        end: LocationHandle,
        budget_secs: u64,
    ) -> Result<RouteSearch, RouteError> {
        let search = self.search_depth(start, end, budget_secs, self.config.refine_depth)?;
        let best = search.overall_best();
        info!(
            "[Route] {} -> {} in {}s: best {} pts in {}s ({:.3} pts/s)",
            self.name(start),
            self.name(end),
            budget_secs,
            best.total_points,
            best.total_secs,
            best.points_per_second()
        );
        Ok(search)
    }

    fn search_depth(
        &self,
        start: LocationHandle,
        end: LocationHandle,
        budget_secs: u64,
        depth: u32,
    ) -> Result<RouteSearch, RouteError> {
        let (direct, candidates) = self.single_pivot(start, end, budget_secs)?;

        let refinement = match candidates.first() {
            Some(RoutePath { pivot: Some(pivot), legs: Some(legs), .. }) if depth > 0 => {
                Some(Box::new(self.refine(start, end, *pivot, legs, budget_secs, depth)?))
            }
            _ => None,
        };

        Ok(RouteSearch {
            start,
            end,
            budget_secs,
            direct,
            candidates,
            refinement,
        })
    }

    fn refine(
        &self,
        start: LocationHandle,
        end: LocationHandle,
        pivot: LocationHandle,
        legs: &(RoutePath, RoutePath),
        budget_secs: u64,
        depth: u32,
    ) -> Result<Refinement, RouteError> {
        let (first, second) = legs;
        let first_budget = budget_secs.saturating_sub(second.total_secs);
        let second_budget = budget_secs.saturating_sub(first.total_secs);

        let first_leg = self.search_depth(start, pivot, first_budget, depth - 1)?;
        let second_leg = self.search_depth(pivot, end, second_budget, depth - 1)?;

        let mut combined = Vec::new();
        for a in first_leg.all_candidates() {
            for b in second_leg.all_candidates() {
                if a.total_secs + b.total_secs > budget_secs {
                    continue;
                }
                if let Some(path) = self.compose(a, b, pivot) {
                    combined.push(path);
                }
            }
        }
        self.rank(&mut combined);

        debug!(
            "[Route] Refined around {}: {} combinations",
            self.name(pivot),
            combined.len()
        );

        Ok(Refinement {
            pivot,
            first_leg,
            second_leg,
            combined,
        })
    }

    /// Sort by points per second descending, then pivot name ascending
    /// (routes without a pivot first).
    fn rank(&self, paths: &mut [RoutePath]) {
        paths.sort_by(|a, b| {
            b.points_per_second()
                .total_cmp(&a.points_per_second())
                .then_with(|| self.pivot_order(a, b))
        });
    }

    fn pivot_order(&self, a: &RoutePath, b: &RoutePath) -> Ordering {
        let name_a = a.pivot.map(|p| self.locations.name(p));
        let name_b = b.pivot.map(|p| self.locations.name(p));
        name_a.cmp(&name_b)
    }
}
