//! Location and actor registries for one report run.
//!
//! Locations live in an arena and are referred to by [`LocationHandle`]
//! everywhere else in the crate. Interning the same identifier twice returns
//! the same handle, so grouping by handle is grouping by zone identity.
//!
//! Registries are not shared between runs; batch callers give every run its
//! own instance.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{ActorId, GeoPoint, LocationId, StaticLocation};

/// Index of a location in its [`LocationRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationHandle(usize);

impl LocationHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A zone with its static data, prior and the value computed this run.
#[derive(Debug, Clone)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub base_value: i64,
    pub hourly_rate: i64,
    pub point: GeoPoint,
    /// Expected value carried over from an earlier run
    pub prior: Option<i64>,
    /// Expected value computed this run; `None` until estimated or when
    /// there is too little history
    pub expected: Option<i64>,
}

impl Location {
    fn from_static(id: LocationId, data: &StaticLocation, prior: Option<i64>) -> Self {
        Self {
            id,
            name: data.name.clone(),
            base_value: data.base_value,
            hourly_rate: data.hourly_rate,
            point: data.point(),
            prior,
            expected: None,
        }
    }

    /// Points for holding this zone `hours` hours: the takeover value plus
    /// the whole points accrued.
    pub fn points_for_hours(&self, hours: f64) -> i64 {
        self.base_value + (hours.max(0.0) * self.hourly_rate as f64).floor() as i64
    }

    /// Value of visiting this zone as a route reward.
    pub fn reward(&self) -> i64 {
        self.expected.unwrap_or(0).max(0)
    }
}

/// Arena of locations keyed by identifier.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    locations: Vec<Location>,
    by_id: HashMap<LocationId, LocationHandle>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `id`, creating the location on first request.
    ///
    /// Later calls for the same identifier ignore `data` and `prior`.
    pub fn intern(&mut self, id: LocationId, data: &StaticLocation, prior: Option<i64>) -> LocationHandle {
        if let Some(handle) = self.by_id.get(&id) {
            return *handle;
        }
        let handle = LocationHandle(self.locations.len());
        self.locations.push(Location::from_static(id, data, prior));
        self.by_id.insert(id, handle);
        handle
    }

    pub fn handle_of(&self, id: LocationId) -> Option<LocationHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn get(&self, handle: LocationHandle) -> &Location {
        &self.locations[handle.0]
    }

    pub fn get_mut(&mut self, handle: LocationHandle) -> &mut Location {
        &mut self.locations[handle.0]
    }

    pub fn name(&self, handle: LocationHandle) -> &str {
        &self.locations[handle.0].name
    }

    /// Resolve a user query: an all-digit string is tried as an identifier
    /// first, then names are matched case-insensitively.
    pub fn find(&self, query: &str) -> Option<LocationHandle> {
        let query = query.trim();
        if !query.is_empty() && query.chars().all(|c| c.is_ascii_digit()) {
            if let Some(handle) = query.parse().ok().and_then(|id| self.handle_of(LocationId(id))) {
                return Some(handle);
            }
        }
        self.locations
            .iter()
            .position(|l| l.name.eq_ignore_ascii_case(query))
            .map(LocationHandle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocationHandle, &Location)> {
        self.locations
            .iter()
            .enumerate()
            .map(|(i, l)| (LocationHandle(i), l))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

// ============================================================================
// Actors
// ============================================================================

/// A player. Equality and hashing use the identifier only.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    pub name: Option<String>,
    /// Ranking position, when known
    pub place: Option<u32>,
}

impl Actor {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            name: None,
            place: None,
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }
}

impl PartialEq for Actor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Actor {}

impl Hash for Actor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.place {
            Some(place) => write!(f, "{}({})", self.display_name(), place),
            None => write!(f, "{}(?)", self.display_name()),
        }
    }
}

/// Actors seen during a run. Display info is attached lazily.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    actors: HashMap<ActorId, Actor>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, id: ActorId) -> ActorId {
        self.actors.entry(id).or_insert_with(|| Actor::new(id));
        id
    }

    /// Attach a display name and ranking position.
    pub fn set_info(&mut self, id: ActorId, name: &str, place: Option<u32>) {
        let actor = self.actors.entry(id).or_insert_with(|| Actor::new(id));
        actor.name = Some(name.to_string());
        actor.place = place;
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<ActorId> {
        self.actors
            .values()
            .find(|a| a.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .map(|a| a.id)
    }

    /// Label for reports; unknown actors fall back to their identifier.
    pub fn label(&self, id: ActorId) -> String {
        match self.actors.get(&id) {
            Some(actor) => actor.to_string(),
            None => Actor::new(id).to_string(),
        }
    }

    /// Identifiers still missing display info, for the caller to resolve.
    pub fn unresolved(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| a.name.is_none())
            .map(|a| a.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
