//! Route search over one day of recorded rides.
//!
//! Run with: cargo run --example route_search

use turf_routes::report::{self, ReportConfig};
use turf_routes::{
    ActorId, Analysis, AnalysisConfig, LocationId, OwnershipLog, Period, PriorValues, RawEvent,
    RouteQuery, StaticCatalog, StaticLocation, parse_timestamp,
};

fn main() {
    // A handful of zones around central Gothenburg
    let zones = [
        (1, "Brunnsparken", 65, 1, 57.7069, 11.9690),
        (2, "Stora Torget", 125, 3, 57.7071, 11.9660),
        (3, "Domkyrkan", 95, 2, 57.7044, 11.9627),
        (4, "Haga", 185, 5, 57.6992, 11.9561),
        (5, "Slottsskogen", 155, 4, 57.6855, 11.9411),
        (6, "Avenyn", 95, 2, 57.6996, 11.9751),
    ];
    let mut catalog = StaticCatalog::new();
    for (id, name, base, rate, lat, lng) in zones {
        catalog.insert(LocationId(id), StaticLocation::new(name, base, rate, lat, lng));
    }

    // Two riders taking zones off each other through the day
    let rides: [(&str, u64, u64); 14] = [
        ("2014-06-01T07:30:00+0000", 1, 10),
        ("2014-06-01T07:34:00+0000", 2, 10),
        ("2014-06-01T07:39:00+0000", 3, 10),
        ("2014-06-01T07:46:00+0000", 4, 10),
        ("2014-06-01T07:58:00+0000", 5, 10),
        ("2014-06-01T12:00:00+0000", 6, 20),
        ("2014-06-01T12:09:00+0000", 3, 20),
        ("2014-06-01T12:14:00+0000", 2, 20),
        ("2014-06-01T12:18:00+0000", 1, 20),
        ("2014-06-01T17:05:00+0000", 5, 10),
        ("2014-06-01T17:18:00+0000", 4, 10),
        ("2014-06-01T17:25:00+0000", 3, 10),
        ("2014-06-01T17:31:00+0000", 6, 10),
        ("2014-06-01T17:40:00+0000", 1, 10),
    ];
    let mut log = OwnershipLog::new();
    for (at, zone, actor) in rides {
        log.entry(LocationId(zone))
            .or_default()
            .push(RawEvent::new(at, ActorId(actor)));
    }

    let mut priors = PriorValues::new();
    priors.insert(LocationId(4), Some(240));
    priors.insert(LocationId(5), Some(210));

    let now = parse_timestamp("2014-06-01T20:00:00+0000").unwrap();
    let mut config = AnalysisConfig::new(Period::Live { now });
    config.perspective = Some(ActorId(20));

    let mut analysis = Analysis::run(&catalog, &log, &priors, config);
    analysis.actors_mut().set_info(ActorId(10), "morgonpigg", Some(3));
    analysis.actors_mut().set_info(ActorId(20), "lunchcyklist", Some(41));

    println!("Zones by expected value (as seen by lunchcyklist)\n");
    println!("{}\n", report::location_report(&analysis, &ReportConfig::default()));

    println!("Connections\n");
    let connections = analysis.connections(None);
    println!("{}\n", report::connection_report(&connections, analysis.locations()));

    // Routes use the perspective player's own travel times
    for (start, end, minutes) in [("Avenyn", "Brunnsparken", 20), ("Brunnsparken", "Brunnsparken", 30)] {
        println!("Route {} -> {} in {} min", start, end, minutes);
        match analysis.find_route(&RouteQuery::new(start, end, minutes)) {
            Ok(search) => println!("{}\n", report::route_report(&search, analysis.locations())),
            Err(e) => println!("  {}\n", e),
        }
    }
}
