//! Travel times accumulated over several finished periods.
//!
//! Generates a grid of zones and a rider who sweeps through it every day,
//! then loads the earlier periods as history so the travel graph covers
//! the whole grid. The all-pairs search runs on the rayon pool.
//!
//! Run with: cargo run --release --example season_history --features parallel

use chrono::{Duration, NaiveDate};
use std::time::Instant;
use turf_routes::{
    nominal_cutoff, ActorId, Analysis, AnalysisConfig, LocationId, OwnershipLog, Period,
    PriorValues, RawEvent, RouteQuery, StaticCatalog, StaticLocation,
};

const GRID: u64 = 12;

fn grid_catalog() -> StaticCatalog {
    let mut catalog = StaticCatalog::new();
    for row in 0..GRID {
        for col in 0..GRID {
            let id = row * GRID + col + 1;
            let lat = 57.68 + row as f64 * 0.004;
            let lng = 11.92 + col as f64 * 0.006;
            let base = 65 + (id % 5) as i64 * 30;
            catalog.insert(
                LocationId(id),
                StaticLocation::new(&format!("Zon {}", id), base, (id % 4) as i64 + 1, lat, lng),
            );
        }
    }
    catalog
}

/// One rider sweeping five rows, four minutes per zone; a second
/// rider retakes a scattering of zones in the afternoon.
fn period_log(date: NaiveDate, band: u64) -> OwnershipLog {
    let mut log = OwnershipLog::new();
    let mut at = date.and_hms_opt(7, 0, 0).unwrap().and_utc();

    for row in band..(band + 5).min(GRID) {
        let cols: Vec<u64> = if row % 2 == 0 {
            (0..GRID).collect()
        } else {
            (0..GRID).rev().collect()
        };
        for col in cols {
            let id = row * GRID + col + 1;
            let stamp = at.format("%Y-%m-%dT%H:%M:%S+0000").to_string();
            log.entry(LocationId(id)).or_default().push(RawEvent::new(&stamp, ActorId(1)));
            at += Duration::minutes(4);
        }
    }

    let mut afternoon = date.and_hms_opt(15, 0, 0).unwrap().and_utc();
    for id in (1..=GRID * GRID).step_by(7) {
        let stamp = afternoon.format("%Y-%m-%dT%H:%M:%S+0000").to_string();
        log.entry(LocationId(id)).or_default().push(RawEvent::new(&stamp, ActorId(2)));
        afternoon += Duration::minutes(45);
    }
    log
}

fn main() {
    let catalog = grid_catalog();
    let first_day = NaiveDate::from_ymd_opt(2014, 6, 1).unwrap();
    let days: Vec<NaiveDate> = (0..4).map(|d| first_day + Duration::days(d)).collect();

    // The current period is the last day; earlier days become history
    let Some((today, earlier)) = days.split_last() else {
        return;
    };
    let cutoff = nominal_cutoff(*today + Duration::days(1));
    let mut analysis = Analysis::run(
        &catalog,
        &period_log(*today, 8),
        &PriorValues::new(),
        AnalysisConfig::new(Period::Finished { cutoff }),
    );

    println!("Current period only:");
    println!("  {} connections", analysis.connections(Some(ActorId(1))).len());

    for (i, day) in earlier.iter().enumerate() {
        let log = period_log(*day, i as u64 * 4);
        let added = analysis.with_history(&log, &catalog, nominal_cutoff(*day + Duration::days(1)));
        println!("  + {} intervals from {}", added, day);
    }

    let start = Instant::now();
    let graph = analysis.travel_graph(Some(ActorId(1)));
    println!(
        "\nTravel graph: {} zones, built in {:?}",
        graph.node_count(),
        start.elapsed()
    );

    let query = RouteQuery::new("Zon 1", &format!("Zon {}", GRID * GRID), 90);
    match analysis.find_route(&query) {
        Ok(search) => {
            let best = search.overall_best();
            println!(
                "Best route {} -> {} in {} min: {} points in {} s ({:.3} points/s, {} stops)",
                query.start,
                query.end,
                query.budget_minutes,
                best.total_points,
                best.total_secs,
                best.points_per_second(),
                best.stops.len()
            );
        }
        Err(e) => println!("No route: {}", e),
    }
}
