//! `turf-report`: zone values, ownership timelines and routes from saved
//! Turf data.
//!
//! Inputs are JSON files keyed by zone identifier: the ownership log, the
//! static zone data and optionally the previous period's expected values.
//! A log whose file name starts with a date (`2014-06-01_turf.json`) is
//! treated as a finished period ending at noon that day.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::{info, warn, LevelFilter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use turf_routes::report::{self, ReportConfig};
use turf_routes::{
    nominal_cutoff, ActorId, ActorRegistry, Analysis, AnalysisConfig, Direction, HomeConfig,
    OwnershipLog, Period, PriorValues, RouteQuery, StaticCatalog,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Report Turf zone values, timelines and routes", long_about = None)]
struct Cli {
    /// Ownership log to report on
    #[arg(short, long, default_value = "curr_turf_data.json")]
    file: PathBuf,

    /// Static zone data (name, points, coordinates)
    #[arg(short = 's', long = "static", default_value = "static_zone_data.json")]
    static_file: PathBuf,

    /// Expected values from the previous period, if the file exists
    #[arg(short, long, default_value = "prev_turf_avg.json")]
    prior: PathBuf,

    /// Write this run's expected values here
    #[arg(short, long)]
    zonefile: Option<PathBuf>,

    /// Only zones north, south, east, west of home, or local to it
    #[arg(short, long)]
    direction: Option<Direction>,

    /// Player to report for, by name or id; bare flag means the configured user
    #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
    user: Option<String>,

    /// Player names and places: {"<id>": {"name": .., "place": ..}}
    #[arg(long)]
    players: Option<PathBuf>,

    /// Treat the log as a finished period ending at noon on this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    finished: Option<NaiveDate>,

    /// Earlier finished logs to learn travel times from (file names start with their date)
    #[arg(long = "history", value_name = "FILE")]
    history: Vec<PathBuf>,

    /// Search a route: start zone, end zone, minutes available
    #[arg(long, num_args = 3, value_names = ["START", "END", "MINUTES"])]
    route: Option<Vec<String>>,

    /// List connections between zones
    #[arg(long)]
    connections: bool,

    /// List the zones the player holds right now
    #[arg(long)]
    holdings: bool,

    /// Print structured JSON instead of text
    #[arg(long)]
    json: bool,

    /// Hours east of UTC for displayed times
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    utc_offset: i32,

    /// User settings: {"username", "user_id", "home_longitude", "home_latitude"}
    #[arg(short, long, default_value = "turf_config.json")]
    config: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    username: Option<String>,
    user_id: Option<u64>,
    home_longitude: Option<f64>,
    home_latitude: Option<f64>,
}

impl UserConfig {
    fn home(&self) -> Option<HomeConfig> {
        Some(HomeConfig::new(self.home_latitude?, self.home_longitude?))
    }
}

#[derive(Debug, Deserialize)]
struct PlayerInfo {
    name: String,
    place: Option<u32>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Date prefix of a file name, e.g. `2014-06-01_turf.json`.
fn date_prefix(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let prefix = name.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn resolve_user(
    query: &str,
    config: &UserConfig,
    roster: &ActorRegistry,
) -> Result<ActorId> {
    let query = query.trim();
    if !query.is_empty() && query.chars().all(|c| c.is_ascii_digit()) {
        return Ok(ActorId(query.parse().context("player id")?));
    }

    let name = if query.is_empty() {
        match (&config.username, config.user_id) {
            (_, Some(id)) => return Ok(ActorId(id)),
            (Some(name), None) => name.as_str(),
            (None, None) => bail!("no user given and none configured"),
        }
    } else {
        query
    };

    if let Some(id) = roster.find_by_name(name) {
        return Ok(id);
    }
    match (&config.username, config.user_id) {
        (Some(configured), Some(id)) if configured.eq_ignore_ascii_case(name) => Ok(ActorId(id)),
        _ => bail!("unknown player '{}': pass an id or a --players file", name),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, LevelFilter::Warn)
        .filter(Some("turf_routes"), LevelFilter::Info)
        .filter(Some("turf_report"), LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Cli::parse();

    let config: UserConfig = if args.config.is_file() {
        read_json(&args.config)?
    } else {
        warn!("No config file at {}, using defaults", args.config.display());
        UserConfig::default()
    };

    let catalog: StaticCatalog = read_json(&args.static_file)?;
    let log: OwnershipLog = read_json(&args.file)?;
    let priors: PriorValues = if args.prior.is_file() {
        read_json(&args.prior)?
    } else {
        PriorValues::new()
    };
    let players: BTreeMap<ActorId, PlayerInfo> = match &args.players {
        Some(path) => read_json(path)?,
        None => BTreeMap::new(),
    };
    let mut roster = ActorRegistry::new();
    for (id, player) in &players {
        roster.set_info(*id, &player.name, player.place);
    }

    let period = match args.finished.or_else(|| date_prefix(&args.file)) {
        Some(date) => Period::Finished {
            cutoff: nominal_cutoff(date),
        },
        None => Period::live(),
    };

    let user = args
        .user
        .as_deref()
        .map(|q| resolve_user(q, &config, &roster))
        .transpose()?;

    let mut analysis_config = AnalysisConfig::new(period);
    analysis_config.perspective = user;
    analysis_config.direction = args.direction;
    analysis_config.home = config.home();
    if args.direction.is_some() && analysis_config.home.is_none() {
        bail!("--direction needs home_longitude and home_latitude in {}", args.config.display());
    }

    let mut analysis = Analysis::run(&catalog, &log, &priors, analysis_config);
    for (id, player) in &players {
        analysis.actors_mut().set_info(*id, &player.name, player.place);
    }

    for path in &args.history {
        let date = date_prefix(path)
            .with_context(|| format!("history file {} must start with its date", path.display()))?;
        let old: OwnershipLog = read_json(path)?;
        analysis.with_history(&old, &catalog, nominal_cutoff(date));
    }

    if let Some(path) = &args.zonefile {
        let values = serde_json::to_string_pretty(&analysis.expected_values())?;
        fs::write(path, values).with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {} expected values to {}", analysis.timelines().len(), path.display());
    }

    let report_config = ReportConfig::with_offset_hours(args.utc_offset)
        .with_context(|| format!("invalid UTC offset {}", args.utc_offset))?;

    if let Some(route) = &args.route {
        let [start, end, minutes] = route.as_slice() else {
            bail!("--route takes START END MINUTES");
        };
        let minutes: u64 = minutes.parse().with_context(|| format!("minutes '{}'", minutes))?;
        let search = analysis.find_route(&RouteQuery::new(start, end, minutes))?;
        if args.json {
            print_json(&report::route_summaries(&search, analysis.locations()))?;
        } else {
            println!("{}", report::route_report(&search, analysis.locations()));
        }
    } else if args.connections {
        let connections = analysis.connections(user);
        if args.json {
            print_json(&report::connection_summaries(&connections, analysis.locations()))?;
        } else {
            println!("{}", report::connection_report(&connections, analysis.locations()));
        }
    } else if args.holdings {
        let Some(user) = user else {
            bail!("--holdings needs --user");
        };
        println!("{}", report::holdings_report(&analysis, user, &report_config));
    } else if args.json {
        print_json(&report::location_summaries(&analysis))?;
    } else if let Some(user) = user {
        println!("{}", report::actor_timeline(&analysis, user, &report_config));
    } else {
        println!("{}", report::location_report(&analysis, &report_config));
    }

    Ok(())
}
