use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};

use rf_coverage::coverage::{ScaleOverride, compute_coverage};
use rf_coverage::geo::LatLon;
use rf_coverage::grid::CenterCalibration;
use rf_coverage::io::{
    Scenario, load_pattern_file, load_scenario, write_coverage_csv, write_profile_csv,
};
use rf_coverage::pattern::AntennaPattern;
use rf_coverage::physics::ProfileEngine;
use rf_coverage::physics::profile::DEFAULT_STEP_M;
use rf_coverage::physics::refraction::RefractionParams;
use rf_coverage::propagation::FreeSpaceModel;
use rf_coverage::terrain::{
    FlatTerrain, MissingTilePolicy, TerrainLoader, TerrainManager, TerrainProvider,
};
use rf_coverage::units::{Kilometers, Meters};

/// Tiles kept in memory while sampling a profile.
const TILE_CACHE: usize = 16;

#[derive(Debug, Parser)]
#[clap(version, about = "Broadcast transmitter coverage and link profiles")]
#[clap(disable_help_subcommand = true)]
#[clap(propagate_version = true)]
#[clap(arg_required_else_help = true)]
struct Cli {
    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv).
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse an antenna pattern file and report what was read.
    Pattern {
        file: PathBuf,
    },

    /// Received power and field strength over a disk around the transmitter.
    Coverage {
        #[clap(long)]
        scenario: PathBuf,

        /// Radius in km; overrides the scenario.
        #[clap(long)]
        radius: Option<f64>,

        /// Lower bound of the field-strength colour scale (dBµV/m).
        #[clap(long)]
        min: Option<f64>,

        /// Upper bound of the field-strength colour scale (dBµV/m).
        #[clap(long)]
        max: Option<f64>,

        /// Write in-radius pixels to this CSV file.
        #[clap(long)]
        csv: Option<PathBuf>,
    },

    /// Terrain profile and link budget from the transmitter to one receiver.
    Profile {
        #[clap(long)]
        scenario: PathBuf,

        #[clap(long, allow_hyphen_values = true)]
        rx_lat: Option<f64>,

        #[clap(long, allow_hyphen_values = true)]
        rx_lon: Option<f64>,

        /// Directory with SRTM .hgt tiles. Flat 0 m terrain without it.
        #[clap(long)]
        hgt_dir: Option<PathBuf>,

        /// Treat missing tiles as sea level instead of failing.
        #[clap(long)]
        allow_missing_tiles: bool,

        /// Terrain sample spacing in metres.
        #[clap(long, default_value_t = DEFAULT_STEP_M)]
        step: f64,

        /// Effective Earth radius factor.
        #[clap(long, default_value_t = 4.0 / 3.0)]
        k_factor: f64,

        #[clap(long)]
        csv: Option<PathBuf>,
    },
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        _ => builder.filter_level(log::LevelFilter::Trace),
    };
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match cli.command {
        Command::Pattern { file } => run_pattern(&file),
        Command::Coverage { scenario, radius, min, max, csv } => {
            run_coverage(&scenario, radius, ScaleOverride { min, max }, csv.as_deref())
        }
        Command::Profile {
            scenario,
            rx_lat,
            rx_lon,
            hgt_dir,
            allow_missing_tiles,
            step,
            k_factor,
            csv,
        } => {
            let scenario = load_scenario(&scenario)?;
            let rx = match (rx_lat, rx_lon, scenario.receiver) {
                (Some(latitude), Some(longitude), _) => LatLon::new(latitude, longitude),
                (None, None, Some(rx)) => rx,
                _ => bail!("Give both --rx-lat and --rx-lon, or a receiver in the scenario"),
            };
            let terrain: Box<dyn TerrainProvider> = match hgt_dir {
                Some(dir) => {
                    let policy = if allow_missing_tiles {
                        MissingTilePolicy::Flat
                    } else {
                        MissingTilePolicy::Fail
                    };
                    let loader = TerrainLoader::new(dir).with_missing_policy(policy);
                    Box::new(TerrainManager::new(loader, TILE_CACHE))
                }
                None => Box::new(FlatTerrain::default()),
            };
            let engine = ProfileEngine::new(RefractionParams { k_factor }, Meters(step));
            run_profile(&scenario, rx, terrain.as_ref(), engine, csv.as_deref())
        }
    }
}

fn scenario_pattern(scenario: &Scenario) -> Result<Option<AntennaPattern>> {
    scenario
        .pattern_file
        .as_deref()
        .map(|path| load_pattern_file(path).map(|(pattern, _)| pattern))
        .transpose()
}

fn run_pattern(file: &Path) -> Result<()> {
    let (pattern, warnings) = load_pattern_file(file)?;
    let meta = pattern.meta();
    info!("Title: {}", meta.title.as_deref().unwrap_or("-"));
    if let (Some(p1), Some(p2)) = (meta.param1, meta.param2) {
        info!("Parameters: {p1}, {p2}");
    }
    let figure = |v: Option<f64>, unit: &str| {
        v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1} {unit}"))
    };
    info!(
        "Horizontal: HPBW {}, directivity {}",
        figure(pattern.horizontal_beamwidth(), "°"),
        figure(pattern.horizontal_directivity_db(), "dB")
    );
    info!(
        "Vertical: HPBW {}, directivity {}",
        figure(pattern.vertical_beamwidth(), "°"),
        figure(pattern.vertical_directivity_db(), "dB")
    );
    if warnings.is_empty() {
        info!("Pattern read without fallbacks");
    } else {
        info!("{} fallback(s) applied while reading", warnings.len());
    }
    Ok(())
}

fn run_coverage(
    path: &Path,
    radius: Option<f64>,
    scale: ScaleOverride,
    csv: Option<&Path>,
) -> Result<()> {
    let scenario = load_scenario(path)?;
    let pattern = scenario_pattern(&scenario)?;
    if pattern.is_none() {
        warn!("No antenna pattern, using peak gain in every direction");
    }
    let radius = radius.map(Kilometers).unwrap_or_else(|| scenario.radius());
    let scale = ScaleOverride {
        min: scale.min.or(scenario.scale.min),
        max: scale.max.or(scenario.scale.max),
    };

    let result = compute_coverage(
        &scenario.transmitter,
        pattern.as_ref(),
        Some(radius),
        scale,
        &FreeSpaceModel,
        &CenterCalibration::default(),
    )?;

    let c = &result.center;
    info!(
        "Center pixel ({:.6}, {:.6}), {:.3} km from the transmitter",
        c.location.latitude, c.location.longitude, c.distance_km
    );
    info!("  path loss      {:.2} dB", c.path_loss_db);
    info!("  effective gain {:.2} dBi", c.effective_gain_db);
    info!("  received power {:.2} dBm", c.received_power_dbm);
    info!("  field strength {:.2} dBµV/m", c.field_dbuv_m);
    info!(
        "Horizontal pattern adjustment {:.2}..{:.2} dB, vertical at horizon {:.2} dB",
        result.gain.horizontal_min_db,
        result.gain.horizontal_max_db,
        result.gain.vertical_horizon_db
    );
    info!("Field scale {:.1}..{:.1} dBµV/m", result.field_scale.min, result.field_scale.max);
    info!("Power scale {:.1}..{:.1} dBm", result.power_scale.min, result.power_scale.max);

    if let Some(rx) = scenario.receiver {
        match result.sample(rx) {
            Some(s) => info!(
                "Receiver: {:.2} dBm, {:.2} dBµV/m at {:.2} km",
                s.received_power_dbm, s.field_dbuv_m, s.distance_km
            ),
            None => warn!(
                "Receiver ({:.5}, {:.5}) is outside the coverage radius",
                rx.latitude, rx.longitude
            ),
        }
    }

    if let Some(csv) = csv {
        let file = File::create(csv).with_context(|| format!("Failed to create {:?}", csv))?;
        let rows = write_coverage_csv(&result, BufWriter::new(file))?;
        info!("Wrote {rows} pixels to {:?}", csv);
    }
    Ok(())
}

fn run_profile(
    scenario: &Scenario,
    rx: LatLon,
    terrain: &dyn TerrainProvider,
    engine: ProfileEngine,
    csv: Option<&Path>,
) -> Result<()> {
    let pattern = scenario_pattern(scenario)?;
    let tx = &scenario.transmitter;
    let profile =
        engine.compute_profile(tx, pattern.as_ref(), tx.location, rx, terrain, &FreeSpaceModel)?;

    info!("Distance TX→RX: {:.2} km", profile.distance.value());
    info!("RX direction: {:.2}", profile.bearing);
    info!(
        "TX gain (base + ΔH + ΔV): {:.2} ({:.2} + {:.2} + {:.2})",
        profile.effective_gain,
        profile.peak_gain,
        profile.pattern_gain.horizontal,
        profile.pattern_gain.vertical
    );
    info!("ERP in that direction: {:.2}", profile.erp);
    info!("Path loss: {:.2}", profile.path_loss);
    info!("RX gain: {:.2}", tx.rx_gain_dbi);
    info!("Received power: {:.2}", profile.received_power);
    info!("Field strength at RX: {:.2}", profile.field_strength);
    info!("Obstacles in the first Fresnel zone: {}", profile.obstacle_description());

    if let Some(csv) = csv {
        let file = File::create(csv).with_context(|| format!("Failed to create {:?}", csv))?;
        let rows = write_profile_csv(&profile, BufWriter::new(file))?;
        info!("Wrote {rows} samples to {:?}", csv);
    }
    Ok(())
}
