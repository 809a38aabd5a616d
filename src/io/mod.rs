//! Transmitter/scenario configuration and file exchange.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::coverage::{CoverageResult, ScaleOverride};
use crate::geo::LatLon;
use crate::pattern::{
    AntennaOrientation, AntennaPattern, PatternWarning, decode_latin1,
    parse_pattern_with_diagnostics,
};
use crate::physics::link_budget::{LinkBudget, clamp_frequency};
use crate::physics::profile::LinkProfile;
use crate::propagation::{ClutterZone, PathLossRequest, Polarization};
use crate::units::{Db, Degrees, Kilometers, MegaHertz, Meters, Watts};

pub const DEFAULT_RADIUS_KM: f64 = 10.0;
pub const MIN_TIME_PERCENT: f64 = 0.001;
pub const MAX_TIME_PERCENT: f64 = 50.0;
pub const SUPPORTED_MODEL_VERSIONS: [u8; 2] = [14, 16];
pub const DEFAULT_MODEL_VERSION: u8 = 16;

/// Broadcast transmitter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transmitter {
    pub name: String,
    pub location: LatLon,
    pub power_w: Watts,
    /// Peak gain of the transmitting antenna.
    pub antenna_gain_dbi: Db,
    pub rx_gain_dbi: Db,
    /// Cable/combiner losses between transmitter and antenna.
    pub system_loss_db: Db,
    pub frequency_mhz: MegaHertz,
    /// Antenna heights above ground.
    pub tx_height_m: Meters,
    pub rx_height_m: Meters,
    pub time_percent: f64,
    pub polarization: Polarization,
    pub model_version: u8,
    pub temperature_k: f64,
    pub pressure_hpa: f64,
    pub water_density: f64,
    pub clutter: ClutterZone,
    pub direction_deg: Degrees,
    pub tilt_deg: Degrees,
}

impl Default for Transmitter {
    fn default() -> Self {
        Self {
            name: String::new(),
            location: LatLon::default(),
            power_w: Watts(1.0),
            antenna_gain_dbi: Db(0.0),
            rx_gain_dbi: Db(0.0),
            system_loss_db: Db(0.0),
            frequency_mhz: MegaHertz(100.0),
            tx_height_m: Meters(30.0),
            rx_height_m: Meters(1.0),
            time_percent: 40.0,
            polarization: Polarization::Vertical,
            model_version: DEFAULT_MODEL_VERSION,
            temperature_k: 293.15,
            pressure_hpa: 1013.0,
            water_density: 7.5,
            clutter: ClutterZone::Unknown,
            direction_deg: Degrees(0.0),
            tilt_deg: Degrees(0.0),
        }
    }
}

impl Transmitter {
    pub fn orientation(&self) -> AntennaOrientation {
        AntennaOrientation::new(self.direction_deg, self.tilt_deg)
    }

    pub fn link_budget(&self) -> LinkBudget {
        LinkBudget::new(
            self.power_w,
            self.antenna_gain_dbi,
            self.rx_gain_dbi,
            self.system_loss_db,
            self.frequency_mhz,
        )
    }

    /// Propagation query for this transmitter with every parameter clamped
    /// into the range the model accepts.
    pub fn request(&self) -> PathLossRequest {
        let time_percent = if self.time_percent.is_finite() && self.time_percent > 0.0 {
            self.time_percent.clamp(MIN_TIME_PERCENT, MAX_TIME_PERCENT)
        } else {
            Self::default().time_percent
        };
        let version = if SUPPORTED_MODEL_VERSIONS.contains(&self.model_version) {
            self.model_version
        } else {
            warn!(
                "model version {} not supported, using {DEFAULT_MODEL_VERSION}",
                self.model_version
            );
            DEFAULT_MODEL_VERSION
        };
        let water_density = if self.water_density.is_finite() { self.water_density } else { 7.5 };

        PathLossRequest {
            frequency: clamp_frequency(self.frequency_mhz),
            temperature_k: self.temperature_k,
            pressure_hpa: self.pressure_hpa,
            water_density,
            tx: self.location,
            tx_height: self.tx_height_m,
            rx_height: self.rx_height_m,
            time_percent,
            clutter_tx: self.clutter,
            clutter_rx: self.clutter,
            polarization: self.polarization,
            version,
        }
    }
}

/// One coverage/profile job read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub transmitter: Transmitter,
    /// Antenna pattern text file; relative paths are taken from the scenario's directory.
    pub pattern_file: Option<PathBuf>,
    pub radius_km: Option<Kilometers>,
    pub scale: ScaleOverride,
    pub receiver: Option<LatLon>,
}

impl Scenario {
    pub fn radius(&self) -> Kilometers {
        self.radius_km.unwrap_or(Kilometers(DEFAULT_RADIUS_KM))
    }
}

pub fn load_transmitters_from_json(path: &Path) -> Result<Vec<Transmitter>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let transmitters: Vec<Transmitter> =
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {:?}", path))?;
    debug!("loaded {} transmitters from {:?}", transmitters.len(), path);
    Ok(transmitters)
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut scenario: Scenario =
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {:?}", path))?;

    if let Some(pattern) = scenario.pattern_file.take() {
        let resolved = match path.parent() {
            Some(dir) if pattern.is_relative() => dir.join(pattern),
            _ => pattern,
        };
        scenario.pattern_file = Some(resolved);
    }
    Ok(scenario)
}

/// Reads a pattern upload as Latin-1 text and parses it.
pub fn load_pattern_file(path: &Path) -> Result<(AntennaPattern, Vec<PatternWarning>)> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read pattern {:?}", path))?;
    let (pattern, warnings) = parse_pattern_with_diagnostics(&decode_latin1(&bytes));
    for w in &warnings {
        warn!("{:?}: {w}", path);
    }
    Ok((pattern, warnings))
}

#[derive(Serialize)]
struct CoverageRow {
    lat: f64,
    lon: f64,
    power_dbm: f64,
    field_dbuv_m: f64,
}

/// Writes every finite in-radius pixel; returns the number of rows.
pub fn write_coverage_csv<W: Write>(result: &CoverageResult, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for (i, p) in result.grid.points().enumerate() {
        let (power, field) = (result.received_power[i], result.field_strength[i]);
        if !(power.is_finite() && field.is_finite()) {
            continue;
        }
        csv.serialize(CoverageRow {
            lat: p.latitude,
            lon: p.longitude,
            power_dbm: power,
            field_dbuv_m: field,
        })?;
        rows += 1;
    }
    csv.flush()?;
    Ok(rows)
}

#[derive(Serialize)]
struct ProfileRow {
    distance_km: f64,
    terrain_m: f64,
    adjusted_m: f64,
    sight_line_m: f64,
    fresnel_top_m: f64,
    fresnel_bottom_m: f64,
    obstructed: bool,
}

pub fn write_profile_csv<W: Write>(profile: &LinkProfile, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for i in 0..profile.len() {
        csv.serialize(ProfileRow {
            distance_km: profile.distances_m[i] / 1000.0,
            terrain_m: profile.terrain_m[i],
            adjusted_m: profile.adjusted_m[i],
            sight_line_m: profile.sight_line_m[i],
            fresnel_top_m: profile.fresnel_top_m[i],
            fresnel_bottom_m: profile.fresnel_bottom_m[i],
            obstructed: profile.obstructed[i],
        })?;
    }
    csv.flush()?;
    Ok(profile.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmitter_defaults_from_partial_json() {
        let tx: Transmitter = serde_json::from_str(
            r#"{
                "name": "FM 98.1",
                "location": {"latitude": -23.55, "longitude": -46.63},
                "power_w": 2000.0
            }"#,
        )
        .unwrap();
        assert_eq!(tx.name, "FM 98.1");
        assert_eq!(tx.power_w, Watts(2000.0));
        assert_eq!(tx.tx_height_m, Meters(30.0));
        assert_eq!(tx.rx_height_m, Meters(1.0));
        assert_eq!(tx.polarization, Polarization::Vertical);
        assert_eq!(tx.model_version, 16);
    }

    #[test]
    fn test_request_clamps() {
        let tx = Transmitter {
            frequency_mhz: MegaHertz(54.0),
            time_percent: 80.0,
            model_version: 15,
            clutter: ClutterZone::Urban,
            ..Default::default()
        };
        let req = tx.request();
        assert_eq!(req.frequency, MegaHertz(100.0));
        assert_eq!(req.time_percent, 50.0);
        assert_eq!(req.version, 16);
        assert_eq!(req.clutter_rx, ClutterZone::Urban);

        let tiny =
            Transmitter { time_percent: 1e-9, model_version: 14, ..Default::default() }.request();
        assert_eq!(tiny.time_percent, MIN_TIME_PERCENT);
        assert_eq!(tiny.version, 14);
    }

    #[test]
    fn test_scenario_json() {
        let s: Scenario = serde_json::from_str(
            r#"{
                "transmitter": {
                    "frequency_mhz": 600.0,
                    "direction_deg": 370.0,
                    "clutter": "tropical_forest"
                },
                "scale": {"min": 20.0},
                "receiver": {"latitude": 1.0, "longitude": 2.0}
            }"#,
        )
        .unwrap();
        assert_eq!(s.radius(), Kilometers(DEFAULT_RADIUS_KM));
        assert_eq!(s.scale.min, Some(20.0));
        assert_eq!(s.scale.max, None);
        assert_eq!(s.transmitter.clutter, ClutterZone::TropicalForest);
        assert_eq!(s.transmitter.orientation().direction, Degrees(10.0));
        assert_eq!(s.receiver, Some(LatLon::new(1.0, 2.0)));
    }

    #[test]
    fn test_load_scenario_resolves_pattern_path() {
        let dir = std::env::temp_dir().join(format!("rf_coverage_scenario_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("job.json");
        std::fs::write(&path, r#"{"pattern_file": "ant.pat", "radius_km": 25.0}"#).unwrap();

        let s = load_scenario(&path).unwrap();
        assert_eq!(s.pattern_file, Some(dir.join("ant.pat")));
        assert_eq!(s.radius(), Kilometers(25.0));

        std::fs::write(dir.join("ant.pat"), b"'Ant\xe9na', 1, 2\n0,1.0\n999\n0,1.0\n").unwrap();
        let (pattern, warnings) = load_pattern_file(&dir.join("ant.pat")).unwrap();
        assert_eq!(pattern.meta().title.as_deref(), Some("Ant\u{e9}na"));
        assert!(!warnings.is_empty());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_transmitters_from_json(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(format!("{err}").contains("Failed to open"));
    }
}
