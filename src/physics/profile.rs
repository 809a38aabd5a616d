use std::time::Instant;

use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;

use crate::error::CoverageError;
use crate::geo::{LatLon, calculate_geodesic, interpolate};
use crate::io::Transmitter;
use crate::pattern::gain::elevation_angle;
use crate::pattern::{AntennaPattern, GainComponents, GainEvaluator};
use crate::physics::fresnel::fresnel_radius;
use crate::physics::refraction::{
    RefractionParams, adjust_heights_for_curvature, curvature_drop, effective_earth_radius,
};
use crate::propagation::{PathClass, PropagationModel};
use crate::terrain::TerrainProvider;
use crate::units::{Db, Dbm, DbuvPerMeter, Degrees, Kilometers, Meters};

/// Terrain sample spacing when none (or a non-positive one) is given.
pub const DEFAULT_STEP_M: f64 = 30.0;
/// Obstructions listed in [`LinkProfile::obstacle_description`].
pub const MAX_OBSTACLES_LISTED: usize = 6;

/// One TX→RX path: terrain, clearance geometry and link budget.
///
/// All per-sample vectors have the same length, index 0 being the
/// transmitter and the last index the receiver.
#[derive(Debug, Clone, Serialize)]
pub struct LinkProfile {
    pub tx: LatLon,
    pub rx: LatLon,
    pub distance: Kilometers,
    pub bearing: Degrees,
    /// Elevation of the receiver antenna as seen from the transmitter antenna.
    pub elevation: Degrees,

    pub distances_m: Vec<f64>,
    pub terrain_m: Vec<f64>,
    /// Terrain with the antennas on the endpoints and the curvature drop on the interior.
    pub adjusted_m: Vec<f64>,
    /// Straight line between the antenna tops.
    pub sight_line_m: Vec<f64>,
    pub curvature_drop_m: Vec<f64>,
    pub fresnel_top_m: Vec<f64>,
    pub fresnel_bottom_m: Vec<f64>,
    pub obstructed: Vec<bool>,

    pub effective_earth_radius: Meters,
    pub wavelength: Meters,

    pub peak_gain: Db,
    pub pattern_gain: GainComponents,
    pub effective_gain: Db,
    pub erp: Dbm,
    pub path_loss: Db,
    pub path_class: Option<PathClass>,
    pub received_power: Dbm,
    pub field_strength: DbuvPerMeter,
}

impl LinkProfile {
    pub fn len(&self) -> usize {
        self.distances_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances_m.is_empty()
    }

    pub fn is_clear(&self) -> bool {
        !self.obstructed.iter().any(|&o| o)
    }

    pub fn obstruction_distances_km(&self) -> Vec<f64> {
        self.distances_m
            .iter()
            .zip(&self.obstructed)
            .filter(|&(_, &o)| o)
            .map(|(&d, _)| d / 1000.0)
            .collect()
    }

    /// `"1.20 km, 1.23 km"` for the first few obstructions, `"None"` when clear.
    pub fn obstacle_description(&self) -> String {
        let distances = self.obstruction_distances_km();
        if distances.is_empty() {
            return "None".to_string();
        }
        distances
            .iter()
            .take(MAX_OBSTACLES_LISTED)
            .map(|d| format!("{d:.2} km"))
            .join(", ")
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ProfileEngine {
    pub refraction: RefractionParams,
    pub step: Meters,
}

impl Default for ProfileEngine {
    fn default() -> Self {
        Self::new(RefractionParams::default(), Meters(DEFAULT_STEP_M))
    }
}

impl ProfileEngine {
    pub fn new(refraction: RefractionParams, step: Meters) -> Self {
        let step = if step.value() > 0.0 && step.is_finite() {
            step
        } else {
            Meters(DEFAULT_STEP_M)
        };
        Self { refraction, step }
    }

    /// Profile and single-path budget from `tx_coord` to `rx_coord`.
    ///
    /// The transmitter's own location is ignored in favour of `tx_coord`.
    pub fn compute_profile<T, M>(
        &self,
        tx: &Transmitter,
        pattern: Option<&AntennaPattern>,
        tx_coord: LatLon,
        rx_coord: LatLon,
        terrain: &T,
        model: &M,
    ) -> Result<LinkProfile, CoverageError>
    where
        T: TerrainProvider + ?Sized,
        M: PropagationModel + ?Sized,
    {
        let start = Instant::now();
        let (dist, bearing) = calculate_geodesic(tx_coord, rx_coord);
        let total_m = dist.value();

        let steps = ((total_m / self.step.value()).ceil() as usize).max(1);
        let fractions = (0..=steps).map(|i| i as f64 / steps as f64).collect_vec();
        let distances_m = fractions.iter().map(|f| f * total_m).collect_vec();
        let terrain_m = fractions
            .iter()
            .map(|&f| terrain.altitude(interpolate(tx_coord, rx_coord, f)))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("profile: {} samples over {:.3} km", terrain_m.len(), total_m / 1000.0);

        let budget = tx.link_budget();
        let wavelength = budget.wavelength();
        let adjusted_m =
            adjust_heights_for_curvature(&distances_m, &terrain_m, tx.tx_height_m, tx.rx_height_m);

        let tx_top = terrain_m[0] + tx.tx_height_m.value();
        let rx_top = terrain_m[steps] + tx.rx_height_m.value();
        let sight_line_m = fractions.iter().map(|f| tx_top + (rx_top - tx_top) * f).collect_vec();
        let curvature_drop_m = distances_m
            .iter()
            .map(|&d| curvature_drop(Meters(d).to_kilometers()).value())
            .collect_vec();
        let radius_m = distances_m
            .iter()
            .map(|&d| fresnel_radius(Meters(d), Meters(total_m - d), wavelength).value())
            .collect_vec();

        let centre = sight_line_m.iter().zip(&curvature_drop_m).map(|(s, c)| s - c).collect_vec();
        let fresnel_top_m = centre.iter().zip(&radius_m).map(|(c, r)| c + r).collect_vec();
        let fresnel_bottom_m = centre.iter().zip(&radius_m).map(|(c, r)| c - r).collect_vec();
        let obstructed = terrain_m
            .iter()
            .zip(&fresnel_bottom_m)
            .enumerate()
            .map(|(i, (h, floor))| i != 0 && i != steps && h >= floor)
            .collect_vec();

        let elevation = elevation_angle(tx.rx_height_m - tx.tx_height_m, Meters(total_m.max(1.0)));
        let pattern_gain = GainEvaluator::new(pattern, tx.orientation()).gain(bearing, elevation);
        let effective_gain = budget.effective_gain(pattern_gain);

        let mut request = tx.request();
        request.tx = tx_coord;
        let loss = model.path_loss(&request, rx_coord)?;
        let path_loss = loss.preferred();
        let received_power = budget.received_power(effective_gain, path_loss);

        let profile = LinkProfile {
            tx: tx_coord,
            rx: rx_coord,
            distance: dist.to_kilometers(),
            bearing,
            elevation,
            distances_m,
            terrain_m,
            adjusted_m,
            sight_line_m,
            curvature_drop_m,
            fresnel_top_m,
            fresnel_bottom_m,
            obstructed,
            effective_earth_radius: effective_earth_radius(self.refraction),
            wavelength,
            peak_gain: budget.peak_gain,
            pattern_gain,
            effective_gain,
            erp: budget.erp(effective_gain),
            path_loss,
            path_class: loss.path_class,
            received_power,
            field_strength: budget.field_strength(received_power),
        };

        info!(
            "profile {:.2} km at {:.2}: loss {:.2}, Prx {:.2}, E {:.2}, obstacles: {} ({:?})",
            profile.distance.value(),
            bearing,
            path_loss,
            received_power,
            profile.field_strength,
            profile.obstacle_description(),
            start.elapsed()
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::destination;
    use crate::pattern::parse_pattern;
    use crate::propagation::{
        FreeSpaceModel, PathLoss, PathLossGrid, PathLossRequest, PropagationError,
    };
    use crate::grid::GeoGrid;
    use crate::terrain::{FlatTerrain, TerrainError};
    use crate::units::{MegaHertz, Watts};
    use approx::assert_abs_diff_eq;

    /// Flat ground with a single hill around a given distance from the origin.
    struct Ridge {
        origin: LatLon,
        at_km: f64,
        height_m: f64,
    }

    impl TerrainProvider for Ridge {
        fn altitude(&self, loc: LatLon) -> Result<f64, TerrainError> {
            let d = crate::geo::haversine_distance(self.origin, loc).value();
            Ok(if (d - self.at_km).abs() < 0.1 { self.height_m } else { 0.0 })
        }
    }

    struct Unavailable;

    impl PropagationModel for Unavailable {
        fn path_loss_grid(
            &self,
            _: &PathLossRequest,
            _: &GeoGrid,
        ) -> Result<PathLossGrid, PropagationError> {
            Err(PropagationError::Model("offline".into()))
        }

        fn path_loss(
            &self,
            request: &PathLossRequest,
            _: LatLon,
        ) -> Result<PathLoss, PropagationError> {
            Err(PropagationError::MissingTerrain {
                lat: request.tx.latitude,
                lon: request.tx.longitude,
            })
        }
    }

    fn transmitter(frequency: f64) -> Transmitter {
        Transmitter {
            power_w: Watts(1000.0),
            antenna_gain_dbi: Db(6.0),
            rx_gain_dbi: Db(2.0),
            system_loss_db: Db(1.0),
            frequency_mhz: MegaHertz(frequency),
            ..Default::default()
        }
    }

    fn path() -> (LatLon, LatLon) {
        let tx = LatLon::new(-15.0, -47.0);
        (tx, destination(tx, Degrees(90.0), Kilometers(5.0)))
    }

    #[test]
    fn test_flat_path_clear_at_high_frequency() {
        let (a, b) = path();
        let terrain = FlatTerrain::default();
        let profile = ProfileEngine::default()
            .compute_profile(&transmitter(40_000.0), None, a, b, &terrain, &FreeSpaceModel)
            .unwrap();
        assert!(profile.is_clear(), "obstructed at {}", profile.obstacle_description());
        assert_eq!(profile.obstacle_description(), "None");
        assert_abs_diff_eq!(profile.distance.value(), 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(profile.bearing.value(), 90.0, epsilon = 1e-3);
    }

    #[test]
    fn test_flat_path_grazes_near_low_receiver() {
        // at 100 MHz the first zone is tens of metres wide and the 1 m RX sits in it
        let (a, b) = path();
        let terrain = FlatTerrain::default();
        let profile = ProfileEngine::default()
            .compute_profile(&transmitter(100.0), None, a, b, &terrain, &FreeSpaceModel)
            .unwrap();
        let blocked = profile.obstruction_distances_km();
        assert!(!blocked.is_empty());
        assert!(blocked.iter().all(|&d| d > 0.0 && d < 5.0));
        assert!(!profile.obstructed[0]);
        assert!(!profile.obstructed[profile.len() - 1]);
    }

    #[test]
    fn test_ridge_is_found() {
        let (a, b) = path();
        let ridge = Ridge { origin: a, at_km: 2.5, height_m: 40.0 };
        let profile = ProfileEngine::new(RefractionParams::default(), Meters(10.0))
            .compute_profile(&transmitter(40_000.0), None, a, b, &ridge, &FreeSpaceModel)
            .unwrap();
        let blocked = profile.obstruction_distances_km();
        assert!(!blocked.is_empty());
        assert!(blocked.iter().all(|d| (d - 2.5).abs() < 0.11));
        assert!(profile.obstacle_description().matches(" km").count() <= MAX_OBSTACLES_LISTED);
    }

    #[test]
    fn test_geometry_arrays() {
        let (a, b) = path();
        let terrain = FlatTerrain { height_m: 12.0 };
        let profile = ProfileEngine::new(RefractionParams::default(), Meters(480.0))
            .compute_profile(&transmitter(600.0), None, a, b, &terrain, &FreeSpaceModel)
            .unwrap();
        let n = profile.len();
        assert_eq!(n, 12);
        for v in [
            &profile.terrain_m,
            &profile.adjusted_m,
            &profile.sight_line_m,
            &profile.fresnel_top_m,
            &profile.fresnel_bottom_m,
        ] {
            assert_eq!(v.len(), n);
        }
        assert_abs_diff_eq!(profile.adjusted_m[0], 42.0);
        assert_abs_diff_eq!(profile.adjusted_m[n - 1], 13.0);
        assert_abs_diff_eq!(profile.sight_line_m[0], 42.0);
        assert_abs_diff_eq!(profile.sight_line_m[n - 1], 13.0);
        // no zone at the ends
        assert_abs_diff_eq!(profile.fresnel_top_m[0], profile.fresnel_bottom_m[0]);
        assert!(profile.fresnel_top_m[5] > profile.fresnel_bottom_m[5]);
    }

    #[test]
    fn test_single_path_budget() {
        let (a, b) = path();
        let tx = transmitter(100.0);
        let terrain = FlatTerrain::default();
        let profile = ProfileEngine::default()
            .compute_profile(&tx, None, a, b, &terrain, &FreeSpaceModel)
            .unwrap();

        let loss = FreeSpaceModel::loss(Kilometers(5.0), MegaHertz(100.0)).value();
        assert_abs_diff_eq!(profile.path_loss.value(), loss, epsilon = 1e-6);
        assert_abs_diff_eq!(profile.erp.value(), 60.0 + 6.0 - 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(profile.received_power.value(), 65.0 + 2.0 - loss, epsilon = 1e-6);
        let expected = 65.0 - loss + 77.2 + 40.0;
        assert_abs_diff_eq!(profile.field_strength.value(), expected, epsilon = 1e-6);
        assert_eq!(profile.path_class, Some(PathClass::LineOfSight));
    }

    #[test]
    fn test_pattern_reduces_gain_off_boresight() {
        let (a, b) = path();
        // peak towards north, null towards south; receiver is due east
        let mut text = String::new();
        for az in 0..360 {
            text.push_str(&format!("{az},{}\n", 0.5 + 0.5 * (az as f64).to_radians().cos()));
        }
        text.push_str("999\n0,1\n");
        let pattern = parse_pattern(&text);
        let tx = transmitter(100.0);

        let terrain = FlatTerrain::default();
        let profile = ProfileEngine::default()
            .compute_profile(&tx, Some(&pattern), a, b, &terrain, &FreeSpaceModel)
            .unwrap();
        let half = 20.0 * 0.5f64.log10();
        assert_abs_diff_eq!(profile.pattern_gain.horizontal.value(), half, epsilon = 1e-3);
        assert!(profile.effective_gain < profile.peak_gain);
    }

    #[test]
    fn test_upstream_failures_propagate() {
        let (a, b) = path();
        let err = ProfileEngine::default()
            .compute_profile(&transmitter(100.0), None, a, b, &FlatTerrain::default(), &Unavailable)
            .unwrap_err();
        assert!(matches!(err, CoverageError::Propagation(PropagationError::MissingTerrain { .. })));
    }

    #[test]
    fn test_coincident_endpoints() {
        let (a, _) = path();
        let terrain = FlatTerrain::default();
        let profile = ProfileEngine::default()
            .compute_profile(&transmitter(100.0), None, a, a, &terrain, &FreeSpaceModel)
            .unwrap();
        assert_eq!(profile.len(), 2);
        assert!(profile.is_clear());
        assert!(profile.field_strength.is_finite());
    }
}
