//! Geo-referenced sample grids for coverage maps.
//!
//! Raster overlays drawn from these grids show a systematic offset that
//! grows with the radius. [`CenterCalibration`] predicts that offset from
//! a small table of measured points and the grid is built around the
//! shifted *render* center. The transmitter coordinate itself is kept on
//! the grid untouched; all distance and gain math uses it.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo::{Bounds, KM_PER_DEGREE, LatLon, geodesic_bounds};
use crate::units::Kilometers;

pub const MIN_RESOLUTION_ARCSEC: f64 = 0.5;
pub const MAX_RESOLUTION_ARCSEC: f64 = 20.0;
/// Grids span the requested radius plus this margin.
pub const SPAN_PADDING: f64 = 1.05;
pub const MIN_RADIUS_KM: f64 = 0.5;

/// Measured raster misalignment at a given radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub radius_km: f64,
    pub delta_lat: f64,
    pub delta_lon: f64,
}

pub const DEFAULT_CALIBRATION_TABLE: [CalibrationPoint; 5] = [
    CalibrationPoint { radius_km: 20.0, delta_lat: -0.002316, delta_lon: 0.006451 },
    CalibrationPoint { radius_km: 40.0, delta_lat: -0.002324, delta_lon: 0.013683 },
    CalibrationPoint { radius_km: 60.0, delta_lat: -0.005666, delta_lon: 0.018373 },
    CalibrationPoint { radius_km: 100.0, delta_lat: -0.011404, delta_lon: 0.030432 },
    CalibrationPoint { radius_km: 300.0, delta_lat: -0.034283, delta_lon: 0.090573 },
];

/// Per-radius-band multipliers `(upper bound km, lat factor, lon factor)`,
/// applied to the regression prediction. Bands are half-open `[prev, upper)`.
const BAND_SCALES: [(f64, f64, f64); 7] = [
    (21.0, 1.90, 0.95),
    (31.0, 1.40, 0.93),
    (41.0, 1.28, 1.00),
    (51.0, 1.21, 1.03),
    (61.0, 1.19, 0.97),
    (71.0, 1.17, 1.025),
    (101.0, 1.10, 1.027),
];

/// Ordinary least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn fit(xs: &[f64], ys: &[f64]) -> Self {
        let n = xs.len().min(ys.len());
        if n == 0 {
            return Self { slope: 0.0, intercept: 0.0 };
        }
        let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
        let mean_y = ys[..n].iter().sum::<f64>() / n as f64;
        let (sxy, sxx) = xs[..n]
            .iter()
            .zip(&ys[..n])
            .fold((0.0, 0.0), |(sxy, sxx), (&x, &y)| {
                (sxy + (x - mean_x) * (y - mean_y), sxx + (x - mean_x).powi(2))
            });
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        Self { slope, intercept: mean_y - slope * mean_x }
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// The two center-offset regressions. Fit once, read-only afterwards;
/// share it by reference between requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenterCalibration {
    lat: LinearFit,
    lon: LinearFit,
}

impl Default for CenterCalibration {
    fn default() -> Self {
        Self::from_table(&DEFAULT_CALIBRATION_TABLE)
    }
}

impl CenterCalibration {
    pub fn from_table(points: &[CalibrationPoint]) -> Self {
        let radii: Vec<f64> = points.iter().map(|p| p.radius_km).collect();
        let lats: Vec<f64> = points.iter().map(|p| p.delta_lat).collect();
        let lons: Vec<f64> = points.iter().map(|p| p.delta_lon).collect();
        Self {
            lat: LinearFit::fit(&radii, &lats),
            lon: LinearFit::fit(&radii, &lons),
        }
    }

    /// No correction at all; render center equals the transmitter.
    pub fn identity() -> Self {
        let zero = LinearFit { slope: 0.0, intercept: 0.0 };
        Self { lat: zero, lon: zero }
    }

    /// Regression prediction before band scaling, `(dlat, dlon)` degrees.
    pub fn base_offset(&self, radius: Kilometers) -> (f64, f64) {
        (self.lat.predict(radius.value()), self.lon.predict(radius.value()))
    }

    /// Band-scaled offset `(dlat, dlon)` degrees. Radii past the last band
    /// reuse its factors.
    pub fn offset(&self, radius: Kilometers) -> (f64, f64) {
        let (base_lat, base_lon) = self.base_offset(radius);
        let (scale_lat, scale_lon) = band_scale(radius.value());
        (base_lat * scale_lat, base_lon * scale_lon)
    }

    /// Center to rasterise around so the overlay lands on `center`.
    pub fn render_center(&self, center: LatLon, radius: Kilometers) -> LatLon {
        let (dlat, dlon) = self.offset(radius);
        LatLon {
            latitude: center.latitude - dlat,
            longitude: center.longitude - dlon,
        }
    }
}

fn band_scale(radius_km: f64) -> (f64, f64) {
    BAND_SCALES
        .iter()
        .find(|(upper, _, _)| radius_km < *upper)
        .or(BAND_SCALES.last())
        .map(|&(_, lat, lon)| (lat, lon))
        .unwrap_or((1.0, 1.0))
}

/// Angular pixel size in arcseconds for a radius: aims for 640 px across
/// up to 25 km, 512 px up to 80 km and 384 px beyond.
pub fn select_resolution_arcsec(radius: Kilometers) -> f64 {
    let radius_km = radius.value().max(MIN_RADIUS_KM);
    let target_pixels: f64 = if radius_km <= 25.0 {
        640.0
    } else if radius_km <= 80.0 {
        512.0
    } else {
        384.0
    };
    let diameter_deg = (2.0 * radius_km / KM_PER_DEGREE).max(0.01);
    (diameter_deg * 3600.0 / target_pixels.max(256.0))
        .clamp(MIN_RESOLUTION_ARCSEC, MAX_RESOLUTION_ARCSEC)
}

/// Regular lat/lon grid, row-major with rows = latitudes (south to north)
/// and columns = longitudes (west to east).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoGrid {
    /// Transmitter coordinate, uncorrected.
    pub true_center: LatLon,
    /// Center the raster is built around.
    pub render_center: LatLon,
    pub radius_km: f64,
    pub span_lat_deg: f64,
    pub span_lon_deg: f64,
    pub resolution_arcsec: f64,
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    /// Pixel-edge bounds (half a pixel beyond the outer sample centers).
    pub bounds: Bounds,
}

impl GeoGrid {
    /// `(rows, cols)` = `(lats.len(), lons.len())`.
    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }

    pub fn len(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resolution_deg(&self) -> f64 {
        self.resolution_arcsec / 3600.0
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.lons.len() + col
    }

    pub fn point(&self, row: usize, col: usize) -> LatLon {
        LatLon::new(self.lats[row], self.lons[col])
    }

    /// All sample points in row-major order.
    pub fn points(&self) -> impl Iterator<Item = LatLon> + '_ {
        self.lats
            .iter()
            .flat_map(move |&lat| self.lons.iter().map(move |&lon| LatLon::new(lat, lon)))
    }

    /// `(row, col)` of the sample nearest to `p` along each axis.
    pub fn nearest(&self, p: LatLon) -> Option<(usize, usize)> {
        Some((nearest_index(&self.lats, p.latitude)?, nearest_index(&self.lons, p.longitude)?))
    }
}

fn nearest_index(axis: &[f64], value: f64) -> Option<usize> {
    axis.iter()
        .enumerate()
        .min_by(|a, b| (a.1 - value).abs().total_cmp(&(b.1 - value).abs()))
        .map(|(i, _)| i)
}

/// Coordinates `center ± k·step`, symmetric, covering `span`.
fn axis(center: f64, span: f64, step: f64) -> Vec<f64> {
    let half_steps = (span / 2.0 / step).ceil().max(1.0) as i64;
    (-half_steps..=half_steps).map(|k| center + k as f64 * step).collect()
}

pub struct GridBuilder<'a> {
    calibration: &'a CenterCalibration,
}

impl<'a> GridBuilder<'a> {
    pub fn new(calibration: &'a CenterCalibration) -> Self {
        Self { calibration }
    }

    pub fn build(&self, center: LatLon, radius: Kilometers) -> GeoGrid {
        let radius = Kilometers(radius.value().max(MIN_RADIUS_KM));
        let render_center = self.calibration.render_center(center, radius);
        let resolution_arcsec = select_resolution_arcsec(radius);
        let step = resolution_arcsec / 3600.0;

        let hint = geodesic_bounds(render_center, radius);
        let span_lat_deg = hint.lat_span() * SPAN_PADDING;
        let span_lon_deg = hint.lon_span() * SPAN_PADDING;

        let lats = axis(render_center.latitude, span_lat_deg, step);
        let lons = axis(render_center.longitude, span_lon_deg, step);

        let half = step / 2.0;
        let bounds = Bounds {
            north: lats[lats.len() - 1] + half,
            south: lats[0] - half,
            east: lons[lons.len() - 1] + half,
            west: lons[0] - half,
        };

        debug!(
            "grid: {}x{} at {:.3}\" around ({:.6}, {:.6}), render center ({:.6}, {:.6})",
            lats.len(),
            lons.len(),
            resolution_arcsec,
            center.latitude,
            center.longitude,
            render_center.latitude,
            render_center.longitude
        );

        GeoGrid {
            true_center: center,
            render_center,
            radius_km: radius.value(),
            span_lat_deg,
            span_lon_deg,
            resolution_arcsec,
            lons,
            lats,
            bounds,
        }
    }
}
