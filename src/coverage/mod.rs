//! Area coverage: link budget over every pixel of a calibrated grid.

use std::collections::BTreeMap;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::CoverageError;
use crate::geo::{LatLon, haversine_distance, initial_bearing};
use crate::grid::{CenterCalibration, GeoGrid, GridBuilder, MIN_RADIUS_KM};
use crate::io::{DEFAULT_RADIUS_KM, Transmitter};
use crate::pattern::gain::elevation_angle;
use crate::pattern::{AntennaPattern, GainEvaluator};
use crate::physics::link_budget::LinkBudget;
use crate::propagation::{PathClass, PropagationModel};
use crate::units::{Db, Kilometers, Meters};

/// Field-strength scale when nothing finite is available (dBµV/m).
pub const DEFAULT_FIELD_SCALE: ColorScale = ColorScale { min: 10.0, max: 60.0 };
/// Received-power scale when nothing finite is available (dBm).
pub const DEFAULT_POWER_SCALE: ColorScale = ColorScale { min: -110.0, max: -40.0 };
const SCALE_LOW_PERCENTILE: f64 = 0.05;
const SCALE_HIGH_PERCENTILE: f64 = 0.95;
const SCALE_MIN_SPAN: f64 = 6.0;
const SCALE_MARGIN: f64 = 0.1;

/// User-fixed colour scale bounds; a missing bound is chosen automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleOverride {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

/// Numpy-style linear-interpolated percentile of sorted data, `q` in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// 5th to 95th percentile of the finite values, widened by a margin.
pub fn auto_scale(values: &[f64]) -> Option<ColorScale> {
    let sorted = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .sorted_by(f64::total_cmp)
        .collect_vec();
    if sorted.is_empty() {
        return None;
    }
    let p5 = percentile(&sorted, SCALE_LOW_PERCENTILE);
    let p95 = percentile(&sorted, SCALE_HIGH_PERCENTILE);
    let span = (p95 - p5).max(SCALE_MIN_SPAN);
    Some(ColorScale {
        min: p5 - SCALE_MARGIN * span,
        max: p95 + SCALE_MARGIN * span,
    })
}

/// Scale for `values`: override bounds win, the rest comes from
/// [`auto_scale`] (or `fallback` with no finite data). Always `min < max`.
pub fn determine_scale(values: &[f64], scale: ScaleOverride, fallback: ColorScale) -> ColorScale {
    let auto = auto_scale(values).unwrap_or(fallback);
    let mut min = scale.min.filter(|v| v.is_finite()).unwrap_or(auto.min);
    let mut max = scale.max.filter(|v| v.is_finite()).unwrap_or(auto.max);
    if min > max {
        debug!("scale {min}..{max} is inverted, swapping bounds");
        std::mem::swap(&mut min, &mut max);
    }
    if min == max {
        let delta = min.abs() * 0.05 + 3.0;
        debug!("scale {min}..{max} is empty, widening by {delta}");
        min -= delta;
        max += delta;
    }
    debug_assert!(min < max);
    ColorScale { min, max }
}

/// Values at the pixel nearest the transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CenterSummary {
    pub row: usize,
    pub col: usize,
    pub location: LatLon,
    pub distance_km: f64,
    pub path_loss_db: f64,
    pub received_power_dbm: f64,
    pub field_dbuv_m: f64,
    pub effective_gain_db: f64,
    pub path_class: Option<PathClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GainSummary {
    pub base_gain_dbi: f64,
    /// Extremes of the horizontal pattern adjustment over the in-radius pixels.
    pub horizontal_min_db: f64,
    pub horizontal_max_db: f64,
    pub vertical_center_db: f64,
    pub rotated_horizontal_db: Vec<f64>,
    pub vertical_pattern_db: Option<Vec<f64>>,
    pub vertical_horizon_db: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentSummary {
    pub min: f64,
    pub max: f64,
    pub center: f64,
}

impl ComponentSummary {
    fn of(values: &[f64], center: usize) -> Option<Self> {
        let (min, max) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .minmax_by(f64::total_cmp)
            .into_option()?;
        Some(Self { min, max, center: values.get(center).copied().unwrap_or(f64::NAN) })
    }
}

/// Received power and field strength at one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageSample {
    pub location: LatLon,
    pub distance_km: f64,
    pub received_power_dbm: f64,
    pub field_dbuv_m: f64,
}

/// Coverage maps, row-major in the grid's `[lat][lon]` order.
///
/// `received_power` and `field_strength` are NaN outside the radius and
/// finite everywhere inside it.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageResult {
    pub grid: GeoGrid,
    pub radius: Kilometers,
    pub budget: LinkBudget,
    pub received_power: Vec<f64>,
    pub field_strength: Vec<f64>,
    pub path_loss: Vec<f64>,
    pub effective_gain: Vec<f64>,
    pub in_radius: Vec<bool>,
    pub field_scale: ColorScale,
    pub power_scale: ColorScale,
    pub center: CenterSummary,
    pub gain: GainSummary,
    pub loss_components: BTreeMap<String, ComponentSummary>,
}

impl CoverageResult {
    /// Value at the pixel nearest `p`, if that pixel is inside the radius.
    pub fn sample(&self, p: LatLon) -> Option<CoverageSample> {
        let (row, col) = self.grid.nearest(p)?;
        let i = self.grid.index(row, col);
        if !self.in_radius[i] {
            return None;
        }
        let location = self.grid.point(row, col);
        Some(CoverageSample {
            location,
            distance_km: haversine_distance(self.grid.true_center, location).value(),
            received_power_dbm: self.received_power[i],
            field_dbuv_m: self.field_strength[i],
        })
    }

    pub fn in_radius_count(&self) -> usize {
        self.in_radius.iter().filter(|&&m| m).count()
    }
}

/// Requested radius with the no-value default and the lower floor applied.
pub fn effective_radius(radius: Option<Kilometers>) -> Kilometers {
    match radius {
        None => Kilometers(DEFAULT_RADIUS_KM),
        Some(r) if r.value() > MIN_RADIUS_KM => r,
        Some(r) => {
            warn!("radius {r} raised to {MIN_RADIUS_KM} km");
            Kilometers(MIN_RADIUS_KM)
        }
    }
}

/// Replaces non-finite in-radius values by the smallest finite in-radius value
/// and everything outside the radius by NaN. `None` when nothing inside is finite.
fn mask_and_fill(values: &mut [f64], in_radius: &[bool]) -> Option<f64> {
    let floor = values
        .iter()
        .zip(in_radius)
        .filter(|&(v, &m)| m && v.is_finite())
        .map(|(&v, _)| v)
        .min_by(f64::total_cmp)?;
    for (v, &m) in values.iter_mut().zip(in_radius) {
        if !m {
            *v = f64::NAN;
        } else if !v.is_finite() {
            *v = floor;
        }
    }
    Some(floor)
}

/// Coverage of `tx` out to `radius` around its location.
pub fn compute_coverage<M: PropagationModel + ?Sized>(
    tx: &Transmitter,
    pattern: Option<&AntennaPattern>,
    radius: Option<Kilometers>,
    scale: ScaleOverride,
    model: &M,
    calibration: &CenterCalibration,
) -> Result<CoverageResult, CoverageError> {
    let start = Instant::now();
    let radius = effective_radius(radius);
    let grid = GridBuilder::new(calibration).build(tx.location, radius);
    let (rows, cols) = grid.shape();

    let request = tx.request();
    let answer = model.path_loss_grid(&request, &grid)?;
    let mismatch = CoverageError::GridShapeMismatch { expected: (rows, cols), got: answer.shape };
    let losses = match answer.into_lat_major() {
        Some(losses) if losses.shape == (rows, cols) => losses,
        _ => return Err(mismatch),
    };
    debug!("path loss for {rows}x{cols} pixels in {:?}", start.elapsed());
    let path_loss = losses.preferred().to_vec();

    let true_center = grid.true_center;
    let distances_km = grid
        .points()
        .map(|p| haversine_distance(true_center, p).value())
        .collect_vec();
    let bearings = grid.points().map(|p| initial_bearing(true_center, p).value()).collect_vec();
    let height_difference = tx.rx_height_m - tx.tx_height_m;
    let elevations = distances_km
        .iter()
        .map(|&d| elevation_angle(height_difference, Meters((d * 1000.0).max(1.0))).value())
        .collect_vec();

    let evaluator = GainEvaluator::new(pattern, tx.orientation());
    let horizontal = evaluator.horizontal_gain_grid(&bearings);
    let vertical = evaluator.vertical_gain_grid(&elevations);

    let budget = tx.link_budget();
    let effective_gain = horizontal
        .iter()
        .zip(&vertical)
        .map(|(h, v)| budget.peak_gain.value() + h + v)
        .collect_vec();
    let received = effective_gain
        .iter()
        .zip(&path_loss)
        .map(|(&g, &l)| budget.received_power(Db(g), Db(l)).value())
        .collect_vec();
    let field = received
        .iter()
        .map(|&p| budget.field_strength(p.into()).value())
        .collect_vec();

    let in_radius = distances_km.iter().map(|&d| d <= radius.value()).collect_vec();
    let mut received_power = received.clone();
    let mut field_strength = field.clone();
    let filled = mask_and_fill(&mut received_power, &in_radius)
        .zip(mask_and_fill(&mut field_strength, &in_radius));
    if filled.is_none() {
        return Err(CoverageError::NoCoverageData { radius_km: radius.value() });
    }

    let field_scale = determine_scale(&field_strength, scale, DEFAULT_FIELD_SCALE);
    let power_scale =
        determine_scale(&received_power, ScaleOverride::default(), DEFAULT_POWER_SCALE);

    let (row, col) = grid.nearest(true_center).unwrap_or((rows / 2, cols / 2));
    let ci = grid.index(row, col);
    let center = CenterSummary {
        row,
        col,
        location: grid.point(row, col),
        distance_km: distances_km[ci],
        path_loss_db: path_loss[ci],
        received_power_dbm: received[ci],
        field_dbuv_m: field[ci],
        effective_gain_db: effective_gain[ci],
        path_class: losses.path_class.as_ref().and_then(|c| c.get(ci).copied()),
    };

    let (horizontal_min_db, horizontal_max_db) = horizontal
        .iter()
        .zip(&in_radius)
        .filter(|&(_, &m)| m)
        .map(|(&h, _)| h)
        .minmax_by(f64::total_cmp)
        .into_option()
        .unwrap_or((0.0, 0.0));
    let gain = GainSummary {
        base_gain_dbi: budget.peak_gain.value(),
        horizontal_min_db,
        horizontal_max_db,
        vertical_center_db: vertical[ci],
        rotated_horizontal_db: evaluator.rotated_horizontal_db(),
        vertical_pattern_db: evaluator.vertical_pattern_db(),
        vertical_horizon_db: evaluator.horizon_gain().value(),
    };

    let loss_components = losses
        .components
        .iter()
        .filter_map(|(name, values)| Some((name.clone(), ComponentSummary::of(values, ci)?)))
        .collect();

    let result = CoverageResult {
        grid,
        radius,
        budget,
        received_power,
        field_strength,
        path_loss,
        effective_gain,
        in_radius,
        field_scale,
        power_scale,
        center,
        gain,
        loss_components,
    };
    info!(
        "coverage {rows}x{cols} ({} px in {:.1} km), field scale {:.1}..{:.1} dBµV/m, \
         center {:.1} dBµV/m, took {:?}",
        result.in_radius_count(),
        radius.value(),
        field_scale.min,
        field_scale.max,
        center.field_dbuv_m,
        start.elapsed()
    );
    Ok(result)
}
