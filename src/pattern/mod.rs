//! Antenna radiation-pattern files.
//!
//! The accepted text layout is:
//!
//! ```text
//! 'Title', 12.5, 0          <- optional header: title and two numeric parameters
//! 0,1.0                     <- horizontal block: "azimuth,value" lines
//! 1,0.998
//! ...
//! 999                       <- end of horizontal block
//! -90,0.1                   <- vertical block: free "angle,value" pairs
//! ...
//! ```
//!
//! Values may be linear E/Emax or decibels; each block is detected
//! independently. Parsing never fails: malformed content degrades to
//! omni / Gaussian fallbacks and the degradations are reported through
//! [`PatternWarning`].

pub mod gain;

use std::fmt;

use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;

pub use gain::{AntennaOrientation, GainComponents, GainEvaluator};

/// Samples in the horizontal pattern (azimuth 0..359, 1° step).
pub const HORIZONTAL_SAMPLES: usize = 360;
/// Samples in the vertical pattern (elevation -90..+90, 1° step).
pub const VERTICAL_SAMPLES: usize = 181;

const END_OF_HORIZONTAL: &str = "999";
const GAUSSIAN_SIGMA_DEG: f64 = 15.0;
/// Vertical rows above this are counts/metadata when the real samples are small.
const VERTICAL_METADATA_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternMeta {
    pub title: Option<String>,
    pub param1: Option<f64>,
    pub param2: Option<f64>,
}

/// Peak-normalised radiation pattern, E/Emax in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AntennaPattern {
    horizontal: Vec<f64>,
    vertical: Vec<f64>,
    meta: PatternMeta,
}

impl AntennaPattern {
    /// Omni in azimuth with the Gaussian elevation lobe.
    pub fn omni() -> Self {
        Self {
            horizontal: vec![1.0; HORIZONTAL_SAMPLES],
            vertical: gaussian_vertical(),
            meta: PatternMeta::default(),
        }
    }

    /// 360 samples, index = azimuth in degrees.
    pub fn horizontal(&self) -> &[f64] {
        &self.horizontal
    }

    /// 181 samples, index 0 = -90°, index 90 = horizon, index 180 = +90°.
    pub fn vertical(&self) -> &[f64] {
        &self.vertical
    }

    pub fn meta(&self) -> &PatternMeta {
        &self.meta
    }

    /// Elevation angle of each vertical sample.
    pub fn vertical_angles() -> impl Iterator<Item = f64> {
        (0..VERTICAL_SAMPLES).map(|i| i as f64 - 90.0)
    }

    /// Horizontal -3 dB beamwidth in degrees, measured around the peak.
    /// The pattern is re-centred on its peak so lobes crossing 0° are handled.
    pub fn horizontal_beamwidth(&self) -> Option<f64> {
        let peak = argmax(&self.horizontal)?;
        let shift = peak as isize - (HORIZONTAL_SAMPLES / 2) as isize;
        let angles: Vec<f64> = (0..HORIZONTAL_SAMPLES).map(|i| i as f64).collect();
        let centred: Vec<f64> = (0..HORIZONTAL_SAMPLES)
            .map(|i| {
                let src = (i as isize + shift).rem_euclid(HORIZONTAL_SAMPLES as isize) as usize;
                self.horizontal[src]
            })
            .collect();
        half_power_beamwidth(&angles, &centred)
    }

    pub fn vertical_beamwidth(&self) -> Option<f64> {
        let angles: Vec<f64> = Self::vertical_angles().collect();
        half_power_beamwidth(&angles, &self.vertical)
    }

    pub fn horizontal_directivity_db(&self) -> Option<f64> {
        directivity_db(&self.horizontal, std::f64::consts::TAU)
    }

    pub fn vertical_directivity_db(&self) -> Option<f64> {
        directivity_db(&self.vertical, std::f64::consts::PI)
    }
}

/// Non-fatal findings while parsing. The parsed values are the same
/// whether or not these are inspected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PatternWarning {
    /// First line looked like a header but could not be split into title and two numbers.
    UnparsedHeader(String),
    /// Azimuths missing from the file, filled from neighbours.
    HorizontalFilled { missing: usize },
    /// No usable horizontal value at all; horizontal pattern is omni.
    HorizontalOmniFallback,
    HorizontalDecibels,
    VerticalDecibels,
    /// Rows with implausibly large values dropped from the vertical block.
    VerticalMetadataDropped { rows: usize },
    /// Only one side of the horizon given; mirrored about 0°.
    VerticalMirrored,
    /// Samples did not reach ±90°; zero-padded at the edges.
    VerticalEdgePadded,
    /// No usable vertical samples; Gaussian lobe synthesised.
    VerticalGaussianFallback,
}

impl fmt::Display for PatternWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternWarning::UnparsedHeader(line) => {
                write!(f, "header line not understood: {line:?}")
            }
            PatternWarning::HorizontalFilled { missing } => {
                write!(f, "{missing} azimuths missing, filled from neighbours")
            }
            PatternWarning::HorizontalOmniFallback => {
                write!(f, "no horizontal data, assuming omni")
            }
            PatternWarning::HorizontalDecibels => write!(f, "horizontal block read as dB"),
            PatternWarning::VerticalDecibels => write!(f, "vertical block read as dB"),
            PatternWarning::VerticalMetadataDropped { rows } => {
                write!(f, "{rows} metadata rows dropped from vertical block")
            }
            PatternWarning::VerticalMirrored => {
                write!(f, "vertical block mirrored about the horizon")
            }
            PatternWarning::VerticalEdgePadded => write!(f, "vertical block zero-padded to ±90°"),
            PatternWarning::VerticalGaussianFallback => {
                write!(f, "no vertical data, using Gaussian lobe (σ = 15°)")
            }
        }
    }
}

/// Parse pattern text. Total: never fails, always returns 360 + 181 samples.
pub fn parse_pattern(text: &str) -> AntennaPattern {
    parse_pattern_with_diagnostics(text).0
}

/// Parse raw upload bytes, decoded as Latin-1.
pub fn parse_pattern_bytes(bytes: &[u8]) -> AntennaPattern {
    parse_pattern(&decode_latin1(bytes))
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub fn parse_pattern_with_diagnostics(text: &str) -> (AntennaPattern, Vec<PatternWarning>) {
    let mut warnings = Vec::new();
    let all_lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect_vec();
    let mut lines: &[&str] = &all_lines;

    let mut meta = PatternMeta::default();
    if let Some(first) = lines.first() {
        if looks_like_header(first) {
            match parse_header(first) {
                Some(m) => meta = m,
                None => warnings.push(PatternWarning::UnparsedHeader(first.to_string())),
            }
            lines = &lines[1..];
        }
    }

    let mut horizontal_raw = [f64::NAN; HORIZONTAL_SAMPLES];
    let mut rest = lines.len();
    for (i, line) in lines.iter().enumerate() {
        if *line == END_OF_HORIZONTAL {
            rest = i + 1;
            break;
        }
        let parts = split_fields(line);
        if let Some(az) = parts.first().and_then(|p| parse_integer(p)) {
            let value = parts.get(1).map(|v| parse_float(v)).unwrap_or(f64::NAN);
            horizontal_raw[az.rem_euclid(HORIZONTAL_SAMPLES as i64) as usize] = value;
        }
    }

    let vertical_pairs: Vec<(f64, f64)> = lines[rest.min(lines.len())..]
        .iter()
        .filter_map(|line| {
            let parts = split_fields(line);
            if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
                return None;
            }
            let (a, v) = (parse_float(parts[0]), parse_float(parts[1]));
            (a.is_finite() && v.is_finite() && (-360.0..=360.0).contains(&a)).then_some((a, v))
        })
        .collect();

    let horizontal = build_horizontal(horizontal_raw, &mut warnings);
    let vertical = build_vertical(vertical_pairs, &mut warnings);

    for w in &warnings {
        debug!("pattern: {w}");
    }

    (AntennaPattern { horizontal, vertical, meta }, warnings)
}

fn looks_like_header(line: &str) -> bool {
    line.starts_with('\'')
        || line.starts_with('"')
        || line.chars().next().is_some_and(|c| c.is_alphabetic())
}

/// `'title', p1, p2` with optional quotes around the title.
fn parse_header(line: &str) -> Option<PatternMeta> {
    let mut it = line.rsplitn(3, ',');
    let p2 = it.next()?.trim();
    let p1 = it.next()?.trim();
    let title = it.next()?.trim();
    let (p1, p2) = (p1.parse::<f64>().ok()?, p2.parse::<f64>().ok()?);
    let title = title.trim_matches(|c| c == '\'' || c == '"').trim();
    Some(PatternMeta {
        title: Some(title.to_string()),
        param1: Some(p1),
        param2: Some(p2),
    })
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn parse_integer(token: &str) -> Option<i64> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn parse_float(token: &str) -> f64 {
    token.parse().unwrap_or(f64::NAN)
}

/// dB if anything is clearly negative or implausibly large for a field ratio.
fn is_decibel(values: &[f64]) -> bool {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    match finite.minmax().into_option() {
        Some((min, max)) => min < -0.5 || max > 20.0,
        None => false,
    }
}

fn to_linear(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = 10f64.powf(*v / 20.0);
    }
}

/// Divide by the peak and clip into [0, 1]. `false` if there is no positive peak.
fn peak_normalise(values: &mut [f64]) -> bool {
    let peak = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !(peak.is_finite() && peak > 0.0) {
        return false;
    }
    for v in values.iter_mut() {
        *v = (*v / peak).clamp(0.0, 1.0);
    }
    true
}

fn build_horizontal(
    mut raw: [f64; HORIZONTAL_SAMPLES],
    warnings: &mut Vec<PatternWarning>,
) -> Vec<f64> {
    let missing = raw.iter().filter(|v| !v.is_finite()).count();
    if missing == HORIZONTAL_SAMPLES {
        warnings.push(PatternWarning::HorizontalOmniFallback);
        return vec![1.0; HORIZONTAL_SAMPLES];
    }
    if missing > 0 {
        warnings.push(PatternWarning::HorizontalFilled { missing });
        let mut last = f64::NAN;
        for v in raw.iter_mut() {
            if v.is_finite() {
                last = *v;
            } else {
                *v = last;
            }
        }
        let mut last = f64::NAN;
        for v in raw.iter_mut().rev() {
            if v.is_finite() {
                last = *v;
            } else {
                *v = last;
            }
        }
    }

    if is_decibel(&raw) {
        warnings.push(PatternWarning::HorizontalDecibels);
        to_linear(&mut raw);
    }
    if !peak_normalise(&mut raw) {
        warn!("horizontal pattern has no positive peak, assuming omni");
        warnings.push(PatternWarning::HorizontalOmniFallback);
        return vec![1.0; HORIZONTAL_SAMPLES];
    }
    raw.to_vec()
}

fn build_vertical(mut pairs: Vec<(f64, f64)>, warnings: &mut Vec<PatternWarning>) -> Vec<f64> {
    if pairs.is_empty() {
        warnings.push(PatternWarning::VerticalGaussianFallback);
        return gaussian_vertical();
    }

    // Some files carry a "1, 91" style count row ahead of the samples.
    let has_large = pairs.iter().any(|&(_, v)| v > VERTICAL_METADATA_THRESHOLD);
    let small_peak = pairs
        .iter()
        .map(|&(_, v)| v)
        .filter(|&v| v <= VERTICAL_METADATA_THRESHOLD)
        .fold(f64::NEG_INFINITY, f64::max);
    if has_large && small_peak.is_finite() && small_peak <= 2.0 {
        let before = pairs.len();
        pairs.retain(|&(_, v)| v <= VERTICAL_METADATA_THRESHOLD);
        warnings.push(PatternWarning::VerticalMetadataDropped { rows: before - pairs.len() });
    }

    let (mut angles, mut values) = mirror_vertical(pairs, warnings);

    if is_decibel(&values) {
        warnings.push(PatternWarning::VerticalDecibels);
        to_linear(&mut values);
    }
    if !peak_normalise(&mut values) {
        warn!("vertical pattern has no positive peak, using Gaussian lobe");
        warnings.push(PatternWarning::VerticalGaussianFallback);
        return gaussian_vertical();
    }

    let mut padded = false;
    if angles.first().is_some_and(|&a| a > -90.0) {
        angles.insert(0, -90.0);
        values.insert(0, 0.0);
        padded = true;
    }
    if angles.last().is_some_and(|&a| a < 90.0) {
        angles.push(90.0);
        values.push(0.0);
        padded = true;
    }
    if padded {
        warnings.push(PatternWarning::VerticalEdgePadded);
    }

    AntennaPattern::vertical_angles()
        .map(|target| interp(target, &angles, &values))
        .collect()
}

/// Sort by angle and, when only one side of the horizon is present,
/// reflect it onto the other side.
fn mirror_vertical(
    mut pairs: Vec<(f64, f64)>,
    warnings: &mut Vec<PatternWarning>,
) -> (Vec<f64>, Vec<f64>) {
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let has_neg = pairs.iter().any(|&(a, _)| a < 0.0);
    let has_pos = pairs.iter().any(|&(a, _)| a > 0.0);

    if has_neg != has_pos {
        let reflected: Vec<(f64, f64)> = pairs
            .iter()
            .filter(|&&(a, _)| if has_pos { a >= 0.0 } else { a <= 0.0 })
            .map(|&(a, v)| (-a, v))
            .collect();
        pairs.extend(reflected);
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        warnings.push(PatternWarning::VerticalMirrored);
    }

    pairs.into_iter().unzip()
}

fn gaussian_vertical() -> Vec<f64> {
    let lobe: Vec<f64> = AntennaPattern::vertical_angles()
        .map(|a| (-0.5 * (a / GAUSSIAN_SIGMA_DEG).powi(2)).exp())
        .collect();
    let peak = lobe.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    lobe.into_iter().map(|v| v / peak).collect()
}

/// Piecewise-linear interpolation on increasing `xs` (duplicates allowed),
/// holding the end values outside the table.
pub(crate) fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n == 0 || x.is_nan() {
        return f64::NAN;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let j = xs.partition_point(|&v| v <= x) - 1;
    let (x0, x1) = (xs[j], xs[j + 1]);
    let t = (x - x0) / (x1 - x0);
    ys[j] + t * (ys[j + 1] - ys[j])
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

/// Width between the 1/√2 crossings either side of the peak of a field pattern.
pub fn half_power_beamwidth(angles: &[f64], field: &[f64]) -> Option<f64> {
    if angles.len() != field.len() || angles.len() < 3 {
        return None;
    }
    let level = std::f64::consts::FRAC_1_SQRT_2;
    let peak = argmax(field)?;

    let cross = |i1: usize, i2: usize| {
        let (x1, y1, x2, y2) = (angles[i1], field[i1], angles[i2], field[i2]);
        if x1 == x2 || y1 == y2 {
            return x1;
        }
        x1 + (level - y1) / (y2 - y1) * (x2 - x1)
    };

    let left = match (0..peak).rev().find(|&i| field[i] <= level) {
        Some(i2) => cross(i2 + 1, i2),
        None => angles[0],
    };
    let right = match (peak..field.len()).find(|&i| field[i] <= level) {
        Some(i2) if i2 > 0 => cross(i2 - 1, i2),
        _ => angles[angles.len() - 1],
    };
    Some(right - left)
}

/// `span / ∫ p dθ` in dB, samples evenly spaced across `span` radians.
fn directivity_db(field: &[f64], span: f64) -> Option<f64> {
    let peak = field.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if field.len() < 2 || !(peak > 0.0) {
        return None;
    }
    let step = span / (field.len() - 1) as f64;
    let normalised: Vec<f64> = field.iter().map(|v| v / peak).collect();
    let integral = simpson(&normalised, step);
    (integral > 0.0).then(|| 10.0 * (span / integral).log10())
}

/// Composite Simpson rule; an odd interval count closes with a trapezoid.
fn simpson(y: &[f64], h: f64) -> f64 {
    let intervals = y.len() - 1;
    let even = intervals - intervals % 2;
    let mut sum = 0.0;
    for k in (0..even).step_by(2) {
        sum += h / 3.0 * (y[k] + 4.0 * y[k + 1] + y[k + 2]);
    }
    if even < intervals {
        sum += h / 2.0 * (y[intervals - 1] + y[intervals]);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn vertical_at(pattern: &AntennaPattern, angle: i32) -> f64 {
        pattern.vertical()[(angle + 90) as usize]
    }

    #[test]
    fn test_only_sentinel_is_omni_with_gaussian() {
        let (p, warnings) = parse_pattern_with_diagnostics("999\n");
        assert_eq!(p.horizontal().len(), HORIZONTAL_SAMPLES);
        assert!(p.horizontal().iter().all(|&v| v == 1.0));
        assert_eq!(p.vertical().len(), VERTICAL_SAMPLES);
        assert_abs_diff_eq!(vertical_at(&p, 0), 1.0);
        assert_abs_diff_eq!(vertical_at(&p, 15), (-0.5f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(vertical_at(&p, -15), vertical_at(&p, 15));
        assert!(warnings.contains(&PatternWarning::HorizontalOmniFallback));
        assert!(warnings.contains(&PatternWarning::VerticalGaussianFallback));
    }

    #[test]
    fn test_empty_text() {
        let p = parse_pattern("");
        assert_eq!(p, AntennaPattern::omni());
    }

    #[test]
    fn test_header_captured() {
        let p = parse_pattern("'Panel 4x', 12.5, -3\n0,1\n999\n");
        assert_eq!(p.meta().title.as_deref(), Some("Panel 4x"));
        assert_eq!(p.meta().param1, Some(12.5));
        assert_eq!(p.meta().param2, Some(-3.0));
    }

    #[test]
    fn test_bad_header_is_skipped() {
        let (p, warnings) = parse_pattern_with_diagnostics("Dipole\n0,1\n999\n");
        assert_eq!(p.meta(), &PatternMeta::default());
        assert!(matches!(warnings[0], PatternWarning::UnparsedHeader(_)));
    }

    #[test]
    fn test_horizontal_db_detection() {
        let mut text = String::new();
        for az in 0..360 {
            let db = -30.0 * (az as f64 / 359.0);
            text.push_str(&format!("{az},{db}\n"));
        }
        text.push_str("999\n");
        let (p, warnings) = parse_pattern_with_diagnostics(&text);
        assert!(warnings.contains(&PatternWarning::HorizontalDecibels));
        assert_abs_diff_eq!(p.horizontal()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.horizontal()[359], 10f64.powf(-30.0 / 20.0), epsilon = 1e-9);
        let max = p.horizontal().iter().copied().fold(0.0, f64::max);
        assert_abs_diff_eq!(max, 1.0);
    }

    #[test]
    fn test_forward_and_backward_fill() {
        let p = parse_pattern("10,0.5\n20,1.0\n999\n");
        // before the first sample: back-filled
        assert_abs_diff_eq!(p.horizontal()[0], 0.5);
        assert_abs_diff_eq!(p.horizontal()[15], 0.5);
        assert_abs_diff_eq!(p.horizontal()[20], 1.0);
        assert_abs_diff_eq!(p.horizontal()[359], 1.0);
    }

    #[test]
    fn test_azimuth_modulo() {
        let p = parse_pattern("370,0.25\n0,1\n-1,0.5\n999\n");
        assert_abs_diff_eq!(p.horizontal()[10], 0.25);
        assert_abs_diff_eq!(p.horizontal()[359], 0.5);
    }

    #[test]
    fn test_vertical_mirrored_from_one_side() {
        let text = "999\n0,1.0\n10,0.8\n30,0.3\n90,0.0\n";
        let (p, warnings) = parse_pattern_with_diagnostics(text);
        assert!(warnings.contains(&PatternWarning::VerticalMirrored));
        for a in 0..=90 {
            assert_abs_diff_eq!(vertical_at(&p, a), vertical_at(&p, -a), epsilon = 1e-12);
        }
        assert_abs_diff_eq!(vertical_at(&p, -10), 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(vertical_at(&p, 20), 0.55, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_mirrored_from_below_horizon() {
        let (p, warnings) = parse_pattern_with_diagnostics("999\n0,1\n-10,0.8\n-90,0\n");
        assert!(warnings.contains(&PatternWarning::VerticalMirrored));
        for a in 0..=90 {
            assert_abs_diff_eq!(vertical_at(&p, a), vertical_at(&p, -a), epsilon = 1e-12);
        }
        assert_abs_diff_eq!(vertical_at(&p, 10), 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(vertical_at(&p, 5), 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(vertical_at(&p, 90), 0.0);
    }

    #[test]
    fn test_vertical_metadata_row_dropped() {
        let text = "999\n1,91\n-10,0.5\n0,1\n10,0.5\n";
        let (p, warnings) = parse_pattern_with_diagnostics(text);
        assert!(warnings.contains(&PatternWarning::VerticalMetadataDropped { rows: 1 }));
        assert_abs_diff_eq!(vertical_at(&p, 0), 1.0);
        assert_abs_diff_eq!(vertical_at(&p, 1), 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_edge_padding() {
        let text = "999\n-10,0.5\n0,1\n10,0.5\n";
        let (p, warnings) = parse_pattern_with_diagnostics(text);
        assert!(warnings.contains(&PatternWarning::VerticalEdgePadded));
        assert_abs_diff_eq!(vertical_at(&p, 90), 0.0);
        assert_abs_diff_eq!(vertical_at(&p, -90), 0.0);
        assert_abs_diff_eq!(vertical_at(&p, 50), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_values_in_range_for_junk() {
        let text = "foo, bar, baz\n1,abc\nx,y\n999\n500,2\n-3,-80\n,\n12,\n";
        let p = parse_pattern(text);
        assert_eq!(p.horizontal().len(), HORIZONTAL_SAMPLES);
        assert_eq!(p.vertical().len(), VERTICAL_SAMPLES);
        assert!(p.horizontal().iter().chain(p.vertical()).all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "'A', 1, 2\n0,0\n90,-3\n180,-20\n270,-3\n999\n-5,-1\n0,0\n5,-1\n";
        assert_eq!(parse_pattern(text), parse_pattern(text));
    }

    #[test]
    fn test_latin1_bytes() {
        let bytes = b"'Antena \xe9', 1, 2\n0,1\n999\n";
        let p = parse_pattern_bytes(bytes);
        assert_eq!(p.meta().title.as_deref(), Some("Antena é"));
    }

    #[test]
    fn test_interp_duplicates_and_edges() {
        let xs = [0.0, 0.0, 10.0];
        let ys = [1.0, 1.0, 0.0];
        assert_abs_diff_eq!(interp(-5.0, &xs, &ys), 1.0);
        assert_abs_diff_eq!(interp(5.0, &xs, &ys), 0.5);
        assert_abs_diff_eq!(interp(15.0, &xs, &ys), 0.0);
        assert!(interp(f64::NAN, &xs, &ys).is_nan());
    }

    #[test]
    fn test_beamwidth_of_gaussian() {
        let p = AntennaPattern::omni();
        // Field drops to 1/√2 where exp(-a²/(2σ²)) = 1/√2, i.e. a = σ·sqrt(ln 2).
        let expected = 2.0 * 15.0 * 2f64.ln().sqrt();
        let bw = p.vertical_beamwidth().unwrap();
        assert_abs_diff_eq!(bw, expected, epsilon = 0.1);
    }

    #[test]
    fn test_horizontal_beamwidth_across_north() {
        let mut text = String::new();
        for az in 0..360 {
            let off = ((az as f64 + 180.0).rem_euclid(360.0) - 180.0).abs();
            let v = if off <= 20.0 { 1.0 - off / 40.0 } else { 0.1 };
            text.push_str(&format!("{az},{v}\n"));
        }
        text.push_str("999\n");
        let p = parse_pattern(&text);
        // 1 - off/40 = 0.7071 at off ≈ 11.7°
        let bw = p.horizontal_beamwidth().unwrap();
        let expected = 2.0 * 40.0 * (1.0 - std::f64::consts::FRAC_1_SQRT_2);
        assert_abs_diff_eq!(bw, expected, epsilon = 0.01);
    }

    #[test]
    fn test_omni_directivity() {
        let p = AntennaPattern::omni();
        assert_abs_diff_eq!(p.horizontal_directivity_db().unwrap(), 0.0, epsilon = 1e-9);
        assert!(p.vertical_directivity_db().unwrap() > 0.0);
    }
}
