use serde::{Deserialize, Serialize};

use super::{AntennaPattern, HORIZONTAL_SAMPLES};
use crate::units::{Db, Degrees, Meters};

/// Field values below this are treated as this when taking the log.
const FIELD_FLOOR: f64 = 1e-6;

/// Mechanical orientation of the transmitting antenna.
///
/// `direction` is the azimuth of the pattern's 0° sample (clockwise from
/// north). `tilt` shifts the elevation pattern so that its 0° sample lands
/// on elevation `tilt`; negative values point the beam below the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AntennaOrientation {
    pub direction: Degrees,
    pub tilt: Degrees,
}

impl AntennaOrientation {
    pub fn new(direction: Degrees, tilt: Degrees) -> Self {
        Self { direction: direction.wrapped(), tilt }
    }
}

/// Pattern attenuation relative to the peak, split by plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GainComponents {
    pub horizontal: Db,
    pub vertical: Db,
}

impl GainComponents {
    pub fn total(&self) -> Db {
        self.horizontal + self.vertical
    }
}

/// Evaluates pattern attenuation for a given orientation.
///
/// The grid methods are element-wise maps over the scalar methods so a
/// single path and a whole coverage grid see identical interpolation.
/// Without a pattern every lookup is 0 dB.
#[derive(Debug, Clone, Copy)]
pub struct GainEvaluator<'a> {
    pattern: Option<&'a AntennaPattern>,
    orientation: AntennaOrientation,
}

impl<'a> GainEvaluator<'a> {
    pub fn new(pattern: Option<&'a AntennaPattern>, orientation: AntennaOrientation) -> Self {
        Self { pattern, orientation }
    }

    pub fn orientation(&self) -> AntennaOrientation {
        self.orientation
    }

    /// Linear E/Emax towards an absolute bearing.
    pub fn horizontal_field(&self, bearing: Degrees) -> f64 {
        let Some(pattern) = self.pattern else {
            return 1.0;
        };
        let step = 360.0 / HORIZONTAL_SAMPLES as f64;
        let relative = (bearing.value() - self.orientation.direction.value()).rem_euclid(360.0);
        let position = relative / step;
        let i0 = (position.floor() as usize) % HORIZONTAL_SAMPLES;
        let i1 = (i0 + 1) % HORIZONTAL_SAMPLES;
        let t = position - position.floor();
        let h = pattern.horizontal();
        h[i0] + t * (h[i1] - h[i0])
    }

    /// Linear E/Emax at an elevation angle, tilt applied.
    pub fn vertical_field(&self, elevation: Degrees) -> f64 {
        let Some(pattern) = self.pattern else {
            return 1.0;
        };
        let relative = (elevation.value() - self.orientation.tilt.value()).clamp(-90.0, 90.0);
        // Sample i sits at i - 90 degrees; index space is the angle shifted by 90.
        let position = relative + 90.0;
        let v = pattern.vertical();
        let i0 = (position.floor() as usize).min(v.len() - 1);
        let i1 = (i0 + 1).min(v.len() - 1);
        let t = position - i0 as f64;
        v[i0] + t * (v[i1] - v[i0])
    }

    pub fn horizontal_gain(&self, bearing: Degrees) -> Db {
        field_to_db(self.horizontal_field(bearing))
    }

    pub fn vertical_gain(&self, elevation: Degrees) -> Db {
        field_to_db(self.vertical_field(elevation))
    }

    pub fn gain(&self, bearing: Degrees, elevation: Degrees) -> GainComponents {
        GainComponents {
            horizontal: self.horizontal_gain(bearing),
            vertical: self.vertical_gain(elevation),
        }
    }

    pub fn horizontal_gain_grid(&self, bearings_deg: &[f64]) -> Vec<f64> {
        bearings_deg
            .iter()
            .map(|&b| self.horizontal_gain(Degrees(b)).value())
            .collect()
    }

    pub fn vertical_gain_grid(&self, elevations_deg: &[f64]) -> Vec<f64> {
        elevations_deg
            .iter()
            .map(|&e| self.vertical_gain(Degrees(e)).value())
            .collect()
    }

    /// Vertical attenuation towards the horizon.
    pub fn horizon_gain(&self) -> Db {
        self.vertical_gain(Degrees(0.0))
    }

    /// Horizontal pattern in dB at absolute azimuths 0..359 after rotation.
    pub fn rotated_horizontal_db(&self) -> Vec<f64> {
        (0..HORIZONTAL_SAMPLES)
            .map(|az| self.horizontal_gain(Degrees(az as f64)).value())
            .collect()
    }

    /// Unrotated, untilted vertical pattern in dB.
    pub fn vertical_pattern_db(&self) -> Option<Vec<f64>> {
        self.pattern
            .map(|p| p.vertical().iter().map(|&v| field_to_db(v).value()).collect())
    }
}

/// `20 log10(max(field, 1e-6))`.
pub fn field_to_db(field: f64) -> Db {
    Db::from_field_ratio(field.max(FIELD_FLOOR))
}

/// Elevation of the receiver seen from the transmitter, flat geometry.
pub fn elevation_angle(height_difference: Meters, distance: Meters) -> Degrees {
    Degrees::from_radians(height_difference.value().atan2(distance.value())).clamp(-90.0, 90.0)
}
