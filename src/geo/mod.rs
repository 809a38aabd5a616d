use serde::{Deserialize, Serialize};

use crate::units::{Degrees, Kilometers, Meters};

/// Mean Earth radius used by every spherical formula in the crate.
pub const EARTH_RADIUS: f64 = 6_371_000.0;
pub const EARTH_RADIUS_KM: f64 = EARTH_RADIUS / 1000.0;

/// Length of one degree of latitude, as used for grid sizing.
pub const KM_PER_DEGREE: f64 = 111.32;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// North/south latitudes and east/west longitudes of a box, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn lat_span(&self) -> f64 {
        span_deg(self.north, self.south)
    }

    pub fn lon_span(&self) -> f64 {
        span_deg(self.east, self.west)
    }
}

/// Angular span between two coordinates, folded across the antimeridian.
pub fn span_deg(a: f64, b: f64) -> f64 {
    let mut span = (a - b).abs();
    if span > 180.0 {
        span = 360.0 - span;
    }
    span.max(1e-6)
}

/// Great-circle (haversine) distance.
pub fn haversine_distance(p1: LatLon, p2: LatLon) -> Kilometers {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    Kilometers(2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin())
}

/// Initial bearing from `from` towards `to`, clockwise from true north, in [0, 360).
pub fn initial_bearing(from: LatLon, to: LatLon) -> Degrees {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    Degrees::from_radians(x.atan2(y)).wrapped()
}

/// Distance and bearing in one call.
pub fn calculate_geodesic(p1: LatLon, p2: LatLon) -> (Meters, Degrees) {
    (haversine_distance(p1, p2).to_meters(), initial_bearing(p1, p2))
}

/// Point reached after travelling `distance` along `bearing` from `origin`.
pub fn destination(origin: LatLon, bearing: Degrees, distance: Kilometers) -> LatLon {
    let delta = distance.value() / EARTH_RADIUS_KM;
    let theta = bearing.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    LatLon {
        latitude: lat2.to_degrees(),
        longitude: (lon2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0,
    }
}

/// Point at `fraction` (0..1) of the great circle from `p1` to `p2`.
pub fn interpolate(p1: LatLon, p2: LatLon, fraction: f64) -> LatLon {
    let delta = haversine_distance(p1, p2).value() / EARTH_RADIUS_KM;
    if delta < 1e-12 {
        return p1;
    }

    let lat1 = p1.latitude.to_radians();
    let lon1 = p1.longitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let lon2 = p2.longitude.to_radians();

    let a = ((1.0 - fraction) * delta).sin() / delta.sin();
    let b = (fraction * delta).sin() / delta.sin();
    let x = a * lat1.cos() * lon1.cos() + b * lat2.cos() * lon2.cos();
    let y = a * lat1.cos() * lon1.sin() + b * lat2.cos() * lon2.sin();
    let z = a * lat1.sin() + b * lat2.sin();

    LatLon {
        latitude: z.atan2((x * x + y * y).sqrt()).to_degrees(),
        longitude: y.atan2(x).to_degrees(),
    }
}

/// Box through the points `radius` north, south, east and west of `center`.
pub fn geodesic_bounds(center: LatLon, radius: Kilometers) -> Bounds {
    Bounds {
        north: destination(center, Degrees(0.0), radius).latitude,
        south: destination(center, Degrees(180.0), radius).latitude,
        east: destination(center, Degrees(90.0), radius).longitude,
        west: destination(center, Degrees(270.0), radius).longitude,
    }
}
