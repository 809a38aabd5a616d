//! Typed quantities.
//!
//! Every number that crosses a module boundary carries its unit in its type.
//! Conversions between unit families are explicit methods; there is no
//! implicit coercion (a `Dbm` is never silently treated as a `Db`).

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Offset between dBm and dBµV/m for a 50 Ω isotropic antenna:
/// `E = Prx - Grx + 77.2 + 20 log10(f_MHz)`.
pub const FIELD_STRENGTH_OFFSET_DB: f64 = 77.2;

macro_rules! quantity {
    ($(#[$meta:meta])* $name:ident, $unit:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            pub const fn value(self) -> f64 {
                self.0
            }

            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl From<f64> for $name {
            fn from(value: f64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match f.precision() {
                    Some(p) => write!(f, "{:.*} {}", p, self.0, $unit),
                    None => write!(f, "{} {}", self.0, $unit),
                }
            }
        }
    };
}

quantity!(
    /// Plane angle in degrees.
    Degrees, "°"
);
quantity!(
    /// Power ratio in decibels (gains, losses, pattern attenuation, dBi).
    Db, "dB"
);
quantity!(
    /// Absolute power referenced to 1 mW.
    Dbm, "dBm"
);
quantity!(
    /// Electric field strength referenced to 1 µV/m.
    DbuvPerMeter, "dBµV/m"
);
quantity!(Watts, "W");
quantity!(Meters, "m");
quantity!(Kilometers, "km");
quantity!(MegaHertz, "MHz");

impl Degrees {
    pub fn to_radians(self) -> f64 {
        self.0.to_radians()
    }

    pub fn from_radians(rad: f64) -> Self {
        Self(rad.to_degrees())
    }

    /// Wrap into [0, 360).
    pub fn wrapped(self) -> Self {
        let w = self.0.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs
        Self(if w >= 360.0 { 0.0 } else { w })
    }

    pub fn clamp(self, min: f64, max: f64) -> Self {
        Self(self.0.clamp(min, max))
    }
}

impl Db {
    /// Field ratio (E/Emax) to power ratio: `20 log10(ratio)`.
    pub fn from_field_ratio(ratio: f64) -> Self {
        Self(20.0 * ratio.log10())
    }

    /// Inverse of [`Db::from_field_ratio`].
    pub fn to_field_ratio(self) -> f64 {
        10f64.powf(self.0 / 20.0)
    }
}

impl Watts {
    pub fn to_dbm(self) -> Dbm {
        Dbm(10.0 * (self.0 * 1000.0).log10())
    }
}

impl Dbm {
    pub fn to_watts(self) -> Watts {
        Watts(10f64.powf(self.0 / 10.0) / 1000.0)
    }

    /// Equivalent field strength at the receiver for a received power that
    /// includes the receiving antenna gain `rx_gain`.
    pub fn to_field_strength(self, rx_gain: Db, frequency: MegaHertz) -> DbuvPerMeter {
        DbuvPerMeter(self.0 - rx_gain.0 + FIELD_STRENGTH_OFFSET_DB + 20.0 * frequency.0.log10())
    }
}

impl Meters {
    pub fn to_kilometers(self) -> Kilometers {
        Kilometers(self.0 / 1000.0)
    }
}

impl Kilometers {
    pub fn to_meters(self) -> Meters {
        Meters(self.0 * 1000.0)
    }
}

impl From<Kilometers> for Meters {
    fn from(km: Kilometers) -> Self {
        km.to_meters()
    }
}

impl From<Meters> for Kilometers {
    fn from(m: Meters) -> Self {
        m.to_kilometers()
    }
}

impl MegaHertz {
    pub fn to_hz(self) -> f64 {
        self.0 * 1e6
    }

    pub fn wavelength(self) -> Meters {
        Meters(SPEED_OF_LIGHT / self.to_hz())
    }
}

impl Add for Db {
    type Output = Db;
    fn add(self, rhs: Db) -> Db {
        Db(self.0 + rhs.0)
    }
}

impl Sub for Db {
    type Output = Db;
    fn sub(self, rhs: Db) -> Db {
        Db(self.0 - rhs.0)
    }
}

impl Neg for Db {
    type Output = Db;
    fn neg(self) -> Db {
        Db(-self.0)
    }
}

impl Add<Db> for Dbm {
    type Output = Dbm;
    fn add(self, rhs: Db) -> Dbm {
        Dbm(self.0 + rhs.0)
    }
}

impl Sub<Db> for Dbm {
    type Output = Dbm;
    fn sub(self, rhs: Db) -> Dbm {
        Dbm(self.0 - rhs.0)
    }
}

impl Add for Meters {
    type Output = Meters;
    fn add(self, rhs: Meters) -> Meters {
        Meters(self.0 + rhs.0)
    }
}

impl Sub for Meters {
    type Output = Meters;
    fn sub(self, rhs: Meters) -> Meters {
        Meters(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_watts_to_dbm() {
        assert_abs_diff_eq!(Watts(1.0).to_dbm().value(), 30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Watts(0.001).to_dbm().value(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Dbm(40.0).to_watts().value(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degrees_wrap() {
        assert_abs_diff_eq!(Degrees(-90.0).wrapped().value(), 270.0);
        assert_abs_diff_eq!(Degrees(720.0).wrapped().value(), 0.0);
        assert!(Degrees(-1e-18).wrapped().value() < 360.0);
    }

    #[test]
    fn test_field_ratio_round_trip() {
        assert_abs_diff_eq!(Db::from_field_ratio(0.5).value(), -6.0206, epsilon = 1e-4);
        assert_abs_diff_eq!(Db(-6.0206).to_field_ratio(), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_wavelength() {
        assert_abs_diff_eq!(MegaHertz(299.792458).wavelength().value(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_field_strength_offset() {
        // 0 dBm received with a 0 dBi antenna at 100 MHz.
        let e = Dbm(0.0).to_field_strength(Db(0.0), MegaHertz(100.0));
        assert_abs_diff_eq!(e.value(), 117.2, epsilon = 1e-9);
    }

    #[test]
    fn test_display_precision() {
        assert_eq!(format!("{:.1}", Dbm(-71.234)), "-71.2 dBm");
    }
}
