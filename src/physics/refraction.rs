use crate::geo::EARTH_RADIUS;
use crate::units::{Kilometers, Meters};

/// Beyond this distance the parabolic approximation is used for the drop.
const PARABOLIC_DROP_KM: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefractionParams {
    pub k_factor: f64,
}

impl Default for RefractionParams {
    fn default() -> Self {
        Self { k_factor: 4.0 / 3.0 }
    }
}

pub fn effective_earth_radius(params: RefractionParams) -> Meters {
    Meters(EARTH_RADIUS * params.k_factor)
}

/// Height lost to the Earth's curvature at `distance` from the transmitter.
///
/// Uses the true sphere (no k-factor). Short paths take the exact
/// `R(1 - cos(θ/2))`, long ones the parabolic `d²/8R`.
pub fn curvature_drop(distance: Kilometers) -> Meters {
    let d_km = distance.value().max(0.0);
    if d_km > PARABOLIC_DROP_KM {
        let d_m = d_km * 1000.0;
        Meters(d_m * d_m / (8.0 * EARTH_RADIUS))
    } else {
        let theta = d_km * 1000.0 / EARTH_RADIUS;
        Meters(EARTH_RADIUS * (1.0 - (theta / 2.0).cos()))
    }
}

/// Curvature-adjusted terrain: endpoints raised by the antenna heights,
/// interior samples lowered by their own curvature drop.
pub fn adjust_heights_for_curvature(
    distances_m: &[f64],
    terrain_m: &[f64],
    tx_height: Meters,
    rx_height: Meters,
) -> Vec<f64> {
    let last = terrain_m.len().saturating_sub(1);
    distances_m
        .iter()
        .zip(terrain_m)
        .enumerate()
        .map(|(i, (&d, &h))| match i {
            0 => h + tx_height.value(),
            i if i == last => h + rx_height.value(),
            _ => h - curvature_drop(Meters(d).to_kilometers()).value(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_effective_radius() {
        let r = effective_earth_radius(RefractionParams::default());
        assert_abs_diff_eq!(r.value(), 8_494_666.666, epsilon = 1e-2);
    }

    #[test]
    fn test_drop_zero_and_monotonic() {
        assert_eq!(curvature_drop(Kilometers(0.0)).value(), 0.0);
        let mut previous = 0.0;
        for step in 1..=400 {
            let d = curvature_drop(Kilometers(step as f64 * 0.1)).value();
            assert!(d > previous, "drop not increasing at {} km", step as f64 * 0.1);
            previous = d;
        }
    }

    #[test]
    fn test_drop_branches_agree_near_switch() {
        let below = curvature_drop(Kilometers(10.0)).value();
        let above = curvature_drop(Kilometers(10.000_001)).value();
        assert_abs_diff_eq!(below, 1.9621, epsilon = 1e-3);
        assert_abs_diff_eq!(below, above, epsilon = 1e-3);
    }

    #[test]
    fn test_adjusted_heights() {
        let d = [0.0, 20_000.0, 40_000.0];
        let h = [100.0, 50.0, 10.0];
        let adj = adjust_heights_for_curvature(&d, &h, Meters(30.0), Meters(1.5));
        assert_abs_diff_eq!(adj[0], 130.0);
        let drop = 20_000.0f64.powi(2) / (8.0 * EARTH_RADIUS);
        assert_abs_diff_eq!(adj[1], 50.0 - drop, epsilon = 1e-9);
        assert_abs_diff_eq!(adj[2], 11.5);
    }
}
