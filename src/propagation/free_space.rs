use super::{PathClass, PathLoss, PathLossGrid, PathLossRequest, PropagationError, PropagationModel};
use crate::geo::{LatLon, haversine_distance};
use crate::grid::GeoGrid;
use crate::units::{Db, Kilometers, MegaHertz};

/// Distances are floored at one metre.
const MIN_DISTANCE_KM: f64 = 0.001;

/// Free-space (Friis) loss, `32.44 + 20 log10(d_km) + 20 log10(f_MHz)`.
///
/// Ignores terrain, atmosphere and clutter. Useful as a stand-in for a full
/// terrestrial model and as an upper bound on the field.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeSpaceModel;

impl FreeSpaceModel {
    pub fn loss(distance: Kilometers, frequency: MegaHertz) -> Db {
        let d = distance.value().max(MIN_DISTANCE_KM);
        Db(32.44 + 20.0 * d.log10() + 20.0 * frequency.value().log10())
    }
}

impl PropagationModel for FreeSpaceModel {
    fn path_loss_grid(
        &self,
        request: &PathLossRequest,
        grid: &GeoGrid,
    ) -> Result<PathLossGrid, PropagationError> {
        let (rows, cols) = grid.shape();
        let baseline = grid
            .points()
            .map(|p| Self::loss(haversine_distance(request.tx, p), request.frequency).value())
            .collect();
        let mut out = PathLossGrid::lat_major(rows, cols, baseline);
        out.path_class = Some(vec![PathClass::LineOfSight; rows * cols]);
        Ok(out)
    }

    fn path_loss(
        &self,
        request: &PathLossRequest,
        rx: LatLon,
    ) -> Result<PathLoss, PropagationError> {
        Ok(PathLoss {
            baseline: Self::loss(haversine_distance(request.tx, rx), request.frequency),
            corrected: None,
            path_class: Some(PathClass::LineOfSight),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_free_space_reference_value() {
        // 1 km at 100 MHz
        let loss = FreeSpaceModel::loss(Kilometers(1.0), MegaHertz(100.0));
        assert_abs_diff_eq!(loss.value(), 72.44, epsilon = 1e-9);
        // doubling distance adds ~6 dB
        let d1 = FreeSpaceModel::loss(Kilometers(10.0), MegaHertz(600.0)).value();
        let d2 = FreeSpaceModel::loss(Kilometers(20.0), MegaHertz(600.0)).value();
        assert_abs_diff_eq!(d2 - d1, 6.0206, epsilon = 1e-4);
    }

    #[test]
    fn test_distance_floor() {
        let at_zero = FreeSpaceModel::loss(Kilometers(0.0), MegaHertz(100.0));
        assert!(at_zero.is_finite());
        assert_abs_diff_eq!(at_zero.value(), 32.44 - 60.0 + 40.0, epsilon = 1e-9);
    }
}
