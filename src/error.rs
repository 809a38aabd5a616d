use thiserror::Error;

use crate::propagation::PropagationError;
use crate::terrain::TerrainError;

/// Failure of a coverage or link-profile computation.
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error("Path loss grid is {got:?} but the sample grid is {expected:?}")]
    GridShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("No finite coverage value within {radius_km} km of the transmitter")]
    NoCoverageData { radius_km: f64 },
}
