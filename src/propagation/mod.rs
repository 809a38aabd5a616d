//! Boundary to the terrestrial path-loss model.
//!
//! The crate does not implement an ITU-style propagation model; it asks a
//! [`PropagationModel`] for loss values and works from there. Failures from
//! the model (missing terrain and the like) are passed through unchanged.

mod free_space;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use free_space::FreeSpaceModel;

use crate::geo::LatLon;
use crate::grid::GeoGrid;
use crate::units::{Db, MegaHertz, Meters};

#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("No terrain data around ({lat:.4}, {lon:.4})")]
    MissingTerrain { lat: f64, lon: f64 },

    #[error("Propagation model failed: {0}")]
    Model(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClutterZone {
    #[default]
    Unknown,
    Urban,
    Suburban,
    TropicalForest,
    ConiferousTrees,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarization {
    Horizontal,
    #[default]
    Vertical,
}

/// Dominant propagation mechanism reported by the model for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClass {
    LineOfSight,
    TransHorizon,
}

impl fmt::Display for PathClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathClass::LineOfSight => write!(f, "line-of-sight"),
            PathClass::TransHorizon => write!(f, "trans-horizon"),
        }
    }
}

/// Everything the model needs besides the receiver location(s).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathLossRequest {
    pub frequency: MegaHertz,
    pub temperature_k: f64,
    pub pressure_hpa: f64,
    pub water_density: f64,
    pub tx: LatLon,
    pub tx_height: Meters,
    pub rx_height: Meters,
    pub time_percent: f64,
    pub clutter_tx: ClutterZone,
    pub clutter_rx: ClutterZone,
    pub polarization: Polarization,
    pub version: u8,
}

/// Memory order of a grid answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridLayout {
    /// `[lat][lon]`, the order of [`GeoGrid`].
    #[default]
    LatMajor,
    /// `[lon][lat]`.
    LonMajor,
}

/// Loss for every pixel of a [`GeoGrid`], in dB.
#[derive(Debug, Clone, Default)]
pub struct PathLossGrid {
    /// `(rows, cols)` as stored, i.e. `(n_lon, n_lat)` when `LonMajor`.
    pub shape: (usize, usize),
    pub layout: GridLayout,
    pub baseline: Vec<f64>,
    /// Corrected loss (e.g. clutter/terminal corrections); preferred when present.
    pub corrected: Option<Vec<f64>>,
    /// Named partial losses, kept only for reporting.
    pub components: BTreeMap<String, Vec<f64>>,
    pub path_class: Option<Vec<PathClass>>,
}

impl PathLossGrid {
    pub fn lat_major(rows: usize, cols: usize, baseline: Vec<f64>) -> Self {
        Self {
            shape: (rows, cols),
            layout: GridLayout::LatMajor,
            baseline,
            ..Default::default()
        }
    }

    /// Corrected map if present, baseline otherwise.
    pub fn preferred(&self) -> &[f64] {
        self.corrected.as_deref().unwrap_or(&self.baseline)
    }

    /// Every stored vector holds `rows * cols` values.
    pub fn is_consistent(&self) -> bool {
        let n = self.shape.0 * self.shape.1;
        self.baseline.len() == n
            && self.corrected.as_ref().is_none_or(|v| v.len() == n)
            && self.path_class.as_ref().is_none_or(|v| v.len() == n)
            && self.components.values().all(|v| v.len() == n)
    }

    /// Same data in `LatMajor` order, `None` when a vector does not match `shape`.
    pub fn into_lat_major(self) -> Option<Self> {
        if !self.is_consistent() {
            return None;
        }
        if self.layout == GridLayout::LatMajor {
            return Some(self);
        }
        let (rows, cols) = self.shape;
        let t = |v: Vec<f64>| transpose(&v, rows, cols);
        Some(Self {
            shape: (cols, rows),
            layout: GridLayout::LatMajor,
            corrected: self.corrected.map(t),
            components: self.components.into_iter().map(|(k, v)| (k, t(v))).collect(),
            path_class: self.path_class.map(|v| transpose(&v, rows, cols)),
            baseline: t(self.baseline),
        })
    }
}

/// Row-major `rows x cols` into row-major `cols x rows`. `data` must hold
/// `rows * cols` values.
pub fn transpose<T: Copy>(data: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(data.len());
    for c in 0..cols {
        for r in 0..rows {
            out.push(data[r * cols + c]);
        }
    }
    out
}

/// Loss for one transmitter-receiver path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathLoss {
    pub baseline: Db,
    pub corrected: Option<Db>,
    pub path_class: Option<PathClass>,
}

impl PathLoss {
    pub fn preferred(&self) -> Db {
        self.corrected.unwrap_or(self.baseline)
    }
}

pub trait PropagationModel {
    /// Loss from `request.tx` to every point of `grid`.
    fn path_loss_grid(
        &self,
        request: &PathLossRequest,
        grid: &GeoGrid,
    ) -> Result<PathLossGrid, PropagationError>;

    /// Loss from `request.tx` to `rx`.
    fn path_loss(
        &self,
        request: &PathLossRequest,
        rx: LatLon,
    ) -> Result<PathLoss, PropagationError>;
}
