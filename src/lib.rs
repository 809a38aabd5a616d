pub mod units;
pub mod geo;
pub mod pattern;
pub mod grid;
pub mod propagation;
pub mod terrain;
pub mod physics;
pub mod coverage;
pub mod io;
pub mod error;

pub use error::CoverageError;
