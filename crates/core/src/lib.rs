//! # burnline core
//!
//! Core types and I/O for the burnline wildfire exposure workspace.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type, plus pixel `Window`s
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`, `Projection` and `Transformer`: coordinate reference systems
//!   and pure-Rust reprojection (Transverse Mercator, Lambert Conformal Conic)
//! - `Feature` / `FeatureCollection`: vector features with attributes
//! - I/O: GeoTIFF, windowed raster sources and GeoJSON

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{Projection, Transformer, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement, Window};
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{Transformer, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::io::RasterSource;
    pub use crate::raster::{GeoTransform, Raster, RasterElement, Window};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
    pub use crate::Algorithm;
}

/// Core trait for whole-collection algorithms in burnline.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
