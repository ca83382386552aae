//! # burnline algorithms
//!
//! Analysis steps of the wildfire exposure workflow.
//!
//! ## Categories
//!
//! - **vector**: exposure buffers, raster-extent filtering
//! - **statistics**: zonal statistics under polygons, chunked aggregation,
//!   exposure classification and normalization

pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::statistics::{
        aggregate, aggregate_with_progress, enrich, is_exposed, normalize, polygon_stats,
        AggregateParams, BatchProgress, ExposureSummary, Normalize, ZonalRecord,
    };
    pub use crate::vector::{buffer_features, buffer_geometry, filter_by_bounds, Buffer, BufferParams};
    pub use burnline_core::prelude::*;
}
