//! Vector analysis algorithms
//!
//! - Buffer: round-cap exposure polygons around features
//! - Filter: keep features intersecting a raster extent

mod buffer;
mod filter;

pub use buffer::{buffer_features, buffer_geometry, buffer_points, union_all, Buffer, BufferParams};
pub use filter::filter_by_bounds;
