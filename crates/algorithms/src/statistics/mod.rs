//! Zonal statistics and exposure scoring
//!
//! - **zonal**: per-polygon {mean, min, count, nodata} from a raster source
//! - **aggregate**: the same over fixed-size batches, order preserving
//! - **exposure**: exposure flag, min-max normalization, attribute columns

pub mod aggregate;
pub mod exposure;
pub mod zonal;

pub use aggregate::{
    aggregate, aggregate_with_progress, batch_ranges, AggregateParams, BatchProgress,
    DEFAULT_CHUNK_SIZE, DEFAULT_NODATA,
};
pub use exposure::{
    enrich, is_exposed, normalize, ExposureSummary, Normalize, BURN_EXPOSED, BURN_MEAN, BURN_NORM,
};
pub use zonal::{polygon_stats, zonal_statistics, ZonalRecord};
