//! # burnline CLI
//!
//! Configuration and stage orchestration behind the `burnline` binary:
//! load, buffer, aggregate, export and map.

pub mod config;
pub mod info;
pub mod pipeline;

pub use config::Config;
pub use info::{raster_summary, RasterSummary};
pub use pipeline::{run, RunSummary};
