//! Raster metadata and statistics for `burnline info`

use anyhow::{Context, Result};
use burnline_core::io::RasterSource;
use burnline_core::{GeoTransform, Window, CRS};

/// Rows read per window while scanning the raster
const STRIP_ROWS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct RasterSummary {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub bounds: (f64, f64, f64, f64),
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Cells that are neither no-data nor NaN
    pub valid_count: usize,
}

impl RasterSummary {
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scan the whole raster in row strips and summarise it.
pub fn raster_summary(source: &mut dyn RasterSource) -> Result<RasterSummary> {
    let (rows, cols) = source.shape();
    let nodata = source.nodata();

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut valid_count = 0usize;

    for row_off in (0..rows).step_by(STRIP_ROWS) {
        let window = Window::new(row_off, 0, STRIP_ROWS.min(rows - row_off), cols);
        let strip = source
            .read_window(&window)
            .with_context(|| format!("Failed to read rows {}..{}", window.row_off, window.row_end()))?;
        let stats = strip.statistics();
        if let (Some(lo), Some(hi), Some(mean)) = (stats.min, stats.max, stats.mean) {
            min = min.min(lo);
            max = max.max(hi);
            sum += mean * stats.valid_count as f64;
            valid_count += stats.valid_count;
        }
    }

    let any = valid_count > 0;
    Ok(RasterSummary {
        rows,
        cols,
        transform: source.transform(),
        bounds: source.bounds(),
        crs: source.crs().cloned(),
        nodata,
        min: any.then_some(min),
        max: any.then_some(max),
        mean: any.then(|| sum / valid_count as f64),
        valid_count,
    })
}
