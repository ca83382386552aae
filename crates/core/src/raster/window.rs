//! Pixel windows into a raster grid

use crate::raster::GeoTransform;

/// A rectangular block of pixels, addressed by its top-left offset and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    pub fn new(row_off: usize, col_off: usize, rows: usize, cols: usize) -> Self {
        Self { row_off, col_off, rows, cols }
    }

    pub fn row_end(&self) -> usize {
        self.row_off + self.rows
    }

    pub fn col_end(&self) -> usize {
        self.col_off + self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Whether the window lies completely inside a raster of shape (rows, cols)
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        self.row_end() <= rows && self.col_end() <= cols
    }

    /// Smallest window of a (rows, cols) raster that covers a map-space
    /// bounding box `(min_x, min_y, max_x, max_y)`, clipped to the raster.
    ///
    /// Returns `None` when the box misses the raster entirely or the box
    /// has non-finite coordinates.
    pub fn covering(
        transform: &GeoTransform,
        rows: usize,
        cols: usize,
        bbox: (f64, f64, f64, f64),
    ) -> Option<Window> {
        let (min_x, min_y, max_x, max_y) = bbox;
        let corners = [
            transform.geo_to_pixel(min_x, min_y),
            transform.geo_to_pixel(min_x, max_y),
            transform.geo_to_pixel(max_x, min_y),
            transform.geo_to_pixel(max_x, max_y),
        ];

        let mut min_c = f64::INFINITY;
        let mut max_c = f64::NEG_INFINITY;
        let mut min_r = f64::INFINITY;
        let mut max_r = f64::NEG_INFINITY;
        for &(c, r) in &corners {
            if !c.is_finite() || !r.is_finite() {
                return None;
            }
            min_c = min_c.min(c);
            max_c = max_c.max(c);
            min_r = min_r.min(r);
            max_r = max_r.max(r);
        }

        if max_c <= 0.0 || max_r <= 0.0 || min_c >= cols as f64 || min_r >= rows as f64 {
            return None;
        }

        let col_off = min_c.floor().max(0.0) as usize;
        let row_off = min_r.floor().max(0.0) as usize;
        let col_end = (max_c.ceil() as usize).min(cols);
        let row_end = (max_r.ceil() as usize).min(rows);

        if col_off >= col_end || row_off >= row_end {
            return None;
        }
        Some(Window::new(row_off, col_off, row_end - row_off, col_end - col_off))
    }
}
