//! Windowed raster sources.
//!
//! The burn raster is never loaded whole: the aggregator asks a
//! [`RasterSource`] for the pixel window under each polygon.

use super::cache::{Chunk, ChunkCache, DEFAULT_CHUNK_CAPACITY};
use super::native::{decoding_to_vec, read_metadata, GeoTiffMetadata};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, Window};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::Decoder;
use tiff::tags::Tag;

/// Read access to a single-band raster by pixel window
pub trait RasterSource {
    /// (rows, cols)
    fn shape(&self) -> (usize, usize);

    fn transform(&self) -> GeoTransform;

    fn crs(&self) -> Option<&CRS>;

    /// No-data sentinel declared by the source, if any
    fn nodata(&self) -> Option<f64>;

    /// Read a window of cells as f64. The returned raster carries the
    /// window's own transform.
    fn read_window(&mut self, window: &Window) -> Result<Raster<f64>>;

    /// Map-space bounds (min_x, min_y, max_x, max_y)
    fn bounds(&self) -> (f64, f64, f64, f64) {
        let (rows, cols) = self.shape();
        self.transform().bounds(cols, rows)
    }
}

fn check_window(window: &Window, rows: usize, cols: usize) -> Result<()> {
    if window.fits(rows, cols) {
        Ok(())
    } else {
        Err(Error::WindowOutOfBounds {
            row_off: window.row_off,
            col_off: window.col_off,
            rows: window.rows,
            cols: window.cols,
            raster_rows: rows,
            raster_cols: cols,
        })
    }
}

/// A raster already held in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    raster: Raster<f64>,
    nodata: Option<f64>,
}

impl InMemorySource {
    pub fn new<T: RasterElement>(raster: &Raster<T>) -> Self {
        let data = raster.data().mapv(|v| v.to_f64().unwrap_or(f64::NAN));
        let nodata = raster.nodata().and_then(RasterElement::to_f64);

        let mut converted = Raster::from_array(data);
        converted.set_transform(*raster.transform());
        converted.set_crs(raster.crs().cloned());
        converted.set_nodata(nodata);
        Self {
            raster: converted,
            nodata,
        }
    }

    pub fn raster(&self) -> &Raster<f64> {
        &self.raster
    }
}

impl RasterSource for InMemorySource {
    fn shape(&self) -> (usize, usize) {
        self.raster.shape()
    }

    fn transform(&self) -> GeoTransform {
        *self.raster.transform()
    }

    fn crs(&self) -> Option<&CRS> {
        self.raster.crs()
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn read_window(&mut self, window: &Window) -> Result<Raster<f64>> {
        self.raster.window(window)
    }
}

/// GeoTIFF read strip by strip (or tile by tile) through an LRU cache
pub struct GeoTiffSource {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    meta: GeoTiffMetadata,
    tiled: bool,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    cache: ChunkCache,
}

impl GeoTiffSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_cache_capacity(path, DEFAULT_CHUNK_CAPACITY)
    }

    pub fn with_cache_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;
        let meta = read_metadata(&mut decoder)?;

        let tiled = decoder.find_tag(Tag::TileWidth)?.is_some();
        let (cw, ch) = decoder.chunk_dimensions();
        let (chunk_width, chunk_height) = (cw.max(1) as usize, ch.max(1) as usize);
        let chunks_across = if tiled {
            meta.cols.div_ceil(chunk_width)
        } else {
            1
        };

        tracing::debug!(
            "opened {} ({}x{}, {} {}x{})",
            path.display(),
            meta.rows,
            meta.cols,
            if tiled { "tiles" } else { "strips" },
            chunk_width,
            chunk_height
        );

        Ok(Self {
            path,
            decoder,
            meta,
            tiled,
            chunk_width,
            chunk_height,
            chunks_across,
            cache: ChunkCache::new(capacity),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chunk cache (hits, misses)
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }

    fn chunk(&mut self, index: u32) -> Result<std::sync::Arc<Chunk>> {
        if let Some(chunk) = self.cache.get(index) {
            return Ok(chunk);
        }

        let data: Vec<f64> = decoding_to_vec(self.decoder.read_chunk(index)?)?;
        let stride = if data.len() == self.chunk_width * self.chunk_height {
            self.chunk_width
        } else {
            (self.decoder.chunk_data_dimensions(index).0 as usize).max(1)
        };
        Ok(self.cache.insert(index, Chunk { data, stride }))
    }
}

impl RasterSource for GeoTiffSource {
    fn shape(&self) -> (usize, usize) {
        (self.meta.rows, self.meta.cols)
    }

    fn transform(&self) -> GeoTransform {
        self.meta.transform
    }

    fn crs(&self) -> Option<&CRS> {
        self.meta.crs.as_ref()
    }

    fn nodata(&self) -> Option<f64> {
        self.meta.nodata
    }

    fn read_window(&mut self, window: &Window) -> Result<Raster<f64>> {
        check_window(window, self.meta.rows, self.meta.cols)?;

        let mut out = vec![f64::NAN; window.rows * window.cols];
        if !window.is_empty() {
            let (cw, ch) = (self.chunk_width, self.chunk_height);
            let col_chunks = if self.tiled {
                window.col_off / cw..=(window.col_end() - 1) / cw
            } else {
                0..=0
            };

            for cy in window.row_off / ch..=(window.row_end() - 1) / ch {
                for cx in col_chunks.clone() {
                    let index = u32::try_from(cy * self.chunks_across + cx)
                        .map_err(|_| Error::Other(format!("chunk index overflow in {}", self.path.display())))?;
                    let chunk = self.chunk(index)?;

                    let (row0, col0) = (cy * ch, if self.tiled { cx * cw } else { 0 });
                    let chunk_cols = if self.tiled { cw } else { self.meta.cols };
                    let rows = window.row_off.max(row0)..window.row_end().min(row0 + ch);
                    let cols = window.col_off.max(col0)..window.col_end().min(col0 + chunk_cols);

                    for r in rows {
                        for c in cols.clone() {
                            let i = (r - row0) * chunk.stride + (c - col0);
                            let value = chunk.data.get(i).copied().ok_or_else(|| {
                                Error::Other(format!(
                                    "chunk {} of {} is shorter than expected",
                                    index,
                                    self.path.display()
                                ))
                            })?;
                            out[(r - window.row_off) * window.cols + (c - window.col_off)] = value;
                        }
                    }
                }
            }
        }

        let mut raster = Raster::from_vec(out, window.rows, window.cols)?;
        raster.set_transform(self.meta.transform.offset(window.col_off, window.row_off));
        raster.set_crs(self.meta.crs.clone());
        raster.set_nodata(self.meta.nodata);
        Ok(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::native::{write_geotiff, GeoTiffOptions, SampleType};
    use tempfile::TempDir;

    fn sample_raster(rows: usize, cols: usize) -> Raster<u16> {
        let data: Vec<u16> = (0..rows * cols)
            .map(|i| if i % 11 == 0 { 65535 } else { (i % 3000) as u16 })
            .collect();
        let mut raster = Raster::from_vec(data, rows, cols).unwrap();
        raster.set_transform(GeoTransform::new(400_000.0, 6_100_000.0, 30.0, -30.0));
        raster.set_crs(Some(CRS::from_epsg(3400)));
        raster.set_nodata(Some(65535));
        raster
    }

    #[test]
    fn test_geotiff_windows_match_in_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("burn.tif");
        let raster = sample_raster(37, 23);
        write_geotiff(
            &raster,
            &path,
            Some(GeoTiffOptions {
                sample_type: SampleType::UInt16,
                rows_per_strip: Some(4),
            }),
        )
        .unwrap();

        let mut tiff = GeoTiffSource::with_cache_capacity(&path, 3).unwrap();
        let mut mem = InMemorySource::new(&raster);

        assert_eq!(tiff.shape(), (37, 23));
        assert_eq!(tiff.nodata(), Some(65535.0));
        assert_eq!(tiff.crs().and_then(CRS::epsg), Some(3400));
        assert_eq!(tiff.bounds(), mem.bounds());

        let windows = [
            Window::new(0, 0, 37, 23),
            Window::new(3, 5, 6, 7),
            Window::new(33, 20, 4, 3),
            Window::new(7, 0, 1, 23),
        ];
        for w in &windows {
            let a = tiff.read_window(w).unwrap();
            let b = mem.read_window(w).unwrap();
            assert_eq!(a.data(), b.data(), "window {:?}", w);
            assert_eq!(a.transform(), b.transform());
        }
    }

    #[test]
    fn test_cache_is_reused_across_windows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("burn.tif");
        write_geotiff(
            &sample_raster(8, 8),
            &path,
            Some(GeoTiffOptions {
                sample_type: SampleType::UInt16,
                rows_per_strip: Some(8),
            }),
        )
        .unwrap();

        let mut src = GeoTiffSource::open(&path).unwrap();
        src.read_window(&Window::new(0, 0, 2, 2)).unwrap();
        src.read_window(&Window::new(4, 4, 2, 2)).unwrap();
        assert_eq!(src.cache_stats(), (1, 1));
    }

    #[test]
    fn test_window_out_of_bounds() {
        let mut mem = InMemorySource::new(&sample_raster(5, 5));
        assert!(mem.read_window(&Window::new(4, 4, 2, 2)).is_err());
    }
}
