//! I/O operations for reading and writing geospatial data

mod cache;
#[cfg(feature = "gdal")]
mod gdal_io;
mod geojson;
mod native;
mod source;

pub use cache::{Chunk, ChunkCache, DEFAULT_CHUNK_CAPACITY};
#[cfg(feature = "gdal")]
pub use gdal_io::{read_vector_ogr, GdalSource};
pub use geojson::{read_geojson, read_geojson_from_str, write_geojson, write_geojson_to_string};
pub use native::{read_geotiff, write_geotiff, GeoTiffMetadata, GeoTiffOptions, SampleType};
pub use source::{GeoTiffSource, InMemorySource, RasterSource};

#[cfg(feature = "gdal")]
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::FeatureCollection;
use std::path::Path;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Read a vector layer, choosing the reader by file extension
pub fn read_vector(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let path = path.as_ref();
    match extension(path).as_str() {
        "geojson" | "json" => read_geojson(path),
        #[cfg(feature = "gdal")]
        _ => read_vector_ogr(path),
        #[cfg(not(feature = "gdal"))]
        other => Err(Error::UnsupportedFormat(format!(
            "'{}' ({}): only GeoJSON is readable without the gdal feature",
            path.display(),
            other
        ))),
    }
}

/// Open a raster for windowed reads, choosing the backend by extension
pub fn open_raster_source(path: impl AsRef<Path>) -> Result<Box<dyn RasterSource>> {
    let path = path.as_ref();
    match extension(path).as_str() {
        "tif" | "tiff" => open_geotiff(path),
        #[cfg(feature = "gdal")]
        _ => Ok(Box::new(GdalSource::open(path)?)),
        #[cfg(not(feature = "gdal"))]
        other => Err(Error::UnsupportedFormat(format!(
            "'{}' ({}): only GeoTIFF is readable without the gdal feature",
            path.display(),
            other
        ))),
    }
}

#[cfg(not(feature = "gdal"))]
fn open_geotiff(path: &Path) -> Result<Box<dyn RasterSource>> {
    Ok(Box::new(GeoTiffSource::open(path)?))
}

/// Native reader first; GDAL when the GeoKeys describe a CRS the native
/// reader cannot rebuild.
#[cfg(feature = "gdal")]
fn open_geotiff(path: &Path) -> Result<Box<dyn RasterSource>> {
    let native = GeoTiffSource::open(path)?;
    if native.crs().is_some() {
        return Ok(Box::new(native));
    }
    let source = GdalSource::open(path)?;
    tracing::info!(
        "{}: CRS not recognised natively, reading through GDAL ({})",
        path.display(),
        source.crs().map_or_else(|| "no CRS".to_string(), CRS::to_string)
    );
    Ok(Box::new(source))
}
