//! Raster and vector access through GDAL/OGR

use super::source::RasterSource;
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, Window};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use gdal::spatial_ref::SpatialRef;
use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use std::path::Path;

fn crs_from_spatial_ref(srs: &SpatialRef) -> Option<CRS> {
    if let Ok(code) = srs.auth_code() {
        return Some(CRS::from_epsg(code as u32));
    }
    srs.to_wkt().ok().map(CRS::from_wkt)
}

/// Any single-band raster GDAL can open, read window by window
pub struct GdalSource {
    dataset: Dataset,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

impl GdalSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let dataset = Dataset::open(path.as_ref())?;
        let (cols, rows) = dataset.raster_size();
        let transform = dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .unwrap_or_default();
        let crs = dataset.spatial_ref().ok().as_ref().and_then(crs_from_spatial_ref);
        let nodata = dataset.rasterband(1)?.no_data_value();

        Ok(Self {
            dataset,
            rows,
            cols,
            transform,
            crs,
            nodata,
        })
    }
}

impl RasterSource for GdalSource {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn transform(&self) -> GeoTransform {
        self.transform
    }

    fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn read_window(&mut self, window: &Window) -> Result<Raster<f64>> {
        if !window.fits(self.rows, self.cols) {
            return Err(Error::WindowOutOfBounds {
                row_off: window.row_off,
                col_off: window.col_off,
                rows: window.rows,
                cols: window.cols,
                raster_rows: self.rows,
                raster_cols: self.cols,
            });
        }

        let band = self.dataset.rasterband(1)?;
        let buffer = band.read_as::<f64>(
            (window.col_off as isize, window.row_off as isize),
            (window.cols, window.rows),
            (window.cols, window.rows),
            None,
        )?;

        let mut raster = Raster::from_vec(buffer.data().to_vec(), window.rows, window.cols)?;
        raster.set_transform(self.transform.offset(window.col_off, window.row_off));
        raster.set_crs(self.crs.clone());
        raster.set_nodata(self.nodata);
        Ok(raster)
    }
}

fn attribute_from_field(value: Option<FieldValue>) -> AttributeValue {
    match value {
        None => AttributeValue::Null,
        Some(FieldValue::IntegerValue(v)) => AttributeValue::Int(v as i64),
        Some(FieldValue::Integer64Value(v)) => AttributeValue::Int(v),
        Some(FieldValue::RealValue(v)) => AttributeValue::Float(v),
        Some(FieldValue::StringValue(s)) => AttributeValue::String(s),
        Some(other) => other
            .into_string()
            .map_or(AttributeValue::Null, AttributeValue::String),
    }
}

/// Read the first layer of any OGR vector source (Shapefile, GeoPackage, ..)
pub fn read_vector_ogr(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let dataset = Dataset::open(path.as_ref())?;
    let mut layer = dataset.layer(0)?;
    let crs = layer.spatial_ref().as_ref().and_then(crs_from_spatial_ref);

    let mut features = Vec::new();
    for f in layer.features() {
        let geometry = match f.geometry() {
            Some(g) => Some(g.to_geo()?),
            None => None,
        };
        let properties = f
            .fields()
            .map(|(name, value)| (name, attribute_from_field(value)))
            .collect();
        features.push(Feature {
            geometry,
            properties,
            id: f.fid().map(|fid| fid.to_string()),
        });
    }

    tracing::debug!("read {} features from {}", features.len(), path.as_ref().display());
    Ok(FeatureCollection::with_crs(features, crs))
}
