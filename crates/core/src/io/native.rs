//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Georeferencing comes from ModelPixelScale +
//! ModelTiepoint (or ModelTransformation), the EPSG code from the GeoKey
//! directory and the no-data value from the GDAL_NODATA ascii tag.
//! User-defined Transverse Mercator and Lambert Conformal Conic systems
//! are rebuilt as PROJ definitions from their GeoKey parameters.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray16, Gray32Float};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::ColorType;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_GEOG_DATUM: u16 = 2050;
const KEY_GEOG_ELLIPSOID: u16 = 2056;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;
const KEY_PROJ_COORD_TRANS: u16 = 3075;
const KEY_PROJ_LINEAR_UNITS: u16 = 3076;
const KEY_PROJ_STD_PARALLEL_1: u16 = 3078;
const KEY_PROJ_STD_PARALLEL_2: u16 = 3079;
const KEY_PROJ_NAT_ORIGIN_LONG: u16 = 3080;
const KEY_PROJ_NAT_ORIGIN_LAT: u16 = 3081;
const KEY_PROJ_FALSE_EASTING: u16 = 3082;
const KEY_PROJ_FALSE_NORTHING: u16 = 3083;
const KEY_PROJ_FALSE_ORIGIN_LONG: u16 = 3084;
const KEY_PROJ_FALSE_ORIGIN_LAT: u16 = 3085;
const KEY_PROJ_FALSE_ORIGIN_EASTING: u16 = 3086;
const KEY_PROJ_FALSE_ORIGIN_NORTHING: u16 = 3087;
const KEY_PROJ_CENTER_LONG: u16 = 3088;
const KEY_PROJ_CENTER_LAT: u16 = 3089;
const KEY_PROJ_SCALE_AT_NAT_ORIGIN: u16 = 3092;

const USER_DEFINED: u16 = 32767;
const MODEL_PROJECTED: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const CT_TRANSVERSE_MERCATOR: u16 = 1;
const CT_LAMBERT_CONF_CONIC_2SP: u16 = 8;
const LINEAR_UNIT_METRE: u16 = 9001;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Sample type written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    #[default]
    Float32,
    UInt16,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample_type: SampleType,
    /// Rows per strip; the encoder picks one when `None`
    pub rows_per_strip: Option<u32>,
}

/// Raster metadata available without decoding pixel data
#[derive(Debug, Clone)]
pub struct GeoTiffMetadata {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
}

/// Read a single-band GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let meta = read_metadata(&mut decoder)?;

    let data: Vec<T> = decoding_to_vec(decoder.read_image()?)?;
    if data.len() != meta.rows * meta.cols {
        return Err(Error::InvalidDimensions {
            width: meta.cols,
            height: meta.rows,
        });
    }

    let mut raster = Raster::from_vec(data, meta.rows, meta.cols)?;
    raster.set_transform(meta.transform);
    raster.set_crs(meta.crs);
    raster.set_nodata(meta.nodata.and_then(T::from_f64));
    Ok(raster)
}

/// Read shape, georeferencing, CRS and no-data from the current IFD.
///
/// Only single-band grayscale images are accepted.
pub fn read_metadata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTiffMetadata> {
    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "expected a single-band raster, found {:?}",
                other
            )))
        }
    }

    let (width, height) = decoder.dimensions()?;
    let keys = read_geokeys(decoder);
    let transform = match read_geotransform(decoder) {
        Some(gt) if keys.pixel_is_point() => area_from_point(gt),
        Some(gt) => gt,
        None => {
            tracing::warn!("GeoTIFF has no georeferencing tags; using identity transform");
            GeoTransform::default()
        }
    };

    Ok(GeoTiffMetadata {
        rows: height as usize,
        cols: width as usize,
        transform,
        crs: keys.crs(),
        nodata: read_nodata(decoder),
    })
}

/// With PixelIsPoint the tiepoint names the centre of the first cell;
/// move the origin to its outer corner the way GDAL does.
fn area_from_point(gt: GeoTransform) -> GeoTransform {
    GeoTransform {
        origin_x: gt.origin_x - 0.5 * (gt.pixel_width + gt.row_rotation),
        origin_y: gt.origin_y - 0.5 * (gt.col_rotation + gt.pixel_height),
        ..gt
    }
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let (Ok(scale), Ok(tiepoint)) = (
        decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)),
        decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)),
    ) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    let m = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION)).ok()?;
    (m.len() >= 8).then(|| GeoTransform {
        origin_x: m[3],
        pixel_width: m[0],
        row_rotation: m[1],
        origin_y: m[7],
        col_rotation: m[4],
        pixel_height: m[5],
    })
}

fn read_geokeys<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoKeys {
    let directory = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).unwrap_or_default();
    let doubles = decoder.get_tag_f64_vec(tag(GEO_DOUBLE_PARAMS)).unwrap_or_default();
    GeoKeys::parse(&directory, &doubles)
}

/// GeoKey directory with short values inline and double values resolved
/// from GeoDoubleParams. Ascii keys are not needed and are skipped.
#[derive(Debug, Default)]
struct GeoKeys {
    shorts: HashMap<u16, u16>,
    doubles: HashMap<u16, f64>,
}

impl GeoKeys {
    fn parse(directory: &[u16], doubles: &[f64]) -> Self {
        let mut keys = GeoKeys::default();
        if directory.len() < 4 {
            return keys;
        }
        let count = directory[3] as usize;
        for entry in directory[4..].chunks_exact(4).take(count) {
            let (key, location, value) = (entry[0], entry[1], entry[3]);
            match location {
                0 => {
                    keys.shorts.insert(key, value);
                }
                GEO_DOUBLE_PARAMS => {
                    if let Some(&v) = doubles.get(value as usize) {
                        keys.doubles.insert(key, v);
                    }
                }
                _ => {}
            }
        }
        keys
    }

    fn short(&self, key: u16) -> Option<u16> {
        self.shorts.get(&key).copied()
    }

    /// First of `keys` present as a double
    fn double(&self, keys: &[u16]) -> Option<f64> {
        keys.iter().find_map(|k| self.doubles.get(k).copied())
    }

    fn registered(&self, key: u16) -> Option<u32> {
        self.short(key)
            .filter(|&v| v != 0 && v != USER_DEFINED)
            .map(u32::from)
    }

    fn pixel_is_point(&self) -> bool {
        self.short(KEY_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT)
    }

    /// Registered EPSG code, or a PROJ definition for a user-defined
    /// projected system. A projected raster never falls back to the
    /// geographic system it is based on.
    fn crs(&self) -> Option<CRS> {
        if let Some(code) = self.registered(KEY_PROJECTED_CS_TYPE) {
            return Some(CRS::from_epsg(code));
        }
        if self.short(KEY_PROJ_COORD_TRANS).is_some() {
            return self.user_defined_projection();
        }
        let projected = self.short(KEY_PROJECTED_CS_TYPE).is_some()
            || self.short(KEY_MODEL_TYPE) == Some(MODEL_PROJECTED);
        if projected {
            return None;
        }
        self.registered(KEY_GEOGRAPHIC_TYPE).map(CRS::from_epsg)
    }

    fn ellipsoid(&self) -> Option<&'static str> {
        match self.short(KEY_GEOG_ELLIPSOID) {
            Some(7019) => return Some("GRS80"),
            Some(7030) => return Some("WGS84"),
            _ => {}
        }
        match self.short(KEY_GEOG_DATUM) {
            Some(6269) => return Some("GRS80"),
            Some(6326) => return Some("WGS84"),
            _ => {}
        }
        match self.short(KEY_GEOGRAPHIC_TYPE) {
            Some(4269 | 4617) => Some("GRS80"),
            Some(4326) => Some("WGS84"),
            _ => None,
        }
    }

    fn user_defined_projection(&self) -> Option<CRS> {
        if let Some(unit) = self.short(KEY_PROJ_LINEAR_UNITS) {
            if unit != LINEAR_UNIT_METRE {
                tracing::warn!("GeoTIFF linear unit {} is not supported", unit);
                return None;
            }
        }
        let Some(ellps) = self.ellipsoid() else {
            tracing::warn!("GeoTIFF user-defined CRS has an unsupported datum");
            return None;
        };

        let easting = self
            .double(&[KEY_PROJ_FALSE_EASTING, KEY_PROJ_FALSE_ORIGIN_EASTING])
            .unwrap_or(0.0);
        let northing = self
            .double(&[KEY_PROJ_FALSE_NORTHING, KEY_PROJ_FALSE_ORIGIN_NORTHING])
            .unwrap_or(0.0);

        let def = match self.short(KEY_PROJ_COORD_TRANS) {
            Some(CT_TRANSVERSE_MERCATOR) => format!(
                "+proj=tmerc +lat_0={} +lon_0={} +k_0={}",
                self.double(&[KEY_PROJ_NAT_ORIGIN_LAT]).unwrap_or(0.0),
                self.double(&[KEY_PROJ_NAT_ORIGIN_LONG, KEY_PROJ_CENTER_LONG])?,
                self.double(&[KEY_PROJ_SCALE_AT_NAT_ORIGIN]).unwrap_or(1.0),
            ),
            Some(CT_LAMBERT_CONF_CONIC_2SP) => {
                let lat_1 = self.double(&[KEY_PROJ_STD_PARALLEL_1])?;
                format!(
                    "+proj=lcc +lat_1={} +lat_2={} +lat_0={} +lon_0={}",
                    lat_1,
                    self.double(&[KEY_PROJ_STD_PARALLEL_2]).unwrap_or(lat_1),
                    self.double(&[KEY_PROJ_FALSE_ORIGIN_LAT, KEY_PROJ_NAT_ORIGIN_LAT, KEY_PROJ_CENTER_LAT])
                        .unwrap_or(lat_1),
                    self.double(&[
                        KEY_PROJ_FALSE_ORIGIN_LONG,
                        KEY_PROJ_NAT_ORIGIN_LONG,
                        KEY_PROJ_CENTER_LONG
                    ])?,
                )
            }
            other => {
                tracing::warn!("GeoTIFF coordinate transformation {:?} is not supported", other);
                return None;
            }
        };

        Some(CRS::from_proj(format!(
            "{} +x_0={} +y_0={} +ellps={} +units=m +no_defs",
            def, easting, northing, ellps
        )))
    }
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

macro_rules! cast_all {
    ($buf:expr) => {
        $buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
            .collect()
    };
}

/// Convert any decoded sample buffer into raster elements.
///
/// Values that do not fit `T` become `T::default_nodata()`.
pub fn decoding_to_vec<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_all!(buf),
        DecodingResult::U16(buf) => cast_all!(buf),
        DecodingResult::U32(buf) => cast_all!(buf),
        DecodingResult::U64(buf) => cast_all!(buf),
        DecodingResult::I8(buf) => cast_all!(buf),
        DecodingResult::I16(buf) => cast_all!(buf),
        DecodingResult::I32(buf) => cast_all!(buf),
        DecodingResult::I64(buf) => cast_all!(buf),
        DecodingResult::F32(buf) => cast_all!(buf),
        DecodingResult::F64(buf) => cast_all!(buf),
    };
    Ok(data)
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file, options.unwrap_or_default())
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (rows, cols) = raster.shape();

    macro_rules! write_image {
        ($color:ty, $data:expr) => {{
            let mut image = encoder.new_image::<$color>(cols as u32, rows as u32)?;
            write_geo_tags(image.encoder(), raster)?;
            if let Some(n) = options.rows_per_strip {
                image.rows_per_strip(n.max(1))?;
            }
            image.write_data(&$data)?;
        }};
    }

    match options.sample_type {
        SampleType::Float32 => {
            let data: Vec<f32> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                .collect();
            write_image!(Gray32Float, data);
        }
        SampleType::UInt16 => {
            let data: Vec<u16> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(u16::MAX))
                .collect();
            write_image!(Gray16, data);
        }
    }

    Ok(())
}

fn write_geo_tags<T, W, K>(dir: &mut DirectoryEncoder<'_, W, K>, raster: &Raster<T>) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
    K: TiffKind,
{
    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    dir.write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;

    // Version 1.1.0, then (key, location, count, value) entries in key order.
    // RasterPixelIsArea = 1.
    let mut keys: Vec<u16> = vec![1, 1, 0, 2];
    match raster.crs().and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        Some(code) if matches!(code, 4326 | 4269 | 4617) => {
            keys.extend_from_slice(&[KEY_MODEL_TYPE, 0, 1, 2]);
            keys.extend_from_slice(&[KEY_RASTER_TYPE, 0, 1, 1]);
            keys.extend_from_slice(&[KEY_GEOGRAPHIC_TYPE, 0, 1, code]);
            keys[3] = 3;
        }
        Some(code) => {
            keys.extend_from_slice(&[KEY_MODEL_TYPE, 0, 1, 1]);
            keys.extend_from_slice(&[KEY_RASTER_TYPE, 0, 1, 1]);
            keys.extend_from_slice(&[KEY_PROJECTED_CS_TYPE, 0, 1, code]);
            keys[3] = 3;
        }
        None => {
            keys.extend_from_slice(&[KEY_MODEL_TYPE, 0, 1, 1]);
            keys.extend_from_slice(&[KEY_RASTER_TYPE, 0, 1, 1]);
        }
    }
    dir.write_tag(tag(GEO_KEY_DIRECTORY), &keys[..])?;

    if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        dir.write_tag(tag(GDAL_NODATA), text.as_str())?;
    }

    Ok(())
}
