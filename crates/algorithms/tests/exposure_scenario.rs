//! End-to-end exposure scoring against a GeoTIFF burn raster.
//!
//! The raster is 100 x 100 cells of 10 m in NAD83 / Alberta 10-TM:
//! - columns 0..50 hold a checkerboard of burn codes 1 and 2,
//! - columns 50..100 hold the no-data sentinel 65535.

use approx::assert_relative_eq;
use burnline_algorithms::statistics::{
    aggregate, enrich, AggregateParams, BURN_EXPOSED, BURN_MEAN, BURN_NORM,
};
use burnline_algorithms::vector::{buffer_features, filter_by_bounds, BufferParams};
use burnline_core::io::{
    read_geojson, write_geojson, write_geotiff, GeoTiffOptions, GeoTiffSource, RasterSource,
    SampleType,
};
use burnline_core::{Feature, FeatureCollection, GeoTransform, Raster, CRS};
use geo_types::{line_string, polygon, Geometry, MultiPolygon};
use tempfile::TempDir;

const SENTINEL: f64 = 65535.0;
const X0: f64 = 500_000.0;
const Y0: f64 = 6_001_000.0;

fn write_burn_raster(dir: &TempDir) -> std::path::PathBuf {
    let mut raster: Raster<u16> = Raster::filled(100, 100, 65535);
    for r in 0..100 {
        for c in 0..50 {
            raster.set(r, c, 1 + ((r + c) % 2) as u16).unwrap();
        }
    }
    raster.set_transform(GeoTransform::new(X0, Y0, 10.0, -10.0));
    raster.set_crs(Some(CRS::from_epsg(3400)));
    raster.set_nodata(Some(65535));

    let path = dir.path().join("burn.tif");
    write_geotiff(
        &raster,
        &path,
        Some(GeoTiffOptions {
            sample_type: SampleType::UInt16,
            rows_per_strip: Some(16),
        }),
    )
    .unwrap();
    path
}

fn square(x: f64, y: f64, size: f64) -> Option<MultiPolygon<f64>> {
    Some(MultiPolygon::new(vec![polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
    ]]))
}

#[test]
fn scenario_valid_nodata_and_outside() {
    let dir = TempDir::new().unwrap();
    let mut source = GeoTiffSource::open(write_burn_raster(&dir)).unwrap();

    let buffers = vec![
        // A: 10 x 10 valid cells
        square(X0 + 100.0, Y0 - 300.0, 100.0),
        // B: only sentinel cells
        square(X0 + 700.0, Y0 - 300.0, 100.0),
        // C: far away from the raster
        square(X0 + 50_000.0, Y0, 100.0),
    ];

    let records = aggregate(
        &buffers,
        &mut source,
        &AggregateParams {
            chunk_size: 2,
            nodata: SENTINEL,
        },
    )
    .unwrap();
    assert_eq!(records.len(), 3);

    let a = records[0].unwrap();
    assert_eq!(a.count, 100);
    assert_eq!(a.nodata, 0);
    assert_eq!(a.min, Some(1.0));
    assert_relative_eq!(a.mean.unwrap(), 1.5);

    let b = records[1].unwrap();
    assert_eq!(b.count, 0);
    assert_eq!(b.nodata, 100);
    assert_eq!(b.mean, None);

    assert!(records[2].is_none());

    let mut fc = FeatureCollection::with_crs(
        vec![Feature::empty(), Feature::empty(), Feature::empty()],
        Some(CRS::from_epsg(3400)),
    );
    enrich(&mut fc, &records, SENTINEL).unwrap();

    let exposed: Vec<i64> = fc
        .iter()
        .map(|f| f.get_property(BURN_EXPOSED).and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(exposed, vec![1, 0, 0]);
    assert_eq!(fc.features[0].get_property(BURN_NORM).unwrap().as_f64(), Some(1.0));
    assert!(fc.features[1].get_property(BURN_MEAN).unwrap().is_null());
    assert!(fc.features[1].get_property(BURN_NORM).unwrap().is_null());
    assert!(fc.features[2].get_property(BURN_MEAN).unwrap().is_null());
    assert!(fc.features[2].get_property(BURN_NORM).unwrap().is_null());
}

#[test]
fn lines_through_buffer_filter_and_export() {
    let dir = TempDir::new().unwrap();
    let mut source = GeoTiffSource::open(write_burn_raster(&dir)).unwrap();

    let pipelines = FeatureCollection::with_crs(
        vec![
            Feature::new(line_string![(x: X0 + 100.0, y: Y0 - 500.0), (x: X0 + 300.0, y: Y0 - 500.0)].into())
                .with_property("LICENCE_NO", "A"),
            Feature::new(line_string![(x: X0 + 700.0, y: Y0 - 500.0), (x: X0 + 900.0, y: Y0 - 500.0)].into())
                .with_property("LICENCE_NO", "B"),
            Feature::new(line_string![(x: X0 + 5_000.0, y: Y0), (x: X0 + 6_000.0, y: Y0)].into())
                .with_property("LICENCE_NO", "far"),
        ],
        Some(CRS::from_epsg(3400)),
    );

    let kept = filter_by_bounds(&pipelines, source.bounds());
    assert_eq!(kept.len(), 2);

    let buffers = buffer_features(&kept, &BufferParams::new(50.0, 32));
    let records = aggregate(&buffers, &mut source, &AggregateParams::default()).unwrap();
    let mut enriched = kept.clone();
    enrich(&mut enriched, &records, SENTINEL).unwrap();

    let path = dir.path().join("out.geojson");
    write_geojson(&enriched, &path).unwrap();
    let back = read_geojson(&path).unwrap();

    assert_eq!(back.len(), 2);
    assert_eq!(back.crs.as_ref().and_then(CRS::epsg), Some(3400));
    for f in back.iter() {
        assert!(matches!(f.geometry, Some(Geometry::LineString(_))));
    }

    let a = &back.features[0];
    assert_eq!(a.get_property("LICENCE_NO").unwrap().as_str(), Some("A"));
    assert_eq!(a.get_property(BURN_EXPOSED).unwrap().as_i64(), Some(1));
    let mean = a.get_property(BURN_MEAN).unwrap().as_f64().unwrap();
    assert!((1.0..=2.0).contains(&mean));
    assert_eq!(a.get_property(BURN_NORM).unwrap().as_f64(), Some(1.0));

    let b = &back.features[1];
    assert_eq!(b.get_property(BURN_EXPOSED).unwrap().as_i64(), Some(0));
    assert!(b.get_property(BURN_NORM).unwrap().is_null());
}
