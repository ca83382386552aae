//! Full run over a synthetic burn raster, pipeline layer and boundary layer.

use burnline_algorithms::statistics::{BURN_EXPOSED, BURN_MEAN, BURN_NORM};
use burnline_cli::{run, Config};
use burnline_core::io::{read_geojson, write_geojson, write_geotiff, GeoTiffOptions, SampleType};
use burnline_core::{Feature, FeatureCollection, GeoTransform, Raster, CRS};
use geo_types::{line_string, polygon, Geometry};
use std::path::Path;
use tempfile::TempDir;

const X0: f64 = 500_000.0;
const Y0: f64 = 6_001_000.0;

/// 100 x 100 cells of 10 m; burn codes 1/2 in the west half, no-data in the east
fn write_inputs(dir: &Path) -> Config {
    let mut raster: Raster<u16> = Raster::filled(100, 100, 65535);
    for r in 0..100 {
        for c in 0..50 {
            raster.set(r, c, 1 + ((r + c) % 2) as u16).unwrap();
        }
    }
    raster.set_transform(GeoTransform::new(X0, Y0, 10.0, -10.0));
    raster.set_crs(Some(CRS::from_epsg(3400)));
    raster.set_nodata(Some(65535));
    let burn = dir.join("burn.tif");
    write_geotiff(
        &raster,
        &burn,
        Some(GeoTiffOptions {
            sample_type: SampleType::UInt16,
            rows_per_strip: Some(8),
        }),
    )
    .unwrap();

    let line = |x0: f64, x1: f64, y: f64| -> Geometry<f64> { line_string![(x: x0, y: y), (x: x1, y: y)].into() };
    let pipelines = FeatureCollection::with_crs(
        vec![
            Feature::new(line(X0 + 100.0, X0 + 300.0, Y0 - 500.0)).with_property("LICENCE_NO", "west"),
            Feature::new(line(X0 + 700.0, X0 + 900.0, Y0 - 500.0)).with_property("LICENCE_NO", "east"),
            Feature::new(line(X0 + 20_000.0, X0 + 21_000.0, Y0)).with_property("LICENCE_NO", "far"),
        ],
        Some(CRS::from_epsg(3400)),
    );
    let pipelines_path = dir.join("pipelines.geojson");
    write_geojson(&pipelines, &pipelines_path).unwrap();

    let square = |x: f64, y: f64, size: f64| -> Geometry<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
        .into()
    };
    let provinces = FeatureCollection::with_crs(
        vec![
            Feature::new(square(X0 - 2_000.0, Y0 - 3_000.0, 5_000.0)).with_property("PRUID", "48"),
            Feature::new(square(X0 + 10_000.0, Y0, 1_000.0)).with_property("PRUID", "35"),
        ],
        Some(CRS::from_epsg(3400)),
    );
    let provinces_path = dir.join("provinces.geojson");
    write_geojson(&provinces, &provinces_path).unwrap();

    let mut config = Config::default();
    config.input.pipelines = pipelines_path;
    config.input.provinces = provinces_path;
    config.input.burn_raster = burn;
    config.output.dir = dir.join("out");
    config.output.write_svg = true;
    config.analysis.buffer_distance = 50.0;
    config.analysis.chunk_size = 1;
    config.map.width_in = 4.0;
    config.map.height_in = 3.0;
    config.map.dpi = 40;
    config
}

#[test]
fn full_run_writes_geojson_and_map() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(dir.path());

    let summary = run(&config).unwrap();
    assert_eq!(summary.segments, 2);
    assert_eq!(summary.exposure.exposed, 1);
    assert_eq!(summary.exposure.with_mean, 1);
    assert_eq!(summary.geojson, config.geojson_path());

    let out = read_geojson(&summary.geojson).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.crs.as_ref().and_then(CRS::epsg), Some(3400));

    let west = &out.features[0];
    assert_eq!(west.get_property("LICENCE_NO").unwrap().as_str(), Some("west"));
    assert_eq!(west.get_property(BURN_EXPOSED).unwrap().as_i64(), Some(1));
    let mean = west.get_property(BURN_MEAN).unwrap().as_f64().unwrap();
    assert!((1.0..=2.0).contains(&mean));
    assert_eq!(west.get_property(BURN_NORM).unwrap().as_f64(), Some(1.0));
    assert!(matches!(west.geometry, Some(Geometry::LineString(_))));

    let east = &out.features[1];
    assert_eq!(east.get_property(BURN_EXPOSED).unwrap().as_i64(), Some(0));
    assert!(east.get_property(BURN_MEAN).unwrap().is_null());
    assert!(east.get_property(BURN_NORM).unwrap().is_null());

    let map = summary.map.unwrap();
    assert_eq!(map, config.map_path());
    let png = std::fs::read(&map).unwrap();
    assert_eq!(&png[1..4], b"PNG");
    // IHDR width and height
    let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    assert_eq!((width, height), (160, 120));

    let svg = std::fs::read_to_string(config.svg_path()).unwrap();
    assert!(svg.contains("Normalized Burn Exposure"));
}

#[test]
fn chunk_size_does_not_change_output() {
    let dir = TempDir::new().unwrap();
    let mut config = write_inputs(dir.path());
    config.map.enabled = false;

    let first = run(&config).unwrap();
    assert!(first.map.is_none());
    let one_by_one = read_geojson(&first.geojson).unwrap();

    config.analysis.chunk_size = 10_000;
    let second = run(&config).unwrap();
    let all_at_once = read_geojson(&second.geojson).unwrap();

    assert_eq!(one_by_one, all_at_once);
    assert!(!config.map_path().exists());
}

#[test]
fn invalid_config_stops_before_reading() {
    let dir = TempDir::new().unwrap();
    let mut config = write_inputs(dir.path());
    config.analysis.chunk_size = 0;
    assert!(run(&config).is_err());
    assert!(!config.geojson_path().exists());
}
