//! The five analysis stages, in order.
//!
//! Each stage consumes the previous stage's output and either completes or
//! returns an error that ends the run.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use burnline_algorithms::statistics::{aggregate_with_progress, enrich, BatchProgress, ExposureSummary, ZonalRecord};
use burnline_algorithms::vector::{buffer_features, filter_by_bounds};
use burnline_colormap::{render_map_svg, save_png, save_svg};
use burnline_core::io::{open_raster_source, read_vector, write_geojson, RasterSource};
use burnline_core::FeatureCollection;
use geo_types::MultiPolygon;
use std::path::PathBuf;
use tracing::{info, warn};

/// Output of the loader: pipelines in the raster CRS plus the open raster
pub struct Loaded {
    pub pipelines: FeatureCollection,
    pub source: Box<dyn RasterSource>,
    /// Segments read before the bounding-box filter
    pub total_read: usize,
}

/// Final report of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub segments: usize,
    pub exposure: ExposureSummary,
    pub geojson: PathBuf,
    pub map: Option<PathBuf>,
}

/// Stage 1: read pipelines and raster metadata, reproject the pipelines into
/// the raster CRS and keep those intersecting the raster bounds.
pub fn load(config: &Config) -> Result<Loaded> {
    let pipelines = read_vector(&config.input.pipelines)
        .with_context(|| format!("Failed to read pipelines {}", config.input.pipelines.display()))?;
    let source = open_raster_source(&config.input.burn_raster)
        .with_context(|| format!("Failed to open burn raster {}", config.input.burn_raster.display()))?;

    let Some(raster_crs) = source.crs().cloned() else {
        bail!("Burn raster {} has no CRS", config.input.burn_raster.display());
    };
    let (rows, cols) = source.shape();
    info!("Burn raster: {} x {} cells in {}", cols, rows, raster_crs);
    if let Some(nodata) = source.nodata() {
        if nodata != config.analysis.nodata {
            warn!(
                "Raster no-data {} differs from configured sentinel {}; using the configured value",
                nodata, config.analysis.nodata
            );
        }
    }

    let total_read = pipelines.len();
    let projected = pipelines
        .reproject(&raster_crs)
        .context("Failed to reproject pipelines into the raster CRS")?;
    let kept = filter_by_bounds(&projected, source.bounds());
    info!(
        "Loaded and projected {} pipeline segments ({} outside the raster)",
        kept.len(),
        total_read - kept.len()
    );

    Ok(Loaded {
        pipelines: kept,
        source,
        total_read,
    })
}

/// Stage 2: one exposure buffer per segment
pub fn buffer(pipelines: &FeatureCollection, config: &Config) -> Vec<Option<MultiPolygon<f64>>> {
    info!(
        "Buffering {} pipeline geometries by {} units",
        pipelines.len(),
        config.analysis.buffer_distance
    );
    let buffers = buffer_features(pipelines, &config.buffer_params());
    let missing = buffers.iter().filter(|b| b.is_none()).count();
    if missing > 0 {
        warn!("{} segments produced no buffer and will get null statistics", missing);
    }
    buffers
}

/// Stage 3: chunked zonal statistics
pub fn aggregate<F>(
    buffers: &[Option<MultiPolygon<f64>>],
    source: &mut dyn RasterSource,
    config: &Config,
    on_batch: F,
) -> Result<Vec<Option<ZonalRecord>>>
where
    F: FnMut(BatchProgress),
{
    info!(
        "Starting chunked zonal stats: {} buffers in chunks of {}",
        buffers.len(),
        config.analysis.chunk_size
    );
    aggregate_with_progress(buffers, source, &config.aggregate_params(), on_batch)
        .context("Zonal statistics failed")
}

/// Stage 4: derive exposure columns and write the GeoJSON
pub fn export(
    pipelines: &mut FeatureCollection,
    records: &[Option<ZonalRecord>],
    config: &Config,
) -> Result<(ExposureSummary, PathBuf)> {
    let summary = enrich(pipelines, records, config.analysis.nodata).context("Failed to derive exposure columns")?;

    std::fs::create_dir_all(&config.output.dir)
        .with_context(|| format!("Failed to create output directory {}", config.output.dir.display()))?;
    let path = config.geojson_path();
    write_geojson(pipelines, &path).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("GeoJSON saved to: {}", path.display());
    Ok((summary, path))
}

/// Region boundaries selected by `map.region_field == map.region_code`
pub fn select_region(provinces: &FeatureCollection, config: &Config) -> FeatureCollection {
    let features = provinces
        .iter()
        .filter(|f| {
            f.get_property(&config.map.region_field)
                .is_some_and(|v| v.matches_code(&config.map.region_code))
        })
        .cloned()
        .collect();
    FeatureCollection::with_crs(features, provinces.crs.clone())
}

/// Stage 5: reproject to the cartographic CRS and render the map
pub fn render_map(pipelines: &FeatureCollection, config: &Config) -> Result<PathBuf> {
    let map_crs = config.map_crs()?;
    let map_config = config.map_config()?;

    let provinces = read_vector(&config.input.provinces)
        .with_context(|| format!("Failed to read provinces {}", config.input.provinces.display()))?;
    let region = select_region(&provinces, config);
    if region.is_empty() {
        warn!(
            "No boundary has {} = {}; the map will have no outline",
            config.map.region_field, config.map.region_code
        );
    }

    let region = region
        .reproject(&map_crs)
        .context("Failed to reproject boundaries into the map CRS")?;
    let lines = pipelines
        .reproject(&map_crs)
        .context("Failed to reproject pipelines into the map CRS")?;

    let svg = render_map_svg(&region, &lines, &map_config).context("Failed to compose map")?;

    std::fs::create_dir_all(&config.output.dir)
        .with_context(|| format!("Failed to create output directory {}", config.output.dir.display()))?;
    let path = config.map_path();
    save_png(&svg, map_config.dpi, &path).with_context(|| format!("Failed to write {}", path.display()))?;
    if config.output.write_svg {
        let svg_path = config.svg_path();
        save_svg(&svg, &svg_path).with_context(|| format!("Failed to write {}", svg_path.display()))?;
    }
    info!("Map saved to: {}", path.display());
    Ok(path)
}

/// All stages without progress display
pub fn run(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    let Loaded {
        mut pipelines,
        mut source,
        ..
    } = load(config)?;
    let buffers = buffer(&pipelines, config);
    let records = aggregate(&buffers, source.as_mut(), config, |_| {})?;
    drop(buffers);
    let (exposure, geojson) = export(&mut pipelines, &records, config)?;
    let map = if config.map.enabled {
        Some(render_map(&pipelines, config)?)
    } else {
        None
    };

    Ok(RunSummary {
        segments: pipelines.len(),
        exposure,
        geojson,
        map,
    })
}
