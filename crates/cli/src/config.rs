//! Run configuration for the exposure analysis.

use anyhow::{bail, Context, Result};
use burnline_algorithms::statistics::AggregateParams;
use burnline_algorithms::vector::BufferParams;
use burnline_colormap::{ColorScheme, ColormapParams, MapConfig};
use burnline_core::CRS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration, one section per concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Input layers
    #[serde(default)]
    pub input: InputConfig,

    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Buffering and aggregation
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Static map
    #[serde(default)]
    pub map: MapSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Pipeline segments (GeoJSON, or any OGR format with the `gdal` feature)
    #[serde(default = "default_pipelines")]
    pub pipelines: PathBuf,

    /// Province boundaries carrying the region attribute
    #[serde(default = "default_provinces")]
    pub provinces: PathBuf,

    /// Single-band burn raster
    #[serde(default = "default_burn_raster")]
    pub burn_raster: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pipelines: default_pipelines(),
            provinces: default_provinces(),
            burn_raster: default_burn_raster(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for all outputs, created if absent
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_geojson_name")]
    pub geojson_name: String,

    #[serde(default = "default_map_name")]
    pub map_name: String,

    /// Also write the map as SVG next to the PNG
    #[serde(default)]
    pub write_svg: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            geojson_name: default_geojson_name(),
            map_name: default_map_name(),
            write_svg: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Buffer distance in raster CRS units
    #[serde(default = "default_buffer_distance")]
    pub buffer_distance: f64,

    /// Segments per full circle for round caps and joins
    #[serde(default = "default_buffer_segments")]
    pub buffer_segments: usize,

    /// Buffers per zonal statistics batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Burn raster no-data sentinel
    #[serde(default = "default_nodata")]
    pub nodata: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            buffer_distance: default_buffer_distance(),
            buffer_segments: default_buffer_segments(),
            chunk_size: default_chunk_size(),
            nodata: default_nodata(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    /// Render the map at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cartographic CRS, e.g. `EPSG:3347`
    #[serde(default = "default_map_crs")]
    pub crs: String,

    /// Boundary attribute selecting the region to outline
    #[serde(default = "default_region_field")]
    pub region_field: String,

    #[serde(default = "default_region_code")]
    pub region_code: String,

    #[serde(default = "default_title")]
    pub title: String,

    /// Color scheme name (OrRd, YlOrRd, Grayscale)
    #[serde(default = "default_colormap")]
    pub colormap: String,

    #[serde(default = "default_width_in")]
    pub width_in: f64,

    #[serde(default = "default_height_in")]
    pub height_in: f64,

    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Scale bar length in map units
    #[serde(default = "default_scale_bar_m")]
    pub scale_bar_m: f64,

    /// Draw segments without exposure in light grey instead of omitting them
    #[serde(default)]
    pub draw_nulls: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            crs: default_map_crs(),
            region_field: default_region_field(),
            region_code: default_region_code(),
            title: default_title(),
            colormap: default_colormap(),
            width_in: default_width_in(),
            height_in: default_height_in(),
            dpi: default_dpi(),
            scale_bar_m: default_scale_bar_m(),
            draw_nulls: false,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match extension.to_ascii_lowercase().as_str() {
            "json" => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        };
        config.with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize in the format implied by the extension of `path`.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let text = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => self.to_json()?,
            _ => self.to_yaml()?,
        };
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("input.pipelines", &self.input.pipelines),
            ("input.provinces", &self.input.provinces),
            ("input.burn_raster", &self.input.burn_raster),
            ("output.dir", &self.output.dir),
        ] {
            if path.as_os_str().is_empty() {
                bail!("{} must not be empty", name);
            }
        }
        if self.output.geojson_name.trim().is_empty() {
            bail!("output.geojson_name must not be empty");
        }
        if self.output.map_name.trim().is_empty() {
            bail!("output.map_name must not be empty");
        }

        let a = &self.analysis;
        if a.chunk_size == 0 {
            bail!("analysis.chunk_size must be > 0");
        }
        if !(a.buffer_distance.is_finite() && a.buffer_distance > 0.0) {
            bail!("analysis.buffer_distance must be > 0, got {}", a.buffer_distance);
        }
        if a.buffer_segments < 4 {
            bail!("analysis.buffer_segments must be >= 4, got {}", a.buffer_segments);
        }
        if !a.nodata.is_finite() {
            bail!("analysis.nodata must be a finite number");
        }

        let m = &self.map;
        if m.dpi == 0 {
            bail!("map.dpi must be > 0");
        }
        if m.region_field.trim().is_empty() {
            bail!("map.region_field must not be empty");
        }
        self.map_config()?.validate()?;
        self.map_crs()?;
        Ok(())
    }

    pub fn geojson_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.geojson_name)
    }

    pub fn map_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.map_name)
    }

    pub fn svg_path(&self) -> PathBuf {
        self.map_path().with_extension("svg")
    }

    pub fn buffer_params(&self) -> BufferParams {
        BufferParams::new(self.analysis.buffer_distance, self.analysis.buffer_segments)
    }

    pub fn aggregate_params(&self) -> AggregateParams {
        AggregateParams {
            chunk_size: self.analysis.chunk_size,
            nodata: self.analysis.nodata,
        }
    }

    pub fn map_crs(&self) -> Result<CRS> {
        CRS::from_user_input(&self.map.crs).with_context(|| format!("Invalid map.crs '{}'", self.map.crs))
    }

    /// Renderer settings derived from the map section
    pub fn map_config(&self) -> Result<MapConfig> {
        let scheme = ColorScheme::from_name(&self.map.colormap)
            .with_context(|| format!("Unknown map.colormap '{}'", self.map.colormap))?;
        Ok(MapConfig {
            title: self.map.title.clone(),
            width_in: self.map.width_in,
            height_in: self.map.height_in,
            dpi: self.map.dpi,
            scale_bar_m: self.map.scale_bar_m,
            colormap: ColormapParams::new(scheme),
            draw_nulls: self.map.draw_nulls,
            ..Default::default()
        })
    }
}

fn default_pipelines() -> PathBuf { PathBuf::from("data/pipelines.geojson") }
fn default_provinces() -> PathBuf { PathBuf::from("data/provinces.geojson") }
fn default_burn_raster() -> PathBuf { PathBuf::from("data/burn_raster.tif") }
fn default_output_dir() -> PathBuf { PathBuf::from("outputs") }
fn default_geojson_name() -> String { "pipeline_wildfire_exposure.geojson".to_string() }
fn default_map_name() -> String { "wildfire_pipeline_map_lcc.png".to_string() }
fn default_buffer_distance() -> f64 { 500.0 }
fn default_buffer_segments() -> usize { 32 }
fn default_chunk_size() -> usize { 10_000 }
fn default_nodata() -> f64 { 65535.0 }
fn default_true() -> bool { true }
fn default_map_crs() -> String { "EPSG:3347".to_string() }
fn default_region_field() -> String { "PRUID".to_string() }
fn default_region_code() -> String { "48".to_string() }
fn default_title() -> String { "Alberta Pipelines by Wildfire Exposure (2001–2023, LCC Projection)".to_string() }
fn default_colormap() -> String { "OrRd".to_string() }
fn default_width_in() -> f64 { 14.0 }
fn default_height_in() -> f64 { 10.0 }
fn default_dpi() -> u32 { 300 }
fn default_scale_bar_m() -> f64 { 100_000.0 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analysis.buffer_distance, 500.0);
        assert_eq!(config.analysis.buffer_segments, 32);
        assert_eq!(config.analysis.chunk_size, 10_000);
        assert_eq!(config.analysis.nodata, 65535.0);
        assert_eq!(config.map.crs, "EPSG:3347");
        assert_eq!(config.map.region_field, "PRUID");
        assert_eq!(config.map.region_code, "48");
        assert_eq!(config.map.dpi, 300);
        assert_eq!(
            config.geojson_path(),
            PathBuf::from("outputs/pipeline_wildfire_exposure.geojson")
        );
        assert_eq!(config.svg_path(), PathBuf::from("outputs/wildfire_pipeline_map_lcc.svg"));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
input:
  burn_raster: /data/nbac.tif
analysis:
  chunk_size: 250
map:
  region_code: "35"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.input.burn_raster, PathBuf::from("/data/nbac.tif"));
        assert_eq!(config.input.pipelines, default_pipelines());
        assert_eq!(config.analysis.chunk_size, 250);
        assert_eq!(config.analysis.buffer_distance, 500.0);
        assert_eq!(config.map.region_code, "35");
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_yaml_and_json_round_trip() {
        let mut config = Config::default();
        config.output.write_svg = true;
        config.map.colormap = "YlOrRd".into();

        assert_eq!(Config::from_yaml(&config.to_yaml().unwrap()).unwrap(), config);
        assert_eq!(Config::from_json(&config.to_json().unwrap()).unwrap(), config);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();

        let yaml = dir.path().join("burnline.yaml");
        let json = dir.path().join("burnline.json");
        config.to_file(&yaml).unwrap();
        config.to_file(&json).unwrap();

        assert!(std::fs::read_to_string(&json).unwrap().trim_start().starts_with('{'));
        assert_eq!(Config::from_file(&yaml).unwrap(), config);
        assert_eq!(Config::from_file(&json).unwrap(), config);
        assert!(Config::from_file(&dir.path().join("missing.yaml")).is_err());
    }

    fn rejects(mutate: impl Fn(&mut Config)) -> bool {
        let mut config = Config::default();
        mutate(&mut config);
        config.validate().is_err()
    }

    #[test]
    fn test_validation_rejects() {
        assert!(rejects(|c| c.analysis.chunk_size = 0));
        assert!(rejects(|c| c.analysis.buffer_distance = 0.0));
        assert!(rejects(|c| c.analysis.buffer_distance = -5.0));
        assert!(rejects(|c| c.analysis.buffer_segments = 3));
        assert!(rejects(|c| c.map.dpi = 0));
        assert!(rejects(|c| c.input.pipelines = PathBuf::new()));
        assert!(rejects(|c| c.input.burn_raster = PathBuf::new()));
        assert!(rejects(|c| c.output.geojson_name = " ".into()));
        assert!(rejects(|c| c.map.colormap = "rainbow".into()));
        assert!(rejects(|c| c.map.crs = String::new()));
        assert!(rejects(|c| c.map.width_in = 0.0));
        assert!(!rejects(|c| c.analysis.chunk_size = 1));
    }

    #[test]
    fn test_map_config() {
        let mut config = Config::default();
        config.map.colormap = "grayscale".into();
        config.map.dpi = 150;
        let map = config.map_config().unwrap();
        assert_eq!(map.colormap.scheme, ColorScheme::Grayscale);
        assert_eq!(map.pixel_size(), (2100, 1500));
        assert!(!map.draw_nulls);
        config.map.draw_nulls = true;
        assert!(config.map_config().unwrap().draw_nulls);
        assert_eq!(config.map_crs().unwrap().epsg(), Some(3347));
        assert_eq!(config.aggregate_params().chunk_size, 10_000);
        assert_eq!(config.buffer_params().distance, 500.0);
    }
}
