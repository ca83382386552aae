//! # burnline colormap
//!
//! Color scales and static map output for burnline.
//!
//! Provides sequential color schemes (OrRd, YlOrRd, Grayscale) on a generic
//! multi-stop interpolation engine, nullable value-to-color mapping, SVG
//! composition of the exposure map and PNG rasterization through resvg.
//!
//! ## Usage
//!
//! ```ignore
//! use burnline_colormap::{render_map_svg, save_png, MapConfig};
//!
//! let config = MapConfig::default();
//! let svg = render_map_svg(&boundaries, &pipelines, &config)?;
//! save_png(&svg, config.dpi, "map.png")?;
//! ```

mod canvas;
mod error;
mod map;
mod png;
mod render;
mod scheme;

pub use error::{RenderError, Result};
pub use map::{render_map_svg, scale_bar_label, MapConfig, POINTS_PER_INCH};
pub use png::{save_png, save_svg, svg_to_png};
pub use render::ColormapParams;
pub use scheme::{evaluate, ColorScheme, ColorStop, Rgb};
