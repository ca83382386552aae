//! Static choropleth map composition
//!
//! Boundary outlines are drawn first, then line features stroked by a
//! nullable value, then the colorbar, scale bar, north arrow and title.
//! Features without a value are left off the map unless `draw_nulls` is set.
//! Map units are assumed to be metres in a projected CRS.

use crate::canvas::{Canvas, Paint, Style, TextAnchor, TextStyle};
use crate::error::{RenderError, Result};
use crate::render::ColormapParams;
use crate::scheme::Rgb;
use burnline_core::{Feature, FeatureCollection};
use geo_types::{Coord, Geometry, LineString, Polygon, Rect};

/// Points per inch of the SVG user space
pub const POINTS_PER_INCH: f64 = 72.0;

const GRADIENT_ID: &str = "colorbar-gradient";

/// Layout and styling of the exposure map
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub title: String,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    /// Scale bar length in map units
    pub scale_bar_m: f64,
    pub legend_label: String,
    /// Attribute holding the value to color by
    pub value_field: String,
    pub colormap: ColormapParams,
    /// Stroke width of boundary outlines, in points
    pub boundary_width: f64,
    /// Stroke width of value-colored lines, in points
    pub line_width: f64,
    /// Draw features without a value in the null color, beneath the rest
    pub draw_nulls: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: "Alberta Pipelines by Wildfire Exposure (2001–2023, LCC Projection)".to_string(),
            width_in: 14.0,
            height_in: 10.0,
            dpi: 300,
            scale_bar_m: 100_000.0,
            legend_label: "Normalized Burn Exposure".to_string(),
            value_field: "burn_norm".to_string(),
            colormap: ColormapParams::default(),
            boundary_width: 1.0,
            line_width: 0.75,
            draw_nulls: false,
        }
    }
}

impl MapConfig {
    /// Canvas size in points
    pub fn canvas_size(&self) -> (f64, f64) {
        (self.width_in * POINTS_PER_INCH, self.height_in * POINTS_PER_INCH)
    }

    /// Size of the rasterized image in pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi as f64).round() as u32,
            (self.height_in * self.dpi as f64).round() as u32,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.width_in.is_finite() && self.width_in > 0.0 && self.height_in.is_finite() && self.height_in > 0.0) {
            return Err(RenderError::Layout(format!(
                "figure size must be positive, got {} x {} in",
                self.width_in, self.height_in
            )));
        }
        if self.dpi == 0 {
            return Err(RenderError::Layout("dpi must be positive".into()));
        }
        if !(self.scale_bar_m.is_finite() && self.scale_bar_m > 0.0) {
            return Err(RenderError::Layout(format!(
                "scale bar length must be positive, got {}",
                self.scale_bar_m
            )));
        }
        Ok(())
    }
}

/// "100 km" for 100000, "250 m" for 250
pub fn scale_bar_label(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{} km", trim_number(meters / 1000.0))
    } else {
        format!("{} m", trim_number(meters))
    }
}

fn trim_number(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{:.1}", v)
    }
}

/// Rectangle of the canvas reserved for the map itself
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl PlotArea {
    fn for_canvas(width: f64, height: f64) -> Self {
        let margin = 0.02 * width.min(height);
        let title_band = 0.08 * height;
        let legend_band = 0.12 * width;
        Self {
            left: margin,
            top: title_band,
            width: width - legend_band - 2.0 * margin,
            height: height - title_band - margin,
        }
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Equal-aspect mapping from map coordinates to canvas points, y flipped
#[derive(Debug, Clone, Copy)]
struct Frame {
    min_x: f64,
    max_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Frame {
    fn fit(extent: Rect<f64>, area: &PlotArea) -> Self {
        let pad = 0.02 * extent.width().max(extent.height()).max(1.0);
        let min_x = extent.min().x - pad;
        let max_y = extent.max().y + pad;
        let dx = extent.width() + 2.0 * pad;
        let dy = extent.height() + 2.0 * pad;
        let scale = (area.width / dx).min(area.height / dy);
        Self {
            min_x,
            max_y,
            scale,
            offset_x: area.left + (area.width - dx * scale) / 2.0,
            offset_y: area.top + (area.height - dy * scale) / 2.0,
        }
    }

    fn to_canvas(&self, c: Coord<f64>) -> (f64, f64) {
        (
            self.offset_x + (c.x - self.min_x) * self.scale,
            self.offset_y + (self.max_y - c.y) * self.scale,
        )
    }
}

/// Path data and point markers of one geometry
#[derive(Default)]
struct Shape {
    d: String,
    points: Vec<(f64, f64)>,
    areal: bool,
}

impl Shape {
    fn of(geometry: &Geometry<f64>, frame: &Frame) -> Self {
        let mut shape = Shape::default();
        shape.add(geometry, frame);
        shape
    }

    fn add(&mut self, geometry: &Geometry<f64>, frame: &Frame) {
        match geometry {
            Geometry::Point(p) => self.points.push(frame.to_canvas(p.0)),
            Geometry::MultiPoint(mp) => self.points.extend(mp.iter().map(|p| frame.to_canvas(p.0))),
            Geometry::Line(l) => self.add_ring(&LineString::new(vec![l.start, l.end]), frame, false),
            Geometry::LineString(ls) => self.add_ring(ls, frame, false),
            Geometry::MultiLineString(mls) => {
                for ls in mls {
                    self.add_ring(ls, frame, false);
                }
            }
            Geometry::Polygon(p) => self.add_polygon(p, frame),
            Geometry::MultiPolygon(mp) => {
                for p in mp {
                    self.add_polygon(p, frame);
                }
            }
            Geometry::Rect(r) => self.add_polygon(&r.to_polygon(), frame),
            Geometry::Triangle(t) => self.add_polygon(&t.to_polygon(), frame),
            Geometry::GeometryCollection(gc) => {
                for g in gc {
                    self.add(g, frame);
                }
            }
        }
    }

    fn add_polygon(&mut self, polygon: &Polygon<f64>, frame: &Frame) {
        self.areal = true;
        self.add_ring(polygon.exterior(), frame, true);
        for ring in polygon.interiors() {
            self.add_ring(ring, frame, true);
        }
    }

    fn add_ring(&mut self, ls: &LineString<f64>, frame: &Frame, close: bool) {
        for (i, c) in ls.coords().enumerate() {
            let (x, y) = frame.to_canvas(*c);
            let op = if i == 0 { 'M' } else { 'L' };
            if !self.d.is_empty() || i > 0 {
                self.d.push(' ');
            }
            self.d.push_str(&format!("{op}{x:.2},{y:.2}"));
        }
        if close && ls.0.len() > 1 {
            self.d.push_str(" Z");
        }
    }
}

fn extent_of(layers: &[&FeatureCollection]) -> Option<Rect<f64>> {
    layers
        .iter()
        .filter_map(|fc| fc.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

fn value_of(feature: &Feature, field: &str) -> Option<f64> {
    feature
        .get_property(field)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
}

/// Render the exposure map as an SVG document.
///
/// `boundaries` are outlined in black; `lines` are colored by
/// `config.value_field` in ascending order so that high values end up on top.
/// Features with a null value are skipped, or drawn first in the null color
/// when `config.draw_nulls` is set. Both layers must share a projected CRS.
pub fn render_map_svg(boundaries: &FeatureCollection, lines: &FeatureCollection, config: &MapConfig) -> Result<String> {
    config.validate()?;
    let (width, height) = config.canvas_size();
    let area = PlotArea::for_canvas(width, height);
    if area.width <= 0.0 || area.height <= 0.0 {
        return Err(RenderError::Layout(format!(
            "figure of {} x {} in leaves no room for the map",
            config.width_in, config.height_in
        )));
    }

    let extent = extent_of(&[boundaries, lines]).unwrap_or_else(|| {
        tracing::warn!("Nothing to draw, rendering an empty map");
        Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 })
    });
    let frame = Frame::fit(extent, &area);
    tracing::debug!(
        "Map extent {:?} at {:.3e} pt per map unit",
        (extent.min(), extent.max()),
        frame.scale
    );

    let mut canvas = Canvas::new(width, height);

    let outline = Style::stroked(Rgb::BLACK, config.boundary_width);
    for geometry in boundaries.iter().filter_map(|f| f.geometry.as_ref()) {
        let shape = Shape::of(geometry, &frame);
        canvas.path(&shape.d, &outline);
    }

    draw_values(&mut canvas, lines, &frame, config);
    draw_colorbar(&mut canvas, &area, config);
    draw_scale_bar(&mut canvas, &area, &frame, config);
    draw_north_arrow(&mut canvas, &area);

    canvas.text(
        width / 2.0,
        area.top * 0.6,
        &config.title,
        &TextStyle {
            size: 16.0,
            anchor: TextAnchor::Middle,
            ..Default::default()
        },
    );

    Ok(canvas.finish_svg())
}

fn draw_values(canvas: &mut Canvas, lines: &FeatureCollection, frame: &Frame, config: &MapConfig) {
    let mut order: Vec<(Option<f64>, &Geometry<f64>)> = lines
        .iter()
        .filter_map(|f| f.geometry.as_ref().map(|g| (value_of(f, &config.value_field), g)))
        .filter(|(value, _)| value.is_some() || config.draw_nulls)
        .collect();
    // nulls first, then ascending; the sort is stable so ties keep input order
    order.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (x, y) => x.is_some().cmp(&y.is_some()),
    });

    let marker_radius = config.line_width * 2.0;
    for (value, geometry) in order {
        let color = config.colormap.color(value);
        let shape = Shape::of(geometry, frame);
        let style = if shape.areal {
            Style {
                fill: Some(Paint::Color(color)),
                stroke: Some(color),
                stroke_width: config.line_width,
            }
        } else {
            Style::stroked(color, config.line_width)
        };
        canvas.path(&shape.d, &style);
        for &(x, y) in &shape.points {
            canvas.circle(x, y, marker_radius, &Style::filled(color));
        }
    }
}

fn draw_colorbar(canvas: &mut Canvas, area: &PlotArea, config: &MapConfig) {
    let params = &config.colormap;

    let mut gradient = format!(r#"<linearGradient id="{GRADIENT_ID}" x1="0" y1="1" x2="0" y2="0">"#);
    for stop in params.scheme.stops() {
        gradient.push_str(&format!(
            r#"<stop offset="{:.4}" stop-color="{}" />"#,
            stop.t,
            stop.color.to_hex()
        ));
    }
    gradient.push_str("</linearGradient>");
    canvas.define(gradient);

    let bar_h = area.height * 0.7;
    let bar_w = (canvas.width * 0.015).max(4.0);
    let x = area.right() + canvas.width * 0.02;
    let y = area.top + (area.height - bar_h) / 2.0;
    canvas.rect(
        x,
        y,
        bar_w,
        bar_h,
        &Style {
            fill: Some(Paint::Url(GRADIENT_ID.to_string())),
            stroke: Some(Rgb::BLACK),
            stroke_width: 0.5,
        },
    );

    let tick_style = TextStyle {
        size: 10.0,
        central: true,
        ..Default::default()
    };
    for i in 0..=5 {
        let f = i as f64 / 5.0;
        let ty = y + bar_h * (1.0 - f);
        canvas.line(x + bar_w, ty, x + bar_w + 3.0, ty, Rgb::BLACK, 0.5);
        let value = params.min + f * (params.max - params.min);
        canvas.text(x + bar_w + 5.0, ty, &format!("{:.1}", value), &tick_style);
    }

    canvas.text_rotated(
        x + bar_w + 36.0,
        y + bar_h / 2.0,
        &config.legend_label,
        &TextStyle {
            size: 12.0,
            anchor: TextAnchor::Middle,
            central: true,
            ..Default::default()
        },
        -90.0,
    );
}

fn draw_scale_bar(canvas: &mut Canvas, area: &PlotArea, frame: &Frame, config: &MapConfig) {
    let length = config.scale_bar_m * frame.scale;
    if length > area.width * 0.9 {
        tracing::warn!(
            "Scale bar of {} does not fit the map, skipping it",
            scale_bar_label(config.scale_bar_m)
        );
        return;
    }
    let thickness = (config.scale_bar_m / 100.0 * frame.scale).max(1.0);
    let pad = 0.02 * area.width.min(area.height);
    let x_end = area.right() - pad;
    let y = area.bottom() - pad - 14.0;

    canvas.rect(x_end - length, y, length, thickness, &Style::filled(Rgb::BLACK));
    canvas.text(
        x_end - length / 2.0,
        y + thickness + 12.0,
        &scale_bar_label(config.scale_bar_m),
        &TextStyle {
            size: 10.0,
            anchor: TextAnchor::Middle,
            ..Default::default()
        },
    );
}

fn draw_north_arrow(canvas: &mut Canvas, area: &PlotArea) {
    let x = area.left + 0.97 * area.width;
    let tip = area.top + 0.07 * area.height;
    let tail = area.top + 0.13 * area.height;
    let head = (tail - tip).min(8.0);

    canvas.text(
        x,
        area.top + 0.03 * area.height,
        "N",
        &TextStyle {
            size: 14.0,
            anchor: TextAnchor::Middle,
            central: true,
            ..Default::default()
        },
    );
    canvas.line(x, tail, x, tip + head, Rgb::BLACK, 2.0);
    canvas.polygon(
        &[(x, tip), (x - 4.0, tip + head), (x + 4.0, tip + head)],
        &Style::filled(Rgb::BLACK),
    );
}
