//! Minimal SVG canvas. Coordinates are in points (1 pt = 1/72 in), y down.

use crate::scheme::Rgb;

/// Fill paint
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Color(Rgb),
    /// Reference to a `<defs>` entry such as a gradient
    Url(String),
}

impl Paint {
    fn to_svg(&self) -> String {
        match self {
            Paint::Color(c) => c.to_hex(),
            Paint::Url(id) => format!("url(#{id})"),
        }
    }
}

/// Fill + stroke style for shapes.
#[derive(Debug, Clone)]
pub struct Style {
    pub fill: Option<Paint>,
    pub stroke: Option<Rgb>,
    pub stroke_width: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: 1.0,
        }
    }
}

impl Style {
    pub fn filled(color: Rgb) -> Self {
        Self {
            fill: Some(Paint::Color(color)),
            ..Default::default()
        }
    }

    pub fn stroked(color: Rgb, width: f64) -> Self {
        Self {
            stroke: Some(color),
            stroke_width: width,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

impl TextAnchor {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

/// Text style.
#[derive(Debug, Clone)]
pub struct TextStyle {
    pub size: f64,
    pub color: Rgb,
    pub bold: bool,
    pub anchor: TextAnchor,
    /// Vertically centre on `y` instead of sitting on the baseline
    pub central: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 10.0,
            color: Rgb::BLACK,
            bold: false,
            anchor: TextAnchor::Start,
            central: false,
        }
    }
}

/// Immediate-mode SVG canvas with a white background.
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    defs: Vec<String>,
    body: String,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            defs: Vec::new(),
            body: String::with_capacity(64 * 1024),
        }
    }

    /// Add a raw `<defs>` child (gradients, clip paths).
    pub fn define(&mut self, def: String) {
        self.defs.push(def);
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: &Style) {
        self.body.push_str(&format!(
            r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}"{} />"#,
            style_attrs(style)
        ));
        self.body.push('\n');
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Rgb, width: f64) {
        self.body.push_str(&format!(
            r#"<line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}" stroke="{}" stroke-width="{width:.2}" />"#,
            color.to_hex()
        ));
        self.body.push('\n');
    }

    /// Path with even-odd filling and round joins.
    pub fn path(&mut self, d: &str, style: &Style) {
        if d.is_empty() {
            return;
        }
        self.body.push_str(&format!(
            r#"<path d="{d}" fill-rule="evenodd" stroke-linejoin="round" stroke-linecap="round"{} />"#,
            style_attrs(style)
        ));
        self.body.push('\n');
    }

    pub fn polygon(&mut self, points: &[(f64, f64)], style: &Style) {
        let pts: Vec<String> = points.iter().map(|(x, y)| format!("{x:.2},{y:.2}")).collect();
        self.body.push_str(&format!(r#"<polygon points="{}"{} />"#, pts.join(" "), style_attrs(style)));
        self.body.push('\n');
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, style: &Style) {
        self.body
            .push_str(&format!(r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}"{} />"#, style_attrs(style)));
        self.body.push('\n');
    }

    pub fn text(&mut self, x: f64, y: f64, content: &str, style: &TextStyle) {
        self.text_with_transform(x, y, content, style, None);
    }

    /// Text rotated by `angle` degrees around its anchor point.
    pub fn text_rotated(&mut self, x: f64, y: f64, content: &str, style: &TextStyle, angle: f64) {
        self.text_with_transform(x, y, content, style, Some(angle));
    }

    fn text_with_transform(&mut self, x: f64, y: f64, content: &str, style: &TextStyle, rotate: Option<f64>) {
        let mut attrs = format!(
            r#" font-family="DejaVu Sans, Arial, sans-serif" font-size="{:.1}" fill="{}" text-anchor="{}""#,
            style.size,
            style.color.to_hex(),
            style.anchor.as_str()
        );
        if style.central {
            attrs.push_str(r#" dominant-baseline="central""#);
        }
        if style.bold {
            attrs.push_str(r#" font-weight="bold""#);
        }
        if let Some(angle) = rotate {
            attrs.push_str(&format!(r#" transform="rotate({angle:.1},{x:.2},{y:.2})""#));
        }
        self.body.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}"{attrs}>{}</text>"#,
            escape_xml(content)
        ));
        self.body.push('\n');
    }

    pub fn finish_svg(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 1024);
        out.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height,
        ));
        out.push('\n');

        if !self.defs.is_empty() {
            out.push_str("<defs>\n");
            for d in &self.defs {
                out.push_str(d);
                out.push('\n');
            }
            out.push_str("</defs>\n");
        }

        out.push_str(&format!(
            r#"<rect width="{}" height="{}" fill="white" />"#,
            self.width, self.height
        ));
        out.push('\n');
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }
}

fn style_attrs(style: &Style) -> String {
    let mut out = match &style.fill {
        Some(paint) => format!(r#" fill="{}""#, paint.to_svg()),
        None => r#" fill="none""#.to_string(),
    };
    if let Some(stroke) = style.stroke {
        out.push_str(&format!(
            r#" stroke="{}" stroke-width="{:.2}""#,
            stroke.to_hex(),
            style.stroke_width
        ));
    }
    out
}

fn escape_xml(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for ch in content.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
