//! Color schemes and multi-stop interpolation engine.
//!
//! The sequential schemes use the nine-class ColorBrewer stops, spread
//! evenly over [0, 1].

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Fallback for features without a value.
    pub const LIGHT_GREY: Self = Self::new(211, 211, 211);

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// `#rrggbb`, as used in SVG paint attributes.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Available color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorScheme {
    /// Light orange -> dark red
    #[default]
    OrRd,
    /// Pale yellow -> orange -> dark red
    YlOrRd,
    /// Black -> White
    Grayscale,
}

impl ColorScheme {
    pub const ALL: &[ColorScheme] = &[Self::OrRd, Self::YlOrRd, Self::Grayscale];

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrRd => "OrRd",
            Self::YlOrRd => "YlOrRd",
            Self::Grayscale => "Grayscale",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Stops of the scheme, for gradients in legends.
    pub fn stops(&self) -> &'static [ColorStop] {
        match self {
            Self::OrRd => OR_RD_STOPS,
            Self::YlOrRd => YL_OR_RD_STOPS,
            Self::Grayscale => GRAYSCALE_STOPS,
        }
    }
}

const OR_RD_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 0xff, 0xf7, 0xec),
    ColorStop::new(0.125, 0xfe, 0xe8, 0xc8),
    ColorStop::new(0.250, 0xfd, 0xd4, 0x9e),
    ColorStop::new(0.375, 0xfd, 0xbb, 0x84),
    ColorStop::new(0.500, 0xfc, 0x8d, 0x59),
    ColorStop::new(0.625, 0xef, 0x65, 0x48),
    ColorStop::new(0.750, 0xd7, 0x30, 0x1f),
    ColorStop::new(0.875, 0xb3, 0x00, 0x00),
    ColorStop::new(1.000, 0x7f, 0x00, 0x00),
];

const YL_OR_RD_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 0xff, 0xff, 0xcc),
    ColorStop::new(0.125, 0xff, 0xed, 0xa0),
    ColorStop::new(0.250, 0xfe, 0xd9, 0x76),
    ColorStop::new(0.375, 0xfe, 0xb2, 0x4c),
    ColorStop::new(0.500, 0xfd, 0x8d, 0x3c),
    ColorStop::new(0.625, 0xfc, 0x4e, 0x2a),
    ColorStop::new(0.750, 0xe3, 0x1a, 0x1c),
    ColorStop::new(0.875, 0xbd, 0x00, 0x26),
    ColorStop::new(1.000, 0x80, 0x00, 0x26),
];

const GRAYSCALE_STOPS: &[ColorStop] = &[ColorStop::new(0.0, 0, 0, 0), ColorStop::new(1.0, 255, 255, 255)];

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    let (first, last) = (stops[0], stops[stops.len() - 1]);
    if t.is_nan() || t <= first.t {
        return first.color;
    }
    if t >= last.t {
        return last.color;
    }
    for pair in stops.windows(2) {
        if t <= pair[1].t {
            let ratio = (t - pair[0].t) / (pair[1].t - pair[0].t);
            return lerp_color(pair[0].color, pair[1].color, ratio);
        }
    }
    last.color
}

/// Evaluate a color scheme at normalized position `t` in [0, 1].
///
/// Values outside the range are clamped; NaN maps to the low end.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    multi_stop(scheme.stops(), t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_rd_endpoints() {
        assert_eq!(evaluate(ColorScheme::OrRd, 0.0), Rgb::new(255, 247, 236));
        assert_eq!(evaluate(ColorScheme::OrRd, 1.0), Rgb::new(127, 0, 0));
        assert_eq!(evaluate(ColorScheme::OrRd, 0.5), Rgb::new(252, 141, 89));
    }

    #[test]
    fn yl_or_rd_endpoints() {
        assert_eq!(evaluate(ColorScheme::YlOrRd, 0.0).to_hex(), "#ffffcc");
        assert_eq!(evaluate(ColorScheme::YlOrRd, 1.0).to_hex(), "#800026");
    }

    #[test]
    fn grayscale_midpoint() {
        assert_eq!(evaluate(ColorScheme::Grayscale, 0.5), Rgb::new(128, 128, 128));
    }

    #[test]
    fn clamping() {
        assert_eq!(evaluate(ColorScheme::OrRd, -0.5), evaluate(ColorScheme::OrRd, 0.0));
        assert_eq!(evaluate(ColorScheme::OrRd, 1.5), evaluate(ColorScheme::OrRd, 1.0));
        assert_eq!(evaluate(ColorScheme::OrRd, f64::NAN), evaluate(ColorScheme::OrRd, 0.0));
    }

    #[test]
    fn sequential_schemes_darken() {
        for scheme in [ColorScheme::OrRd, ColorScheme::YlOrRd] {
            let lum = |c: Rgb| c.r as u32 + c.g as u32 + c.b as u32;
            let mut prev = u32::MAX;
            for i in 0..=20 {
                let l = lum(evaluate(scheme, i as f64 / 20.0));
                assert!(l <= prev, "{} not monotone at {}", scheme.name(), i);
                prev = l;
            }
        }
    }

    #[test]
    fn hex_round_trip() {
        assert_eq!(Rgb::from_hex("#d3d3d3"), Some(Rgb::LIGHT_GREY));
        assert_eq!(Rgb::from_hex("7f0000"), Some(Rgb::new(127, 0, 0)));
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#gg0000"), None);
        assert_eq!(Rgb::new(1, 171, 255).to_hex(), "#01abff");
    }

    #[test]
    fn scheme_names() {
        assert_eq!(ColorScheme::from_name("orrd"), Some(ColorScheme::OrRd));
        assert_eq!(ColorScheme::from_name(" YlOrRd "), Some(ColorScheme::YlOrRd));
        assert_eq!(ColorScheme::from_name("viridis"), None);
        assert_eq!(ColorScheme::default(), ColorScheme::OrRd);
    }
}
