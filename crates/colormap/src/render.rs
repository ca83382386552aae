//! Value-to-color mapping for nullable per-feature values.

use crate::scheme::{evaluate, ColorScheme, Rgb};

/// Parameters for colormap rendering.
#[derive(Debug, Clone)]
pub struct ColormapParams {
    /// Color scheme to use.
    pub scheme: ColorScheme,
    /// Value mapped to the low end of the scheme. Values below are clamped.
    pub min: f64,
    /// Value mapped to the high end of the scheme. Values above are clamped.
    pub max: f64,
    /// Color for null or non-finite values.
    pub null_color: Rgb,
}

impl ColormapParams {
    /// Params over [0, 1] with a light grey null color.
    pub fn new(scheme: ColorScheme) -> Self {
        Self::with_range(scheme, 0.0, 1.0)
    }

    /// Create params with explicit min/max range.
    pub fn with_range(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self {
            scheme,
            min,
            max,
            null_color: Rgb::LIGHT_GREY,
        }
    }

    /// Color of a single value
    pub fn color(&self, value: Option<f64>) -> Rgb {
        match value {
            Some(v) if v.is_finite() => {
                let range = self.max - self.min;
                let t = if range.abs() > f64::EPSILON {
                    (v - self.min) / range
                } else {
                    1.0
                };
                evaluate(self.scheme, t)
            }
            _ => self.null_color,
        }
    }
}

impl Default for ColormapParams {
    fn default() -> Self {
        Self::new(ColorScheme::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_colors_and_nulls() {
        let params = ColormapParams::with_range(ColorScheme::Grayscale, 0.0, 1.0);
        assert_eq!(params.color(Some(0.0)), Rgb::BLACK);
        assert_eq!(params.color(Some(0.5)), Rgb::new(128, 128, 128));
        assert_eq!(params.color(Some(1.0)), Rgb::WHITE);
        assert_eq!(params.color(None), Rgb::LIGHT_GREY);
        assert_eq!(params.color(Some(f64::NAN)), Rgb::LIGHT_GREY);
    }

    #[test]
    fn constant_range_maps_to_top() {
        let params = ColormapParams::with_range(ColorScheme::Grayscale, 42.0, 42.0);
        assert_eq!(params.color(Some(42.0)), Rgb::WHITE);
    }

    #[test]
    fn default_is_unit_or_rd() {
        let params = ColormapParams::default();
        assert_eq!(params.scheme, ColorScheme::OrRd);
        assert_eq!(params.color(Some(1.0)).to_hex(), "#7f0000");
        assert_eq!(params.color(None).to_hex(), "#d3d3d3");
    }
}
