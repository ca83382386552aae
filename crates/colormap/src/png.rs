//! SVG rasterization and file output

use crate::error::{RenderError, Result};
use crate::map::POINTS_PER_INCH;
use std::path::Path;

/// Rasterize an SVG document (in points) to PNG bytes at `dpi`.
///
/// Text uses the fonts installed on the system; if none are found the
/// labels are left out but the drawing is still produced.
pub fn svg_to_png(svg: &str, dpi: u32) -> Result<Vec<u8>> {
    if dpi == 0 {
        return Err(RenderError::Layout("dpi must be positive".into()));
    }

    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt).map_err(|e| RenderError::Svg(e.to_string()))?;

    let scale = dpi as f32 / POINTS_PER_INCH as f32;
    let size = tree.size();
    let w = (size.width() * scale).round() as u32;
    let h = (size.height() * scale).round() as u32;
    tracing::debug!("Rasterizing {}x{} pt map to {}x{} px", size.width(), size.height(), w, h);

    let mut pixmap =
        tiny_skia::Pixmap::new(w, h).ok_or_else(|| RenderError::Png(format!("cannot allocate a {w}x{h} pixmap")))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap.encode_png().map_err(|e| RenderError::Png(e.to_string()))
}

/// Rasterize and write a PNG file.
pub fn save_png(svg: &str, dpi: u32, path: impl AsRef<Path>) -> Result<()> {
    let bytes = svg_to_png(svg, dpi)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Write the SVG document as-is.
pub fn save_svg(svg: &str, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, svg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="72" height="36" viewBox="0 0 72 36">
<rect x="0" y="0" width="36" height="36" fill="#7f0000" />
</svg>"##;

    #[test]
    fn pixel_size_follows_dpi() {
        let png = svg_to_png(SQUARE, 144).unwrap();
        let pixmap = tiny_skia::Pixmap::decode_png(&png).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (144, 72));

        // left half painted, right half left white
        let left = pixmap.pixel(10, 10).unwrap();
        assert_eq!((left.red(), left.green(), left.blue()), (127, 0, 0));
        let right = pixmap.pixel(130, 60).unwrap();
        assert_eq!((right.red(), right.green(), right.blue()), (255, 255, 255));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(svg_to_png("not svg", 72), Err(RenderError::Svg(_))));
        assert!(matches!(svg_to_png(SQUARE, 0), Err(RenderError::Layout(_))));
    }

    #[test]
    fn writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("map.png");
        let svg = dir.path().join("map.svg");
        save_png(SQUARE, 72, &png).unwrap();
        save_svg(SQUARE, &svg).unwrap();

        let bytes = std::fs::read(&png).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(std::fs::read_to_string(&svg).unwrap(), SQUARE);
    }
}
