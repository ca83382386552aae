//! Bounding-rectangle selection of features

use burnline_core::{Feature, FeatureCollection};
use geo::Intersects;
use geo_types::{Coord, Rect};

/// Keep the features whose geometry intersects the rectangle
/// `(min_x, min_y, max_x, max_y)`.
///
/// Geometries are kept whole, not clipped. Features without a geometry are
/// dropped. Order and CRS are preserved.
pub fn filter_by_bounds(fc: &FeatureCollection, bounds: (f64, f64, f64, f64)) -> FeatureCollection {
    let (min_x, min_y, max_x, max_y) = bounds;
    let rect = Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y });

    let features: Vec<Feature> = fc
        .iter()
        .filter(|f| f.geometry.as_ref().is_some_and(|g| g.intersects(&rect)))
        .cloned()
        .collect();

    tracing::debug!("bounds filter kept {} of {} features", features.len(), fc.len());
    FeatureCollection::with_crs(features, fc.crs.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnline_core::CRS;
    use geo_types::{line_string, point};

    #[test]
    fn test_filter_keeps_intersecting_whole() {
        let fc = FeatureCollection::with_crs(
            vec![
                Feature::new(line_string![(x: -5.0, y: 5.0), (x: 5.0, y: 5.0)].into())
                    .with_property("name", "crossing"),
                Feature::new(point!(x: 50.0, y: 50.0).into()).with_property("name", "outside"),
                Feature::empty().with_property("name", "no geometry"),
                Feature::new(point!(x: 10.0, y: 10.0).into()).with_property("name", "corner"),
            ],
            Some(CRS::from_epsg(3400)),
        );

        let kept = filter_by_bounds(&fc, (0.0, 0.0, 10.0, 10.0));
        let names: Vec<&str> = kept
            .iter()
            .filter_map(|f| f.get_property("name").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(names, vec!["crossing", "corner"]);
        assert_eq!(kept.crs, fc.crs);

        // not clipped
        assert_eq!(kept.features[0].geometry, fc.features[0].geometry);
    }
}
