//! Buffer operations
//!
//! Round-cap, round-join buffers built from simple pieces: a circle per
//! point, a capsule (convex hull of two end circles) per line segment, and
//! the polygon itself for areal input. The pieces are merged with a
//! balanced pairwise union.

use burnline_core::{Algorithm, Error, Feature, FeatureCollection, Result};
use geo::{BooleanOps, ConvexHull, CoordsIter};
use geo_types::{Coord, Geometry, LineString, MultiPoint, MultiPolygon, Point, Polygon};
use std::f64::consts::PI;

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer distance in CRS units (negative shrinks polygons)
    pub distance: f64,
    /// Number of segments approximating a full circle (minimum 4)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 500.0,
            segments: 32,
        }
    }
}

impl BufferParams {
    pub fn new(distance: f64, segments: usize) -> Self {
        Self { distance, segments }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.distance.is_finite() {
            return Err(Error::InvalidParameter {
                name: "distance",
                value: self.distance.to_string(),
                reason: "must be finite".into(),
            });
        }
        if self.segments < 4 {
            return Err(Error::InvalidParameter {
                name: "segments",
                value: self.segments.to_string(),
                reason: "at least 4 segments are needed to approximate a circle".into(),
            });
        }
        Ok(())
    }
}

fn circle_coords(center: Coord<f64>, r: f64, n: usize) -> impl Iterator<Item = Coord<f64>> {
    (0..n).map(move |i| {
        let angle = 2.0 * PI * i as f64 / n as f64;
        Coord {
            x: center.x + r * angle.cos(),
            y: center.y + r * angle.sin(),
        }
    })
}

/// Create a circular buffer around a point.
///
/// The ring has `segments` vertices plus the closing one.
pub fn buffer_points(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let mut coords: Vec<Coord<f64>> = circle_coords(point.0, r, n).collect();
    coords.push(coords[0]);
    Polygon::new(LineString::new(coords), vec![])
}

/// Stadium shape around the segment `a`-`b`
fn capsule(a: Coord<f64>, b: Coord<f64>, r: f64, n: usize) -> Polygon<f64> {
    let points: Vec<Point<f64>> = circle_coords(a, r, n)
        .chain(circle_coords(b, r, n))
        .map(Point::from)
        .collect();
    MultiPoint::new(points).convex_hull()
}

/// Capsules along every segment of a path; a path that never moves
/// collapses to one circle.
fn path_pieces(ls: &LineString<f64>, r: f64, n: usize, out: &mut Vec<Polygon<f64>>) {
    let coords = &ls.0;
    match coords.len() {
        0 => {}
        1 => out.push(buffer_points(&Point::from(coords[0]), &BufferParams::new(r, n))),
        _ => {
            let before = out.len();
            for w in coords.windows(2) {
                if w[0] != w[1] {
                    out.push(capsule(w[0], w[1], r, n));
                }
            }
            if out.len() == before {
                out.push(buffer_points(&Point::from(coords[0]), &BufferParams::new(r, n)));
            }
        }
    }
}

fn ring_pieces(p: &Polygon<f64>, r: f64, n: usize, out: &mut Vec<Polygon<f64>>) {
    path_pieces(p.exterior(), r, n, out);
    for interior in p.interiors() {
        path_pieces(interior, r, n, out);
    }
}

/// Balanced pairwise union; keeps operand sizes similar so each boolean
/// operation stays small.
pub fn union_all(pieces: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut layer: Vec<MultiPolygon<f64>> =
        pieces.into_iter().map(|p| MultiPolygon::new(vec![p])).collect();

    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2 + 1);
        let mut iter = layer.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        layer = next;
    }

    layer.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

fn has_area(p: &Polygon<f64>) -> bool {
    p.exterior().0.len() >= 4
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| collect_polygons(g, out)),
        _ => {}
    }
}

fn collect_pieces(geometry: &Geometry<f64>, r: f64, n: usize, out: &mut Vec<Polygon<f64>>) {
    let params = BufferParams::new(r, n);
    match geometry {
        Geometry::Point(p) => out.push(buffer_points(p, &params)),
        Geometry::MultiPoint(mp) => out.extend(mp.iter().map(|p| buffer_points(p, &params))),
        Geometry::Line(l) => path_pieces(&LineString::new(vec![l.start, l.end]), r, n, out),
        Geometry::LineString(ls) => path_pieces(ls, r, n, out),
        Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| path_pieces(ls, r, n, out)),
        Geometry::Polygon(p) => {
            if has_area(p) {
                out.push(p.clone());
            }
            ring_pieces(p, r, n, out);
        }
        Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| {
            collect_pieces(&Geometry::Polygon(p.clone()), r, n, out)
        }),
        Geometry::Rect(rect) => collect_pieces(&Geometry::Polygon(rect.to_polygon()), r, n, out),
        Geometry::Triangle(t) => collect_pieces(&Geometry::Polygon(t.to_polygon()), r, n, out),
        Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| collect_pieces(g, r, n, out)),
    }
}

/// Buffer one geometry.
///
/// Returns `None` for empty geometry, non-finite coordinates, a zero or
/// negative distance on non-areal input, or a polygon shrunk away entirely.
pub fn buffer_geometry(geometry: &Geometry<f64>, params: &BufferParams) -> Option<MultiPolygon<f64>> {
    let n = params.segments.max(4);
    let d = params.distance;

    if !d.is_finite() || geometry.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return None;
    }

    let mut areal = Vec::new();
    collect_polygons(geometry, &mut areal);
    areal.retain(has_area);

    let result = if d > 0.0 {
        let mut pieces = Vec::new();
        collect_pieces(geometry, d, n, &mut pieces);
        union_all(pieces)
    } else if areal.is_empty() {
        return None;
    } else if d == 0.0 {
        union_all(areal)
    } else {
        let mut rims = Vec::new();
        for p in &areal {
            ring_pieces(p, -d, n, &mut rims);
        }
        union_all(areal).difference(&union_all(rims))
    };

    (!result.0.is_empty()).then_some(result)
}

/// Buffer every feature, one output per input in the same order
pub fn buffer_features(fc: &FeatureCollection, params: &BufferParams) -> Vec<Option<MultiPolygon<f64>>> {
    fc.iter()
        .map(|f: &Feature| f.geometry.as_ref().and_then(|g| buffer_geometry(g, params)))
        .collect()
}

/// Exposure buffer generation
#[derive(Debug, Clone, Default)]
pub struct Buffer;

impl Algorithm for Buffer {
    type Input = FeatureCollection;
    type Output = Vec<Option<MultiPolygon<f64>>>;
    type Params = BufferParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Buffer"
    }

    fn description(&self) -> &'static str {
        "Expand each feature geometry by a fixed distance into an exposure polygon"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        params.validate()?;
        Ok(buffer_features(&input, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use geo_types::{line_string, point, polygon};

    fn relative_error(actual: f64, expected: f64) -> f64 {
        (actual - expected).abs() / expected
    }

    #[test]
    fn test_buffer_point_circle() {
        let polygon = buffer_points(&Point::new(0.0, 0.0), &BufferParams::new(10.0, 64));
        let expected = PI * 100.0;
        let error = relative_error(polygon.unsigned_area(), expected);
        assert!(error < 0.01, "circle area error {:.2}%", error * 100.0);
        assert_eq!(polygon.exterior().0.len(), 65);
    }

    #[test]
    fn test_segment_buffer_area() {
        let d = 500.0;
        let len = 2_000.0;
        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: len, y: 0.0)].into();

        let buffer = buffer_geometry(&line, &BufferParams::new(d, 64)).unwrap();
        let expected = 2.0 * d * len + PI * d * d;
        let error = relative_error(buffer.unsigned_area(), expected);
        assert!(error < 0.01, "capsule area error {:.2}%", error * 100.0);
    }

    #[test]
    fn test_bent_line_is_unioned() {
        let d = 100.0;
        let line: Geometry<f64> =
            line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0), (x: 1000.0, y: 1000.0)].into();
        let buffer = buffer_geometry(&line, &BufferParams::new(d, 32)).unwrap();

        let single = 2.0 * d * 1000.0 + PI * d * d;
        let area = buffer.unsigned_area();
        assert!(area > single);
        assert!(area < 2.0 * single);
        assert_eq!(buffer.0.len(), 1);
    }

    #[test]
    fn test_polygon_grows_and_shrinks() {
        let square: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 100.0, y: 0.0),
            (x: 100.0, y: 100.0),
            (x: 0.0, y: 100.0),
        ]
        .into();

        let grown = buffer_geometry(&square, &BufferParams::new(10.0, 64)).unwrap();
        let expected = 100.0 * 100.0 + 4.0 * 100.0 * 10.0 + PI * 100.0;
        assert!(relative_error(grown.unsigned_area(), expected) < 0.01);

        let same = buffer_geometry(&square, &BufferParams::new(0.0, 32)).unwrap();
        assert!(relative_error(same.unsigned_area(), 10_000.0) < 1e-9);

        let shrunk = buffer_geometry(&square, &BufferParams::new(-10.0, 64)).unwrap();
        assert!(relative_error(shrunk.unsigned_area(), 80.0 * 80.0) < 0.01);

        assert!(buffer_geometry(&square, &BufferParams::new(-60.0, 32)).is_none());
    }

    #[test]
    fn test_null_cases() {
        let params = BufferParams::default();
        let empty: Geometry<f64> = LineString::new(vec![]).into();
        assert!(buffer_geometry(&empty, &params).is_none());

        let bad: Geometry<f64> = point!(x: f64::NAN, y: 0.0).into();
        assert!(buffer_geometry(&bad, &params).is_none());

        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into();
        assert!(buffer_geometry(&line, &BufferParams::new(0.0, 32)).is_none());
        assert!(buffer_geometry(&line, &BufferParams::new(-5.0, 32)).is_none());
    }

    #[test]
    fn test_degenerate_line_becomes_circle() {
        let line: Geometry<f64> = line_string![(x: 5.0, y: 5.0), (x: 5.0, y: 5.0)].into();
        let buffer = buffer_geometry(&line, &BufferParams::new(1.0, 64)).unwrap();
        assert!(relative_error(buffer.unsigned_area(), PI) < 0.01);
    }

    #[test]
    fn test_buffer_features_keeps_order_and_length() {
        let fc = FeatureCollection::with_crs(
            vec![
                Feature::new(point!(x: 0.0, y: 0.0).into()),
                Feature::empty(),
                Feature::new(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)].into()),
            ],
            None,
        );
        let out = Buffer.execute(fc, BufferParams::new(1.0, 16)).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out[0].is_some());
        assert!(out[1].is_none());
        assert!(out[2].is_some());
    }

    #[test]
    fn test_invalid_segments_rejected() {
        let r = Buffer.execute(FeatureCollection::new(), BufferParams::new(1.0, 2));
        assert!(r.is_err());
    }
}
