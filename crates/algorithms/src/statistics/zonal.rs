//! Zonal statistics under polygons
//!
//! A cell belongs to a polygon when its centre lies inside it (even-odd
//! rule over every ring). Only the window covering the polygon's bounding
//! box is read from the raster source.

use burnline_core::io::RasterSource;
use burnline_core::{GeoTransform, Result, Window};
use geo::BoundingRect;
use geo_types::{Coord, LineString, MultiPolygon};

/// Statistics of the raster cells under one polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalRecord {
    /// Mean of valid cells
    pub mean: Option<f64>,
    /// Minimum of valid cells
    pub min: Option<f64>,
    /// Cells that are neither the sentinel nor NaN
    pub count: usize,
    /// Cells equal to the sentinel
    pub nodata: usize,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    min: Option<f64>,
    count: usize,
    nodata: usize,
    covered: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64, sentinel: f64) {
        self.covered += 1;
        if value.is_nan() {
            return;
        }
        if value == sentinel {
            self.nodata += 1;
            return;
        }
        self.sum += value;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
    }

    fn finish(self) -> Option<ZonalRecord> {
        if self.covered == 0 {
            return None;
        }
        let mean = (self.count > 0).then(|| self.sum / self.count as f64);
        Some(ZonalRecord {
            mean,
            min: if self.count > 0 { self.min } else { None },
            count: self.count,
            nodata: self.nodata,
        })
    }
}

fn rings(polygon: &MultiPolygon<f64>) -> Vec<&LineString<f64>> {
    polygon
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .collect()
}

/// x positions where the horizontal line at `y` crosses the rings, sorted
fn crossings(rings: &[&LineString<f64>], y: f64, xs: &mut Vec<f64>) {
    xs.clear();
    for ring in rings {
        for seg in ring.lines() {
            let (a, b) = (seg.start, seg.end);
            if (a.y > y) != (b.y > y) {
                xs.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
    }
    xs.sort_by(f64::total_cmp);
}

fn is_inside(xs: &[f64], x: f64) -> bool {
    xs.partition_point(|&c| c < x) % 2 == 1
}

/// Even-odd test for an arbitrary point
fn contains(rings: &[&LineString<f64>], p: Coord<f64>, xs: &mut Vec<f64>) -> bool {
    crossings(rings, p.y, xs);
    is_inside(xs, p.x)
}

fn has_rotation(t: &GeoTransform) -> bool {
    t.row_rotation != 0.0 || t.col_rotation != 0.0
}

/// Zonal statistics of one polygon.
///
/// Returns `Ok(None)` when no cell centre falls inside the polygon (which
/// includes polygons off the raster). `sentinel` marks no-data cells.
pub fn polygon_stats<S>(source: &mut S, polygon: &MultiPolygon<f64>, sentinel: f64) -> Result<Option<ZonalRecord>>
where
    S: RasterSource + ?Sized,
{
    let Some(bbox) = polygon.bounding_rect() else {
        return Ok(None);
    };
    let (rows, cols) = source.shape();
    let transform = source.transform();
    let bounds = (bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y);
    let Some(window) = Window::covering(&transform, rows, cols, bounds) else {
        return Ok(None);
    };

    let block = source.read_window(&window)?;
    let data = block.data();
    let block_transform = block.transform();
    let rings = rings(polygon);

    let mut acc = Accumulator::default();
    let mut xs = Vec::new();

    if has_rotation(block_transform) {
        for ((r, c), &value) in data.indexed_iter() {
            let (x, y) = block_transform.pixel_to_geo(c, r);
            if contains(&rings, Coord { x, y }, &mut xs) {
                acc.add(value, sentinel);
            }
        }
    } else {
        for (r, row) in data.outer_iter().enumerate() {
            let (_, y) = block_transform.pixel_to_geo(0, r);
            crossings(&rings, y, &mut xs);
            if xs.is_empty() {
                continue;
            }
            for (c, &value) in row.iter().enumerate() {
                let (x, _) = block_transform.pixel_to_geo(c, r);
                if is_inside(&xs, x) {
                    acc.add(value, sentinel);
                }
            }
        }
    }

    Ok(acc.finish())
}

/// Zonal statistics for a sequence of (possibly missing) polygons, in order
pub fn zonal_statistics<S>(
    polygons: &[Option<MultiPolygon<f64>>],
    source: &mut S,
    sentinel: f64,
) -> Result<Vec<Option<ZonalRecord>>>
where
    S: RasterSource + ?Sized,
{
    polygons
        .iter()
        .map(|p| match p {
            Some(polygon) => polygon_stats(source, polygon, sentinel),
            None => Ok(None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnline_core::io::InMemorySource;
    use burnline_core::Raster;
    use geo_types::{polygon, Polygon};

    /// 10x10 grid of 10 m cells, origin (0, 100); value = row * 10 + col
    fn grid() -> InMemorySource {
        let data: Vec<f64> = (0..100).map(|v| v as f64).collect();
        let mut raster = Raster::from_vec(data, 10, 10).unwrap();
        raster.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
        InMemorySource::new(&raster)
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        let p: Polygon<f64> = polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ];
        MultiPolygon::new(vec![p])
    }

    #[test]
    fn test_cell_centres_inside() {
        let mut src = grid();
        // centres at x = 15, 25 and y = 85, 75 -> rows 1..=2, cols 1..=2
        let rec = polygon_stats(&mut src, &square(10.0, 70.0, 30.0, 90.0), -1.0)
            .unwrap()
            .unwrap();
        assert_eq!(rec.count, 4);
        assert_eq!(rec.nodata, 0);
        assert_eq!(rec.min, Some(11.0));
        assert_eq!(rec.mean, Some((11.0 + 12.0 + 21.0 + 22.0) / 4.0));
    }

    #[test]
    fn test_hole_excludes_cells() {
        let mut src = grid();
        let outer: Polygon<f64> = polygon!(
            exterior: [(x: 0.0, y: 70.0), (x: 30.0, y: 70.0), (x: 30.0, y: 100.0), (x: 0.0, y: 100.0)],
            interiors: [[(x: 12.0, y: 82.0), (x: 18.0, y: 82.0), (x: 18.0, y: 88.0), (x: 12.0, y: 88.0)]],
        );
        let rec = polygon_stats(&mut src, &MultiPolygon::new(vec![outer]), -1.0)
            .unwrap()
            .unwrap();
        assert_eq!(rec.count, 8);
        let expected = (0 + 1 + 2 + 10 + 12 + 20 + 21 + 22) as f64 / 8.0;
        assert_eq!(rec.mean, Some(expected));
    }

    #[test]
    fn test_sentinel_counts_as_nodata() {
        let mut raster: Raster<f64> = Raster::filled(4, 4, 65535.0);
        raster.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        raster.set(0, 0, 3.0).unwrap();
        raster.set(3, 3, f64::NAN).unwrap();
        let mut src = InMemorySource::new(&raster);

        let rec = polygon_stats(&mut src, &square(0.0, 0.0, 40.0, 40.0), 65535.0)
            .unwrap()
            .unwrap();
        assert_eq!(rec.count, 1);
        assert_eq!(rec.nodata, 14);
        assert_eq!(rec.min, Some(3.0));

        let only_nodata = polygon_stats(&mut src, &square(20.0, 20.0, 30.0, 30.0), 65535.0)
            .unwrap()
            .unwrap();
        assert_eq!(only_nodata.count, 0);
        assert_eq!(only_nodata.nodata, 1);
        assert_eq!(only_nodata.mean, None);
        assert_eq!(only_nodata.min, None);
    }

    #[test]
    fn test_no_overlap_is_none() {
        let mut src = grid();
        assert!(polygon_stats(&mut src, &square(200.0, 200.0, 300.0, 300.0), -1.0)
            .unwrap()
            .is_none());
        // inside the grid but smaller than a cell and away from its centre
        assert!(polygon_stats(&mut src, &square(1.0, 91.0, 2.0, 92.0), -1.0)
            .unwrap()
            .is_none());
        assert!(polygon_stats(&mut src, &MultiPolygon::new(vec![]), -1.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rotated_transform_uses_point_tests() {
        let data: Vec<f64> = (0..16).map(|v| v as f64).collect();
        let mut raster = Raster::from_vec(data, 4, 4).unwrap();
        let mut gt = GeoTransform::new(0.0, 40.0, 10.0, -10.0);
        gt.row_rotation = 1e-9;
        raster.set_transform(gt);
        let mut src = InMemorySource::new(&raster);

        let rec = polygon_stats(&mut src, &square(0.0, 20.0, 20.0, 40.0), -1.0)
            .unwrap()
            .unwrap();
        assert_eq!(rec.count, 4);
        assert_eq!(rec.min, Some(0.0));
    }

    #[test]
    fn test_sequence_keeps_order() {
        let mut src = grid();
        let polys = vec![
            Some(square(0.0, 90.0, 10.0, 100.0)),
            None,
            Some(square(90.0, 0.0, 100.0, 10.0)),
        ];
        let out = zonal_statistics(&polys, &mut src, -1.0).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].unwrap().mean, Some(0.0));
        assert!(out[1].is_none());
        assert_eq!(out[2].unwrap().mean, Some(99.0));
    }
}
