//! GeoJSON reading and writing.
//!
//! Follows RFC 7946, plus the legacy named `crs` member
//! (`{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3400"}}`)
//! that desktop GIS still writes for projected data. Without a `crs`
//! member coordinates are taken as WGS84 longitude/latitude.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

type Position = Vec<f64>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Point {
        coordinates: Position,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJsonGeometry>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct GeoJsonFeature {
    #[serde(rename = "type")]
    type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedCrs {
    #[serde(rename = "type")]
    type_: String,
    properties: NamedCrsProperties,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedCrsProperties {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeoJsonCollection {
    #[serde(rename = "type")]
    type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crs: Option<NamedCrs>,
    features: Vec<GeoJsonFeature>,
}

// ── geometry conversion ──────────────────────────────────────────────────

fn coord(p: &[f64]) -> Result<Coord<f64>> {
    match p {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(Error::GeoJson(format!("position needs at least two numbers, got {:?}", p))),
    }
}

fn line(ps: &[Position]) -> Result<LineString<f64>> {
    ps.iter().map(|p| coord(p)).collect::<Result<Vec<_>>>().map(LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|r| line(r));
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(vec![]),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn to_geo(g: &GeoJsonGeometry) -> Result<Geometry<f64>> {
    let geometry = match g {
        GeoJsonGeometry::Point { coordinates } => Point::from(coord(coordinates)?).into(),
        GeoJsonGeometry::MultiPoint { coordinates } => MultiPoint::new(
            coordinates
                .iter()
                .map(|p| coord(p).map(Point::from))
                .collect::<Result<_>>()?,
        )
        .into(),
        GeoJsonGeometry::LineString { coordinates } => line(coordinates)?.into(),
        GeoJsonGeometry::MultiLineString { coordinates } => MultiLineString::new(
            coordinates.iter().map(|l| line(l)).collect::<Result<_>>()?,
        )
        .into(),
        GeoJsonGeometry::Polygon { coordinates } => polygon(coordinates)?.into(),
        GeoJsonGeometry::MultiPolygon { coordinates } => MultiPolygon::new(
            coordinates.iter().map(|p| polygon(p)).collect::<Result<_>>()?,
        )
        .into(),
        GeoJsonGeometry::GeometryCollection { geometries } => Geometry::GeometryCollection(
            GeometryCollection::new_from(geometries.iter().map(to_geo).collect::<Result<_>>()?),
        ),
    };
    Ok(geometry)
}

fn position(c: Coord<f64>) -> Position {
    vec![c.x, c.y]
}

fn ring(ls: &LineString<f64>) -> Vec<Position> {
    ls.coords().map(|c| position(*c)).collect()
}

fn rings(p: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(p.exterior())
        .chain(p.interiors())
        .map(ring)
        .collect()
}

fn from_geo(g: &Geometry<f64>) -> GeoJsonGeometry {
    match g {
        Geometry::Point(p) => GeoJsonGeometry::Point {
            coordinates: position(p.0),
        },
        Geometry::MultiPoint(mp) => GeoJsonGeometry::MultiPoint {
            coordinates: mp.iter().map(|p| position(p.0)).collect(),
        },
        Geometry::Line(l) => GeoJsonGeometry::LineString {
            coordinates: vec![position(l.start), position(l.end)],
        },
        Geometry::LineString(ls) => GeoJsonGeometry::LineString {
            coordinates: ring(ls),
        },
        Geometry::MultiLineString(mls) => GeoJsonGeometry::MultiLineString {
            coordinates: mls.iter().map(ring).collect(),
        },
        Geometry::Polygon(p) => GeoJsonGeometry::Polygon {
            coordinates: rings(p),
        },
        Geometry::MultiPolygon(mp) => GeoJsonGeometry::MultiPolygon {
            coordinates: mp.iter().map(rings).collect(),
        },
        Geometry::Rect(r) => GeoJsonGeometry::Polygon {
            coordinates: rings(&r.to_polygon()),
        },
        Geometry::Triangle(t) => GeoJsonGeometry::Polygon {
            coordinates: rings(&t.to_polygon()),
        },
        Geometry::GeometryCollection(gc) => GeoJsonGeometry::GeometryCollection {
            geometries: gc.iter().map(from_geo).collect(),
        },
    }
}

// ── attribute conversion ─────────────────────────────────────────────────

fn attribute_from_json(v: Value) -> AttributeValue {
    match v {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
        },
        Value::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(v: &AttributeValue) -> Value {
    match v {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => Value::Number((*i).into()),
        AttributeValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}

fn feature_from_json(f: GeoJsonFeature) -> Result<Feature> {
    if f.type_ != "Feature" {
        return Err(Error::GeoJson(format!("expected a Feature, found '{}'", f.type_)));
    }
    let geometry = f.geometry.as_ref().map(to_geo).transpose()?;
    let properties: BTreeMap<String, AttributeValue> = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect();
    let id = f.id.map(|v| match v {
        Value::String(s) => s,
        other => other.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

// ── public API ───────────────────────────────────────────────────────────

/// Parse a GeoJSON document: a FeatureCollection, a single Feature or a
/// bare geometry.
pub fn read_geojson_from_str(text: &str) -> Result<FeatureCollection> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::GeoJson("missing top-level \"type\"".into()))?
        .to_string();

    match kind.as_str() {
        "FeatureCollection" => {
            let fc: GeoJsonCollection = serde_json::from_value(value)?;
            let crs = match fc.crs {
                Some(named) => CRS::from_user_input(&named.properties.name)?,
                None => CRS::wgs84(),
            };
            let features = fc
                .features
                .into_iter()
                .map(feature_from_json)
                .collect::<Result<Vec<_>>>()?;
            Ok(FeatureCollection::with_crs(features, Some(crs)))
        }
        "Feature" => {
            let f: GeoJsonFeature = serde_json::from_value(value)?;
            Ok(FeatureCollection::with_crs(vec![feature_from_json(f)?], Some(CRS::wgs84())))
        }
        _ => {
            let g: GeoJsonGeometry = serde_json::from_value(value)?;
            Ok(FeatureCollection::with_crs(
                vec![Feature::new(to_geo(&g)?)],
                Some(CRS::wgs84()),
            ))
        }
    }
}

/// Read a GeoJSON file
pub fn read_geojson(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let mut text = String::new();
    std::io::Read::read_to_string(&mut BufReader::new(File::open(path)?), &mut text)?;
    let fc = read_geojson_from_str(&text)?;
    tracing::debug!("read {} features from {}", fc.len(), path.display());
    Ok(fc)
}

/// Serialize a collection as a GeoJSON FeatureCollection.
///
/// Fails when no feature has a geometry or the geometries mix point, line
/// and polygon families. A non-WGS84 EPSG CRS is recorded in the legacy
/// `crs` member.
pub fn write_geojson_to_string(fc: &FeatureCollection) -> Result<String> {
    let doc = to_document(fc)?;
    Ok(serde_json::to_string(&doc)?)
}

/// Write a collection to a GeoJSON file
pub fn write_geojson(fc: &FeatureCollection, path: impl AsRef<Path>) -> Result<()> {
    let doc = to_document(fc)?;
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &doc)?;
    writer.flush()?;
    Ok(())
}

fn to_document(fc: &FeatureCollection) -> Result<GeoJsonCollection> {
    fc.geometry_family()?;

    let crs = match &fc.crs {
        Some(crs) if !crs.is_wgs84() => match crs.ogc_urn() {
            Some(name) => Some(NamedCrs {
                type_: "name".into(),
                properties: NamedCrsProperties { name },
            }),
            None => {
                tracing::warn!("CRS {} has no EPSG code; GeoJSON written without crs member", crs);
                None
            }
        },
        _ => None,
    };

    let features = fc
        .features
        .iter()
        .map(|f| GeoJsonFeature {
            type_: "Feature".into(),
            id: f.id.clone().map(Value::String),
            geometry: f.geometry.as_ref().map(from_geo),
            properties: Some(
                f.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                    .collect(),
            ),
        })
        .collect();

    Ok(GeoJsonCollection {
        type_: "FeatureCollection".into(),
        crs,
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::line_string;
    use tempfile::TempDir;

    const PIPELINES: &str = r#"{
      "type": "FeatureCollection",
      "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3400" } },
      "features": [
        { "type": "Feature", "id": 7,
          "properties": { "LICENCE_NO": "12345", "SEGMENT": 3, "LENGTH_M": 812.5, "ACTIVE": true, "NOTE": null },
          "geometry": { "type": "LineString", "coordinates": [[500000, 6000000], [500800, 6000100, 12.5]] } },
        { "type": "Feature", "properties": { "LICENCE_NO": "999" }, "geometry": null }
      ]
    }"#;

    #[test]
    fn test_read_named_crs_and_properties() {
        let fc = read_geojson_from_str(PIPELINES).unwrap();
        assert_eq!(fc.crs.as_ref().and_then(CRS::epsg), Some(3400));
        assert_eq!(fc.len(), 2);

        let first = &fc.features[0];
        assert_eq!(first.id.as_deref(), Some("7"));
        assert_eq!(first.get_property("SEGMENT"), Some(&AttributeValue::Int(3)));
        assert_eq!(first.get_property("LENGTH_M"), Some(&AttributeValue::Float(812.5)));
        assert_eq!(first.get_property("ACTIVE"), Some(&AttributeValue::Bool(true)));
        assert_eq!(first.get_property("NOTE"), Some(&AttributeValue::Null));
        match &first.geometry {
            Some(Geometry::LineString(ls)) => {
                assert_eq!(ls.0.len(), 2);
                assert_eq!(ls.0[1], Coord { x: 500_800.0, y: 6_000_100.0 });
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(fc.features[1].geometry.is_none());
    }

    #[test]
    fn test_missing_crs_is_wgs84() {
        let fc = read_geojson_from_str(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[-113.5,53.5]}}]}"#,
        )
        .unwrap();
        assert!(fc.crs.unwrap().is_wgs84());
    }

    #[test]
    fn test_roundtrip_derived_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.geojson");

        let mut fc = FeatureCollection::with_crs(vec![], Some(CRS::from_epsg(3400)));
        fc.push(
            Feature::new(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)].into())
                .with_property("burn_mean", Some(1.5))
                .with_property("burn_exposed", 1i64)
                .with_property("burn_norm", Some(1.0)),
        );
        fc.push(
            Feature::new(line_string![(x: 0.0, y: 5.0), (x: 10.0, y: 5.0)].into())
                .with_property("burn_mean", None::<f64>)
                .with_property("burn_exposed", 0i64)
                .with_property("burn_norm", None::<f64>),
        );
        write_geojson(&fc, &path).unwrap();

        let back = read_geojson(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.crs.as_ref().and_then(CRS::epsg), Some(3400));
        assert!(matches!(back.features[0].geometry, Some(Geometry::LineString(_))));
        assert_relative_eq!(
            back.features[0].get_property("burn_mean").unwrap().as_f64().unwrap(),
            1.5
        );
        assert_eq!(back.features[0].get_property("burn_exposed").unwrap().as_i64(), Some(1));
        assert!(back.features[1].get_property("burn_norm").unwrap().is_null());
        assert_eq!(back.features[1].get_property("burn_exposed").unwrap().as_i64(), Some(0));
    }

    #[test]
    fn test_write_rejects_mixed_or_missing_geometry() {
        let mut fc = FeatureCollection::with_crs(vec![Feature::empty()], Some(CRS::wgs84()));
        assert!(write_geojson_to_string(&fc).is_err());

        fc.push(Feature::new(Point::new(1.0, 2.0).into()));
        let text = write_geojson_to_string(&fc).unwrap();
        assert!(!text.contains("\"crs\""));
        assert!(text.contains("\"geometry\":null"));

        fc.push(Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into()));
        assert!(write_geojson_to_string(&fc).is_err());
    }

    #[test]
    fn test_non_finite_float_written_as_null() {
        let fc = FeatureCollection::with_crs(
            vec![Feature::new(Point::new(1.0, 2.0).into()).with_property("v", Some(f64::NAN))],
            None,
        );
        let back = read_geojson_from_str(&write_geojson_to_string(&fc).unwrap()).unwrap();
        assert!(back.features[0].get_property("v").unwrap().is_null());
    }

    #[test]
    fn test_read_geometry_collection() {
        let fc = read_geojson_from_str(
            r#"{"type":"GeometryCollection","geometries":[
                {"type":"Point","coordinates":[1.0,2.0]},
                {"type":"LineString","coordinates":[[0,0],[3,4]]}]}"#,
        )
        .unwrap();
        assert_eq!(fc.len(), 1);
        match fc.features[0].geometry.as_ref() {
            Some(Geometry::GeometryCollection(gc)) => {
                assert_eq!(gc.len(), 2);
                assert!(matches!(gc[0], Geometry::Point(_)));
                assert!(matches!(gc[1], Geometry::LineString(_)));
            }
            other => panic!("expected a geometry collection, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_position_is_an_error() {
        let r = read_geojson_from_str(r#"{"type":"Point","coordinates":[1.0]}"#);
        assert!(r.is_err());
    }
}
