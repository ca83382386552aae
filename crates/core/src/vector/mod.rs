//! Vector data structures: features with attributes, and collections of them

use crate::crs::{Transformer, CRS};
use crate::error::{Error, Result};
use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Loose comparison against a code string: "48" matches both
    /// `String("48")` and `Int(48)`.
    pub fn matches_code(&self, code: &str) -> bool {
        match self {
            AttributeValue::String(s) => s.trim() == code.trim(),
            AttributeValue::Int(v) => code.trim().parse::<i64>().ok() == Some(*v),
            AttributeValue::Float(v) => code.trim().parse::<f64>().ok() == Some(*v),
            _ => false,
        }
    }
}

impl From<Option<f64>> for AttributeValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(AttributeValue::Null, AttributeValue::Float)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// Coarse geometry family used to validate output layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryFamily {
    Point,
    Line,
    Polygon,
    Mixed,
}

impl GeometryFamily {
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryFamily::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                GeometryFamily::Line
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => GeometryFamily::Polygon,
            Geometry::GeometryCollection(gc) => {
                let mut families = gc.iter().map(GeometryFamily::of);
                match families.next() {
                    Some(first) if families.all(|f| f == first) => first,
                    _ => GeometryFamily::Mixed,
                }
            }
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, kept in key order
    pub properties: BTreeMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: BTreeMap::new(),
            id: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value.into());
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Bounding rectangle of the geometry, if any
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.as_ref().and_then(|g| g.bounding_rect())
    }
}

/// Collection of features sharing one CRS
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            crs: None,
        }
    }

    pub fn with_crs(features: Vec<Feature>, crs: Option<CRS>) -> Self {
        Self { features, crs }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Union of all feature bounding rectangles
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(Feature::bounding_rect)
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
    }

    /// Single geometry family shared by every present geometry.
    ///
    /// Errors when all geometries are missing or the families differ.
    pub fn geometry_family(&self) -> Result<GeometryFamily> {
        let mut family = None;
        for geometry in self.features.iter().filter_map(|f| f.geometry.as_ref()) {
            let this = GeometryFamily::of(geometry);
            match family {
                None => family = Some(this),
                Some(f) if f == this && f != GeometryFamily::Mixed => {}
                Some(f) => {
                    return Err(Error::InvalidGeometry(format!(
                        "mixed geometry families in one layer: {:?} and {:?}",
                        f, this
                    )))
                }
            }
        }
        match family {
            Some(GeometryFamily::Mixed) => Err(Error::InvalidGeometry(
                "geometry collection mixes geometry families".into(),
            )),
            Some(f) => Ok(f),
            None => Err(Error::InvalidGeometry("every feature lacks a geometry".into())),
        }
    }

    /// Reproject every geometry into `target`.
    ///
    /// Attributes, ids and feature order are untouched.
    pub fn reproject(&self, target: &CRS) -> Result<FeatureCollection> {
        let source = self
            .crs
            .as_ref()
            .ok_or_else(|| Error::MissingCrs("feature collection".into()))?;
        let transformer = Transformer::new(source, target)?;

        let features = self
            .features
            .iter()
            .map(|f| {
                let geometry = f
                    .geometry
                    .as_ref()
                    .map(|g| transformer.transform_geometry(g))
                    .transpose()?;
                Ok(Feature {
                    geometry,
                    properties: f.properties.clone(),
                    id: f.id.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureCollection::with_crs(features, Some(target.clone())))
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}
