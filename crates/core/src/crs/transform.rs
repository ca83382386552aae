//! Coordinate transformation between two CRS

use super::{Projection, CRS};
use crate::error::{Error, Result};
use geo::MapCoords;
use geo_types::{Coord, Geometry};

/// Moves coordinates from a source CRS into a target CRS.
///
/// The pure-Rust path goes through geographic coordinates:
/// source projection inverse, then target projection forward. With the
/// `proj` feature, definitions the built-in table does not know are handed
/// to libproj instead.
pub struct Transformer {
    source: CRS,
    target: CRS,
    kind: Kind,
}

enum Kind {
    Identity,
    Native { from: Projection, to: Projection },
    #[cfg(feature = "proj")]
    Proj(proj::Proj),
}

impl Transformer {
    pub fn new(source: &CRS, target: &CRS) -> Result<Self> {
        let kind = if source.is_equivalent(target) {
            Kind::Identity
        } else {
            match (source.projection(), target.projection()) {
                (Ok(from), Ok(to)) if from == to => Kind::Identity,
                (Ok(from), Ok(to)) => Kind::Native { from, to },
                #[cfg(feature = "proj")]
                _ => Kind::Proj(libproj(source, target)?),
                #[cfg(not(feature = "proj"))]
                (Err(e), _) | (_, Err(e)) => return Err(e),
            }
        };

        tracing::debug!("transformer {} -> {}", source, target);
        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            kind,
        })
    }

    pub fn source(&self) -> &CRS {
        &self.source
    }

    pub fn target(&self) -> &CRS {
        &self.target
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, Kind::Identity)
    }

    /// Transform a single coordinate pair
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let out = match &self.kind {
            Kind::Identity => (x, y),
            Kind::Native { from, to } => {
                let (lon, lat) = from.to_geographic(x, y);
                to.from_geographic(lon, lat)
            }
            #[cfg(feature = "proj")]
            Kind::Proj(p) => p
                .convert((x, y))
                .map_err(|e| Error::Projection(e.to_string()))?,
        };

        if x.is_finite() && y.is_finite() && !(out.0.is_finite() && out.1.is_finite()) {
            return Err(Error::Projection(format!(
                "({}, {}) has no image in {}",
                x, y, self.target
            )));
        }
        Ok(out)
    }

    /// Transform every vertex of a geometry
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
            let (x, y) = self.transform(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}

#[cfg(feature = "proj")]
fn libproj(source: &CRS, target: &CRS) -> Result<proj::Proj> {
    let definition = |crs: &CRS| -> String {
        if let Some(code) = crs.epsg() {
            format!("EPSG:{}", code)
        } else if let Some(p) = crs.proj() {
            p.to_string()
        } else {
            crs.wkt().unwrap_or_default().to_string()
        }
    };

    proj::Proj::new_known_crs(&definition(source), &definition(target), None)
        .map_err(|e| Error::Projection(e.to_string()))
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("source", &self.source.identifier())
            .field("target", &self.target.identifier())
            .field("identity", &self.is_identity())
            .finish()
    }
}
