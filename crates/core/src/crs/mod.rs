//! Coordinate Reference System handling
//!
//! A [`CRS`] is a lightweight identifier (EPSG code, WKT or PROJ string).
//! [`Projection`] turns the subset of definitions used by burn and pipeline
//! datasets in western Canada into pure-Rust map projections, and
//! [`Transformer`] chains two of them to move coordinates between systems.

mod projection;
mod transform;

pub use projection::{Ellipsoid, LambertConformalConic, Projection, TransverseMercator};
pub use transform::Transformer;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string.
    ///
    /// The EPSG code is picked up from the outermost `AUTHORITY["EPSG",..]`
    /// or `ID["EPSG",..]` clause when present.
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        let wkt = wkt.into();
        let epsg = epsg_from_wkt(&wkt);
        Self {
            wkt: Some(wkt),
            epsg,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// Parse user input: `EPSG:3347`, an OGC URN, a PROJ string or WKT.
    pub fn from_user_input(input: &str) -> Result<Self> {
        let s = input.trim();
        if s.is_empty() {
            return Err(Error::UnsupportedCrs("empty CRS definition".into()));
        }

        if let Some(code) = parse_authority_code(s) {
            return Ok(Self::from_epsg(code));
        }
        if s.starts_with('+') || s.contains("+proj=") {
            return Ok(Self::from_proj(s));
        }
        if s.contains('[') {
            return Ok(Self::from_wkt(s));
        }
        Err(Error::UnsupportedCrs(s.to_string()))
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether this is WGS84 longitude/latitude
    pub fn is_wgs84(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return normalize_proj(a) == normalize_proj(b);
        }

        false
    }

    /// Resolve to a pure-Rust projection
    pub fn projection(&self) -> Result<Projection> {
        if let Some(code) = self.epsg {
            if let Some(p) = Projection::from_epsg(code) {
                return Ok(p);
            }
        }
        if let Some(proj) = &self.proj {
            return Projection::from_proj_str(proj);
        }
        Err(Error::UnsupportedCrs(self.identifier()))
    }

    /// OGC URN used by the legacy GeoJSON `crs` member
    pub fn ogc_urn(&self) -> Option<String> {
        self.epsg.map(|code| format!("urn:ogc:def:crs:EPSG::{}", code))
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// `EPSG:1234`, `epsg:1234`, `urn:ogc:def:crs:EPSG::1234`, `urn:ogc:def:crs:OGC:1.3:CRS84`
fn parse_authority_code(s: &str) -> Option<u32> {
    let upper = s.to_ascii_uppercase();
    if upper.ends_with("CRS84") {
        return Some(4326);
    }
    if let Some(rest) = upper.strip_prefix("EPSG:") {
        return rest.trim().parse().ok();
    }
    if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
        return upper.rsplit(':').next().and_then(|c| c.parse().ok());
    }
    None
}

/// Outermost EPSG authority in a WKT1 (`AUTHORITY["EPSG","3400"]`) or
/// WKT2 (`ID["EPSG",3400]`) string. The last clause belongs to the root.
fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let positions = ["AUTHORITY[\"EPSG\"", "ID[\"EPSG\""];
    let start = positions
        .iter()
        .filter_map(|needle| upper.rfind(needle).map(|p| p + needle.len()))
        .max()?;

    let digits: String = upper[start..]
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn normalize_proj(s: &str) -> Vec<String> {
    let mut parts: Vec<String> = s.split_whitespace().map(|p| p.to_ascii_lowercase()).collect();
    parts.sort();
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(3400);
        assert_eq!(crs.epsg(), Some(3400));
        assert_eq!(crs.identifier(), "EPSG:3400");
        assert_eq!(crs.ogc_urn().unwrap(), "urn:ogc:def:crs:EPSG::3400");
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(3347)));
    }

    #[test]
    fn test_from_user_input() {
        assert_eq!(CRS::from_user_input("EPSG:3347").unwrap().epsg(), Some(3347));
        assert_eq!(
            CRS::from_user_input("urn:ogc:def:crs:EPSG::3400").unwrap().epsg(),
            Some(3400)
        );
        assert_eq!(
            CRS::from_user_input("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap().epsg(),
            Some(4326)
        );
        let proj = CRS::from_user_input("+proj=lcc +lat_1=49 +lat_2=77").unwrap();
        assert!(proj.proj().is_some());
        assert!(CRS::from_user_input("   ").is_err());
    }

    #[test]
    fn test_epsg_from_wkt_uses_root_authority() {
        let wkt = r#"PROJCS["NAD83 / Alberta 10-TM (Forest)",GEOGCS["NAD83",AUTHORITY["EPSG","4269"]],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","3400"]]"#;
        let crs = CRS::from_wkt(wkt);
        assert_eq!(crs.epsg(), Some(3400));
    }

    #[test]
    fn test_proj_string_equivalence_ignores_order() {
        let a = CRS::from_proj("+proj=tmerc +lon_0=-115 +k=0.9992");
        let b = CRS::from_proj("+k=0.9992 +proj=tmerc +lon_0=-115");
        assert!(a.is_equivalent(&b));
    }
}
