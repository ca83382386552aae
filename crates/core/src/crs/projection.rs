//! Pure-Rust map projections.
//!
//! Transverse Mercator uses the Krüger series in the third flattening
//! (Karney 2011, fourth order), good to well under a millimetre within a
//! few thousand kilometres of the central meridian. Lambert Conformal Conic
//! follows Snyder 1987 (USGS Prof. Paper 1395).
//!
//! Covers the systems used by Canadian pipeline and burn datasets:
//! geographic NAD83/WGS84, Transverse Mercator (UTM, Alberta 10-TM) and
//! Lambert Conformal Conic (Statistics Canada Lambert, Canada Atlas
//! Lambert). NAD83 and WGS84 are treated as the same datum; the
//! sub-metre shift between them is below raster resolution.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// Reference ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (m)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    /// First eccentricity squared
    pub fn e2(&self) -> f64 {
        2.0 * self.f - self.f * self.f
    }

    /// First eccentricity
    pub fn e(&self) -> f64 {
        self.e2().sqrt()
    }

    /// Third flattening
    pub fn n(&self) -> f64 {
        self.f / (2.0 - self.f)
    }
}

/// Tangent of the conformal latitude for geodetic latitude `phi` (radians)
fn conformal_tan(e: f64, phi: f64) -> f64 {
    let s = phi.sin();
    (s.atanh() - e * (e * s).atanh()).sinh()
}

/// Geodetic latitude (radians) from conformal latitude `chi`
fn geodetic_from_conformal(e: f64, chi: f64) -> f64 {
    let base = (FRAC_PI_4 + chi / 2.0).tan();
    let mut phi = chi;
    for _ in 0..15 {
        let es = e * phi.sin();
        let next = 2.0 * (base * ((1.0 + es) / (1.0 - es)).powf(e / 2.0)).atan() - FRAC_PI_2;
        let done = (next - phi).abs() < 1e-14;
        phi = next;
        if done {
            break;
        }
    }
    phi
}

/// Krüger series coefficients for one ellipsoid
struct Kruger {
    /// Rectifying radius
    radius: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
}

impl Kruger {
    fn new(el: &Ellipsoid) -> Self {
        let n = el.n();
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n2 * n2;
        Self {
            radius: el.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
                61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
                49561.0 * n4 / 161_280.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
                n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
                17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
                4397.0 * n4 / 161_280.0,
            ],
        }
    }

    /// Add (`sign = 1`) or remove (`sign = -1`) the series terms
    fn apply(coeffs: &[f64; 4], xi: f64, eta: f64, sign: f64) -> (f64, f64) {
        let (mut dxi, mut deta) = (0.0, 0.0);
        for (j, c) in coeffs.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            dxi += c * (k * xi).sin() * (k * eta).cosh();
            deta += c * (k * xi).cos() * (k * eta).sinh();
        }
        (xi + sign * dxi, eta + sign * deta)
    }
}

/// Transverse Mercator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    /// Latitude of origin (degrees)
    pub lat_0: f64,
    /// Central meridian (degrees)
    pub lon_0: f64,
    /// Scale factor on the central meridian
    pub k_0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl TransverseMercator {
    /// UTM zone on the given ellipsoid
    pub fn utm(zone: u32, north: bool, ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            lat_0: 0.0,
            lon_0: (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0,
            k_0: 0.9996,
            false_easting: 500_000.0,
            false_northing: if north { 0.0 } else { 10_000_000.0 },
        }
    }

    /// Alberta 10-TM: central meridian 115°W, scale 0.9992 on GRS80.
    /// The Forest and Resource variants differ only in false easting.
    pub fn alberta_10tm(false_easting: f64) -> Self {
        Self {
            ellipsoid: Ellipsoid::GRS80,
            lat_0: 0.0,
            lon_0: -115.0,
            k_0: 0.9992,
            false_easting,
            false_northing: 0.0,
        }
    }

    /// Rectified northing of the latitude of origin, in units of the
    /// rectifying radius
    fn origin_arc(&self, k: &Kruger) -> f64 {
        let xi_0 = conformal_tan(self.ellipsoid.e(), self.lat_0.to_radians()).atan();
        Kruger::apply(&k.alpha, xi_0, 0.0, 1.0).0
    }

    /// Geographic (degrees) to projected (metres)
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let k = Kruger::new(&self.ellipsoid);
        let lam = (lon - self.lon_0).to_radians();
        let tau = conformal_tan(self.ellipsoid.e(), lat.to_radians());

        let xi_p = tau.atan2(lam.cos());
        let eta_p = (lam.sin() / (1.0 + tau * tau).sqrt()).atanh();
        let (xi, eta) = Kruger::apply(&k.alpha, xi_p, eta_p, 1.0);

        let scale = self.k_0 * k.radius;
        (
            self.false_easting + scale * eta,
            self.false_northing + scale * (xi - self.origin_arc(&k)),
        )
    }

    /// Projected (metres) to geographic (degrees)
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let k = Kruger::new(&self.ellipsoid);
        let scale = self.k_0 * k.radius;
        let xi = (y - self.false_northing) / scale + self.origin_arc(&k);
        let eta = (x - self.false_easting) / scale;
        let (xi_p, eta_p) = Kruger::apply(&k.beta, xi, eta, -1.0);

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let lam = eta_p.sinh().atan2(xi_p.cos());
        let phi = geodetic_from_conformal(self.ellipsoid.e(), chi);

        (self.lon_0 + lam.to_degrees(), phi.to_degrees())
    }
}

/// Lambert Conformal Conic with two standard parallels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertConformalConic {
    pub ellipsoid: Ellipsoid,
    /// Latitude of origin (degrees)
    pub lat_0: f64,
    /// Central meridian (degrees)
    pub lon_0: f64,
    /// First standard parallel (degrees)
    pub lat_1: f64,
    /// Second standard parallel (degrees)
    pub lat_2: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

/// Derived cone constants, eqs. 15-8 to 15-10
struct Cone {
    n: f64,
    af: f64,
    rho_0: f64,
}

impl LambertConformalConic {
    fn m(&self, phi: f64) -> f64 {
        let e2 = self.ellipsoid.e2();
        phi.cos() / (1.0 - e2 * phi.sin().powi(2)).sqrt()
    }

    fn t(&self, phi: f64) -> f64 {
        let e = self.ellipsoid.e();
        let es = e * phi.sin();
        (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
    }

    fn cone(&self) -> Cone {
        let phi_0 = self.lat_0.to_radians();
        let phi_1 = self.lat_1.to_radians();
        let phi_2 = self.lat_2.to_radians();

        let (m1, m2) = (self.m(phi_1), self.m(phi_2));
        let (t1, t2) = (self.t(phi_1), self.t(phi_2));

        let n = if (phi_1 - phi_2).abs() < 1e-12 {
            phi_1.sin()
        } else {
            (m1.ln() - m2.ln()) / (t1.ln() - t2.ln())
        };
        let f = m1 / (n * t1.powf(n));
        let af = self.ellipsoid.a * f;
        let rho_0 = af * self.t(phi_0).powf(n);

        Cone { n, af, rho_0 }
    }

    /// Geographic (degrees) to projected (metres), eqs. 15-1 to 15-4
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let cone = self.cone();
        let phi = lat.to_radians();
        let rho = if (phi.abs() - FRAC_PI_2).abs() < 1e-12 {
            if phi * cone.n > 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            cone.af * self.t(phi).powf(cone.n)
        };

        let mut dlam = (lon - self.lon_0).to_radians();
        if dlam > std::f64::consts::PI {
            dlam -= 2.0 * std::f64::consts::PI;
        } else if dlam < -std::f64::consts::PI {
            dlam += 2.0 * std::f64::consts::PI;
        }
        let theta = cone.n * dlam;

        let x = rho * theta.sin() + self.false_easting;
        let y = cone.rho_0 - rho * theta.cos() + self.false_northing;
        (x, y)
    }

    /// Projected (metres) to geographic (degrees), eqs. 15-5 to 15-9
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let cone = self.cone();
        let e = self.ellipsoid.e();
        let sign = cone.n.signum();

        let dx = x - self.false_easting;
        let dy = cone.rho_0 - (y - self.false_northing);
        let rho = sign * (dx * dx + dy * dy).sqrt();
        let theta = (sign * dx).atan2(sign * dy);

        if rho == 0.0 {
            return (self.lon_0, sign * 90.0);
        }

        let t = (rho / cone.af).powf(1.0 / cone.n);
        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let es = e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
            let done = (next - phi).abs() < 1e-12;
            phi = next;
            if done {
                break;
            }
        }

        let lam = theta / cone.n + self.lon_0.to_radians();
        (lam.to_degrees(), phi.to_degrees())
    }
}

/// A supported map projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Longitude/latitude in degrees
    Geographic(Ellipsoid),
    TransverseMercator(TransverseMercator),
    LambertConformalConic(LambertConformalConic),
}

impl Projection {
    /// Known EPSG codes
    pub fn from_epsg(code: u32) -> Option<Self> {
        let proj = match code {
            4326 => Projection::Geographic(Ellipsoid::WGS84),
            4269 | 4617 => Projection::Geographic(Ellipsoid::GRS80),
            // NAD83 / Alberta 10-TM (Forest)
            3400 => Projection::TransverseMercator(TransverseMercator::alberta_10tm(500_000.0)),
            // NAD83 / Alberta 10-TM (Resource)
            3401 => Projection::TransverseMercator(TransverseMercator::alberta_10tm(0.0)),
            // NAD83 / Statistics Canada Lambert
            3347 => Projection::LambertConformalConic(LambertConformalConic {
                ellipsoid: Ellipsoid::GRS80,
                lat_0: 63.390675,
                lon_0: -91.866_666_666_666_7,
                lat_1: 49.0,
                lat_2: 77.0,
                false_easting: 6_200_000.0,
                false_northing: 3_000_000.0,
            }),
            // NAD83 / Canada Atlas Lambert
            3978 => Projection::LambertConformalConic(LambertConformalConic {
                ellipsoid: Ellipsoid::GRS80,
                lat_0: 49.0,
                lon_0: -95.0,
                lat_1: 49.0,
                lat_2: 77.0,
                false_easting: 0.0,
                false_northing: 0.0,
            }),
            32601..=32660 => Projection::TransverseMercator(TransverseMercator::utm(
                code - 32600,
                true,
                Ellipsoid::WGS84,
            )),
            32701..=32760 => Projection::TransverseMercator(TransverseMercator::utm(
                code - 32700,
                false,
                Ellipsoid::WGS84,
            )),
            // NAD83 / UTM zones 1N..23N
            26901..=26923 => Projection::TransverseMercator(TransverseMercator::utm(
                code - 26900,
                true,
                Ellipsoid::GRS80,
            )),
            _ => return None,
        };
        Some(proj)
    }

    /// Parse the subset of PROJ syntax covering `longlat`, `tmerc`, `utm`
    /// and `lcc` definitions.
    pub fn from_proj_str(def: &str) -> Result<Self> {
        let params: HashMap<String, Option<String>> = def
            .split_whitespace()
            .map(|tok| tok.trim_start_matches('+'))
            .filter(|tok| !tok.is_empty())
            .map(|tok| match tok.split_once('=') {
                Some((k, v)) => (k.to_ascii_lowercase(), Some(v.to_string())),
                None => (tok.to_ascii_lowercase(), None),
            })
            .collect();

        let num = |key: &str, default: f64| -> Result<f64> {
            match params.get(key) {
                Some(Some(v)) => v.parse::<f64>().map_err(|_| {
                    Error::Projection(format!("invalid value for +{}: {}", key, v))
                }),
                Some(None) => Err(Error::Projection(format!("+{} needs a value", key))),
                None => Ok(default),
            }
        };

        let ellipsoid = match params
            .get("ellps")
            .or_else(|| params.get("datum"))
            .and_then(|v| v.as_deref())
        {
            None | Some("WGS84") => Ellipsoid::WGS84,
            Some("GRS80") | Some("NAD83") => Ellipsoid::GRS80,
            Some(other) => {
                return Err(Error::Projection(format!("unsupported ellipsoid: {}", other)))
            }
        };

        let name = params
            .get("proj")
            .and_then(|v| v.as_deref())
            .ok_or_else(|| Error::Projection(format!("missing +proj in '{}'", def)))?;

        match name {
            "longlat" | "latlong" | "lonlat" | "latlon" => Ok(Projection::Geographic(ellipsoid)),
            "utm" => {
                let zone = num("zone", f64::NAN)?;
                if !(1.0..=60.0).contains(&zone) {
                    return Err(Error::Projection(format!("invalid UTM zone in '{}'", def)));
                }
                let north = !params.contains_key("south");
                Ok(Projection::TransverseMercator(TransverseMercator::utm(
                    zone as u32,
                    north,
                    ellipsoid,
                )))
            }
            "tmerc" => Ok(Projection::TransverseMercator(TransverseMercator {
                ellipsoid,
                lat_0: num("lat_0", 0.0)?,
                lon_0: num("lon_0", 0.0)?,
                k_0: num("k_0", num("k", 1.0)?)?,
                false_easting: num("x_0", 0.0)?,
                false_northing: num("y_0", 0.0)?,
            })),
            "lcc" => {
                let lat_1 = num("lat_1", f64::NAN)?;
                if lat_1.is_nan() {
                    return Err(Error::Projection(format!("+proj=lcc needs +lat_1 in '{}'", def)));
                }
                Ok(Projection::LambertConformalConic(LambertConformalConic {
                    ellipsoid,
                    lat_0: num("lat_0", lat_1)?,
                    lon_0: num("lon_0", 0.0)?,
                    lat_1,
                    lat_2: num("lat_2", lat_1)?,
                    false_easting: num("x_0", 0.0)?,
                    false_northing: num("y_0", 0.0)?,
                }))
            }
            other => Err(Error::Projection(format!("unsupported projection: {}", other))),
        }
    }

    /// Projected coordinates to geographic (lon, lat) degrees
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic(_) => (x, y),
            Projection::TransverseMercator(tm) => tm.inverse(x, y),
            Projection::LambertConformalConic(lcc) => lcc.inverse(x, y),
        }
    }

    /// Geographic (lon, lat) degrees to projected coordinates
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic(_) => (lon, lat),
            Projection::TransverseMercator(tm) => tm.forward(lon, lat),
            Projection::LambertConformalConic(lcc) => lcc.forward(lon, lat),
        }
    }
}
