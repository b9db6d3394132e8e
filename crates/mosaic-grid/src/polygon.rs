//! Spherical polygons expressed as longitude/latitude vertex lists.
//!
//! Edges are straight lines in (lon, lat) space. Areas and centroid moments
//! integrate exactly along those edges, so they are additive over any
//! subdivision of a polygon in (lon, lat) space. Exchange-grid fragments
//! therefore sum to the area of the cells they were cut from.

use crate::sphere::{POLE_TOLERANCE, RADIUS};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

const TWO_PI: f64 = 2.0 * PI;

/// Below this latitude difference an edge is treated as a parallel.
const FLAT_EDGE: f64 = 1.0e-10;

/// A polygon vertex in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

#[inline]
fn wrap_pi(mut dx: f64) -> f64 {
    if dx > PI {
        dx -= TWO_PI;
    }
    if dx < -PI {
        dx += TWO_PI;
    }
    dx
}

#[inline]
fn is_pole(lat: f64) -> bool {
    lat.abs() >= FRAC_PI_2 - POLE_TOLERANCE
}

#[inline]
fn same_pole(a: f64, b: f64) -> bool {
    is_pole(a) && is_pole(b) && a.signum() == b.signum()
}

/// Make a polygon's longitudes continuous and centred near `tlon`.
///
/// A vertex on a pole has no meaningful longitude. Each pole vertex is
/// paired so that it can take the longitude of the vertex before it and of
/// the vertex after it (a duplicate is inserted when both neighbours are off
/// the pole, the middle one of three consecutive pole vertices is removed).
/// Longitudes are then unwrapped vertex to vertex, and the whole polygon is
/// shifted by a multiple of 2π so its mean longitude lies within π of
/// `tlon`. A ring with no pole vertex that winds once around a pole gets
/// the pole added as a cap, so the result spans 2π in longitude.
///
/// Returns the number of vertices after the fix; polygons with fewer than
/// three vertices are left untouched.
pub fn fix_lon(poly: &mut Vec<LonLat>, tlon: f64) -> usize {
    if poly.len() < 3 {
        return poly.len();
    }

    let mut i = 0;
    while i < poly.len() {
        let n = poly.len();
        if n < 3 || !is_pole(poly[i].lat) {
            i += 1;
            continue;
        }
        let prev = poly[(i + n - 1) % n].lat;
        let next = poly[(i + 1) % n].lat;
        let here = poly[i].lat;
        if same_pole(prev, here) && same_pole(next, here) {
            poly.remove(i);
        } else if !same_pole(prev, here) && !same_pole(next, here) {
            let dup = poly[i];
            poly.insert(i, dup);
            i += 2;
        } else {
            i += 1;
        }
    }

    let n = poly.len();
    if n == 0 {
        return 0;
    }
    for i in 0..n {
        if is_pole(poly[i].lat) {
            let prev = poly[(i + n - 1) % n];
            let next = poly[(i + 1) % n];
            if !same_pole(prev.lat, poly[i].lat) {
                poly[i].lon = prev.lon;
            }
            if !same_pole(next.lat, poly[i].lat) {
                poly[i].lon = next.lon;
            }
        }
    }

    for i in 1..n {
        let dx = wrap_pi(poly[i].lon - poly[i - 1].lon);
        poly[i].lon = poly[i - 1].lon + dx;
    }

    if !poly.iter().any(|p| is_pole(p.lat)) {
        let turn = poly[n - 1].lon + wrap_pi(poly[0].lon - poly[n - 1].lon) - poly[0].lon;
        if turn.abs() > PI {
            close_around_pole(poly, turn);
        }
    }

    let n = poly.len();
    let lon_sum: f64 = poly.iter().map(|p| p.lon).sum();
    let shift = lon_sum / n as f64 - tlon;
    if shift < -PI {
        poly.iter_mut().for_each(|p| p.lon += TWO_PI);
    } else if shift > PI {
        poly.iter_mut().for_each(|p| p.lon -= TWO_PI);
    }

    n
}

/// Pole vertices added along the cap edge of a ring that encloses a pole.
const CAP_SEGMENTS: usize = 4;

/// Turn an unwrapped ring whose longitudes advance by `turn` (±2π) into a
/// (lon, lat) polygon that includes the enclosed pole.
///
/// The first vertex is repeated `turn` further along, then the cap runs
/// back along the pole in steps shorter than π so edge longitudes never
/// wrap.
fn close_around_pole(poly: &mut Vec<LonLat>, turn: f64) {
    let first = poly[0];
    let mean_lat = poly.iter().map(|p| p.lat).sum::<f64>() / poly.len() as f64;
    let pole = if mean_lat >= 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 };
    poly.push(LonLat::new(first.lon + turn, first.lat));
    for k in 0..=CAP_SEGMENTS {
        let frac = (CAP_SEGMENTS - k) as f64 / CAP_SEGMENTS as f64;
        poly.push(LonLat::new(first.lon + turn * frac, pole));
    }
}

/// Area of a polygon on the sphere of radius [`RADIUS`], in m².
pub fn poly_area(poly: &[LonLat]) -> f64 {
    let n = poly.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let dx = wrap_pi(b.lon - a.lon);
        if dx == 0.0 {
            continue;
        }
        if (b.lat - a.lat).abs() < FLAT_EDGE {
            area -= dx * (0.5 * (a.lat + b.lat)).sin();
        } else {
            area += dx * (b.lat.cos() - a.lat.cos()) / (b.lat - a.lat);
        }
    }
    (area * RADIUS * RADIUS).abs()
}

/// First moment of latitude over the polygon, in m²·rad.
///
/// Dividing by [`poly_area`] yields the area-weighted mean latitude.
pub fn poly_ctrlat(poly: &[LonLat]) -> f64 {
    let n = poly.len();
    let mut ctrlat = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let dx = b.lon - a.lon;
        if dx == 0.0 {
            continue;
        }
        let dx = wrap_pi(dx);
        let (lat1, lat2) = (b.lat, a.lat);
        let hdy = 0.5 * (lat2 - lat1);
        let avg = 0.5 * (lat1 + lat2);
        if hdy.abs() < FLAT_EDGE {
            ctrlat -= dx * (2.0 * avg.cos() + lat2 * avg.sin() - lat1.cos());
        } else {
            ctrlat -=
                dx * ((hdy.sin() / hdy) * (2.0 * avg.cos() + lat2 * avg.sin()) - lat1.cos());
        }
    }
    ctrlat * RADIUS * RADIUS
}

/// First moment of the eastward arc offset from `clon`, in m²·rad.
///
/// The integrand is `(lon - clon) * cos(lat)`, so dividing by [`poly_area`]
/// gives an eastward offset measured along the sphere rather than in raw
/// longitude.
pub fn poly_ctrlon(poly: &[LonLat], clon: f64) -> f64 {
    let n = poly.len();
    let mut ctrlon = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let (phi1, phi2) = (b.lon, a.lon);
        let (lat1, lat2) = (b.lat, a.lat);
        let dphi = phi1 - phi2;
        if dphi == 0.0 {
            continue;
        }
        let f1 = 0.5 * (lat1.cos() * lat1.sin() + lat1);
        let f2 = 0.5 * (lat2.cos() * lat2.sin() + lat2);

        let dphi = wrap_pi(dphi);
        let dphi1 = wrap_pi(phi1 - clon);
        let dphi2 = wrap_pi(phi2 - clon);

        if (dphi2 - dphi1).abs() < PI {
            ctrlon -= dphi * (dphi1 * f1 + dphi2 * f2) / 2.0;
        } else {
            // Edge crosses the branch cut opposite clon.
            let fac = if dphi1 > 0.0 { PI } else { -PI };
            let fint = f1 + (f2 - f1) * (fac - dphi1) / dphi.abs();
            ctrlon -= 0.5 * dphi1 * (dphi1 - fac) * f1 - 0.5 * dphi2 * (dphi2 + fac) * f2
                + 0.5 * fac * (dphi1 + dphi2) * fint;
        }
    }
    ctrlon * RADIUS * RADIUS
}

/// Mean longitude of a polygon's vertices.
pub fn mean_lon(poly: &[LonLat]) -> f64 {
    if poly.is_empty() {
        return 0.0;
    }
    poly.iter().map(|p| p.lon).sum::<f64>() / poly.len() as f64
}
