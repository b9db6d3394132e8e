//! Unit-sphere vector geometry.
//!
//! All angles are in radians and all points are unit vectors unless noted.
//! These are the primitives used by the bilinear stencil search and by the
//! contact detection between tiles.

use nalgebra::Vector3;

/// Earth radius in meters.
pub const RADIUS: f64 = 6_371_000.0;

/// Tolerance used to decide that a point sits on a pole.
pub const POLE_TOLERANCE: f64 = 1.0e-10;

/// Convert longitude/latitude to a unit vector.
#[inline]
pub fn lonlat_to_xyz(lon: f64, lat: f64) -> Vector3<f64> {
    let cos_lat = lat.cos();
    Vector3::new(cos_lat * lon.cos(), cos_lat * lon.sin(), lat.sin())
}

/// Convert a (not necessarily normalized) vector to longitude/latitude.
///
/// Longitude is returned in `(-pi, pi]`.
#[inline]
pub fn xyz_to_lonlat(v: &Vector3<f64>) -> (f64, f64) {
    let norm = v.norm();
    if norm == 0.0 {
        return (0.0, 0.0);
    }
    let z = (v.z / norm).clamp(-1.0, 1.0);
    (v.y.atan2(v.x), z.asin())
}

/// Great-circle distance between two points on the unit sphere.
///
/// The inputs are normalized before the dot product, and the cosine is
/// clamped to `[-1, 1]` so round-off never produces NaN.
pub fn great_circle_distance(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let denom = v1.norm() * v2.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (v1.dot(v2) / denom).clamp(-1.0, 1.0).acos()
}

/// Angle at `v1` between the great circles `v1 -> v2` and `v1 -> v3`.
///
/// Returns 0 when either great circle is degenerate.
pub fn spherical_angle(v1: &Vector3<f64>, v2: &Vector3<f64>, v3: &Vector3<f64>) -> f64 {
    let p = v1.cross(v2);
    let q = v1.cross(v3);
    let denom = p.norm() * q.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (p.dot(&q) / denom).clamp(-1.0, 1.0).acos()
}

/// Distance from `p` to the great circle through `v1` and `v2`.
pub fn distance_to_side(v1: &Vector3<f64>, v2: &Vector3<f64>, p: &Vector3<f64>) -> f64 {
    let side = great_circle_distance(v1, p);
    let angle = spherical_angle(v1, v2, p);
    (side.sin() * angle.sin()).clamp(-1.0, 1.0).asin()
}

/// Local east and north unit vectors at a longitude/latitude.
pub fn east_north(lon: f64, lat: f64) -> (Vector3<f64>, Vector3<f64>) {
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let east = Vector3::new(-sin_lon, cos_lon, 0.0);
    let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    (east, north)
}

/// Normalized mean of a set of unit vectors.
pub fn mean_direction<'a, I>(points: I) -> Vector3<f64>
where
    I: IntoIterator<Item = &'a Vector3<f64>>,
{
    let sum = points
        .into_iter()
        .fold(Vector3::zeros(), |acc: Vector3<f64>, p| acc + p);
    let norm = sum.norm();
    if norm == 0.0 {
        sum
    } else {
        sum / norm
    }
}
