//! Analytic field generators.
//!
//! Functions of `(lon, lat)` in radians that can be sampled at cell centers
//! on any grid, plus a few index-based patterns. Smooth fields have known
//! interpolated values, which makes accuracy checks independent of the grid.

use std::f64::consts::PI;

/// A smooth, strictly positive field: `2 + cos²(lat)·cos(2·lon)`.
///
/// Smooth enough that second-order conservative interpolation should beat
/// first order on it.
pub fn smooth_field(lon: f64, lat: f64) -> f64 {
    2.0 + lat.cos().powi(2) * (2.0 * lon).cos()
}

/// A zonal wave with `k` crests around each latitude circle.
pub fn zonal_wave(lon: f64, lat: f64, k: i32) -> f64 {
    1.0 + lat.cos() * (k as f64 * lon).sin()
}

/// Field that is linear in latitude, from 0 at the south pole to 1 at the
/// north pole.
pub fn lat_ramp(_lon: f64, lat: f64) -> f64 {
    (lat + PI / 2.0) / PI
}

/// Solid-body rotation about the polar axis.
///
/// # Arguments
/// * `u0` - Eastward speed at the equator
///
/// # Returns
/// `(u, v)` as eastward and northward components.
pub fn solid_body_wind(u0: f64, _lon: f64, lat: f64) -> (f64, f64) {
    (u0 * lat.cos(), 0.0)
}

/// Creates interior values where cell `(i, j)` holds `j * 1000 + i`.
///
/// Row-major (`i` fastest), so `values[j * nx + i] == j * 1000 + i`.
///
/// # Example
///
/// ```
/// use test_utils::index_pattern;
///
/// let v = index_pattern(4, 3);
/// assert_eq!(v.len(), 12);
/// assert_eq!(v[1], 1.0);
/// assert_eq!(v[4], 1000.0);
/// ```
pub fn index_pattern(nx: usize, ny: usize) -> Vec<f64> {
    (0..ny)
        .flat_map(|j| (0..nx).map(move |i| (j * 1000 + i) as f64))
        .collect()
}

/// Replace every `every`-th value (starting at index `offset`) with `missing`.
pub fn with_missing(mut values: Vec<f64>, every: usize, offset: usize, missing: f64) -> Vec<f64> {
    if every == 0 {
        return values;
    }
    for v in values.iter_mut().skip(offset).step_by(every) {
        *v = missing;
    }
    values
}
