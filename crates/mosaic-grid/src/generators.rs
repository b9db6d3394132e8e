//! Synthetic mosaics: equiangular gnomonic cubed spheres and regular
//! latitude/longitude tiles.

use crate::error::{GridError, Result};
use crate::mosaic::Mosaic;
use crate::sphere::xyz_to_lonlat;
use crate::tile::TileGrid;
use nalgebra::Vector3;
use std::f64::consts::FRAC_PI_4;

/// Point on cube face `face` at gnomonic coordinates `(x, y)` in `[-1, 1]`.
///
/// Every face is oriented so that `(x, y)` increase counter-clockwise when
/// seen from outside the sphere, which keeps cell polygons counter-clockwise
/// in (lon, lat).
fn face_point(face: usize, x: f64, y: f64) -> Vector3<f64> {
    match face {
        0 => Vector3::new(1.0, x, y),
        1 => Vector3::new(-x, 1.0, y),
        2 => Vector3::new(-1.0, -x, y),
        3 => Vector3::new(x, -1.0, y),
        4 => Vector3::new(-y, x, 1.0),
        _ => Vector3::new(y, x, -1.0),
    }
}

/// Gnomonic coordinate of grid line `k` out of `n` on an equiangular face.
fn gnomonic(k: usize, n: usize) -> f64 {
    if k == 0 {
        -1.0
    } else if k == n {
        1.0
    } else {
        (-FRAC_PI_4 + k as f64 * (2.0 * FRAC_PI_4) / n as f64).tan()
    }
}

/// Build one face of a `C{n}` cubed sphere.
pub fn cubed_sphere_tile(face: usize, n: usize) -> Result<TileGrid> {
    if face > 5 {
        return Err(GridError::TileOutOfRange { index: face, count: 6 });
    }
    let mut lon = Vec::with_capacity((n + 1) * (n + 1));
    let mut lat = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        let y = gnomonic(j, n);
        for i in 0..=n {
            let x = gnomonic(i, n);
            let (lo, la) = xyz_to_lonlat(&face_point(face, x, y));
            lon.push(lo);
            lat.push(la);
        }
    }
    TileGrid::new(format!("tile{}", face + 1), n, n, lon, lat)
}

/// A six-tile `C{n}` cubed-sphere mosaic.
pub fn cubed_sphere(n: usize) -> Result<Mosaic> {
    let tiles = (0..6)
        .map(|face| cubed_sphere_tile(face, n))
        .collect::<Result<Vec<_>>>()?;
    Mosaic::new(format!("C{n}"), tiles)
}

/// A regular lat/lon tile from cell-edge bounds in degrees.
///
/// # Arguments
/// * `nlon`, `nlat` - Number of cells
/// * `west`, `east`, `south`, `north` - Outer cell edges in degrees
pub fn latlon_tile(
    name: impl Into<String>,
    nlon: usize,
    nlat: usize,
    west: f64,
    east: f64,
    south: f64,
    north: f64,
) -> Result<TileGrid> {
    let name = name.into();
    if !(east > west && north > south && south >= -90.0 && north <= 90.0) {
        return Err(GridError::invalid_tile(
            &name,
            format!("bad bounds lon {west}..{east} lat {south}..{north}"),
        ));
    }
    let dlon = (east - west) / nlon.max(1) as f64;
    let dlat = (north - south) / nlat.max(1) as f64;
    let mut lon = Vec::with_capacity((nlon + 1) * (nlat + 1));
    let mut lat = Vec::with_capacity((nlon + 1) * (nlat + 1));
    for j in 0..=nlat {
        let la = if j == nlat { north } else { south + j as f64 * dlat };
        for i in 0..=nlon {
            let lo = if i == nlon { east } else { west + i as f64 * dlon };
            lon.push(lo.to_radians());
            lat.push(la.to_radians());
        }
    }
    TileGrid::new(name, nlon, nlat, lon, lat)
}

/// A single-tile global lat/lon mosaic spanning 0..360 by -90..90.
pub fn global_latlon(nlon: usize, nlat: usize) -> Result<Mosaic> {
    let tile = latlon_tile("tile1", nlon, nlat, 0.0, 360.0, -90.0, 90.0)?;
    Mosaic::new(format!("latlon_{nlon}x{nlat}"), vec![tile])
}
