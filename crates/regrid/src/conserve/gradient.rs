//! Gradient reconstruction for second-order conservative interpolation.
//!
//! Centred index differences over the halo'd 3×3 stencil are mapped to
//! derivatives in longitude and latitude through the local Jacobian of the
//! tile's center coordinates. The result is expressed per radian of arc:
//! `x` eastward (`∂q/∂λ / cos φ`), `y` northward (`∂q/∂φ`), matching the
//! units of exchange-grid centroid offsets.

use crate::error::Result;
use mosaic_grid::{FieldBuffer, Gradient, Mosaic, TileGrid};
use std::f64::consts::PI;

/// Jacobians with a smaller determinant give a zero gradient.
const SINGULAR_JACOBIAN: f64 = 1.0e-20;

/// Below this cos(lat) the eastward gradient is taken as zero.
const POLAR_COS: f64 = 1.0e-6;

#[inline]
fn wrap_lon(dx: f64) -> f64 {
    if dx > PI {
        dx - 2.0 * PI
    } else if dx < -PI {
        dx + 2.0 * PI
    } else {
        dx
    }
}

/// Gradient of one tile's field. The field's halo must already be filled.
///
/// When the field declares a missing sentinel the result carries a mask
/// flagging every cell with a missing value among its eight neighbours;
/// those cells get a zero gradient.
pub fn compute_gradient(tile: &TileGrid, field: &FieldBuffer) -> Gradient {
    let (nx, ny) = (tile.nx(), tile.ny());
    let mut gx = vec![0.0; nx * ny];
    let mut gy = vec![0.0; nx * ny];
    let mut mask = field.missing().map(|_| vec![false; nx * ny]);

    for j in 0..ny {
        for i in 0..nx {
            let idx = j * nx + i;
            let (ii, jj) = (i + 1, j + 1);

            if let Some(mask) = mask.as_mut() {
                let touches_missing = (jj - 1..=jj + 1)
                    .flat_map(|b| (ii - 1..=ii + 1).map(move |a| (a, b)))
                    .filter(|&(a, b)| (a, b) != (ii, jj))
                    .any(|(a, b)| field.is_missing(field.halo(a, b)));
                if touches_missing {
                    mask[idx] = true;
                    continue;
                }
            }
            if field.is_missing(field.halo(ii, jj)) {
                continue;
            }

            let east = tile.center_lonlat(ii + 1, jj);
            let west = tile.center_lonlat(ii - 1, jj);
            let north = tile.center_lonlat(ii, jj + 1);
            let south = tile.center_lonlat(ii, jj - 1);

            let dlon_i = 0.5 * wrap_lon(east.lon - west.lon);
            let dlat_i = 0.5 * (east.lat - west.lat);
            let dlon_j = 0.5 * wrap_lon(north.lon - south.lon);
            let dlat_j = 0.5 * (north.lat - south.lat);
            let dq_i = 0.5 * (field.halo(ii + 1, jj) - field.halo(ii - 1, jj));
            let dq_j = 0.5 * (field.halo(ii, jj + 1) - field.halo(ii, jj - 1));

            let det = dlon_i * dlat_j - dlat_i * dlon_j;
            if det.abs() < SINGULAR_JACOBIAN {
                continue;
            }
            let dq_dlon = (dq_i * dlat_j - dlat_i * dq_j) / det;
            let dq_dlat = (dlon_i * dq_j - dq_i * dlon_j) / det;

            let cos_lat = tile.center_lonlat(ii, jj).lat.cos();
            gx[idx] = if cos_lat > POLAR_COS { dq_dlon / cos_lat } else { 0.0 };
            gy[idx] = dq_dlat;
        }
    }

    Gradient {
        x: gx,
        y: gy,
        mask,
    }
}

/// Fill halos from neighbouring tiles and attach a gradient to every field.
pub fn attach_gradients(source: &Mosaic, fields: &mut [FieldBuffer]) -> Result<()> {
    source.update_halo(fields)?;
    for (tile, field) in source.tiles().iter().zip(fields.iter_mut()) {
        let gradient = compute_gradient(tile, field);
        field.set_gradient(gradient)?;
    }
    Ok(())
}
