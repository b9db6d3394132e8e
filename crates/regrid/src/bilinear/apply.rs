//! Applying bilinear stencils to cubed-sphere fields.

use super::coarsen::coarsen;
use super::search::{BilinearIndex, Stencil};
use super::weights::{max_weight_index, CORNER_OFFSETS};
use crate::error::{RegridError, Result};
use crate::types::{InterpOptions, TargetField};
use mosaic_grid::sphere::east_north;
use mosaic_grid::{FieldBuffer, Mosaic};
use rayon::prelude::*;
use tracing::debug;

/// Corners checked for the sentinel in legacy mode.
const LEGACY_CORNERS: [usize; 3] = [0, 1, 3];

fn check_source(index: &BilinearIndex, source: &Mosaic) -> Result<()> {
    let matches = source.ntiles() == 6
        && source
            .tiles()
            .iter()
            .all(|t| t.nx() == index.source_n && t.ny() == index.source_n);
    if matches {
        Ok(())
    } else {
        Err(RegridError::config(format!(
            "bilinear index was built for C{}, source mosaic '{}' does not match",
            index.source_n,
            source.name()
        )))
    }
}

/// One buffer per cube face, checked before any buffer is read.
fn check_faces(what: &str, fields: &[FieldBuffer]) -> Result<()> {
    if fields.len() == 6 {
        Ok(())
    } else {
        Err(RegridError::field(format!(
            "{what}: expected one buffer per cube face (6), got {}",
            fields.len()
        )))
    }
}

/// Value of one stencil.
fn apply_stencil(s: &Stencil, field: &FieldBuffer, opts: &InterpOptions) -> f64 {
    let values = CORNER_OFFSETS.map(|(di, dj)| field.halo(s.i + di, s.j + dj));
    if let Some(m) = field.missing() {
        let touches_missing = if opts.legacy_corner_check {
            LEGACY_CORNERS.iter().any(|&k| values[k] == m)
        } else {
            (0..4).any(|k| s.weights[k] != 0.0 && values[k] == m)
        };
        if touches_missing {
            return if opts.fill_missing {
                values[max_weight_index(&s.weights)]
            } else {
                m
            };
        }
    }
    (0..4)
        .filter(|&k| s.weights[k] != 0.0)
        .map(|k| s.weights[k] * values[k])
        .sum()
}

/// Interpolate halo-filled fields onto the refined node grid.
fn interpolate_fine(index: &BilinearIndex, fields: &[FieldBuffer], opts: &InterpOptions) -> Vec<f64> {
    index
        .stencils
        .par_iter()
        .map(|s| apply_stencil(s, &fields[s.tile], opts))
        .collect()
}

fn finish(index: &BilinearIndex, fine: Vec<f64>, missing: Option<f64>) -> Result<TargetField> {
    let (nlon_f, nlat_f) = index.fine_dims();
    let lats = index.grid.node_lats(index.finer_steps);
    let data = coarsen(fine, &lats, nlon_f, nlat_f, index.finer_steps, missing)?;
    Ok(TargetField {
        nx: index.grid.nlon,
        ny: index.grid.nlat,
        data,
        missing: missing.unwrap_or(mosaic_grid::DEFAULT_MISSING),
    })
}

/// Interpolate a scalar field, one buffer per cube face, to the lat/lon grid.
///
/// Halos are filled from neighbouring faces on a copy of `fields`. With
/// finer steps the refined result is coarsened back to the requested grid.
pub fn interpolate_scalar_bilinear(
    index: &BilinearIndex,
    source: &Mosaic,
    fields: &[FieldBuffer],
    opts: &InterpOptions,
) -> Result<TargetField> {
    check_source(index, source)?;
    check_faces("scalar", fields)?;
    let mut fields = fields.to_vec();
    source.update_halo(&mut fields)?;

    let missing = fields[0].missing();
    let fine = interpolate_fine(index, &fields, opts);
    debug!(nodes = fine.len(), "Interpolated scalar field bilinearly");
    finish(index, fine, missing)
}

/// Interpolate a vector field given by its eastward `u` and northward `v`
/// components on each cube face.
///
/// The vector is carried through Cartesian components, so the result does
/// not depend on how each face orients its own grid lines.
///
/// # Returns
/// `(u, v)` on the lat/lon grid, eastward and northward.
pub fn interpolate_vector_bilinear(
    index: &BilinearIndex,
    source: &Mosaic,
    u: &[FieldBuffer],
    v: &[FieldBuffer],
    opts: &InterpOptions,
) -> Result<(TargetField, TargetField)> {
    check_source(index, source)?;
    check_faces("vector u", u)?;
    check_faces("vector v", v)?;
    let mut u = u.to_vec();
    let mut v = v.to_vec();
    source.update_halo(&mut u)?;
    source.update_halo(&mut v)?;
    let missing = u[0].missing();

    // Cartesian components at every halo'd source center.
    let mut xyz: [Vec<FieldBuffer>; 3] = [u.clone(), u.clone(), u.clone()];
    for (t, tile) in source.tiles().iter().enumerate() {
        for jj in 0..tile.ny() + 2 {
            for ii in 0..tile.nx() + 2 {
                let (a, b) = (u[t].halo(ii, jj), v[t].halo(ii, jj));
                let c = tile.center_lonlat(ii, jj);
                let (east, north) = east_north(c.lon, c.lat);
                for (k, comp) in xyz.iter_mut().enumerate() {
                    let value = match missing {
                        Some(m) if a == m || b == m => m,
                        _ => a * east[k] + b * north[k],
                    };
                    comp[t].set_halo(ii, jj, value);
                }
            }
        }
    }

    let [x, y, z] = xyz.map(|comp| interpolate_fine(index, &comp, opts));

    let (nlon_f, nlat_f) = index.fine_dims();
    let lons = index.grid.node_lons(index.finer_steps);
    let lats = index.grid.node_lats(index.finer_steps);
    let mut fine_u = Vec::with_capacity(nlon_f * nlat_f);
    let mut fine_v = Vec::with_capacity(nlon_f * nlat_f);
    for (j, &lat) in lats.iter().enumerate() {
        for (i, &lon) in lons.iter().enumerate() {
            let n = j * nlon_f + i;
            let cart = [x[n], y[n], z[n]];
            match missing {
                Some(m) if cart.contains(&m) => {
                    fine_u.push(m);
                    fine_v.push(m);
                }
                _ => {
                    let (east, north) = east_north(lon, lat);
                    fine_u.push(cart[0] * east[0] + cart[1] * east[1] + cart[2] * east[2]);
                    fine_v.push(cart[0] * north[0] + cart[1] * north[1] + cart[2] * north[2]);
                }
            }
        }
    }

    debug!(nodes = fine_u.len(), "Interpolated vector field bilinearly");
    Ok((finish(index, fine_u, missing)?, finish(index, fine_v, missing)?))
}
