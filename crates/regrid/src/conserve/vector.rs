//! Vector conservative interpolation.
//!
//! Components are rotated from each source tile's local frame to the
//! geographic frame, averaged independently with first-order weights, and
//! rotated into each target tile's local frame. A sample is missing when
//! either component is.

use super::check_dims;
use crate::error::{RegridError, Result};
use crate::types::{ExchangeGrid, InterpOptions, Partition, TargetField};
use crate::workers::map_jobs;
use mosaic_grid::{FieldBuffer, Mosaic};

/// Geographic components of one source tile, with `None` where missing.
fn geographic_components(
    source: &Mosaic,
    tile: usize,
    u: &FieldBuffer,
    v: &FieldBuffer,
) -> Result<Vec<Option<(f64, f64)>>> {
    let grid = source.tile(tile)?;
    let rotation = grid.rotation();
    let mut out = Vec::with_capacity(grid.ncells());
    for j in 0..grid.ny() {
        for i in 0..grid.nx() {
            let (a, b) = (u.get(i, j), v.get(i, j));
            if u.is_missing(a) || v.is_missing(b) {
                out.push(None);
                continue;
            }
            let rotated = match rotation {
                Some(r) => {
                    let (cos, sin) = r.at(grid.cell_index(i, j));
                    (a * cos - b * sin, a * sin + b * cos)
                }
                None => (a, b),
            };
            out.push(Some(rotated));
        }
    }
    Ok(out)
}

struct Accumulated {
    u: Vec<f64>,
    v: Vec<f64>,
    areas: Vec<f64>,
}

fn accumulate(p: &Partition, samples: &[Vec<Option<(f64, f64)>>], dims: &[(usize, usize)]) -> Accumulated {
    let n = p.domain.len();
    let mut acc = Accumulated {
        u: vec![0.0; n],
        v: vec![0.0; n],
        areas: vec![0.0; n],
    };
    for e in &p.entries {
        let Some(local) = p.domain.local_index(e.target.i, e.target.j) else {
            continue;
        };
        let nx = dims[e.source.tile].0;
        let Some((a, b)) = samples[e.source.tile][e.source.j * nx + e.source.i] else {
            continue;
        };
        acc.u[local] += a * e.area;
        acc.v[local] += b * e.area;
        acc.areas[local] += e.area;
    }
    acc
}

/// Interpolate a vector field `(u, v)`, one buffer pair per source tile.
///
/// # Returns
/// `(u, v)` target fields, one per exchange grid, in each target tile's
/// local frame.
pub fn interpolate_vector(
    xgrids: &[ExchangeGrid],
    u: &[FieldBuffer],
    v: &[FieldBuffer],
    source: &Mosaic,
    target: &Mosaic,
    opts: &InterpOptions,
) -> Result<(Vec<TargetField>, Vec<TargetField>)> {
    if u.len() != v.len() {
        return Err(RegridError::field(format!(
            "vector: {} u tiles but {} v tiles",
            u.len(),
            v.len()
        )));
    }
    if u.len() != source.ntiles() {
        return Err(RegridError::field(format!(
            "vector: {} field tiles for {} source tiles",
            u.len(),
            source.ntiles()
        )));
    }
    let missing = u.first().map_or(mosaic_grid::DEFAULT_MISSING, |f| f.missing_or_default());

    let samples: Vec<Vec<Option<(f64, f64)>>> = (0..source.ntiles())
        .map(|t| geographic_components(source, t, &u[t], &v[t]))
        .collect::<Result<_>>()?;

    let mut out_u = Vec::with_capacity(xgrids.len());
    let mut out_v = Vec::with_capacity(xgrids.len());
    for xgrid in xgrids {
        check_dims(xgrid, u, "vector u")?;
        check_dims(xgrid, v, "vector v")?;

        let tile = target.tile(xgrid.target_tile)?;
        let target_areas = if opts.use_target_area {
            Some(tile.cell_areas())
        } else {
            None
        };
        let partials = map_jobs(&xgrid.partitions, |p| Ok(accumulate(p, &samples, &xgrid.source_dims)))?;

        let n = xgrid.target_nx * xgrid.target_ny;
        let mut du = vec![missing; n];
        let mut dv = vec![missing; n];
        for (p, acc) in xgrid.partitions.iter().zip(&partials) {
            let d = p.domain;
            for j in d.j_start..d.j_end {
                for i in d.i_start..d.i_end {
                    let local = (j - d.j_start) * d.nx() + (i - d.i_start);
                    let area = acc.areas[local];
                    if area <= 0.0 {
                        continue;
                    }
                    let idx = j * xgrid.target_nx + i;
                    let norm = target_areas.as_ref().map_or(area, |a| a[idx]);
                    let (x, y) = (acc.u[local] / norm, acc.v[local] / norm);
                    let (a, b) = match tile.rotation() {
                        Some(r) => {
                            let (cos, sin) = r.at(idx);
                            (x * cos + y * sin, -x * sin + y * cos)
                        }
                        None => (x, y),
                    };
                    du[idx] = a;
                    dv[idx] = b;
                }
            }
        }
        out_u.push(TargetField {
            nx: xgrid.target_nx,
            ny: xgrid.target_ny,
            data: du,
            missing,
        });
        out_v.push(TargetField {
            nx: xgrid.target_nx,
            ny: xgrid.target_ny,
            data: dv,
            missing,
        });
    }
    Ok((out_u, out_v))
}
