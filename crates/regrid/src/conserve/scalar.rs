//! Scalar conservative interpolation.

use super::check_fields;
use crate::error::Result;
use crate::types::{ConserveOrder, ExchangeGrid, InterpOptions, Partition, TargetField};
use crate::workers::map_jobs;
use mosaic_grid::{FieldBuffer, Mosaic};
use tracing::debug;

/// Accumulated value·area and area over one worker's sub-domain.
struct Accumulated {
    values: Vec<f64>,
    areas: Vec<f64>,
}

fn accumulate(p: &Partition, fields: &[FieldBuffer], order: ConserveOrder) -> Accumulated {
    let n = p.domain.len();
    let mut values = vec![0.0; n];
    let mut areas = vec![0.0; n];
    for e in &p.entries {
        let Some(local) = p.domain.local_index(e.target.i, e.target.j) else {
            continue;
        };
        let field = &fields[e.source.tile];
        let value = field.get(e.source.i, e.source.j);
        if field.is_missing(value) {
            continue;
        }
        let value = match (order, e.offset, field.gradient()) {
            (ConserveOrder::Second, Some((di, dj)), Some(g)) => {
                let (gx, gy) = g.at(e.source.j * field.nx() + e.source.i);
                value + gx * di + gy * dj
            }
            _ => value,
        };
        values[local] += value * e.area;
        areas[local] += e.area;
    }
    Accumulated { values, areas }
}

/// Interpolate one field per source tile onto every target tile.
///
/// # Arguments
/// * `xgrids` - Exchange grids, one per target tile
/// * `fields` - One buffer per source tile (with gradients for second order)
/// * `target` - The target mosaic, used for true cell areas
/// * `opts` - Normalization and missing-value options
///
/// # Returns
/// One `TargetField` per exchange grid. Cells without any valid overlap get
/// the source missing sentinel (or the default sentinel).
pub fn interpolate_scalar(
    xgrids: &[ExchangeGrid],
    fields: &[FieldBuffer],
    target: &Mosaic,
    opts: &InterpOptions,
) -> Result<Vec<TargetField>> {
    let missing = fields
        .first()
        .map_or(mosaic_grid::DEFAULT_MISSING, |f| f.missing_or_default());

    let mut out = Vec::with_capacity(xgrids.len());
    for xgrid in xgrids {
        check_fields(xgrid, fields, "scalar")?;
        let tile = target.tile(xgrid.target_tile)?;
        let target_areas = if opts.use_target_area {
            Some(tile.cell_areas())
        } else {
            None
        };

        let partials = map_jobs(&xgrid.partitions, |p| Ok(accumulate(p, fields, xgrid.order)))?;

        let mut data = vec![missing; xgrid.target_nx * xgrid.target_ny];
        for (p, acc) in xgrid.partitions.iter().zip(&partials) {
            let d = p.domain;
            for j in d.j_start..d.j_end {
                for i in d.i_start..d.i_end {
                    let local = (j - d.j_start) * d.nx() + (i - d.i_start);
                    let area = acc.areas[local];
                    if area > 0.0 {
                        let norm = match &target_areas {
                            Some(a) => a[j * xgrid.target_nx + i],
                            None => area,
                        };
                        data[j * xgrid.target_nx + i] = acc.values[local] / norm;
                    }
                }
            }
        }

        debug!(
            target_tile = xgrid.target_tile,
            entries = xgrid.len(),
            "Interpolated scalar field"
        );
        out.push(TargetField {
            nx: xgrid.target_nx,
            ny: xgrid.target_ny,
            data,
            missing,
        });
    }
    Ok(out)
}
