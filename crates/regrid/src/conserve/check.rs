//! Global conservation check.

use crate::error::{RegridError, Result};
use crate::types::{ConservationReport, TargetField};
use crate::workers::map_jobs;
use mosaic_grid::{FieldBuffer, Mosaic};

fn source_integral(tile: &mosaic_grid::TileGrid, field: &FieldBuffer) -> f64 {
    let areas = tile.cell_areas();
    let mut sum = 0.0;
    for j in 0..tile.ny() {
        for i in 0..tile.nx() {
            let value = field.get(i, j);
            if !field.is_missing(value) {
                sum += value * areas[tile.cell_index(i, j)];
            }
        }
    }
    sum
}

fn target_integral(tile: &mosaic_grid::TileGrid, field: &TargetField) -> f64 {
    let areas = tile.cell_areas();
    field
        .data
        .iter()
        .zip(&areas)
        .filter(|(v, _)| **v != field.missing)
        .map(|(v, a)| v * a)
        .sum()
}

/// Compare `Σ value·area` over the source mosaic with the same sum over the
/// interpolated target fields. Missing values are skipped on both sides.
///
/// Per-tile partial sums are computed in parallel and added in tile order,
/// so the report does not depend on the worker count.
pub fn conservation_report(
    source: &Mosaic,
    fields: &[FieldBuffer],
    target: &Mosaic,
    outputs: &[TargetField],
) -> Result<ConservationReport> {
    if fields.len() != source.ntiles() {
        return Err(RegridError::field(format!(
            "conservation: {} field tiles for {} source tiles",
            fields.len(),
            source.ntiles()
        )));
    }
    if outputs.len() != target.ntiles() {
        return Err(RegridError::field(format!(
            "conservation: {} outputs for {} target tiles",
            outputs.len(),
            target.ntiles()
        )));
    }

    let source_pairs: Vec<(usize, &FieldBuffer)> = fields.iter().enumerate().collect();
    let inputs = map_jobs(&source_pairs, |(t, f)| {
        Ok(source_integral(source.tile(*t)?, f))
    })?;

    let target_pairs: Vec<(usize, &TargetField)> = outputs.iter().enumerate().collect();
    let outs = map_jobs(&target_pairs, |(t, f)| {
        let tile = target.tile(*t)?;
        if f.nx != tile.nx() || f.ny != tile.ny() {
            return Err(RegridError::field(format!(
                "conservation: output {t} is {}x{}, target tile is {}x{}",
                f.nx,
                f.ny,
                tile.nx(),
                tile.ny()
            )));
        }
        Ok(target_integral(tile, f))
    })?;

    Ok(ConservationReport {
        input: inputs.iter().sum(),
        output: outs.iter().sum(),
    })
}
