//! Conservative interpolation over exchange grids.
//!
//! Each target cell receives the area-weighted mean of the source values
//! overlapping it. Second order adds a linear correction at each overlap's
//! centroid, using the source gradient. Missing source values are skipped,
//! and a target cell that receives nothing gets the missing sentinel.

mod check;
mod gradient;
mod scalar;
mod vector;

pub use check::conservation_report;
pub use gradient::{attach_gradients, compute_gradient};
pub use scalar::interpolate_scalar;
pub use vector::interpolate_vector;

use crate::error::{RegridError, Result};
use crate::types::{ConserveOrder, ExchangeGrid};
use mosaic_grid::FieldBuffer;

/// Check that fields line up with the exchange grid's source tiles.
fn check_dims(xgrid: &ExchangeGrid, fields: &[FieldBuffer], name: &str) -> Result<()> {
    if fields.len() != xgrid.source_dims.len() {
        return Err(RegridError::field(format!(
            "{name}: {} field tiles for {} source tiles",
            fields.len(),
            xgrid.source_dims.len()
        )));
    }
    for (t, (field, &(nx, ny))) in fields.iter().zip(&xgrid.source_dims).enumerate() {
        if field.nx() != nx || field.ny() != ny {
            return Err(RegridError::field(format!(
                "{name}: tile {t} is {}x{}, source tile is {nx}x{ny}",
                field.nx(),
                field.ny()
            )));
        }
    }
    Ok(())
}

/// Check dimensions and that second order has the gradients it needs.
fn check_fields(xgrid: &ExchangeGrid, fields: &[FieldBuffer], name: &str) -> Result<()> {
    check_dims(xgrid, fields, name)?;
    if xgrid.order != ConserveOrder::Second {
        return Ok(());
    }
    for (t, field) in fields.iter().enumerate() {
        let gradient = field.gradient().ok_or_else(|| {
            RegridError::field(format!("{name}: second order needs a gradient on tile {t}"))
        })?;
        if field.missing().is_some() && gradient.mask.is_none() {
            return Err(RegridError::field(format!(
                "{name}: tile {t} declares a missing value but its gradient has no mask"
            )));
        }
    }
    Ok(())
}
