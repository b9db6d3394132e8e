//! Exchange grids in remap files.

use super::container::{RemapDataset, VarData};
use crate::error::{RegridError, Result};
use crate::types::{ConserveOrder, ExchangeEntry, ExchangeGrid, Partition, SourceCell, TargetCell};
use mosaic_grid::{Domain, Mosaic};

fn method_name(order: ConserveOrder) -> &'static str {
    match order {
        ConserveOrder::First => "conserve_order1",
        ConserveOrder::Second => "conserve_order2",
    }
}

/// Encode one exchange grid. Indices are stored 1-based.
pub fn encode_exchange_grid(xgrid: &ExchangeGrid) -> Result<RemapDataset> {
    let n = xgrid.len();
    let mut tile1 = Vec::with_capacity(n);
    let mut tile1_cell = Vec::with_capacity(2 * n);
    let mut tile2_cell = Vec::with_capacity(2 * n);
    let mut area = Vec::with_capacity(n);
    let mut distance = Vec::with_capacity(2 * n);

    for e in xgrid.entries() {
        tile1.push(e.source.tile as i32 + 1);
        tile1_cell.extend([e.source.i as i32 + 1, e.source.j as i32 + 1]);
        tile2_cell.extend([e.target.i as i32 + 1, e.target.j as i32 + 1]);
        area.push(e.area);
        if xgrid.order == ConserveOrder::Second {
            let (di, dj) = e.offset.ok_or_else(|| {
                RegridError::field("second-order exchange grid entry without a centroid offset")
            })?;
            distance.extend([di, dj]);
        }
    }

    let mut ds = RemapDataset::new();
    ds.add_dim("ncells", n);
    ds.add_dim("two", 2);
    ds.set_attr("method", method_name(xgrid.order));
    ds.set_attr("order", xgrid.order.as_u8() as u64);
    ds.set_attr("tile2", xgrid.target_tile as u64 + 1);
    ds.set_attr("tile2_nx", xgrid.target_nx as u64);
    ds.set_attr("tile2_ny", xgrid.target_ny as u64);
    ds.set_attr("ntiles1", xgrid.source_dims.len() as u64);
    ds.set_attr(
        "tile1_dims",
        xgrid
            .source_dims
            .iter()
            .map(|&(nx, ny)| serde_json::json!([nx, ny]))
            .collect::<Vec<_>>(),
    );
    ds.set_attr("created", chrono::Utc::now().to_rfc3339());

    ds.add_var("tile1", &["ncells"], VarData::Int(tile1))?;
    ds.add_var("tile1_cell", &["ncells", "two"], VarData::Int(tile1_cell))?;
    ds.add_var("tile2_cell", &["ncells", "two"], VarData::Int(tile2_cell))?;
    ds.add_var("xgrid_area", &["ncells"], VarData::Double(area))?;
    if xgrid.order == ConserveOrder::Second {
        ds.add_var("tile1_distance", &["ncells", "two"], VarData::Double(distance))?;
    }
    Ok(ds)
}

/// What a cached exchange grid must match.
pub struct ExchangeGridRequest<'a> {
    pub source: &'a Mosaic,
    pub target: &'a Mosaic,
    pub target_tile: usize,
    pub order: ConserveOrder,
    /// Worker sub-domains the entries are distributed over.
    pub domains: &'a [Domain],
}

/// Convert a 1-based stored index to 0-based, checking `1..=len`.
fn zero_based(value: i32, len: usize, what: &str, path: &str) -> Result<usize> {
    if value < 1 || value as usize > len {
        return Err(RegridError::cache_mismatch(
            path,
            format!("{what} index {value} outside 1..={len}"),
        ));
    }
    Ok(value as usize - 1)
}

/// Decode and validate one exchange grid against the requested grids.
pub fn decode_exchange_grid(ds: &RemapDataset, path: &str, req: &ExchangeGridRequest<'_>) -> Result<ExchangeGrid> {
    let mismatch = |reason: String| RegridError::cache_mismatch(path, reason);

    let method = ds.attr_str("method")?;
    if method != method_name(req.order) {
        return Err(mismatch(format!(
            "file holds '{method}' weights, '{}' requested",
            method_name(req.order)
        )));
    }
    let order = ConserveOrder::from_u8(ds.attr_u64("order")? as u8)
        .ok_or_else(|| RegridError::format("invalid order attribute"))?;
    if order != req.order {
        return Err(mismatch(format!("order {} does not match requested order", order.as_u8())));
    }

    let tile = req.target.tile(req.target_tile)?;
    let (nx, ny) = (ds.attr_u64("tile2_nx")? as usize, ds.attr_u64("tile2_ny")? as usize);
    if (nx, ny) != (tile.nx(), tile.ny()) {
        return Err(mismatch(format!(
            "target tile is {}x{}, cached weights are for {nx}x{ny}",
            tile.nx(),
            tile.ny()
        )));
    }
    let ntiles1 = ds.attr_u64("ntiles1")? as usize;
    if ntiles1 != req.source.ntiles() {
        return Err(mismatch(format!(
            "source has {} tiles, cached weights are for {ntiles1}",
            req.source.ntiles()
        )));
    }
    let source_dims: Vec<(usize, usize)> = req.source.tiles().iter().map(|t| (t.nx(), t.ny())).collect();
    if let Ok(cached) = ds.attr("tile1_dims") {
        let cached: Vec<(usize, usize)> = serde_json::from_value(cached.clone())?;
        if cached != source_dims {
            return Err(mismatch("source tile dimensions differ from cached weights".to_string()));
        }
    }

    let n = ds.dim("ncells")?;
    let tile1 = ds.var_i32_len("tile1", n)?;
    let tile1_cell = ds.var_i32_len("tile1_cell", 2 * n)?;
    let tile2_cell = ds.var_i32_len("tile2_cell", 2 * n)?;
    let area = ds.var_f64_len("xgrid_area", n)?;
    let distance = match order {
        ConserveOrder::Second => Some(ds.var_f64_len("tile1_distance", 2 * n)?),
        ConserveOrder::First => None,
    };

    let mut entries = Vec::with_capacity(n);
    for k in 0..n {
        let t = zero_based(tile1[k], ntiles1, "tile1", path)?;
        let (snx, sny) = source_dims[t];
        let source = SourceCell {
            tile: t,
            i: zero_based(tile1_cell[2 * k], snx, "tile1_cell i", path)?,
            j: zero_based(tile1_cell[2 * k + 1], sny, "tile1_cell j", path)?,
        };
        let target = TargetCell {
            i: zero_based(tile2_cell[2 * k], nx, "tile2_cell i", path)?,
            j: zero_based(tile2_cell[2 * k + 1], ny, "tile2_cell j", path)?,
        };
        if !(area[k] > 0.0) {
            return Err(mismatch(format!("entry {k} has non-positive area {}", area[k])));
        }
        entries.push(ExchangeEntry {
            source,
            target,
            area: area[k],
            offset: distance.map(|d| (d[2 * k], d[2 * k + 1])),
        });
    }

    let mut xgrid = ExchangeGrid {
        target_tile: req.target_tile,
        order,
        target_nx: nx,
        target_ny: ny,
        source_dims,
        partitions: vec![Partition {
            domain: Domain::full(nx, ny),
            entries,
        }],
    };
    xgrid.redistribute(req.domains);
    Ok(xgrid)
}
