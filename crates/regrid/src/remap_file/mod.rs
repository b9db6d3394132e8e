//! Remap-weight cache files.
//!
//! Conservative weights are written one file per target tile; with more than
//! one target tile the file name gains a `.tileN` suffix before its
//! extension. Bilinear weights always go to a single file. Reading checks the
//! cached weights against the requested grids and fails on any mismatch.

mod bilinear;
pub mod container;
mod conserve;

pub use bilinear::{decode_bilinear, encode_bilinear};
pub use container::{RemapDataset, VarData, Variable};
pub use conserve::{decode_exchange_grid, encode_exchange_grid, ExchangeGridRequest};

use crate::bilinear::{BilinearIndex, LatLonGrid};
use crate::error::Result;
use crate::types::{ConserveOrder, ExchangeGrid};
use mosaic_grid::{decompose, Mosaic};
use std::path::{Path, PathBuf};
use tracing::info;

/// File holding the weights of target tile `tile` (0-based) out of `ntiles`.
pub fn tile_path(path: &Path, ntiles: usize, tile: usize) -> PathBuf {
    if ntiles <= 1 {
        return path.to_path_buf();
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.tile{}.{}", tile + 1, ext.to_string_lossy()),
        None => format!("{stem}.tile{}", tile + 1),
    };
    path.with_file_name(name)
}

/// Write one file per exchange grid.
pub fn write_exchange_grids(path: &Path, xgrids: &[ExchangeGrid], compress: bool) -> Result<()> {
    for xgrid in xgrids {
        let file = tile_path(path, xgrids.len(), xgrid.target_tile);
        encode_exchange_grid(xgrid)?.write(&file, compress)?;
        info!(
            path = %file.display(),
            entries = xgrid.len(),
            "Wrote conservative remap weights"
        );
    }
    Ok(())
}

/// Read the exchange grids of every target tile, distributing entries over
/// `workers` row blocks.
pub fn read_exchange_grids(
    path: &Path,
    source: &Mosaic,
    target: &Mosaic,
    order: ConserveOrder,
    workers: usize,
) -> Result<Vec<ExchangeGrid>> {
    let ntiles = target.ntiles();
    let mut xgrids = Vec::with_capacity(ntiles);
    for (t, tile) in target.tiles().iter().enumerate() {
        let file = tile_path(path, ntiles, t);
        let domains = decompose(tile.nx(), tile.ny(), workers)?;
        let ds = RemapDataset::read(&file)?;
        let req = ExchangeGridRequest {
            source,
            target,
            target_tile: t,
            order,
            domains: &domains,
        };
        let xgrid = decode_exchange_grid(&ds, &file.display().to_string(), &req)?;
        info!(
            path = %file.display(),
            entries = xgrid.len(),
            "Read conservative remap weights"
        );
        xgrids.push(xgrid);
    }
    Ok(xgrids)
}

pub fn write_bilinear(path: &Path, index: &BilinearIndex, compress: bool) -> Result<()> {
    encode_bilinear(index)?.write(path, compress)?;
    info!(path = %path.display(), nodes = index.stencils.len(), "Wrote bilinear remap weights");
    Ok(())
}

pub fn read_bilinear(path: &Path, source_n: usize, grid: &LatLonGrid, finer_steps: u32) -> Result<BilinearIndex> {
    let ds = RemapDataset::read(path)?;
    let index = decode_bilinear(&ds, &path.display().to_string(), source_n, grid, finer_steps)?;
    info!(path = %path.display(), nodes = index.stencils.len(), "Read bilinear remap weights");
    Ok(index)
}
