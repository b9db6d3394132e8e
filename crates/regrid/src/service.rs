//! High-level regridding service.
//!
//! The `Regridder` ties configuration, weight construction, the weight cache
//! and the interpolators together. Weights are built (or read) once per
//! source/target pair and reused for every field.
//!
//! # Example
//!
//! ```rust,ignore
//! use regrid::{Regridder, RegridConfig, TargetGrid};
//!
//! let regridder = Regridder::new(RegridConfig::from_env()?)?;
//! let target = TargetGrid::Mosaic(global_latlon(144, 90)?);
//! let weights = regridder.load_or_build_weights(&cube, &target)?;
//! let out = regridder.regrid_scalar(&cube, &target, &weights, &fields)?;
//! ```

use crate::bilinear::{
    build_bilinear_index, interpolate_scalar_bilinear, interpolate_vector_bilinear, BilinearIndex,
    LatLonGrid,
};
use crate::config::RegridConfig;
use crate::conserve::{attach_gradients, conservation_report, interpolate_scalar, interpolate_vector};
use crate::error::{RegridError, Result};
use crate::remap_file::{
    read_bilinear, read_exchange_grids, tile_path, write_bilinear, write_exchange_grids,
};
use crate::types::{ConserveOrder, ExchangeGrid, InterpOptions, TargetField};
use crate::xgrid::XgridBuilder;
use mosaic_grid::{FieldBuffer, Mosaic};
use std::time::Instant;
use tracing::{info, warn};

/// Where fields are regridded to.
#[derive(Debug, Clone)]
pub enum TargetGrid {
    /// Any mosaic, for conservative interpolation.
    Mosaic(Mosaic),
    /// A regular lat/lon grid, for bilinear interpolation.
    LatLon(LatLonGrid),
}

/// Precomputed weights for one source/target pair.
#[derive(Debug, Clone)]
pub enum Weights {
    /// One exchange grid per target tile.
    Conservative(Vec<ExchangeGrid>),
    Bilinear(BilinearIndex),
}

/// Regridding front end configured once per invocation.
pub struct Regridder {
    config: RegridConfig,
    opts: InterpOptions,
}

impl Regridder {
    /// Create a regridder, validating the configuration.
    pub fn new(config: RegridConfig) -> Result<Self> {
        config.validate().map_err(RegridError::config)?;
        let opts = InterpOptions::from(&config);
        Ok(Self { config, opts })
    }

    pub fn config(&self) -> &RegridConfig {
        &self.config
    }

    /// Read weights from the configured remap file when it exists, otherwise
    /// build them (and write them when `save_weights` is set).
    ///
    /// # Errors
    /// A conservative method needs a mosaic target and bilinear needs a
    /// lat/lon target; any other pairing is a configuration error. A cached
    /// file that does not match the grids is a `CacheMismatch`.
    pub fn load_or_build_weights(&self, source: &Mosaic, target: &TargetGrid) -> Result<Weights> {
        let workers = self.config.effective_workers();
        let start = Instant::now();
        let weights = match (self.config.method.conserve_order(), target) {
            (Some(order), TargetGrid::Mosaic(target)) => {
                Weights::Conservative(self.conservative_weights(source, target, order, workers)?)
            }
            (None, TargetGrid::LatLon(grid)) => Weights::Bilinear(self.bilinear_weights(source, grid)?),
            (Some(_), TargetGrid::LatLon(_)) => {
                return Err(RegridError::config(format!(
                    "{} needs a mosaic target, got a lat/lon grid",
                    self.config.method.as_str()
                )))
            }
            (None, TargetGrid::Mosaic(_)) => {
                return Err(RegridError::config(
                    "bilinear interpolation needs a lat/lon target grid",
                ))
            }
        };
        info!(
            method = self.config.method.as_str(),
            workers,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Remap weights ready"
        );
        Ok(weights)
    }

    fn conservative_weights(
        &self,
        source: &Mosaic,
        target: &Mosaic,
        order: ConserveOrder,
        workers: usize,
    ) -> Result<Vec<ExchangeGrid>> {
        if let Some(path) = &self.config.remap_file {
            if tile_path(path, target.ntiles(), 0).exists() {
                return read_exchange_grids(path, source, target, order, workers);
            }
        }
        let xgrids = XgridBuilder::new(source, target).order(order).workers(workers).build()?;
        if self.config.save_weights {
            if let Some(path) = &self.config.remap_file {
                write_exchange_grids(path, &xgrids, self.config.compress_weights)?;
            }
        }
        Ok(xgrids)
    }

    fn bilinear_weights(&self, source: &Mosaic, grid: &LatLonGrid) -> Result<BilinearIndex> {
        let steps = self.config.finer_steps;
        if let Some(path) = &self.config.remap_file {
            if path.exists() {
                let n = source.tiles().first().map_or(0, |t| t.nx());
                return read_bilinear(path, n, grid, steps);
            }
        }
        let index = build_bilinear_index(source, grid, steps)?;
        if self.config.save_weights {
            if let Some(path) = &self.config.remap_file {
                write_bilinear(path, &index, self.config.compress_weights)?;
            }
        }
        Ok(index)
    }

    /// Regrid a scalar field given as one buffer per source tile.
    ///
    /// # Returns
    /// One field per target tile, or a single lat/lon field for bilinear.
    pub fn regrid_scalar(
        &self,
        source: &Mosaic,
        target: &TargetGrid,
        weights: &Weights,
        fields: &[FieldBuffer],
    ) -> Result<Vec<TargetField>> {
        match (weights, target) {
            (Weights::Conservative(xgrids), TargetGrid::Mosaic(target)) => {
                let second_order = xgrids.iter().any(|x| x.order == ConserveOrder::Second);
                let out = if second_order {
                    let mut fields = fields.to_vec();
                    attach_gradients(source, &mut fields)?;
                    interpolate_scalar(xgrids, &fields, target, &self.opts)?
                } else {
                    interpolate_scalar(xgrids, fields, target, &self.opts)?
                };
                if self.config.check_conserve {
                    self.report_conservation(source, fields, target, &out)?;
                }
                Ok(out)
            }
            (Weights::Bilinear(index), TargetGrid::LatLon(_)) => {
                Ok(vec![interpolate_scalar_bilinear(index, source, fields, &self.opts)?])
            }
            _ => Err(RegridError::config("weights do not belong to this target grid")),
        }
    }

    /// Regrid a vector field given as `u` and `v` buffers per source tile.
    pub fn regrid_vector(
        &self,
        source: &Mosaic,
        target: &TargetGrid,
        weights: &Weights,
        u: &[FieldBuffer],
        v: &[FieldBuffer],
    ) -> Result<(Vec<TargetField>, Vec<TargetField>)> {
        match (weights, target) {
            (Weights::Conservative(xgrids), TargetGrid::Mosaic(target)) => {
                interpolate_vector(xgrids, u, v, source, target, &self.opts)
            }
            (Weights::Bilinear(index), TargetGrid::LatLon(_)) => {
                let (ou, ov) = interpolate_vector_bilinear(index, source, u, v, &self.opts)?;
                Ok((vec![ou], vec![ov]))
            }
            _ => Err(RegridError::config("weights do not belong to this target grid")),
        }
    }

    fn report_conservation(
        &self,
        source: &Mosaic,
        fields: &[FieldBuffer],
        target: &Mosaic,
        out: &[TargetField],
    ) -> Result<()> {
        let report = conservation_report(source, fields, target, out)?;
        let relative = report.relative_error();
        if relative > 1.0e-6 && !self.opts.use_target_area {
            warn!(
                input = report.input,
                output = report.output,
                diff = report.diff(),
                relative,
                "Conservation check: integrals differ"
            );
        } else {
            info!(
                input = report.input,
                output = report.output,
                diff = report.diff(),
                relative,
                "Conservation check"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for Regridder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regridder")
            .field("method", &self.config.method.as_str())
            .finish()
    }
}
