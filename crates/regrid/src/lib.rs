//! Conservative and bilinear regridding between mosaic grids.
//!
//! This crate moves fields from a source mosaic (usually a cubed sphere) to a
//! target grid. It provides:
//!
//! - **Exchange grids**: overlaps between source and target cells, first or
//!   second order, built in parallel over row-block sub-domains
//! - **Conservative interpolation**: area-weighted means with optional
//!   gradient correction, missing-value handling and a conservation check
//! - **Bilinear interpolation**: cubed sphere to lat/lon via four-corner
//!   stencils, with optional refinement coarsened back by `redu2x`
//! - **Weight cache**: remap files that store the weights for reuse
//!
//! # Architecture
//!
//! ```text
//! RegridConfig
//!      │
//!      ▼
//! Regridder::load_or_build_weights(source, target)
//!      │
//!      ├─► remap file exists: read + validate against the grids
//!      │
//!      └─► otherwise build
//!               ├─► conservative: XgridBuilder (one ExchangeGrid per target tile)
//!               └─► bilinear: build_bilinear_index (one Stencil per node)
//!      │
//!      ▼
//! Regridder::regrid_scalar / regrid_vector(fields)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mosaic_grid::{cubed_sphere, global_latlon};
//! use regrid::{Regridder, RegridConfig, TargetGrid};
//!
//! let cube = cubed_sphere(48)?;
//! let target = TargetGrid::Mosaic(global_latlon(144, 90)?);
//! let regridder = Regridder::new(RegridConfig::default())?;
//! let weights = regridder.load_or_build_weights(&cube, &target)?;
//! let out = regridder.regrid_scalar(&cube, &target, &weights, &fields)?;
//! ```

pub mod bilinear;
pub mod config;
pub mod conserve;
pub mod error;
pub mod remap_file;
pub mod service;
pub mod types;
pub mod workers;
pub mod xgrid;

// Re-export commonly used types at crate root
pub use bilinear::{
    build_bilinear_index, interpolate_scalar_bilinear, interpolate_vector_bilinear, BilinearIndex,
    LatLonGrid, Stencil,
};
pub use config::{InterpMethod, RegridConfig};
pub use conserve::{attach_gradients, conservation_report, interpolate_scalar, interpolate_vector};
pub use error::{RegridError, Result};
pub use service::{Regridder, TargetGrid, Weights};
pub use types::{
    ConservationReport, ConserveOrder, ExchangeEntry, ExchangeGrid, InterpOptions, SourceCell,
    TargetCell, TargetField,
};
pub use xgrid::{build_exchange_grid, XgridBuilder};
