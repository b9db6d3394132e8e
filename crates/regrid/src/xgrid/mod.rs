//! Exchange grids: the overlaps between source and target cells.
//!
//! Cells are clipped against each other in (lon, lat) space after their
//! longitudes are made continuous around the source cell. First order keeps
//! the overlap area; second order also keeps each overlap's centroid offset
//! from its source cell's centroid.

mod builder;
mod centroid;
pub mod clip;

pub use builder::{build_exchange_grid, XgridBuilder};
pub use centroid::{CentroidSums, Centroids};
