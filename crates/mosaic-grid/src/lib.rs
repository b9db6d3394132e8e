//! Mosaic grids on the sphere.
//!
//! A mosaic is a set of logically rectangular tiles (six for a cubed sphere,
//! one for a regular lat/lon grid) whose edges meet. This crate holds the
//! read-only grid model shared by the regridding engine:
//!
//! - **Geometry**: unit-sphere vectors, great-circle distances, spherical
//!   angles, polygon areas and centroid moments in (lon, lat) space
//! - **Tiles**: corner coordinates, halo'd cell centers, optional rotation
//! - **Contacts**: tile edges matched on the sphere, used to fill halos
//! - **Fields**: per-tile buffers with a one-cell halo and optional gradient
//! - **Decomposition**: row-block sub-domains for parallel workers
//!
//! # Example
//!
//! ```ignore
//! use mosaic_grid::{cubed_sphere, FieldBuffer};
//!
//! let cube = cubed_sphere(48)?;
//! let mut fields: Vec<FieldBuffer> = cube
//!     .tiles()
//!     .iter()
//!     .map(|t| FieldBuffer::constant(t.nx(), t.ny(), 1.0))
//!     .collect();
//! cube.update_halo(&mut fields)?;
//! ```

pub mod contact;
pub mod domain;
pub mod error;
pub mod field;
pub mod generators;
pub mod mosaic;
pub mod polygon;
pub mod sphere;
pub mod tile;

pub use contact::{Contact, Edge};
pub use domain::{decompose, Domain};
pub use error::{GridError, Result};
pub use field::{FieldBuffer, Gradient, DEFAULT_MISSING};
pub use generators::{cubed_sphere, cubed_sphere_tile, global_latlon, latlon_tile};
pub use mosaic::Mosaic;
pub use polygon::{fix_lon, mean_lon, poly_area, poly_ctrlat, poly_ctrlon, LonLat};
pub use sphere::RADIUS;
pub use tile::{Rotation, TileGrid};
