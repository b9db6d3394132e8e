//! Bilinear interpolation from a cubed sphere to a lat/lon grid.
//!
//! Every target node is located inside a quadrilateral (or, at cube
//! corners, a triangle) of source cell centers using spherical angles, and
//! weighted by its great-circle distances to the sides. The target grid can
//! be refined `finer_steps` times before interpolation and coarsened back
//! afterwards.

mod apply;
pub mod coarsen;
mod search;
mod target;
mod weights;

pub use apply::{interpolate_scalar_bilinear, interpolate_vector_bilinear};
pub use coarsen::{coarsen, redu2x};
pub use search::{build_bilinear_index, BilinearIndex, Stencil};
pub use target::LatLonGrid;
pub use weights::CORNER_OFFSETS;
