//! Source-cell centroids for second-order exchange grids.
//!
//! Each worker only sees the fragments of the target rows it owns, but a
//! source cell's centroid depends on all of its fragments. Workers therefore
//! produce [`CentroidSums`] partials, which are merged in worker order before
//! any worker computes its fragment offsets.

use crate::types::SourceCell;
use mosaic_grid::{fix_lon, mean_lon, poly_ctrlat, poly_ctrlon, Mosaic};
use std::f64::consts::PI;

/// Relative mismatch between the summed fragment area and the true cell
/// area beyond which a cell's centroid comes from its own polygon.
const AREA_RATIO: f64 = 1.0e-3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Moments {
    area: f64,
    clon: f64,
    clat: f64,
}

/// Per-source-cell sums of fragment area and centroid moments.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidSums {
    nx: Vec<usize>,
    tiles: Vec<Vec<Moments>>,
}

impl CentroidSums {
    /// Zeroed sums shaped like the source mosaic.
    pub fn zeros(source: &Mosaic) -> Self {
        Self {
            nx: source.tiles().iter().map(|t| t.nx()).collect(),
            tiles: source
                .tiles()
                .iter()
                .map(|t| vec![Moments::default(); t.ncells()])
                .collect(),
        }
    }

    /// Add one fragment's area and moments to its source cell.
    pub fn add(&mut self, cell: SourceCell, area: f64, clon: f64, clat: f64) {
        let m = &mut self.tiles[cell.tile][cell.j * self.nx[cell.tile] + cell.i];
        m.area += area;
        m.clon += clon;
        m.clat += clat;
    }

    /// Fold another worker's partial sums into these.
    pub fn merge(&mut self, other: &CentroidSums) {
        for (mine, theirs) in self.tiles.iter_mut().zip(&other.tiles) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                a.area += b.area;
                a.clon += b.clon;
                a.clat += b.clat;
            }
        }
    }

    /// Turn the merged sums into per-cell centroids.
    ///
    /// # Arguments
    /// * `source` - The source mosaic the sums were built for
    /// * `source_areas` - True cell areas per source tile, row-major
    pub fn finalize(&self, source: &Mosaic, source_areas: &[Vec<f64>]) -> Centroids {
        let tiles = source
            .tiles()
            .iter()
            .zip(&self.tiles)
            .zip(source_areas)
            .map(|((tile, sums), areas)| {
                sums.iter()
                    .enumerate()
                    .map(|(idx, m)| {
                        let area_in = areas[idx];
                        if m.area <= 0.0 || area_in <= 0.0 {
                            return (0.0, 0.0);
                        }
                        if ((m.area - area_in) / area_in).abs() < AREA_RATIO {
                            (m.clon / m.area, m.clat / m.area)
                        } else {
                            let (i, j) = (idx % tile.nx(), idx / tile.nx());
                            let mut poly = tile.cell_polygon(i, j);
                            fix_lon(&mut poly, PI);
                            let lon_avg = mean_lon(&poly);
                            (
                                poly_ctrlon(&poly, lon_avg) / area_in,
                                poly_ctrlat(&poly) / area_in,
                            )
                        }
                    })
                    .collect()
            })
            .collect();
        Centroids {
            nx: self.nx.clone(),
            tiles,
        }
    }
}

/// Centroid of every source cell as (eastward moment, latitude), in the
/// same reference frame as the fragment moments.
#[derive(Debug, Clone, PartialEq)]
pub struct Centroids {
    nx: Vec<usize>,
    tiles: Vec<Vec<(f64, f64)>>,
}

impl Centroids {
    #[inline]
    pub fn get(&self, cell: SourceCell) -> (f64, f64) {
        self.tiles[cell.tile][cell.j * self.nx[cell.tile] + cell.i]
    }
}
