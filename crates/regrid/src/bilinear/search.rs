//! Bilinear stencil search from a cubed sphere onto a lat/lon grid.

use super::target::LatLonGrid;
use super::weights::{locate, stencil_weights};
use crate::error::{RegridError, Result};
use mosaic_grid::sphere::{great_circle_distance, lonlat_to_xyz};
use mosaic_grid::{Mosaic, TileGrid};
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info, warn};

/// Number of widening passes before the exhaustive fallback.
const MAX_ITER: usize = 10;

/// Below this cos(lat) every longitude is scanned.
const POLAR_COS: f64 = 1.0e-6;

/// Lower-left stencil corner and weights for one target node.
///
/// `i`, `j` are halo coordinates on source tile `tile`. Weights are ordered
/// `(i, j)`, `(i, j+1)`, `(i+1, j+1)`, `(i+1, j)` and sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stencil {
    pub tile: usize,
    pub i: usize,
    pub j: usize,
    pub weights: [f64; 4],
}

/// Stencils for every node of the refined target grid, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BilinearIndex {
    pub grid: LatLonGrid,
    pub finer_steps: u32,
    /// Cells along each edge of the source cube faces.
    pub source_n: usize,
    pub stencils: Vec<Stencil>,
}

impl BilinearIndex {
    /// `(nlon, nlat)` of the refined node grid.
    pub fn fine_dims(&self) -> (usize, usize) {
        self.grid.fine_dims(self.finer_steps)
    }

    pub fn stencil(&self, i: usize, j: usize) -> &Stencil {
        &self.stencils[j * self.fine_dims().0 + i]
    }
}

/// Refined target nodes and the spacing used to bound the search.
struct Nodes {
    nlon: usize,
    nlat: usize,
    lons: Vec<f64>,
    lats: Vec<f64>,
    xyz: Vec<Vector3<f64>>,
    lon_begin: f64,
    dlon: f64,
    dlat: f64,
    global: bool,
}

impl Nodes {
    fn new(grid: &LatLonGrid, steps: u32) -> Self {
        let (nlon, nlat) = grid.fine_dims(steps);
        let lons = grid.node_lons(steps);
        let lats = grid.node_lats(steps);
        let xyz = lats
            .iter()
            .flat_map(|&lat| lons.iter().map(move |&lon| lonlat_to_xyz(lon, lat)))
            .collect();
        let dlon = (grid.lon_end - grid.lon_begin).to_radians() / nlon as f64;
        let dlat = if nlat > 1 { lats[1] - lats[0] } else { PI };
        Self {
            nlon,
            nlat,
            lons,
            lats,
            xyz,
            lon_begin: grid.lon_begin.to_radians(),
            dlon,
            dlat,
            global: grid.is_global_lon(),
        }
    }

    /// Node rows within `reach` of latitude `lat`, widened by `iter` rows.
    fn rows(&self, lat: f64, reach: f64, iter: usize) -> (usize, usize) {
        let lo = ((lat - reach - self.lats[0]) / self.dlat).floor() as i64 - iter as i64;
        let hi = ((lat + reach - self.lats[0]) / self.dlat).ceil() as i64 + iter as i64;
        let last = self.nlat as i64 - 1;
        (lo.clamp(0, last) as usize, hi.clamp(0, last) as usize)
    }

    /// Node columns within `reach` of longitude `lon` on a row band.
    fn columns(&self, lon: f64, lat: f64, reach: f64, iter: usize) -> Vec<usize> {
        let cos_lat = lat.cos();
        if cos_lat < POLAR_COS {
            return (0..self.nlon).collect();
        }
        let half = reach / cos_lat;
        let span = self.dlon * self.nlon as f64;
        let mut rel = lon - self.lon_begin;
        rel -= (rel / (2.0 * PI)).floor() * 2.0 * PI;
        if !self.global && rel > 0.5 * span + PI {
            rel -= 2.0 * PI;
        }
        let lo = ((rel - half) / self.dlon - 0.5).floor() as i64 - iter as i64;
        let hi = ((rel + half) / self.dlon - 0.5).ceil() as i64 + iter as i64;
        let n = self.nlon as i64;
        if self.global {
            if hi - lo + 1 >= n {
                return (0..self.nlon).collect();
            }
            (lo..=hi).map(|k| k.rem_euclid(n) as usize).collect()
        } else {
            let (lo, hi) = (lo.max(0), hi.min(n - 1));
            if lo > hi {
                return Vec::new();
            }
            (lo as usize..=hi as usize).collect()
        }
    }
}

/// Nearest center of the 2×2 block starting at `(ic, jc)`, kept on the
/// tile's interior.
fn nearest_in_block(tile: &TileGrid, ic: usize, jc: usize, p: &Vector3<f64>) -> (usize, usize) {
    let mut best = (ic, jc);
    let mut shortest = 2.0 * PI;
    for jj in jc..=(jc + 1).min(tile.ny()) {
        for ii in ic..=(ic + 1).min(tile.nx()) {
            let d = great_circle_distance(tile.center(ii, jj), p);
            if d < shortest {
                shortest = d;
                best = (ii, jj);
            }
        }
    }
    best
}

/// One tile's pass of iteration `iter` over the nodes still unresolved.
fn search_tile(
    tile: &TileGrid,
    nodes: &Nodes,
    resolved: &[bool],
    iter: usize,
) -> Vec<(usize, (usize, usize))> {
    let mut done = resolved.to_vec();
    let mut found = Vec::new();
    for jc in 1..=tile.ny() {
        for ic in 1..=tile.nx() {
            let here = tile.center_lonlat(ic, jc);
            let reach = iter as f64 * great_circle_distance(tile.center(ic, jc), tile.center(ic + 1, jc + 1));
            let (j_lo, j_hi) = nodes.rows(here.lat, reach, iter);
            let columns = if j_lo == 0 || j_hi == nodes.nlat - 1 {
                (0..nodes.nlon).collect()
            } else {
                nodes.columns(here.lon, here.lat, reach, iter)
            };
            for j in j_lo..=j_hi {
                for &i in &columns {
                    let n = j * nodes.nlon + i;
                    if done[n] {
                        continue;
                    }
                    let p = &nodes.xyz[n];
                    let (ii, jj) = nearest_in_block(tile, ic, jc, p);
                    if let Some(corner) = locate(tile, p, ii, jj) {
                        done[n] = true;
                        found.push((n, corner));
                    }
                }
            }
        }
    }
    found
}

/// Try every interior center of every tile as the start, nearest first.
///
/// The nearest center is not always a corner of the enclosing stencil near
/// face edges, so no candidate is skipped.
fn exhaustive_locate(source: &Mosaic, p: &Vector3<f64>) -> Option<(usize, (usize, usize))> {
    let mut candidates: Vec<(f64, usize, usize, usize)> = Vec::new();
    for (t, tile) in source.tiles().iter().enumerate() {
        for jj in 1..=tile.ny() {
            for ii in 1..=tile.nx() {
                candidates.push((great_circle_distance(tile.center(ii, jj), p), t, ii, jj));
            }
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
    candidates
        .into_iter()
        .find_map(|(_, t, ii, jj)| locate(&source.tiles()[t], p, ii, jj).map(|corner| (t, corner)))
}

fn check_cubed_sphere(source: &Mosaic) -> Result<usize> {
    if source.ntiles() != 6 {
        return Err(RegridError::config(format!(
            "bilinear interpolation needs a six-tile cubed sphere source, got {} tiles",
            source.ntiles()
        )));
    }
    let n = source.tiles()[0].nx();
    if let Some(tile) = source.tiles().iter().find(|t| t.nx() != n || t.ny() != n) {
        return Err(RegridError::config(format!(
            "bilinear interpolation needs equal square tiles, {} is {}x{} (expected {n}x{n})",
            tile.name(),
            tile.nx(),
            tile.ny()
        )));
    }
    Ok(n)
}

/// Build the bilinear stencils from a cubed sphere to a lat/lon grid.
///
/// # Arguments
/// * `source` - Six-tile cubed sphere with equal square tiles
/// * `grid` - Target lat/lon grid
/// * `finer_steps` - Number of 2x refinements of the target grid
///
/// # Returns
/// One stencil per refined target node, or `Unresolved` naming the first node
/// no tile encloses.
pub fn build_bilinear_index(source: &Mosaic, grid: &LatLonGrid, finer_steps: u32) -> Result<BilinearIndex> {
    let n = check_cubed_sphere(source)?;
    grid.validate()?;

    let nodes = Nodes::new(grid, finer_steps);
    let total = nodes.nlon * nodes.nlat;
    let mut located: Vec<Option<(usize, (usize, usize))>> = vec![None; total];
    let mut resolved = vec![false; total];

    for iter in 1..=MAX_ITER {
        let per_tile: Vec<Vec<(usize, (usize, usize))>> = source
            .tiles()
            .par_iter()
            .map(|tile| search_tile(tile, &nodes, &resolved, iter))
            .collect();

        // Lowest tile index wins, as if the tiles were searched in order.
        for (t, found) in per_tile.into_iter().enumerate() {
            for (node, corner) in found {
                if located[node].is_none() {
                    located[node] = Some((t, corner));
                    resolved[node] = true;
                }
            }
        }

        let remaining = resolved.iter().filter(|r| !**r).count();
        debug!(iter, remaining, "Bilinear search pass");
        if remaining == 0 {
            break;
        }
    }

    let unresolved: Vec<usize> = (0..total).filter(|&k| located[k].is_none()).collect();
    if !unresolved.is_empty() {
        warn!(
            nodes = unresolved.len(),
            "Bilinear search left nodes unresolved, performing exhaustive sweep"
        );
        let results: Vec<(usize, Option<(usize, (usize, usize))>)> = unresolved
            .par_iter()
            .map(|&k| (k, exhaustive_locate(source, &nodes.xyz[k])))
            .collect();
        for (k, hit) in results {
            match hit {
                Some(loc) => located[k] = Some(loc),
                None => {
                    let (i, j) = (k % nodes.nlon, k / nodes.nlon);
                    return Err(RegridError::Unresolved {
                        i,
                        j,
                        lon: nodes.lons[i].to_degrees(),
                        lat: nodes.lats[j].to_degrees(),
                    });
                }
            }
        }
    }

    let stencils = located
        .par_iter()
        .enumerate()
        .map(|(k, loc)| {
            let (tile, (i, j)) = loc.ok_or_else(|| RegridError::Unresolved {
                i: k % nodes.nlon,
                j: k / nodes.nlon,
                lon: nodes.lons[k % nodes.nlon].to_degrees(),
                lat: nodes.lats[k / nodes.nlon].to_degrees(),
            })?;
            let weights = stencil_weights(&source.tiles()[tile], i, j, &nodes.xyz[k]);
            Ok(Stencil { tile, i, j, weights })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        source_n = n,
        nlon = nodes.nlon,
        nlat = nodes.nlat,
        finer_steps,
        "Bilinear index built"
    );

    Ok(BilinearIndex {
        grid: *grid,
        finer_steps,
        source_n: n,
        stencils,
    })
}
