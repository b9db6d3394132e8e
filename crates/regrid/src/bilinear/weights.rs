//! Stencil location and weights on a tile's grid of cell centers.
//!
//! A target point is enclosed by the quadrilateral of four neighbouring cell
//! centers `(i, j)`, `(i+1, j)`, `(i+1, j+1)`, `(i, j+1)` in halo
//! coordinates. Where three tiles meet at a cube corner only three centers
//! surround the point and the stencil degenerates to a triangle; the halo
//! corner standing in for the missing fourth center gets zero weight.

use mosaic_grid::sphere::{distance_to_side, spherical_angle};
use mosaic_grid::TileGrid;
use nalgebra::Vector3;

/// Slack on the sub-angle containment test.
const ANGLE_SLACK: f64 = 1.0e-12;

/// Halo offsets of the four stencil corners, in weight order.
pub const CORNER_OFFSETS: [(usize, usize); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];

/// Both sub-angles fit inside the full angle.
#[inline]
fn within(full: f64, a: f64, b: f64) -> bool {
    a.max(b) <= full + ANGLE_SLACK
}

/// Find the lower-left corner of the stencil enclosing `p`, starting from
/// the interior center `(i, j)` nearest to it (halo coordinates,
/// `1..=nx`, `1..=ny`).
///
/// The four quadrants around `(i, j)` are tested in turn; the first whose
/// corner angle contains `p` is then checked from its opposite corner.
pub fn locate(tile: &TileGrid, p: &Vector3<f64>, i: usize, j: usize) -> Option<(usize, usize)> {
    let (nx, ny) = (tile.nx(), tile.ny());
    let c = |ii: usize, jj: usize| *tile.center(ii, jj);
    let angle = spherical_angle;

    let v1 = c(i, j);
    let v2 = c(i + 1, j);
    let v3 = c(i, j + 1);
    let a1b = angle(&v1, &v3, p);

    if within(angle(&v1, &v2, &v3), angle(&v1, &v2, p), a1b) {
        let inside = if i == nx && j == ny {
            within(angle(&v2, &v3, &v1), angle(&v2, &v1, p), angle(&v2, &v3, p))
        } else {
            let v4 = c(i + 1, j + 1);
            within(angle(&v4, &v3, &v2), angle(&v4, &v2, p), angle(&v4, &v3, p))
        };
        return inside.then_some((i, j));
    }

    let v4 = c(i - 1, j);
    let a2b = angle(&v1, &v4, p);
    if within(angle(&v1, &v3, &v4), a1b, a2b) {
        let inside = if i == 1 && j == ny {
            within(angle(&v3, &v1, &v4), angle(&v3, &v4, p), angle(&v3, &v1, p))
        } else {
            let v5 = c(i - 1, j + 1);
            within(angle(&v5, &v3, &v4), angle(&v5, &v4, p), angle(&v5, &v3, p))
        };
        return inside.then_some((i - 1, j));
    }

    let v6 = c(i, j - 1);
    let a3b = angle(&v1, &v6, p);
    if within(angle(&v1, &v4, &v6), a2b, a3b) {
        let inside = if i == 1 && j == 1 {
            within(angle(&v4, &v1, &v6), angle(&v4, &v6, p), angle(&v4, &v1, p))
        } else {
            let v7 = c(i - 1, j - 1);
            within(angle(&v7, &v6, &v4), angle(&v7, &v4, p), angle(&v7, &v6, p))
        };
        return inside.then_some((i - 1, j - 1));
    }

    if within(angle(&v1, &v6, &v2), a3b, angle(&v1, &v2, p)) {
        let inside = if i == nx && j == 1 {
            within(angle(&v2, &v1, &v6), angle(&v2, &v6, p), angle(&v2, &v1, p))
        } else {
            let v8 = c(i + 1, j - 1);
            within(angle(&v8, &v6, &v2), angle(&v8, &v6, p), angle(&v8, &v2, p))
        };
        return inside.then_some((i, j - 1));
    }

    None
}

fn normalize(mut w: [f64; 4]) -> [f64; 4] {
    let sum: f64 = w.iter().sum();
    if sum > 0.0 {
        w.iter_mut().for_each(|x| *x /= sum);
    } else {
        w = [1.0, 0.0, 0.0, 0.0];
    }
    w
}

/// Weights of the stencil with lower-left corner `(ic, jc)` at point `p`.
///
/// Quadrilaterals weight each corner by the product of its distances to the
/// two far sides. The three corner triangles weight each vertex by its
/// distance to the opposite side and give the unused corner zero.
pub fn stencil_weights(tile: &TileGrid, ic: usize, jc: usize, p: &Vector3<f64>) -> [f64; 4] {
    let (nx, ny) = (tile.nx(), tile.ny());
    let c = |ii: usize, jj: usize| *tile.center(ii, jj);
    let d = |a: &Vector3<f64>, b: &Vector3<f64>| distance_to_side(a, b, p);

    if ic == nx && jc == ny {
        let (v1, v2, v3) = (c(ic, jc), c(ic + 1, jc), c(ic, jc + 1));
        normalize([d(&v2, &v3), d(&v2, &v1), 0.0, d(&v1, &v3)])
    } else if ic == 0 && jc == ny {
        let (v1, v2, v3) = (c(ic, jc), c(ic + 1, jc), c(ic + 1, jc + 1));
        normalize([d(&v3, &v2), 0.0, d(&v2, &v1), d(&v3, &v1)])
    } else if ic == nx && jc == 0 {
        let (v1, v2, v3) = (c(ic, jc), c(ic, jc + 1), c(ic + 1, jc + 1));
        normalize([d(&v2, &v3), d(&v1, &v3), d(&v1, &v2), 0.0])
    } else if ic == 0 && jc == 0 {
        let (v1, v2, v3) = (c(ic, jc + 1), c(ic + 1, jc + 1), c(ic + 1, jc));
        normalize([0.0, d(&v2, &v3), d(&v1, &v3), d(&v1, &v2)])
    } else {
        let v1 = c(ic, jc);
        let v2 = c(ic + 1, jc);
        let v3 = c(ic, jc + 1);
        let v4 = c(ic + 1, jc + 1);
        let d1 = d(&v1, &v3);
        let d2 = d(&v3, &v4);
        let d3 = d(&v4, &v2);
        let d4 = d(&v2, &v1);
        normalize([d2 * d3, d3 * d4, d4 * d1, d1 * d2])
    }
}

/// Index of the largest weight (first on ties).
pub fn max_weight_index(weights: &[f64; 4]) -> usize {
    let mut best = 0;
    for k in 1..4 {
        if weights[k] > weights[best] {
            best = k;
        }
    }
    best
}
