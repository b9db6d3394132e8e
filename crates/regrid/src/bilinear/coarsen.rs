//! Reduction of refined lat/lon fields back to the requested resolution.
//!
//! Each step halves the longitudes and roughly halves the latitudes of a
//! grid whose first and last rows sit on the poles. Interior values are a
//! 1-2-1 mean in longitude followed by a cos(lat) weighted 1-2-1 mean in
//! latitude, which keeps constant fields constant. Pole rows are subsampled.

use crate::error::{RegridError, Result};

/// Halve a field of `nx × ny` nodes.
///
/// # Arguments
/// * `fine` - Row-major values, `nx` even and `ny` odd
/// * `lats` - Latitude of each row, radians
/// * `missing` - Sentinel that propagates into every mean it touches
///
/// # Returns
/// Tuple of (coarse values, coarse nx, coarse ny)
pub fn redu2x(
    fine: &[f64],
    lats: &[f64],
    nx: usize,
    ny: usize,
    missing: Option<f64>,
) -> Result<(Vec<f64>, usize, usize)> {
    if nx < 2 || nx % 2 != 0 || ny < 3 || ny % 2 == 0 {
        return Err(RegridError::field(format!(
            "cannot halve a {nx}x{ny} lat/lon field (need even nx, odd ny >= 3)"
        )));
    }
    if fine.len() != nx * ny || lats.len() != ny {
        return Err(RegridError::field(format!(
            "coarsening: {} values and {} latitudes for a {nx}x{ny} grid",
            fine.len(),
            lats.len()
        )));
    }
    let (nxc, nyc) = (nx / 2, (ny - 1) / 2 + 1);

    // Pole rows carry zero weight.
    let mut cosp = vec![0.0; ny];
    for j in 1..ny - 1 {
        cosp[j] = lats[j].cos();
    }

    // x-sweep, already multiplied by cos(lat).
    let mut tmp = vec![0.0; nxc * ny];
    for j in 1..ny - 1 {
        let row = &fine[j * nx..(j + 1) * nx];
        for ic in 0..nxc {
            let i = 2 * ic;
            let stencil = [row[(i + nx - 1) % nx], row[i], row[i + 1]];
            tmp[j * nxc + ic] = match missing {
                Some(m) if stencil.contains(&m) => m,
                _ => 0.25 * (stencil[0] + 2.0 * stencil[1] + stencil[2]) * cosp[j],
            };
        }
    }

    let mut coarse = vec![0.0; nxc * nyc];
    for ic in 0..nxc {
        coarse[ic] = fine[2 * ic];
        coarse[(nyc - 1) * nxc + ic] = fine[(ny - 1) * nx + 2 * ic];
    }

    // y-sweep.
    for jc in 1..nyc - 1 {
        let j = 2 * jc;
        let norm = 1.0 / (cosp[j] + 0.5 * (cosp[j - 1] + cosp[j + 1]));
        for ic in 0..nxc {
            let stencil = [
                tmp[(j - 1) * nxc + ic],
                tmp[j * nxc + ic],
                tmp[(j + 1) * nxc + ic],
            ];
            coarse[jc * nxc + ic] = match missing {
                Some(m) if stencil.contains(&m) => m,
                _ => norm * (stencil[1] + 0.5 * (stencil[0] + stencil[2])),
            };
        }
    }

    Ok((coarse, nxc, nyc))
}

/// Apply `steps` successive halvings.
///
/// The latitudes of each coarser level are every other latitude of the
/// level before.
pub fn coarsen(
    fine: Vec<f64>,
    lats: &[f64],
    nx: usize,
    ny: usize,
    steps: u32,
    missing: Option<f64>,
) -> Result<Vec<f64>> {
    let mut values = fine;
    let mut lats = lats.to_vec();
    let (mut nx, mut ny) = (nx, ny);
    for _ in 0..steps {
        let (next, nxc, nyc) = redu2x(&values, &lats, nx, ny, missing)?;
        values = next;
        lats = lats.into_iter().step_by(2).collect();
        nx = nxc;
        ny = nyc;
    }
    Ok(values)
}
