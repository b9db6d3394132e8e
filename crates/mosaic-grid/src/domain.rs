//! Decomposition of a tile into per-worker sub-domains.

use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};

/// Half-open cell range `[i_start, i_end) × [j_start, j_end)` of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub i_start: usize,
    pub i_end: usize,
    pub j_start: usize,
    pub j_end: usize,
}

impl Domain {
    /// The whole `nx × ny` tile.
    pub fn full(nx: usize, ny: usize) -> Self {
        Self {
            i_start: 0,
            i_end: nx,
            j_start: 0,
            j_end: ny,
        }
    }

    pub fn nx(&self) -> usize {
        self.i_end - self.i_start
    }

    pub fn ny(&self) -> usize {
        self.j_end - self.j_start
    }

    pub fn len(&self) -> usize {
        self.nx() * self.ny()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        (self.i_start..self.i_end).contains(&i) && (self.j_start..self.j_end).contains(&j)
    }

    /// Row-major index of global cell `(i, j)` inside this domain.
    #[inline]
    pub fn local_index(&self, i: usize, j: usize) -> Option<usize> {
        if self.contains(i, j) {
            Some((j - self.j_start) * self.nx() + (i - self.i_start))
        } else {
            None
        }
    }
}

/// Split an `nx × ny` tile into row blocks, one per worker.
///
/// The layout is one block across and `workers` blocks down; row counts
/// differ by at most one, with the larger blocks first. More workers than
/// rows are clamped to one row each.
pub fn decompose(nx: usize, ny: usize, workers: usize) -> Result<Vec<Domain>> {
    if nx == 0 || ny == 0 {
        return Err(GridError::Decomposition(format!(
            "cannot decompose an empty {nx}x{ny} tile"
        )));
    }
    if workers == 0 {
        return Err(GridError::Decomposition("worker count must be > 0".to_string()));
    }

    let blocks = workers.min(ny);
    let base = ny / blocks;
    let extra = ny % blocks;

    let mut domains = Vec::with_capacity(blocks);
    let mut j_start = 0;
    for b in 0..blocks {
        let rows = base + usize::from(b < extra);
        domains.push(Domain {
            i_start: 0,
            i_end: nx,
            j_start,
            j_end: j_start + rows,
        });
        j_start += rows;
    }
    Ok(domains)
}
