//! Edge contacts between tiles.
//!
//! Two tile edges are in contact when their corner sequences coincide on the
//! unit sphere, either in the same order or reversed. A tile may be in
//! contact with itself (a periodic lat/lon tile joins its west and east
//! edges). Edges that collapse to a single point, such as the pole row of a
//! lat/lon tile, never form contacts.

use crate::tile::TileGrid;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Chord distance under which two corners are considered identical.
const MATCH_TOLERANCE: f64 = 1.0e-8;

/// One of the four sides of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    West,
    East,
    South,
    North,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::West, Edge::East, Edge::South, Edge::North];

    /// Number of cells along this edge.
    pub fn cells(self, nx: usize, ny: usize) -> usize {
        match self {
            Edge::West | Edge::East => ny,
            Edge::South | Edge::North => nx,
        }
    }

    /// Halo coordinates of the `k`-th halo cell outside this edge.
    pub fn halo_cell(self, nx: usize, ny: usize, k: usize) -> (usize, usize) {
        match self {
            Edge::West => (0, k + 1),
            Edge::East => (nx + 1, k + 1),
            Edge::South => (k + 1, 0),
            Edge::North => (k + 1, ny + 1),
        }
    }

    /// Halo coordinates of the `k`-th interior cell along this edge.
    pub fn interior_cell(self, nx: usize, ny: usize, k: usize) -> (usize, usize) {
        match self {
            Edge::West => (1, k + 1),
            Edge::East => (nx, k + 1),
            Edge::South => (k + 1, 1),
            Edge::North => (k + 1, ny),
        }
    }

    /// The interior cell one further in from [`Edge::interior_cell`], or the
    /// same cell when the tile is a single cell wide.
    pub fn second_interior_cell(self, nx: usize, ny: usize, k: usize) -> (usize, usize) {
        match self {
            Edge::West => (2.min(nx), k + 1),
            Edge::East => ((nx - 1).max(1), k + 1),
            Edge::South => (k + 1, 2.min(ny)),
            Edge::North => (k + 1, (ny - 1).max(1)),
        }
    }
}

/// A pair of coincident tile edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub tile1: usize,
    pub edge1: Edge,
    pub tile2: usize,
    pub edge2: Edge,
    /// The second edge runs in the opposite index direction.
    pub reversed: bool,
}

impl Contact {
    /// Cell position along `edge2` matching position `k` along `edge1`.
    #[inline]
    pub fn map_position(&self, k: usize, len: usize) -> usize {
        if self.reversed {
            len - 1 - k
        } else {
            k
        }
    }
}

fn is_degenerate(points: &[Vector3<f64>]) -> bool {
    points
        .windows(2)
        .all(|w| (w[1] - w[0]).norm() < MATCH_TOLERANCE)
}

fn sequences_match<'a, I>(a: &[Vector3<f64>], b: I) -> bool
where
    I: Iterator<Item = &'a Vector3<f64>>,
{
    a.iter()
        .zip(b)
        .all(|(p, q)| (p - q).norm() < MATCH_TOLERANCE)
}

/// Find all edge contacts among a set of tiles.
pub fn detect_contacts(tiles: &[TileGrid]) -> Vec<Contact> {
    let edges: Vec<(usize, Edge, Vec<Vector3<f64>>)> = tiles
        .iter()
        .enumerate()
        .flat_map(|(t, tile)| Edge::ALL.into_iter().map(move |e| (t, e, tile.edge_points(e))))
        .filter(|(_, _, points)| !is_degenerate(points))
        .collect();

    let mut contacts = Vec::new();
    for (a, (t1, e1, p1)) in edges.iter().enumerate() {
        for (t2, e2, p2) in edges.iter().skip(a + 1) {
            if p1.len() != p2.len() {
                continue;
            }
            let reversed = if sequences_match(p1, p2.iter()) {
                false
            } else if sequences_match(p1, p2.iter().rev()) {
                true
            } else {
                continue;
            };
            debug!(
                tile1 = *t1,
                edge1 = ?e1,
                tile2 = *t2,
                edge2 = ?e2,
                reversed,
                "Detected tile contact"
            );
            contacts.push(Contact {
                tile1: *t1,
                edge1: *e1,
                tile2: *t2,
                edge2: *e2,
                reversed,
            });
        }
    }
    contacts
}
