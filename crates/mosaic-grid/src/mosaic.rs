//! A mosaic: an ordered set of tiles joined along their edges.

use crate::contact::{detect_contacts, Contact, Edge};
use crate::error::{GridError, Result};
use crate::field::FieldBuffer;
use crate::tile::TileGrid;
use nalgebra::Vector3;
use tracing::info;

/// Tiles plus the contacts between them.
///
/// Construction detects contacts and fills every tile's center halo from
/// its neighbours, so the halo centers used by gradient stencils and the
/// bilinear search are the real neighbouring cell centers.
#[derive(Debug, Clone)]
pub struct Mosaic {
    name: String,
    tiles: Vec<TileGrid>,
    contacts: Vec<Contact>,
}

impl Mosaic {
    pub fn new(name: impl Into<String>, mut tiles: Vec<TileGrid>) -> Result<Self> {
        let name = name.into();
        if tiles.is_empty() {
            return Err(GridError::invalid_tile(&name, "mosaic has no tiles"));
        }

        let contacts = detect_contacts(&tiles);

        let mut updates: Vec<(usize, usize, usize, Vector3<f64>)> = Vec::new();
        for c in &contacts {
            for_each_halo_pair(&tiles, c, |dst_tile, (hi, hj), src_tile, (si, sj)| {
                updates.push((dst_tile, hi, hj, *tiles[src_tile].center(si, sj)));
            });
        }
        for (t, hi, hj, v) in updates {
            tiles[t].set_center(hi, hj, v);
        }
        for tile in &mut tiles {
            tile.finalize_halo();
        }

        info!(
            mosaic = %name,
            tiles = tiles.len(),
            contacts = contacts.len(),
            "Built mosaic"
        );

        Ok(Self {
            name,
            tiles,
            contacts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tiles(&self) -> &[TileGrid] {
        &self.tiles
    }

    pub fn tile(&self, index: usize) -> Result<&TileGrid> {
        self.tiles.get(index).ok_or(GridError::TileOutOfRange {
            index,
            count: self.tiles.len(),
        })
    }

    pub fn ntiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Fill the halo of one field buffer per tile from neighbouring tiles.
    ///
    /// Halo cells across a contact take the neighbouring interior value.
    /// Halo cells on a free edge keep the replicated edge value. Corner halo
    /// cells take the mean of their two edge neighbours, or the sentinel if
    /// either is missing.
    pub fn update_halo(&self, fields: &mut [FieldBuffer]) -> Result<()> {
        if fields.len() != self.tiles.len() {
            return Err(GridError::shape_mismatch(
                format!("{} field tiles", self.name),
                self.tiles.len(),
                fields.len(),
            ));
        }
        for (t, (tile, field)) in self.tiles.iter().zip(fields.iter()).enumerate() {
            if field.nx() != tile.nx() || field.ny() != tile.ny() {
                return Err(GridError::shape_mismatch(
                    format!("field on tile {t}"),
                    tile.ncells(),
                    field.nx() * field.ny(),
                ));
            }
        }

        for field in fields.iter_mut() {
            let (nx, ny) = (field.nx(), field.ny());
            for edge in Edge::ALL {
                for k in 0..edge.cells(nx, ny) {
                    let (hi, hj) = edge.halo_cell(nx, ny, k);
                    let (ii, ij) = edge.interior_cell(nx, ny, k);
                    let v = field.halo(ii, ij);
                    field.set_halo(hi, hj, v);
                }
            }
        }

        let mut updates: Vec<(usize, usize, usize, f64)> = Vec::new();
        for c in &self.contacts {
            for_each_halo_pair(&self.tiles, c, |dst_tile, (hi, hj), src_tile, (si, sj)| {
                updates.push((dst_tile, hi, hj, fields[src_tile].halo(si, sj)));
            });
        }
        for (t, hi, hj, v) in updates {
            fields[t].set_halo(hi, hj, v);
        }

        for field in fields.iter_mut() {
            let (nx, ny) = (field.nx(), field.ny());
            let corners = [
                ((0, 0), (1, 0), (0, 1)),
                ((nx + 1, 0), (nx, 0), (nx + 1, 1)),
                ((0, ny + 1), (1, ny + 1), (0, ny)),
                ((nx + 1, ny + 1), (nx, ny + 1), (nx + 1, ny)),
            ];
            for ((ci, cj), (ai, aj), (bi, bj)) in corners {
                let a = field.halo(ai, aj);
                let b = field.halo(bi, bj);
                let v = if field.is_missing(a) || field.is_missing(b) {
                    field.missing_or_default()
                } else {
                    0.5 * (a + b)
                };
                field.set_halo(ci, cj, v);
            }
        }
        Ok(())
    }
}

/// Visit every (halo cell, source interior cell) pair a contact defines, in
/// both directions.
fn for_each_halo_pair<F>(tiles: &[TileGrid], c: &Contact, mut visit: F)
where
    F: FnMut(usize, (usize, usize), usize, (usize, usize)),
{
    let t1 = &tiles[c.tile1];
    let t2 = &tiles[c.tile2];
    let len = c.edge1.cells(t1.nx(), t1.ny());
    for k in 0..len {
        let k2 = c.map_position(k, len);
        let halo1 = c.edge1.halo_cell(t1.nx(), t1.ny(), k);
        let inner1 = c.edge1.interior_cell(t1.nx(), t1.ny(), k);
        let halo2 = c.edge2.halo_cell(t2.nx(), t2.ny(), k2);
        let inner2 = c.edge2.interior_cell(t2.nx(), t2.ny(), k2);
        visit(c.tile1, halo1, c.tile2, inner2);
        visit(c.tile2, halo2, c.tile1, inner1);
    }
}
