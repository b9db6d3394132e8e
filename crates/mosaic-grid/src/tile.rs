//! A single logically rectangular tile of a mosaic.

use crate::contact::Edge;
use crate::error::{GridError, Result};
use crate::polygon::{fix_lon, poly_area, LonLat};
use crate::sphere::{lonlat_to_xyz, mean_direction, xyz_to_lonlat};
use nalgebra::Vector3;
use std::f64::consts::PI;

/// Below this |sin| a tile is treated as unrotated.
const ROTATION_EPSILON: f64 = 1.0e-10;

/// Per-cell rotation between the tile's local vector frame and the
/// geographic east/north frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl Rotation {
    /// Cosine and sine of the rotation angle at interior cell `(i, j)`.
    #[inline]
    pub fn at(&self, index: usize) -> (f64, f64) {
        (self.cos[index], self.sin[index])
    }
}

/// A tile of `nx × ny` cells.
///
/// Corner coordinates are stored row-major with `nx + 1` corners per row.
/// Cell centers are stored with a one-cell halo ring: the interior cell
/// `(i, j)` lives at halo coordinates `(i + 1, j + 1)`, and halo coordinates
/// run over `0..=nx + 1` by `0..=ny + 1`. The halo is filled by
/// [`crate::Mosaic`] from neighbouring tiles; until then it is extrapolated
/// from the interior.
#[derive(Debug, Clone)]
pub struct TileGrid {
    name: String,
    nx: usize,
    ny: usize,
    lon: Vec<f64>,
    lat: Vec<f64>,
    centers: Vec<Vector3<f64>>,
    center_lon: Vec<f64>,
    center_lat: Vec<f64>,
    rotation: Option<Rotation>,
}

impl TileGrid {
    /// Build a tile from its corner longitudes and latitudes (radians).
    ///
    /// # Arguments
    /// * `name` - Tile name, used in diagnostics
    /// * `nx`, `ny` - Number of cells in each direction
    /// * `lon`, `lat` - `(nx + 1) * (ny + 1)` corner coordinates, row-major
    pub fn new(
        name: impl Into<String>,
        nx: usize,
        ny: usize,
        lon: Vec<f64>,
        lat: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if nx == 0 || ny == 0 {
            return Err(GridError::invalid_tile(&name, "tile has no cells"));
        }
        let ncorners = (nx + 1) * (ny + 1);
        if lon.len() != ncorners {
            return Err(GridError::shape_mismatch(format!("{name} corner lon"), ncorners, lon.len()));
        }
        if lat.len() != ncorners {
            return Err(GridError::shape_mismatch(format!("{name} corner lat"), ncorners, lat.len()));
        }
        if lon.iter().chain(lat.iter()).any(|v| !v.is_finite()) {
            return Err(GridError::invalid_tile(&name, "non-finite corner coordinate"));
        }

        let nhalo = (nx + 2) * (ny + 2);
        let mut tile = Self {
            name,
            nx,
            ny,
            lon,
            lat,
            centers: vec![Vector3::zeros(); nhalo],
            center_lon: vec![0.0; nhalo],
            center_lat: vec![0.0; nhalo],
            rotation: None,
        };

        for j in 0..ny {
            for i in 0..nx {
                let corners = [
                    tile.corner_xyz(i, j),
                    tile.corner_xyz(i + 1, j),
                    tile.corner_xyz(i + 1, j + 1),
                    tile.corner_xyz(i, j + 1),
                ];
                let idx = tile.halo_index(i + 1, j + 1);
                tile.centers[idx] = mean_direction(corners.iter());
            }
        }

        for edge in Edge::ALL {
            tile.extrapolate_halo(edge);
        }
        tile.finalize_halo();
        Ok(tile)
    }

    /// Attach a per-cell rotation angle (radians, interior cells, row-major).
    ///
    /// The rotation flag is only raised when some cell has `|sin| > 1e-10`.
    pub fn with_rotation(mut self, angles: &[f64]) -> Result<Self> {
        if angles.len() != self.nx * self.ny {
            return Err(GridError::shape_mismatch(
                format!("{} rotation", self.name),
                self.nx * self.ny,
                angles.len(),
            ));
        }
        let cos: Vec<f64> = angles.iter().map(|a| a.cos()).collect();
        let sin: Vec<f64> = angles.iter().map(|a| a.sin()).collect();
        self.rotation = if sin.iter().any(|s| s.abs() > ROTATION_EPSILON) {
            Some(Rotation { cos, sin })
        } else {
            None
        };
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Number of interior cells.
    pub fn ncells(&self) -> usize {
        self.nx * self.ny
    }

    pub fn rotation(&self) -> Option<&Rotation> {
        self.rotation.as_ref()
    }

    pub fn is_rotated(&self) -> bool {
        self.rotation.is_some()
    }

    /// Row-major index of interior cell `(i, j)`.
    #[inline]
    pub fn cell_index(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    /// Index into halo'd arrays for halo coordinates `(ii, jj)`.
    #[inline]
    pub fn halo_index(&self, ii: usize, jj: usize) -> usize {
        jj * (self.nx + 2) + ii
    }

    /// Corner `(i, j)` with `i <= nx`, `j <= ny`.
    #[inline]
    pub fn corner(&self, i: usize, j: usize) -> LonLat {
        let idx = j * (self.nx + 1) + i;
        LonLat::new(self.lon[idx], self.lat[idx])
    }

    #[inline]
    pub fn corner_xyz(&self, i: usize, j: usize) -> Vector3<f64> {
        let c = self.corner(i, j);
        lonlat_to_xyz(c.lon, c.lat)
    }

    /// Corners of interior cell `(i, j)`, counter-clockwise from the
    /// lower-left corner.
    pub fn cell_polygon(&self, i: usize, j: usize) -> Vec<LonLat> {
        vec![
            self.corner(i, j),
            self.corner(i + 1, j),
            self.corner(i + 1, j + 1),
            self.corner(i, j + 1),
        ]
    }

    /// Area of interior cell `(i, j)` in m².
    pub fn cell_area(&self, i: usize, j: usize) -> f64 {
        let mut poly = self.cell_polygon(i, j);
        fix_lon(&mut poly, PI);
        poly_area(&poly)
    }

    /// Areas of all interior cells, row-major.
    pub fn cell_areas(&self) -> Vec<f64> {
        let mut areas = Vec::with_capacity(self.ncells());
        for j in 0..self.ny {
            for i in 0..self.nx {
                areas.push(self.cell_area(i, j));
            }
        }
        areas
    }

    /// Cell center in halo coordinates as a unit vector.
    #[inline]
    pub fn center(&self, ii: usize, jj: usize) -> &Vector3<f64> {
        &self.centers[self.halo_index(ii, jj)]
    }

    /// Cell center in halo coordinates as longitude/latitude.
    #[inline]
    pub fn center_lonlat(&self, ii: usize, jj: usize) -> LonLat {
        let idx = self.halo_index(ii, jj);
        LonLat::new(self.center_lon[idx], self.center_lat[idx])
    }

    /// Corner unit vectors along an edge, in increasing index order.
    pub fn edge_points(&self, edge: Edge) -> Vec<Vector3<f64>> {
        match edge {
            Edge::West => (0..=self.ny).map(|j| self.corner_xyz(0, j)).collect(),
            Edge::East => (0..=self.ny).map(|j| self.corner_xyz(self.nx, j)).collect(),
            Edge::South => (0..=self.nx).map(|i| self.corner_xyz(i, 0)).collect(),
            Edge::North => (0..=self.nx).map(|i| self.corner_xyz(i, self.ny)).collect(),
        }
    }

    pub(crate) fn set_center(&mut self, ii: usize, jj: usize, v: Vector3<f64>) {
        let idx = self.halo_index(ii, jj);
        self.centers[idx] = v;
    }

    /// Fill an edge halo by linear extrapolation from the two nearest rows.
    pub(crate) fn extrapolate_halo(&mut self, edge: Edge) {
        let (nx, ny) = (self.nx, self.ny);
        for k in 0..edge.cells(nx, ny) {
            let (hi, hj) = edge.halo_cell(nx, ny, k);
            let (ai, aj) = edge.interior_cell(nx, ny, k);
            let (bi, bj) = edge.second_interior_cell(nx, ny, k);
            let a = *self.center(ai, aj);
            let v = if (bi, bj) == (ai, aj) {
                a
            } else {
                let b = *self.center(bi, bj);
                let guess = 2.0 * a - b;
                if guess.norm() > 0.0 {
                    guess.normalize()
                } else {
                    a
                }
            };
            self.set_center(hi, hj, v);
        }
    }

    /// Fill the four corner halo cells and refresh halo lon/lat.
    pub(crate) fn finalize_halo(&mut self) {
        let (nx, ny) = (self.nx, self.ny);
        let corners = [
            ((0, 0), (1, 0), (0, 1)),
            ((nx + 1, 0), (nx, 0), (nx + 1, 1)),
            ((0, ny + 1), (1, ny + 1), (0, ny)),
            ((nx + 1, ny + 1), (nx, ny + 1), (nx + 1, ny)),
        ];
        for ((ci, cj), (ai, aj), (bi, bj)) in corners {
            let v = mean_direction([*self.center(ai, aj), *self.center(bi, bj)].iter());
            self.set_center(ci, cj, v);
        }
        for (idx, c) in self.centers.iter().enumerate() {
            let (lon, lat) = xyz_to_lonlat(c);
            self.center_lon[idx] = lon;
            self.center_lat[idx] = lat;
        }
    }
}
