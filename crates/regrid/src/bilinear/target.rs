//! Regular latitude/longitude target grids for bilinear interpolation.

use crate::error::{RegridError, Result};
use serde::{Deserialize, Serialize};

/// A regular lat/lon grid of `nlon × nlat` nodes.
///
/// Longitudes are cell-centred: node `i` sits at
/// `lon_begin + (i + 0.5) * (lon_end - lon_begin) / nlon`. Latitudes run
/// from `lat_begin` to `lat_end` inclusive, or are cell-centred when
/// `center_y` is set. Bounds are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonGrid {
    pub nlon: usize,
    pub nlat: usize,
    pub lon_begin: f64,
    pub lon_end: f64,
    pub lat_begin: f64,
    pub lat_end: f64,
    pub center_y: bool,
}

impl LatLonGrid {
    /// Global grid with nodes on both poles.
    pub fn global(nlon: usize, nlat: usize) -> Self {
        Self {
            nlon,
            nlat,
            lon_begin: 0.0,
            lon_end: 360.0,
            lat_begin: -90.0,
            lat_end: 90.0,
            center_y: false,
        }
    }

    /// Check the grid can carry bilinear output.
    pub fn validate(&self) -> Result<()> {
        if self.nlon == 0 || self.nlat < 2 {
            return Err(RegridError::config(format!(
                "lat/lon grid {}x{} needs at least one longitude and two latitudes",
                self.nlon, self.nlat
            )));
        }
        if !(self.lon_end > self.lon_begin) || self.lon_end - self.lon_begin > 360.0 + 1.0e-9 {
            return Err(RegridError::config(format!(
                "invalid longitude range [{}, {}]",
                self.lon_begin, self.lon_end
            )));
        }
        if !(self.lat_end > self.lat_begin) || self.lat_begin < -90.0 || self.lat_end > 90.0 {
            return Err(RegridError::config(format!(
                "invalid latitude range [{}, {}]",
                self.lat_begin, self.lat_end
            )));
        }
        Ok(())
    }

    /// Node counts after `steps` refinements: `(2^N·nlon, 2^N·(nlat−1)+1)`.
    pub fn fine_dims(&self, steps: u32) -> (usize, usize) {
        let factor = 1usize << steps;
        (factor * self.nlon, factor * (self.nlat - 1) + 1)
    }

    /// Whether the grid wraps all the way around in longitude.
    pub fn is_global_lon(&self) -> bool {
        (self.lon_end - self.lon_begin - 360.0).abs() < 1.0e-9
    }

    /// Node longitudes of the refined grid, radians.
    pub fn node_lons(&self, steps: u32) -> Vec<f64> {
        let (nlon, _) = self.fine_dims(steps);
        let dlon = (self.lon_end - self.lon_begin) / nlon as f64;
        (0..nlon)
            .map(|i| (self.lon_begin + (i as f64 + 0.5) * dlon).to_radians())
            .collect()
    }

    /// Node latitudes of the refined grid, radians.
    pub fn node_lats(&self, steps: u32) -> Vec<f64> {
        let (_, nlat) = self.fine_dims(steps);
        let range = self.lat_end - self.lat_begin;
        if self.center_y {
            let dlat = range / nlat as f64;
            (0..nlat)
                .map(|j| (self.lat_begin + (j as f64 + 0.5) * dlat).to_radians())
                .collect()
        } else {
            let dlat = range / (nlat - 1) as f64;
            (0..nlat)
                .map(|j| (self.lat_begin + j as f64 * dlat).to_radians())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_fine_dims() {
        let grid = LatLonGrid::global(8, 5);
        assert_eq!(grid.fine_dims(0), (8, 5));
        assert_eq!(grid.fine_dims(2), (32, 17));
    }

    #[test]
    fn test_node_coordinates() {
        let grid = LatLonGrid::global(4, 3);
        let lons = grid.node_lons(0);
        assert_approx_eq!(lons[0], 45f64.to_radians(), 1e-12);
        assert_approx_eq!(lons[3], 315f64.to_radians(), 1e-12);
        let lats = grid.node_lats(1);
        assert_eq!(lats.len(), 5);
        assert_approx_eq!(lats[0], -90f64.to_radians(), 1e-12);
        assert_approx_eq!(lats[2], 0.0, 1e-12);
        assert_approx_eq!(lats[4], 90f64.to_radians(), 1e-12);
    }

    #[test]
    fn test_center_y_latitudes() {
        let grid = LatLonGrid {
            center_y: true,
            ..LatLonGrid::global(4, 2)
        };
        let lats = grid.node_lats(0);
        assert_approx_eq!(lats[0], -45f64.to_radians(), 1e-12);
        assert_approx_eq!(lats[1], 45f64.to_radians(), 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(LatLonGrid::global(4, 3).validate().is_ok());
        assert!(LatLonGrid::global(4, 1).validate().is_err());
        let bad = LatLonGrid {
            lat_end: 95.0,
            ..LatLonGrid::global(4, 3)
        };
        assert!(bad.validate().is_err());
        assert!(LatLonGrid::global(4, 3).is_global_lon());
    }
}
