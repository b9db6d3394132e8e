//! Per-tile field storage with a one-cell halo.

use crate::error::{GridError, Result};

/// Sentinel written into cells that receive no valid contribution when the
/// source field declares none of its own.
pub const DEFAULT_MISSING: f64 = -1.0e20;

/// Eastward and northward gradient of a field, per radian of arc, for the
/// interior cells of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Cells whose stencil touched a missing value. Present only when the
    /// field declares a missing sentinel.
    pub mask: Option<Vec<bool>>,
}

impl Gradient {
    /// Gradient at interior index `idx`, or zero when masked.
    #[inline]
    pub fn at(&self, idx: usize) -> (f64, f64) {
        match &self.mask {
            Some(mask) if mask[idx] => (0.0, 0.0),
            _ => (self.x[idx], self.y[idx]),
        }
    }
}

/// One level of a field on one tile.
///
/// Values are stored in halo'd layout `(nx + 2) × (ny + 2)`; interior cell
/// `(i, j)` sits at `(i + 1, j + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBuffer {
    nx: usize,
    ny: usize,
    data: Vec<f64>,
    missing: Option<f64>,
    gradient: Option<Gradient>,
}

impl FieldBuffer {
    /// Build a buffer from interior values in row-major order.
    ///
    /// The halo is initialised by replicating the nearest interior value;
    /// [`crate::Mosaic::update_halo`] replaces it with neighbour values.
    pub fn from_interior(nx: usize, ny: usize, values: &[f64], missing: Option<f64>) -> Result<Self> {
        if values.len() != nx * ny {
            return Err(GridError::shape_mismatch("field values", nx * ny, values.len()));
        }
        let mut data = vec![0.0; (nx + 2) * (ny + 2)];
        for jj in 0..ny + 2 {
            let j = jj.clamp(1, ny) - 1;
            for ii in 0..nx + 2 {
                let i = ii.clamp(1, nx) - 1;
                data[jj * (nx + 2) + ii] = values[j * nx + i];
            }
        }
        Ok(Self {
            nx,
            ny,
            data,
            missing,
            gradient: None,
        })
    }

    /// A field holding the same value everywhere.
    pub fn constant(nx: usize, ny: usize, value: f64) -> Self {
        Self {
            nx,
            ny,
            data: vec![value; (nx + 2) * (ny + 2)],
            missing: None,
            gradient: None,
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn missing(&self) -> Option<f64> {
        self.missing
    }

    /// The sentinel to write for cells without valid data.
    pub fn missing_or_default(&self) -> f64 {
        self.missing.unwrap_or(DEFAULT_MISSING)
    }

    /// Whether `value` equals the declared missing sentinel.
    #[inline]
    pub fn is_missing(&self, value: f64) -> bool {
        matches!(self.missing, Some(m) if value == m)
    }

    /// Interior value `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(j + 1) * (self.nx + 2) + i + 1]
    }

    /// Value at halo coordinates `(ii, jj)`.
    #[inline]
    pub fn halo(&self, ii: usize, jj: usize) -> f64 {
        self.data[jj * (self.nx + 2) + ii]
    }

    #[inline]
    pub fn set_halo(&mut self, ii: usize, jj: usize, value: f64) {
        self.data[jj * (self.nx + 2) + ii] = value;
    }

    /// Interior values, row-major.
    pub fn interior(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.nx * self.ny);
        for j in 0..self.ny {
            for i in 0..self.nx {
                out.push(self.get(i, j));
            }
        }
        out
    }

    pub fn gradient(&self) -> Option<&Gradient> {
        self.gradient.as_ref()
    }

    /// Attach a gradient; its arrays must cover the interior cells.
    pub fn set_gradient(&mut self, gradient: Gradient) -> Result<()> {
        let n = self.nx * self.ny;
        if gradient.x.len() != n {
            return Err(GridError::shape_mismatch("gradient x", n, gradient.x.len()));
        }
        if gradient.y.len() != n {
            return Err(GridError::shape_mismatch("gradient y", n, gradient.y.len()));
        }
        if let Some(mask) = &gradient.mask {
            if mask.len() != n {
                return Err(GridError::shape_mismatch("gradient mask", n, mask.len()));
            }
        }
        self.gradient = Some(gradient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_and_replicated_halo() {
        let field = FieldBuffer::from_interior(2, 2, &[1.0, 2.0, 3.0, 4.0], None).unwrap();
        assert_eq!(field.get(1, 0), 2.0);
        assert_eq!(field.get(0, 1), 3.0);
        assert_eq!(field.halo(0, 0), 1.0);
        assert_eq!(field.halo(3, 3), 4.0);
        assert_eq!(field.interior(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_missing_sentinel() {
        let field = FieldBuffer::from_interior(1, 1, &[5.0], Some(-999.0)).unwrap();
        assert!(field.is_missing(-999.0));
        assert!(!field.is_missing(5.0));
        assert_eq!(field.missing_or_default(), -999.0);
        let plain = FieldBuffer::constant(1, 1, 5.0);
        assert!(!plain.is_missing(DEFAULT_MISSING));
        assert_eq!(plain.missing_or_default(), DEFAULT_MISSING);
    }

    #[test]
    fn test_gradient_shape_and_mask() {
        let mut field = FieldBuffer::constant(2, 1, 0.0);
        assert!(field
            .set_gradient(Gradient { x: vec![1.0], y: vec![0.0; 2], mask: None })
            .is_err());
        field
            .set_gradient(Gradient {
                x: vec![1.0, 2.0],
                y: vec![3.0, 4.0],
                mask: Some(vec![false, true]),
            })
            .unwrap();
        let g = field.gradient().unwrap();
        assert_eq!(g.at(0), (1.0, 3.0));
        assert_eq!(g.at(1), (0.0, 0.0));
    }
}
