//! Core types shared by the builders and interpolators.

use crate::config::RegridConfig;
use mosaic_grid::Domain;
use serde::{Deserialize, Serialize};

/// Order of conservative interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConserveOrder {
    /// Area-weighted mean.
    First,
    /// Area-weighted mean with a gradient correction at each fragment's
    /// centroid.
    Second,
}

impl ConserveOrder {
    /// Numeric order (1 or 2), as stored in remap files.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    pub fn from_u8(order: u8) -> Option<Self> {
        match order {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            _ => None,
        }
    }
}

/// A cell of a source tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceCell {
    pub tile: usize,
    pub i: usize,
    pub j: usize,
}

/// A cell of the target tile an exchange grid belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetCell {
    pub i: usize,
    pub j: usize,
}

/// One overlap between a source cell and a target cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub source: SourceCell,
    pub target: TargetCell,
    /// Overlap area in m², always > 0.
    pub area: f64,
    /// Offset of the overlap centroid from the source cell centroid
    /// (eastward, northward; radians of arc). Second order only.
    pub offset: Option<(f64, f64)>,
}

/// The entries one worker owns: all overlaps whose target cell lies in its
/// sub-domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub domain: Domain,
    pub entries: Vec<ExchangeEntry>,
}

/// All overlaps between a source mosaic and one target tile.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeGrid {
    pub target_tile: usize,
    pub order: ConserveOrder,
    pub target_nx: usize,
    pub target_ny: usize,
    /// `(nx, ny)` of every source tile.
    pub source_dims: Vec<(usize, usize)>,
    pub partitions: Vec<Partition>,
}

impl ExchangeGrid {
    /// All entries in partition order.
    pub fn entries(&self) -> impl Iterator<Item = &ExchangeEntry> {
        self.partitions.iter().flat_map(|p| p.entries.iter())
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total overlap area in m².
    pub fn total_area(&self) -> f64 {
        self.entries().map(|e| e.area).sum()
    }

    /// Re-split the entries over a new set of sub-domains, keeping their
    /// relative order. Entries outside every domain are dropped.
    pub fn redistribute(&mut self, domains: &[Domain]) {
        let entries: Vec<ExchangeEntry> = self.entries().copied().collect();
        self.partitions = domains
            .iter()
            .map(|d| Partition {
                domain: *d,
                entries: entries
                    .iter()
                    .filter(|e| d.contains(e.target.i, e.target.j))
                    .copied()
                    .collect(),
            })
            .collect();
    }
}

/// Interpolated values on one target tile, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetField {
    pub nx: usize,
    pub ny: usize,
    pub data: Vec<f64>,
    /// Sentinel written where no valid source contributed.
    pub missing: f64,
}

impl TargetField {
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[j * self.nx + i]
    }

    pub fn is_missing(&self, i: usize, j: usize) -> bool {
        self.get(i, j) == self.missing
    }
}

/// Options that steer interpolation, fixed for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterpOptions {
    pub use_target_area: bool,
    pub fill_missing: bool,
    pub legacy_corner_check: bool,
}

impl From<&RegridConfig> for InterpOptions {
    fn from(config: &RegridConfig) -> Self {
        Self {
            use_target_area: config.use_target_area,
            fill_missing: config.fill_missing,
            legacy_corner_check: config.legacy_corner_check,
        }
    }
}

/// Global integrals before and after a conservative interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Σ value·area over source cells, m²·unit.
    pub input: f64,
    /// Σ value·area over target cells, m²·unit.
    pub output: f64,
}

impl ConservationReport {
    pub fn diff(&self) -> f64 {
        self.output - self.input
    }

    /// `|diff| / |input|`, or `|diff|` when the input integral is zero.
    pub fn relative_error(&self) -> f64 {
        if self.input == 0.0 {
            self.diff().abs()
        } else {
            (self.diff() / self.input).abs()
        }
    }
}
