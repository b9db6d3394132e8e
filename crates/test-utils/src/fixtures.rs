//! Common test fixtures for regridding tests.

use std::path::PathBuf;
use tempfile::TempDir;

/// Tolerances used across the test suites.
pub mod tolerance {
    /// Exact-geometry results (identity remaps, conservation on lat/lon).
    pub const EXACT: f64 = 1.0e-12;

    /// Bilinear weights must sum to one within this.
    pub const WEIGHT_SUM: f64 = 1.0e-9;

    /// Relative global-integral difference accepted for conservative remaps.
    pub const CONSERVATION: f64 = 1.0e-10;
}

pub use tolerance::WEIGHT_SUM as WEIGHT_SUM_EPS;

/// Sentinel used by fixtures that declare their own missing value.
pub const FIXTURE_MISSING: f64 = -999.0;

/// Cubed-sphere resolutions small enough for unit tests.
pub mod resolution {
    pub const TINY: usize = 4;
    pub const SMALL: usize = 12;
    pub const MEDIUM: usize = 24;
}

/// A complete regridding configuration in YAML.
pub const SAMPLE_CONFIG_YAML: &str = r#"
method: bilinear
finer_steps: 1
fill_missing: true
legacy_corner_check: false
workers: 2
remap_file: /tmp/remap_c12_to_latlon.bin
save_weights: true
compress_weights: false
"#;

/// A temporary directory for remap files, removed on drop.
pub struct RemapDir {
    dir: TempDir,
}

impl RemapDir {
    /// Create a fresh temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Path of `name` inside the directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Default for RemapDir {
    fn default() -> Self {
        Self::new()
    }
}
