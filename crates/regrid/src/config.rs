//! Configuration for the regridding engine.

use crate::error::{RegridError, Result};
use crate::types::ConserveOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Largest supported number of finer-step halvings.
const MAX_FINER_STEPS: u32 = 8;

/// Interpolation method, selected once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpMethod {
    /// First-order conservative (area-weighted mean).
    #[default]
    ConserveOrder1,
    /// Second-order conservative (gradient corrected).
    ConserveOrder2,
    /// Bilinear, cubed sphere to lat/lon only.
    Bilinear,
}

impl InterpMethod {
    /// Get the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConserveOrder1 => "conserve_order1",
            Self::ConserveOrder2 => "conserve_order2",
            Self::Bilinear => "bilinear",
        }
    }

    /// The conservative order, or `None` for bilinear.
    pub fn conserve_order(&self) -> Option<ConserveOrder> {
        match self {
            Self::ConserveOrder1 => Some(ConserveOrder::First),
            Self::ConserveOrder2 => Some(ConserveOrder::Second),
            Self::Bilinear => None,
        }
    }
}

impl FromStr for InterpMethod {
    type Err = RegridError;

    /// Parse from string (case-insensitive). Unknown names are an error.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "conserve_order1" | "conservative" => Ok(Self::ConserveOrder1),
            "conserve_order2" => Ok(Self::ConserveOrder2),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(RegridError::config(format!(
                "unknown interpolation method '{other}'"
            ))),
        }
    }
}

/// Configuration for one regridding invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridConfig {
    /// Interpolation method.
    pub method: InterpMethod,

    /// Normalize conservative results by the true target cell area instead
    /// of the overlapped area.
    pub use_target_area: bool,

    /// Log a conservation report after each conservative interpolation.
    pub check_conserve: bool,

    /// Number of 2x refinements of the bilinear target grid, coarsened back
    /// after interpolation.
    pub finer_steps: u32,

    /// Use the largest-weight corner instead of the sentinel when a bilinear
    /// stencil touches missing data.
    pub fill_missing: bool,

    /// Only check bilinear corners 0, 1 and 3 for missing values.
    pub legacy_corner_check: bool,

    /// Number of worker sub-domains per target tile (0 = one per rayon thread).
    pub workers: usize,

    /// Remap-weight cache file.
    pub remap_file: Option<PathBuf>,

    /// Write freshly built weights to `remap_file`.
    pub save_weights: bool,

    /// Deflate-compress cached weight payloads.
    pub compress_weights: bool,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            method: InterpMethod::ConserveOrder1,
            use_target_area: false,
            check_conserve: false,
            finer_steps: 0,
            fill_missing: false,
            legacy_corner_check: false,
            workers: 0,
            remap_file: None,
            save_weights: false,
            compress_weights: true,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

impl RegridConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REGRID_METHOD") {
            config.method = val.parse()?;
        }

        if let Ok(val) = std::env::var("REGRID_USE_TARGET_AREA") {
            config.use_target_area = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("REGRID_CHECK_CONSERVE") {
            config.check_conserve = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("REGRID_FINER_STEPS") {
            if let Ok(steps) = val.parse() {
                config.finer_steps = steps;
            }
        }

        if let Ok(val) = std::env::var("REGRID_FILL_MISSING") {
            config.fill_missing = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("REGRID_LEGACY_CORNER_CHECK") {
            config.legacy_corner_check = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("REGRID_WORKERS") {
            if let Ok(workers) = val.parse() {
                config.workers = workers;
            }
        }

        if let Ok(val) = std::env::var("REGRID_REMAP_FILE") {
            if !val.is_empty() {
                config.remap_file = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("REGRID_SAVE_WEIGHTS") {
            config.save_weights = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("REGRID_COMPRESS_WEIGHTS") {
            config.compress_weights = parse_flag(&val);
        }

        Ok(config)
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RegridError::config(e.to_string()))
    }

    /// Load a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.finer_steps > 0 && self.method != InterpMethod::Bilinear {
            return Err("finer_steps requires the bilinear method".to_string());
        }

        if self.finer_steps > MAX_FINER_STEPS {
            return Err(format!("finer_steps must be <= {MAX_FINER_STEPS}"));
        }

        if self.save_weights && self.remap_file.is_none() {
            return Err("save_weights requires remap_file".to_string());
        }

        Ok(())
    }

    /// Number of workers to decompose each target tile into.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            rayon::current_num_threads().max(1)
        } else {
            self.workers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("bilinear".parse::<InterpMethod>().unwrap(), InterpMethod::Bilinear);
        assert_eq!(
            "CONSERVE_ORDER2".parse::<InterpMethod>().unwrap(),
            InterpMethod::ConserveOrder2
        );
        assert!(matches!(
            "nearest".parse::<InterpMethod>(),
            Err(RegridError::Config(_))
        ));
        assert_eq!(InterpMethod::Bilinear.conserve_order(), None);
    }

    #[test]
    fn test_yaml_defaults_and_overrides() {
        let config = RegridConfig::from_yaml_str(
            "method: bilinear\nfiner_steps: 2\nremap_file: /tmp/weights.rmap\n",
        )
        .unwrap();
        assert_eq!(config.method, InterpMethod::Bilinear);
        assert_eq!(config.finer_steps, 2);
        assert!(config.compress_weights);
        assert_eq!(config.remap_file, Some(PathBuf::from("/tmp/weights.rmap")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_bad_method() {
        assert!(RegridConfig::from_yaml_str("method: nearest\n").is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = RegridConfig::default();
        assert!(config.validate().is_ok());

        config.finer_steps = 1;
        assert!(config.validate().is_err());

        config.method = InterpMethod::Bilinear;
        assert!(config.validate().is_ok());

        config.finer_steps = 9;
        assert!(config.validate().is_err());

        config.finer_steps = 0;
        config.save_weights = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let config = RegridConfig {
            workers: 3,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 3);
        assert!(RegridConfig::default().effective_workers() >= 1);
    }
}
