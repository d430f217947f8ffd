//! Pipeline configuration
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (applied via [`FluxConfig::apply_overrides`])
//! 2. Environment variables (`FLUX_*`)
//! 3. Config file (TOML)
//! 4. Compiled defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ComputeError;

/// Environment variable overriding the output directory
pub const ENV_OUTPUT_DIR: &str = "FLUX_OUTPUT_DIR";

/// Environment variable overriding the minimum cluster size
pub const ENV_MIN_CLUSTER_SIZE: &str = "FLUX_MIN_CLUSTER_SIZE";

/// Default minimum cluster size for HDBSCAN
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 5;

/// Default output file prefix
pub const DEFAULT_FILE_PREFIX: &str = "mobility_clusters";

/// Additions to the fixed country tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Mobility name → stringency name
    pub extra_aliases: BTreeMap<String, String>,
    pub extra_exclusions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilityConfig {
    /// Keep only national rows (no sub-region and no metro area)
    pub national_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    /// Z-score each feature column before clustering
    pub standardize: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            min_samples: 1,
            standardize: true,
        }
    }
}

/// File format of the result sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    /// Single-sheet workbook
    #[default]
    Xlsx,
    Csv,
}

impl SheetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SheetFormat::Xlsx => "xlsx",
            SheetFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub format: SheetFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            format: SheetFormat::default(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    pub normalization: NormalizationConfig,
    pub mobility: MobilityConfig,
    pub clustering: ClusteringConfig,
    pub output: OutputConfig,
}

/// Command-line values that take precedence over every other layer
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_dir: Option<PathBuf>,
    pub min_cluster_size: Option<usize>,
    pub national_only: Option<bool>,
}

impl FluxConfig {
    /// Load configuration with layered resolution and validate the result.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ComputeError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;

        debug!(?config, "resolved configuration");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComputeError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ComputeError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ComputeError> {
        toml::from_str(toml_str).map_err(|e| ComputeError::ConfigError(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ComputeError> {
        toml::to_string_pretty(self).map_err(|e| ComputeError::ConfigError(e.to_string()))
    }

    /// Apply `FLUX_*` environment variables through the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ComputeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output.directory = PathBuf::from(dir);
        }
        if let Some(size) = lookup(ENV_MIN_CLUSTER_SIZE) {
            self.clustering.min_cluster_size = size.trim().parse().map_err(|_| {
                ComputeError::ConfigError(format!(
                    "{ENV_MIN_CLUSTER_SIZE} must be a positive integer, got '{size}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(dir) = &overrides.output_dir {
            self.output.directory = dir.clone();
        }
        if let Some(size) = overrides.min_cluster_size {
            self.clustering.min_cluster_size = size;
        }
        if let Some(national_only) = overrides.national_only {
            self.mobility.national_only = national_only;
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.clustering.min_cluster_size < 2 {
            return Err(ComputeError::ConfigError(
                "clustering.min_cluster_size must be at least 2".to_string(),
            ));
        }
        if self.clustering.min_samples == 0 {
            return Err(ComputeError::ConfigError(
                "clustering.min_samples must be at least 1".to_string(),
            ));
        }
        if self.output.file_prefix.trim().is_empty() {
            return Err(ComputeError::ConfigError(
                "output.file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
