//! Configuration for the add/drop conversion pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory layout under the root data directory
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Timezone used to interpret snapshot file-name timestamps
    #[serde(default)]
    pub timezone: TimezoneConfig,
}

/// Names of the working directories created under the root data directory.
///
/// Both trees are deleted and regenerated on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Directory for per-course intermediate CSV files
    #[serde(default = "default_intermediates_dir")]
    pub intermediates_dir: String,

    /// Directory for per-course JSON output documents
    #[serde(default = "default_products_dir")]
    pub products_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            intermediates_dir: default_intermediates_dir(),
            products_dir: default_products_dir(),
        }
    }
}

/// Processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Reduce intermediate files in parallel across courses.
    /// Safe because each course reduction is self-contained.
    #[serde(default = "default_true")]
    pub parallel_reduce: bool,

    /// Rayon thread pool size (null = num CPUs)
    #[serde(default)]
    pub rayon_threads: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_reduce: true,
            rayon_threads: None,
        }
    }
}

/// Timezone configuration.
///
/// Snapshot file names encode wall-clock timestamps with no offset, so the
/// offset used to interpret them must be explicit for runs to be reproducible
/// across machines. The scraper ran in Hong Kong, hence the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneConfig {
    /// Fixed UTC offset in hours applied to file-name timestamps
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // Try YAML first (it's a superset of JSON)
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.layout.intermediates_dir.is_empty() || self.layout.products_dir.is_empty() {
            anyhow::bail!("Layout directory names must not be empty");
        }
        if self.layout.intermediates_dir == self.layout.products_dir {
            anyhow::bail!("Intermediates and products directories must differ");
        }
        // Real-world UTC offsets span -12:00 to +14:00
        if self.timezone.utc_offset_hours < -12 || self.timezone.utc_offset_hours > 14 {
            anyhow::bail!("UTC offset must be between -12 and +14 hours");
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_intermediates_dir() -> String {
    "intermediates".to_string()
}
fn default_products_dir() -> String {
    "products".to_string()
}
fn default_true() -> bool {
    true
}
fn default_utc_offset_hours() -> i32 {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout.intermediates_dir, "intermediates");
        assert_eq!(config.layout.products_dir, "products");
        assert_eq!(config.timezone.utc_offset_hours, 8);
        assert!(config.processing.parallel_reduce);
    }

    #[test]
    fn test_config_validation_same_dirs() {
        let mut config = Config::default();
        config.layout.products_dir = config.layout.intermediates_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_offset_out_of_range() {
        let mut config = Config::default();
        config.timezone.utc_offset_hours = 15;
        assert!(config.validate().is_err());

        config.timezone.utc_offset_hours = -13;
        assert!(config.validate().is_err());

        config.timezone.utc_offset_hours = -12;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml_partial() {
        let config = Config::from_yaml("timezone:\n  utc_offset_hours: 0\n").unwrap();
        assert_eq!(config.timezone.utc_offset_hours, 0);
        // Unspecified sections fall back to defaults
        assert_eq!(config.layout.products_dir, "products");
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(
            parsed.timezone.utc_offset_hours,
            config.timezone.utc_offset_hours
        );
        assert_eq!(
            parsed.processing.parallel_reduce,
            config.processing.parallel_reduce
        );
    }
}
