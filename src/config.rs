//! Engine configuration.
//!
//! Values come from [`EngineConfig::default`], optionally a JSON file, and
//! finally the environment:
//!
//! - `LANCET_INDEX_ALGORITHM`: default algorithm for new libraries

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{LancetError, Result};
use crate::vector::index::{BuildOptions, IndexAlgorithm};

/// Environment variable overriding [`EngineConfig::default_algorithm`].
pub const INDEX_ALGORITHM_ENV: &str = "LANCET_INDEX_ALGORITHM";

/// Configuration of a [`crate::database::Database`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Algorithm for libraries created without an explicit one.
    pub default_algorithm: IndexAlgorithm,
    /// Maximum number of points in a Ball-Tree leaf.
    pub ball_tree_leaf_size: usize,
    /// Point count from which brute-force scans and batch normalization run
    /// on the rayon thread pool.
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let build = BuildOptions::default();
        Self {
            default_algorithm: IndexAlgorithm::default(),
            ball_tree_leaf_size: build.leaf_size,
            parallel_threshold: build.parallel_threshold,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ball_tree_leaf_size == 0 {
            return Err(LancetError::invalid_config(
                "ball_tree_leaf_size must be at least 1",
            ));
        }
        if self.parallel_threshold == 0 {
            return Err(LancetError::invalid_config(
                "parallel_threshold must be at least 1",
            ));
        }
        Ok(())
    }

    /// Read a JSON file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(INDEX_ALGORITHM_ENV) {
            self.default_algorithm = IndexAlgorithm::parse_str(&value).map_err(|_| {
                LancetError::invalid_config(format!(
                    "{INDEX_ALGORITHM_ENV}={value} is not a known index algorithm"
                ))
            })?;
        }
        Ok(self)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            leaf_size: self.ball_tree_leaf_size,
            parallel_threshold: self.parallel_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_algorithm, IndexAlgorithm::KdTree);
        assert_eq!(config.ball_tree_leaf_size, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_algorithm": "ball_tree", "ball_tree_leaf_size": 4}}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_algorithm, IndexAlgorithm::BallTree);
        assert_eq!(config.ball_tree_leaf_size, 4);
        assert_eq!(config.parallel_threshold, 1024);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"ball_tree_leaf_size": 0}}"#).unwrap();
        assert!(matches!(
            EngineConfig::from_file(file.path()),
            Err(LancetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_environment_override() {
        let config = EngineConfig::default()
            .apply_overrides_from(|name| (name == INDEX_ALGORITHM_ENV).then(|| "brute_force".into()))
            .unwrap();
        assert_eq!(config.default_algorithm, IndexAlgorithm::BruteForce);

        let err = EngineConfig::default()
            .apply_overrides_from(|_| Some("hnsw".into()))
            .unwrap_err();
        assert!(matches!(err, LancetError::InvalidConfig(_)));

        let untouched = EngineConfig::default().apply_overrides_from(|_| None).unwrap();
        assert_eq!(untouched, EngineConfig::default());
    }
}
