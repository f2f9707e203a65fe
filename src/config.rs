// Configuration management for symdex

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Workspace-local control directory holding the index database.
pub const CONTROL_DIR: &str = ".symdex";
/// Configuration file looked up in the workspace root.
pub const CONFIG_FILE: &str = ".symdex.toml";

/// Location of the index database for a workspace root.
pub fn index_db_path(root: &Path) -> PathBuf {
    root.join(CONTROL_DIR).join("index.db")
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indexing: IndexingConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Directory names pruned before descent, in addition to hidden
    /// directories.
    pub ignore_dirs: Vec<String>,
    /// Files larger than this many bytes are never read.
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Worker pool size for indexing runs.
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indexing: IndexingConfig::default(),
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: vec![
                ".git".to_string(),
                ".hg".to_string(),
                ".svn".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
                "build".to_string(),
                "dist".to_string(),
                "__pycache__".to_string(),
                "venv".to_string(),
                ".venv".to_string(),
                "vendor".to_string(),
                ".cache".to_string(),
                ".mypy_cache".to_string(),
                ".pytest_cache".to_string(),
            ],
            max_file_size: 1_048_576,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a workspace root, falling back to defaults
    /// when `.symdex.toml` is absent or invalid.
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(CONFIG_FILE);

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.performance.threads == 0 {
            return Err(Error::Config("thread count must be greater than 0".into()));
        }

        if self.indexing.max_file_size == 0 {
            return Err(Error::Config(
                "max file size must be greater than 0".into(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "invalid log level: {}",
                self.logging.level
            )));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(Error::Config(format!(
                "invalid log format: {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.indexing.ignore_dirs.contains(&".git".to_string()));
        assert!(config
            .indexing
            .ignore_dirs
            .contains(&"node_modules".to_string()));
        assert_eq!(config.indexing.max_file_size, 1_048_576);
        assert!(config.performance.threads > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.performance.threads = 0;
        assert!(config.validate().is_err());
        config.performance.threads = 4;

        config.indexing.max_file_size = 0;
        assert!(config.validate().is_err());
        config.indexing.max_file_size = 1024;

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "info".to_string();

        config.logging.format = "fancy".to_string();
        assert!(config.validate().is_err());
        config.logging.format = "pretty".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            "[indexing]\nmax_file_size = 2048\n",
        )
        .unwrap();
        assert_eq!(config.indexing.max_file_size, 2048);
        assert!(config.indexing.ignore_dirs.contains(&".git".to_string()));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_project_dir(dir.path());
        assert_eq!(config.indexing.max_file_size, 1_048_576);
    }

    #[test]
    fn test_db_path_under_control_dir() {
        let path = index_db_path(Path::new("/work/proj"));
        assert_eq!(path, Path::new("/work/proj/.symdex/index.db"));
    }
}
