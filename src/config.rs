//! Configuration module for the index builder.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.embix/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `EMBIX_` and use double
//! underscores to separate nested levels:
//! - `EMBIX_INDEXING__PARTITION_COUNT=4` sets `indexing.partition_count`
//! - `EMBIX_INDEXING__RECORD_LIMIT=1000` sets `indexing.record_limit`
//! - `EMBIX_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding the settings file and the default index.
pub const CONFIG_DIR: &str = ".embix";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "EMBIX_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration file already exists: {0}")]
    AlreadyExists(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory of the Tantivy record index
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Profile JSON describing the documents to index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<PathBuf>,

    /// Workspace root directory (where .embix is located)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Index build configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IndexingConfig {
    /// Concurrent partitions per document
    #[serde(default = "default_partition_count")]
    pub partition_count: usize,

    /// Documents with fewer rows are indexed in a single partition
    #[serde(default = "default_min_partition_size")]
    pub min_partition_size: u64,

    /// Maximum rows read per document (0 = no limit)
    #[serde(default)]
    pub record_limit: u64,

    /// Queued records per partition that trigger a flush
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Rows between progress reports
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Token ids start right above this value
    #[serde(default)]
    pub token_id_seed: u32,

    /// Column name prefix marking metadata columns
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `embix::indexing = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index")
}
fn default_partition_count() -> usize {
    2
}
fn default_min_partition_size() -> u64 {
    100
}
fn default_buffer_size() -> usize {
    100
}
fn default_progress_interval() -> u64 {
    10
}
fn default_metadata_prefix() -> String {
    "m_".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            profile_path: None,
            workspace_root: None,
            indexing: IndexingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            partition_count: default_partition_count(),
            min_partition_size: default_min_partition_size(),
            record_limit: 0,
            buffer_size: default_buffer_size(),
            progress_interval: default_progress_interval(),
            token_id_seed: 0,
            metadata_prefix: default_metadata_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> ConfigResult<Self> {
        let current = std::env::current_dir()?;
        let config_path = Self::find_workspace_config(&current)
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        let mut settings = Self::layered(&config_path, ENV_PREFIX)?;
        if settings.workspace_root.is_none() {
            settings.workspace_root = Self::workspace_root(&current);
        }
        Ok(settings)
    }

    /// Load configuration from a specific file, still honoring environment
    /// overrides
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::layered(path.as_ref(), ENV_PREFIX)
    }

    /// Defaults, then the TOML file if it exists, then `prefix`ed variables.
    fn layered(config_path: &Path, prefix: &str) -> ConfigResult<Self> {
        let settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels
            .merge(Env::prefixed(prefix).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract::<Settings>()
            .map_err(Box::new)?;
        Ok(settings)
    }

    /// Find `.embix/settings.toml` in `start` or any of its ancestors
    pub fn find_workspace_config(start: &Path) -> Option<PathBuf> {
        Self::workspace_root(start).map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Nearest ancestor of `start` (inclusive) containing a `.embix` directory
    pub fn workspace_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `root`
    pub fn init_config_file(root: impl AsRef<Path>, force: bool) -> ConfigResult<PathBuf> {
        let root = root.as_ref();
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists(config_path));
        }

        let settings = Settings {
            workspace_root: Some(root.to_path_buf()),
            ..Settings::default()
        };
        settings.save(&config_path)?;
        tracing::info!("[config] wrote default settings to {}", config_path.display());

        Ok(config_path)
    }

    /// Index path resolved against the workspace root when relative
    pub fn resolved_index_path(&self) -> PathBuf {
        self.resolve(&self.index_path)
    }

    /// Profile path resolved the same way, if one is configured
    pub fn resolved_profile_path(&self) -> Option<PathBuf> {
        self.profile_path.as_deref().map(|path| self.resolve(path))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.index_path, PathBuf::from(".embix/index"));
        assert_eq!(settings.indexing.partition_count, 2);
        assert_eq!(settings.indexing.min_partition_size, 100);
        assert_eq!(settings.indexing.buffer_size, 100);
        assert_eq!(settings.indexing.metadata_prefix, "m_");
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2
profile_path = "profiles/places.json"

[indexing]
partition_count = 4
record_limit = 500
metadata_prefix = "meta_"

[logging]
default = "info"

[logging.modules]
"embix::indexing" = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.profile_path, Some(PathBuf::from("profiles/places.json")));
        assert_eq!(settings.indexing.partition_count, 4);
        assert_eq!(settings.indexing.record_limit, 500);
        assert_eq!(settings.indexing.metadata_prefix, "meta_");
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["embix::indexing"], "debug");
        // Untouched values keep their defaults
        assert_eq!(settings.indexing.min_partition_size, 100);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.buffer_size = 7;
        settings.indexing.token_id_seed = 1000;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.buffer_size, 7);
        assert_eq!(loaded.indexing.token_id_seed, 1000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.indexing, IndexingConfig::default());
    }

    #[test]
    fn test_layered_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(
            &config_path,
            "[indexing]\npartition_count = 8\nbuffer_size = 50\n",
        )
        .unwrap();

        // A private prefix keeps this test independent of the others.
        unsafe {
            std::env::set_var("EMBIX_LAYERED_TEST_INDEXING__PARTITION_COUNT", "16");
            std::env::set_var("EMBIX_LAYERED_TEST_LOGGING__DEFAULT", "debug");
        }

        let settings = Settings::layered(&config_path, "EMBIX_LAYERED_TEST_").unwrap();

        // Environment variable overrides the config file
        assert_eq!(settings.indexing.partition_count, 16);
        // Config file value is used when no env var is set
        assert_eq!(settings.indexing.buffer_size, 50);
        // Env var overrides a default
        assert_eq!(settings.logging.default, "debug");

        unsafe {
            std::env::remove_var("EMBIX_LAYERED_TEST_INDEXING__PARTITION_COUNT");
            std::env::remove_var("EMBIX_LAYERED_TEST_LOGGING__DEFAULT");
        }
    }

    #[test]
    fn test_workspace_discovery_and_init() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert!(Settings::find_workspace_config(&nested).is_none());

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.exists());
        assert_eq!(Settings::find_workspace_config(&nested), Some(path.clone()));
        assert_eq!(Settings::workspace_root(&nested).as_deref(), Some(temp_dir.path()));

        assert!(matches!(
            Settings::init_config_file(temp_dir.path(), false),
            Err(ConfigError::AlreadyExists(_))
        ));
        Settings::init_config_file(temp_dir.path(), true).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.workspace_root.as_deref(), Some(temp_dir.path()));
        assert_eq!(
            loaded.resolved_index_path(),
            temp_dir.path().join(".embix").join("index")
        );
    }

    #[test]
    fn test_resolved_profile_path() {
        let mut settings = Settings::default();
        assert!(settings.resolved_profile_path().is_none());

        settings.profile_path = Some(PathBuf::from("profiles/places.json"));
        assert_eq!(
            settings.resolved_profile_path(),
            Some(PathBuf::from("profiles/places.json"))
        );

        settings.workspace_root = Some(PathBuf::from("/work"));
        assert_eq!(
            settings.resolved_profile_path(),
            Some(PathBuf::from("/work/profiles/places.json"))
        );

        settings.profile_path = Some(PathBuf::from("/etc/embix/places.json"));
        assert_eq!(
            settings.resolved_profile_path(),
            Some(PathBuf::from("/etc/embix/places.json"))
        );
    }
}
