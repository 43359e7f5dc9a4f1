use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::paths::PathResolver;
use crate::store::Store;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Product name used for directories and data file prefixes
pub const DEFAULT_PRODUCT_NAME: &str = "minit";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// Overrides the platform application-data root (the folder holding `data/`)
    #[serde(default)]
    pub data_root: Option<String>,
    /// Overrides the version compared against the stored marker
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default = "default_scan_legacy")]
    pub scan_legacy: bool,
    /// Extra folders to treat as legacy data candidates
    #[serde(default)]
    pub extra_legacy_dirs: Vec<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            data_root: None,
            app_version: None,
            scan_legacy: default_scan_legacy(),
            extra_legacy_dirs: Vec::new(),
            log_filter: default_log_filter(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

fn default_product_name() -> String {
    DEFAULT_PRODUCT_NAME.to_string()
}

fn default_scan_legacy() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Could not determine application data directory")]
    DataDirError,
}

impl Config {
    /// Load configuration from file, or create default if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let mut config = Config::default();
            if let Err(e) = config.save_with_profile(profile) {
                tracing::warn!(
                    target: "minit",
                    event = "config_save_failed",
                    path = %config_path.display(),
                    error = %e
                );
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Load configuration from file, using production profile
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_profile(utils::Profile::Prod)
    }

    /// Save configuration to file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        let config_path = Self::get_config_path(profile)?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(DEFAULT_PRODUCT_NAME, profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Application-data root: the override if set, the platform default otherwise
    pub fn app_data_root(&self, profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        match &self.data_root {
            Some(root) if !root.trim().is_empty() => Ok(utils::expand_path(root)),
            _ => utils::get_app_data_root(&self.product_name, profile).ok_or(ConfigError::DataDirError),
        }
    }

    /// Version compared with the stored marker
    pub fn current_app_version(&self) -> String {
        self.app_version
            .clone()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| crate::APP_VERSION.to_string())
    }

    /// Resolver for this process: configured roots plus the running executable
    /// and environment
    pub fn path_resolver(&self, profile: utils::Profile) -> Result<PathResolver, ConfigError> {
        let root = self.app_data_root(profile)?;
        let extra = self.extra_legacy_dirs.iter().map(|dir| utils::expand_path(dir));
        Ok(PathResolver::from_environment(&self.product_name, root).with_extra_legacy_dirs(extra))
    }

    pub fn store(&self, profile: utils::Profile) -> Result<Store, ConfigError> {
        Ok(Store::new(self.path_resolver(profile)?)
            .with_app_version(self.current_app_version())
            .with_legacy_scan(self.scan_legacy))
    }
}
