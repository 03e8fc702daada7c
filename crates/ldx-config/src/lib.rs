//! # ldx-config
//!
//! Configuration management for LooseDex.
//!
//! Loads configuration from:
//! 1. `<Data>/SKSE/Plugins/LooseDex/config.toml` (written with defaults when missing)
//! 2. Environment variables (highest priority)
//!
//! The loose-file cache blob lives next to the config file unless
//! `[cache].directory` points elsewhere.

pub mod logging;
pub mod path;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, error, info};

/// Default cache blob name inside the config directory
pub const DEFAULT_CACHE_FILE_NAME: &str = "loosedex_vfs_cache.bin";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| {
    let config_dir = path::config_directory(&path::current_game_data_directory());
    let config = Config::load_from(&config_dir).unwrap_or_else(|e| {
        error!(
            "Settings failed to load from {:?}: {}; continuing with defaults",
            config_dir, e
        );
        Config::default()
    });
    RwLock::new(config)
});

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let config_dir = path::config_directory(&path::current_game_data_directory());
    let new_config = Config::load_from(&config_dir)?;
    install(new_config);
    Ok(())
}

/// Replace the global config (host glue and tests)
pub fn install(new_config: Config) {
    *CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = new_config;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub cache: CacheConfig,
    pub normalization: NormalizationConfig,
}

impl Config {
    /// Load config from `config_dir/config.toml`, creating the directory and a
    /// default file first when they don't exist.
    pub fn load_from(config_dir: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(config_dir)?;

        let file = path::config_file_path(config_dir);
        if !file.exists() {
            debug!("Writing default config to {:?}", file);
            std::fs::write(&file, Self::default_toml()?)?;
        }

        let contents = std::fs::read_to_string(&file)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok());

        info!(
            "Settings loaded from {:?} (enabled={}, verboseLogging={}, performanceDiagnostics={})",
            file,
            config.general.enabled,
            config.general.verbose_logging,
            config.general.performance_diagnostics
        );
        Ok(config)
    }

    /// Apply environment-style overrides through `lookup`.
    ///
    /// Recognized keys: `LDX_ENABLED`, `LDX_VERBOSE`, `LDX_PERF_DIAGNOSTICS`,
    /// `LDX_CACHE_PATH`. Unparseable boolean values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup("LDX_ENABLED").as_deref().and_then(parse_bool) {
            self.general.enabled = enabled;
        }
        if let Some(verbose) = lookup("LDX_VERBOSE").as_deref().and_then(parse_bool) {
            self.general.verbose_logging = verbose;
        }
        if let Some(perf) = lookup("LDX_PERF_DIAGNOSTICS")
            .as_deref()
            .and_then(parse_bool)
        {
            self.general.performance_diagnostics = perf;
        }
        if let Some(cache_path) = lookup("LDX_CACHE_PATH") {
            let cache_path = PathBuf::from(cache_path);
            if let Some(name) = cache_path.file_name() {
                self.cache.file_name = name.to_string_lossy().into_owned();
                self.cache.directory = cache_path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf);
            }
        }
    }

    /// Location of the cache blob for a given config directory
    pub fn cache_path(&self, config_dir: &Path) -> PathBuf {
        self.cache
            .directory
            .as_deref()
            .unwrap_or(config_dir)
            .join(&self.cache.file_name)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Feature switches consumed by the traversal hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Serve traversals from the cache at all
    pub enabled: bool,
    /// Per-call diagnostics (prefixes, match counts, bindings)
    pub verbose_logging: bool,
    /// Timing blocks for cached and native traversals
    pub performance_diagnostics: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            verbose_logging: false,
            performance_diagnostics: false,
        }
    }
}

/// Where the cache blob lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Blob file name
    pub file_name: String,
    /// Directory override (None = config directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_CACHE_FILE_NAME.to_string(),
            directory: None,
        }
    }
}

/// Virtual-root convention applied by path normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Leading component every canonical path carries (empty = none)
    pub root_marker: String,
    /// Component that names the root itself in traversal requests
    pub root_sentinel: String,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            root_marker: "data".to_string(),
            root_sentinel: "root".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.general.enabled);
        assert!(!config.general.verbose_logging);
        assert!(!config.general.performance_diagnostics);
        assert_eq!(config.cache.file_name, DEFAULT_CACHE_FILE_NAME);
        assert_eq!(config.normalization.root_marker, "data");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[normalization]"));
        assert!(toml_str.contains("enabled = true"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: Config = toml::from_str("[general]\nverbose_logging = true\n").unwrap();
        assert!(parsed.general.enabled);
        assert!(parsed.general.verbose_logging);
        assert_eq!(parsed.cache, CacheConfig::default());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LDX_ENABLED", "off"),
            ("LDX_VERBOSE", "1"),
            ("LDX_PERF_DIAGNOSTICS", "maybe"),
            ("LDX_CACHE_PATH", "/tmp/caches/custom.bin"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert!(!config.general.enabled);
        assert!(config.general.verbose_logging);
        assert!(!config.general.performance_diagnostics);
        assert_eq!(
            config.cache_path(Path::new("/ignored")),
            PathBuf::from("/tmp/caches/custom.bin")
        );
    }

    #[test]
    fn test_cache_path_defaults_to_config_dir() {
        let config = Config::default();
        assert_eq!(
            config.cache_path(Path::new("/game/Data/SKSE/Plugins/LooseDex")),
            PathBuf::from("/game/Data/SKSE/Plugins/LooseDex").join(DEFAULT_CACHE_FILE_NAME)
        );
    }
}
