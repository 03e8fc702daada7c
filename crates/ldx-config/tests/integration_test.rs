//! Integration tests for ldx-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use std::path::PathBuf;

use ldx_config::path::{config_directory, config_file_path, game_data_directory};
use ldx_config::testing::TestEnvironment;
use ldx_config::Config;

/// First load writes a default config file that parses back to defaults
#[test]
fn test_load_creates_default_file() {
    let env = TestEnvironment::new().unwrap();
    let config_dir = env.game_root.join("fresh/SKSE/Plugins/LooseDex");

    let config = Config::load_from(&config_dir).unwrap();

    let file = config_file_path(&config_dir);
    assert!(file.exists());
    let written = std::fs::read_to_string(&file).unwrap();
    assert!(written.contains("[general]"));
    assert_eq!(config.cache, Config::default().cache);
    assert_eq!(config.normalization, Config::default().normalization);
}

/// Values on disk win over defaults
#[test]
fn test_load_existing_config_from_file() {
    let env = TestEnvironment::new().unwrap();
    env.write_config(
        r#"
[general]
verbose_logging = true
performance_diagnostics = true

[cache]
file_name = "custom_cache.bin"
directory = "/opt/caches"

[normalization]
root_marker = "data"
root_sentinel = "root"
"#,
    )
    .unwrap();

    let config = Config::load_from(&env.config_dir).unwrap();

    assert!(config.general.verbose_logging);
    assert!(config.general.performance_diagnostics);
    assert_eq!(
        config.cache_path(&env.config_dir),
        PathBuf::from("/opt/caches/custom_cache.bin")
    );
}

/// A broken file surfaces a TOML error instead of silently resetting
#[test]
fn test_invalid_toml_is_an_error() {
    let env = TestEnvironment::new().unwrap();
    env.write_config("[general\nenabled = ").unwrap();

    let err = Config::load_from(&env.config_dir).unwrap_err();
    assert!(matches!(err, ldx_config::ConfigError::Toml(_)));
}

/// Data directory discovery agrees with the environment layout
#[test]
fn test_environment_layout_matches_discovery() {
    let env = TestEnvironment::new().unwrap();
    let data_dir = game_data_directory(&env.game_root);
    assert_eq!(data_dir, env.data_dir);
    assert_eq!(config_directory(&data_dir), env.config_dir);
}
