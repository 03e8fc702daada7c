//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated game data directory
//! - The config directory beneath it
//! - Loose files and cache blobs written into them
//!
//! # Usage
//!
//! ```ignore
//! use ldx_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new()?;
//! env.write_cache(&compressed_blob)?;
//! let config = env.config();
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::path::{config_directory, config_file_path};
use crate::Config;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated game layout rooted in a temporary directory
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Game root (parent of `Data`)
    pub game_root: PathBuf,
    /// `<game_root>/Data`
    pub data_dir: PathBuf,
    /// `<Data>/SKSE/Plugins/LooseDex`
    pub config_dir: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let game_root = temp_dir.path().join(format!("game-{}", test_id));
        let data_dir = game_root.join("Data");
        let config_dir = config_directory(&data_dir);

        std::fs::create_dir_all(&config_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            game_root,
            data_dir,
            config_dir,
            test_id,
        })
    }

    /// Default config, with the cache pinned to this environment
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.cache.directory = Some(self.config_dir.clone());
        config
    }

    /// Path the default config resolves the cache blob to
    pub fn cache_path(&self) -> PathBuf {
        self.config().cache_path(&self.config_dir)
    }

    /// Write raw (already compressed) cache bytes
    pub fn write_cache(&self, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.cache_path();
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Write a config file into the config directory
    pub fn write_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = config_file_path(&self.config_dir);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Create a loose file below the data directory
    pub fn create_loose_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.data_dir.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
