//! Game directory discovery.
//!
//! The host is launched either from the game root or from its `Data`
//! directory; everything LooseDex owns lives under
//! `<Data>/SKSE/Plugins/LooseDex/`.

use std::path::{Path, PathBuf};

/// Components below the game data directory that hold config and cache
pub const CONFIG_SUBDIR: [&str; 3] = ["SKSE", "Plugins", "LooseDex"];

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the game data directory for a given working directory.
///
/// - `cwd` itself when it is named `Data`
/// - `cwd/Data` when that exists and is a directory
/// - `cwd` otherwise
pub fn game_data_directory(cwd: &Path) -> PathBuf {
    if cwd.file_name().is_some_and(|name| name == "Data") {
        return cwd.to_path_buf();
    }

    let candidate = cwd.join("Data");
    if candidate.is_dir() {
        return candidate;
    }

    cwd.to_path_buf()
}

/// Game data directory for the current process
pub fn current_game_data_directory() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    game_data_directory(&cwd)
}

/// `<data_dir>/SKSE/Plugins/LooseDex`
pub fn config_directory(data_dir: &Path) -> PathBuf {
    CONFIG_SUBDIR
        .iter()
        .fold(data_dir.to_path_buf(), |dir, part| dir.join(part))
}

/// `<config_dir>/config.toml`
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cwd_named_data() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("Data");
        std::fs::create_dir_all(&data).unwrap();
        assert_eq!(game_data_directory(&data), data);
    }

    #[test]
    fn test_data_subdirectory() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("Data");
        std::fs::create_dir_all(&data).unwrap();
        assert_eq!(game_data_directory(temp.path()), data);
    }

    #[test]
    fn test_data_file_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Data"), b"not a dir").unwrap();
        assert_eq!(game_data_directory(temp.path()), temp.path());
    }

    #[test]
    fn test_config_directory_layout() {
        let dir = config_directory(Path::new("/game/Data"));
        assert_eq!(dir, PathBuf::from("/game/Data/SKSE/Plugins/LooseDex"));
        assert_eq!(
            config_file_path(&dir),
            PathBuf::from("/game/Data/SKSE/Plugins/LooseDex/config.toml")
        );
    }
}
