//! `ldx build`: walk a loose-file tree and write a cache.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use ldx_cache::{CacheWriter, PathNormalizer, SEPARATOR};
use ldx_config::path::config_directory;
use ldx_config::DEFAULT_CACHE_FILE_NAME;
use walkdir::WalkDir;

/// Never worth indexing: plugins and archives load through their own
/// paths, the rest is tooling noise.
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    // Plugins
    ".esp", ".esm", ".esl",
    // Archives
    ".bsa", ".ba2",
    // Executables / code
    ".exe", ".dll", ".asi",
    // Plugin metadata
    ".skse",
    // Debug / build
    ".pdb", ".cdx",
    // Documentation
    ".md", ".pdf",
    // Backup / temp
    ".bak", ".tmp", ".temp", ".orig",
    ".log",
    // Version control
    ".gitignore", ".gitattributes",
    // Installer / shortcuts
    ".manifest", ".url", ".lnk",
];

/// Result of walking a tree
#[derive(Debug, Default)]
pub struct Collected {
    /// Data-relative paths, backslash-separated
    pub paths: Vec<String>,
    pub excluded: Vec<String>,
    pub unreadable: usize,
}

/// `<dir>/SKSE/Plugins/LooseDex/<cache file>`
pub fn default_output(directory: &Path) -> PathBuf {
    config_directory(directory).join(DEFAULT_CACHE_FILE_NAME)
}

fn canonical_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().to_ascii_lowercase();
    match ext.as_str() {
        "" | "." => None,
        e if e.starts_with('.') => Some(ext),
        _ => Some(format!(".{}", ext)),
    }
}

/// Effective exclusion set: defaults (optional) plus `extra`, minus `include`
pub fn excluded_extensions(defaults: bool, extra: &[String], include: &[String]) -> BTreeSet<String> {
    let mut set: BTreeSet<String> = if defaults {
        DEFAULT_EXCLUDED_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .collect()
    } else {
        BTreeSet::new()
    };
    set.extend(extra.iter().filter_map(|e| canonical_extension(e)));
    for ext in include.iter().filter_map(|e| canonical_extension(e)) {
        set.remove(&ext);
    }
    set
}

/// Lowercased extension of a file name, dot included.
///
/// Dotfiles count as all extension, so `.gitignore` can be excluded.
pub fn file_extension(name: &str) -> Option<String> {
    name.rfind('.')
        .map(|dot| name[dot..].to_ascii_lowercase())
        .filter(|ext| ext.len() > 1)
}

/// Walk `root`, skipping excluded extensions and the file at `skip`
pub fn collect(root: &Path, excluded: &BTreeSet<String>, skip: Option<&Path>) -> Collected {
    let mut collected = Collected::default();
    let progress = spinner();
    let mut last_tick = Instant::now();
    let separator = SEPARATOR.to_string();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                collected.unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() || skip.is_some_and(|s| entry.path() == s) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(separator.as_str());

        let name = entry.file_name().to_string_lossy();
        if file_extension(&name).is_some_and(|ext| excluded.contains(&ext)) {
            collected.excluded.push(relative);
        } else {
            collected.paths.push(relative);
        }

        if last_tick.elapsed() > Duration::from_millis(80) {
            progress.set_message(format!("{} files indexed", collected.paths.len()));
            last_tick = Instant::now();
        }
    }

    progress.finish_and_clear();
    collected
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message("Walking loose files...");
    pb
}

pub fn run(
    directory: &Path,
    output: &Path,
    excluded: &BTreeSet<String>,
    normalizer: PathNormalizer,
    show_excluded: bool,
) -> Result<()> {
    if !directory.is_dir() {
        bail!("Not a directory: {}", directory.display());
    }

    let started = Instant::now();
    let collected = collect(directory, excluded, Some(output));

    let mut writer = CacheWriter::new(normalizer);
    writer.extend(&collected.paths);
    if writer.is_empty() {
        bail!("No loose files to index under {}", directory.display());
    }
    writer
        .write_to(output)
        .with_context(|| format!("Failed to write cache to {}", output.display()))?;

    if show_excluded {
        for path in &collected.excluded {
            eprintln!("  {} {}", style("excluded").dim(), path);
        }
    }

    eprintln!(
        "{} {} paths -> {}",
        style("Indexed").green().bold(),
        writer.len(),
        output.display()
    );
    eprintln!(
        "  {} excluded, {} skipped, {} unreadable, {:.1} ms",
        collected.excluded.len(),
        writer.skipped(),
        collected.unreadable,
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldx_cache::CacheStore;
    use tempfile::TempDir;

    #[test]
    fn test_exclusion_set() {
        let set = excluded_extensions(true, &["PSD".to_string()], &[".esp".to_string()]);
        assert!(set.contains(".psd"));
        assert!(set.contains(".bsa"));
        assert!(!set.contains(".esp"));
        assert!(excluded_extensions(false, &[], &[]).is_empty());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Skyrim.ESM").as_deref(), Some(".esm"));
        assert_eq!(file_extension(".gitignore").as_deref(), Some(".gitignore"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_build_writes_loadable_cache() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("Data");
        std::fs::create_dir_all(data.join("meshes/armor")).unwrap();
        std::fs::write(data.join("meshes/armor/helmet.nif"), b"n").unwrap();
        std::fs::write(data.join("MyMod.esp"), b"p").unwrap();
        std::fs::write(data.join("readme.md"), b"r").unwrap();

        let output = default_output(&data);
        let excluded = excluded_extensions(true, &[], &[]);
        run(&data, &output, &excluded, PathNormalizer::with_root("data", "root"), false).unwrap();

        let store = CacheStore::from_file(&output, PathNormalizer::with_root("data", "root"));
        let table = store.load().unwrap();
        assert_eq!(table.paths(), &[r"data\meshes\armor\helmet.nif"]);

        // A rebuild never indexes its own output
        run(&data, &output, &excluded, PathNormalizer::with_root("data", "root"), false).unwrap();
        let store = CacheStore::from_file(&output, PathNormalizer::with_root("data", "root"));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_tree_is_an_error() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out.bin");
        let excluded = excluded_extensions(true, &[], &[]);
        assert!(run(temp.path(), &output, &excluded, PathNormalizer::new(), false).is_err());
    }
}
