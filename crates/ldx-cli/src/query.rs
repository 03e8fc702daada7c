//! `ldx hash`, `ldx lookup` and `ldx list`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use console::style;
use ldx_cache::{fingerprint, CacheStore, PathNormalizer};
use ldx_location::ResolutionFacade;

/// Raw paths whose fingerprints the producer and the runtime must agree on
pub const PARITY_VECTORS: &[&str] = &[
    "textures/actors/character/face.dds",
    "meshes/armor/iron/ironhelmet.nif",
    "sound/voice/skyrim.esm/guard/hello.wav",
    "scripts/test.pex",
    r"Data\Textures\Example.DDS",
];

/// One row of `ldx hash` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRow {
    pub raw: String,
    pub normalized: String,
    pub fingerprint: u64,
}

pub fn hash_rows<S: AsRef<str>>(paths: &[S], normalizer: &PathNormalizer) -> Vec<HashRow> {
    paths
        .iter()
        .map(|raw| {
            let raw = raw.as_ref();
            let normalized = normalizer.normalize(raw);
            let fingerprint = if normalized.is_empty() {
                0
            } else {
                fingerprint(&normalized)
            };
            HashRow {
                raw: raw.to_string(),
                normalized,
                fingerprint,
            }
        })
        .collect()
}

pub fn hash(paths: &[String], normalizer: &PathNormalizer) {
    let rows = if paths.is_empty() {
        hash_rows(PARITY_VECTORS, normalizer)
    } else {
        hash_rows(paths, normalizer)
    };

    for row in rows {
        println!("{}", style(&row.raw).dim());
        println!("  normalized:  {}", row.normalized);
        println!("  fingerprint: 0x{:016X}", row.fingerprint);
    }
}

fn open(file: &Path, normalizer: PathNormalizer) -> Result<ResolutionFacade> {
    let store = Arc::new(CacheStore::from_file(file, normalizer));
    store
        .load()
        .with_context(|| format!("Failed to load cache {}", file.display()))?;
    Ok(ResolutionFacade::new(store))
}

pub fn lookup(file: &Path, normalizer: PathNormalizer, path: &str) -> Result<()> {
    let facade = open(file, normalizer)?;
    let canonical = facade.normalize(path);

    let Some(resolved) = facade.resolve(path) else {
        bail!("Not in cache: {} (as {})", path, canonical);
    };

    println!("{} {}", style("Found").green().bold(), resolved.as_str());
    println!("  fingerprint: 0x{:016X}", facade.fingerprint_of(path));
    println!("  entry:       #{}", resolved.id().index);
    if resolved.collision_candidates() > 1 {
        println!(
            "  {} {} entries share this fingerprint",
            style("note:").yellow(),
            resolved.collision_candidates()
        );
    }
    Ok(())
}

/// Cached paths under `prefix`, at most `limit` of them
pub fn list_paths(facade: &ResolutionFacade, prefix: &str, limit: Option<usize>) -> (Vec<String>, usize) {
    let matches = facade.paths_for_prefix(prefix);
    let shown = matches
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    (shown, matches.len())
}

pub fn list(file: &Path, normalizer: PathNormalizer, prefix: &str, limit: Option<usize>) -> Result<()> {
    let facade = open(file, normalizer)?;
    let (shown, total) = list_paths(&facade, prefix, limit);

    for path in &shown {
        println!("{}", path);
    }
    if shown.len() < total {
        eprintln!("{}", style(format!("... {} more", total - shown.len())).dim());
    }
    eprintln!("{} of {} paths under '{}'", shown.len(), total, prefix);
    Ok(())
}
