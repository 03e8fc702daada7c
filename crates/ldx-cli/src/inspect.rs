//! `ldx inspect`: summarize what a cache file holds.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use ldx_cache::format::extension_key;
use ldx_cache::{CacheStore, LoadReport, PathNormalizer, PathTable, SEPARATOR};
use serde::Serialize;

/// Mod roots shown in the text report
const TOP_ROOTS: usize = 40;
const SAMPLES_PER_EXTENSION: usize = 2;

#[derive(Debug, Serialize)]
pub struct Count {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub file: String,
    pub format: String,
    pub total_paths: usize,
    pub compressed_bytes: usize,
    pub inflated_bytes: usize,
    pub load_ms: f64,
    /// `None` when the file carries no metadata block
    pub built_at: Option<String>,
    /// Whether the counts below were read from the file or recomputed
    pub counts_from_metadata: bool,
    pub extensions: Vec<Count>,
    pub roots: Vec<Count>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub samples: BTreeMap<String, Vec<String>>,
    pub diagnostics: Vec<String>,
}

fn format_build_time(ms: u64) -> Option<String> {
    let ms = i64::try_from(ms).ok()?;
    DateTime::<Utc>::from_timestamp_millis(ms).map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn into_counts(pairs: impl IntoIterator<Item = (String, u32)>) -> Vec<Count> {
    pairs.into_iter().map(|(name, count)| Count { name, count }).collect()
}

fn ranked(counts: HashMap<&str, u32>) -> Vec<(String, u32)> {
    let mut items: Vec<(String, u32)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
}

/// Build the report from a loaded table
pub fn summarize(
    file: &Path,
    table: &PathTable,
    report: &LoadReport,
    normalizer: &PathNormalizer,
    with_samples: bool,
) -> CacheSummary {
    let marker = normalizer.root().map(|r| r.marker_prefix()).unwrap_or_default();

    let (extensions, roots, built_at, from_metadata) = match table.metadata() {
        Some(meta) => (
            meta.extension_counts.clone(),
            meta.root_counts.clone(),
            format_build_time(meta.build_time_ms),
            true,
        ),
        None => {
            let mut extensions: HashMap<&str, u32> = HashMap::new();
            let mut roots: HashMap<&str, u32> = HashMap::new();
            for path in table.paths() {
                *extensions.entry(extension_key(path)).or_default() += 1;
                let relative = path.strip_prefix(marker).unwrap_or(path);
                let root = relative.split(SEPARATOR).next().unwrap_or_default();
                *roots.entry(root).or_default() += 1;
            }
            (ranked(extensions), ranked(roots), None, false)
        }
    };

    let mut samples: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if with_samples {
        for path in table.paths() {
            let bucket = samples.entry(extension_key(path).to_string()).or_default();
            if bucket.len() < SAMPLES_PER_EXTENSION {
                bucket.push(path.clone());
            }
        }
    }

    CacheSummary {
        file: file.display().to_string(),
        format: format!("{:?}", table.format()),
        total_paths: table.len(),
        compressed_bytes: report.compressed_bytes,
        inflated_bytes: report.inflated_bytes,
        load_ms: report.elapsed.as_secs_f64() * 1000.0,
        built_at,
        counts_from_metadata: from_metadata,
        extensions: into_counts(extensions),
        roots: into_counts(roots.into_iter().take(TOP_ROOTS)),
        samples,
        diagnostics: table.diagnostics().iter().map(|d| format!("{:?}", d)).collect(),
    }
}

pub fn run(file: &Path, normalizer: PathNormalizer, samples: bool, json: bool) -> Result<()> {
    let store = CacheStore::from_file(file, normalizer);
    let (table, report) = store
        .load_with_report()
        .with_context(|| format!("Failed to load cache {}", file.display()))?;
    // A fresh store always measures its first load
    let report = report.context("Cache store was already loaded")?;
    let summary = summarize(file, &table, &report, store.normalizer(), samples);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &CacheSummary) {
    println!("{} {}", style("Cache:").bold(), summary.file);
    println!(
        "  Format:      {} ({} bytes -> {} bytes, {:.1} ms)",
        summary.format, summary.compressed_bytes, summary.inflated_bytes, summary.load_ms
    );
    println!(
        "  Built:       {}",
        summary.built_at.as_deref().unwrap_or("unknown")
    );
    println!("  Total paths: {}", style(summary.total_paths).cyan());

    for diagnostic in &summary.diagnostics {
        println!("  {} {}", style("warning:").yellow(), diagnostic);
    }

    let source = if summary.counts_from_metadata {
        "stored"
    } else {
        "recomputed"
    };
    println!();
    println!("{} ({})", style("Extensions").bold(), source);
    for c in &summary.extensions {
        println!("  {:>10}  {}", c.count, c.name);
    }

    println!();
    println!("{} (top {})", style("Mod roots").bold(), TOP_ROOTS);
    for c in &summary.roots {
        println!("  {:>10}  {}", c.count, c.name);
    }

    if !summary.samples.is_empty() {
        println!();
        println!("{}", style("Samples").bold());
        for (ext, paths) in &summary.samples {
            println!("  {}", style(ext).dim());
            for path in paths {
                println!("    {}", path);
            }
        }
    }
}
