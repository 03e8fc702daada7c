//! Owned cache store: load once, query many, release on a lifecycle event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use ldx_config::{log_cache_debug, log_cache_info, log_cache_warn};

use crate::error::{CacheError, Result};
use crate::format::{parse_rap2, CacheFormat, ParseDiagnostic};
use crate::inflate::{Decompressor, ZlibDecompressor};
use crate::normalize::PathNormalizer;
use crate::source::{ByteSource, FileSource};
use crate::table::PathTable;

/// Summary of a successful load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub format: CacheFormat,
    pub entries: usize,
    /// Records that were empty or normalized to nothing
    pub skipped_empty: usize,
    pub compressed_bytes: usize,
    pub inflated_bytes: usize,
    pub generation: u64,
    pub elapsed: Duration,
}

/// Cache store.
///
/// Queries go through [`CacheStore::snapshot`], which hands out the loaded
/// table behind an `Arc`; a release only drops the store's own reference.
pub struct CacheStore {
    source: Box<dyn ByteSource>,
    decompressor: Box<dyn Decompressor>,
    normalizer: PathNormalizer,
    table: RwLock<Option<Arc<PathTable>>>,
    load_lock: Mutex<()>,
    generation: AtomicU64,
    load_attempts: AtomicU64,
}

impl CacheStore {
    pub fn new(
        source: Box<dyn ByteSource>,
        decompressor: Box<dyn Decompressor>,
        normalizer: PathNormalizer,
    ) -> Self {
        Self {
            source,
            decompressor,
            normalizer,
            table: RwLock::new(None),
            load_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            load_attempts: AtomicU64::new(0),
        }
    }

    /// Store reading the zlib blob at `path`
    pub fn from_file(path: impl Into<std::path::PathBuf>, normalizer: PathNormalizer) -> Self {
        Self::new(
            Box::new(FileSource::new(path)),
            Box::new(ZlibDecompressor::new()),
            normalizer,
        )
    }

    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    pub fn is_loaded(&self) -> bool {
        self.read_table().is_some()
    }

    /// Number of times the source was actually read
    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::Acquire)
    }

    /// Current table, if loaded
    pub fn snapshot(&self) -> Option<Arc<PathTable>> {
        self.read_table().clone()
    }

    /// Load the cache. A no-op when already loaded.
    ///
    /// Concurrent first callers serialize on an internal lock; exactly one
    /// of them reads the source. On failure the store stays unloaded.
    pub fn load(&self) -> Result<Arc<PathTable>> {
        self.load_with_report().map(|(table, _)| table)
    }

    /// Load and describe what was loaded.
    ///
    /// The report is `None` when the table was already loaded: sizes and
    /// timings are only known to the call that built it.
    pub fn load_with_report(&self) -> Result<(Arc<PathTable>, Option<LoadReport>)> {
        if let Some(table) = self.snapshot() {
            return Ok((table, None));
        }

        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = self.snapshot() {
            return Ok((table, None));
        }

        self.load_attempts.fetch_add(1, Ordering::AcqRel);
        let (table, report) = self.load_uncached()?;
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&table));

        log_cache_info!(
            "Cache loaded",
            source = tracing::field::display(self.source.describe()),
            entries = report.entries,
            skipped_empty = report.skipped_empty,
            compressed_bytes = report.compressed_bytes,
            inflated_bytes = report.inflated_bytes,
            generation = report.generation,
            elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
        );
        Ok((table, Some(report)))
    }

    fn load_uncached(&self) -> Result<(Arc<PathTable>, LoadReport)> {
        let started = Instant::now();

        let compressed = self.source.read_all().map_err(|e| {
            log_cache_warn!("Cache file unavailable", error = tracing::field::display(&e));
            CacheError::from(e)
        })?;

        let inflated = self.decompressor.decompress(&compressed).map_err(|e| {
            log_cache_warn!("Cache decompression failed", error = tracing::field::display(&e));
            e
        })?;

        let parsed = parse_rap2(&inflated).map_err(|e| {
            log_cache_warn!("Cache parse failed", error = tracing::field::display(&e));
            CacheError::from(e)
        })?;

        for diagnostic in &parsed.diagnostics {
            match diagnostic {
                ParseDiagnostic::TruncatedTrailer { trailing } => {
                    log_cache_debug!("Trailing bytes too short for metadata length", trailing = *trailing);
                }
                ParseDiagnostic::SuspiciousMetadataLength { declared, available } => {
                    log_cache_debug!(
                        "Suspicious metadata length",
                        declared = *declared,
                        available = *available
                    );
                }
                ParseDiagnostic::UnreadableMetadata { declared } => {
                    log_cache_debug!("Metadata block unreadable", declared = *declared);
                }
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let table = PathTable::build(&parsed.paths, &self.normalizer, generation).with_source_info(
            CacheFormat::Rap2,
            parsed.metadata,
            parsed.diagnostics,
        );

        if table.is_empty() {
            log_cache_warn!("Cache contains no usable entries", declared = parsed.declared);
            return Err(CacheError::EmptyCache);
        }

        let report = LoadReport {
            format: table.format(),
            entries: table.len(),
            skipped_empty: parsed.skipped_empty + table.dropped(),
            compressed_bytes: compressed.len(),
            inflated_bytes: inflated.len(),
            generation,
            elapsed: started.elapsed(),
        };
        Ok((Arc::new(table), report))
    }

    /// Drop the loaded table. Safe to call when unloaded.
    ///
    /// Outstanding snapshots stay readable; handles taken from them no
    /// longer resolve against a later load.
    pub fn release(&self) {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            log_cache_debug!("Cache released");
        }
    }

    fn read_table(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<PathTable>>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("source", &self.source.describe())
            .field("loaded", &self.is_loaded())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
