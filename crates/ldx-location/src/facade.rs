//! Per-path request API over the loaded cache.

use std::ops::{Deref, Range};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ldx_cache::{fingerprint, CacheStore, EntryId, Fingerprint, PathTable, ResolveResult};

/// A resolved entry that keeps its table alive
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    table: Arc<PathTable>,
    id: EntryId,
    collision_candidates: usize,
}

impl ResolvedPath {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn collision_candidates(&self) -> usize {
        self.collision_candidates
    }

    pub fn as_str(&self) -> &str {
        // The id was issued by this very table
        self.table.get(self.id).unwrap_or_default()
    }
}

impl Deref for ResolvedPath {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

/// Sorted entries under a prefix, borrowed from a table snapshot
#[derive(Debug, Clone, Default)]
pub struct PrefixMatches {
    table: Option<Arc<PathTable>>,
    range: Range<usize>,
}

impl PrefixMatches {
    pub fn generation(&self) -> Option<u64> {
        self.table.as_ref().map(|t| t.generation())
    }
}

impl Deref for PrefixMatches {
    type Target = [String];

    fn deref(&self) -> &[String] {
        match &self.table {
            Some(table) => &table.paths()[self.range.clone()],
            None => &[],
        }
    }
}

/// Snapshot of the resolution counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    /// Lookups whose fingerprint bucket held more than one entry
    pub collisions: u64,
    pub prefix_queries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    collisions: AtomicU64,
    prefix_queries: AtomicU64,
}

/// Exact resolution and prefix listing against a [`CacheStore`].
///
/// Never loads the store itself. An unloaded store answers every query with
/// an empty result.
#[derive(Debug)]
pub struct ResolutionFacade {
    store: Arc<CacheStore>,
    counters: Counters,
}

impl ResolutionFacade {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Canonical form of a raw request path
    pub fn normalize(&self, raw: &str) -> String {
        self.store.normalizer().normalize(raw)
    }

    /// Fingerprint of a raw request path, 0 for the empty path
    pub fn fingerprint_of(&self, raw: &str) -> Fingerprint {
        let canonical = self.normalize(raw);
        if canonical.is_empty() {
            0
        } else {
            fingerprint(&canonical)
        }
    }

    /// Exact lookup returning a stable handle
    pub fn resolve_path(&self, raw: &str) -> ResolveResult {
        self.lookup(raw).0
    }

    /// Exact lookup returning the entry itself
    pub fn resolve(&self, raw: &str) -> Option<ResolvedPath> {
        let (result, table) = self.lookup(raw);
        match (result.entry, table) {
            (Some(id), Some(table)) => Some(ResolvedPath {
                table,
                id,
                collision_candidates: result.collision_candidates,
            }),
            _ => None,
        }
    }

    fn lookup(&self, raw: &str) -> (ResolveResult, Option<Arc<PathTable>>) {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let canonical = self.normalize(raw);
        let table = match self.store.snapshot() {
            Some(table) if !canonical.is_empty() => table,
            _ => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return (ResolveResult::default(), None);
            }
        };

        let result = table.resolve_canonical(&canonical);
        if result.collision_candidates > 1 {
            self.counters.collisions.fetch_add(1, Ordering::Relaxed);
        }
        if result.is_hit() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        (result, Some(table))
    }

    /// Path of a handle from [`ResolutionFacade::resolve_path`], while its
    /// generation is still loaded
    pub fn entry_path(&self, id: EntryId) -> Option<String> {
        self.store
            .snapshot()
            .and_then(|table| table.get(id).map(str::to_string))
    }

    /// Every cached path under a raw traversal prefix
    pub fn paths_for_prefix(&self, raw_prefix: &str) -> PrefixMatches {
        self.counters.prefix_queries.fetch_add(1, Ordering::Relaxed);
        let Some(table) = self.store.snapshot() else {
            return PrefixMatches::default();
        };
        let prefix = self.store.normalizer().normalize_prefix(raw_prefix);
        let range = table.prefix_range(&prefix);
        PrefixMatches {
            table: Some(table),
            range,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.store.snapshot().map_or(0, |t| t.len())
    }

    pub fn stats(&self) -> ResolutionStats {
        ResolutionStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            collisions: self.counters.collisions.load(Ordering::Relaxed),
            prefix_queries: self.counters.prefix_queries.load(Ordering::Relaxed),
        }
    }
}
