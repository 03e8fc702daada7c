//! Immutable, sorted path table with its fingerprint and prefix indexes.

use std::collections::HashMap;
use std::ops::Range;

use crate::fingerprint::{fingerprint, Fingerprint};
use crate::format::{CacheFormat, CacheMetadata, ParseDiagnostic};
use crate::normalize::PathNormalizer;

/// Stable handle to a table entry.
///
/// Only valid against the table of the same generation; a reload or
/// release makes every older handle resolve to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub index: u32,
    pub generation: u64,
}

/// Outcome of an exact lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveResult {
    pub entry: Option<EntryId>,
    /// Bucket size for the query's fingerprint, matched or not
    pub collision_candidates: usize,
}

impl ResolveResult {
    pub fn is_hit(&self) -> bool {
        self.entry.is_some()
    }
}

/// Loaded cache contents. Never mutated after construction.
#[derive(Debug)]
pub struct PathTable {
    paths: Vec<String>,
    buckets: HashMap<Fingerprint, Vec<u32>>,
    /// Inputs that normalized to nothing
    dropped: usize,
    generation: u64,
    format: CacheFormat,
    metadata: Option<CacheMetadata>,
    diagnostics: Vec<ParseDiagnostic>,
}

impl PathTable {
    /// Normalize, sort and index `raw_paths`.
    ///
    /// Paths that normalize to nothing are dropped. Duplicates are kept.
    pub fn build<I, S>(raw_paths: I, normalizer: &PathNormalizer, generation: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dropped = 0;
        let mut paths: Vec<String> = Vec::new();
        for raw in raw_paths {
            let path = normalizer.normalize(raw.as_ref());
            if path.is_empty() {
                dropped += 1;
            } else {
                paths.push(path);
            }
        }
        paths.sort_unstable();

        let mut buckets: HashMap<Fingerprint, Vec<u32>> = HashMap::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            buckets
                .entry(fingerprint(path))
                .or_default()
                .push(index as u32);
        }

        Self {
            paths,
            buckets,
            dropped,
            generation,
            format: CacheFormat::Unknown,
            metadata: None,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn with_source_info(
        mut self,
        format: CacheFormat,
        metadata: Option<CacheMetadata>,
        diagnostics: Vec<ParseDiagnostic>,
    ) -> Self {
        self.format = format;
        self.metadata = metadata;
        self.diagnostics = diagnostics;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Inputs to [`PathTable::build`] that normalized to the empty path
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn format(&self) -> CacheFormat {
        self.format
    }

    pub fn metadata(&self) -> Option<&CacheMetadata> {
        self.metadata.as_ref()
    }

    pub fn diagnostics(&self) -> &[ParseDiagnostic] {
        &self.diagnostics
    }

    /// All entries in sorted order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Number of fingerprints shared by more than one entry
    pub fn collision_buckets(&self) -> usize {
        self.buckets.values().filter(|b| b.len() > 1).count()
    }

    /// Look up a handle; `None` if it belongs to another generation
    pub fn get(&self, id: EntryId) -> Option<&str> {
        if id.generation != self.generation {
            return None;
        }
        self.paths.get(id.index as usize).map(String::as_str)
    }

    /// Exact match for an already-canonical path
    pub fn resolve_canonical(&self, canonical: &str) -> ResolveResult {
        if canonical.is_empty() {
            return ResolveResult::default();
        }
        let Some(bucket) = self.buckets.get(&fingerprint(canonical)) else {
            return ResolveResult::default();
        };

        let entry = bucket
            .iter()
            .copied()
            .find(|&index| self.paths[index as usize] == canonical)
            .map(|index| EntryId {
                index,
                generation: self.generation,
            });

        ResolveResult {
            entry,
            collision_candidates: bucket.len(),
        }
    }

    /// Index range of entries starting with `prefix`.
    ///
    /// `prefix` is canonical and ends in a separator, or is empty for "all".
    pub fn prefix_range(&self, prefix: &str) -> Range<usize> {
        prefix_range(&self.paths, prefix)
    }

    /// Entries starting with `prefix`, see [`PathTable::prefix_range`]
    pub fn prefix_slice(&self, prefix: &str) -> &[String] {
        &self.paths[self.prefix_range(prefix)]
    }
}

/// Half-open range of `sorted` whose entries start with `prefix`.
///
/// Everything carrying `prefix` sorts between `prefix` itself and `prefix`
/// with its last byte incremented. The increment wraps at 0xFF.
pub fn prefix_range<S: AsRef<str>>(sorted: &[S], prefix: &str) -> Range<usize> {
    let Some((&last, head)) = prefix.as_bytes().split_last() else {
        return 0..sorted.len();
    };

    let mut upper = Vec::with_capacity(prefix.len());
    upper.extend_from_slice(head);
    upper.push(last.wrapping_add(1));

    let lower = prefix.as_bytes();
    let start = sorted.partition_point(|p| p.as_ref().as_bytes() < lower);
    let end = start + sorted[start..].partition_point(|p| p.as_ref().as_bytes() < upper.as_slice());
    start..end
}
