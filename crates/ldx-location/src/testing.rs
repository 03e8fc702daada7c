//! In-memory doubles for the host protocol.
//!
//! `MemoryBackend` stands in for the host's loose-file location: a map of
//! canonical paths to bytes that records which paths it was asked for and
//! how often its native traversal ran.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ldx_cache::format::{compress, encode_payload};
use ldx_cache::{CacheStore, MemorySource, PathNormalizer, ZlibDecompressor};

use crate::facade::ResolutionFacade;
use crate::protocol::{ErrorCode, Location, LooseFileBackend, Result, Traverser};

/// Name announced by the in-memory backend's native traversal
pub const MEMORY_BACKEND_NAME: &str = "MemoryLooseFiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: BTreeMap<String, Vec<u8>>,
    normalizer: PathNormalizer,
    requested: Mutex<Vec<String>>,
    native_traversals: AtomicUsize,
}

impl MemoryBackend {
    /// Backend holding `files`, keyed by canonical path
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, bytes)| (path.to_string(), bytes.to_vec()))
                .collect(),
            normalizer: default_normalizer(),
            ..Self::default()
        }
    }

    /// Paths passed to stream and info calls, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn native_traversals(&self) -> usize {
        self.native_traversals.load(Ordering::SeqCst)
    }

    fn open(&self, path: &str) -> Result<&[u8]> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        self.files
            .get(path)
            .map(Vec::as_slice)
            .ok_or(ErrorCode::NotExist)
    }
}

impl Location for MemoryBackend {
    type Stream = Vec<u8>;
    type AsyncStream = Vec<u8>;
    type Info = MemoryInfo;

    fn create_stream(&self, path: &str, _read_only: bool) -> Result<Vec<u8>> {
        self.open(path).map(<[u8]>::to_vec)
    }

    fn create_async_stream(&self, path: &str, _read_only: bool) -> Result<Vec<u8>> {
        self.open(path).map(<[u8]>::to_vec)
    }

    fn traverse_prefix(&self, prefix: &str, traverser: &mut dyn Traverser) -> ErrorCode {
        self.native_traversals.fetch_add(1, Ordering::SeqCst);
        let prefix = self.normalizer.normalize_prefix(prefix);
        let mut found = false;
        for name in self.files.keys().filter(|k| k.starts_with(prefix.as_str())) {
            traverser.process_name(name, MEMORY_BACKEND_NAME);
            found = true;
        }
        if found {
            ErrorCode::None
        } else {
            ErrorCode::NotExist
        }
    }

    fn get_info(&self, path: &str) -> Result<MemoryInfo> {
        self.open(path).map(|bytes| MemoryInfo {
            size: bytes.len() as u64,
        })
    }

    fn get_info_with_traverser(
        &self,
        path: &str,
        _traverser: Option<&mut dyn Traverser>,
    ) -> Result<MemoryInfo> {
        self.get_info(path)
    }

    fn delete(&self, _path: &str) -> ErrorCode {
        ErrorCode::Unsupported
    }

    fn name(&self) -> &str {
        MEMORY_BACKEND_NAME
    }

    fn minimum_async_packet_size(&self) -> u32 {
        0
    }
}

impl LooseFileBackend for MemoryBackend {
    fn prefix(&self) -> &str {
        "memory"
    }
}

pub fn default_normalizer() -> PathNormalizer {
    PathNormalizer::with_root("data", "root")
}

/// Unloaded store over an in-memory RAP2 blob of `paths`
pub fn memory_store(paths: &[&str]) -> std::io::Result<Arc<CacheStore>> {
    let blob = compress(&encode_payload(paths, None))?;
    Ok(Arc::new(CacheStore::new(
        Box::new(MemorySource::new(blob)),
        Box::new(ZlibDecompressor::new()),
        default_normalizer(),
    )))
}

/// Facade over a loaded in-memory store of `paths`
pub fn loaded_facade(paths: &[&str]) -> Arc<ResolutionFacade> {
    let store = memory_store(paths).expect("Failed to build in-memory cache");
    store.load().expect("Failed to load in-memory cache");
    Arc::new(ResolutionFacade::new(store))
}
