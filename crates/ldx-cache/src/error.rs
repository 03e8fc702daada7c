use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the cache.
///
/// Every variant is recoverable: the store stays unloaded and callers fall
/// back to native traversal.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    CacheUnavailable(#[from] SourceError),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("malformed cache: {0}")]
    MalformedCache(#[from] FormatError),

    #[error("cache contains no usable entries")]
    EmptyCache,
}

impl From<flate2::DecompressError> for CacheError {
    fn from(value: flate2::DecompressError) -> Self {
        CacheError::DecompressionFailed(value.to_string())
    }
}

/// Failures of the byte source, kept distinguishable for diagnostics
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cache file not found at {0:?}")]
    NotFound(PathBuf),

    #[error("cache file is empty: {0:?}")]
    Empty(PathBuf),

    #[error("failed to read cache bytes from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Structural problems in a decompressed payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("payload too small for header ({len} bytes)")]
    TooSmall { len: usize },

    #[error("invalid magic {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("version mismatch (expected {expected}, got {found})")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("truncated reading record header at index {index}")]
    TruncatedRecordHeader { index: u32 },

    #[error("truncated reading path bytes at index {index}")]
    TruncatedPath { index: u32 },
}

pub type Result<T> = std::result::Result<T, CacheError>;
