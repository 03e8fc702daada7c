//! Where cache bytes come from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SourceError;

/// Reads the whole compressed cache into memory.
pub trait ByteSource: Send + Sync {
    /// Fail distinguishably for not-found, empty and I/O errors
    fn read_all(&self) -> Result<Vec<u8>, SourceError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Cache blob on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_all(&self) -> Result<Vec<u8>, SourceError> {
        let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(self.path.clone()),
            _ => SourceError::Io {
                path: self.path.clone(),
                source: e,
            },
        })?;
        if bytes.is_empty() {
            return Err(SourceError::Empty(self.path.clone()));
        }
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory blob, for tests and tools
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ByteSource for MemorySource {
    fn read_all(&self) -> Result<Vec<u8>, SourceError> {
        if self.bytes.is_empty() {
            return Err(SourceError::Empty(PathBuf::from("<memory>")));
        }
        Ok(self.bytes.clone())
    }

    fn describe(&self) -> String {
        format!("<memory: {} bytes>", self.bytes.len())
    }
}
