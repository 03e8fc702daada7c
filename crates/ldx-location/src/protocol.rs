//! Host resource-location protocol.
//!
//! The host engine talks to file sources through a small virtual interface:
//! streams, info queries and prefix traversal, with entries announced to a
//! caller-supplied [`Traverser`]. Both the native loose-file location and the
//! cache-backed location speak it.

use thiserror::Error;

/// Status codes of the host protocol
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    #[error("ok")]
    None = 0,
    #[error("not found")]
    NotExist,
    #[error("invalid path")]
    InvalidPath,
    #[error("file error")]
    FileError,
    #[error("invalid type")]
    InvalidType,
    #[error("out of memory")]
    MemoryError,
    #[error("busy")]
    Busy,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("unsupported")]
    Unsupported,
}

impl ErrorCode {
    pub fn is_ok(self) -> bool {
        self == ErrorCode::None
    }
}

pub type Result<T> = std::result::Result<T, ErrorCode>;

/// Receives entries announced during a traversal
pub trait Traverser {
    /// `name` is a canonical path; `location` names the announcing location
    fn process_name(&mut self, name: &str, location: &str);
}

impl<F> Traverser for F
where
    F: FnMut(&str, &str),
{
    fn process_name(&mut self, name: &str, location: &str) {
        self(name, location)
    }
}

/// A resource location as the host sees it
pub trait Location {
    type Stream;
    type AsyncStream;
    type Info;

    fn create_stream(&self, path: &str, read_only: bool) -> Result<Self::Stream>;

    fn create_async_stream(&self, path: &str, read_only: bool) -> Result<Self::AsyncStream>;

    fn traverse_prefix(&self, prefix: &str, traverser: &mut dyn Traverser) -> ErrorCode;

    fn get_info(&self, path: &str) -> Result<Self::Info>;

    fn get_info_with_traverser(
        &self,
        path: &str,
        traverser: Option<&mut dyn Traverser>,
    ) -> Result<Self::Info>;

    fn delete(&self, path: &str) -> ErrorCode;

    fn name(&self) -> &str;

    fn minimum_async_packet_size(&self) -> u32;
}

/// The host's own loose-file location.
///
/// Its [`Location::traverse_prefix`] is the native traversal the cache
/// replaces, and the fallback whenever the cache cannot serve a call.
pub trait LooseFileBackend: Location + Send + Sync {
    /// Directory prefix the backend serves, for diagnostics
    fn prefix(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_traverser() {
        let mut seen = Vec::new();
        {
            let mut collect = |name: &str, location: &str| seen.push(format!("{location}:{name}"));
            let traverser: &mut dyn Traverser = &mut collect;
            traverser.process_name(r"data\a.nif", "X");
        }
        assert_eq!(seen, vec![r"X:data\a.nif"]);
    }

    #[test]
    fn test_error_code_display() {
        assert!(ErrorCode::None.is_ok());
        assert!(!ErrorCode::NotExist.is_ok());
        assert_eq!(ErrorCode::Unsupported.to_string(), "unsupported");
    }
}
