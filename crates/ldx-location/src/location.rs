//! Cache-backed resource location.
//!
//! Resolves every request against the cache and forwards the canonical path
//! to the host's loose-file location bound by the last traversal. The
//! location never owns files of its own.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use ldx_config::{log_location_debug, log_location_info, log_location_warn};

use crate::facade::{ResolutionFacade, ResolvedPath};
use crate::protocol::{ErrorCode, Location, LooseFileBackend, Result, Traverser};
use crate::switches::Switches;

pub const LOCATION_NAME: &str = "LooseDexLocation";

/// Stream requests logged in detail at the start of a session
const DETAILED_HOT_PATH_LOGS: u64 = 100;
/// After that, one request in this many is logged
const PERIODIC_HOT_PATH_LOGS: u64 = 5000;

/// Counters kept by the location itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationStats {
    pub stream_requests: u64,
    pub streams_opened: u64,
    pub stream_failures: u64,
}

pub struct CacheLocation<B: LooseFileBackend> {
    facade: Arc<ResolutionFacade>,
    switches: Arc<Switches>,
    backend: RwLock<Option<Arc<B>>>,
    registered: AtomicBool,
    stream_requests: AtomicU64,
    streams_opened: AtomicU64,
    stream_failures: AtomicU64,
}

impl<B: LooseFileBackend> CacheLocation<B> {
    pub fn new(facade: Arc<ResolutionFacade>, switches: Arc<Switches>) -> Self {
        Self {
            facade,
            switches,
            backend: RwLock::new(None),
            registered: AtomicBool::new(false),
            stream_requests: AtomicU64::new(0),
            streams_opened: AtomicU64::new(0),
            stream_failures: AtomicU64::new(0),
        }
    }

    pub fn facade(&self) -> &Arc<ResolutionFacade> {
        &self.facade
    }

    /// Point the location at the host's loose-file location
    pub fn bind(&self, backend: Option<Arc<B>>) {
        let mut slot = self.backend.write().unwrap_or_else(PoisonError::into_inner);
        let changed = match (slot.as_ref(), backend.as_ref()) {
            (Some(old), Some(new)) => !Arc::ptr_eq(old, new),
            (None, None) => false,
            _ => true,
        };
        if changed && self.switches.verbose() {
            log_location_info!(
                "Binding loose location",
                old = tracing::field::display(slot.as_ref().map_or("(none)", |b| b.prefix())),
                new = tracing::field::display(backend.as_ref().map_or("(none)", |b| b.prefix())),
            );
        }
        *slot = backend;
    }

    pub fn bound(&self) -> Option<Arc<B>> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mark the location as registered with the host. Idempotent.
    pub fn register(&self) -> bool {
        if !self.registered.swap(true, Ordering::AcqRel) {
            log_location_info!("Custom location registered", name = LOCATION_NAME);
        }
        true
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> LocationStats {
        LocationStats {
            stream_requests: self.stream_requests.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            stream_failures: self.stream_failures.load(Ordering::Relaxed),
        }
    }

    /// Resolve and pick the backend, or say why not
    fn route(&self, path: &str) -> Result<(ResolvedPath, Arc<B>)> {
        let resolved = self.facade.resolve(path).ok_or(ErrorCode::NotExist)?;
        let backend = self.bound().ok_or_else(|| {
            log_location_warn!("No bound loose location", path = path);
            ErrorCode::Unsupported
        })?;
        Ok((resolved, backend))
    }

    fn log_hot_path(&self, request: u64, path: &str, resolved: Option<&ResolvedPath>) {
        if !self.switches.verbose() {
            return;
        }
        if request > DETAILED_HOT_PATH_LOGS && request % PERIODIC_HOT_PATH_LOGS != 0 {
            return;
        }
        log_location_debug!(
            "Stream request",
            request = request,
            raw = path,
            normalized = tracing::field::display(self.facade.normalize(path)),
            fingerprint = tracing::field::display(format!("{:016x}", self.facade.fingerprint_of(path))),
            resolved = resolved.is_some(),
            candidates = resolved.map_or(0, |r| r.collision_candidates()),
        );
    }
}

impl<B: LooseFileBackend> Location for CacheLocation<B> {
    type Stream = B::Stream;
    type AsyncStream = B::AsyncStream;
    type Info = B::Info;

    fn create_stream(&self, path: &str, read_only: bool) -> Result<Self::Stream> {
        let request = self.stream_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let routed = self.route(path);
        self.log_hot_path(request, path, routed.as_ref().ok().map(|(r, _)| r));

        let (resolved, backend) = routed.map_err(|e| {
            self.stream_failures.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        match backend.create_stream(&resolved, read_only) {
            Ok(stream) => {
                self.streams_opened.fetch_add(1, Ordering::Relaxed);
                Ok(stream)
            }
            Err(e) => {
                self.stream_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn create_async_stream(&self, path: &str, read_only: bool) -> Result<Self::AsyncStream> {
        let (resolved, backend) = self.route(path)?;
        backend.create_async_stream(&resolved, read_only)
    }

    fn traverse_prefix(&self, prefix: &str, traverser: &mut dyn Traverser) -> ErrorCode {
        let matches = self.facade.paths_for_prefix(prefix);
        if matches.is_empty() {
            return ErrorCode::NotExist;
        }
        for name in matches.iter() {
            traverser.process_name(name, LOCATION_NAME);
        }
        ErrorCode::None
    }

    fn get_info(&self, path: &str) -> Result<Self::Info> {
        let (resolved, backend) = self.route(path)?;
        backend.get_info(&resolved)
    }

    fn get_info_with_traverser(
        &self,
        path: &str,
        traverser: Option<&mut dyn Traverser>,
    ) -> Result<Self::Info> {
        let (resolved, backend) = self.route(path)?;
        backend.get_info_with_traverser(&resolved, traverser)
    }

    /// Cached files are never deleted through the cache
    fn delete(&self, _path: &str) -> ErrorCode {
        ErrorCode::Unsupported
    }

    fn name(&self) -> &str {
        LOCATION_NAME
    }

    fn minimum_async_packet_size(&self) -> u32 {
        0
    }
}

impl<B: LooseFileBackend> std::fmt::Debug for CacheLocation<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLocation")
            .field("registered", &self.is_registered())
            .field("bound", &self.bound().map(|b| b.prefix().to_string()))
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{loaded_facade, MemoryBackend};

    fn location(paths: &[&str]) -> CacheLocation<MemoryBackend> {
        CacheLocation::new(loaded_facade(paths), Arc::new(Switches::new(true, true, false)))
    }

    #[test]
    fn test_stream_forwards_canonical_path() {
        let loc = location(&[r"data\meshes\x.nif"]);
        let backend = Arc::new(MemoryBackend::with_files(&[(r"data\meshes\x.nif", b"NIF")]));
        loc.bind(Some(Arc::clone(&backend)));

        let stream = loc.create_stream("Meshes/X.nif", true).unwrap();
        assert_eq!(stream, b"NIF".to_vec());
        assert_eq!(backend.requested(), vec![r"data\meshes\x.nif".to_string()]);
        assert_eq!(loc.stats().streams_opened, 1);
    }

    #[test]
    fn test_unresolved_and_unbound() {
        let loc = location(&[r"data\meshes\x.nif"]);
        assert_eq!(loc.create_stream("meshes/x.nif", true), Err(ErrorCode::Unsupported));
        assert_eq!(loc.get_info("meshes/x.nif"), Err(ErrorCode::Unsupported));

        loc.bind(Some(Arc::new(MemoryBackend::default())));
        assert_eq!(loc.create_stream("meshes/nope.nif", true), Err(ErrorCode::NotExist));
        assert_eq!(loc.create_async_stream("meshes/nope.nif", true), Err(ErrorCode::NotExist));
        assert_eq!(loc.stats().stream_failures, 2);
    }

    #[test]
    fn test_backend_failure_passes_through() {
        let loc = location(&[r"data\meshes\x.nif"]);
        // Cached but gone from disk
        loc.bind(Some(Arc::new(MemoryBackend::default())));
        assert_eq!(loc.create_stream("meshes/x.nif", true), Err(ErrorCode::NotExist));
        assert_eq!(loc.get_info("meshes/x.nif"), Err(ErrorCode::NotExist));
    }

    #[test]
    fn test_traverse_prefix() {
        let loc = location(&[r"data\textures\a.dds", r"data\textures2\b.dds"]);
        let mut seen = Vec::new();
        let code = loc.traverse_prefix("textures", &mut |name: &str, from: &str| {
            seen.push((name.to_string(), from.to_string()))
        });
        assert_eq!(code, ErrorCode::None);
        assert_eq!(
            seen,
            vec![(r"data\textures\a.dds".to_string(), LOCATION_NAME.to_string())]
        );

        let code = loc.traverse_prefix("sound", &mut |_: &str, _: &str| {});
        assert_eq!(code, ErrorCode::NotExist);
    }

    #[test]
    fn test_fixed_answers() {
        let loc = location(&[r"data\a.nif"]);
        assert_eq!(loc.delete(r"data\a.nif"), ErrorCode::Unsupported);
        assert_eq!(loc.name(), "LooseDexLocation");
        assert_eq!(loc.minimum_async_packet_size(), 0);
        assert!(!loc.is_registered());
        assert!(loc.register());
        assert!(loc.register());
        assert!(loc.is_registered());
    }

    #[test]
    fn test_bind_replaces_backend() {
        let loc = location(&[r"data\a.nif"]);
        let first = Arc::new(MemoryBackend::with_files(&[(r"data\a.nif", b"1")]));
        let second = Arc::new(MemoryBackend::with_files(&[(r"data\a.nif", b"2")]));
        loc.bind(Some(first));
        loc.bind(Some(second));
        assert_eq!(loc.create_stream("a.nif", true).unwrap(), b"2".to_vec());
        loc.bind(None);
        assert!(loc.bound().is_none());
    }
}
