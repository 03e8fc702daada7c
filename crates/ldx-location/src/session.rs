//! Wiring for one host process: config in, lifecycle events out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ldx_cache::{CacheStore, PathNormalizer};
use ldx_config::{log_location_info, Config};

use crate::facade::ResolutionFacade;
use crate::injector::LooseFileInjector;
use crate::location::CacheLocation;
use crate::protocol::{ErrorCode, LooseFileBackend, Traverser};
use crate::switches::Switches;

/// Host lifecycle notifications the session reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    PostLoad,
    DataLoaded,
    PreLoadGame,
    PostLoadGame,
    NewGame,
}

pub struct Session<B: LooseFileBackend> {
    switches: Arc<Switches>,
    store: Arc<CacheStore>,
    injector: LooseFileInjector<B>,
    cache_path: Option<PathBuf>,
}

impl<B: LooseFileBackend> Session<B> {
    /// Session reading the cache file named by `config`
    pub fn open(config: &Config, config_dir: &Path) -> Self {
        let cache_path = config.cache_path(config_dir);
        let store = CacheStore::from_file(
            cache_path.clone(),
            PathNormalizer::from_config(&config.normalization),
        );
        let mut session = Self::with_store(Arc::new(store), Switches::from(&config.general));
        session.cache_path = Some(cache_path);
        session
    }

    /// Session over an existing store
    pub fn with_store(store: Arc<CacheStore>, switches: Switches) -> Self {
        let switches = Arc::new(switches);
        let facade = Arc::new(ResolutionFacade::new(Arc::clone(&store)));
        let location = Arc::new(CacheLocation::new(facade, Arc::clone(&switches)));
        let registered = location.register();
        log_location_info!(
            "Location registration",
            status = if registered { "ok" } else { "failed" }
        );

        let injector = LooseFileInjector::new(location, Arc::clone(&switches));
        Self {
            switches,
            store,
            injector,
            cache_path: None,
        }
    }

    pub fn switches(&self) -> &Arc<Switches> {
        &self.switches
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn injector(&self) -> &LooseFileInjector<B> {
        &self.injector
    }

    pub fn location(&self) -> &Arc<CacheLocation<B>> {
        self.injector.location()
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Intercepted traversal entry point
    pub fn traverse_prefix(
        &self,
        backend: &Arc<B>,
        prefix: &str,
        traverser: &mut dyn Traverser,
    ) -> ErrorCode {
        self.injector.traverse_prefix(backend, prefix, traverser)
    }

    pub fn handle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::DataLoaded => {
                self.injector.flush_native_timing();
                self.store.release();
                if self.switches.verbose() {
                    let stats = self.injector.location().facade().stats();
                    log_location_info!(
                        "Data loaded; cache released",
                        requests = stats.requests,
                        hits = stats.hits,
                        misses = stats.misses,
                        collisions = stats.collisions,
                    );
                }
            }
            LifecycleEvent::PostLoad
            | LifecycleEvent::PreLoadGame
            | LifecycleEvent::PostLoadGame
            | LifecycleEvent::NewGame => {}
        }
    }
}

impl<B: LooseFileBackend> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("cache_path", &self.cache_path)
            .field("store", &self.store)
            .field("injector", &self.injector)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::InjectionState;
    use crate::testing::{memory_store, MemoryBackend};

    #[test]
    fn test_data_loaded_releases_cache() {
        let session: Session<MemoryBackend> = Session::with_store(
            memory_store(&[r"data\textures\a.dds"]).unwrap(),
            Switches::new(true, true, true),
        );
        let backend = Arc::new(MemoryBackend::default());
        let mut names = Vec::new();
        session.traverse_prefix(&backend, "textures", &mut |n: &str, _: &str| {
            names.push(n.to_string())
        });
        assert_eq!(names.len(), 1);
        assert!(session.store().is_loaded());
        assert!(session.location().is_registered());

        session.handle(LifecycleEvent::PostLoad);
        assert!(session.store().is_loaded());

        session.handle(LifecycleEvent::DataLoaded);
        assert!(!session.store().is_loaded());
        // The decision stands; calls now go native and nothing reloads
        session.traverse_prefix(&backend, "textures", &mut |_: &str, _: &str| {});
        assert_eq!(session.injector().gate().state(), InjectionState::Injected);
        assert_eq!(session.store().load_attempts(), 1);
        assert_eq!(backend.native_traversals(), 1);
    }

    #[test]
    fn test_session_switches_reach_injector() {
        let session: Session<MemoryBackend> = Session::with_store(
            memory_store(&[r"data\textures\a.dds"]).unwrap(),
            Switches::new(true, false, false),
        );
        session.switches().set_enabled(false);

        let backend = Arc::new(MemoryBackend::default());
        session.traverse_prefix(&backend, "textures", &mut |_: &str, _: &str| {});
        assert_eq!(session.injector().gate().state(), InjectionState::Uninitialized);
        assert_eq!(session.store().load_attempts(), 0);
        assert_eq!(backend.native_traversals(), 1);
    }
}
