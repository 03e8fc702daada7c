//! Body of the intercepted loose-file traversal.
//!
//! ```text
//! enabled? -> gate (loads the cache once) -> bind backend -> list prefix
//!          -> announce names          ...or hand the call to native traversal
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use ldx_config::logging::log_performance_block;
use ldx_config::{log_location_info, log_location_warn};

use crate::facade::ResolutionFacade;
use crate::gate::{InjectionGate, InjectionState};
use crate::location::CacheLocation;
use crate::protocol::{ErrorCode, Location, LooseFileBackend, Traverser};
use crate::switches::Switches;

/// Display name for the root traversal
const ROOT_DISPLAY: &str = "ROOT";

/// Accumulated cost of traversals served natively
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NativeTiming {
    pub calls: u64,
    pub names: u64,
    pub elapsed: Duration,
}

/// Counts names announced through it
struct CountingTraverser<'a> {
    inner: &'a mut dyn Traverser,
    count: u64,
}

impl Traverser for CountingTraverser<'_> {
    fn process_name(&mut self, name: &str, location: &str) {
        self.count += 1;
        self.inner.process_name(name, location);
    }
}

pub struct LooseFileInjector<B: LooseFileBackend> {
    switches: Arc<Switches>,
    gate: InjectionGate,
    location: Arc<CacheLocation<B>>,
    native_timing: Mutex<NativeTiming>,
    injected_calls: AtomicU64,
}

impl<B: LooseFileBackend> LooseFileInjector<B> {
    pub fn new(location: Arc<CacheLocation<B>>, switches: Arc<Switches>) -> Self {
        Self {
            switches,
            gate: InjectionGate::new(),
            location,
            native_timing: Mutex::new(NativeTiming::default()),
            injected_calls: AtomicU64::new(0),
        }
    }

    pub fn gate(&self) -> &InjectionGate {
        &self.gate
    }

    pub fn location(&self) -> &Arc<CacheLocation<B>> {
        &self.location
    }

    fn facade(&self) -> &Arc<ResolutionFacade> {
        self.location.facade()
    }

    /// Traversals answered from the cache so far
    pub fn injected_calls(&self) -> u64 {
        self.injected_calls.load(Ordering::Relaxed)
    }

    /// Try to answer a traversal from the cache.
    ///
    /// Returns true when every matching name was announced to `traverser`;
    /// false means nothing was announced and the caller must go native.
    pub fn try_inject(&self, backend: &Arc<B>, prefix: &str, traverser: &mut dyn Traverser) -> bool {
        let shown = if prefix.is_empty() { ROOT_DISPLAY } else { prefix };
        let verbose = self.switches.verbose();

        if verbose {
            log_location_info!("Traversal requested", prefix = shown);
        }

        // Disabling only keeps an undecided gate from starting
        if !self.switches.enabled() && self.gate.state() == InjectionState::Uninitialized {
            if verbose {
                log_location_info!("Cache disabled; skipping injection", prefix = shown);
            }
            return false;
        }

        let state = self.gate.resolve(|| self.facade().store().load().is_ok());
        if state != InjectionState::Injected {
            log_location_warn!("Cache not loaded; skipping injection", prefix = shown);
            return false;
        }

        self.location.bind(Some(Arc::clone(backend)));

        let perf = self.switches.performance_diagnostics();
        let started = perf.then(Instant::now);

        let matches = self.facade().paths_for_prefix(prefix);
        if verbose {
            log_location_info!(
                "Traversal prefix",
                raw = prefix,
                normalized = tracing::field::display(
                    self.facade().store().normalizer().normalize_prefix(prefix)
                ),
                cache_entries = self.facade().entry_count(),
                match_count = matches.len(),
            );
        }

        if matches.is_empty() {
            log_location_info!("No cached paths for prefix; using native traversal", prefix = shown);
            return false;
        }

        let location_name = self.location.name();
        for name in matches.iter() {
            traverser.process_name(name, location_name);
        }
        self.injected_calls.fetch_add(1, Ordering::Relaxed);

        if verbose {
            log_location_info!("Injected loose-file paths", prefix = shown, count = matches.len());
        }
        if let Some(started) = started {
            log_performance_block(
                true,
                shown,
                matches.len(),
                started.elapsed().as_secs_f64() * 1000.0,
            );
        }
        true
    }

    /// The intercepted traversal: cache first, then the backend's own
    /// traversal.
    pub fn traverse_prefix(
        &self,
        backend: &Arc<B>,
        prefix: &str,
        traverser: &mut dyn Traverser,
    ) -> ErrorCode {
        if self.try_inject(backend, prefix, traverser) {
            return ErrorCode::None;
        }

        if !self.switches.performance_diagnostics() {
            return backend.traverse_prefix(prefix, traverser);
        }

        let started = Instant::now();
        let mut counting = CountingTraverser {
            inner: traverser,
            count: 0,
        };
        let code = backend.traverse_prefix(prefix, &mut counting);
        let elapsed = started.elapsed();

        let mut timing = self
            .native_timing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        timing.calls += 1;
        timing.names += counting.count;
        timing.elapsed += elapsed;
        code
    }

    /// Current native timing totals
    pub fn native_timing(&self) -> NativeTiming {
        *self
            .native_timing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Report and reset the native timing totals.
    ///
    /// Emits a performance block only when diagnostics are on and at least
    /// one native traversal was timed.
    pub fn flush_native_timing(&self) -> NativeTiming {
        let timing = std::mem::take(
            &mut *self
                .native_timing
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if self.switches.performance_diagnostics() && timing.calls > 0 {
            log_performance_block(
                false,
                "native traversal",
                timing.names as usize,
                timing.elapsed.as_secs_f64() * 1000.0,
            );
        }
        timing
    }
}

impl<B: LooseFileBackend> std::fmt::Debug for LooseFileInjector<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LooseFileInjector")
            .field("gate", &self.gate.state())
            .field("injected_calls", &self.injected_calls())
            .field("native_timing", &self.native_timing())
            .finish()
    }
}
