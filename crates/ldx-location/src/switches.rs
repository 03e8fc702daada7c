use std::sync::atomic::{AtomicBool, Ordering};

use ldx_config::GeneralConfig;

/// Runtime feature switches, shared by the location and the injector.
///
/// Read on every call, so toggles take effect without a restart; they never
/// undo a decision the injection gate already made.
#[derive(Debug)]
pub struct Switches {
    enabled: AtomicBool,
    verbose: AtomicBool,
    performance_diagnostics: AtomicBool,
}

impl Switches {
    pub fn new(enabled: bool, verbose: bool, performance_diagnostics: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            verbose: AtomicBool::new(verbose),
            performance_diagnostics: AtomicBool::new(performance_diagnostics),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn performance_diagnostics(&self) -> bool {
        self.performance_diagnostics.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, value: bool) {
        self.enabled.store(value, Ordering::Relaxed);
    }

    pub fn set_verbose(&self, value: bool) {
        self.verbose.store(value, Ordering::Relaxed);
    }

    pub fn set_performance_diagnostics(&self, value: bool) {
        self.performance_diagnostics.store(value, Ordering::Relaxed);
    }

    /// Copy values from a reloaded config
    pub fn apply(&self, general: &GeneralConfig) {
        self.set_enabled(general.enabled);
        self.set_verbose(general.verbose_logging);
        self.set_performance_diagnostics(general.performance_diagnostics);
    }
}

impl Default for Switches {
    fn default() -> Self {
        Self::from(&GeneralConfig::default())
    }
}

impl From<&GeneralConfig> for Switches {
    fn from(general: &GeneralConfig) -> Self {
        Self::new(
            general.enabled,
            general.verbose_logging,
            general.performance_diagnostics,
        )
    }
}
