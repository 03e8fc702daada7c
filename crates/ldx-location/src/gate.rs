//! One-shot "cache or native" decision for the session.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use ldx_config::{log_gate_debug, log_gate_info};

/// Gate state. `Injected` and `NativeFallback` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InjectionState {
    Uninitialized = 0,
    Initializing = 1,
    Injected = 2,
    NativeFallback = 3,
}

impl InjectionState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Injected,
            _ => Self::NativeFallback,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Injected | Self::NativeFallback)
    }
}

/// Exactly one caller runs the initializer; everyone else waits for its
/// outcome and then sees the same terminal state for the rest of the process.
#[derive(Debug)]
pub struct InjectionGate {
    state: AtomicU8,
    init_attempts: AtomicU64,
}

/// Moves the gate to `NativeFallback` if the initializer unwinds
struct InitGuard<'a> {
    gate: &'a InjectionGate,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate
                .state
                .store(InjectionState::NativeFallback as u8, Ordering::Release);
        }
    }
}

impl InjectionGate {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(InjectionState::Uninitialized as u8),
            init_attempts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> InjectionState {
        InjectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_injected(&self) -> bool {
        self.state() == InjectionState::Injected
    }

    /// How many times an initializer actually ran (0 or 1)
    pub fn init_attempts(&self) -> u64 {
        self.init_attempts.load(Ordering::Acquire)
    }

    /// Resolve the gate, running `init` if this caller wins the race.
    ///
    /// `init` returns true when the cache is usable. Callers that lose the
    /// race block until the winner finishes.
    pub fn resolve<F>(&self, init: F) -> InjectionState
    where
        F: FnOnce() -> bool,
    {
        let current = self.state();
        if current.is_terminal() {
            return current;
        }

        if self
            .state
            .compare_exchange(
                InjectionState::Uninitialized as u8,
                InjectionState::Initializing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.init_attempts.fetch_add(1, Ordering::AcqRel);
            let mut guard = InitGuard {
                gate: self,
                armed: true,
            };
            let next = if init() {
                InjectionState::Injected
            } else {
                InjectionState::NativeFallback
            };
            guard.armed = false;
            self.state.store(next as u8, Ordering::Release);
            log_gate_info!("Injection gate resolved", state = tracing::field::debug(next));
            return next;
        }

        self.wait_terminal()
    }

    fn wait_terminal(&self) -> InjectionState {
        let mut backoff_count: u32 = 0;
        loop {
            let current = self.state();
            if current.is_terminal() {
                if backoff_count > 0 {
                    log_gate_debug!("Waited for gate initializer", spins = backoff_count);
                }
                return current;
            }

            backoff_count = backoff_count.saturating_add(1);
            if backoff_count < 10 {
                std::hint::spin_loop();
            } else if backoff_count < 100 {
                std::thread::yield_now();
            } else {
                std::thread::sleep(Duration::from_micros(50));
            }
        }
    }
}

impl Default for InjectionGate {
    fn default() -> Self {
        Self::new()
    }
}
