//! # ldx-location
//!
//! The cache-backed side of the host's resource protocol.
//!
//! - [`ResolutionFacade`]: exact lookups and prefix listings over a [`CacheStore`](ldx_cache::CacheStore)
//! - [`InjectionGate`]: one-shot cache-or-native decision per process
//! - [`CacheLocation`]: host location that forwards resolved paths to the
//!   native loose-file location
//! - [`LooseFileInjector`]: the intercepted traversal
//! - [`Session`]: wiring plus lifecycle handling

pub mod disk;
pub mod facade;
pub mod gate;
pub mod injector;
pub mod location;
pub mod protocol;
pub mod session;
pub mod switches;
pub mod testing;

pub use disk::{DiskInfo, DiskLooseFiles};
pub use facade::{PrefixMatches, ResolutionFacade, ResolutionStats, ResolvedPath};
pub use gate::{InjectionGate, InjectionState};
pub use injector::{LooseFileInjector, NativeTiming};
pub use location::{CacheLocation, LocationStats, LOCATION_NAME};
pub use protocol::{ErrorCode, Location, LooseFileBackend, Traverser};
pub use session::{LifecycleEvent, Session};
pub use switches::Switches;
