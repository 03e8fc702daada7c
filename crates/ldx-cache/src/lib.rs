//! # ldx-cache
//!
//! Loose-file path cache for the LooseDex location.
//!
//! A producer walks the game's loose files once and writes a zlib-compressed
//! RAP2 blob. At runtime [`CacheStore`] reads that blob, normalizes and sorts
//! every path, and indexes it by [`fingerprint`] so that exact lookups and
//! directory listings never touch the filesystem.
//!
//! ```text
//! ByteSource -> Decompressor -> parse_rap2 -> PathTable (sorted + buckets)
//! ```

pub mod error;
pub mod fingerprint;
pub mod format;
pub mod inflate;
pub mod normalize;
pub mod source;
pub mod store;
pub mod table;

pub use error::{CacheError, FormatError, Result, SourceError};
pub use fingerprint::{fingerprint, Fingerprint};
pub use format::{CacheFormat, CacheMetadata, CacheWriter, ParseDiagnostic};
pub use inflate::{Decompressor, ZlibDecompressor};
pub use normalize::{PathNormalizer, VirtualRoot, SEPARATOR};
pub use source::{ByteSource, FileSource, MemorySource};
pub use store::{CacheStore, LoadReport};
pub use table::{prefix_range, EntryId, PathTable, ResolveResult};
