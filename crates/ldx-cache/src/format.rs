//! RAP2 payload codec.
//!
//! Layout of the decompressed payload (little-endian):
//!
//! ```text
//! "RAP2" | u32 version (=2) | u32 record count
//! record × count: u64 tag | u16 path length | path bytes
//! [metadata block | u32 metadata length]          (optional trailer)
//! ```
//!
//! The tag is opaque to readers. Writers store the path fingerprint there.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::FormatError;
use crate::fingerprint::fingerprint;
use crate::normalize::{PathNormalizer, SEPARATOR};

pub const RAP2_MAGIC: [u8; 4] = *b"RAP2";
pub const RAP2_VERSION: u32 = 2;

const HEADER_LEN: usize = 12;
const RECORD_HEADER_LEN: usize = 8 + 2;
const TRAILER_LEN: usize = 4;

/// Upper bound for a metadata block we are willing to decode
pub const MAX_METADATA_LEN: usize = 1 << 20;

/// Label used for paths without an extension in metadata counts
pub const NO_EXTENSION: &str = "(no ext)";

/// On-disk record layout of a loaded cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum CacheFormat {
    #[default]
    Unknown = 0,
    Rap2 = 2,
}

/// Non-fatal anomalies found while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseDiagnostic {
    /// Bytes follow the records but are too few to hold a length field
    TruncatedTrailer { trailing: usize },
    /// Trailer declares more metadata than there are bytes
    SuspiciousMetadataLength { declared: u32, available: usize },
    /// Trailer length is plausible but the block does not decode
    UnreadableMetadata { declared: u32 },
}

/// Producer-side statistics carried in the trailer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetadata {
    /// Build time, milliseconds since the Unix epoch
    pub build_time_ms: u64,
    /// Path counts per extension, most common first
    pub extension_counts: Vec<(String, u32)>,
    /// Path counts per top-level directory, most common first
    pub root_counts: Vec<(String, u32)>,
}

/// Result of parsing a decompressed payload
#[derive(Debug, Clone, Default)]
pub struct ParsedCache {
    /// Non-empty paths in record order, as stored
    pub paths: Vec<String>,
    /// Record count declared in the header
    pub declared: u32,
    /// Records whose path was empty
    pub skipped_empty: usize,
    pub metadata: Option<CacheMetadata>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.remaining() {
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Option<u64> {
        self.take(8).map(|b| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(b);
            u64::from_le_bytes(buf)
        })
    }
}

/// Parse a decompressed RAP2 payload.
///
/// Hard failures: short header, wrong magic or version, any record that
/// would read past the end. Anything odd after the last record is only
/// reported through [`ParsedCache::diagnostics`].
pub fn parse_rap2(data: &[u8]) -> Result<ParsedCache, FormatError> {
    if data.len() < HEADER_LEN {
        return Err(FormatError::TooSmall { len: data.len() });
    }

    let mut cursor = Cursor::new(data);
    let mut magic = [0u8; 4];
    magic.copy_from_slice(cursor.take(4).ok_or(FormatError::TooSmall { len: data.len() })?);
    if magic != RAP2_MAGIC {
        return Err(FormatError::BadMagic { found: magic });
    }

    let version = cursor.u32().ok_or(FormatError::TooSmall { len: data.len() })?;
    if version != RAP2_VERSION {
        return Err(FormatError::VersionMismatch {
            expected: RAP2_VERSION,
            found: version,
        });
    }

    let declared = cursor.u32().ok_or(FormatError::TooSmall { len: data.len() })?;

    // A bogus count must not drive a huge allocation
    let capacity = (declared as usize).min(cursor.remaining() / RECORD_HEADER_LEN);
    let mut parsed = ParsedCache {
        paths: Vec::with_capacity(capacity),
        declared,
        ..ParsedCache::default()
    };

    for index in 0..declared {
        if cursor.remaining() < RECORD_HEADER_LEN {
            return Err(FormatError::TruncatedRecordHeader { index });
        }
        let _tag = cursor.u64();
        let len = cursor
            .u16()
            .ok_or(FormatError::TruncatedRecordHeader { index })?;
        let bytes = cursor
            .take(usize::from(len))
            .ok_or(FormatError::TruncatedPath { index })?;

        if bytes.is_empty() {
            parsed.skipped_empty += 1;
            continue;
        }
        parsed
            .paths
            .push(String::from_utf8_lossy(bytes).into_owned());
    }

    let trailing = cursor.remaining();
    if trailing > 0 {
        if trailing < TRAILER_LEN {
            parsed
                .diagnostics
                .push(ParseDiagnostic::TruncatedTrailer { trailing });
        } else {
            let end = data.len() - TRAILER_LEN;
            let declared_meta = u32::from_le_bytes([
                data[end],
                data[end + 1],
                data[end + 2],
                data[end + 3],
            ]);
            let available = trailing - TRAILER_LEN;
            let meta_len = declared_meta as usize;
            if meta_len > available {
                parsed
                    .diagnostics
                    .push(ParseDiagnostic::SuspiciousMetadataLength {
                        declared: declared_meta,
                        available,
                    });
            } else if meta_len > 0 {
                match CacheMetadata::decode(&data[end - meta_len..end]) {
                    Some(metadata) => parsed.metadata = Some(metadata),
                    None => parsed
                        .diagnostics
                        .push(ParseDiagnostic::UnreadableMetadata {
                            declared: declared_meta,
                        }),
                }
            }
        }
    }

    Ok(parsed)
}

impl CacheMetadata {
    /// Decode a metadata block; `None` when it is truncated or oversized
    pub fn decode(block: &[u8]) -> Option<Self> {
        if block.len() > MAX_METADATA_LEN {
            return None;
        }
        let mut cursor = Cursor::new(block);
        let build_time_ms = cursor.u64()?;
        let extension_counts = decode_counts(&mut cursor)?;
        let root_counts = decode_counts(&mut cursor)?;
        Some(Self {
            build_time_ms,
            extension_counts,
            root_counts,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.build_time_ms.to_le_bytes());
        encode_counts(&mut out, &self.extension_counts);
        encode_counts(&mut out, &self.root_counts);
        out
    }
}

fn decode_counts(cursor: &mut Cursor<'_>) -> Option<Vec<(String, u32)>> {
    let n = cursor.u32()? as usize;
    let mut counts = Vec::with_capacity(n.min(cursor.remaining() / 6));
    for _ in 0..n {
        let len = cursor.u16()?;
        let key = String::from_utf8_lossy(cursor.take(usize::from(len))?).into_owned();
        let count = cursor.u32()?;
        counts.push((key, count));
    }
    Some(counts)
}

fn encode_counts(out: &mut Vec<u8>, counts: &[(String, u32)]) {
    out.extend_from_slice(&(counts.len() as u32).to_le_bytes());
    for (key, count) in counts {
        let bytes = key.as_bytes();
        let len = bytes.len().min(usize::from(u16::MAX));
        out.extend_from_slice(&(len as u16).to_le_bytes());
        out.extend_from_slice(&bytes[..len]);
        out.extend_from_slice(&count.to_le_bytes());
    }
}

/// Assemble a RAP2 payload from raw record bytes.
///
/// Records are written verbatim (no normalization, empty records allowed);
/// records longer than `u16::MAX` bytes are truncated.
pub fn encode_payload<P: AsRef<[u8]>>(records: &[P], metadata: Option<&CacheMetadata>) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        HEADER_LEN
            + records
                .iter()
                .map(|r| RECORD_HEADER_LEN + r.as_ref().len())
                .sum::<usize>(),
    );
    out.extend_from_slice(&RAP2_MAGIC);
    out.extend_from_slice(&RAP2_VERSION.to_le_bytes());
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());

    for record in records {
        let bytes = record.as_ref();
        let len = bytes.len().min(usize::from(u16::MAX));
        let tag = fingerprint(&String::from_utf8_lossy(&bytes[..len]));
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&(len as u16).to_le_bytes());
        out.extend_from_slice(&bytes[..len]);
    }

    if let Some(metadata) = metadata {
        let block = metadata.encode();
        out.extend_from_slice(&block);
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
    }
    out
}

/// zlib-compress a payload the way the cache producer does (level 1)
pub fn compress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len() / 2), Compression::new(1));
    encoder.write_all(payload)?;
    encoder.finish()
}

/// Builds cache blobs from loose-file paths.
///
/// Producer side only; the runtime path never writes a cache.
#[derive(Debug, Clone)]
pub struct CacheWriter {
    normalizer: PathNormalizer,
    paths: Vec<String>,
    build_time_ms: Option<u64>,
    skipped: usize,
}

impl CacheWriter {
    pub fn new(normalizer: PathNormalizer) -> Self {
        Self {
            normalizer,
            paths: Vec::new(),
            build_time_ms: None,
            skipped: 0,
        }
    }

    /// Pin the build time instead of using the clock
    pub fn with_build_time(mut self, build_time_ms: u64) -> Self {
        self.build_time_ms = Some(build_time_ms);
        self
    }

    /// Normalize and add a path. Returns false when it was dropped
    /// (empty after normalization or longer than a record can hold).
    pub fn push(&mut self, raw: &str) -> bool {
        let path = self.normalizer.normalize(raw);
        if path.is_empty() || path.len() > usize::from(u16::MAX) {
            self.skipped += 1;
            return false;
        }
        self.paths.push(path);
        true
    }

    pub fn extend<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.push(path.as_ref());
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths dropped by `push`
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Extension and top-level directory counts for the trailer
    pub fn metadata(&self) -> CacheMetadata {
        let marker = self
            .normalizer
            .root()
            .map(|root| root.marker_prefix().to_string())
            .unwrap_or_default();

        let mut extensions: HashMap<String, u32> = HashMap::new();
        let mut roots: HashMap<String, u32> = HashMap::new();
        for path in &self.paths {
            *extensions.entry(extension_key(path).to_string()).or_default() += 1;
            let relative = path.strip_prefix(marker.as_str()).unwrap_or(path);
            let root = relative.split(SEPARATOR).next().unwrap_or_default();
            *roots.entry(root.to_string()).or_default() += 1;
        }

        CacheMetadata {
            build_time_ms: self.build_time_ms.unwrap_or_else(now_ms),
            extension_counts: most_common(extensions),
            root_counts: most_common(roots),
        }
    }

    /// Uncompressed payload
    pub fn to_payload(&self) -> Vec<u8> {
        encode_payload(&self.paths, Some(&self.metadata()))
    }

    /// Compressed blob, ready to be written to disk
    pub fn to_blob(&self) -> io::Result<Vec<u8>> {
        compress(&self.to_payload())
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_blob()?)
    }
}

/// Extension (with dot) of the last path component, or [`NO_EXTENSION`]
pub fn extension_key(path: &str) -> &str {
    let name = path.rsplit(SEPARATOR).next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[dot..],
        _ => NO_EXTENSION,
    }
}

fn most_common(counts: HashMap<String, u32>) -> Vec<(String, u32)> {
    let mut items: Vec<(String, u32)> = counts.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
