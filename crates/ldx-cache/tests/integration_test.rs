//! Integration tests for ldx-cache
//!
//! Exercise the full load pipeline: file on disk, inflate, parse, index.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use ldx_cache::format::{compress, encode_payload};
use ldx_cache::{
    fingerprint, ByteSource, CacheError, CacheStore, CacheWriter, FormatError, MemorySource,
    PathNormalizer, SourceError, ZlibDecompressor,
};
use ldx_config::testing::TestEnvironment;
use proptest::prelude::*;

fn normalizer() -> PathNormalizer {
    PathNormalizer::with_root("data", "root")
}

/// Byte source that counts how often it is read
struct CountingSource {
    inner: MemorySource,
    reads: Arc<AtomicUsize>,
}

impl ByteSource for CountingSource {
    fn read_all(&self) -> Result<Vec<u8>, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_all()
    }

    fn describe(&self) -> String {
        "counting".to_string()
    }
}

fn counting_store(blob: Vec<u8>) -> (CacheStore, Arc<AtomicUsize>) {
    let reads = Arc::new(AtomicUsize::new(0));
    let store = CacheStore::new(
        Box::new(CountingSource {
            inner: MemorySource::new(blob),
            reads: Arc::clone(&reads),
        }),
        Box::new(ZlibDecompressor::new()),
        normalizer(),
    );
    (store, reads)
}

fn blob(records: &[&str]) -> Vec<u8> {
    compress(&encode_payload(records, None)).unwrap()
}

#[test]
fn test_load_from_file_written_by_writer() {
    let env = TestEnvironment::new().unwrap();
    let mut writer = CacheWriter::new(normalizer());
    writer.extend([
        "Textures/Actors/Character/Face.dds",
        "meshes/armor/iron/ironhelmet.nif",
        "Sound/Voice/Skyrim.esm/Guard/Hello.wav",
    ]);
    writer.write_to(&env.cache_path()).unwrap();

    let store = CacheStore::from_file(env.cache_path(), normalizer());
    let table = store.load().unwrap();

    assert_eq!(table.len(), 3);
    let metadata = table.metadata().unwrap();
    assert_eq!(metadata.extension_counts.len(), 3);
    let hit = table.resolve_canonical(r"data\meshes\armor\iron\ironhelmet.nif");
    assert!(hit.is_hit());
}

#[test]
fn test_load_reads_source_once() {
    let (store, reads) = counting_store(blob(&[r"data\meshes\x.nif"]));
    let first = store.load().unwrap();
    let second = store.load().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_first_loads_read_once() {
    let (store, reads) = counting_store(blob(&[r"data\meshes\x.nif", r"data\textures\y.dds"]));
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.load().unwrap().generation()
            })
        })
        .collect();

    let generations: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(generations.iter().all(|&g| g == generations[0]));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_file_is_unavailable() {
    let env = TestEnvironment::new().unwrap();
    let store = CacheStore::from_file(env.cache_path(), normalizer());
    assert!(matches!(
        store.load(),
        Err(CacheError::CacheUnavailable(SourceError::NotFound(_)))
    ));
    assert!(!store.is_loaded());
}

#[test]
fn test_uncompressed_payload_fails_decompression() {
    let (store, _) = counting_store(encode_payload(&[r"data\x.nif"], None));
    assert!(matches!(store.load(), Err(CacheError::DecompressionFailed(_))));
    assert!(!store.is_loaded());
}

#[test]
fn test_overdeclared_count_is_malformed() {
    let mut payload = encode_payload(&[r"data\a.nif", r"data\b.nif"], None);
    payload[8..12].copy_from_slice(&3u32.to_le_bytes());
    let (store, _) = counting_store(compress(&payload).unwrap());

    assert!(matches!(
        store.load(),
        Err(CacheError::MalformedCache(FormatError::TruncatedRecordHeader { index: 2 }))
    ));
    assert!(!store.is_loaded());
    assert!(store.snapshot().is_none());
}

#[test]
fn test_zero_usable_paths_is_empty_cache() {
    let (store, _) = counting_store(blob(&["", "", ""]));
    assert!(matches!(store.load(), Err(CacheError::EmptyCache)));

    let (store, _) = counting_store(blob(&[]));
    assert!(matches!(store.load(), Err(CacheError::EmptyCache)));
}

#[test]
fn test_trailing_garbage_still_loads() {
    let mut payload = encode_payload(&[r"data\a.nif"], None);
    payload.extend_from_slice(&[0xFF, 0xFF]);
    let (store, _) = counting_store(compress(&payload).unwrap());
    let table = store.load().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.diagnostics().len(), 1);
}

#[test]
fn test_table_is_sorted_and_prefix_exact() {
    let (store, _) = counting_store(blob(&[
        r"data\textures2\x.dds",
        r"data\textures\b.dds",
        r"DATA/Textures/a.dds",
        r"data\meshes\m.nif",
        r"data\textures\sub\c.dds",
    ]));
    let table = store.load().unwrap();

    assert!(table.paths().windows(2).all(|w| w[0] < w[1]));

    let prefix = store.normalizer().normalize_prefix("textures");
    let listed = table.prefix_slice(&prefix);
    assert_eq!(
        listed,
        &[
            r"data\textures\a.dds",
            r"data\textures\b.dds",
            r"data\textures\sub\c.dds"
        ]
    );
    assert!(listed.iter().all(|p| p.starts_with(r"data\textures\")));
}

#[test]
fn test_resolve_never_returns_a_different_path() {
    let paths = [r"data\meshes\a.nif", r"data\meshes\b.nif", r"data\textures\a.dds"];
    let (store, _) = counting_store(blob(&paths));
    let table = store.load().unwrap();

    for query in [r"data\meshes\a.nif", r"data\meshes\c.nif", r"data\textures\a.dds"] {
        let result = table.resolve_canonical(query);
        if let Some(id) = result.entry {
            assert_eq!(table.get(id), Some(query));
            assert_eq!(fingerprint(table.get(id).unwrap()), fingerprint(query));
        }
    }
}

#[test]
fn test_handles_expire_on_reload() {
    let (store, _) = counting_store(blob(&[r"data\meshes\a.nif"]));
    let first = store.load().unwrap();
    let id = first.resolve_canonical(r"data\meshes\a.nif").entry.unwrap();

    store.release();
    let second = store.load().unwrap();
    assert_eq!(first.get(id), Some(r"data\meshes\a.nif"));
    assert_eq!(second.get(id), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any record round-trips through the layout, up to the u16 length limit
    #[test]
    fn prop_record_round_trip(len in 0usize..=65535, seed in "[a-z0-9_]{1,16}") {
        let body: String = seed.chars().cycle().take(len).collect();
        let payload = encode_payload(&[body.as_str()], None);
        let parsed = ldx_cache::format::parse_rap2(&payload).unwrap();

        if body.is_empty() {
            prop_assert_eq!(parsed.skipped_empty, 1);
            prop_assert!(parsed.paths.is_empty());
        } else {
            prop_assert_eq!(&parsed.paths[0], &body);
            prop_assert_eq!(normalizer().normalize(&parsed.paths[0]), normalizer().normalize(&body));
        }
    }

    /// Sorted order after load, for arbitrary path sets
    #[test]
    fn prop_loaded_table_is_ordered(paths in proptest::collection::vec("[a-z]{1,4}(/[a-z]{1,4}){0,3}\\.(nif|dds)", 1..40)) {
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let (store, _) = counting_store(blob(&refs));
        let table = store.load().unwrap();
        prop_assert!(table.paths().windows(2).all(|w| w[0] <= w[1]));
        for raw in &paths {
            let canonical = store.normalizer().normalize(raw);
            prop_assert!(table.resolve_canonical(&canonical).is_hit());
        }
    }
}
