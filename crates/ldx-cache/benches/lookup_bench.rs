use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ldx_cache::format::{compress, encode_payload};
use ldx_cache::{CacheStore, MemorySource, PathNormalizer, ZlibDecompressor};

fn synthetic_paths(count: usize) -> Vec<String> {
    let dirs = ["meshes\\armor", "meshes\\weapons", "textures\\actors", "sound\\fx", "scripts"];
    let exts = [".nif", ".nif", ".dds", ".wav", ".pex"];
    (0..count)
        .map(|i| format!("data\\{}\\item{:06}{}", dirs[i % dirs.len()], i, exts[i % exts.len()]))
        .collect()
}

fn loaded_store(count: usize) -> CacheStore {
    let blob = compress(&encode_payload(&synthetic_paths(count), None)).unwrap();
    let store = CacheStore::new(
        Box::new(MemorySource::new(blob)),
        Box::new(ZlibDecompressor::new()),
        PathNormalizer::with_root("data", "root"),
    );
    store.load().unwrap();
    store
}

fn bench_resolve(c: &mut Criterion) {
    let store = loaded_store(100_000);
    let table = store.snapshot().unwrap();
    let normalizer = store.normalizer().clone();

    c.bench_function("resolve_hit_100k", |b| {
        b.iter(|| {
            let canonical = normalizer.normalize(black_box("Meshes/Weapons/item050001.nif"));
            table.resolve_canonical(&canonical)
        })
    });

    c.bench_function("resolve_miss_100k", |b| {
        b.iter(|| {
            let canonical = normalizer.normalize(black_box("meshes/weapons/missing.nif"));
            table.resolve_canonical(&canonical)
        })
    });
}

fn bench_prefix(c: &mut Criterion) {
    let store = loaded_store(100_000);
    let table = store.snapshot().unwrap();
    let normalizer = store.normalizer().clone();

    c.bench_function("prefix_textures_100k", |b| {
        b.iter(|| {
            let prefix = normalizer.normalize_prefix(black_box("textures"));
            table.prefix_range(&prefix).len()
        })
    });
}

fn bench_load(c: &mut Criterion) {
    let blob = compress(&encode_payload(&synthetic_paths(100_000), None)).unwrap();

    c.bench_function("load_100k", |b| {
        b.iter(|| {
            let store = CacheStore::new(
                Box::new(MemorySource::new(blob.clone())),
                Box::new(ZlibDecompressor::new()),
                PathNormalizer::with_root("data", "root"),
            );
            store.load().unwrap().len()
        })
    });
}

criterion_group!(benches, bench_resolve, bench_prefix, bench_load);
criterion_main!(benches);
