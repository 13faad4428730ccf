//! Hash index and buffer pool benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use extendibledb::buffer::BufferPoolManager;
use extendibledb::index::hash::{DefaultKeyHasher, ExtendibleHashTable, OrdComparator};
use extendibledb::storage::DiskManager;
use extendibledb::PageHeader;
use tempfile::TempDir;

type IntTable = ExtendibleHashTable<i32, i32>;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
    (Arc::new(BufferPoolManager::new(pool_size, dm)), dir)
}

fn hash_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_insert");
    for &n in &[1_000i32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let (bpm, _dir) = create_bpm(64);
                let table: IntTable =
                    ExtendibleHashTable::new("bench", bpm, OrdComparator, DefaultKeyHasher)
                        .unwrap();
                for key in 0..n {
                    table.insert(&key, &key).unwrap();
                }
                black_box(table.num_buckets().unwrap())
            })
        });
    }
    group.finish();
}

fn hash_get_benchmark(c: &mut Criterion) {
    let (bpm, _dir) = create_bpm(64);
    let table: IntTable =
        ExtendibleHashTable::new("bench", bpm, OrdComparator, DefaultKeyHasher).unwrap();
    for key in 0..10_000 {
        table.insert(&key, &key).unwrap();
    }

    c.bench_function("hash_get_10000", |b| {
        b.iter(|| {
            for key in 0..10_000 {
                black_box(table.get_value(&key).unwrap());
            }
        })
    });
}

fn bpm_fetch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("bpm_fetch");
    // Working set of 32 pages against pools that do and don't hold it.
    for &pool_size in &[8usize, 64] {
        let (bpm, _dir) = create_bpm(pool_size);
        let page_ids: Vec<_> = (0..32)
            .map(|_| bpm.new_page().unwrap().page_id())
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(pool_size), &pool_size, |b, _| {
            b.iter(|| {
                for pid in &page_ids {
                    let page = bpm.fetch_page(*pid).unwrap();
                    black_box(page.read().as_slice()[PageHeader::RESERVED]);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    hash_insert_benchmark,
    hash_get_benchmark,
    bpm_fetch_benchmark
);
criterion_main!(benches);
