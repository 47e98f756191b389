use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::{Db, Options};
use tempfile::tempdir;

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn options() -> Options {
    Options::default().with_max_segment_size(256 * 1024)
}

fn populated() -> (tempfile::TempDir, Db) {
    let dir = tempdir().unwrap();
    let db = Db::open(dir.path(), options()).unwrap();
    for i in 0..N_KEYS {
        db.put(format!("key{}", i).as_bytes(), &[b'x'; VALUE_SIZE])
            .unwrap();
    }
    (dir, db)
}

fn engine_put_benchmark(c: &mut Criterion) {
    c.bench_function("engine_put_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let db = Db::open(dir.path(), options()).unwrap();
                (dir, db)
            },
            |(_dir, db)| {
                for i in 0..N_KEYS {
                    db.put(format!("key{}", i).as_bytes(), &[b'x'; VALUE_SIZE])
                        .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn engine_get_hit_benchmark(c: &mut Criterion) {
    let (_dir, db) = populated();
    c.bench_function("engine_get_hit_10k", |b| {
        b.iter(|| {
            for i in 0..N_KEYS {
                let v = db.get(format!("key{}", i).as_bytes()).unwrap();
                assert_eq!(v.len(), VALUE_SIZE);
            }
        });
    });
}

fn engine_get_miss_benchmark(c: &mut Criterion) {
    let (_dir, db) = populated();
    c.bench_function("engine_get_miss_10k", |b| {
        b.iter(|| {
            for i in 0..N_KEYS {
                let err = db.get(format!("missing{}", i).as_bytes()).unwrap_err();
                assert!(err.is_not_found());
            }
        });
    });
}

fn engine_recovery_benchmark(c: &mut Criterion) {
    c.bench_function("engine_open_10k", |b| {
        b.iter_batched(
            || {
                let (dir, db) = populated();
                db.close().unwrap();
                dir
            },
            |dir| {
                let db = Db::open(dir.path(), options()).unwrap();
                assert_eq!(db.len().unwrap(), N_KEYS);
                db.close().unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn engine_merge_benchmark(c: &mut Criterion) {
    c.bench_function("engine_merge_10k_overwritten", |b| {
        b.iter_batched(
            || {
                let (dir, db) = populated();
                for i in 0..N_KEYS {
                    db.put(format!("key{}", i).as_bytes(), &[b'y'; VALUE_SIZE])
                        .unwrap();
                }
                (dir, db)
            },
            |(_dir, db)| {
                let s = db.merge().unwrap();
                assert!(s.records_dropped > 0);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    engine_put_benchmark,
    engine_get_hit_benchmark,
    engine_get_miss_benchmark,
    engine_recovery_benchmark,
    engine_merge_benchmark
);
criterion_main!(benches);
