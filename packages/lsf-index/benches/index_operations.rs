//! Benchmark suite for log index operations
//!
//! Covers:
//! - Build: header-only scan of in-memory logs, saved index load
//! - Seek: cold (binary search) vs. hinted playback-style seeks
//! - Decode: full payload decode at point of use
//!
//! Run: cargo bench --bench index_operations

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use lsf_index::index::load_or_build;
use lsf_index::{
    FieldValue, LogCursor, LogIndex, LogWriter, MessageBody, RecordHeader, TypeSystemCatalog,
    ANY_ENTITY,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ESTATE: u16 = 350;
const TEMP: u16 = 263;

/// `count` records alternating EstimatedState / Temperature, 10 Hz.
fn make_log(count: usize) -> Vec<u8> {
    let catalog = TypeSystemCatalog::bundled();
    let state = Arc::clone(catalog.schema_for(ESTATE).unwrap());
    let temp = Arc::clone(catalog.schema_for(TEMP).unwrap());

    let mut writer = LogWriter::new(Vec::with_capacity(count * 80));
    for i in 0..count {
        let t = 1_400_000_000.0 + i as f64 * 0.1;
        if i % 2 == 0 {
            let values = state.fields.iter().map(|_| FieldValue::Float(t)).collect();
            writer
                .append_body(
                    &RecordHeader::new(ESTATE, t, 30, 4),
                    &MessageBody::new(Arc::clone(&state), values),
                )
                .unwrap();
        } else {
            writer
                .append_body(
                    &RecordHeader::new(TEMP, t, 30, 7),
                    &MessageBody::new(Arc::clone(&temp), vec![FieldValue::Float(14.0)]),
                )
                .unwrap();
        }
    }
    writer.finish().unwrap()
}

fn make_index(count: usize) -> LogIndex {
    LogIndex::from_bytes(make_log(count), Arc::new(TypeSystemCatalog::bundled())).unwrap()
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    let catalog = Arc::new(TypeSystemCatalog::bundled());

    for size in [1_000, 10_000, 100_000] {
        let log = make_log(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter_batched(
                || log.clone(),
                |bytes| LogIndex::from_bytes(black_box(bytes), Arc::clone(&catalog)).unwrap(),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_load_saved_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_saved_index");
    let catalog = Arc::new(TypeSystemCatalog::bundled());

    for size in [10_000, 100_000] {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("Data.lsf");
        let cache = dir.path().join("mra").join("lsf.index");
        std::fs::write(&log, make_log(size)).unwrap();
        load_or_build(&log, Some(cache.as_path()), Arc::clone(&catalog)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| load_or_build(&log, Some(cache.as_path()), Arc::clone(&catalog)).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Seek
// ---------------------------------------------------------------------------

fn bench_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("seek");
    let index = make_index(100_000);
    let start = index.start_time().unwrap();
    let queries: Vec<f64> = (0..1_000).map(|i| start + i as f64 * 9.7).collect();

    group.bench_function("cold", |b| {
        b.iter(|| {
            for &t in &queries {
                black_box(index.nearest_at_or_after(ESTATE, ANY_ENTITY, 0, t));
            }
        });
    });

    // Playback: each query reuses the previous answer as hint.
    group.bench_function("hinted_playback", |b| {
        b.iter(|| {
            let mut hint = 0;
            for &t in &queries {
                if let Some(r) = index.nearest_at_or_after(ESTATE, ANY_ENTITY, hint, t) {
                    hint = r;
                }
            }
            black_box(hint)
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let index = Arc::new(make_index(10_000));

    group.bench_function("message_at", |b| {
        b.iter(|| black_box(index.message_at(black_box(5_000)).unwrap()));
    });

    group.bench_function("cursor_walk", |b| {
        b.iter(|| {
            let cursor = LogCursor::open(Arc::clone(&index), ESTATE);
            black_box(cursor.filter_map(|m| m.ok()).count())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_load_saved_index,
    bench_seek,
    bench_decode,
);
criterion_main!(benches);
