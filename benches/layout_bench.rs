use criterion::{Criterion, criterion_group, criterion_main};
use memreg::cache::MemoryStorage;
use memreg::{
    FieldDescriptor, FieldSpec, FieldValue, LayoutCache, MemStore, Packing, Record, Register, compile, shared,
};
use std::hint::black_box;

// ─── Test Data ──────────────────────────────────────────────────────────────

/// A header-style declaration: a handful of flags, a nibble, scalars of each
/// width and a couple of blobs.
fn bench_specs() -> Vec<FieldSpec> {
    vec![
        FieldSpec::bit("INITD", 1),
        FieldSpec::bit("MNT", 1),
        FieldSpec::bit("ERR", 1),
        FieldSpec::bit("MODE", 4),
        FieldSpec::bit("LEVEL", 3),
        FieldSpec::bytes("TYPE", 5),
        FieldSpec::formatted("DATE", 1, "H"),
        FieldSpec::formatted("SERIAL", 1, "I"),
        FieldSpec::formatted("GAIN", 1, "f"),
        FieldSpec::formatted("SAMPLES", 4, "h"),
        FieldSpec::formatted("LABEL", 8, "TEXT"),
    ]
}

const SPAN: usize = 48;

// ═══════════════════════════════════════════════════════════════════════════
// Group 1: Layout compilation
// ═══════════════════════════════════════════════════════════════════════════

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let fields = FieldDescriptor::resolve_all(&bench_specs()).unwrap();

    group.bench_function("resolve_all", |b| {
        b.iter(|| FieldDescriptor::resolve_all(black_box(&bench_specs())).unwrap())
    });

    group.bench_function("compile (bits_first)", |b| {
        b.iter(|| compile(black_box(&fields), SPAN, Packing::BitsFirst).unwrap())
    });

    group.bench_function("compile (declared)", |b| {
        b.iter(|| compile(black_box(&fields), SPAN, Packing::Declared).unwrap())
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 2: Record construction, cold vs warm cache
// ═══════════════════════════════════════════════════════════════════════════

fn bench_record_new(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_new");
    let specs = bench_specs();
    let store = shared(MemStore::new(SPAN));

    group.bench_function("cold cache", |b| {
        b.iter(|| {
            let mut cache = LayoutCache::in_memory();
            Record::new("HEADER", store.clone(), 0, SPAN, black_box(&specs), &mut cache).unwrap()
        })
    });

    let storage = MemoryStorage::new();
    Record::new("HEADER", store.clone(), 0, SPAN, &specs, &mut LayoutCache::new(storage.clone())).unwrap();
    group.bench_function("warm cache", |b| {
        b.iter(|| {
            let mut cache = LayoutCache::new(storage.clone());
            Record::new("HEADER", store.clone(), 0, SPAN, black_box(&specs), &mut cache).unwrap()
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 3: Field access
// ═══════════════════════════════════════════════════════════════════════════

fn bench_field_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_access");
    group.sample_size(500);

    let store = shared(MemStore::new(SPAN));
    let mut cache = LayoutCache::in_memory();
    let mut record = Record::new("HEADER", store, 0, SPAN, &bench_specs(), &mut cache).unwrap();

    group.bench_function("get (bit)", |b| {
        b.iter(|| black_box(record.get(black_box("MODE")).unwrap()))
    });

    group.bench_function("get (u16)", |b| {
        b.iter(|| black_box(record.get(black_box("DATE")).unwrap()))
    });

    group.bench_function("get (text)", |b| {
        b.iter(|| black_box(record.get(black_box("LABEL")).unwrap()))
    });

    group.bench_function("set (bit)", |b| {
        b.iter(|| record.set(black_box("MODE"), black_box(9u8)).unwrap())
    });

    group.bench_function("set (u32)", |b| {
        b.iter(|| record.set(black_box("SERIAL"), black_box(0xDEAD_BEEFu32)).unwrap())
    });

    let samples = FieldValue::Array(vec![FieldValue::Int(-1), FieldValue::Int(2)]);
    group.bench_function("set (i16 array)", |b| {
        b.iter(|| record.set_value(black_box("SAMPLES"), samples.clone()).unwrap())
    });

    group.bench_function("toggle", |b| b.iter(|| record.toggle(black_box("ERR")).unwrap()));

    group.bench_function("commit", |b| b.iter(|| record.commit().unwrap()));

    group.finish();
}

// ─── Criterion Main ─────────────────────────────────────────────────────────

criterion_group!(benches, bench_compile, bench_record_new, bench_field_access);
criterion_main!(benches);
