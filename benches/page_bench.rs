// Node page codec benchmarks for lsmkv

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lsmkv::{LeafBuilder, NodePage};
use std::hint::black_box;

fn build_leaf(pairs: usize) -> NodePage<bytes::BytesMut> {
    let mut builder = LeafBuilder::new();
    for i in 0..pairs {
        builder.add(format!("key{:06}", i).as_bytes(), b"value-0123456789").unwrap();
    }
    builder.finish().unwrap()
}

fn benchmark_leaf_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_build");

    for pairs in [16, 64, 128].iter() {
        group.throughput(Throughput::Elements(*pairs as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pairs), pairs, |b, &pairs| {
            b.iter(|| black_box(build_leaf(pairs)));
        });
    }

    group.finish();
}

fn benchmark_leaf_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_decode");
    let page = build_leaf(128).freeze();

    group.bench_function("kv_random", |b| {
        let mut idx = 0u16;
        b.iter(|| {
            idx = (idx + 37) % 128;
            black_box(page.kv(idx).unwrap());
        });
    });

    group.bench_function("kvs_scan", |b| {
        b.iter(|| {
            let total: usize = page.kvs().map(|kv| kv.unwrap().1.len()).sum();
            black_box(total);
        });
    });

    group.finish();
}

fn benchmark_internal_children(c: &mut Criterion) {
    let mut page = NodePage::new_internal();
    for ptr in 0..500u64 {
        page.push_child(ptr).unwrap();
    }
    let page = page.freeze();

    c.bench_function("internal_children", |b| {
        b.iter(|| black_box(page.children().unwrap()));
    });
}

criterion_group!(benches, benchmark_leaf_build, benchmark_leaf_decode, benchmark_internal_children);
criterion_main!(benches);
