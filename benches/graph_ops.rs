//! Benchmarks for graph model and diff operations.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use seshat::graph::{Model, Node, Triple};
use seshat::infer::InverseOntology;
use seshat::resource::Resource;
use seshat::store::GraphStore;

const NS: &str = "http://bench/";

fn populated_model(resources: usize) -> Model {
    let mut model = Model::new();
    for n in 0..resources {
        let id = format!("{NS}{n}");
        model.insert(Triple::new(
            &id,
            "http://schema.org/name",
            Node::literal(format!("resource {n}")),
        ));
        model.insert(Triple::link(&id, "http://schema.org/member", format!("{NS}{}", (n + 1) % resources)));
    }
    model
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("model_insert_10k", |bench| {
        bench.iter(|| black_box(populated_model(5_000)))
    });
}

fn bench_bounded_description(c: &mut Criterion) {
    let model = populated_model(10_000);
    c.bench_function("bounded_description", |bench| {
        bench.iter(|| black_box(model.bounded_description(&format!("{NS}42"))))
    });
}

fn bench_diff(c: &mut Criterion) {
    let store = GraphStore::in_memory(NS, Arc::new(InverseOntology::default()));
    let mut diff = seshat::commit::Diff::new();
    for triple in populated_model(1_000).iter() {
        diff.add(triple.clone());
    }
    store
        .commit(seshat::commit::Commit::new(
            seshat::commit::CommitHeader::new("bench", "2024-05-01T12:00:00Z".parse().unwrap()),
            diff,
        ))
        .unwrap();

    let id = format!("{NS}42");
    let mut incoming = Model::new();
    incoming.insert(Triple::new(
        &id,
        "http://schema.org/name",
        Node::literal("renamed"),
    ));
    incoming.insert(Triple::link(&id, "http://schema.org/member", format!("{NS}43")));
    let resource = Resource::new(id, incoming);

    c.bench_function("store_diff", |bench| {
        bench.iter(|| black_box(store.diff(&resource).unwrap()))
    });
}

criterion_group!(benches, bench_insert, bench_bounded_description, bench_diff);
criterion_main!(benches);
