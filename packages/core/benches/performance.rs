//! Performance benchmarks for the Payanarss catalog engine
//!
//! Run with: `cargo bench -p payanarss-core`
//!
//! These benchmarks measure critical path performance:
//! - Hierarchy index rebuild (runs after every edit)
//! - Single edit commit including snapshot and rebuild
//! - Bulk import throughput (nested JSON, 1000 nodes)

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use payanarss_core::{CatalogConfig, HierarchyIndex, ImportOptions, Node, RecordStore, TreeEditor};
use serde_json::{json, Value};

/// Generate a catalog of roughly `node_count` nodes, four levels deep
fn generate_catalog(node_count: usize) -> Vec<Node> {
    let mut nodes = vec![Node::with_id("root", "root", "Catalog", "root")];
    let modules = (node_count / 400).max(1);

    'outer: for m in 0..modules {
        let module_id = format!("m{}", m);
        nodes.push(Node::with_id(&module_id, "root", format!("Module {}", m), "module"));
        for t in 0..20 {
            let table_id = format!("{}-t{}", module_id, t);
            nodes.push(Node::with_id(&table_id, &module_id, format!("Table {}", t), "table"));
            for f in 0..19 {
                if nodes.len() >= node_count {
                    break 'outer;
                }
                nodes.push(Node::with_id(
                    format!("{}-f{}", table_id, f),
                    &table_id,
                    format!("Field {}", f),
                    "field",
                ));
            }
        }
    }

    nodes
}

/// Nested import document with `node_count` nodes
fn generate_import(node_count: usize) -> String {
    let tables: Vec<Value> = (0..node_count / 10)
        .map(|t| {
            json!({
                "Id": format!("t{}", t),
                "Name": format!("Imported Table {}", t),
                "TypeRef": "table",
                "Children": (0..9)
                    .map(|f| json!({
                        "Id": format!("t{}-f{}", t, f),
                        "Name": format!("Field {}", f),
                        "TypeRef": "field"
                    }))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    Value::Array(tables).to_string()
}

fn editor_with(node_count: usize) -> TreeEditor {
    let (store, _) = RecordStore::load(generate_catalog(node_count));
    TreeEditor::from_store(store, CatalogConfig::default())
}

/// Benchmark index rebuild
///
/// Target: < 20ms for 20k nodes
fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for size in [1_000, 20_000] {
        let nodes = generate_catalog(size);
        group.bench_function(format!("{}_nodes", size), |b| {
            b.iter(|| black_box(HierarchyIndex::build(black_box(&nodes))))
        });
    }

    group.finish();
}

/// Benchmark one committed edit (clone, invariant check, snapshot, rebuild)
fn bench_edit_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_commit");
    group.sample_size(20);

    group.bench_function("add_child_20k", |b| {
        b.iter_batched(
            || editor_with(20_000),
            |mut editor| black_box(editor.add_child("m0-t0").unwrap()),
            BatchSize::LargeInput,
        )
    });

    group.bench_function("move_subtree_20k", |b| {
        b.iter_batched(
            || editor_with(20_000),
            |mut editor| {
                editor
                    .move_node("m1", "m0-t0", payanarss_core::DropPosition::Inside)
                    .unwrap()
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

/// Benchmark 1000-node import into a 20k catalog
///
/// Target: > 10000 nodes/sec
fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("import");
    group.sample_size(10); // Fewer samples for expensive operations

    let document = generate_import(1_000);
    group.bench_function("1000_nodes", |b| {
        b.iter_batched(
            || editor_with(20_000),
            |mut editor| {
                let result = editor.import_json(&document, ImportOptions::under("m0"));
                black_box(result.imported_count)
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_index_build, bench_edit_commit, bench_import);
criterion_main!(benches);
