//! Performance benchmarks for the temporal graph's BFS traversal (C8 §4.8).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use umc::graph::GraphStore;
use umc::types::{NodeType, RelType};

fn node_id(i: usize) -> String {
    format!("node{i}")
}

/// Builds a tree of the given branching factor and depth, wiring each edge
/// as `related_to` with no validity bound (always valid).
fn build_graph(branching_factor: usize, max_depth: usize) -> (GraphStore, String) {
    let store = GraphStore::open(":memory:").unwrap();
    let root = node_id(0);
    store.add_node(&root, NodeType::Memory, serde_json::Value::Null).unwrap();

    let mut current_level = vec![root.clone()];
    let mut counter = 1usize;
    for _ in 0..max_depth {
        let mut next_level = Vec::new();
        for parent in &current_level {
            for _ in 0..branching_factor {
                let child = node_id(counter);
                counter += 1;
                store.add_node(&child, NodeType::Memory, serde_json::Value::Null).unwrap();
                store
                    .add_edge(parent, &child, RelType::RelatedTo, None, None, None, None, None)
                    .unwrap();
                next_level.push(child);
            }
        }
        current_level = next_level;
    }
    (store, root)
}

fn bench_bfs_traversal(c: &mut Criterion) {
    // depth 3, branching factor 5 -> ~155 nodes, matching the teacher's
    // graph-benchmark scale.
    let (store, root) = build_graph(5, 3);

    let mut group = c.benchmark_group("traversal");

    group.bench_function("bfs_depth_3", |b| {
        b.iter(|| {
            store
                .query_graph(black_box(&[root.clone()]), 3, None, chrono::Utc::now())
                .unwrap()
        })
    });

    group.bench_function("bfs_depth_1", |b| {
        b.iter(|| {
            store
                .query_graph(black_box(&[root.clone()]), 1, None, chrono::Utc::now())
                .unwrap()
        })
    });

    group.finish();
}

fn bench_shortest_path(c: &mut Criterion) {
    let (store, root) = build_graph(3, 4);
    let leaf = node_id(1); // a direct child of root, one hop away

    c.bench_function("shortest_path_len", |b| {
        b.iter(|| store.shortest_path_len(black_box(&root), black_box(&leaf), 6).unwrap())
    });
}

criterion_group!(benches, bench_bfs_traversal, bench_shortest_path);
criterion_main!(benches);
