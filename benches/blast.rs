use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gidx::graph::query::QueryEngine;
use gidx::indexer::Indexer;
use gidx::model::EdgeKind;
use gidx::snapshot::Snapshot;
use std::collections::HashSet;
use std::path::PathBuf;

const MODULES: usize = 40;
const METHODS_PER_CLASS: usize = 4;

/// Synthetic project: a chain of modules where every class method calls
/// into the next module's class, plus a shared helper everyone calls.
fn generate_repo() -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "gidx-bench-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&root).unwrap();

    std::fs::write(
        root.join("shared.py"),
        "def shared_helper():\n    pass\n",
    )
    .unwrap();

    for idx in 0..MODULES {
        let mut source = String::from("from shared import shared_helper\n\n");
        source.push_str(&format!("class Service{idx}:\n"));
        for m in 0..METHODS_PER_CLASS {
            source.push_str(&format!("    def step{m}(self):\n"));
            source.push_str("        shared_helper()\n");
            if idx + 1 < MODULES {
                source.push_str(&format!("        Service{}()\n", idx + 1));
            }
            source.push('\n');
        }
        std::fs::write(root.join(format!("service{idx:02}.py")), source).unwrap();
    }

    root
}

fn setup_snapshot() -> (PathBuf, Snapshot) {
    let root = generate_repo();
    let snapshot = Indexer::new(root.clone()).build().unwrap();
    eprintln!(
        "indexed {} files, {} symbols, {} edges",
        snapshot.stats.files_parsed, snapshot.stats.symbols, snapshot.stats.edges
    );
    (root, snapshot)
}

fn cleanup(root: &PathBuf) {
    let _ = std::fs::remove_dir_all(root);
}

fn bench_build(c: &mut Criterion) {
    let root = generate_repo();

    c.bench_function("full_build", |b| {
        b.iter(|| {
            let snapshot = Indexer::new(black_box(root.clone())).build().unwrap();
            black_box(snapshot)
        })
    });

    cleanup(&root);
}

fn bench_blast_varying_depth(c: &mut Criterion) {
    let (root, snapshot) = setup_snapshot();
    let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);

    let mut group = c.benchmark_group("blast_varying_depth");
    for depth in [1usize, 2, 3, 5] {
        group.bench_with_input(format!("depth_{depth}"), &depth, |b, &depth| {
            b.iter(|| {
                let blast = engine
                    .blast_radius(black_box("shared_helper"), black_box(depth), None)
                    .unwrap();
                black_box(blast)
            })
        });
    }
    group.finish();

    cleanup(&root);
}

fn bench_blast_kind_filter(c: &mut Criterion) {
    let (root, snapshot) = setup_snapshot();
    let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);

    let confirmed: HashSet<EdgeKind> =
        [EdgeKind::Calls, EdgeKind::Contains, EdgeKind::Imports]
            .into_iter()
            .collect();

    let mut group = c.benchmark_group("blast_kind_filter");
    group.bench_function("all_kinds", |b| {
        b.iter(|| {
            let blast = engine
                .blast_radius(black_box("shared_helper"), black_box(2), None)
                .unwrap();
            black_box(blast)
        })
    });
    group.bench_function("confirmed_only", |b| {
        b.iter(|| {
            let blast = engine
                .blast_radius(
                    black_box("shared_helper"),
                    black_box(2),
                    black_box(Some(&confirmed)),
                )
                .unwrap();
            black_box(blast)
        })
    });
    group.finish();

    cleanup(&root);
}

fn bench_diff_impact(c: &mut Criterion) {
    let (root, snapshot) = setup_snapshot();
    let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);

    let changes = vec![("shared.py".to_string(), vec![(1i64, 2i64)])];

    c.bench_function("diff_impact_depth1", |b| {
        b.iter(|| {
            let impact = engine.diff_impact(black_box(&changes), black_box(1));
            black_box(impact)
        })
    });

    cleanup(&root);
}

criterion_group!(
    benches,
    bench_build,
    bench_blast_varying_depth,
    bench_blast_kind_filter,
    bench_diff_impact,
);

criterion_main!(benches);
