use criterion::{criterion_group, criterion_main, Criterion};

use qmk_core::capability_system::Capability;
use qmk_core::executor::{Executor, ExecutorConfig, ExecutorServices};
use qmk_core::graph::{Node, OpName, OperationGraph, Program, Resources};
use qmk_core::static_verifier::{StaticVerifier, VerifierConfig};

fn node(id: &str, op: OpName, vqs: &[&str], args: serde_json::Value) -> Node {
    Node {
        id: id.to_string(),
        op,
        vqs: vqs.iter().map(|s| s.to_string()).collect(),
        chs: vec![],
        produces: vec![],
        inputs: vec![],
        args,
        guard: None,
    }
}

fn bell_pair_graph() -> OperationGraph {
    let mut alloc = node(
        "n0",
        OpName::AllocLq,
        &["q0", "q1"],
        serde_json::json!({ "profile": "logical:surface(d=3)" }),
    );
    alloc.produces = vec![];
    let mut m0 = node("n3", OpName::MeasureZ, &["q0"], serde_json::json!({}));
    m0.produces = vec!["m0".to_string()];
    let mut m1 = node("n4", OpName::MeasureZ, &["q1"], serde_json::json!({}));
    m1.produces = vec!["m1".to_string()];

    OperationGraph {
        version: "0.1".to_string(),
        caps: vec!["MEASURE".to_string()],
        program: Program {
            nodes: vec![
                alloc,
                node("n1", OpName::ApplyH, &["q0"], serde_json::json!({})),
                node("n2", OpName::ApplyCnot, &["q0", "q1"], serde_json::json!({})),
                m0,
                m1,
            ],
        },
        resources: Resources::default(),
        metadata: serde_json::json!({}),
    }
}

fn executor() -> Executor {
    Executor::new(
        ExecutorConfig { seed: Some(7), ..ExecutorConfig::default() },
        ExecutorServices::default(),
        StaticVerifier::new(VerifierConfig::default()),
    )
}

fn benchmark_bell_pair_run(c: &mut Criterion) {
    let executor = executor();
    c.bench_function("bell_pair_load_execute_unload", |b| {
        b.iter(|| {
            let _ = executor.execute(&bell_pair_graph(), "tenant-bench").unwrap();
        })
    });
}

fn benchmark_certification_only(c: &mut Criterion) {
    let verifier = StaticVerifier::new(VerifierConfig::default());
    let graph = bell_pair_graph();
    let caps: std::collections::HashSet<Capability> = [Capability::Measure].into_iter().collect();
    c.bench_function("static_certification", |b| {
        b.iter(|| {
            let (_certified, _report) = verifier.certify(&graph, Some(&caps), Some("tenant-bench"));
        })
    });
}

criterion_group!(benches, benchmark_bell_pair_run, benchmark_certification_only);
criterion_main!(benches);
