use qmk_core::error::QmkError;
use qmk_core::executor::{Executor, ExecutorConfig, ExecutorServices};
use qmk_core::graph::{Node, OpName, OperationGraph, Program, Resources};
use qmk_core::static_verifier::{StaticVerifier, VerifierConfig};

fn node(id: &str, op: OpName, vqs: &[&str], produces: &[&str], args: serde_json::Value) -> Node {
    Node {
        id: id.to_string(),
        op,
        vqs: vqs.iter().map(|s| s.to_string()).collect(),
        chs: vec![],
        produces: produces.iter().map(|s| s.to_string()).collect(),
        inputs: vec![],
        args,
        guard: None,
    }
}

/// S4 — measuring the same qubit twice is a linearity violation caught in
/// LOAD; no state mutates beyond LOAD's reset.
#[test]
fn double_measurement_is_rejected_in_load() {
    let executor = Executor::new(
        ExecutorConfig::default(),
        ExecutorServices::default(),
        StaticVerifier::new(VerifierConfig::default()),
    );

    let graph = OperationGraph {
        version: "0.1".to_string(),
        caps: vec!["MEASURE".to_string()],
        program: Program {
            nodes: vec![
                node(
                    "n0",
                    OpName::AllocLq,
                    &["q0"],
                    &[],
                    serde_json::json!({ "profile": "logical:surface(d=3)" }),
                ),
                node("n1", OpName::MeasureZ, &["q0"], &["m0"], serde_json::json!({})),
                node("n2", OpName::MeasureX, &["q0"], &["m1"], serde_json::json!({})),
            ],
        },
        resources: Resources::default(),
        metadata: serde_json::json!({}),
    };

    let err = executor.execute(&graph, "tenant-a").unwrap_err();
    assert!(matches!(err, QmkError::Verification(_)));
}
