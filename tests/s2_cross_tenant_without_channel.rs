use qmk_core::error::QmkError;
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

/// S2 — cross-tenant CNOT with no authorizing channel is rejected in LOAD;
/// nothing is left allocated.
#[test]
fn cross_tenant_cnot_without_channel_is_rejected_in_load() {
    let executor = Executor::new(
        ExecutorConfig::default(),
        ExecutorServices::default(),
        StaticVerifier::new(VerifierConfig::default()),
    );

    let graph = OperationGraph {
        version: "0.1".to_string(),
        caps: vec!["MEASURE".to_string(), "LINK".to_string()],
        program: Program {
            nodes: vec![
                node(
                    "n0",
                    OpName::AllocLq,
                    &["q0"],
                    serde_json::json!({ "profile": "logical:surface(d=3)", "tenant_id": "tenant-a" }),
                ),
                node(
                    "n1",
                    OpName::AllocLq,
                    &["q1"],
                    serde_json::json!({ "profile": "logical:surface(d=3)", "tenant_id": "tenant-b" }),
                ),
                node("n2", OpName::ApplyCnot, &["q0", "q1"], serde_json::json!({})),
            ],
        },
        resources: Resources::default(),
        metadata: serde_json::json!({}),
    };

    let err = executor.execute(&graph, "tenant-a").unwrap_err();
    assert!(matches!(err, QmkError::Verification(_)));
}
