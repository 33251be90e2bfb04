use qmk_core::executor::{Executor, ExecutorConfig, ExecutorServices, ExecutionStatus};
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

/// S1 — Allocate [q0,q1] (tenant A); H(q0); CNOT(q0,q1); MEASURE_Z both.
/// Expect COMPLETED, correlated outcomes, no firewall violations.
#[test]
fn bell_pair_completes_with_correlated_outcomes() {
    let executor = Executor::new(
        ExecutorConfig { seed: Some(42), ..ExecutorConfig::default() },
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
                    &["q0", "q1"],
                    &[],
                    serde_json::json!({ "profile": "logical:surface(d=7)" }),
                ),
                node("n1", OpName::ApplyH, &["q0"], &[], serde_json::json!({})),
                node("n2", OpName::ApplyCnot, &["q0", "q1"], &[], serde_json::json!({})),
                node("n3", OpName::MeasureZ, &["q0"], &["m0"], serde_json::json!({})),
                node("n4", OpName::MeasureZ, &["q1"], &["m1"], serde_json::json!({})),
            ],
        },
        resources: Resources::default(),
        metadata: serde_json::json!({}),
    };

    for _ in 0..5 {
        let result = executor.execute(&graph, "tenant-a").expect("should complete");
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.events["m0"], result.events["m1"]);
        assert!(!result
            .execution_log
            .iter()
            .any(|e| e.tag == "FIREWALL_VIOLATION"));
    }
}
