use qmk_core::executor::{Executor, ExecutorConfig, ExecutorServices, ExecutionStatus};
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

fn leaky_graph() -> OperationGraph {
    OperationGraph {
        version: "0.1".to_string(),
        caps: vec![],
        program: Program {
            nodes: vec![
                node(
                    "n0",
                    OpName::AllocLq,
                    &["q0"],
                    serde_json::json!({ "profile": "logical:surface(d=3)" }),
                ),
                node("n1", OpName::ApplyH, &["q0"], serde_json::json!({})),
            ],
        },
        resources: Resources::default(),
        metadata: serde_json::json!({}),
    }
}

/// S6 (non-strict) — an allocated-but-never-consumed qubit completes with a
/// resource-leak warning, not a failure.
#[test]
fn non_strict_leak_completes_with_a_warning() {
    let executor = Executor::new(
        ExecutorConfig::default(),
        ExecutorServices::default(),
        StaticVerifier::new(VerifierConfig::default()),
    );
    let result = executor.execute(&leaky_graph(), "tenant-a").expect("leak is only a warning");
    assert_eq!(result.status, ExecutionStatus::Completed);

    let (certified, report) = StaticVerifier::new(VerifierConfig::default())
        .certify(&leaky_graph(), None, Some("tenant-a"));
    assert!(certified);
    assert!(report.warnings.iter().any(|w| w.code.contains("leak")));
}

/// S6 (strict) — the same graph fails certification under strict verification.
#[test]
fn strict_verification_turns_the_leak_into_an_error() {
    let executor = Executor::new(
        ExecutorConfig { strict_verification: true, ..ExecutorConfig::default() },
        ExecutorServices::default(),
        StaticVerifier::new(VerifierConfig { strict_verification: true, ..VerifierConfig::default() }),
    );
    let err = executor.execute(&leaky_graph(), "tenant-a").unwrap_err();
    assert!(matches!(err, qmk_core::error::QmkError::Verification(_)));
}
