//! # Static Verifier — the gate keeper (C7)
//!
//! Certifies a whole operation graph against linearity, capability, and
//! firewall rules without executing a single operation. The executor calls
//! this in LOAD and then re-derives the same schedule for EXECUTE, so both
//! walk nodes in identical order. Grounded on `qvm/static_verifier.py`'s
//! pass ordering (shape, linearity, capability, firewall, resource-bounds)
//! and its RESET-keeps-allocation linearity exception.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::capability_system::Capability;
use crate::error::{VerificationError, VerificationFinding, VerificationPass};
use crate::graph::{cap_required, Node, OpName, OperationGraph};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationResult {
    pub is_valid: bool,
    pub errors: Vec<VerificationFinding>,
    pub warnings: Vec<VerificationFinding>,
    pub schedule: Vec<usize>,
    pub metadata: serde_json::Value,
}

impl CertificationResult {
    /// A human-readable report for diagnostic use, not meant to be parsed.
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "certification: {}\n",
            if self.is_valid { "PASS" } else { "FAIL" }
        ));
        for e in &self.errors {
            out.push_str(&format!("  ERROR [{:?}] {}: {}\n", e.pass, e.code, e.message));
        }
        for w in &self.warnings {
            out.push_str(&format!("  WARN  [{:?}] {}: {}\n", w.pass, w.code, w.message));
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VerifierConfig {
    pub strict_verification: bool,
    pub qubit_count_warning_threshold: usize,
    pub node_count_warning_threshold: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            strict_verification: false,
            qubit_count_warning_threshold: 256,
            node_count_warning_threshold: 10_000,
        }
    }
}

pub struct StaticVerifier {
    config: VerifierConfig,
}

impl StaticVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Returns `(certified, result)` where `certified = result.is_valid &&
    /// result.errors.is_empty()`.
    pub fn certify(
        &self,
        graph: &OperationGraph,
        available_caps: Option<&HashSet<Capability>>,
        tenant: Option<&str>,
    ) -> (bool, CertificationResult) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.shape_check(graph, &mut errors);

        let schedule = match crate::graph::topological_schedule(&graph.program) {
            Ok(order) => order,
            Err(e) => {
                errors.push(VerificationFinding {
                    pass: VerificationPass::Shape,
                    code: "INVALID_GRAPH.cycle".to_string(),
                    message: e.message,
                    node_id: None,
                });
                (0..graph.program.nodes.len()).collect()
            }
        };

        self.linearity_pass(graph, &schedule, &mut errors, &mut warnings);
        self.capability_pass(graph, &schedule, available_caps, &mut errors);
        self.firewall_pass(graph, &schedule, tenant, &mut errors);
        self.resource_bounds_pass(graph, &schedule, &mut warnings);

        if self.config.strict_verification {
            errors.append(&mut warnings);
        }

        let is_valid = errors.is_empty();
        let result = CertificationResult {
            is_valid,
            errors,
            warnings,
            schedule,
            metadata: serde_json::json!({ "node_count": graph.program.nodes.len() }),
        };
        (is_valid, result)
    }

    fn shape_check(&self, graph: &OperationGraph, errors: &mut Vec<VerificationFinding>) {
        let mut seen_ids = HashSet::new();
        for node in &graph.program.nodes {
            if node.id.is_empty() {
                errors.push(VerificationFinding {
                    pass: VerificationPass::Shape,
                    code: "SHAPE.empty_id".to_string(),
                    message: "node id must be non-empty".to_string(),
                    node_id: None,
                });
                continue;
            }
            if !seen_ids.insert(node.id.clone()) {
                errors.push(VerificationFinding {
                    pass: VerificationPass::Shape,
                    code: "SHAPE.duplicate_id".to_string(),
                    message: format!("duplicate node id: {}", node.id),
                    node_id: Some(node.id.clone()),
                });
            }

            let expected_vqs: Option<usize> = if node.op.is_single_qubit_gate()
                || matches!(node.op, OpName::MeasureZ | OpName::MeasureX | OpName::MeasureY)
            {
                Some(1)
            } else if node.op.is_two_qubit_gate() || matches!(node.op, OpName::MeasureBell) {
                Some(2)
            } else {
                None
            };
            if let Some(expected) = expected_vqs {
                if node.vqs.len() != expected {
                    errors.push(VerificationFinding {
                        pass: VerificationPass::Shape,
                        code: "SHAPE.operand_count".to_string(),
                        message: format!(
                            "{:?} requires {} qubit operand(s), got {}",
                            node.op, expected, node.vqs.len()
                        ),
                        node_id: Some(node.id.clone()),
                    });
                }
            }
        }
    }

    fn linearity_pass(
        &self,
        graph: &OperationGraph,
        schedule: &[usize],
        errors: &mut Vec<VerificationFinding>,
        warnings: &mut Vec<VerificationFinding>,
    ) {
        let mut allocated: HashSet<String> = HashSet::new();
        let mut consumed: HashSet<String> = HashSet::new();

        for &idx in schedule {
            let node = &graph.program.nodes[idx];
            match node.op {
                OpName::AllocLq => {
                    for vq in &node.vqs {
                        if !allocated.insert(vq.clone()) {
                            errors.push(VerificationFinding {
                                pass: VerificationPass::Linearity,
                                code: "LINEARITY_VIOLATION.double_alloc".to_string(),
                                message: format!("qubit {vq} allocated more than once"),
                                node_id: Some(node.id.clone()),
                            });
                        }
                    }
                }
                OpName::MeasureZ
                | OpName::MeasureX
                | OpName::MeasureY
                | OpName::MeasureBell
                | OpName::FreeLq
                | OpName::Reset => {
                    for vq in &node.vqs {
                        if consumed.contains(vq) {
                            errors.push(VerificationFinding {
                                pass: VerificationPass::Linearity,
                                code: "LINEARITY_VIOLATION.use_after_consume".to_string(),
                                message: format!("qubit {vq} used after being consumed"),
                                node_id: Some(node.id.clone()),
                            });
                        } else if !allocated.contains(vq) {
                            errors.push(VerificationFinding {
                                pass: VerificationPass::Linearity,
                                code: "LINEARITY_VIOLATION.used_before_alloc".to_string(),
                                message: format!("qubit {vq} used before allocation"),
                                node_id: Some(node.id.clone()),
                            });
                        } else if node.op != OpName::Reset {
                            consumed.insert(vq.clone());
                        }
                    }
                }
                _ => {
                    for vq in &node.vqs {
                        if consumed.contains(vq) {
                            errors.push(VerificationFinding {
                                pass: VerificationPass::Linearity,
                                code: "LINEARITY_VIOLATION.use_after_consume".to_string(),
                                message: format!("qubit {vq} used after being consumed"),
                                node_id: Some(node.id.clone()),
                            });
                        } else if !allocated.contains(vq) {
                            errors.push(VerificationFinding {
                                pass: VerificationPass::Linearity,
                                code: "LINEARITY_VIOLATION.used_before_alloc".to_string(),
                                message: format!("qubit {vq} used before allocation"),
                                node_id: Some(node.id.clone()),
                            });
                        }
                    }
                }
            }
        }

        for leaked in allocated.difference(&consumed) {
            warnings.push(VerificationFinding {
                pass: VerificationPass::Linearity,
                code: "resource_leak".to_string(),
                message: format!("qubit {leaked} allocated but never consumed"),
                node_id: None,
            });
        }
    }

    fn capability_pass(
        &self,
        graph: &OperationGraph,
        schedule: &[usize],
        available_caps: Option<&HashSet<Capability>>,
        errors: &mut Vec<VerificationFinding>,
    ) {
        let Some(available) = available_caps else { return };
        for &idx in schedule {
            let node = &graph.program.nodes[idx];
            if let Some(required) = cap_required(node.op) {
                if !available.contains(&required) {
                    errors.push(VerificationFinding {
                        pass: VerificationPass::Capability,
                        code: "CAPABILITY_MISSING".to_string(),
                        message: format!("{:?} requires capability {:?}", node.op, required),
                        node_id: Some(node.id.clone()),
                    });
                }
            }
        }
    }

    fn firewall_pass(
        &self,
        graph: &OperationGraph,
        schedule: &[usize],
        tenant: Option<&str>,
        errors: &mut Vec<VerificationFinding>,
    ) {
        let default_tenant = tenant.unwrap_or("default").to_string();
        let mut owner: HashMap<String, String> = HashMap::new();

        for &idx in schedule {
            let node = &graph.program.nodes[idx];
            if node.op == OpName::AllocLq {
                let tenant_id = node
                    .args
                    .get("tenant_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&default_tenant)
                    .to_string();
                for vq in &node.vqs {
                    owner.insert(vq.clone(), tenant_id.clone());
                }
            }

            if node.op.is_entangling() && node.vqs.len() == 2 {
                let tenant_a = owner.get(&node.vqs[0]);
                let tenant_b = owner.get(&node.vqs[1]);
                if let (Some(ta), Some(tb)) = (tenant_a, tenant_b) {
                    if ta != tb {
                        let has_channel = node
                            .args
                            .get("channel")
                            .and_then(|v| v.as_str())
                            .map_or(false, |s| !s.is_empty());
                        if !has_channel {
                            errors.push(VerificationFinding {
                                pass: VerificationPass::Firewall,
                                code: "FIREWALL_VIOLATION.missing_channel".to_string(),
                                message: format!(
                                    "cross-tenant entanglement between {} ({ta}) and {} ({tb}) requires args.channel",
                                    node.vqs[0], node.vqs[1]
                                ),
                                node_id: Some(node.id.clone()),
                            });
                        }
                    }
                }
            }
        }
    }

    fn resource_bounds_pass(
        &self,
        graph: &OperationGraph,
        schedule: &[usize],
        warnings: &mut Vec<VerificationFinding>,
    ) {
        let mut allocated: HashSet<String> = HashSet::new();
        let mut peak_qubits = 0usize;
        for &idx in schedule {
            let node = &graph.program.nodes[idx];
            if node.op == OpName::AllocLq {
                for vq in &node.vqs {
                    allocated.insert(vq.clone());
                }
                peak_qubits = peak_qubits.max(allocated.len());
            }
        }

        if peak_qubits > self.config.qubit_count_warning_threshold {
            warnings.push(VerificationFinding {
                pass: VerificationPass::ResourceBounds,
                code: "RESOURCE_BOUNDS.qubit_count".to_string(),
                message: format!(
                    "peak qubit count {peak_qubits} exceeds warning threshold {}",
                    self.config.qubit_count_warning_threshold
                ),
                node_id: None,
            });
        }
        if graph.program.nodes.len() > self.config.node_count_warning_threshold {
            warnings.push(VerificationFinding {
                pass: VerificationPass::ResourceBounds,
                code: "RESOURCE_BOUNDS.node_count".to_string(),
                message: format!(
                    "node count {} exceeds warning threshold {}",
                    graph.program.nodes.len(),
                    self.config.node_count_warning_threshold
                ),
                node_id: None,
            });
        }
    }
}

impl Default for StaticVerifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

/// Convenience wrapper matching §7: raises `VerificationError` with the
/// full report attached when certification fails.
pub fn certify_graph(
    verifier: &StaticVerifier,
    graph: &OperationGraph,
    available_caps: Option<&HashSet<Capability>>,
    tenant: Option<&str>,
) -> Result<CertificationResult, VerificationError> {
    let (certified, result) = verifier.certify(graph, available_caps, tenant);
    if certified {
        Ok(result)
    } else {
        Err(VerificationError {
            findings: result.errors.clone(),
            report: result.report(),
        })
    }
}
