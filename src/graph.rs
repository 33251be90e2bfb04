//! # Operation Graph Wire Format
//!
//! Wire types for the DAG submitted to the executor (§6.1/§6.2), plus the
//! topological scheduler shared by the static verifier and the executor so
//! both walk nodes in the same order. Grounded on
//! `kernel/simulator/scheduler.py`'s Kahn's-algorithm-over-`produces[]`
//! dependency scheme.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::capability_system::Capability;
use crate::error::{GraphError, GraphErrorKind};

/// The closed operation set from §6.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpName {
    #[serde(rename = "ALLOC_LQ")]
    AllocLq,
    #[serde(rename = "FREE_LQ")]
    FreeLq,
    #[serde(rename = "RESET")]
    Reset,
    #[serde(rename = "APPLY_H")]
    ApplyH,
    #[serde(rename = "APPLY_X")]
    ApplyX,
    #[serde(rename = "APPLY_Y")]
    ApplyY,
    #[serde(rename = "APPLY_Z")]
    ApplyZ,
    #[serde(rename = "APPLY_S")]
    ApplyS,
    #[serde(rename = "APPLY_T")]
    ApplyT,
    #[serde(rename = "APPLY_CNOT")]
    ApplyCnot,
    #[serde(rename = "APPLY_CZ")]
    ApplyCz,
    #[serde(rename = "APPLY_SWAP")]
    ApplySwap,
    #[serde(rename = "TELEPORT_CNOT")]
    TeleportCnot,
    #[serde(rename = "MEASURE_Z")]
    MeasureZ,
    #[serde(rename = "MEASURE_X")]
    MeasureX,
    #[serde(rename = "MEASURE_Y")]
    MeasureY,
    #[serde(rename = "MEASURE_BELL")]
    MeasureBell,
    #[serde(rename = "COND_PAULI")]
    CondPauli,
    #[serde(rename = "OPEN_CHAN")]
    OpenChan,
    #[serde(rename = "CLOSE_CHAN")]
    CloseChan,
    #[serde(rename = "INJECT_T_STATE")]
    InjectTState,
    #[serde(rename = "FENCE_EPOCH")]
    FenceEpoch,
    #[serde(rename = "BAR_REGION")]
    BarRegion,
    #[serde(rename = "SET_POLICY")]
    SetPolicy,
}

impl OpName {
    pub fn is_two_qubit_gate(self) -> bool {
        matches!(self, Self::ApplyCnot | Self::ApplyCz | Self::ApplySwap | Self::TeleportCnot)
    }

    pub fn is_single_qubit_gate(self) -> bool {
        matches!(
            self,
            Self::ApplyH | Self::ApplyX | Self::ApplyY | Self::ApplyZ | Self::ApplyS | Self::ApplyT
        )
    }

    pub fn is_measurement(self) -> bool {
        matches!(self, Self::MeasureZ | Self::MeasureX | Self::MeasureY | Self::MeasureBell)
    }

    pub fn is_entangling(self) -> bool {
        self.is_two_qubit_gate()
    }

    /// No-op scheduling hints that the executor still logs but never
    /// dispatches to C2-C6.
    pub fn is_scheduling_hint(self) -> bool {
        matches!(self, Self::FenceEpoch | Self::BarRegion | Self::SetPolicy)
    }
}

/// The capability-requirement table shared by the verifier's capability
/// pass and the executor's runtime check (§6.2's "Requires" column).
pub fn cap_required(op: OpName) -> Option<Capability> {
    match op {
        OpName::AllocLq => Some(Capability::Alloc),
        OpName::TeleportCnot => Some(Capability::Teleport),
        OpName::MeasureZ | OpName::MeasureX | OpName::MeasureY | OpName::MeasureBell => {
            Some(Capability::Measure)
        }
        OpName::OpenChan | OpName::CloseChan => Some(Capability::Link),
        OpName::InjectTState => Some(Capability::Magic),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardKind {
    And,
    Or,
}

/// A guard either compares one event to a literal bit, or combines
/// sub-guards with AND/OR (§6.1). The JSON shape distinguishes the two
/// forms by field presence, hence `untagged`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Guard {
    EventEquals { event: String, equals: u8 },
    Compound { #[serde(rename = "type")] kind: GuardKind, conditions: Vec<Guard> },
}

impl Guard {
    pub fn referenced_events(&self) -> Vec<&str> {
        match self {
            Guard::EventEquals { event, .. } => vec![event.as_str()],
            Guard::Compound { conditions, .. } => {
                conditions.iter().flat_map(|g| g.referenced_events()).collect()
            }
        }
    }

    pub fn evaluate(&self, events: &HashMap<String, i64>) -> bool {
        match self {
            Guard::EventEquals { event, equals } => {
                events.get(event).map_or(false, |v| *v == *equals as i64)
            }
            Guard::Compound { kind, conditions } => match kind {
                GuardKind::And => conditions.iter().all(|g| g.evaluate(events)),
                GuardKind::Or => conditions.iter().any(|g| g.evaluate(events)),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub op: OpName,
    #[serde(default)]
    pub vqs: Vec<String>,
    #[serde(default)]
    pub chs: Vec<String>,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default = "default_args")]
    pub args: serde_json::Value,
    pub guard: Option<Guard>,
}

fn default_args() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Program {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Resources {
    #[serde(default)]
    pub vqs: Vec<String>,
    #[serde(default)]
    pub chs: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationGraph {
    pub version: String,
    #[serde(default)]
    pub caps: Vec<String>,
    pub program: Program,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default = "default_args")]
    pub metadata: serde_json::Value,
}

/// Orders nodes so that every node runs after the producer of every event
/// it reads (via `inputs` or its guard). Ties break on input order, which
/// keeps scheduling deterministic for identical graphs.
pub fn topological_schedule(program: &Program) -> Result<Vec<usize>, GraphError> {
    let n = program.nodes.len();
    let mut producer_of: HashMap<&str, usize> = HashMap::new();
    for (idx, node) in program.nodes.iter().enumerate() {
        for event in &node.produces {
            if producer_of.insert(event.as_str(), idx).is_some() {
                return Err(GraphError {
                    kind: GraphErrorKind::Malformed,
                    message: format!("event {event:?} produced by more than one node"),
                });
            }
        }
    }

    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (idx, node) in program.nodes.iter().enumerate() {
        let mut deps: HashSet<usize> = HashSet::new();
        for event in &node.inputs {
            if let Some(&producer) = producer_of.get(event.as_str()) {
                deps.insert(producer);
            }
        }
        if let Some(guard) = &node.guard {
            for event in guard.referenced_events() {
                if let Some(&producer) = producer_of.get(event) {
                    deps.insert(producer);
                }
            }
        }
        for dep in deps {
            if dep != idx {
                dependents[dep].push(idx);
                indegree[idx] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &dep in &dependents[i] {
            indegree[dep] -= 1;
            if indegree[dep] == 0 {
                queue.push_back(dep);
            }
        }
    }

    if order.len() != n {
        return Err(GraphError {
            kind: GraphErrorKind::Cycle,
            message: "operation graph contains a cycle in event dataflow".to_string(),
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, op: OpName, produces: &[&str], inputs: &[&str]) -> Node {
        Node {
            id: id.to_string(),
            op,
            vqs: vec![],
            chs: vec![],
            produces: produces.iter().map(|s| s.to_string()).collect(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            args: default_args(),
            guard: None,
        }
    }

    #[test]
    fn schedules_in_dataflow_order() {
        let program = Program {
            nodes: vec![
                node("n2", OpName::CondPauli, &[], &["e0"]),
                node("n1", OpName::MeasureZ, &["e0"], &[]),
            ],
        };
        let order = topological_schedule(&program).unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn detects_cycles() {
        let program = Program {
            nodes: vec![
                node("n1", OpName::MeasureZ, &["e0"], &["e1"]),
                node("n2", OpName::MeasureZ, &["e1"], &["e0"]),
            ],
        };
        let err = topological_schedule(&program).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::Cycle);
    }

    #[test]
    fn duplicate_producer_is_malformed() {
        let program = Program {
            nodes: vec![
                node("n1", OpName::MeasureZ, &["e0"], &[]),
                node("n2", OpName::MeasureZ, &["e0"], &[]),
            ],
        };
        let err = topological_schedule(&program).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::Malformed);
    }

    #[test]
    fn guard_evaluation() {
        let mut events = HashMap::new();
        events.insert("e0".to_string(), 1);
        events.insert("e1".to_string(), 0);
        let guard = Guard::Compound {
            kind: GuardKind::And,
            conditions: vec![
                Guard::EventEquals { event: "e0".to_string(), equals: 1 },
                Guard::EventEquals { event: "e1".to_string(), equals: 0 },
            ],
        };
        assert!(guard.evaluate(&events));
    }

    #[test]
    fn op_name_round_trips_through_json() {
        let op = OpName::ApplyCnot;
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, "\"APPLY_CNOT\"");
        let back: OpName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
