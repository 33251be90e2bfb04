//! # Executor (C8)
//!
//! Single public entry point: `execute(graph, tenant)`. Runs LOAD (certify,
//! reset), EXECUTE (topologically scheduled dispatch through C2-C6), and
//! UNLOAD (always, even on failure) — grounded on `enhanced_executor.py`'s
//! three-phase structure and its fixed per-step dispatch order (firewall,
//! then state machine, then linear consume, then time advance).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::capability_system::{Capability, CapabilitySystem, CapabilityToken};
use crate::entanglement_firewall::EntanglementFirewall;
use crate::error::{
    CapabilityViolation, CapabilityViolationKind, LinearityViolation, LinearityViolationKind,
    QmkError, ResourceError, ResourceErrorKind, VerificationError,
};
use crate::graph::{cap_required, topological_schedule, Node, OpName, OperationGraph};
use crate::linear_types::{LinearTypeSystem, ResourceKind};
use crate::logical_qubit::{MeasurementBasis, TwoQubitGate};
use crate::qec_profiles::parse_profile_string;
use crate::resource_engine::{PeakUsage, ResourceEngine};
use crate::static_verifier::StaticVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Completed,
    Failed,
    Rejected,
    Cancelled,
}

/// Outcome of `run_steps`: either the schedule ran to completion, or a
/// cancellation flag was observed at a step boundary, in which case the
/// step index becomes the job's `cancelled_at_epoch`.
enum RunOutcome {
    Completed,
    Cancelled { at_step: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub tag: String,
    pub node_id: Option<String>,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Telemetry {
    pub peak_resources: PeakUsage,
    pub simulation_time_us: u64,
}

/// Which of the optional enforcement services were actually wired in for
/// this run, per `enhanced_executor.py`'s `get_execution_context()`. When a
/// field is `false` the corresponding check was skipped entirely (reduced-
/// security mode, spec.md §6.5), not vacuously satisfied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SecurityFeatures {
    pub capability_system: bool,
    pub linear_type_system: bool,
    pub entanglement_firewall: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfiguration {
    pub max_physical_qubits: u64,
    pub deterministic: bool,
    pub seed: Option<u64>,
    pub certification_required: bool,
    pub strict_verification: bool,
}

/// Backend/configuration introspection surface, grounded on
/// `enhanced_executor.py`'s `get_execution_context()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub backend: String,
    pub backend_version: String,
    pub simulator: String,
    pub qec_enabled: bool,
    pub configuration: ExecutionConfiguration,
    pub security_features: SecurityFeatures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub events: HashMap<String, i64>,
    pub telemetry: Telemetry,
    pub execution_context: ExecutionContext,
    pub execution_log: Vec<LogEntry>,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_physical_qubits: u64,
    pub seed: Option<u64>,
    pub require_certification: bool,
    pub strict_verification: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_physical_qubits: 100_000,
            seed: None,
            require_certification: true,
            strict_verification: false,
        }
    }
}

/// Legacy/declarative default: only `ALLOC` is granted absent an injected
/// capability system, matching `kernel/simulator/capabilities.py`'s
/// `DEFAULT_CAPS` (`CAP_ALLOC: True`, everything else `False`).
const LEGACY_DEFAULT_CAPS: &[Capability] = &[Capability::Alloc];

/// Optional injected services (§6.5). Omitting any of these drops the
/// executor into reduced-security diagnostic mode for that subsystem: the
/// resource engine is always present, but capability/linearity/firewall
/// checks are skipped (or fall back to the legacy declarative set) when
/// their service isn't configured.
#[derive(Default)]
pub struct ExecutorServices {
    pub capability_system: Option<CapabilitySystem>,
    pub capability_token: Option<CapabilityToken>,
    pub linear_type_system: Option<LinearTypeSystem>,
    pub entanglement_firewall: Option<Mutex<EntanglementFirewall>>,
}

pub struct Executor {
    resource_engine: Mutex<ResourceEngine>,
    services: ExecutorServices,
    verifier: StaticVerifier,
    config: ExecutorConfig,
    events: Mutex<HashMap<String, i64>>,
    execution_log: Mutex<Vec<LogEntry>>,
    load_time_allocated: Mutex<HashSet<String>>,
}

impl Executor {
    pub fn new(config: ExecutorConfig, services: ExecutorServices, verifier: StaticVerifier) -> Self {
        let resource_engine = ResourceEngine::new(config.max_physical_qubits, config.seed);
        Self {
            resource_engine: Mutex::new(resource_engine),
            services,
            verifier,
            config,
            events: Mutex::new(HashMap::new()),
            execution_log: Mutex::new(Vec::new()),
            load_time_allocated: Mutex::new(HashSet::new()),
        }
    }

    fn legacy_caps(&self, graph: &OperationGraph) -> HashSet<Capability> {
        let mut caps: HashSet<Capability> = LEGACY_DEFAULT_CAPS.iter().copied().collect();
        for name in &graph.caps {
            if let Some(cap) = Capability::parse(name) {
                caps.insert(cap);
            }
        }
        caps
    }

    fn available_caps_for_verifier(&self, graph: &OperationGraph) -> HashSet<Capability> {
        if let Some(token) = &self.services.capability_token {
            token.capabilities.iter().copied().collect()
        } else {
            self.legacy_caps(graph)
        }
    }

    /// Reports which enforcement services are actually active for this
    /// executor instance, not just which checks passed, per
    /// `get_execution_context()`.
    fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            backend: "qmk_core executor".to_string(),
            backend_version: env!("CARGO_PKG_VERSION").to_string(),
            simulator: "Logical qubit simulator".to_string(),
            qec_enabled: true,
            configuration: ExecutionConfiguration {
                max_physical_qubits: self.config.max_physical_qubits,
                deterministic: self.config.seed.is_some(),
                seed: self.config.seed,
                certification_required: self.config.require_certification,
                strict_verification: self.config.strict_verification,
            },
            security_features: SecurityFeatures {
                capability_system: self.services.capability_system.is_some(),
                linear_type_system: self.services.linear_type_system.is_some(),
                entanglement_firewall: self.services.entanglement_firewall.is_some(),
            },
        }
    }

    fn push_log(&self, tag: &str, node_id: Option<String>, detail: serde_json::Value) {
        self.execution_log.lock().push(LogEntry {
            tag: tag.to_string(),
            node_id,
            detail,
        });
    }

    /// §6.2/§6.5: entry point wrapping LOAD, EXECUTE, UNLOAD.
    pub fn execute(&self, graph: &OperationGraph, tenant: &str) -> Result<ExecutionResult, QmkError> {
        self.execute_cancellable(graph, tenant, None)
    }

    /// As `execute`, but checked for cancellation at every step boundary
    /// (§5). `cancel` is polled before each node dispatches; when set, the
    /// run stops at the current step index and UNLOAD still runs. The
    /// job-control layer (`session.rs`) owns the flag and the mapping of
    /// `cancelled_at_epoch` onto its job record.
    pub fn execute_cancellable(
        &self,
        graph: &OperationGraph,
        tenant: &str,
        cancel: Option<&AtomicBool>,
    ) -> Result<ExecutionResult, QmkError> {
        let available = self.available_caps_for_verifier(graph);

        let schedule = if self.config.require_certification {
            let (certified, result) =
                self.verifier.certify(graph, Some(&available), Some(tenant));
            if !certified {
                self.push_log("REJECTED", None, serde_json::json!({}));
                return Err(QmkError::Verification(VerificationError {
                    findings: result.errors.clone(),
                    report: result.report(),
                }));
            }
            result.schedule
        } else {
            topological_schedule(&graph.program)?
        };

        self.resource_engine.lock().reset();
        self.events.lock().clear();
        self.execution_log.lock().clear();
        self.load_time_allocated.lock().clear();
        self.push_log("LOAD", None, serde_json::json!({}));

        let run_result = self.run_steps(graph, &schedule, tenant, &available, cancel);
        let telemetry = self.unload();

        match run_result {
            Ok(RunOutcome::Completed) => Ok(ExecutionResult {
                status: ExecutionStatus::Completed,
                events: self.events.lock().clone(),
                telemetry,
                execution_context: self.execution_context(),
                execution_log: self.execution_log.lock().clone(),
            }),
            Ok(RunOutcome::Cancelled { at_step }) => {
                self.push_log("ERROR", None, serde_json::json!({ "cancelled_at_epoch": at_step }));
                Ok(ExecutionResult {
                    status: ExecutionStatus::Cancelled,
                    events: self.events.lock().clone(),
                    telemetry,
                    execution_context: self.execution_context(),
                    execution_log: self.execution_log.lock().clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn run_steps(
        &self,
        graph: &OperationGraph,
        schedule: &[usize],
        tenant: &str,
        legacy_caps: &HashSet<Capability>,
        cancel: Option<&AtomicBool>,
    ) -> Result<RunOutcome, QmkError> {
        for (step, &idx) in schedule.iter().enumerate() {
            if cancel.map_or(false, |c| c.load(Ordering::SeqCst)) {
                return Ok(RunOutcome::Cancelled { at_step: step });
            }

            let node = &graph.program.nodes[idx];

            if let Some(required) = cap_required(node.op) {
                if let Err(e) = self.check_capability(required, legacy_caps) {
                    self.push_log("ERROR", Some(node.id.clone()), serde_json::json!({ "error": e.to_string() }));
                    return Err(e);
                }
            }

            if let Some(guard) = &node.guard {
                let events = self.events.lock().clone();
                if !guard.evaluate(&events) {
                    self.push_log("SKIP", Some(node.id.clone()), serde_json::json!({}));
                    continue;
                }
            }

            if let Err(e) = self.dispatch(node, tenant) {
                self.push_log("ERROR", Some(node.id.clone()), serde_json::json!({ "error": e.to_string() }));
                return Err(e);
            }
        }
        Ok(RunOutcome::Completed)
    }

    fn check_capability(
        &self,
        required: Capability,
        legacy_caps: &HashSet<Capability>,
    ) -> Result<(), QmkError> {
        match (&self.services.capability_token, &self.services.capability_system) {
            (Some(token), Some(cap_sys)) => {
                if cap_sys.check(token, required, false) {
                    Ok(())
                } else {
                    Err(CapabilityViolation {
                        kind: CapabilityViolationKind::MissingCapability,
                        message: format!("capability token lacks {required:?}"),
                    }
                    .into())
                }
            }
            _ => {
                if legacy_caps.contains(&required) {
                    Ok(())
                } else {
                    Err(CapabilityViolation {
                        kind: CapabilityViolationKind::MissingCapability,
                        message: format!("legacy capability set lacks {required:?}"),
                    }
                    .into())
                }
            }
        }
    }

    fn dispatch(&self, node: &Node, default_tenant: &str) -> Result<(), QmkError> {
        match node.op {
            OpName::AllocLq => self.op_alloc(node, default_tenant),
            OpName::FreeLq => self.op_free(node),
            OpName::Reset => self.op_reset(node),
            OpName::ApplyH => self.op_single_gate(node, "H"),
            OpName::ApplyX => self.op_single_gate(node, "X"),
            OpName::ApplyY => self.op_single_gate(node, "Y"),
            OpName::ApplyZ => self.op_single_gate(node, "Z"),
            OpName::ApplyS => self.op_single_gate(node, "S"),
            OpName::ApplyT => self.op_single_gate(node, "T"),
            OpName::ApplyCnot => self.op_two_qubit_gate(node, TwoQubitKind::Cnot),
            OpName::ApplyCz => self.op_two_qubit_gate(node, TwoQubitKind::Cz),
            OpName::ApplySwap => self.op_two_qubit_gate(node, TwoQubitKind::Swap),
            OpName::TeleportCnot => self.op_two_qubit_gate(node, TwoQubitKind::Cnot),
            OpName::MeasureZ => self.op_measure(node, MeasurementBasis::Z),
            OpName::MeasureX => self.op_measure(node, MeasurementBasis::X),
            OpName::MeasureY => self.op_measure(node, MeasurementBasis::Y),
            OpName::MeasureBell => self.op_measure_bell(node),
            OpName::CondPauli => self.op_cond_pauli(node),
            OpName::OpenChan => self.op_open_chan(node),
            OpName::CloseChan => self.op_close_chan(node),
            OpName::InjectTState => self.op_inject_t_state(node),
            OpName::FenceEpoch => {
                self.push_log("FENCE", Some(node.id.clone()), serde_json::json!({}));
                Ok(())
            }
            OpName::BarRegion => {
                self.push_log("BARRIER", Some(node.id.clone()), serde_json::json!({}));
                Ok(())
            }
            OpName::SetPolicy => {
                self.push_log("FENCE", Some(node.id.clone()), serde_json::json!({ "policy": true }));
                Ok(())
            }
        }
    }

    fn op_alloc(&self, node: &Node, default_tenant: &str) -> Result<(), QmkError> {
        let profile_str = node
            .args
            .get("profile")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ResourceError {
                kind: ResourceErrorKind::UnknownQubit,
                message: "ALLOC_LQ requires args.profile".to_string(),
            })?;
        let profile = parse_profile_string(profile_str)?;
        let tenant = node
            .args
            .get("tenant_id")
            .and_then(|v| v.as_str())
            .unwrap_or(default_tenant);

        self.resource_engine.lock().allocate(&node.vqs, tenant, profile)?;
        for vq in &node.vqs {
            self.load_time_allocated.lock().insert(vq.clone());
            if let Some(fw) = &self.services.entanglement_firewall {
                fw.lock().register_qubit(vq, tenant);
            }
            if let Some(lts) = &self.services.linear_type_system {
                lts.create_handle(ResourceKind::Vq, vq, tenant, None)?;
            }
        }
        self.push_log("ALLOC", Some(node.id.clone()), serde_json::json!({ "vqs": node.vqs, "tenant": tenant }));
        Ok(())
    }

    fn op_free(&self, node: &Node) -> Result<(), QmkError> {
        for vq in &node.vqs {
            if let Some(lts) = &self.services.linear_type_system {
                lts.consume_resource(vq, "FREE_LQ")?;
            }
            if let Some(fw) = &self.services.entanglement_firewall {
                fw.lock().unregister_qubit(vq);
            }
            self.load_time_allocated.lock().remove(vq);
        }
        self.resource_engine.lock().free(&node.vqs);
        self.push_log("FREE", Some(node.id.clone()), serde_json::json!({ "vqs": node.vqs }));
        Ok(())
    }

    fn op_reset(&self, node: &Node) -> Result<(), QmkError> {
        let vq = single_operand(node)?;
        let mut engine = self.resource_engine.lock();
        let now = engine.current_time_us();
        engine.get_mut(vq)?.reset(now);
        drop(engine);
        self.advance_single(vq)?;
        self.push_log("GATE", Some(node.id.clone()), serde_json::json!({ "op": "RESET", "vq": vq }));
        Ok(())
    }

    fn op_single_gate(&self, node: &Node, gate: &str) -> Result<(), QmkError> {
        let vq = single_operand(node)?;
        let mut engine = self.resource_engine.lock();
        let now = engine.current_time_us();
        engine.get_mut(vq)?.apply_gate(gate, now);
        let cycle = engine.get(vq)?.profile.logical_cycle_time_us;
        engine.advance_time(cycle);
        drop(engine);
        self.push_log("GATE", Some(node.id.clone()), serde_json::json!({ "op": gate, "vq": vq }));
        Ok(())
    }

    fn advance_single(&self, vq: &str) -> Result<(), QmkError> {
        let mut engine = self.resource_engine.lock();
        let cycle = engine.get(vq)?.profile.logical_cycle_time_us;
        engine.advance_time(cycle);
        Ok(())
    }

    fn op_two_qubit_gate(&self, node: &Node, kind: TwoQubitKind) -> Result<(), QmkError> {
        if node.vqs.len() != 2 {
            return Err(ResourceError {
                kind: ResourceErrorKind::UnknownQubit,
                message: "two-qubit gate requires exactly two qubit operands".to_string(),
            }
            .into());
        }
        let (a, b) = (node.vqs[0].clone(), node.vqs[1].clone());

        if let Some(lts) = &self.services.linear_type_system {
            for vq in [&a, &b] {
                if !lts.check_resource(vq) {
                    return Err(LinearityViolation {
                        kind: LinearityViolationKind::UseAfterConsume,
                        resource_id: vq.clone(),
                        op_label: format!("{kind:?}"),
                    }
                    .into());
                }
            }
        }

        if let Some(fw) = &self.services.entanglement_firewall {
            let now = self.resource_engine.lock().current_time_us();
            let channel = node.args.get("channel").and_then(|v| v.as_str());
            fw.lock().add_entanglement(&a, &b, channel, now)?;
        }

        let mut engine = self.resource_engine.lock();
        let now = engine.current_time_us();
        let cycle = engine.apply_two_qubit_gate(&a, &b, now, |qa, qb, now| match kind {
            TwoQubitKind::Cnot => TwoQubitGate::apply_cnot(qa, qb, now),
            TwoQubitKind::Cz => TwoQubitGate::apply_cz(qa, qb, now),
            TwoQubitKind::Swap => TwoQubitGate::apply_swap(qa, qb, now),
        })?;
        engine.advance_time(cycle);
        drop(engine);

        self.push_log("GATE", Some(node.id.clone()), serde_json::json!({ "op": format!("{kind:?}"), "vqs": [a, b] }));
        Ok(())
    }

    fn op_measure(&self, node: &Node, basis: MeasurementBasis) -> Result<(), QmkError> {
        let vq = single_operand(node)?;
        let event = node.produces.first().ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: "measurement requires a produced event id".to_string(),
        })?;

        let outcome = {
            let mut engine = self.resource_engine.lock();
            let partner = engine.get(vq)?.entanglement_partner.clone();
            match partner {
                Some(partner_id) => engine.measure_entangled_pair(vq, &partner_id, basis)?,
                None => engine.measure_qubit(vq, basis)?,
            }
        };

        self.events.lock().insert(event.clone(), outcome as i64);
        if let Some(lts) = &self.services.linear_type_system {
            lts.consume_resource(vq, "MEASURE")?;
        }
        if let Some(fw) = &self.services.entanglement_firewall {
            fw.lock().unregister_qubit(vq);
        }

        self.push_log(
            "MEASURE",
            Some(node.id.clone()),
            serde_json::json!({ "vq": vq, "event": event, "outcome": outcome }),
        );
        Ok(())
    }

    fn op_measure_bell(&self, node: &Node) -> Result<(), QmkError> {
        if node.vqs.len() != 2 {
            return Err(ResourceError {
                kind: ResourceErrorKind::UnknownQubit,
                message: "MEASURE_BELL requires exactly two qubit operands".to_string(),
            }
            .into());
        }
        let (a, b) = (node.vqs[0].clone(), node.vqs[1].clone());

        let (o1, o2, bell_index) = self.resource_engine.lock().measure_bell(&a, &b)?;

        match node.produces.len() {
            2 => {
                self.events.lock().insert(node.produces[0].clone(), o1 as i64);
                self.events.lock().insert(node.produces[1].clone(), o2 as i64);
            }
            1 => {
                self.events.lock().insert(node.produces[0].clone(), bell_index as i64);
            }
            _ => {
                return Err(ResourceError {
                    kind: ResourceErrorKind::UnknownQubit,
                    message: "MEASURE_BELL requires one or two produced events".to_string(),
                }
                .into());
            }
        }

        if let Some(lts) = &self.services.linear_type_system {
            lts.consume_resource(&a, "MEASURE_BELL")?;
            lts.consume_resource(&b, "MEASURE_BELL")?;
        }
        if let Some(fw) = &self.services.entanglement_firewall {
            fw.lock().unregister_qubit(&a);
            fw.lock().unregister_qubit(&b);
        }

        self.push_log(
            "MEASURE",
            Some(node.id.clone()),
            serde_json::json!({ "vqs": [a, b], "o1": o1, "o2": o2, "bell_index": bell_index }),
        );
        Ok(())
    }

    fn op_cond_pauli(&self, node: &Node) -> Result<(), QmkError> {
        let events = self.events.lock().clone();
        let all_set = node.inputs.iter().all(|e| events.get(e) == Some(&1));
        if all_set {
            let mask = node
                .args
                .get("mask")
                .and_then(|v| v.as_str())
                .unwrap_or("X");
            let axis = match mask {
                "X" => "X",
                "Y" => "Y",
                "Z" => "Z",
                _ => "X",
            };
            let mut engine = self.resource_engine.lock();
            let now = engine.current_time_us();
            for vq in &node.vqs {
                engine.get_mut(vq)?.apply_gate(axis, now);
            }
        }
        self.push_log(
            "COND_PAULI",
            Some(node.id.clone()),
            serde_json::json!({ "vqs": node.vqs, "applied": all_set }),
        );
        Ok(())
    }

    fn op_open_chan(&self, node: &Node) -> Result<(), QmkError> {
        if node.vqs.len() != 2 || node.chs.is_empty() {
            return Err(ResourceError {
                kind: ResourceErrorKind::UnknownChannel,
                message: "OPEN_CHAN requires two vqs and one channel id".to_string(),
            }
            .into());
        }
        let fidelity = node.args.get("fidelity").and_then(|v| v.as_f64()).unwrap_or(1.0);
        self.resource_engine
            .lock()
            .open_channel(&node.chs[0], &node.vqs[0], &node.vqs[1], fidelity)?;
        self.push_log("ALLOC", Some(node.id.clone()), serde_json::json!({ "op": "OPEN_CHAN", "ch": node.chs[0] }));
        Ok(())
    }

    fn op_close_chan(&self, node: &Node) -> Result<(), QmkError> {
        let ch = node.chs.first().ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownChannel,
            message: "CLOSE_CHAN requires a channel id".to_string(),
        })?;
        self.resource_engine.lock().close_channel(ch)?;
        self.push_log("FREE", Some(node.id.clone()), serde_json::json!({ "op": "CLOSE_CHAN", "ch": ch }));
        Ok(())
    }

    fn op_inject_t_state(&self, node: &Node) -> Result<(), QmkError> {
        let vq = single_operand(node)?;
        let mut engine = self.resource_engine.lock();
        let now = engine.current_time_us();
        engine.get_mut(vq)?.apply_gate("T", now);
        let cycle = engine.get(vq)?.profile.logical_cycle_time_us;
        engine.advance_time(cycle);
        drop(engine);
        self.push_log("GATE", Some(node.id.clone()), serde_json::json!({ "op": "INJECT_T_STATE", "vq": vq }));
        Ok(())
    }

    /// Always runs. Sweeps qubits still allocated from this run and returns
    /// telemetry captured before the sweep, per spec.md §4.3/§4.8.
    fn unload(&self) -> Telemetry {
        let (peak, sim_time_us) = {
            let engine = self.resource_engine.lock();
            (engine.peak_usage(), engine.current_time_us())
        };

        let remaining: Vec<String> = self.load_time_allocated.lock().drain().collect();
        if !remaining.is_empty() {
            self.resource_engine.lock().free(&remaining);
            if let Some(fw) = &self.services.entanglement_firewall {
                let mut guard = fw.lock();
                for vq in &remaining {
                    guard.unregister_qubit(vq);
                }
            }
        }
        self.push_log("UNLOAD", None, serde_json::json!({ "swept": remaining }));

        Telemetry {
            peak_resources: peak,
            simulation_time_us: sim_time_us,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TwoQubitKind {
    Cnot,
    Cz,
    Swap,
}

fn single_operand(node: &Node) -> Result<&str, QmkError> {
    node.vqs.first().map(|s| s.as_str()).ok_or_else(|| {
        ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: format!("{:?} requires one qubit operand", node.op),
        }
        .into()
    })
}
