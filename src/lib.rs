//! # Quantum Microkernel Core
//!
//! A quantum microkernel (QMK) that executes operation-graph programs
//! against a simulated logical-qubit substrate under strict multi-tenant
//! isolation. The core is the trust boundary between untrusted user-mode
//! graph submitters and the privileged resource engine: a program is
//! accepted only after full static certification (C7), then executed under
//! runtime mediation by the capability system (C4), linear type system
//! (C5), and entanglement firewall (C6).
//!
//! ## Architecture
//!
//! Seven cooperating components, dependency order leaves first:
//!
//! - **C1 — QEC profile registry** (`qec_profiles`): pure data, named
//!   logical-code parameters.
//! - **C2 — Logical qubit state** (`logical_qubit`): per-qubit symbolic
//!   state and gate/measure/reset transition rules.
//! - **C3 — Resource engine** (`resource_engine`): allocation/free of
//!   logical qubits and channels, simulated time, peak-usage telemetry.
//! - **C4 — Capability system** (`capability_system`): signed, attenuable,
//!   revocable tokens gating every privileged operation.
//! - **C5 — Linear type system** (`linear_types`): use-once handles over
//!   allocated resources; no-aliasing, leak detection.
//! - **C6 — Entanglement firewall** (`entanglement_firewall`): typed
//!   entanglement graph; quota-bounded, bilaterally authorized cross-tenant
//!   channels.
//! - **C7 — Static verifier** (`static_verifier`): whole-graph
//!   certification over C4-C6 rules before a single operation dispatches.
//! - **C8 — Executor** (`executor`): LOAD/EXECUTE/UNLOAD; the sole
//!   interpreter of certified graphs.
//!
//! `graph` carries the wire format and the shared topological scheduler;
//! `session` is the async job-control collaborator boundary (§6.3) wrapping
//! the synchronous executor; `telemetry` and `config` are the ambient
//! logging/metrics and configuration layers described in §6.4/§6.5.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use qmk_core::config::QmkConfig;
//! use qmk_core::executor::{Executor, ExecutorServices};
//! use qmk_core::graph::{Node, OpName, OperationGraph, Program, Resources};
//! use qmk_core::static_verifier::{StaticVerifier, VerifierConfig};
//!
//! let cfg = QmkConfig::production_ready();
//! let executor = Executor::new(
//!     cfg.to_executor_config(),
//!     ExecutorServices::default(),
//!     StaticVerifier::new(VerifierConfig::default()),
//! );
//!
//! let graph = OperationGraph {
//!     version: "0.1".to_string(),
//!     caps: vec!["ALLOC".to_string(), "MEASURE".to_string()],
//!     program: Program {
//!         nodes: vec![
//!             Node {
//!                 id: "n0".to_string(),
//!                 op: OpName::AllocLq,
//!                 vqs: vec!["q0".to_string()],
//!                 chs: vec![],
//!                 produces: vec![],
//!                 inputs: vec![],
//!                 args: serde_json::json!({ "profile": "logical:surface(d=3)" }),
//!                 guard: None,
//!             },
//!             Node {
//!                 id: "n1".to_string(),
//!                 op: OpName::MeasureZ,
//!                 vqs: vec!["q0".to_string()],
//!                 chs: vec![],
//!                 produces: vec!["m0".to_string()],
//!                 inputs: vec![],
//!                 args: serde_json::json!({}),
//!                 guard: None,
//!             },
//!         ],
//!     },
//!     resources: Resources::default(),
//!     metadata: serde_json::json!({}),
//! };
//!
//! let result = executor.execute(&graph, "tenant-a").unwrap();
//! assert!(result.events.contains_key("m0"));
//! ```

/// Core implementation version, tracked for telemetry/report tagging.
pub const CORE_VERSION: &str = "0.1.0";

pub mod capability_system;
pub mod config;
pub mod entanglement_firewall;
pub mod error;
pub mod executor;
pub mod graph;
pub mod linear_types;
pub mod logical_qubit;
pub mod qec_profiles;
pub mod resource_engine;
pub mod session;
pub mod static_verifier;
pub mod telemetry;

pub use error::{QmkError, Result};
